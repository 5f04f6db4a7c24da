//! Runnable: the composable unit of work.
//!
//! Anything that turns an input into an output (a model, a tool chain, an
//! agent) implements [`Runnable`]. Implementors write [`Runnable::call`];
//! `invoke`, `stream`, `batch`, and `pipe` come for free and layer observers,
//! cancellation, timeouts and fan-out on top of it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::callback::CallbackManager;
use crate::config::RunConfig;
use crate::error::{Error, ObservedOutcome, ObserverEvent, Result};

/// A lazily evaluated stream of outputs. Consumed once.
pub type RunStream<'a, O> = BoxStream<'a, Result<O>>;

/// A unit of work with a uniform execution interface.
#[async_trait]
pub trait Runnable<I, O>: Send + Sync
where
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    /// Diagnostic name. Used for logging only, never for dispatch.
    fn name(&self) -> &str;

    /// The unit's own logic.
    async fn call(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        let _ = (input, ctx, config);
        Err(Error::NotImplemented(self.name().to_string()))
    }

    /// Run the unit once, with observers, cancellation, and the configured timeout.
    async fn invoke(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        observed_call(self, input, ctx, config).await
    }

    /// Stream the unit's output. The default yields the single `invoke` result.
    ///
    /// Nothing runs until the stream is first polled.
    fn stream<'a>(
        &'a self,
        input: I,
        ctx: &'a CancellationToken,
        config: &'a RunConfig,
    ) -> RunStream<'a, O> {
        stream::once(self.invoke(input, ctx, config))
            .take_until(ctx.cancelled())
            .boxed()
    }

    /// Invoke once per input, concurrently. Output order matches input order.
    ///
    /// Fails fast: the first error is returned and in-flight siblings are dropped.
    async fn batch(&self, inputs: Vec<I>, ctx: &CancellationToken, config: &RunConfig) -> Result<Vec<O>> {
        let len = inputs.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let limit = config.max_concurrency.unwrap_or(len).max(1);
        debug!(unit = self.name(), inputs = len, limit, "Starting batch");

        let mut slots: Vec<Option<O>> = std::iter::repeat_with(|| None).take(len).collect();
        let mut runs = stream::iter(inputs.into_iter().enumerate())
            .map(|(idx, input)| async move { (idx, self.invoke(input, ctx, config).await) })
            .buffer_unordered(limit);

        while let Some((idx, result)) = runs.next().await {
            match result {
                Ok(output) => slots[idx] = Some(output),
                Err(e) => {
                    warn!(unit = self.name(), index = idx, error = %e, "Batch item failed");
                    return Err(e);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Chain `next` after this unit.
    fn pipe<O2, R>(self, next: R) -> Sequence<Self, R, O>
    where
        Self: Sized,
        R: Runnable<O, O2>,
        O2: Debug + Send + 'static,
    {
        Sequence::<Self, R, O>::new::<I, O2>(self, next)
    }

    /// Retry this unit up to `config.max_retries` extra times.
    fn with_retry(self) -> Retry<Self>
    where
        Self: Sized,
        I: Clone,
    {
        Retry::new(self)
    }
}

/// The default `invoke` body, shared by every unit.
async fn observed_call<R, I, O>(unit: &R, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O>
where
    R: Runnable<I, O> + ?Sized,
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let name = unit.name();
    let observers = CallbackManager::new(&config.callbacks);
    observers.start(name, &input).map_err(|source| Error::Observer {
        unit: name.to_string(),
        event: ObserverEvent::Start,
        source,
        outcome: ObservedOutcome::NotStarted,
    })?;

    let work = unit.call(input, ctx, config);
    let result = match config.timeout {
        Some(limit) => tokio::select! {
            _ = ctx.cancelled() => Err(Error::Cancelled),
            timed = tokio::time::timeout(limit, work) => timed.unwrap_or_else(|_| {
                Err(Error::Timeout {
                    unit: name.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }),
        },
        None => tokio::select! {
            _ = ctx.cancelled() => Err(Error::Cancelled),
            out = work => out,
        },
    };

    match result {
        Ok(output) => match observers.end(name, &output) {
            Ok(()) => Ok(output),
            Err(source) => Err(Error::Observer {
                unit: name.to_string(),
                event: ObserverEvent::End,
                source,
                outcome: ObservedOutcome::Output(Box::new(output)),
            }),
        },
        Err(e) => match observers.error(name, &e) {
            Ok(()) => Err(e),
            Err(source) => Err(Error::Observer {
                unit: name.to_string(),
                event: ObserverEvent::Error,
                source,
                outcome: ObservedOutcome::Failed(Box::new(e)),
            }),
        },
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for Arc<R>
where
    R: Runnable<I, O> + ?Sized,
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn call(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        (**self).call(input, ctx, config).await
    }

    async fn invoke(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        (**self).invoke(input, ctx, config).await
    }

    fn stream<'a>(
        &'a self,
        input: I,
        ctx: &'a CancellationToken,
        config: &'a RunConfig,
    ) -> RunStream<'a, O> {
        (**self).stream(input, ctx, config)
    }

    async fn batch(&self, inputs: Vec<I>, ctx: &CancellationToken, config: &RunConfig) -> Result<Vec<O>> {
        (**self).batch(inputs, ctx, config).await
    }
}

// --- Composites ---

/// Two units run back to back; built by [`Runnable::pipe`].
///
/// `M` is the intermediate type. Nest sequences to chain more stages.
pub struct Sequence<A, B, M> {
    first: A,
    second: B,
    name: String,
    _mid: PhantomData<fn() -> M>,
}

impl<A, B, M> Sequence<A, B, M> {
    pub fn new<I, O>(first: A, second: B) -> Self
    where
        A: Runnable<I, M>,
        B: Runnable<M, O>,
        I: Debug + Send + 'static,
        M: Debug + Send + 'static,
        O: Debug + Send + 'static,
    {
        let name = format!("{} | {}", first.name(), second.name());
        Self {
            first,
            second,
            name,
            _mid: PhantomData,
        }
    }
}

#[async_trait]
impl<I, M, O, A, B> Runnable<I, O> for Sequence<A, B, M>
where
    A: Runnable<I, M>,
    B: Runnable<M, O>,
    I: Debug + Send + 'static,
    M: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        let mid = self.first.invoke(input, ctx, config).await?;
        self.second.invoke(mid, ctx, config).await
    }

    /// Runs the first stage to completion, then streams the second.
    fn stream<'a>(
        &'a self,
        input: I,
        ctx: &'a CancellationToken,
        config: &'a RunConfig,
    ) -> RunStream<'a, O> {
        let head = async move {
            match self.first.invoke(input, ctx, config).await {
                Ok(mid) => self.second.stream(mid, ctx, config),
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            }
        };
        stream::once(head)
            .flatten()
            .take_until(ctx.cancelled())
            .boxed()
    }
}

/// Runs every branch on a clone of the same input. Outputs are keyed by branch name.
pub struct Parallel<I, O>
where
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    name: String,
    branches: HashMap<String, Arc<dyn Runnable<I, O>>>,
}

impl<I, O> Parallel<I, O>
where
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: HashMap::new(),
        }
    }

    /// Add (or replace) a branch.
    pub fn with_branch(mut self, key: impl Into<String>, unit: impl Runnable<I, O> + 'static) -> Self {
        self.branches.insert(key.into(), Arc::new(unit));
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

#[async_trait]
impl<I, O> Runnable<I, HashMap<String, O>> for Parallel<I, O>
where
    I: Clone + Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    /// Fails fast on the first branch error.
    async fn call(
        &self,
        input: I,
        ctx: &CancellationToken,
        config: &RunConfig,
    ) -> Result<HashMap<String, O>> {
        let limit = config.max_concurrency.unwrap_or(self.branches.len()).max(1);
        let work: Vec<_> = self
            .branches
            .iter()
            .map(|(key, unit)| {
                let key = key.clone();
                let unit = Arc::clone(unit);
                let input = input.clone();
                async move { (key, unit.invoke(input, ctx, config).await) }
            })
            .collect();

        let mut runs = stream::iter(work).buffer_unordered(limit);

        let mut outputs = HashMap::with_capacity(self.branches.len());
        while let Some((key, result)) = runs.next().await {
            match result {
                Ok(output) => {
                    outputs.insert(key, output);
                }
                Err(e) => {
                    warn!(unit = %self.name, branch = %key, error = %e, "Parallel branch failed");
                    return Err(e);
                }
            }
        }
        Ok(outputs)
    }
}

/// Adapts a synchronous closure into a unit.
pub struct RunnableLambda<F> {
    name: String,
    func: F,
}

impl<F> RunnableLambda<F> {
    pub fn new<I, O>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(I) -> Result<O> + Send + Sync,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<I, O, F> Runnable<I, O> for RunnableLambda<F>
where
    F: Fn(I) -> Result<O> + Send + Sync,
    I: Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: I, _ctx: &CancellationToken, _config: &RunConfig) -> Result<O> {
        (self.func)(input)
    }
}

/// Re-invokes the inner unit on failure, up to `max_retries` extra attempts.
///
/// Cancellation and observer failures are returned immediately.
pub struct Retry<R> {
    inner: R,
}

impl<R> Retry<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I, O, R> Runnable<I, O> for Retry<R>
where
    R: Runnable<I, O>,
    I: Clone + Debug + Send + 'static,
    O: Debug + Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn call(&self, input: I, ctx: &CancellationToken, config: &RunConfig) -> Result<O> {
        let mut attempt = 0;
        loop {
            match self.inner.invoke(input.clone(), ctx, config).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        unit = self.inner.name(),
                        attempt,
                        max_retries = config.max_retries,
                        error = %e,
                        "Retrying after failure"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(error: &Error) -> bool {
    !matches!(error, Error::Cancelled | Error::Observer { .. })
}
