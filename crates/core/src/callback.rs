//! Observer callbacks for runnable execution.
//!
//! Observers are carried in [`RunConfig`](crate::config::RunConfig) and run in
//! order. The first observer that fails stops the chain for that event.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{CallbackError, Error};

/// Hooks fired around a unit's execution.
///
/// Every hook has a no-op default, so an observer only implements the events
/// it cares about.
pub trait Callback: Send + Sync {
    /// Called before the unit runs.
    fn on_start(&self, unit: &str, input: &dyn Debug) -> Result<(), CallbackError> {
        let _ = (unit, input);
        Ok(())
    }

    /// Called after the unit produced an output.
    fn on_end(&self, unit: &str, output: &dyn Debug) -> Result<(), CallbackError> {
        let _ = (unit, output);
        Ok(())
    }

    /// Called after the unit failed.
    fn on_error(&self, unit: &str, error: &Error) -> Result<(), CallbackError> {
        let _ = (unit, error);
        Ok(())
    }
}

/// Dispatches one event to an ordered chain of observers.
pub struct CallbackManager<'a> {
    callbacks: &'a [Arc<dyn Callback>],
}

impl<'a> CallbackManager<'a> {
    pub fn new(callbacks: &'a [Arc<dyn Callback>]) -> Self {
        Self { callbacks }
    }

    pub fn start(&self, unit: &str, input: &dyn Debug) -> Result<(), CallbackError> {
        self.callbacks.iter().try_for_each(|cb| cb.on_start(unit, input))
    }

    pub fn end(&self, unit: &str, output: &dyn Debug) -> Result<(), CallbackError> {
        self.callbacks.iter().try_for_each(|cb| cb.on_end(unit, output))
    }

    pub fn error(&self, unit: &str, error: &Error) -> Result<(), CallbackError> {
        self.callbacks.iter().try_for_each(|cb| cb.on_error(unit, error))
    }
}

/// Emits a `tracing` event for every hook when `verbose` is set.
#[derive(Debug, Clone, Default)]
pub struct LoggingCallback {
    pub verbose: bool,
}

impl LoggingCallback {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Callback for LoggingCallback {
    fn on_start(&self, unit: &str, input: &dyn Debug) -> Result<(), CallbackError> {
        if self.verbose {
            tracing::info!(unit, input = ?input, "Starting unit");
        }
        Ok(())
    }

    fn on_end(&self, unit: &str, output: &dyn Debug) -> Result<(), CallbackError> {
        if self.verbose {
            tracing::info!(unit, output = ?output, "Unit completed");
        }
        Ok(())
    }

    fn on_error(&self, unit: &str, error: &Error) -> Result<(), CallbackError> {
        if self.verbose {
            tracing::warn!(unit, error = %error, "Unit failed");
        }
        Ok(())
    }
}
