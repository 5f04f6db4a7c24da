//! Calculator tool: arithmetic on two operands or a whole expression.
//!
//! Accepts either `{"operation": "add", "a": 2, "b": 2}` or
//! `{"expression": "(2 + 3) * 4"}`. Expressions go through a small
//! recursive-descent evaluator supporting `+`, `-`, `*`, `/`, parentheses,
//! and unary negation.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{Tool, parse_arguments};
use reagent_core::CancellationToken;
use serde::Deserialize;
use tracing::debug;

pub struct CalculatorTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn apply(self, a: f64, b: f64) -> Result<f64, String> {
        match self {
            Operation::Add => Ok(a + b),
            Operation::Subtract => Ok(a - b),
            Operation::Multiply => Ok(a * b),
            Operation::Divide if b == 0.0 => Err("Division by zero".into()),
            Operation::Divide => Ok(a / b),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CalculatorArgs {
    Binary { operation: Operation, a: f64, b: f64 },
    Expression { expression: String },
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform arithmetic. Pass {\"operation\": \"add|subtract|multiply|divide\", \"a\": number, \"b\": number} or {\"expression\": \"(2 + 3) * 4\"}."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "Operation applied to a and b"
                },
                "a": { "type": "number", "description": "First operand" },
                "b": { "type": "number", "description": "Second operand" },
                "expression": {
                    "type": "string",
                    "description": "A full expression to evaluate instead, e.g. '(2 + 3) * 4'"
                }
            }
        })
    }

    async fn execute(
        &self,
        _ctx: &CancellationToken,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let args: CalculatorArgs = parse_arguments(self.name(), arguments)?;
        debug!(?args, "Evaluating");

        let value = match args {
            CalculatorArgs::Binary { operation, a, b } => operation.apply(a, b),
            CalculatorArgs::Expression { expression } => evaluate(&expression),
        }
        .map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason,
        })?;

        Ok(format_number(value))
    }
}

/// Integral results print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Expression evaluator ──────────────────────────────────────────────────

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = cursor.sum()?;
    match cursor.peek() {
        None => Ok(value),
        Some(tok) => Err(format!("Unexpected token at position {}: {tok:?}", cursor.pos)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' | '-' | '*' | '/' => Token::Op(c),
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(idx, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = idx + d.len_utf8();
                    chars.next();
                }
                let literal = &input[start..end];
                Token::Num(
                    literal
                        .parse()
                        .map_err(|_| format!("Invalid number: {literal}"))?,
                )
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Deepest allowed nesting of parentheses and unary minus.
const MAX_DEPTH: usize = 256;

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // sum = product (('+' | '-') product)*
    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.bump();
            let rhs = self.product()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // product = factor (('*' | '/') factor)*
    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.bump();
            let rhs = self.factor()?;
            acc = match op {
                '*' => acc * rhs,
                _ => Operation::Divide.apply(acc, rhs)?,
            };
        }
        Ok(acc)
    }

    // factor = '-' factor | NUMBER | '(' sum ')'
    fn factor(&mut self) -> Result<f64, String> {
        match self.bump() {
            Some(Token::Op('-')) => self.nested(|c| c.factor().map(|v| -v)),
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let inner = self.nested(Self::sum)?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(args: serde_json::Value) -> Result<String, ToolError> {
        CalculatorTool.execute(&CancellationToken::new(), args).await
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
    }

    #[test]
    fn nested_parentheses() {
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn unary_negation() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
    }

    #[test]
    fn complex_expression() {
        let result = evaluate("(10 + 5) / 3 - 2 * (1 + 1)").unwrap();
        assert!((result - 1.0).abs() < 1e-10);
    }

    #[test]
    fn malformed_expressions() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2 $ 3").is_err());
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn moderate_nesting_allowed() {
        let expr = format!("{}7{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&expr).unwrap(), 7.0);
        assert_eq!(evaluate("--3").unwrap(), 3.0);
    }

    #[tokio::test]
    async fn deep_nesting_rejected() {
        let minus = format!("{}1", "-".repeat(20_000));
        let err = run(serde_json::json!({ "expression": minus })).await.unwrap_err();
        assert!(
            matches!(err, ToolError::ExecutionFailed { ref reason, .. } if reason == "Expression nested too deeply")
        );

        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(evaluate(&parens).unwrap_err(), "Expression nested too deeply");
    }

    #[tokio::test]
    async fn binary_add() {
        let out = run(serde_json::json!({"operation": "add", "a": 2, "b": 2})).await.unwrap();
        assert_eq!(out, "4");
    }

    #[tokio::test]
    async fn binary_operations() {
        let cases = [("subtract", "7"), ("multiply", "30"), ("divide", "3.3333333333333335")];
        for (operation, expected) in cases {
            let out = run(serde_json::json!({"operation": operation, "a": 10, "b": 3}))
                .await
                .unwrap();
            assert_eq!(out, expected, "{operation}");
        }
    }

    #[tokio::test]
    async fn binary_divide_by_zero_fails() {
        let err = run(serde_json::json!({"operation": "divide", "a": 1, "b": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref reason, .. } if reason == "Division by zero"));
    }

    #[tokio::test]
    async fn expression_form() {
        assert_eq!(run(serde_json::json!({"expression": "15 * 23"})).await.unwrap(), "345");
        assert_eq!(run(serde_json::json!({"expression": "10 / 2"})).await.unwrap(), "5");
    }

    #[tokio::test]
    async fn unknown_operation_rejected() {
        let err = run(serde_json::json!({"operation": "modulo", "a": 1, "b": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn empty_arguments_rejected() {
        let err = run(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn tool_definition() {
        let def = CalculatorTool.to_definition();
        assert_eq!(def.function.name, "calculator");
        assert!(def.function.parameters["properties"]["operation"].is_object());
    }
}
