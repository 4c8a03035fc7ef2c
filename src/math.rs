//! Evaluators for the bracketed arithmetic the model emits.
//!
//! - [`ArithmeticEvaluator`]: local recursive-descent calculator for
//!   `+ - * / ^`, parentheses and unary minus.
//! - [`WolframEvaluator`]: Wolfram|Alpha short-answer API, app id from
//!   `WOLFRAMALPHA_APP_ID`.
//! - [`DisabledEvaluator`]: every expression fails, leaving text untouched.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::MathConfig;
use crate::error::DocQaError;

const WOLFRAM_URL: &str = "https://api.wolframalpha.com/v1/result";

/// Evaluates one expression to display text. Failures are reported as
/// [`DocQaError::EvaluationFailure`].
#[async_trait]
pub trait MathEvaluator: Send + Sync {
    async fn evaluate(&self, expression: &str) -> Result<String>;
}

pub fn create_evaluator(config: &MathConfig) -> Result<Box<dyn MathEvaluator>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(ArithmeticEvaluator)),
        "wolfram" => Ok(Box::new(WolframEvaluator::new(config)?)),
        "disabled" => Ok(Box::new(DisabledEvaluator)),
        other => bail!("Unknown math provider: {}", other),
    }
}

fn failure(expression: &str, message: impl Into<String>) -> anyhow::Error {
    DocQaError::EvaluationFailure {
        expression: expression.to_string(),
        message: message.into(),
    }
    .into()
}

// ============ Local ============

pub struct ArithmeticEvaluator;

#[async_trait]
impl MathEvaluator for ArithmeticEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String> {
        let value = Parser::new(expression)
            .parse()
            .map_err(|msg| failure(expression, msg))?;
        Ok(format_value(value))
    }
}

/// Integral values print without a fraction; others keep up to six decimals.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Grammar:
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := factor (('*' | '/') factor)*
/// factor := unary ('^' factor)?
/// unary  := '-' unary | '+' unary | atom
/// atom   := number | '(' expr ')'
/// ```
struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn parse(mut self) -> Result<f64, String> {
        let value = self.expr()?;
        self.skip_ws();
        if let Some(c) = self.chars.peek() {
            return Err(format!("unexpected '{}'", c));
        }
        if !value.is_finite() {
            return Err("result is not a finite number".to_string());
        }
        Ok(value)
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        loop {
            if self.eat('*') {
                value *= self.factor()?;
            } else if self.eat('/') {
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.eat('^') {
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<f64, String> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                return Err("missing ')'".to_string());
            }
            return Ok(value);
        }
        self.skip_ws();
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                digits.push(c);
                self.chars.next();
            } else if c == ',' || c == '_' {
                // Thousands separators.
                self.chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return match self.chars.peek() {
                Some(c) => Err(format!("unexpected '{}'", c)),
                None => Err("unexpected end of expression".to_string()),
            };
        }
        digits
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", digits))
    }
}

// ============ Wolfram|Alpha ============

pub struct WolframEvaluator {
    client: reqwest::Client,
    app_id: String,
}

impl WolframEvaluator {
    pub fn new(config: &MathConfig) -> Result<Self> {
        let app_id = std::env::var("WOLFRAMALPHA_APP_ID")
            .map_err(|_| anyhow::anyhow!("WOLFRAMALPHA_APP_ID environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, app_id })
    }
}

#[async_trait]
impl MathEvaluator for WolframEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String> {
        let response = self
            .client
            .get(WOLFRAM_URL)
            .query(&[("appid", self.app_id.as_str()), ("i", expression)])
            .send()
            .await
            .map_err(|e| failure(expression, e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failure(expression, e.to_string()))?;
        if !status.is_success() {
            return Err(failure(expression, format!("{}: {}", status, body.trim())));
        }
        Ok(body.trim().to_string())
    }
}

// ============ Disabled ============

pub struct DisabledEvaluator;

#[async_trait]
impl MathEvaluator for DisabledEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String> {
        Err(failure(expression, "math evaluation is disabled"))
    }
}
