//! Arithmetic calculator tool

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::tools::{ParameterProperty, ParameterSchema, Tool};

const ALLOWED_CHARS: &str = "0123456789.e+-*/() ";

/// Deepest nesting of signs, exponents and parentheses accepted
const MAX_DEPTH: usize = 128;

/// Tool for evaluating arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a mathematical expression using + - * / // ** and parentheses. Numbers may use e-notation (3.1e12)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "expression",
            ParameterProperty::string("The expression to evaluate, e.g. '3.1e12 - 2.2e12'"),
        )
    }

    #[instrument(skip(self, args))]
    async fn call(&self, args: &Value) -> Result<String> {
        let expression = args
            .get("expression")
            .and_then(|v| v.as_str())
            .context("Missing required parameter: expression")?;

        let result = evaluate(expression).with_context(|| {
            format!(
                "Invalid expression '{}'. Ensure the expression is a valid mathematical string",
                expression
            )
        })?;
        debug!(result, "Calculated");

        Ok(format!("Calculation result: {}", format_thousands(result)))
    }
}

/// Evaluate an arithmetic expression after dropping every character outside
/// the allowed set (so "$3.1e12 - $2.2e12" works).
pub fn evaluate(expression: &str) -> Result<f64> {
    let sanitized: Vec<u8> = expression
        .bytes()
        .filter(|b| ALLOWED_CHARS.as_bytes().contains(b) && *b != b' ')
        .collect();
    if sanitized.is_empty() {
        bail!("expression is empty");
    }

    let mut parser = Parser {
        input: &sanitized,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != sanitized.len() {
        bail!("unexpected '{}' at position {}", parser.input[parser.pos] as char, parser.pos);
    }
    if !value.is_finite() {
        bail!("result is not a finite number");
    }
    Ok(value)
}

/// Recursive-descent parser over the sanitized bytes.
///
/// expr  := term (('+' | '-') term)*
/// term  := unary (('*' | '/' | '//') unary)*
/// unary := ('+' | '-') unary | power
/// power := atom ('**' unary)?
/// atom  := number | '(' expr ')'
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_pow(&self) -> bool {
        self.input.get(self.pos..self.pos + 2) == Some(b"**".as_slice())
    }

    fn peek_floor_div(&self) -> bool {
        self.input.get(self.pos..self.pos + 2) == Some(b"//".as_slice())
    }

    /// Run `f` one nesting level deeper, failing instead of exhausting the stack
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            bail!("expression nested too deeply");
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == b'+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') if !self.peek_pow() => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(b'/') => {
                    let floor = self.peek_floor_div();
                    self.pos += if floor { 2 } else { 1 };
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        bail!("division by zero");
                    }
                    value = if floor { (value / rhs).floor() } else { value / rhs };
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.atom()?;
        if self.peek_pow() {
            self.pos += 2;
            let exponent = self.nested(Self::unary)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                if self.peek() != Some(b')') {
                    bail!("missing closing parenthesis");
                }
                self.pos += 1;
                Ok(value)
            }
            Some(b'0'..=b'9' | b'.') => self.number(),
            Some(c) => bail!("unexpected '{}' at position {}", c as char, self.pos),
            None => bail!("unexpected end of expression"),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        self.digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.digits();
        }
        if self.peek() == Some(b'e') {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            let exp_start = self.pos;
            self.digits();
            if self.pos == exp_start {
                bail!("malformed exponent at position {}", exp_start);
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.pos])?;
        text.parse::<f64>()
            .with_context(|| format!("invalid number '{}'", text))
    }

    fn digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }
}

/// Two decimals with comma thousands separators: 900000000000 -> "900,000,000,000.00"
pub fn format_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("8 / 4 / 2").unwrap(), 1.0);
    }

    #[test]
    fn test_unary_and_power() {
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 ** 10").unwrap(), 1024.0);
        assert_eq!(evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
    }

    #[test]
    fn test_exponent_literals_and_sanitizing() {
        assert_eq!(evaluate("3.1e12 - 2.2e12").unwrap(), 9e11);
        assert_eq!(evaluate("$3.1e12 - $2.2e12").unwrap(), 9e11);
        assert_eq!(evaluate("1.5e-3 * 2").unwrap(), 0.003);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("abc").is_err());
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2e").is_err());
        let err = evaluate("1 / 0").unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_floor_division() {
        assert_eq!(evaluate("7 // 2").unwrap(), 3.0);
        assert_eq!(evaluate("-7 // 2").unwrap(), -4.0);
        assert_eq!(evaluate("7.5 // 2 * 2").unwrap(), 6.0);
        assert_eq!(evaluate("7 / 2").unwrap(), 3.5);
        assert_eq!(evaluate("1 // 0").unwrap_err().to_string(), "division by zero");
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let signs = format!("{}1", "-".repeat(200_000));
        assert_eq!(
            evaluate(&signs).unwrap_err().to_string(),
            "expression nested too deeply"
        );

        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(
            evaluate(&parens).unwrap_err().to_string(),
            "expression nested too deeply"
        );

        let powers = format!("2{}", "**2".repeat(100_000));
        assert!(evaluate(&powers).is_err());

        // moderate nesting still evaluates
        assert_eq!(evaluate(&format!("{}1", "-".repeat(100))).unwrap(), 1.0);
        assert_eq!(evaluate("((((2 + 3))))").unwrap(), 5.0);
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(900_000_000_000.0), "900,000,000,000.00");
        assert_eq!(format_thousands(1234.5), "1,234.50");
        assert_eq!(format_thousands(999.999), "1,000.00");
        assert_eq!(format_thousands(12.0), "12.00");
        assert_eq!(format_thousands(-1234567.891), "-1,234,567.89");
    }

    #[tokio::test]
    async fn test_calculator_tool_output() {
        let out = CalculatorTool
            .call(&json!({"expression": "3.1e12 - 2.2e12"}))
            .await
            .unwrap();
        assert_eq!(out, "Calculation result: 900,000,000,000.00");
    }

    #[tokio::test]
    async fn test_calculator_tool_error_is_descriptive() {
        let err = CalculatorTool
            .call(&json!({"expression": "4 / (2 - 2)"}))
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Invalid expression '4 / (2 - 2)'"));
        assert!(message.contains("division by zero"));
    }
}
