//! Expression syntax validation.
//!
//! `validate` runs a fixed sequence of checks over the whitespace-stripped
//! input and reports the first failure as a typed [`ExpressionError`]. The
//! planner assumes validator-accepted input and does not re-check.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::model::Operator;

/// Why an expression was rejected. Variants map 1:1 onto the user-facing
/// 422 responses of the calculate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("empty input")]
    EmptyExpression,
    #[error("must contain at least one operator")]
    MissingOperator,
    #[error("invalid character")]
    InvalidCharacter,
    #[error("mismatched or improperly placed parentheses")]
    ParenthesisIssue,
    #[error("incorrect number format")]
    NumberFormatIssue,
    #[error("consecutive or misplaced operators")]
    OperatorIssue,
    #[error("division by zero is not allowed")]
    DivisionByZero,
    #[error("expression cannot start or end with an operator")]
    InvalidExpressionStartEnd,
    #[error("unary operators are not supported")]
    UnaryOperatorNotSupported,
    #[error("invalid expression")]
    InvalidExpression,
}

/// A `/` followed by a possibly signed zero literal (`0`, `00`, `0.0`, ...).
/// Caught up front so `10/0` fails validation instead of producing NaN.
static DIVISION_BY_ZERO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/[+-]?0+(\.0*)?([^0-9.]|$)").expect("division-by-zero pattern"));

/// Remove all whitespace from an expression.
pub fn strip_whitespace(expression: &str) -> String {
    expression.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_operator(c: char) -> bool {
    Operator::from_char(c).is_some()
}

/// Validate an infix expression, returning the first error found.
///
/// Checks run in a fixed order: empty input, division by a zero literal,
/// operator presence, character set, parenthesis placement, number format,
/// operator placement (including unary rejection), and finally the
/// first/last character.
pub fn validate(expression: &str) -> Result<(), ExpressionError> {
    let expression = strip_whitespace(expression);
    if expression.is_empty() {
        return Err(ExpressionError::EmptyExpression);
    }

    if DIVISION_BY_ZERO.is_match(&expression) {
        return Err(ExpressionError::DivisionByZero);
    }

    if !expression.chars().any(is_operator) {
        return Err(ExpressionError::MissingOperator);
    }

    validate_characters(&expression)?;

    let chars: Vec<char> = expression.chars().collect();
    validate_parentheses(&chars)?;
    validate_numbers(&expression)?;
    validate_operators(&chars)?;

    if is_operator(chars[0]) || is_operator(chars[chars.len() - 1]) {
        return Err(ExpressionError::InvalidExpressionStartEnd);
    }

    Ok(())
}

fn validate_characters(expression: &str) -> Result<(), ExpressionError> {
    for c in expression.chars() {
        if !(c.is_ascii_digit() || c == '.' || is_operator(c) || c == '(' || c == ')') {
            return Err(ExpressionError::InvalidCharacter);
        }
    }
    Ok(())
}

fn validate_parentheses(chars: &[char]) -> Result<(), ExpressionError> {
    let mut balance: i32 = 0;
    let mut last = ' ';

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => {
                balance += 1;
                if i > 0 && !is_operator(last) && last != '(' {
                    return Err(ExpressionError::ParenthesisIssue);
                }
            }
            ')' => {
                balance -= 1;
                if balance < 0 {
                    return Err(ExpressionError::ParenthesisIssue);
                }
                if let Some(&next) = chars.get(i + 1) {
                    if !is_operator(next) && next != ')' {
                        return Err(ExpressionError::ParenthesisIssue);
                    }
                }
            }
            _ => {}
        }
        last = c;
    }

    if balance != 0 {
        return Err(ExpressionError::ParenthesisIssue);
    }
    Ok(())
}

fn validate_numbers(expression: &str) -> Result<(), ExpressionError> {
    let literals = expression
        .split(|c: char| is_operator(c) || c == '(' || c == ')')
        .filter(|part| !part.is_empty());

    for literal in literals {
        if literal.matches('.').count() > 1 {
            return Err(ExpressionError::NumberFormatIssue);
        }
        if literal.starts_with('.') || literal.ends_with('.') {
            return Err(ExpressionError::NumberFormatIssue);
        }
        let bytes = literal.as_bytes();
        if bytes.len() > 1 && bytes[0] == b'0' && bytes[1] != b'.' {
            return Err(ExpressionError::NumberFormatIssue);
        }
    }
    Ok(())
}

fn validate_operators(chars: &[char]) -> Result<(), ExpressionError> {
    let mut last_was_operator = false;

    for (i, &c) in chars.iter().enumerate() {
        if is_operator(c) {
            if last_was_operator {
                return Err(ExpressionError::OperatorIssue);
            }
            if let Some(&next) = chars.get(i + 1) {
                if next == ')' || is_operator(next) {
                    return Err(ExpressionError::OperatorIssue);
                }
            }
            last_was_operator = true;
        } else {
            last_was_operator = false;
        }

        if c == '(' {
            if let Some(&next) = chars.get(i + 1) {
                if next == ')' {
                    return Err(ExpressionError::ParenthesisIssue);
                }
                if is_operator(next) {
                    return Err(ExpressionError::UnaryOperatorNotSupported);
                }
            }
        }
    }

    Ok(())
}
