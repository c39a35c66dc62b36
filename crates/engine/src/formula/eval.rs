//! Formula evaluation over a position → value resolver.
//!
//! Evaluation never panics and never returns a Rust error to the read
//! path: arithmetic and reference failures become `FormulaError` values
//! that the owning cell reports as its `Value`, so downstream formulas
//! propagate them naturally.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::Position;

use super::parser::{BinOp, Expr, UnOp};

/// Evaluation failure categories, rendered as the classic error tokens.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaError {
    /// Reference to a position outside the grid.
    #[error("#REF!")]
    Ref,
    /// Non-numeric text used as an arithmetic operand.
    #[error("#VALUE!")]
    Value,
    /// Arithmetic failure: division by zero or overflow.
    #[error("#DIV/0!")]
    Div0,
}

/// What a cell is worth when read: text (the empty string doubles as the
/// empty value), a number, or an evaluation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl Value {
    /// The value of an empty cell.
    pub fn empty() -> Self {
        Value::default()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Position → value resolution, the seam between the evaluator and the
/// sheet. `None` means no cell is materialised at the position.
pub trait CellLookup {
    fn cell_value(&self, pos: Position) -> Option<Value>;
}

/// Evaluate an expression against a resolver.
pub fn evaluate(expr: &Expr, cells: &dyn CellLookup) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => operand(*pos, cells),
        Expr::UnaryOp { op, operand } => {
            let v = evaluate(operand, cells)?;
            Ok(match op {
                UnOp::Plus => v,
                UnOp::Minus => -v,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, cells)?;
            let r = evaluate(right, cells)?;
            let result = match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
            };
            if result.is_finite() {
                Ok(result)
            } else {
                Err(FormulaError::Div0)
            }
        }
    }
}

/// Coerce the cell at `pos` into an arithmetic operand.
fn operand(pos: Position, cells: &dyn CellLookup) -> Result<f64, FormulaError> {
    if !pos.is_valid() {
        return Err(FormulaError::Ref);
    }

    match cells.cell_value(pos) {
        None => Ok(0.0),
        Some(Value::Number(n)) => Ok(n),
        Some(Value::Text(s)) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                // The whole string must be a number; partial parses are
                // #VALUE!, matching text-to-number coercion rules.
                s.parse::<f64>().map_err(|_| FormulaError::Value)
            }
        }
        Some(Value::Error(e)) => Err(e),
    }
}
