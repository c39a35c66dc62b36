//! Formula parsing, canonical printing, and evaluation.
//!
//! A [`Formula`] is parsed once and then owns its AST together with the
//! list of valid positions it references. Evaluation goes through the
//! [`eval::CellLookup`] seam so the formula layer never depends on the
//! sheet directly.

pub mod eval;
pub mod parser;
pub mod refs;

use crate::error::EngineError;
use crate::position::Position;

use eval::{CellLookup, Value};
use parser::Expr;

/// A parsed formula: the AST plus its precomputed reference list.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    refs: Vec<Position>,
}

impl Formula {
    /// Parse a formula expression (without the leading `=`).
    pub fn parse(expression: &str) -> Result<Self, EngineError> {
        let expr = parser::parse(expression).map_err(EngineError::FormulaSyntax)?;
        let refs = refs::referenced_positions(&expr);
        Ok(Self { expr, refs })
    }

    /// Canonical text of the formula, without the `=` prefix.
    pub fn expression(&self) -> String {
        self.expr.to_string()
    }

    /// Valid positions this formula reads, deduplicated and sorted.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }

    /// Evaluate against a resolver. Failures fold into the value channel.
    pub fn evaluate(&self, cells: &dyn CellLookup) -> Value {
        match eval::evaluate(&self.expr, cells) {
            Ok(n) => Value::Number(n),
            Err(e) => Value::Error(e),
        }
    }
}
