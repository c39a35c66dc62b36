//! Error types for the engine.
//!
//! Structural errors (invalid position, bad formula syntax, a rejected
//! cyclic edit) abort the operation and leave the sheet untouched.
//! Evaluation errors (`#REF!`, `#VALUE!`, `#DIV/0!`) are not here: they
//! travel through the value channel so downstream formulas propagate them.

use thiserror::Error;

use crate::position::Position;

/// Errors surfaced by the sheet edit/query API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid cell position {0}")]
    InvalidPosition(Position),

    #[error("formula is syntactically incorrect: {0}")]
    FormulaSyntax(String),

    #[error("circular dependency detected at {0}")]
    CircularDependency(Position),
}

pub type Result<T> = std::result::Result<T, EngineError>;
