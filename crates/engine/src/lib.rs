//! Spreadsheet evaluation core.
//!
//! A sparse two-dimensional grid of cells (empty / text / formula), a live
//! bidirectional dependency graph between formula cells, lazy memoised
//! evaluation with transitive cache invalidation, and cycle rejection
//! before every mutating edit.

pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod position;
pub mod sheet;
