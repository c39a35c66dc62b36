//! Cell content variants and the formula value cache.
//!
//! A cell's content is one of three variants. Formula cells memoise their
//! last computed value in an interior-mutable slot so reads stay `&self`;
//! the sheet resets those slots transitively when an input changes.

use std::cell::RefCell;

use crate::error::Result;
use crate::formula::eval::{CellLookup, Value};
use crate::formula::Formula;
use crate::position::Position;

/// First character of formula input.
pub const FORMULA_PREFIX: char = '=';

/// A leading single-quote makes the rest literal text; `value()` strips it.
pub const ESCAPE_PREFIX: char = '\'';

/// What a cell holds.
#[derive(Debug)]
pub enum CellContent {
    Empty,
    Text(String),
    Formula {
        formula: Formula,
        cache: RefCell<Option<Value>>,
    },
}

impl CellContent {
    /// Classify raw input into a content variant.
    ///
    /// Empty input is Empty; input starting with `=` and at least two
    /// characters long is a formula (a lone `=` is text); anything else is
    /// text. Formula parse failures abort construction, leaving the caller
    /// free to discard the candidate without touching any state.
    pub fn from_input(text: &str) -> Result<Self> {
        if text.is_empty() {
            Ok(CellContent::Empty)
        } else if text.len() >= 2 && text.starts_with(FORMULA_PREFIX) {
            let formula = Formula::parse(&text[FORMULA_PREFIX.len_utf8()..])?;
            Ok(CellContent::Formula {
                formula,
                cache: RefCell::new(None),
            })
        } else {
            Ok(CellContent::Text(text.to_string()))
        }
    }

    /// Valid positions this content references.
    pub fn referenced_cells(&self) -> &[Position] {
        match self {
            CellContent::Empty | CellContent::Text(_) => &[],
            CellContent::Formula { formula, .. } => formula.referenced_cells(),
        }
    }
}

impl Default for CellContent {
    fn default() -> Self {
        CellContent::Empty
    }
}

/// One entry in the sheet.
///
/// The cell does not know its own position: the sheet's map key is the
/// single source of position truth, and the dependency graph tracks
/// adjacency by position.
#[derive(Debug, Default)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    /// Create an empty cell (also the auto-materialised placeholder).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// Install new content. The caller (the sheet's edit transaction) is
    /// responsible for rewiring adjacency and invalidating caches.
    pub(crate) fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }

    /// The cell's value as read by users and by other formulas.
    ///
    /// Formula cells return the memoised value when one is live, otherwise
    /// evaluate through `cells`, memoise, and return.
    pub fn value(&self, cells: &dyn CellLookup) -> Value {
        match &self.content {
            CellContent::Empty => Value::empty(),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_PREFIX) {
                Some(rest) => Value::Text(rest.to_string()),
                None => Value::Text(s.clone()),
            },
            CellContent::Formula { formula, cache } => {
                let cached = cache.borrow().clone();
                if let Some(value) = cached {
                    return value;
                }
                let value = formula.evaluate(cells);
                *cache.borrow_mut() = Some(value.clone());
                value
            }
        }
    }

    /// The cell's text form: raw content for text cells (escape prefix
    /// included), `=` plus the canonical expression for formula cells.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula { formula, .. } => {
                format!("{}{}", FORMULA_PREFIX, formula.expression())
            }
        }
    }

    /// Valid positions this cell's content references.
    pub fn referenced_cells(&self) -> &[Position] {
        self.content.referenced_cells()
    }

    /// True iff this is a formula cell with a live memoised value.
    pub fn has_cache(&self) -> bool {
        match &self.content {
            CellContent::Empty | CellContent::Text(_) => false,
            CellContent::Formula { cache, .. } => cache.borrow().is_some(),
        }
    }

    /// Drop the memoised value, if any. Idempotent.
    pub fn reset_cache(&self) {
        if let CellContent::Formula { cache, .. } = &self.content {
            cache.borrow_mut().take();
        }
    }
}
