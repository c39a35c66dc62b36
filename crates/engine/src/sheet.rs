//! The sheet: sparse cell storage, the edit transaction, and printing.
//!
//! The sheet owns every cell. Dependency edges are positions in the
//! [`DepGraph`], resolved back to live cells at traversal time, so the
//! graph never holds references into the cell arena.
//!
//! # Edit transaction
//!
//! `set_cell` runs in a fixed order: build the candidate content (parsing
//! formulas) → materialise placeholders for referenced cells → cycle check
//! against the committed graph → commit the content → rewire adjacency →
//! invalidate caches transitively. A failure before the commit leaves the
//! sheet unchanged, except that placeholders may persist (they are Empty,
//! harmless, and reclaimable through `clear_cell`).

use std::io::{self, Write};

use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellContent};
use crate::dep_graph::DepGraph;
use crate::error::{EngineError, Result};
use crate::formula::eval::{CellLookup, Value};
use crate::position::{Position, Size};

#[derive(Debug, Default)]
pub struct Sheet {
    cells: FxHashMap<Position, Cell>,
    deps: DepGraph,
}

impl CellLookup for Sheet {
    fn cell_value(&self, pos: Position) -> Option<Value> {
        self.cells.get(&pos).map(|cell| cell.value(self))
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content of the cell at `pos` from raw input.
    ///
    /// Rejected edits (`FormulaSyntax`, `CircularDependency`) are no-ops:
    /// the pre-call state is preserved.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<()> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }

        // Build the candidate fully before touching any state.
        let content = CellContent::from_input(text)?;
        let refs: Vec<Position> = content.referenced_cells().to_vec();

        // Materialise a placeholder for each referenced cell so the graph
        // has a stable node per neighbour. These survive a rejected edit.
        for &p in &refs {
            self.cells.entry(p).or_default();
        }

        if self.deps.would_create_cycle(pos, &refs) {
            return Err(EngineError::CircularDependency(pos));
        }

        self.cells.entry(pos).or_default().set_content(content);
        self.deps.replace_edges(pos, refs.into_iter().collect());
        self.reset_cache_transitive(pos);

        Ok(())
    }

    /// Clear the cell at `pos`.
    ///
    /// The cell is dropped unless other cells still reference it, in which
    /// case it is retained as Empty so dangling formulas keep a stable
    /// node to link against.
    pub fn clear_cell(&mut self, pos: Position) -> Result<()> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }

        if self.cells.contains_key(&pos) {
            self.set_cell(pos, "")?;
            if !self.deps.is_referenced(pos) {
                self.cells.remove(&pos);
            }
        }

        Ok(())
    }

    /// Shared cell lookup.
    ///
    /// Compatibility quirk, preserved deliberately: a live cell whose text
    /// is empty reads as absent here. `cell_mut` and `concrete_cell` do
    /// not apply the rewrite.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }
        Ok(self.cells.get(&pos).filter(|cell| !cell.text().is_empty()))
    }

    /// Mutable cell lookup.
    pub fn cell_mut(&mut self, pos: Position) -> Result<Option<&mut Cell>> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }
        Ok(self.cells.get_mut(&pos))
    }

    /// Owning-cell lookup: never applies the empty-text rewrite. This is
    /// the lookup the dependency graph and the evaluator go through.
    pub fn concrete_cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// The value of the cell at `pos`; empty when no cell is there.
    pub fn value(&self, pos: Position) -> Result<Value> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }
        Ok(self.cell_value(pos).unwrap_or_default())
    }

    /// The text of the cell at `pos`; empty when no cell is there.
    pub fn text(&self, pos: Position) -> Result<String> {
        if !pos.is_valid() {
            return Err(EngineError::InvalidPosition(pos));
        }
        Ok(self
            .cells
            .get(&pos)
            .map(|cell| cell.text())
            .unwrap_or_default())
    }

    /// The dependency graph (read-only).
    pub fn dep_graph(&self) -> &DepGraph {
        &self.deps
    }

    /// Tight bounding box around every cell with non-empty text.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for (pos, cell) in &self.cells {
            if !cell.text().is_empty() {
                size.rows = size.rows.max(pos.row + 1);
                size.cols = size.cols.max(pos.col + 1);
            }
        }
        size
    }

    /// Print the printable area as evaluated values, tab-separated columns
    /// and newline-terminated rows. Missing and empty cells contribute an
    /// empty field.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |cell| cell.value(self).to_string())
    }

    /// Print the printable area as raw cell text (escape prefixes and
    /// formula prefixes included, formula text canonicalised).
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |cell| cell.text())
    }

    fn print_with<W: Write>(
        &self,
        out: &mut W,
        render: impl Fn(&Cell) -> String,
    ) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    out.write_all(render(cell).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Force-reset the cache at `start`, then walk dependents, resetting
    /// until a cell with an already-empty cache terminates the branch.
    /// Sound because the committed graph is acyclic.
    fn reset_cache_transitive(&self, start: Position) {
        let mut stack = vec![(start, true)];
        while let Some((pos, force)) = stack.pop() {
            if let Some(cell) = self.cells.get(&pos) {
                if force || cell.has_cache() {
                    cell.reset_cache();
                    stack.extend(self.deps.dependents(pos).map(|dep| (dep, false)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::eval::FormulaError;
    use crate::position::{MAX_COLS, MAX_ROWS};

    fn pos(a1: &str) -> Position {
        a1.parse().unwrap()
    }

    fn sheet_with(entries: &[(&str, &str)]) -> Sheet {
        let mut sheet = Sheet::new();
        for (at, text) in entries {
            sheet.set_cell(pos(at), text).unwrap();
        }
        sheet
    }

    fn values_dump(sheet: &Sheet) -> String {
        let mut out = Vec::new();
        sheet.print_values(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn texts_dump(sheet: &Sheet) -> String {
        let mut out = Vec::new();
        sheet.print_texts(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Every formula cell with a live memo must agree with a fresh
    /// evaluation (cache soundness).
    fn assert_caches_sound(sheet: &Sheet) {
        let positions: Vec<Position> = sheet.cells.keys().copied().collect();
        for p in positions {
            let cell = sheet.concrete_cell(p).unwrap();
            if cell.has_cache() {
                let cached = cell.value(sheet);
                cell.reset_cache();
                assert_eq!(cell.value(sheet), cached, "stale cache at {}", p);
            }
        }
    }

    #[test]
    fn test_set_and_read_back() {
        let sheet = sheet_with(&[("A1", "2"), ("B1", "hello")]);

        assert_eq!(sheet.text(pos("A1")).unwrap(), "2");
        assert_eq!(sheet.value(pos("A1")).unwrap(), Value::Text("2".to_string()));
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Text("hello".to_string()));
        assert_eq!(sheet.value(pos("Z9")).unwrap(), Value::empty());
        assert_eq!(sheet.text(pos("Z9")).unwrap(), "");
    }

    #[test]
    fn test_invalid_position_rejected_everywhere() {
        let mut sheet = Sheet::new();
        let bad = Position::new(MAX_ROWS, 0);

        assert_eq!(
            sheet.set_cell(bad, "1"),
            Err(EngineError::InvalidPosition(bad))
        );
        assert_eq!(sheet.clear_cell(bad), Err(EngineError::InvalidPosition(bad)));
        assert!(sheet.cell(bad).is_err());
        assert!(sheet.cell_mut(bad).is_err());
        assert!(sheet.value(bad).is_err());
        assert!(sheet.text(bad).is_err());
    }

    #[test]
    fn test_text_plus_formula_sum() {
        // SetCell(A1, "2"); SetCell(A2, "=A1+3") => value(A2) = 5.0
        let mut sheet = sheet_with(&[("A1", "2"), ("A2", "=A1+3")]);
        assert_eq!(sheet.value(pos("A2")).unwrap(), Value::Number(5.0));

        // Then SetCell(A1, "7") => value(A2) = 10.0
        sheet.set_cell(pos("A1"), "7").unwrap();
        assert_eq!(sheet.value(pos("A2")).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_text_coercion_failure() {
        let sheet = sheet_with(&[("B1", "abc"), ("B2", "=B1+1")]);
        assert_eq!(
            sheet.value(pos("B2")).unwrap(),
            Value::Error(FormulaError::Value)
        );
    }

    #[test]
    fn test_empty_cell_coerces_to_zero_and_is_materialised() {
        let sheet = sheet_with(&[("C1", "=C2+4")]);

        assert_eq!(sheet.value(pos("C1")).unwrap(), Value::Number(4.0));

        // The referenced cell exists as an Empty placeholder...
        let placeholder = sheet.concrete_cell(pos("C2")).expect("placeholder missing");
        assert!(placeholder.is_empty());
        // ...though the shared lookup hides it (empty-text quirk).
        assert!(sheet.cell(pos("C2")).unwrap().is_none());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut sheet = sheet_with(&[("D1", "=D2")]);

        assert_eq!(
            sheet.set_cell(pos("D2"), "=D1"),
            Err(EngineError::CircularDependency(pos("D2")))
        );
        assert_eq!(sheet.text(pos("D2")).unwrap(), "");
        assert_eq!(sheet.value(pos("D1")).unwrap(), Value::Number(0.0));
        sheet.dep_graph().assert_consistent();
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut sheet = Sheet::new();
        assert_eq!(
            sheet.set_cell(pos("E1"), "=E1"),
            Err(EngineError::CircularDependency(pos("E1")))
        );
        assert_eq!(sheet.text(pos("E1")).unwrap(), "");

        // With prior content the rejection must preserve it.
        sheet.set_cell(pos("E1"), "5").unwrap();
        assert_eq!(
            sheet.set_cell(pos("E1"), "=E1"),
            Err(EngineError::CircularDependency(pos("E1")))
        );
        assert_eq!(sheet.text(pos("E1")).unwrap(), "5");
    }

    #[test]
    fn test_longer_cycle_rejected() {
        let mut sheet = sheet_with(&[("A1", "=B1"), ("B1", "=C1")]);
        assert_eq!(
            sheet.set_cell(pos("C1"), "=A1"),
            Err(EngineError::CircularDependency(pos("C1")))
        );
        assert_eq!(sheet.text(pos("C1")).unwrap(), "");
        sheet.dep_graph().assert_consistent();
    }

    #[test]
    fn test_rejection_preserves_previous_formula() {
        let mut sheet = sheet_with(&[("A1", "=B1+1"), ("B1", "2")]);

        assert_eq!(
            sheet.set_cell(pos("A1"), "=A1"),
            Err(EngineError::CircularDependency(pos("A1")))
        );
        assert_eq!(sheet.text(pos("A1")).unwrap(), "=B1+1");
        assert_eq!(sheet.value(pos("A1")).unwrap(), Value::Number(3.0));

        assert!(matches!(
            sheet.set_cell(pos("A1"), "=1+"),
            Err(EngineError::FormulaSyntax(_))
        ));
        assert_eq!(sheet.text(pos("A1")).unwrap(), "=B1+1");
    }

    #[test]
    fn test_placeholders_persist_after_rejected_edit() {
        let mut sheet = sheet_with(&[("A1", "=B1")]);

        assert!(sheet.set_cell(pos("B1"), "=A1+F5").is_err());

        // F5 was materialised in step 2 and deliberately survives.
        assert!(sheet.concrete_cell(pos("F5")).is_some());
        assert!(sheet.concrete_cell(pos("F5")).unwrap().is_empty());

        // It is unreferenced, so clear_cell reclaims it.
        sheet.clear_cell(pos("F5")).unwrap();
        assert!(sheet.concrete_cell(pos("F5")).is_none());
    }

    #[test]
    fn test_escape_prefix_in_print() {
        let sheet = sheet_with(&[("A1", "'hello")]);

        assert_eq!(sheet.printable_size(), Size::new(1, 1));
        assert_eq!(values_dump(&sheet), "hello\n");
        assert_eq!(texts_dump(&sheet), "'hello\n");
    }

    #[test]
    fn test_print_grid_layout() {
        let sheet = sheet_with(&[("A1", "1"), ("C1", "3"), ("B2", "=A1+1")]);

        assert_eq!(sheet.printable_size(), Size::new(2, 3));
        assert_eq!(values_dump(&sheet), "1\t\t3\n\t2\t\n");
        assert_eq!(texts_dump(&sheet), "1\t\t3\n\t=A1+1\t\n");
    }

    #[test]
    fn test_print_renders_errors_and_canonical_formulas() {
        let sheet = sheet_with(&[("A1", "=1/0"), ("B1", "=(1+2)*2")]);

        assert_eq!(values_dump(&sheet), "#DIV/0!\t6\n");
        assert_eq!(texts_dump(&sheet), "=1/0\t=(1+2)*2\n");
    }

    #[test]
    fn test_printable_size_shrinks_on_clear() {
        let mut sheet = sheet_with(&[("B2", "x")]);
        assert_eq!(sheet.printable_size(), Size::new(2, 2));

        sheet.clear_cell(pos("B2")).unwrap();
        assert_eq!(sheet.printable_size(), Size::new(0, 0));
        assert_eq!(values_dump(&sheet), "");
    }

    #[test]
    fn test_placeholders_do_not_stretch_printable_area() {
        let sheet = sheet_with(&[("A1", "=Z99+1")]);
        assert_eq!(sheet.printable_size(), Size::new(1, 1));
    }

    #[test]
    fn test_clear_cell_is_idempotent() {
        let mut sheet = sheet_with(&[("A1", "x")]);
        sheet.clear_cell(pos("A1")).unwrap();
        sheet.clear_cell(pos("A1")).unwrap();
        assert!(sheet.concrete_cell(pos("A1")).is_none());

        // Clearing a never-set cell is fine too.
        sheet.clear_cell(pos("Q9")).unwrap();
    }

    #[test]
    fn test_clear_retains_referenced_cell() {
        let mut sheet = sheet_with(&[("A1", "5"), ("B1", "=A1*2")]);
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(10.0));

        sheet.clear_cell(pos("A1")).unwrap();

        // A1 is still referenced by B1, so it survives as Empty.
        assert!(sheet.concrete_cell(pos("A1")).is_some());
        assert!(sheet.concrete_cell(pos("A1")).unwrap().is_empty());
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(0.0));

        // Dropping B1 releases the last reference; A1 becomes collectable.
        sheet.clear_cell(pos("B1")).unwrap();
        assert!(sheet.concrete_cell(pos("B1")).is_none());
        sheet.clear_cell(pos("A1")).unwrap();
        assert!(sheet.concrete_cell(pos("A1")).is_none());
        sheet.dep_graph().assert_consistent();
    }

    #[test]
    fn test_set_text_roundtrip_is_noop() {
        let mut sheet = sheet_with(&[("A1", "2"), ("A2", "= A1 + 3")]);

        let text = sheet.text(pos("A2")).unwrap();
        assert_eq!(text, "=A1+3");
        sheet.set_cell(pos("A2"), &text).unwrap();

        assert_eq!(sheet.text(pos("A2")).unwrap(), text);
        assert_eq!(sheet.value(pos("A2")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_cache_invalidation_is_transitive() {
        let mut sheet = sheet_with(&[("A1", "1"), ("B1", "=A1+1"), ("C1", "=B1+1")]);

        assert_eq!(sheet.value(pos("C1")).unwrap(), Value::Number(3.0));
        assert!(sheet.concrete_cell(pos("B1")).unwrap().has_cache());
        assert!(sheet.concrete_cell(pos("C1")).unwrap().has_cache());

        sheet.set_cell(pos("A1"), "10").unwrap();

        assert!(!sheet.concrete_cell(pos("B1")).unwrap().has_cache());
        assert!(!sheet.concrete_cell(pos("C1")).unwrap().has_cache());
        assert_eq!(sheet.value(pos("C1")).unwrap(), Value::Number(12.0));
        assert_caches_sound(&sheet);
    }

    #[test]
    fn test_cache_invalidation_through_diamond() {
        let mut sheet = sheet_with(&[
            ("A1", "1"),
            ("B1", "=A1+1"),
            ("B2", "=A1*2"),
            ("C1", "=B1+B2"),
        ]);

        assert_eq!(sheet.value(pos("C1")).unwrap(), Value::Number(4.0));

        sheet.set_cell(pos("A1"), "3").unwrap();
        assert_eq!(sheet.value(pos("C1")).unwrap(), Value::Number(10.0));
        assert_caches_sound(&sheet);
    }

    #[test]
    fn test_rewiring_detaches_old_precedent() {
        let mut sheet = sheet_with(&[("A1", "1"), ("C1", "4"), ("B1", "=A1")]);
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(1.0));

        sheet.set_cell(pos("B1"), "=C1").unwrap();
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(4.0));

        // Edits to the abandoned precedent no longer reach B1.
        sheet.set_cell(pos("A1"), "100").unwrap();
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(4.0));

        sheet.set_cell(pos("C1"), "7").unwrap();
        assert_eq!(sheet.value(pos("B1")).unwrap(), Value::Number(7.0));
        sheet.dep_graph().assert_consistent();
    }

    #[test]
    fn test_error_propagates_through_dependents() {
        let sheet = sheet_with(&[("A1", "=1/0"), ("B1", "=A1+1"), ("C1", "=B1*2")]);

        assert_eq!(
            sheet.value(pos("C1")).unwrap(),
            Value::Error(FormulaError::Div0)
        );
    }

    #[test]
    fn test_out_of_grid_reference_is_ref_error() {
        let sheet = sheet_with(&[("A1", "=ZZZZZ1+1")]);
        assert_eq!(
            sheet.value(pos("A1")).unwrap(),
            Value::Error(FormulaError::Ref)
        );
    }

    #[test]
    fn test_max_boundary_write() {
        let corner = Position::new(MAX_ROWS - 1, MAX_COLS - 1);
        let mut sheet = Sheet::new();
        sheet.set_cell(corner, "42").unwrap();

        assert_eq!(sheet.text(corner).unwrap(), "42");
        assert_eq!(sheet.printable_size(), Size::new(MAX_ROWS, MAX_COLS));

        sheet.clear_cell(corner).unwrap();
        assert_eq!(sheet.printable_size(), Size::new(0, 0));
    }

    #[test]
    fn test_quirk_shared_lookup_hides_empty_cells() {
        let mut sheet = sheet_with(&[("A1", "x"), ("B1", "=A1")]);
        sheet.clear_cell(pos("A1")).unwrap();

        // A1 lives on (B1 references it) but the shared lookup hides it.
        assert!(sheet.cell(pos("A1")).unwrap().is_none());
        assert!(sheet.concrete_cell(pos("A1")).is_some());
        assert!(sheet.cell_mut(pos("A1")).unwrap().is_some());

        // Cells with text are visible through every lookup.
        assert!(sheet.cell(pos("B1")).unwrap().is_some());
    }

    #[test]
    fn test_formula_over_formula_chain() {
        let mut sheet = sheet_with(&[
            ("A1", "2"),
            ("A2", "=A1*A1"),
            ("A3", "=A2*A2"),
            ("A4", "=A3+A2+A1"),
        ]);

        assert_eq!(sheet.value(pos("A4")).unwrap(), Value::Number(22.0));

        sheet.set_cell(pos("A1"), "3").unwrap();
        assert_eq!(sheet.value(pos("A4")).unwrap(), Value::Number(93.0));
        assert_caches_sound(&sheet);
        sheet.dep_graph().assert_consistent();
    }

    #[test]
    fn test_overwriting_formula_with_text_drops_edges() {
        let mut sheet = sheet_with(&[("A1", "1"), ("B1", "=A1")]);

        sheet.set_cell(pos("B1"), "plain").unwrap();
        sheet.dep_graph().assert_consistent();
        assert_eq!(sheet.dep_graph().dependents(pos("A1")).count(), 0);

        // A former cycle partner is edit-able again.
        sheet.set_cell(pos("A1"), "=B1").unwrap();
        assert_eq!(
            sheet.value(pos("A1")).unwrap(),
            Value::Error(FormulaError::Value)
        );
    }
}
