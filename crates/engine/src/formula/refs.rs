//! Reference extraction from a formula AST.

use rustc_hash::FxHashSet;

use crate::position::Position;

use super::parser::Expr;

/// Extract the positions an expression references.
///
/// Returns a deduplicated, row-major sorted list of the *valid* positions.
/// Out-of-grid references are dropped here — the dependency graph has no
/// node to link them to — but they still surface as `#REF!` when the
/// expression is evaluated.
pub fn referenced_positions(expr: &Expr) -> Vec<Position> {
    let mut refs = FxHashSet::default();
    collect_refs(expr, &mut refs);

    let mut positions: Vec<Position> = refs.into_iter().filter(Position::is_valid).collect();
    positions.sort();
    positions
}

fn collect_refs(expr: &Expr, refs: &mut FxHashSet<Position>) {
    match expr {
        Expr::Number(_) => {}
        Expr::CellRef(pos) => {
            refs.insert(*pos);
        }
        Expr::UnaryOp { operand, .. } => collect_refs(operand, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, refs);
            collect_refs(right, refs);
        }
    }
}
