//! Geometry of the split/concat node family.
//!
//! A split partitions the nonzeros of one value into N consecutive blocks
//! along one axis (or both, for diagonal blocks); a concat is its inverse.
//! This module validates offset lists, derives per-output sparsity by
//! slicing the input pattern, and builds the nonzero assignment map that
//! numeric evaluation, AD, and sparsity propagation all share.

use std::ops::Range;

use crate::error::ConstructionError;
use crate::float::Float;
use crate::node::Op;
use crate::sparsity::Sparsity;

/// Check that `offsets` is strictly increasing and spans exactly `[0, dim]`.
pub(crate) fn check_offsets(
    what: &'static str,
    offsets: &[usize],
    dim: usize,
) -> Result<(), ConstructionError> {
    let invalid = || ConstructionError::InvalidOffsets {
        what,
        offsets: offsets.to_vec(),
        dim,
    };
    if offsets.len() < 2 || offsets[0] != 0 || *offsets.last().unwrap() != dim {
        return Err(invalid());
    }
    if offsets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid());
    }
    Ok(())
}

/// Coordinate ranges `(rows, cols)` of each output block of a split node.
pub(crate) fn blocks<F: Float>(op: &Op<F>, input: &Sparsity) -> Vec<(Range<usize>, Range<usize>)> {
    match op {
        Op::HorzSplit { offsets } => offsets
            .windows(2)
            .map(|w| (0..input.nrow(), w[0]..w[1]))
            .collect(),
        Op::VertSplit { offsets } => offsets
            .windows(2)
            .map(|w| (w[0]..w[1], 0..1))
            .collect(),
        Op::DiagSplit { row_offsets, col_offsets } => row_offsets
            .windows(2)
            .zip(col_offsets.windows(2))
            .map(|(r, c)| (r[0]..r[1], c[0]..c[1]))
            .collect(),
        _ => unreachable!("blocks() called on a non-split node"),
    }
}

/// Per-output sparsity patterns of a split node.
pub(crate) fn output_patterns<F: Float>(
    op: &Op<F>,
    input: &Sparsity,
) -> Result<Vec<Sparsity>, ConstructionError> {
    blocks(op, input)
        .into_iter()
        .map(|(rows, cols)| input.sub(rows, cols).map(|(sp, _)| sp))
        .collect()
}

/// Map each input nonzero to `(output index, nonzero index within that
/// output)`, or `None` if the nonzero is dropped (off-diagonal entries of a
/// diagonal split).
///
/// For horizontal and vertical splits the map is a partition: every input
/// nonzero lands in exactly one output, preserving relative order.
pub(crate) fn nz_assignment<F: Float>(
    op: &Op<F>,
    input: &Sparsity,
) -> Result<Vec<Option<(usize, usize)>>, ConstructionError> {
    let mut assign = vec![None; input.nnz()];
    for (oind, (rows, cols)) in blocks(op, input).into_iter().enumerate() {
        let (_, map) = input.sub(rows, cols)?;
        for (local, source) in map.into_iter().enumerate() {
            debug_assert!(assign[source].is_none(), "split blocks must not overlap");
            assign[source] = Some((oind, local));
        }
    }
    Ok(assign)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_must_span_dimension() {
        assert!(check_offsets("horzsplit", &[0, 2, 5], 5).is_ok());
        assert!(check_offsets("horzsplit", &[0, 2], 5).is_err());
        assert!(check_offsets("horzsplit", &[1, 5], 5).is_err());
        assert!(check_offsets("horzsplit", &[0, 3, 3, 5], 5).is_err());
        assert!(check_offsets("horzsplit", &[0], 0).is_err());
    }

    #[test]
    fn horzsplit_assignment_is_a_partition() {
        let sp = Sparsity::dense(2, 5);
        let op = Op::<f64>::HorzSplit { offsets: vec![0, 2, 5] };
        let assign = nz_assignment(&op, &sp).unwrap();
        assert!(assign.iter().all(|a| a.is_some()));
        let in_first = assign.iter().filter(|a| matches!(a, Some((0, _)))).count();
        assert_eq!(in_first, 4);
    }
}
