//! Compressed column-major sparsity patterns.
//!
//! A [`Sparsity`] describes which entries of a 2-D matrix-shaped value are
//! structurally nonzero, independent of numeric content. Patterns are
//! immutable once constructed and shared across the expression graph via
//! `Arc`; all derived patterns (slices, unions, intersections) are new
//! values.
//!
//! Nonzeros are stored column-major: `colind` holds one start offset per
//! column (length `ncol + 1`, monotone non-decreasing) and `row` holds the
//! row index of each nonzero, strictly increasing within a column. The
//! numeric value buffers used elsewhere in the crate follow the same
//! ordering, so the nonzero index doubles as the storage index.

use std::ops::Range;

use crate::error::ConstructionError;

/// Immutable compressed column-major nonzero pattern.
///
/// Two patterns are structurally equal iff their dimensions and nonzero
/// coordinate sets match; since the storage is canonical, derived
/// `PartialEq` implements exactly that.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sparsity {
    nrow: usize,
    ncol: usize,
    colind: Vec<usize>,
    row: Vec<usize>,
}

impl Sparsity {
    /// Fully dense `nrow x ncol` pattern.
    pub fn dense(nrow: usize, ncol: usize) -> Self {
        let colind = (0..=ncol).map(|c| c * nrow).collect();
        let row = (0..ncol).flat_map(|_| 0..nrow).collect();
        Sparsity { nrow, ncol, colind, row }
    }

    /// `nrow x ncol` pattern with no nonzeros.
    pub fn empty(nrow: usize, ncol: usize) -> Self {
        Sparsity {
            nrow,
            ncol,
            colind: vec![0; ncol + 1],
            row: Vec::new(),
        }
    }

    /// `n x n` diagonal pattern.
    pub fn diag(n: usize) -> Self {
        Sparsity {
            nrow: n,
            ncol: n,
            colind: (0..=n).collect(),
            row: (0..n).collect(),
        }
    }

    /// Build a pattern from explicit `(row, col)` coordinates.
    ///
    /// The coordinates may be in any order; duplicates and out-of-bounds
    /// entries are rejected.
    pub fn from_triplets(
        nrow: usize,
        ncol: usize,
        entries: &[(usize, usize)],
    ) -> Result<Self, ConstructionError> {
        let mut sorted: Vec<(usize, usize)> = Vec::with_capacity(entries.len());
        for &(r, c) in entries {
            if r >= nrow {
                return Err(ConstructionError::OutOfBounds {
                    what: "triplet row",
                    index: r,
                    bound: nrow,
                });
            }
            if c >= ncol {
                return Err(ConstructionError::OutOfBounds {
                    what: "triplet column",
                    index: c,
                    bound: ncol,
                });
            }
            sorted.push((c, r));
        }
        sorted.sort_unstable();
        for w in sorted.windows(2) {
            if w[0] == w[1] {
                return Err(ConstructionError::DuplicateEntry {
                    row: w[0].1,
                    col: w[0].0,
                });
            }
        }

        let mut colind = vec![0usize; ncol + 1];
        let mut row = Vec::with_capacity(sorted.len());
        for &(c, r) in &sorted {
            colind[c + 1] += 1;
            row.push(r);
        }
        for c in 0..ncol {
            colind[c + 1] += colind[c];
        }
        Ok(Sparsity { nrow, ncol, colind, row })
    }

    /// Number of rows.
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    /// Number of entries, dense.
    pub fn numel(&self) -> usize {
        self.nrow * self.ncol
    }

    /// True if every entry is structurally nonzero.
    pub fn is_dense(&self) -> bool {
        self.nnz() == self.numel()
    }

    /// Column start offsets (length `ncol + 1`).
    pub fn colind(&self) -> &[usize] {
        &self.colind
    }

    /// Row index of each nonzero, column-major.
    pub fn row(&self) -> &[usize] {
        &self.row
    }

    /// Range of nonzero indices belonging to `col`.
    pub fn col_range(&self, col: usize) -> Range<usize> {
        assert!(col < self.ncol, "column {} out of bounds ({})", col, self.ncol);
        self.colind[col]..self.colind[col + 1]
    }

    /// Ordered row indices of the nonzeros in `col`.
    ///
    /// The iterator is finite and restartable: calling this again yields the
    /// same sequence.
    pub fn row_indices(&self, col: usize) -> impl Iterator<Item = usize> + '_ {
        self.row[self.col_range(col)].iter().copied()
    }

    /// Nonzero index of coordinate `(row, col)`, if structurally present.
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.nrow || col >= self.ncol {
            return None;
        }
        let range = self.col_range(col);
        let slice = &self.row[range.clone()];
        slice.binary_search(&row).ok().map(|i| range.start + i)
    }

    /// All nonzero coordinates as `(row, col)` pairs, column-major.
    pub fn to_triplets(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.nnz());
        for c in 0..self.ncol {
            for k in self.col_range(c) {
                out.push((self.row[k], c));
            }
        }
        out
    }

    /// Sub-block pattern for the coordinate ranges `rows x cols`.
    ///
    /// Returns the re-indexed pattern together with a map from each nonzero
    /// of the sub-block to its nonzero index in `self`.
    pub fn sub(
        &self,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<(Sparsity, Vec<usize>), ConstructionError> {
        if rows.start > rows.end || rows.end > self.nrow {
            return Err(ConstructionError::OutOfBounds {
                what: "row range",
                index: rows.end,
                bound: self.nrow,
            });
        }
        if cols.start > cols.end || cols.end > self.ncol {
            return Err(ConstructionError::OutOfBounds {
                what: "column range",
                index: cols.end,
                bound: self.ncol,
            });
        }

        let nrow = rows.end - rows.start;
        let ncol = cols.end - cols.start;
        let mut colind = vec![0usize; ncol + 1];
        let mut row = Vec::new();
        let mut map = Vec::new();
        for (local_c, c) in cols.clone().enumerate() {
            for k in self.col_range(c) {
                let r = self.row[k];
                if r >= rows.start && r < rows.end {
                    row.push(r - rows.start);
                    map.push(k);
                }
            }
            colind[local_c + 1] = row.len();
        }
        Ok((Sparsity { nrow, ncol, colind, row }, map))
    }

    /// Pattern of the `offset`-th diagonal as a column vector.
    ///
    /// `offset > 0` selects superdiagonals, `offset < 0` subdiagonals. The
    /// result has one row per diagonal slot, re-indexed from the start of
    /// the diagonal, plus the map back to nonzero indices in `self`.
    pub fn diagonal(&self, offset: isize) -> Result<(Sparsity, Vec<usize>), ConstructionError> {
        let (r0, c0) = if offset >= 0 {
            (0usize, offset as usize)
        } else {
            ((-offset) as usize, 0usize)
        };
        if c0 > self.ncol {
            return Err(ConstructionError::OutOfBounds {
                what: "diagonal offset",
                index: c0,
                bound: self.ncol,
            });
        }
        if r0 > self.nrow {
            return Err(ConstructionError::OutOfBounds {
                what: "diagonal offset",
                index: r0,
                bound: self.nrow,
            });
        }
        let len = (self.nrow - r0).min(self.ncol - c0);

        let mut entries = Vec::new();
        let mut map = Vec::new();
        for t in 0..len {
            if let Some(k) = self.index_of(r0 + t, c0 + t) {
                entries.push(t);
                map.push(k);
            }
        }
        let nnz = entries.len();
        Ok((
            Sparsity {
                nrow: len,
                ncol: 1,
                colind: vec![0, nnz],
                row: entries,
            },
            map,
        ))
    }

    /// Coordinate-wise union with a same-shape pattern.
    ///
    /// Returns the combined pattern and, per operand, a map from each of its
    /// nonzeros to the corresponding nonzero index in the result.
    pub fn union_with(
        &self,
        other: &Sparsity,
    ) -> Result<(Sparsity, Vec<usize>, Vec<usize>), ConstructionError> {
        self.check_same_shape(other, "union")?;

        let mut colind = vec![0usize; self.ncol + 1];
        let mut row = Vec::new();
        let mut map_a = vec![0usize; self.nnz()];
        let mut map_b = vec![0usize; other.nnz()];
        for c in 0..self.ncol {
            let mut ka = self.col_range(c);
            let mut kb = other.col_range(c);
            let mut a = ka.next();
            let mut b = kb.next();
            loop {
                match (a, b) {
                    (Some(i), Some(j)) => {
                        let (ra, rb) = (self.row[i], other.row[j]);
                        if ra < rb {
                            map_a[i] = row.len();
                            row.push(ra);
                            a = ka.next();
                        } else if rb < ra {
                            map_b[j] = row.len();
                            row.push(rb);
                            b = kb.next();
                        } else {
                            map_a[i] = row.len();
                            map_b[j] = row.len();
                            row.push(ra);
                            a = ka.next();
                            b = kb.next();
                        }
                    }
                    (Some(i), None) => {
                        map_a[i] = row.len();
                        row.push(self.row[i]);
                        a = ka.next();
                    }
                    (None, Some(j)) => {
                        map_b[j] = row.len();
                        row.push(other.row[j]);
                        b = kb.next();
                    }
                    (None, None) => break,
                }
            }
            colind[c + 1] = row.len();
        }
        Ok((
            Sparsity {
                nrow: self.nrow,
                ncol: self.ncol,
                colind,
                row,
            },
            map_a,
            map_b,
        ))
    }

    /// Coordinate-wise intersection with a same-shape pattern.
    ///
    /// Returns the combined pattern and, per result nonzero, the nonzero
    /// index it came from in each operand.
    pub fn intersect_with(
        &self,
        other: &Sparsity,
    ) -> Result<(Sparsity, Vec<usize>, Vec<usize>), ConstructionError> {
        self.check_same_shape(other, "intersection")?;

        let mut colind = vec![0usize; self.ncol + 1];
        let mut row = Vec::new();
        let mut map_a = Vec::new();
        let mut map_b = Vec::new();
        for c in 0..self.ncol {
            let mut ka = self.col_range(c);
            let mut kb = other.col_range(c);
            let mut a = ka.next();
            let mut b = kb.next();
            while let (Some(i), Some(j)) = (a, b) {
                let (ra, rb) = (self.row[i], other.row[j]);
                if ra < rb {
                    a = ka.next();
                } else if rb < ra {
                    b = kb.next();
                } else {
                    row.push(ra);
                    map_a.push(i);
                    map_b.push(j);
                    a = ka.next();
                    b = kb.next();
                }
            }
            colind[c + 1] = row.len();
        }
        Ok((
            Sparsity {
                nrow: self.nrow,
                ncol: self.ncol,
                colind,
                row,
            },
            map_a,
            map_b,
        ))
    }

    /// Concatenate patterns horizontally (same row count).
    pub(crate) fn horzcat(parts: &[&Sparsity]) -> Result<Sparsity, ConstructionError> {
        let nrow = parts.first().map_or(0, |p| p.nrow);
        let mut colind = vec![0usize];
        let mut row = Vec::new();
        let mut ncol = 0;
        for p in parts {
            if p.nrow != nrow {
                return Err(ConstructionError::ShapeMismatch {
                    what: "horizontal concatenation",
                    left: (nrow, ncol),
                    right: (p.nrow, p.ncol),
                });
            }
            for c in 0..p.ncol {
                row.extend(p.row_indices(c));
                colind.push(row.len());
            }
            ncol += p.ncol;
        }
        Ok(Sparsity { nrow, ncol, colind, row })
    }

    /// Stack single-column patterns vertically.
    pub(crate) fn vertcat(parts: &[&Sparsity]) -> Result<Sparsity, ConstructionError> {
        let mut nrow = 0;
        let mut row = Vec::new();
        for p in parts {
            if p.ncol != 1 {
                return Err(ConstructionError::NotAVector {
                    nrow: p.nrow,
                    ncol: p.ncol,
                });
            }
            row.extend(p.row.iter().map(|&r| r + nrow));
            nrow += p.nrow;
        }
        let nnz = row.len();
        Ok(Sparsity {
            nrow,
            ncol: 1,
            colind: vec![0, nnz],
            row,
        })
    }

    /// Place patterns as successive diagonal blocks.
    pub(crate) fn diagcat(parts: &[&Sparsity]) -> Sparsity {
        let mut nrow = 0;
        let mut ncol = 0;
        let mut colind = vec![0usize];
        let mut row = Vec::new();
        for p in parts {
            for c in 0..p.ncol {
                row.extend(p.row_indices(c).map(|r| r + nrow));
                colind.push(row.len());
            }
            nrow += p.nrow;
            ncol += p.ncol;
        }
        Sparsity { nrow, ncol, colind, row }
    }

    fn check_same_shape(
        &self,
        other: &Sparsity,
        what: &'static str,
    ) -> Result<(), ConstructionError> {
        if self.nrow != other.nrow || self.ncol != other.ncol {
            return Err(ConstructionError::ShapeMismatch {
                what,
                left: (self.nrow, self.ncol),
                right: (other.nrow, other.ncol),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_invariants() {
        let sp = Sparsity::dense(3, 4);
        assert_eq!(sp.nnz(), 12);
        assert_eq!(sp.colind().len(), 5);
        assert!(sp.is_dense());
        assert_eq!(sp.row_indices(2).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn from_triplets_rejects_duplicates() {
        let err = Sparsity::from_triplets(2, 2, &[(0, 0), (1, 1), (0, 0)]).unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateEntry { row: 0, col: 0 });
    }

    #[test]
    fn sub_reindexes_and_maps_back() {
        let sp = Sparsity::from_triplets(4, 4, &[(0, 0), (2, 1), (3, 1), (1, 3)]).unwrap();
        let (block, map) = sp.sub(2..4, 0..2).unwrap();
        assert_eq!(block.to_triplets(), vec![(0, 1), (1, 1)]);
        // Back-references into the parent's nonzero order.
        assert_eq!(map, vec![1, 2]);
    }

    #[test]
    fn diagonal_slice_offsets() {
        let sp = Sparsity::from_triplets(3, 3, &[(0, 0), (1, 1), (0, 1), (1, 2)]).unwrap();
        let (main, map) = sp.diagonal(0).unwrap();
        assert_eq!(main.to_triplets(), vec![(0, 0), (1, 0)]);
        assert_eq!(map, vec![0, 2]);

        let (upper, map) = sp.diagonal(1).unwrap();
        assert_eq!(upper.to_triplets(), vec![(0, 0), (1, 0)]);
        assert_eq!(map, vec![1, 3]);

        let (lower, _) = sp.diagonal(-1).unwrap();
        assert_eq!(lower.nnz(), 0);
    }

    #[test]
    fn intersect_maps_point_into_operands() {
        let a = Sparsity::from_triplets(3, 1, &[(0, 0), (2, 0)]).unwrap();
        let b = Sparsity::from_triplets(3, 1, &[(1, 0), (2, 0)]).unwrap();
        let (i, map_a, map_b) = a.intersect_with(&b).unwrap();
        assert_eq!(i.row(), &[2]);
        assert_eq!(map_a, vec![1]);
        assert_eq!(map_b, vec![1]);
    }

    #[test]
    fn union_maps_are_consistent() {
        let a = Sparsity::from_triplets(3, 1, &[(0, 0), (2, 0)]).unwrap();
        let b = Sparsity::from_triplets(3, 1, &[(1, 0), (2, 0)]).unwrap();
        let (u, map_a, map_b) = a.union_with(&b).unwrap();
        assert_eq!(u.nnz(), 3);
        assert_eq!(u.row(), &[0, 1, 2]);
        assert_eq!(map_a, vec![0, 2]);
        assert_eq!(map_b, vec![1, 2]);
    }
}
