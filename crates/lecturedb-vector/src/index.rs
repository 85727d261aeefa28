//! Exact brute-force L2 index.
//!
//! Every query scans all rows, O(N·D). Any replacement behind [`VectorIndex`]
//! must keep the same ordering and tie-break rules.

use std::cmp::Ordering;

use lecturedb_core::traits::VectorIndex;
use lecturedb_core::types::{Embedding, Neighbor};
use lecturedb_core::{Error, Result};

/// Rows are stored contiguously, row `i` at `data[i * dim..(i + 1) * dim]`.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// A zero dimension is a configuration error: every row would be empty
    /// and the row count could not be recovered from the data.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Configuration("vector dimension must be positive".into()));
        }
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        self.data.get(i * self.dim..(i + 1) * self.dim)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Ascending distance, then ascending row.
fn by_distance_then_row(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row))
}

impl VectorIndex for FlatL2Index {
    fn dim(&self) -> usize { self.dim }

    fn len(&self) -> usize { self.data.len() / self.dim }

    fn add(&mut self, vectors: &[Embedding]) -> Result<()> {
        // Validate the whole batch first so a bad row leaves the index untouched.
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        self.data.reserve(vectors.len() * self.dim);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        let mut hits: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(row, v)| Neighbor { row, distance: squared_l2(query, v) })
            .collect();
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance_then_row);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_distance_then_row);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rows at squared distances [5, 1, 3, 1] from the origin.
    fn fixture() -> FlatL2Index {
        let mut index = FlatL2Index::new(3).unwrap();
        index
            .add(&[vec![2.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 1.0]])
            .unwrap();
        index
    }

    #[test]
    fn top_k_ascending_with_row_tie_break() {
        let hits = fixture().search(&[0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits, vec![Neighbor { row: 1, distance: 1.0 }, Neighbor { row: 3, distance: 1.0 }]);
    }

    #[test]
    fn k_larger_than_rows_returns_all_sorted() {
        let rows: Vec<usize> = fixture().search(&[0.0; 3], 10).unwrap().iter().map(|n| n.row).collect();
        assert_eq!(rows, [1, 3, 2, 0]);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatL2Index::new(3).unwrap();
        for k in [0, 1, 5] {
            assert!(index.search(&[1.0, 2.0, 3.0], k).unwrap().is_empty());
        }
        // The query is not even inspected when there is nothing to compare against.
        assert!(index.search(&[1.0], 1).unwrap().is_empty());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(FlatL2Index::new(0), Err(Error::Configuration(_))));
    }

    #[test]
    fn zero_k_returns_nothing() {
        assert!(fixture().search(&[0.0; 3], 0).unwrap().is_empty());
    }

    #[test]
    fn add_rejects_wrong_dimension_without_partial_append() {
        let mut index = fixture();
        let err = index.add(&[vec![0.0; 3], vec![0.0; 4]]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 4 }));
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn query_dimension_is_checked() {
        let err = fixture().search(&[0.0; 2], 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn rows_keep_insertion_order() {
        let index = fixture();
        assert_eq!(index.row(2), Some(&[1.0, 1.0, 1.0][..]));
        assert_eq!(index.row(4), None);
        assert_eq!(squared_l2(index.row(0).unwrap(), &[0.0; 3]), 5.0);
    }
}
