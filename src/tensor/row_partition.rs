use core::ops::Range;

use crate::alloc::{format, Arc, String, Vec};
use crate::tensor::IndexType;
use crate::{Error, Result};

/// Describes how a flat sequence of `nvals` values is partitioned into `nrows` contiguous rows.
///
/// The partition is encoded by its row splits: `nrows + 1` non-decreasing offsets starting at zero, where row `i`
/// spans the values `row_splits[i]..row_splits[i + 1]`. A partition created with
/// [`from_uniform_row_length`](RowPartition::from_uniform_row_length) additionally carries its precomputed row
/// length, and only such partitions are considered uniform. Partitions whose splits merely happen to be evenly
/// spaced are not.
///
/// Equality compares the row splits and the index type, not whether the row length was precomputed.
#[derive(Clone, Debug)]
pub struct RowPartition {
    row_splits: Arc<[usize]>,
    uniform_row_length: Option<usize>,
    dtype: IndexType,
}
impl RowPartition {
    /// Create a partition from its row splits.
    ///
    /// # Errors
    ///
    /// Fails if the splits are empty, do not start with zero or are decreasing.
    pub fn from_row_splits(row_splits: impl Into<Vec<usize>>) -> Result<Self> {
        let row_splits = row_splits.into();
        if row_splits.first() != Some(&0) {
            return Err(Error::InvalidArgument(format!(
                "row_splits must be non-empty and start with zero, got {row_splits:?}"
            )));
        }
        if row_splits.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidArgument(format!(
                "row_splits must be sorted in ascending order, got {row_splits:?}"
            )));
        }
        Ok(Self {
            row_splits: row_splits.into(),
            uniform_row_length: None,
            dtype: IndexType::default(),
        })
    }

    /// Create a partition from the lengths of its rows.
    pub fn from_row_lengths(row_lengths: &[usize]) -> Self {
        let mut row_splits = Vec::with_capacity(row_lengths.len() + 1);
        row_splits.push(0);
        let mut offset = 0;
        for len in row_lengths {
            offset += len;
            row_splits.push(offset);
        }
        Self {
            row_splits: row_splits.into(),
            uniform_row_length: None,
            dtype: IndexType::default(),
        }
    }

    /// Create a uniform partition where every row has `uniform_row_length` values.
    ///
    /// If `nrows` is `None` it is computed as `nvals / uniform_row_length`, or zero for a zero row length.
    ///
    /// # Errors
    ///
    /// Fails if `nrows * uniform_row_length != nvals`.
    pub fn from_uniform_row_length(
        uniform_row_length: usize,
        nvals: usize,
        nrows: Option<usize>,
    ) -> Result<Self> {
        let nrows = match nrows {
            Some(nrows) => nrows,
            None if uniform_row_length == 0 => 0,
            None => nvals / uniform_row_length,
        };
        if nrows.checked_mul(uniform_row_length) != Some(nvals) {
            return Err(Error::InvalidArgument(format!(
                "Can not partition {nvals} values into {nrows} rows of length {uniform_row_length}"
            )));
        }
        Ok(Self {
            row_splits: (0..=nrows).map(|i| i * uniform_row_length).collect(),
            uniform_row_length: Some(uniform_row_length),
            dtype: IndexType::default(),
        })
    }

    /// Create the uniform partitions describing the first `rank` dimensions of a dense shape.
    ///
    /// Returns `rank - 1` partitions, the `i`-th partitioning the `shape[0] * ... * shape[i + 1]` values of
    /// dimension `i + 1` into rows of length `shape[i + 1]`.
    ///
    /// # Errors
    ///
    /// Fails if `shape` has less than `rank` dimensions or if the number of values does not fit `dtype`.
    pub fn for_uniform_shape(shape: &[usize], rank: usize, dtype: IndexType) -> Result<Vec<Self>> {
        if shape.len() < rank {
            return Err(Error::InvalidArgument(format!(
                "Shape {shape:?} must have rank at least {rank}"
            )));
        }
        let mut nrows = shape.first().copied().unwrap_or(1);
        let mut partitions = Vec::with_capacity(rank.saturating_sub(1));
        for &len in shape.iter().take(rank).skip(1) {
            let nvals = nrows * len;
            partitions.push(Self::from_uniform_row_length(len, nvals, Some(nrows))?.with_dtype(dtype)?);
            nrows = nvals;
        }
        Ok(partitions)
    }

    /// Returns the same partition with a different index type.
    ///
    /// # Errors
    ///
    /// Fails if the number of values does not fit in `dtype`.
    pub fn with_dtype(&self, dtype: IndexType) -> Result<Self> {
        if self.nvals() > dtype.max_value() {
            return Err(Error::InvalidArgument(format!(
                "Row partition with {} values does not fit index type {dtype}",
                self.nvals()
            )));
        }
        Ok(Self {
            dtype,
            ..self.clone()
        })
    }

    /// The index type.
    pub fn dtype(&self) -> IndexType {
        self.dtype
    }

    /// The number of rows.
    pub fn nrows(&self) -> usize {
        self.row_splits.len() - 1
    }

    /// The number of partitioned values.
    pub fn nvals(&self) -> usize {
        self.row_splits.last().copied().unwrap_or(0)
    }

    /// The row splits, `nrows + 1` offsets.
    pub fn row_splits(&self) -> &[usize] {
        &self.row_splits
    }

    /// The length of each row.
    pub fn row_lengths(&self) -> Vec<usize> {
        self.row_splits.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The range of values spanned by a row.
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_splits[row]..self.row_splits[row + 1]
    }

    /// The precomputed row length of a uniform partition.
    pub fn uniform_row_length(&self) -> Option<usize> {
        self.uniform_row_length
    }

    /// Check if the partition was created with a precomputed uniform row length.
    pub fn is_uniform(&self) -> bool {
        self.uniform_row_length.is_some()
    }

    /// Check if the two partitions split values into the same rows.
    pub fn is_row_compatible(&self, other: &RowPartition) -> bool {
        Arc::ptr_eq(&self.row_splits, &other.row_splits) || self.row_splits == other.row_splits
    }

    /// Check if the two partitions share the same row splits buffer.
    pub fn ptr_eq(&self, other: &RowPartition) -> bool {
        Arc::ptr_eq(&self.row_splits, &other.row_splits)
    }

    /// Returns an equivalent uniform partition if all the rows have the same length and there is at least one row.
    pub fn as_uniform(&self) -> Option<Self> {
        if self.is_uniform() {
            return Some(self.clone());
        }
        let lengths = self.row_lengths();
        let (&len, rest) = lengths.split_first()?;
        if rest.iter().any(|&l| l != len) {
            return None;
        }
        Some(Self {
            uniform_row_length: Some(len),
            ..self.clone()
        })
    }

    /// Compose this partition with a partition of its values.
    ///
    /// The result partitions the values of `inner` into the rows of `self`: row `i` spans all the values of the
    /// inner rows that are in row `i` of `self`. The result is uniform if both partitions are.
    ///
    /// # Errors
    ///
    /// Fails if `self.nvals() != inner.nrows()`.
    pub fn compose(&self, inner: &RowPartition) -> Result<Self> {
        if self.nvals() != inner.nrows() {
            return Err(Error::Incompatible(format!(
                "Can not compose a row partition of {} values with a row partition of {} rows",
                self.nvals(),
                inner.nrows()
            )));
        }
        let row_splits = self
            .row_splits
            .iter()
            .map(|&split| inner.row_splits[split])
            .collect::<Vec<_>>();
        let uniform_row_length = self
            .uniform_row_length
            .zip(inner.uniform_row_length)
            .map(|(a, b)| a * b);
        Ok(Self {
            row_splits: row_splits.into(),
            uniform_row_length,
            dtype: self.dtype,
        })
    }

    /// Check the partition describes `nrows` rows with a total of `nvals` values.
    pub(crate) fn check_bounds(&self, nrows: Option<usize>, nvals: usize) -> Result<()> {
        if nrows.is_some_and(|nrows| nrows != self.nrows()) || self.nvals() != nvals {
            return Err(Error::Incompatible(format!(
                "Row partition with {} rows and {} values does not match {} rows and {nvals} values",
                self.nrows(),
                self.nvals(),
                nrows.map_or_else(|| String::from("any"), |n| format!("{n}")),
            )));
        }
        Ok(())
    }
}

impl PartialEq for RowPartition {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.is_row_compatible(other)
    }
}
impl Eq for RowPartition {}
impl core::hash::Hash for RowPartition {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.row_splits.hash(state);
        self.dtype.hash(state);
    }
}

impl std::fmt::Display for RowPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.uniform_row_length {
            Some(len) => write!(
                f,
                "RowPartition(uniform_row_length={len}, nrows={}, dtype={})",
                self.nrows(),
                self.dtype
            ),
            None => write!(
                f,
                "RowPartition(row_splits={:?}, dtype={})",
                self.row_splits, self.dtype
            ),
        }
    }
}
