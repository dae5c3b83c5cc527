use crate::alloc::{format, String, Vec};
use crate::native::NativeValue;
use crate::tensor::{DType, DenseTensor, IndexType, RowPartition, TensorShape};
use crate::{Error, Result};

/// A tensor with one or more ragged dimensions.
///
/// A ragged tensor is a dense tensor of `flat_values` and a non-empty list of nested row partitions. The outermost
/// partition splits the rows of the tensor, and each following partition splits the values of the previous one.
/// The last partition splits the rows of `flat_values`. The number of partitions is the *ragged rank*.
#[derive(Clone, Debug, PartialEq)]
pub struct RaggedTensor {
    flat_values: DenseTensor,
    partitions: Vec<RowPartition>,
}
impl RaggedTensor {
    /// Create a ragged tensor from its flat values and nested row partitions, outermost first.
    ///
    /// # Errors
    ///
    /// Fails if there are no partitions, if the flat values are a scalar, if consecutive partitions do not agree on
    /// the number of values, or if the partitions have different index types.
    pub fn from_nested_row_partitions(
        flat_values: DenseTensor,
        partitions: Vec<RowPartition>,
    ) -> Result<Self> {
        let Some(last) = partitions.last() else {
            return Err(Error::InvalidArgument(String::from(
                "A ragged tensor requires at least one row partition",
            )));
        };
        let Some(nvals) = flat_values.nrows() else {
            return Err(Error::InvalidArgument(String::from(
                "The flat values of a ragged tensor must have rank at least 1",
            )));
        };
        last.check_bounds(None, nvals)?;
        for pair in partitions.windows(2) {
            pair[1].check_bounds(Some(pair[0].nvals()), pair[1].nvals())?;
            if pair[0].dtype() != pair[1].dtype() {
                return Err(Error::Incompatible(format!(
                    "Row partitions have incompatible dtypes: {} and {}",
                    pair[0].dtype(),
                    pair[1].dtype()
                )));
            }
        }
        Ok(Self {
            flat_values,
            partitions,
        })
    }

    /// Create a ragged tensor of ragged rank 1 from its values and row splits.
    pub fn from_row_splits(values: DenseTensor, row_splits: impl Into<Vec<usize>>) -> Result<Self> {
        Self::from_nested_row_partitions(values, crate::alloc::vec![RowPartition::from_row_splits(row_splits)?])
    }

    /// Create a ragged tensor of ragged rank 1 from its values and row lengths.
    pub fn from_row_lengths(values: DenseTensor, row_lengths: &[usize]) -> Result<Self> {
        Self::from_nested_row_partitions(values, crate::alloc::vec![RowPartition::from_row_lengths(row_lengths)])
    }

    /// Create a ragged tensor from nested lists of scalars.
    ///
    /// The outermost `ragged_rank` list levels become row partitions, and the remaining levels must be rectangular
    /// and become the flat values. If `ragged_rank` is `None` it is one less than the maximal list depth of `value`,
    /// so that the flat values are a vector.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not a list of lists, if the ragged rank is not smaller than the list depth, if scalars
    /// appear at different depths, or if the flat values can not be converted to a dense tensor.
    pub fn from_native(
        value: &NativeValue,
        ragged_rank: Option<usize>,
        dtype: Option<DType>,
        row_splits_dtype: IndexType,
    ) -> Result<Self> {
        let depth = value.list_depth();
        let ragged_rank = ragged_rank.unwrap_or(depth.saturating_sub(1));
        if ragged_rank == 0 || ragged_rank >= depth {
            return Err(Error::InvalidArgument(format!(
                "Invalid ragged_rank {ragged_rank} for a value of depth {depth}: {value}"
            )));
        }
        let NativeValue::List(items) = value else {
            return Err(Error::InvalidArgument(format!("Expected a nested list, found {value}")));
        };
        let mut level = items.iter().collect::<Vec<_>>();
        let mut partitions = Vec::with_capacity(ragged_rank);
        for _ in 0..ragged_rank {
            let mut lengths = Vec::with_capacity(level.len());
            let mut next = Vec::new();
            for item in level {
                let NativeValue::List(items) = item else {
                    return Err(Error::InvalidArgument(format!(
                        "Expected a list with ragged_rank {ragged_rank}, found a scalar: {item}"
                    )));
                };
                lengths.push(items.len());
                next.extend(items.iter());
            }
            partitions.push(RowPartition::from_row_lengths(&lengths).with_dtype(row_splits_dtype)?);
            level = next;
        }
        let flat_values = NativeValue::List(level.into_iter().cloned().collect());
        let flat_values = DenseTensor::from_native(&flat_values, dtype)?;
        Self::from_nested_row_partitions(flat_values, partitions)
    }

    /// Convert the tensor to nested lists of scalars.
    pub fn to_native(&self) -> Result<NativeValue> {
        let NativeValue::List(mut rows) = self.flat_values.to_native()? else {
            return Err(Error::InvalidState(String::from(
                "flat values of a ragged tensor must have rank at least 1",
            )));
        };
        for partition in self.partitions.iter().rev() {
            let mut values = rows.into_iter();
            rows = partition
                .row_lengths()
                .into_iter()
                .map(|len| NativeValue::List(values.by_ref().take(len).collect()))
                .collect();
        }
        Ok(NativeValue::List(rows))
    }

    /// The dense values partitioned by the innermost row partition.
    pub fn flat_values(&self) -> &DenseTensor {
        &self.flat_values
    }

    /// The row partitions, outermost first.
    pub fn nested_row_partitions(&self) -> &[RowPartition] {
        &self.partitions
    }

    /// The number of rows.
    pub fn nrows(&self) -> usize {
        self.partitions[0].nrows()
    }

    /// The number of ragged dimensions, at least one.
    pub fn ragged_rank(&self) -> usize {
        self.partitions.len()
    }

    /// The rank of the tensor.
    pub fn rank(&self) -> usize {
        self.ragged_rank() + self.flat_values.rank()
    }

    /// The element type.
    pub fn dtype(&self) -> DType {
        self.flat_values.dtype()
    }

    /// The index type of the row partitions.
    pub fn row_splits_dtype(&self) -> IndexType {
        self.partitions[0].dtype()
    }

    /// The static shape: the number of rows, the row lengths of uniform partitions, and the inner dimensions of the
    /// flat values.
    pub fn static_shape(&self) -> TensorShape {
        let outer = TensorShape::new(
            core::iter::once(Some(self.nrows()))
                .chain(self.partitions.iter().map(RowPartition::uniform_row_length)),
        );
        outer.concatenate(&self.flat_values.static_shape().suffix(1))
    }

    /// Returns the same tensor with a different index type for its row partitions.
    pub fn with_row_splits_dtype(&self, dtype: IndexType) -> Result<Self> {
        let partitions = self
            .partitions
            .iter()
            .map(|p| p.with_dtype(dtype))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            flat_values: self.flat_values.clone(),
            partitions,
        })
    }

    /// Returns the same tensor with an additional outermost row partition.
    ///
    /// # Errors
    ///
    /// Fails if the partition does not have exactly `self.nrows()` values, or has a different index type.
    pub fn partition_outer(&self, partition: &RowPartition) -> Result<Self> {
        let mut partitions = Vec::with_capacity(self.partitions.len() + 1);
        partitions.push(partition.clone());
        partitions.extend(self.partitions.iter().cloned());
        Self::from_nested_row_partitions(self.flat_values.clone(), partitions)
    }

    /// Returns an equivalent tensor with at least `ragged_rank` partitions, moving outer dimensions of the flat
    /// values into uniform row partitions.
    ///
    /// # Errors
    ///
    /// Fails if the tensor has a rank smaller or equal to `ragged_rank`.
    pub fn with_ragged_rank_at_least(&self, ragged_rank: usize) -> Result<Self> {
        let Some(extra) = ragged_rank.checked_sub(self.ragged_rank()).filter(|&e| e > 0) else {
            return Ok(self.clone());
        };
        let shape = self.flat_values.shape();
        let uniform = RowPartition::for_uniform_shape(shape, extra + 1, self.row_splits_dtype())?;
        let mut flat_shape = Vec::with_capacity(shape.len() - extra);
        flat_shape.push(shape[..=extra].iter().product());
        flat_shape.extend_from_slice(&shape[extra + 1..]);
        let flat_values = self.flat_values.reshape(&flat_shape)?;
        let mut partitions = self.partitions.clone();
        partitions.extend(uniform);
        Self::from_nested_row_partitions(flat_values, partitions)
    }
}

#[cfg(test)]
mod tests {
    use crate::alloc::vec;

    use super::*;

    #[test]
    fn from_native() {
        let value = pyval!([[1, 2], [3]]);
        let rt = RaggedTensor::from_native(&value, None, None, IndexType::Int64).unwrap();
        assert_eq!(rt.ragged_rank(), 1);
        assert_eq!(rt.nrows(), 2);
        assert_eq!(rt.rank(), 2);
        assert_eq!(rt.nested_row_partitions()[0].row_splits(), [0, 2, 3]);
        assert_eq!(rt.dtype(), DType::Int32);
        assert_eq!(rt.static_shape(), TensorShape::from([Some(2), None]));
        assert_eq!(rt.to_native().unwrap(), value);

        let value = pyval!([[[1, 2], [3]], [], [[4]]]);
        let rt = RaggedTensor::from_native(&value, None, None, IndexType::Int32).unwrap();
        assert_eq!(rt.ragged_rank(), 2);
        assert_eq!(rt.row_splits_dtype(), IndexType::Int32);
        assert_eq!(rt.to_native().unwrap(), value);
    }

    #[test]
    fn from_native_with_dense_inner_dims() {
        let value = pyval!([[[1, 2], [3, 4]], [[5, 6]]]);
        let rt = RaggedTensor::from_native(&value, Some(1), None, IndexType::Int64).unwrap();
        assert_eq!(rt.ragged_rank(), 1);
        assert_eq!(rt.flat_values().shape(), [3, 2]);
        assert_eq!(rt.static_shape(), TensorShape::from([Some(2), None, Some(2)]));
        assert_eq!(rt.to_native().unwrap(), value);
    }

    #[test]
    fn from_native_errors() {
        assert!(RaggedTensor::from_native(&pyval!([1, 2]), None, None, IndexType::Int64).is_err());
        assert!(RaggedTensor::from_native(&pyval!([[1], 2]), None, None, IndexType::Int64).is_err());
        assert!(
            RaggedTensor::from_native(&pyval!([[1, 2], [3]]), Some(2), None, IndexType::Int64).is_err()
        );
    }

    #[test]
    fn invalid_partitions() {
        let values = DenseTensor::from_vec(vec![1, 2, 3]);
        assert!(RaggedTensor::from_row_splits(values.clone(), vec![0, 1, 2]).is_err());
        assert!(RaggedTensor::from_nested_row_partitions(values.clone(), vec![]).is_err());
        assert!(RaggedTensor::from_row_splits(DenseTensor::scalar(1), vec![0, 1]).is_err());

        let outer = RowPartition::from_row_lengths(&[1, 1]);
        let inner = RowPartition::from_row_lengths(&[3]);
        assert!(RaggedTensor::from_nested_row_partitions(values.clone(), vec![outer, inner.clone()]).is_err());

        let outer = RowPartition::from_row_lengths(&[1])
            .with_dtype(IndexType::Int32)
            .unwrap();
        assert!(RaggedTensor::from_nested_row_partitions(values, vec![outer, inner]).is_err());
    }

    #[test]
    fn raise_ragged_rank() {
        let values = DenseTensor::from_vec((0..12).collect::<Vec<i32>>())
            .reshape(&[6, 2])
            .unwrap();
        let rt = RaggedTensor::from_row_lengths(values, &[2, 4]).unwrap();
        assert_eq!(rt.rank(), 3);

        let raised = rt.with_ragged_rank_at_least(2).unwrap();
        assert_eq!(raised.ragged_rank(), 2);
        assert_eq!(raised.flat_values().shape(), [12]);
        assert_eq!(raised.nested_row_partitions()[1].uniform_row_length(), Some(2));
        assert_eq!(raised.static_shape(), rt.static_shape());
        assert_eq!(raised.to_native().unwrap(), rt.to_native().unwrap());

        assert_eq!(rt.with_ragged_rank_at_least(1).unwrap(), rt);
        assert!(rt.with_ragged_rank_at_least(3).is_err());
    }

    #[test]
    fn partition_outer() {
        let rt = RaggedTensor::from_native(&pyval!([[1, 2], [3], []]), None, None, IndexType::Int64).unwrap();
        let p = RowPartition::from_row_lengths(&[2, 1]);
        let outer = rt.partition_outer(&p).unwrap();
        assert_eq!(outer.to_native().unwrap(), pyval!([[[1, 2], [3]], [[]]]));
        assert!(rt.partition_outer(&RowPartition::from_row_lengths(&[1])).is_err());
    }
}
