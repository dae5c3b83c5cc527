use crate::alloc::{format, vec, BTreeMap, String, Vec};
use crate::structured::resolve::partition_shape;
use crate::structured::{FieldValue, StructuredTensor};
use crate::tensor::{DenseTensor, RaggedTensor, RowPartition, TensorShape};
use crate::{Error, Result};

impl StructuredTensor {
    /// Partition the outer dimension of the structured tensor into rows.
    ///
    /// Returns a structured tensor of rank `rank + 1` whose outer dimension has `partition.nrows()` rows and whose
    /// second dimension is described by `partition`. Dense fields get an extra dense dimension if the partition is
    /// uniform and become ragged otherwise.
    ///
    /// ```rust
    /// use structured_tensor::pyval;
    /// use structured_tensor::structured::StructuredTensor;
    /// use structured_tensor::tensor::RowPartition;
    ///
    /// let st = StructuredTensor::from_pyval(&pyval!([{"x": 1}, {"x": 2}, {"x": 3}]), None)?;
    /// let st = st.as_structured().unwrap();
    /// let partition = RowPartition::from_row_splits([0, 2, 2, 3])?;
    /// let st = st.partition_outer_dimension(&partition)?;
    /// assert_eq!(st.to_pyval()?, pyval!([[{"x": 1}, {"x": 2}], [], [{"x": 3}]]));
    /// # Ok::<(), structured_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the structured tensor has rank 0, if the partition does not partition exactly `self.nrows()`
    /// values, or if the partition has a different index type than the structured tensor.
    pub fn partition_outer_dimension(&self, partition: &RowPartition) -> Result<StructuredTensor> {
        let Some(nrows) = self.nrows else {
            return Err(Error::InvalidArgument(format!(
                "Shape {} must have rank at least 1",
                self.shape
            )));
        };
        if partition.nvals() != nrows {
            return Err(Error::Incompatible(format!(
                "row_partition partitions {} values, but the StructuredTensor has {nrows} rows",
                partition.nvals()
            )));
        }
        if partition.dtype() != self.shape_dtype {
            return Err(Error::Incompatible(format!(
                "row_partition has dtype {}, but the StructuredTensor has row partitions of dtype {}",
                partition.dtype(),
                self.shape_dtype
            )));
        }
        log::debug!("partition_outer_dimension: shape={}, partition={partition}", self.shape);
        self.partition_outer_unchecked(partition)
    }

    fn partition_outer_unchecked(&self, partition: &RowPartition) -> Result<StructuredTensor> {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), partition_field(value, partition)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let shape = TensorShape::new([Some(partition.nrows()), partition.uniform_row_length()])
            .concatenate(&self.shape.suffix(1));
        let mut row_partitions = Vec::with_capacity(self.row_partitions.len() + 1);
        row_partitions.push(partition.clone());
        row_partitions.extend(self.row_partitions.iter().cloned());
        Ok(StructuredTensor::new_unchecked(
            fields,
            shape,
            Some(partition.nrows()),
            row_partitions,
            self.shape_dtype,
            self.checks.clone(),
        ))
    }

    /// Merge the dimensions `outer_axis..=inner_axis` into a single dimension.
    ///
    /// Negative axes count from the end. The merged dimension of row `i` contains the elements of all the
    /// dimensions it replaces, in row-major order. Dense fields are reshaped, and ragged and structured fields get
    /// their row partitions composed.
    ///
    /// ```rust
    /// use structured_tensor::pyval;
    /// use structured_tensor::structured::StructuredTensor;
    ///
    /// let value = pyval!([[[{"x": 1}, {"x": 2}], [{"x": 3}]], [[{"x": 4}]]]);
    /// let st = StructuredTensor::from_pyval(&value, None)?;
    /// let st = st.as_structured().unwrap();
    /// assert_eq!(st.merge_dims(1, 2)?.to_pyval()?, pyval!([[{"x": 1}, {"x": 2}, {"x": 3}], [{"x": 4}]]));
    /// assert_eq!(st.merge_dims(0, -1)?.to_pyval()?, pyval!([{"x": 1}, {"x": 2}, {"x": 3}, {"x": 4}]));
    /// # Ok::<(), structured_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if an axis is out of bounds, or if `outer_axis` is not less than `inner_axis` after resolving
    /// negative axes.
    pub fn merge_dims(&self, outer_axis: isize, inner_axis: isize) -> Result<StructuredTensor> {
        let rank = self.rank();
        let outer_axis = positive_axis(outer_axis, rank, "outer_axis")?;
        let inner_axis = positive_axis(inner_axis, rank, "inner_axis")?;
        if outer_axis >= inner_axis {
            return Err(Error::InvalidArgument(format!(
                "Expected outer_axis ({outer_axis}) to be less than inner_axis ({inner_axis})"
            )));
        }
        log::debug!("merge_dims: shape={}, axes {outer_axis}..={inner_axis}", self.shape);
        self.merge_dims_unchecked(outer_axis, inner_axis)
    }

    fn merge_dims_unchecked(&self, outer_axis: usize, inner_axis: usize) -> Result<StructuredTensor> {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), merge_field_dims(value, outer_axis, inner_axis)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let (nrows, row_partitions) = if outer_axis == 0 {
            let nrows = self.row_partitions[inner_axis - 1].nvals();
            (nrows, self.row_partitions[inner_axis..].to_vec())
        } else {
            let chain = &self.row_partitions[outer_axis - 1..inner_axis];
            let merged = compose_chain(chain)?;
            let mut row_partitions = self.row_partitions[..outer_axis - 1].to_vec();
            row_partitions.push(merged);
            row_partitions.extend(self.row_partitions[inner_axis..].iter().cloned());
            (self.nrows.unwrap_or(0), row_partitions)
        };

        let dims = self.shape.dims().unwrap_or_default();
        let merged_dim = dims[outer_axis..=inner_axis]
            .iter()
            .try_fold(1, |acc: usize, d| d.map(|d| acc * d));
        let shape = TensorShape::new(
            dims[..outer_axis]
                .iter()
                .copied()
                .chain([merged_dim])
                .chain(dims[inner_axis + 1..].iter().copied()),
        );
        let known = partition_shape(nrows, &row_partitions);
        let shape = shape.merge_with(&known).ok_or_else(|| {
            Error::Incompatible(format!(
                "merged shape {shape} is incompatible with the merged row partitions {known}"
            ))
        })?;

        Ok(StructuredTensor::new_unchecked(
            fields,
            shape,
            Some(nrows),
            row_partitions,
            self.shape_dtype,
            self.checks.clone(),
        ))
    }
}

fn positive_axis(axis: isize, rank: usize, name: &str) -> Result<usize> {
    let out_of_bounds = || {
        Error::InvalidArgument(format!(
            "{name}={axis} out of bounds: expected {}<={name}<{rank}",
            -(rank as isize)
        ))
    };
    let positive = if axis < 0 {
        rank.checked_sub(axis.unsigned_abs()).ok_or_else(out_of_bounds)?
    } else {
        axis.unsigned_abs()
    };
    if positive >= rank {
        return Err(out_of_bounds());
    }
    Ok(positive)
}

fn partition_field(value: &FieldValue, partition: &RowPartition) -> Result<FieldValue> {
    match value {
        FieldValue::Tensor(t) => match partition.uniform_row_length() {
            Some(len) => {
                let mut shape = vec![partition.nrows(), len];
                shape.extend_from_slice(&t.shape()[1..]);
                t.reshape(&shape).map(FieldValue::Tensor)
            }
            None => RaggedTensor::from_nested_row_partitions(t.clone(), vec![partition.clone()])
                .map(FieldValue::Ragged),
        },
        FieldValue::Ragged(rt) => rt.partition_outer(partition).map(FieldValue::Ragged),
        FieldValue::Structured(st) => st.partition_outer_unchecked(partition).map(FieldValue::Structured),
    }
}

fn merge_field_dims(value: &FieldValue, outer_axis: usize, inner_axis: usize) -> Result<FieldValue> {
    match value {
        FieldValue::Tensor(t) => merge_dense_dims(t, outer_axis, inner_axis).map(FieldValue::Tensor),
        FieldValue::Ragged(rt) => merge_ragged_dims(rt, outer_axis, inner_axis),
        FieldValue::Structured(st) => st.merge_dims_unchecked(outer_axis, inner_axis).map(FieldValue::Structured),
    }
}

fn merge_dense_dims(t: &DenseTensor, outer_axis: usize, inner_axis: usize) -> Result<DenseTensor> {
    let shape = t.shape();
    let mut merged = Vec::with_capacity(shape.len() - (inner_axis - outer_axis));
    merged.extend_from_slice(&shape[..outer_axis]);
    merged.push(shape[outer_axis..=inner_axis].iter().product());
    merged.extend_from_slice(&shape[inner_axis + 1..]);
    t.reshape(&merged)
}

fn merge_ragged_dims(rt: &RaggedTensor, outer_axis: usize, inner_axis: usize) -> Result<FieldValue> {
    let rt = rt.with_ragged_rank_at_least(inner_axis)?;
    let partitions = rt.nested_row_partitions();
    if outer_axis == 0 {
        let inner = partitions[inner_axis..].to_vec();
        if inner.is_empty() {
            return Ok(FieldValue::Tensor(rt.flat_values().clone()));
        }
        return RaggedTensor::from_nested_row_partitions(rt.flat_values().clone(), inner).map(FieldValue::Ragged);
    }
    let merged = compose_chain(&partitions[outer_axis - 1..inner_axis])?;
    let mut merged_partitions = partitions[..outer_axis - 1].to_vec();
    merged_partitions.push(merged);
    merged_partitions.extend(partitions[inner_axis..].iter().cloned());
    RaggedTensor::from_nested_row_partitions(rt.flat_values().clone(), merged_partitions).map(FieldValue::Ragged)
}

fn compose_chain(chain: &[RowPartition]) -> Result<RowPartition> {
    let Some((first, rest)) = chain.split_first() else {
        return Err(Error::InvalidArgument(String::from(
            "Can not compose an empty chain of row partitions",
        )));
    };
    rest.iter().try_fold(first.clone(), |merged, inner| merged.compose(inner))
}

#[cfg(test)]
mod tests {
    use crate::structured::FieldInput;
    use crate::tensor::IndexType;

    use crate::tests::structured;

    use super::*;

    #[test]
    fn axes() {
        assert_eq!(positive_axis(0, 3, "outer_axis").unwrap(), 0);
        assert_eq!(positive_axis(-1, 3, "outer_axis").unwrap(), 2);
        assert_eq!(positive_axis(-3, 3, "outer_axis").unwrap(), 0);
        let err = positive_axis(3, 3, "inner_axis").unwrap_err();
        assert_eq!(err.message(), "inner_axis=3 out of bounds: expected -3<=inner_axis<3");
        assert!(positive_axis(-4, 3, "outer_axis").is_err());
    }

    #[test]
    fn partition_uniform() {
        let st = structured(pyval!([
            {"x": 1, "y": [1, 2]},
            {"x": 2, "y": [3]},
            {"x": 3, "y": []},
            {"x": 4, "y": [4]}
        ]));
        let partition = RowPartition::from_uniform_row_length(2, 4, None).unwrap();
        let st = st.partition_outer_dimension(&partition).unwrap();
        assert_eq!(st.shape(), &TensorShape::from([2, 2]));
        assert_eq!(st.field_value("x").unwrap().as_tensor().unwrap().shape(), [2, 2]);
        assert_eq!(st.field_value("y").unwrap().as_ragged().unwrap().ragged_rank(), 2);
        assert_eq!(
            st.to_pyval().unwrap(),
            pyval!([
                [{"x": 1, "y": [1, 2]}, {"x": 2, "y": [3]}],
                [{"x": 3, "y": []}, {"x": 4, "y": [4]}]
            ])
        );
    }

    #[test]
    fn partition_errors() {
        let st = StructuredTensor::from_fields(Vec::<(String, FieldInput)>::new(), TensorShape::scalar()).unwrap();
        let partition = RowPartition::from_row_splits([0]).unwrap();
        let err = st.partition_outer_dimension(&partition).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(err.message(), "Shape () must have rank at least 1");

        let st = structured(pyval!([{"x": 1}, {"x": 2}]));
        let partition = RowPartition::from_row_splits([0, 3]).unwrap();
        assert!(matches!(st.partition_outer_dimension(&partition), Err(Error::Incompatible(_))));
        let partition = RowPartition::from_row_splits([0, 2]).unwrap().with_dtype(IndexType::Int32).unwrap();
        let err = st.partition_outer_dimension(&partition).unwrap_err();
        assert!(err.message().contains("dtype"));
    }

    #[test]
    fn merge_dense_field() {
        let t = DenseTensor::from_native(&pyval!([[[1, 2], [3, 4]], [[5, 6], [7, 8]]]), None).unwrap();
        let st = StructuredTensor::from_fields([("t", FieldInput::from(t))], TensorShape::unknown_dims(3)).unwrap();
        assert_eq!(st.shape(), &TensorShape::from([2, 2, 2]));
        let merged = st.merge_dims(1, 2).unwrap();
        assert_eq!(merged.shape(), &TensorShape::from([2, 4]));
        assert_eq!(merged.field_value("t").unwrap().as_tensor().unwrap().shape(), [2, 4]);
        assert_eq!(merged.row_partitions()[0].uniform_row_length(), Some(4));
        let merged = st.merge_dims(0, 2).unwrap();
        assert_eq!(merged.shape(), &TensorShape::from([8]));
        assert!(merged.row_partitions().is_empty());
    }

    #[test]
    fn merge_errors() {
        let st = structured(pyval!([[[{"a": 5}]]]));
        let err = st.merge_dims(2, 1).unwrap_err();
        assert_eq!(err.message(), "Expected outer_axis (2) to be less than inner_axis (1)");
        assert!(st.merge_dims(1, 1).is_err());
        assert!(st.merge_dims(0, 3).is_err());
    }
}
