use crate::alloc::{format, BTreeMap, String, Vec};
use crate::structured::check::Check;
use crate::structured::validate::{merge_nrows, merge_row_partitions};
use crate::structured::FieldValue;
use crate::tensor::{IndexType, RowPartition, TensorShape};
use crate::{Error, Result};

/// The shape information of a structured tensor reconciled with its fields.
#[derive(Debug)]
pub(crate) struct Resolved {
    pub(crate) shape: TensorShape,
    pub(crate) nrows: Option<usize>,
    pub(crate) row_partitions: Vec<RowPartition>,
    pub(crate) checks: Vec<Check>,
}

/// Reconcile a declared shape of known rank and the optional hints with the shapes of the fields.
///
/// Unknown dimensions of the declared shape are filled in from the fields. For rank 1 and higher the number of
/// rows is merged from all the fields, and for rank 2 and higher the row partitions as well. Without fields the
/// number of rows and row partitions come from the hints or from a fully defined shape.
pub(crate) fn resolve(
    declared: TensorShape,
    nrows_hint: Option<usize>,
    row_partitions_hint: Option<Vec<RowPartition>>,
    fields: &BTreeMap<String, FieldValue>,
    dtype: IndexType,
    validate: bool,
) -> Result<Resolved> {
    let Some(rank) = declared.rank() else {
        return Err(Error::InvalidArgument(String::from(
            "StructuredTensor's shape must have known rank.",
        )));
    };
    let mut shape = declared;
    let mut checks = Vec::new();

    if rank > 0 {
        for (name, value) in fields {
            let value_shape = value.static_shape().prefix(rank);
            shape = shape.merge_with(&value_shape).ok_or_else(|| {
                Error::Incompatible(format!(
                    "Field {name} has shape {value_shape}, which is incompatible with the shape that was \
                     specified or inferred from other fields: {shape}"
                ))
            })?;
        }
        // static shapes of unknown rank are not checked above
        for (name, value) in fields {
            if value.rank() < rank {
                return Err(Error::Incompatible(format!(
                    "Field {name} has rank {}, which is less than the rank of the StructuredTensor: {shape}",
                    value.rank()
                )));
            }
        }
    }

    if rank == 0 {
        return Ok(Resolved {
            shape,
            nrows: None,
            row_partitions: Vec::new(),
            checks,
        });
    }

    let mut static_nrows = shape.dim(0);
    if let Some(hint) = nrows_hint {
        match static_nrows {
            Some(n) if n != hint => {
                return Err(Error::Incompatible(format!(
                    "nrows ({hint}) is incompatible with shape {shape}"
                )));
            }
            _ => static_nrows = Some(hint),
        }
    }
    let mut nrows = nrows_hint;
    for (name, value) in fields {
        let (merged, merged_static) = merge_nrows(nrows, static_nrows, name, value, validate, &mut checks)?;
        nrows = Some(merged);
        static_nrows = merged_static;
    }

    if rank == 1 {
        let nrows = nrows.or(static_nrows).ok_or_else(|| {
            Error::InvalidArgument(String::from(
                "nrows must be specified if rank==1 and `fields` is empty.",
            ))
        })?;
        let shape = TensorShape::from([static_nrows.or(Some(nrows))]);
        return Ok(Resolved {
            shape,
            nrows: Some(nrows),
            row_partitions: Vec::new(),
            checks,
        });
    }

    let mut partitions = row_partitions_hint;
    for (name, value) in fields {
        partitions = Some(merge_row_partitions(
            partitions, name, value, rank, dtype, validate, &mut checks,
        )?);
    }
    let partitions = match partitions {
        Some(partitions) => partitions,
        None => match shape.as_list() {
            Some(dims) => RowPartition::for_uniform_shape(&dims, rank, dtype)?,
            None => {
                return Err(Error::InvalidArgument(String::from(
                    "row_partitions must be specified if rank>1 and `fields` is empty.",
                )));
            }
        },
    };
    let outer_nrows = partitions[0].nrows();
    if let Some(expected) = static_nrows.filter(|&n| n != outer_nrows) {
        return Err(Error::Incompatible(format!(
            "fields have incompatible nrows: row_partitions have {outer_nrows} rows, expected {expected}"
        )));
    }
    if let Some(nrows) = nrows.filter(|&n| n != outer_nrows) {
        if validate {
            log::trace!("deferring check of nrows against row_partitions");
            checks.push(Check::NrowsEqual {
                field: String::from("row_partitions"),
                expected: nrows,
                actual: outer_nrows,
            });
        } else {
            log::trace!("skipping check of nrows against row_partitions, validation is disabled");
        }
    }
    for pair in partitions.windows(2) {
        if pair[0].nvals() != pair[1].nrows() {
            return Err(Error::Incompatible(format!(
                "row_partitions are inconsistent: a partition of {} values is followed by a partition of {} rows",
                pair[0].nvals(),
                pair[1].nrows()
            )));
        }
    }
    let partition_shape = partition_shape(outer_nrows, &partitions);
    let shape = shape.merge_with(&partition_shape).ok_or_else(|| {
        Error::Incompatible(format!(
            "row_partitions with shape {partition_shape} are incompatible with shape {shape}"
        ))
    })?;
    Ok(Resolved {
        shape,
        nrows: Some(outer_nrows),
        row_partitions: partitions,
        checks,
    })
}

/// The static shape described by a number of rows and row partitions: the number of rows followed by the row
/// lengths of the uniform partitions.
pub(crate) fn partition_shape(nrows: usize, partitions: &[RowPartition]) -> TensorShape {
    TensorShape::new(
        core::iter::once(Some(nrows)).chain(partitions.iter().map(RowPartition::uniform_row_length)),
    )
}

#[cfg(test)]
mod tests {
    use crate::alloc::vec;
    use crate::tensor::{DenseTensor, RaggedTensor};

    use super::*;

    fn fields(values: Vec<(&str, FieldValue)>) -> BTreeMap<String, FieldValue> {
        values.into_iter().map(|(k, v)| (String::from(k), v)).collect()
    }

    #[test]
    fn infers_unknown_dims() {
        let t = DenseTensor::from_native(&pyval!([[1, 2, 3], [4, 5, 6]]), None).unwrap();
        let fields = fields(vec![("a", FieldValue::Tensor(t))]);
        let resolved = resolve(
            TensorShape::unknown_dims(2),
            None,
            None,
            &fields,
            IndexType::Int64,
            true,
        )
        .unwrap();
        assert_eq!(resolved.shape, TensorShape::from([2, 3]));
        assert_eq!(resolved.nrows, Some(2));
        assert_eq!(resolved.row_partitions.len(), 1);
        assert_eq!(resolved.row_partitions[0].uniform_row_length(), Some(3));
        assert!(resolved.checks.is_empty());
    }

    #[test]
    fn uniform_partitions_for_fully_defined_shape() {
        let resolved = resolve(
            TensorShape::from([2, 3, 4]),
            None,
            None,
            &BTreeMap::new(),
            IndexType::Int32,
            false,
        )
        .unwrap();
        assert_eq!(resolved.nrows, Some(2));
        assert_eq!(resolved.row_partitions.len(), 2);
        assert_eq!(resolved.row_partitions[1].nvals(), 24);
        assert_eq!(resolved.row_partitions[1].dtype(), IndexType::Int32);
    }

    #[test]
    fn missing_hints() {
        let err = resolve(
            TensorShape::from([None]),
            None,
            None,
            &BTreeMap::new(),
            IndexType::Int64,
            false,
        )
        .unwrap_err();
        assert!(err.message().contains("nrows must be specified"));

        let err = resolve(
            TensorShape::from([Some(2), None]),
            None,
            None,
            &BTreeMap::new(),
            IndexType::Int64,
            false,
        )
        .unwrap_err();
        assert!(err.message().contains("row_partitions must be specified"));

        let resolved = resolve(
            TensorShape::from([5]),
            None,
            None,
            &BTreeMap::new(),
            IndexType::Int64,
            false,
        )
        .unwrap();
        assert_eq!(resolved.nrows, Some(5));
    }

    #[test]
    fn incompatible_field_shape() {
        let fields = fields(vec![("f", FieldValue::Tensor(DenseTensor::scalar(1_i32)))]);
        let err = resolve(
            TensorShape::from([5]),
            None,
            None,
            &fields,
            IndexType::Int64,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Incompatible(_)));
        assert_eq!(
            err.message(),
            "Field f has shape (), which is incompatible with the shape that was specified or inferred from \
             other fields: (5,)"
        );
    }

    #[test]
    fn incompatible_row_splits_are_deferred() {
        let a = RaggedTensor::from_native(&pyval!([[1, 2], [3]]), None, None, IndexType::Int64).unwrap();
        let b = RaggedTensor::from_native(&pyval!([[1, 2, 3], [4]]), None, None, IndexType::Int64).unwrap();
        let fields = fields(vec![("a", FieldValue::Ragged(a)), ("b", FieldValue::Ragged(b))]);
        let declared = TensorShape::from([Some(2), None]);

        let resolved = resolve(declared.clone(), None, None, &fields, IndexType::Int64, true).unwrap();
        assert_eq!(resolved.checks.len(), 1);
        assert!(resolved.checks[0].run().is_err());

        let resolved = resolve(declared, None, None, &fields, IndexType::Int64, false).unwrap();
        assert!(resolved.checks.is_empty());
    }

    #[test]
    fn nrows_hint_conflicts_with_row_partitions() {
        for validate in [false, true] {
            let err = resolve(
                TensorShape::from([None, None]),
                Some(3),
                Some(vec![RowPartition::from_row_lengths(&[1, 2])]),
                &BTreeMap::new(),
                IndexType::Int64,
                validate,
            )
            .unwrap_err();
            assert!(matches!(err, Error::Incompatible(_)));
            assert_eq!(
                err.message(),
                "fields have incompatible nrows: row_partitions have 2 rows, expected 3"
            );
        }
    }
}
