use crate::alloc::{format, BTreeMap, String, Vec};
use crate::native::NativeValue;
use crate::structured::check::Check;
use crate::structured::{FieldInput, FieldValue, Nrows};
use crate::tensor::{DenseTensor, Dim, IndexType, RaggedTensor, RowPartition};
use crate::{Error, Result};

/// Field names must be non-empty and must not start with the reserved `_` prefix.
pub(crate) fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('_') {
        return Err(Error::InvalidArgument(format!(
            "Field name '{name}' is not currently allowed."
        )));
    }
    Ok(())
}

/// Validate the names of the fields and convert native field values to tensors.
pub(crate) fn convert_fields(fields: Vec<(String, FieldInput)>) -> Result<BTreeMap<String, FieldValue>> {
    let mut converted = BTreeMap::new();
    for (name, value) in fields {
        validate_field_name(&name)?;
        let value = match value {
            FieldInput::Value(value) => value,
            FieldInput::Native(value) => convert_native_field(&name, &value)?,
        };
        if converted.contains_key(&name) {
            return Err(Error::InvalidArgument(format!("Duplicate field name '{name}'")));
        }
        converted.insert(name, value);
    }
    Ok(converted)
}

/// Convert a native field value to a dense tensor if its lists are rectangular, and to a ragged tensor otherwise.
///
/// The ragged tensor has uniform row partitions for the outer levels where all lists have the same length, and
/// split based partitions starting at the first level where they don't.
pub(crate) fn convert_native_field(name: &str, value: &NativeValue) -> Result<FieldValue> {
    let unexpected = |reason: &str| {
        Error::InvalidType(format!(
            "Unexpected type for value in `fields`: field '{name}' {reason}"
        ))
    };
    if value.is_dict() {
        return Err(unexpected("is a dictionary, use a StructuredTensor instead"));
    }
    if value.rectangular_shape().is_some() {
        return DenseTensor::from_native(value, None)
            .map(FieldValue::Tensor)
            .map_err(|e| unexpected(e.message()));
    }
    let ragged = RaggedTensor::from_native(value, None, None, IndexType::default())
        .map_err(|e| unexpected(e.message()))?;
    let mut partitions = ragged.nested_row_partitions().to_vec();
    for partition in partitions.iter_mut() {
        match partition.as_uniform() {
            Some(uniform) => *partition = uniform,
            None => break,
        }
    }
    RaggedTensor::from_nested_row_partitions(ragged.flat_values().clone(), partitions).map(FieldValue::Ragged)
}

/// Find the index type shared by the fields and hints.
///
/// Ragged fields, nested structured tensors of rank 1 or higher, and hints with an index type must all agree. The
/// default is [`IndexType::Int64`].
pub(crate) fn find_shape_dtype(
    fields: &BTreeMap<String, FieldValue>,
    nrows: Option<Nrows>,
    row_partitions: Option<&[RowPartition]>,
) -> Result<IndexType> {
    let dtypes = fields
        .values()
        .filter_map(FieldValue::shape_dtype)
        .chain(nrows.and_then(Nrows::dtype))
        .chain(row_partitions.unwrap_or_default().iter().map(RowPartition::dtype));
    let mut found: Option<IndexType> = None;
    for dtype in dtypes {
        match found {
            Some(found) if found != dtype => {
                return Err(Error::Incompatible(format!(
                    "field values have incompatible row_partition dtypes: {found} and {dtype}"
                )));
            }
            _ => found = Some(dtype),
        }
    }
    Ok(found.unwrap_or_default())
}

/// Merge the number of rows of a field into the number of rows agreed on so far.
///
/// If both the static number of rows agreed on so far and the static number of rows of the field are known they
/// must be equal. Otherwise, if some number of rows was already agreed on and `validate` is set, a deferred
/// equality check of the runtime counts is recorded. Returns the merged number of rows and static number of rows.
pub(crate) fn merge_nrows(
    nrows: Option<usize>,
    static_nrows: Dim,
    name: &str,
    value: &FieldValue,
    validate: bool,
    checks: &mut Vec<Check>,
) -> Result<(usize, Dim)> {
    let static_value_nrows = value.static_shape().dim(0);
    let value_nrows = value.nrows().ok_or_else(|| {
        Error::Incompatible(format!("Field {name} has rank 0, expected rank at least 1"))
    })?;
    match (static_nrows, static_value_nrows) {
        (Some(expected), Some(actual)) => {
            if expected != actual {
                return Err(Error::Incompatible(format!(
                    "fields have incompatible nrows: field {name} has {actual} rows, expected {expected}"
                )));
            }
        }
        _ => {
            if let Some(expected) = static_nrows.or(nrows) {
                if validate {
                    log::trace!("deferring nrows check of field {name}");
                    checks.push(Check::NrowsEqual {
                        field: String::from(name),
                        expected,
                        actual: value_nrows,
                    });
                } else {
                    log::trace!("skipping nrows check of field {name}, validation is disabled");
                }
            }
        }
    }
    Ok((nrows.unwrap_or(value_nrows), static_nrows.or(static_value_nrows)))
}

/// Merge the row partitions of a field into the row partitions agreed on so far.
///
/// A uniform partition is kept only if the field's partition is uniform as well, otherwise the split based
/// partition is taken. Unless the two partitions are the same or both uniform with the same row length, their
/// row splits must be equal at runtime, which is recorded as a deferred check if `validate` is set.
pub(crate) fn merge_row_partitions(
    partitions: Option<Vec<RowPartition>>,
    name: &str,
    value: &FieldValue,
    rank: usize,
    dtype: IndexType,
    validate: bool,
    checks: &mut Vec<Check>,
) -> Result<Vec<RowPartition>> {
    let value_partitions = row_partitions_for_field(value, rank, dtype)?;
    let Some(partitions) = partitions else {
        return Ok(value_partitions);
    };
    let merged = partitions
        .into_iter()
        .zip(value_partitions)
        .map(|(p1, p2)| {
            let same = p1.ptr_eq(&p2)
                || (p1.is_uniform()
                    && p1.uniform_row_length() == p2.uniform_row_length()
                    && p1.nrows() == p2.nrows());
            if same {
                return p1;
            }
            if validate {
                log::trace!("deferring row_splits check of field {name}");
                checks.push(Check::RowSplitsEqual {
                    field: String::from(name),
                    expected: p1.clone(),
                    actual: p2.clone(),
                });
            } else {
                log::trace!("skipping row_splits check of field {name}, validation is disabled");
            }
            if p1.is_uniform() && !p2.is_uniform() {
                p2
            } else {
                p1
            }
        })
        .collect();
    Ok(merged)
}

/// The `rank - 1` row partitions describing the dimensions `1..rank` of a field.
pub(crate) fn row_partitions_for_field(
    value: &FieldValue,
    rank: usize,
    dtype: IndexType,
) -> Result<Vec<RowPartition>> {
    let count = rank.saturating_sub(1);
    match value {
        FieldValue::Tensor(t) => RowPartition::for_uniform_shape(t.shape(), rank, dtype),
        FieldValue::Ragged(rt) => {
            let nested = rt.nested_row_partitions();
            let mut partitions = nested[..count.min(nested.len())].to_vec();
            if partitions.len() < count {
                let inner_rank = rank - partitions.len();
                partitions.extend(RowPartition::for_uniform_shape(
                    rt.flat_values().shape(),
                    inner_rank,
                    dtype,
                )?);
            }
            Ok(partitions)
        }
        FieldValue::Structured(st) => {
            let partitions = st.row_partitions();
            if partitions.len() < count {
                return Err(Error::Incompatible(format!(
                    "Structured field of rank {} has less than {count} row partitions",
                    st.rank()
                )));
            }
            Ok(partitions[..count].to_vec())
        }
    }
}
