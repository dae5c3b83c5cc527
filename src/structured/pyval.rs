use crate::alloc::{format, vec, BTreeMap, BTreeSet, String, ToOwned, Vec};
use crate::native::NativeValue;
use crate::structured::{
    format_path, FieldInput, FieldValue, FromFieldsOptions, RaggedTensorSpec, StructuredTensor, TypeSpec,
};
use crate::tensor::{DType, DenseTensor, RaggedTensor, RowPartition, TensorShape};
use crate::{Error, Result};

impl StructuredTensor {
    /// Create a value from a tree of native values.
    ///
    /// Dictionaries become structured tensors of rank 0, and nested lists of dictionaries structured tensors with
    /// one dimension per list level. The fields of a structured tensor created from lists of dictionaries collect
    /// the values of each key across all the dictionaries. Any other nested list becomes a dense tensor if it has
    /// depth 1 and a ragged tensor otherwise, and scalars become scalar tensors.
    ///
    /// If `spec` is given, the value is converted to match it: dense and ragged fields get the dtype, shape and
    /// ragged rank of the spec, and structured tensors get the shape of the spec, which may have a higher rank
    /// than the nesting of the lists. Fields of the spec missing from a list of dictionaries are converted from an
    /// empty list.
    ///
    /// ```rust
    /// use structured_tensor::pyval;
    /// use structured_tensor::structured::{StructuredTensor, StructuredTensorSpec, TensorSpec};
    /// use structured_tensor::tensor::{DType, TensorShape};
    ///
    /// let value = pyval!([[{"a": 1}, {"a": 2}], [{"a": 3}, {"a": 4}]]);
    ///
    /// let st = StructuredTensor::from_pyval(&value, None)?;
    /// let st = st.as_structured().unwrap();
    /// assert_eq!(st.shape(), &TensorShape::from([Some(2), None]));
    /// assert!(st.field_value("a")?.as_ragged().is_some());
    ///
    /// let spec = StructuredTensorSpec::new(
    ///     [2, 2],
    ///     [("a", TensorSpec::new(TensorShape::unknown(), DType::Int64).into())],
    /// )?;
    /// let st = StructuredTensor::from_pyval(&value, Some(&spec.into()))?;
    /// let st = st.as_structured().unwrap();
    /// assert_eq!(st.shape(), &TensorShape::from([2, 2]));
    /// assert_eq!(st.field_value("a")?.as_tensor().unwrap().dtype(), DType::Int64);
    /// assert_eq!(st.to_pyval()?, value);
    /// # Ok::<(), structured_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the value does not match `spec`, if dictionaries appear at different list depths, if dictionaries
    /// are mixed with other values, if a key is missing from some dictionaries, or if a leaf value can not be
    /// converted to a tensor.
    pub fn from_pyval(value: &NativeValue, spec: Option<&TypeSpec>) -> Result<FieldValue> {
        log::trace!("StructuredTensor::from_pyval: {value}");
        from_pyval(value, spec, &[])
    }

    /// Convert the structured tensor to a tree of native values.
    ///
    /// A structured tensor of rank 0 becomes a dictionary, and higher ranks nested lists of dictionaries. This is
    /// the inverse of [`from_pyval`](Self::from_pyval) for values created without a spec.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidState`] if the structured tensor has pending checks, see
    /// [`evaluate`](Self::evaluate).
    pub fn to_pyval(&self) -> Result<NativeValue> {
        if self.has_pending_checks() {
            return Err(Error::InvalidState(String::from(
                "StructuredTensor.to_pyval() is only supported once materialized, \
                 call evaluate() to run the pending checks",
            )));
        }
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            fields.push((name.clone(), value.to_pyval()?));
        }
        let Some(nrows) = self.nrows else {
            return Ok(NativeValue::Dict(fields.into_iter().collect()));
        };
        if fields.is_empty() {
            return Ok(NativeValue::List(empty_dict_pylist(&self.row_partitions, nrows)));
        }
        field_major_to_node_major(fields, self.rank())
    }
}

fn from_pyval(value: &NativeValue, spec: Option<&TypeSpec>, path: &[String]) -> Result<FieldValue> {
    match value {
        NativeValue::Dict(dict) => from_pydict(dict, spec, path),
        NativeValue::List(items) => {
            let mut keys = BTreeSet::new();
            match find_struct_keys_and_depth(value, &mut keys)? {
                Some(rank) => from_pylist_of_dict(items, keys, rank, spec, path),
                None => from_pylist_of_value(value, spec, path),
            }
        }
        _ => from_pyscalar(value, spec, path),
    }
}

fn mismatch(value: &NativeValue, spec: &TypeSpec, path: &[String]) -> Error {
    Error::InvalidArgument(format!(
        "Value at {} does not match typespec: {value} vs {spec}",
        format_path(path)
    ))
}

fn parse_error(path: &[String], err: Error) -> Error {
    Error::InvalidArgument(format!("Error parsing path {}: {err}", format_path(path)))
}

fn child_path(path: &[String], name: &str) -> Vec<String> {
    let mut path = path.to_vec();
    path.push(name.to_owned());
    path
}

fn from_pydict(
    dict: &BTreeMap<String, NativeValue>,
    spec: Option<&TypeSpec>,
    path: &[String],
) -> Result<FieldValue> {
    let mut fields = Vec::with_capacity(dict.len());
    match spec {
        None => {
            for (name, value) in dict {
                let value = from_pyval(value, None, &child_path(path, name))?;
                fields.push((name.clone(), FieldInput::Value(value)));
            }
        }
        Some(spec) => {
            let field_specs = match spec {
                TypeSpec::Structured(spec)
                    if spec.rank() == 0 && spec.field_specs().keys().eq(dict.keys()) =>
                {
                    spec.field_specs()
                }
                _ => return Err(mismatch(&NativeValue::Dict(dict.clone()), spec, path)),
            };
            for ((name, value), field_spec) in dict.iter().zip(field_specs.values()) {
                let value = from_pyval(value, Some(field_spec), &child_path(path, name))?;
                fields.push((name.clone(), FieldInput::Value(value)));
            }
        }
    }
    let st = StructuredTensor::from_fields(fields, TensorShape::scalar())?;
    Ok(FieldValue::Structured(st))
}

fn from_pylist_of_dict(
    items: &[NativeValue],
    keys: BTreeSet<String>,
    rank: usize,
    spec: Option<&TypeSpec>,
    path: &[String],
) -> Result<FieldValue> {
    let mut columns = keys.into_iter().map(|key| (key, Vec::new())).collect::<BTreeMap<_, _>>();
    for item in items {
        update_fields(item, &mut columns, 1)?;
    }

    let (shape, fields) = match spec {
        None => {
            let mut fields = Vec::with_capacity(columns.len());
            for (name, column) in columns {
                let value = from_pyval(&NativeValue::List(column), None, &child_path(path, &name))?;
                fields.push((name, value));
            }
            (TensorShape::unknown_dims(rank), fields)
        }
        Some(spec) => {
            let value = || NativeValue::List(items.to_vec());
            let st_spec = match spec {
                TypeSpec::Structured(st_spec)
                    if columns.keys().all(|name| st_spec.field_specs().contains_key(name)) =>
                {
                    st_spec
                }
                _ => return Err(mismatch(&value(), spec, path)),
            };
            if st_spec.rank() < rank {
                return Err(Error::InvalidArgument(format!(
                    "Value at {} does not match typespec (rank mismatch): {} vs {spec}",
                    format_path(path),
                    value()
                )));
            }
            let mut fields = Vec::with_capacity(st_spec.field_specs().len());
            for (name, field_spec) in st_spec.field_specs() {
                let column = columns.remove(name).unwrap_or_default();
                let value = from_pyval(&NativeValue::List(column), Some(field_spec), &child_path(path, name))?;
                fields.push((name.clone(), value));
            }
            (st_spec.shape().clone(), fields)
        }
    };

    if fields.is_empty() {
        return from_pylist_of_empty_dict(items, rank, shape).map_err(|e| parse_error(path, e));
    }
    let fields = fields.into_iter().map(|(name, value)| (name, FieldInput::Value(value)));
    StructuredTensor::from_fields_with(fields, shape, FromFieldsOptions::new().nrows(items.len()))
        .map(FieldValue::Structured)
        .map_err(|e| parse_error(path, e))
}

/// Lists of empty dictionaries have no fields to infer the row partitions from, so they are computed from the
/// nesting of the lists.
fn from_pylist_of_empty_dict(items: &[NativeValue], rank: usize, shape: TensorShape) -> Result<FieldValue> {
    let no_fields = || core::iter::empty::<(String, FieldInput)>();
    let options = FromFieldsOptions::new().nrows(items.len());
    if rank == 1 || shape.is_fully_defined() || shape.rank() != Some(rank) {
        let st = StructuredTensor::from_fields_with(no_fields(), shape, options)?;
        return Ok(FieldValue::Structured(st));
    }
    let zeros = NativeValue::List(items.iter().map(dicts_to_zeros).collect());
    let ragged_zeros = RaggedTensor::from_native(&zeros, Some(rank - 1), Some(DType::Int32), Default::default())?;
    let options = options.row_partitions(ragged_zeros.nested_row_partitions().iter().cloned());
    let st = StructuredTensor::from_fields_with(no_fields(), shape, options)?;
    Ok(FieldValue::Structured(st))
}

fn from_pylist_of_value(value: &NativeValue, spec: Option<&TypeSpec>, path: &[String]) -> Result<FieldValue> {
    let Some(spec) = spec else {
        let converted = if value.list_depth() <= 1 {
            DenseTensor::from_native(value, None).map(FieldValue::Tensor)
        } else {
            RaggedTensor::from_native(value, None, None, Default::default()).map(FieldValue::Ragged)
        };
        return converted.map_err(|e| parse_error(path, e));
    };
    match spec {
        TypeSpec::Tensor(tensor_spec) => {
            let t = DenseTensor::from_native(value, Some(tensor_spec.dtype())).map_err(|e| parse_error(path, e))?;
            if !tensor_spec.shape().is_compatible_with(t.static_shape()) {
                return Err(mismatch(value, spec, path));
            }
            Ok(FieldValue::Tensor(t))
        }
        TypeSpec::Ragged(ragged_spec) => {
            let rt = ragged_from_pylist(value, ragged_spec).map_err(|e| parse_error(path, e))?;
            if !ragged_spec.shape().is_compatible_with(&rt.static_shape()) {
                return Err(mismatch(value, spec, path));
            }
            Ok(FieldValue::Ragged(rt))
        }
        TypeSpec::Structured(_) => {
            let Some(rank) = empty_list_depth(value) else {
                return Err(mismatch(value, spec, path));
            };
            let items = value.as_list().unwrap_or_default();
            from_pylist_of_dict(items, BTreeSet::new(), rank, Some(spec), path)
        }
    }
}

fn ragged_from_pylist(value: &NativeValue, spec: &RaggedTensorSpec) -> Result<RaggedTensor> {
    let ragged_rank = spec.ragged_rank();
    let is_empty = value.as_list().is_some_and(<[NativeValue]>::is_empty);
    if !is_empty {
        return RaggedTensor::from_native(
            value,
            Some(ragged_rank),
            Some(spec.dtype()),
            spec.row_splits_dtype(),
        );
    }
    // an empty list has no nesting to infer the ragged rank and inner dimensions from
    let inner_shape = spec.shape().suffix(ragged_rank + 1);
    let mut flat_shape = vec![0];
    flat_shape.extend(inner_shape.dims().unwrap_or_default().iter().map(|d| d.unwrap_or(0)));
    let flat_values =
        DenseTensor::from_native(&NativeValue::List(Vec::new()), Some(spec.dtype()))?.reshape(&flat_shape)?;
    let partitions = (0..ragged_rank)
        .map(|_| RowPartition::from_row_splits([0])?.with_dtype(spec.row_splits_dtype()))
        .collect::<Result<Vec<_>>>()?;
    RaggedTensor::from_nested_row_partitions(flat_values, partitions)
}

fn from_pyscalar(value: &NativeValue, spec: Option<&TypeSpec>, path: &[String]) -> Result<FieldValue> {
    let Some(spec) = spec else {
        return DenseTensor::from_native(value, None)
            .map(FieldValue::Tensor)
            .map_err(|e| parse_error(path, e));
    };
    let TypeSpec::Tensor(tensor_spec) = spec else {
        return Err(mismatch(value, spec, path));
    };
    let t = DenseTensor::from_native(value, Some(tensor_spec.dtype())).map_err(|e| parse_error(path, e))?;
    if !tensor_spec.shape().is_compatible_with(t.static_shape()) {
        return Err(mismatch(value, spec, path));
    }
    Ok(FieldValue::Tensor(t))
}

/// Collect the keys of all the dictionaries nested in lists, and return the list depth of the dictionaries.
///
/// Returns `None` if there are no dictionaries.
fn find_struct_keys_and_depth(value: &NativeValue, keys: &mut BTreeSet<String>) -> Result<Option<usize>> {
    match value {
        NativeValue::Dict(dict) => {
            keys.extend(dict.keys().cloned());
            Ok(Some(0))
        }
        NativeValue::List(items) => {
            let mut depth = None;
            let mut empty_nesting = 0;
            for item in items {
                let Some(item_depth) = find_struct_keys_and_depth(item, keys)? else {
                    empty_nesting = empty_nesting.max(list_nesting(item));
                    continue;
                };
                match depth {
                    None => depth = Some(item_depth + 1),
                    Some(depth) if depth != item_depth + 1 => {
                        return Err(Error::InvalidArgument(format!(
                            "Inconsistent depth of dictionaries: {value}"
                        )));
                    }
                    Some(_) => {}
                }
            }
            // lists without dictionaries must not be nested deeper than their sibling dictionaries
            if depth.is_some_and(|depth| empty_nesting >= depth) {
                return Err(Error::InvalidArgument(format!(
                    "Inconsistent depth of dictionaries: {value}"
                )));
            }
            Ok(depth)
        }
        _ => Ok(None),
    }
}

/// The number of nested list levels of a value, 0 for anything but a list.
fn list_nesting(value: &NativeValue) -> usize {
    match value.as_list() {
        Some(items) => 1 + items.iter().map(list_nesting).max().unwrap_or(0),
        None => 0,
    }
}

/// Append the values of a (nested list of) dictionaries to the per-key columns.
///
/// Each column is a nested list with `depth` levels, and the values are appended to its innermost last list. Lists
/// append a new empty list to every column and recurse one level deeper.
fn update_fields(
    value: &NativeValue,
    columns: &mut BTreeMap<String, Vec<NativeValue>>,
    depth: usize,
) -> Result<()> {
    let children = match value {
        NativeValue::Dict(_) => None,
        NativeValue::List(items) => Some(items),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Expected dict or nested list/tuple of dict, found {value}"
            )));
        }
    };
    for (key, column) in columns.iter_mut() {
        let target = innermost_list(column, depth)?;
        match value {
            NativeValue::Dict(dict) => {
                let field = dict.get(key).ok_or_else(|| {
                    Error::NotFound(format!("missing key '{key}' in dictionary {value}"))
                })?;
                target.push(field.clone());
            }
            _ => target.push(NativeValue::List(Vec::new())),
        }
    }
    for child in children.into_iter().flatten() {
        update_fields(child, columns, depth + 1)?;
    }
    Ok(())
}

fn innermost_list(column: &mut Vec<NativeValue>, depth: usize) -> Result<&mut Vec<NativeValue>> {
    let mut target = column;
    for _ in 1..depth {
        target = match target.last_mut() {
            Some(NativeValue::List(items)) => items,
            _ => {
                return Err(Error::InvalidState(String::from(
                    "field column is not nested deep enough",
                )));
            }
        };
    }
    Ok(target)
}

/// The depth of a nested list whose leaves are all empty lists, `None` if it has any other leaf.
fn empty_list_depth(value: &NativeValue) -> Option<usize> {
    let items = value.as_list()?;
    items
        .iter()
        .try_fold(0, |depth, item| empty_list_depth(item).map(|d| depth.max(d)))
        .map(|depth| depth + 1)
}

fn dicts_to_zeros(value: &NativeValue) -> NativeValue {
    match value {
        NativeValue::List(items) => NativeValue::List(items.iter().map(dicts_to_zeros).collect()),
        _ => NativeValue::Int(0),
    }
}

fn empty_dict_pylist(partitions: &[RowPartition], nrows: usize) -> Vec<NativeValue> {
    let Some((partition, inner)) = partitions.split_first() else {
        return (0..nrows).map(|_| NativeValue::Dict(BTreeMap::new())).collect();
    };
    let values = empty_dict_pylist(inner, partition.nvals());
    (0..partition.nrows())
        .map(|row| NativeValue::List(values[partition.row_range(row)].to_vec()))
        .collect()
}

/// Transpose per-field nested lists of `depth` levels into nested lists of dictionaries.
fn field_major_to_node_major(fields: Vec<(String, NativeValue)>, depth: usize) -> Result<NativeValue> {
    if depth == 0 {
        return Ok(NativeValue::Dict(fields.into_iter().collect()));
    }
    let mut nvals = None;
    let mut columns = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let NativeValue::List(items) = value else {
            return Err(Error::InvalidState(format!(
                "field {name} has less dimensions than the StructuredTensor"
            )));
        };
        match nvals {
            Some(n) if n != items.len() => {
                return Err(Error::Incompatible(format!(
                    "fields have incompatible nrows: field {name} has {} rows, expected {n}",
                    items.len()
                )));
            }
            _ => nvals = Some(items.len()),
        }
        columns.push((name, items.into_iter()));
    }
    let mut nodes = Vec::with_capacity(nvals.unwrap_or(0));
    for _ in 0..nvals.unwrap_or(0) {
        let slice = columns
            .iter_mut()
            .filter_map(|(name, items)| Some((name.clone(), items.next()?)))
            .collect();
        nodes.push(field_major_to_node_major(slice, depth - 1)?);
    }
    Ok(NativeValue::List(nodes))
}

#[cfg(test)]
mod tests {
    use crate::structured::{StructuredTensorSpec, TensorSpec};
    use crate::tensor::IndexType;

    use crate::tests::structured;

    use super::*;

    #[test]
    fn struct_keys_and_depth() {
        let mut keys = BTreeSet::new();
        let depth = find_struct_keys_and_depth(&pyval!([[{"a": 1}], [{"b": 2}, {"a": 3}]]), &mut keys).unwrap();
        assert_eq!(depth, Some(2));
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), ["a", "b"]);

        let mut keys = BTreeSet::new();
        assert_eq!(find_struct_keys_and_depth(&pyval!([[1], []]), &mut keys).unwrap(), None);
        let err = find_struct_keys_and_depth(&pyval!([{}, [{}]]), &mut keys).unwrap_err();
        assert!(err.message().contains("Inconsistent depth of dictionaries"));

        // empty rows are allowed above the dictionaries, but not at their level
        let depth = find_struct_keys_and_depth(&pyval!([[{"a": 1}], []]), &mut keys).unwrap();
        assert_eq!(depth, Some(2));
        for value in [pyval!([{"a": 1}, []]), pyval!([[{"a": 1}], [[]]])] {
            let err = find_struct_keys_and_depth(&value, &mut keys).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
            assert!(err.message().contains("Inconsistent depth of dictionaries"));
        }
    }

    #[test]
    fn columns() {
        let mut columns = BTreeMap::from([(String::from("a"), Vec::new())]);
        for item in pyval!([[{"a": 1}, {"a": 2}], [], [{"a": 3}]]).as_list().unwrap() {
            update_fields(item, &mut columns, 1).unwrap();
        }
        assert_eq!(NativeValue::List(columns.remove("a").unwrap()), pyval!([[1, 2], [], [3]]));

        let mut columns = BTreeMap::from([(String::from("b"), Vec::new())]);
        let err = update_fields(&pyval!({"a": 1}), &mut columns, 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.message().contains("'b'"));
        let err = update_fields(&pyval!(5), &mut columns, 1).unwrap_err();
        assert!(err.message().contains("Expected dict or nested list/tuple of dict"));
    }

    #[test]
    fn empty_lists() {
        assert_eq!(empty_list_depth(&pyval!([])), Some(1));
        assert_eq!(empty_list_depth(&pyval!([[], [[]]])), Some(3));
        assert_eq!(empty_list_depth(&pyval!([[1]])), None);
        assert_eq!(dicts_to_zeros(&pyval!([[{}], []])), pyval!([[0], []]));
    }

    #[test]
    fn scalar_dict() {
        let value = pyval!({"a": 12, "b": [1, 2, 3], "c": [[1, 2], [3]]});
        let st = structured(value.clone());
        assert_eq!(st.rank(), 0);
        assert!(st.field_value("a").unwrap().as_tensor().is_some());
        assert!(st.field_value("b").unwrap().as_tensor().is_some());
        assert!(st.field_value("c").unwrap().as_ragged().is_some());
        assert_eq!(st.to_pyval().unwrap(), value);
    }

    #[test]
    fn list_of_empty_dicts() {
        let value = pyval!([[{}, {}], [], [{}]]);
        let st = structured(value.clone());
        assert_eq!(st.shape(), &TensorShape::from([Some(3), None]));
        assert_eq!(st.row_partitions()[0].row_splits(), [0, 2, 2, 3]);
        assert_eq!(st.row_partitions()[0].dtype(), IndexType::Int64);
        assert_eq!(st.to_pyval().unwrap(), value);
    }

    #[test]
    fn scalar_with_spec() {
        let spec = TypeSpec::from(TensorSpec::new(TensorShape::scalar(), DType::Int64));
        let t = StructuredTensor::from_pyval(&pyval!(3), Some(&spec)).unwrap();
        assert_eq!(t.as_tensor().unwrap().dtype(), DType::Int64);
        let spec = StructuredTensorSpec::new(TensorShape::scalar(), Vec::<(&str, TypeSpec)>::new()).unwrap();
        let spec = TypeSpec::from(spec);
        let err = StructuredTensor::from_pyval(&pyval!(0), Some(&spec)).unwrap_err();
        assert!(err.message().contains("Value at () does not match typespec"));
    }

    #[test]
    fn node_major() {
        let fields = vec![
            (String::from("a"), pyval!([1, 2])),
            (String::from("b"), pyval!([3, 4])),
        ];
        assert_eq!(
            field_major_to_node_major(fields, 1).unwrap(),
            pyval!([{"a": 1, "b": 3}, {"a": 2, "b": 4}])
        );
        let fields = vec![
            (String::from("a"), pyval!([1, 2])),
            (String::from("b"), pyval!([3])),
        ];
        let err = field_major_to_node_major(fields, 1).unwrap_err();
        assert!(matches!(err, Error::Incompatible(_)));
    }
}
