//! Structured tensors and their field values.
//!
//! A [`StructuredTensor`] is a collection of named fields sharing a common shape. The fields are
//! [`FieldValue`]s: dense tensors, ragged tensors or nested structured tensors, each of rank at least the rank of
//! the structured tensor. Structured tensors can be created from fields with
//! [`from_fields`](StructuredTensor::from_fields), or from nested native values with
//! [`from_pyval`](StructuredTensor::from_pyval), and reshaped with
//! [`partition_outer_dimension`](StructuredTensor::partition_outer_dimension) and
//! [`merge_dims`](StructuredTensor::merge_dims).

mod check;
mod dims;
mod pyval;
mod resolve;
mod spec;
mod validate;

pub use spec::{RaggedTensorSpec, StructuredTensorSpec, TensorSpec, TypeSpec};

use crate::alloc::{format, BTreeMap, String, Vec};
use crate::native::NativeValue;
use crate::tensor::{DenseTensor, IndexType, RaggedTensor, RowPartition, TensorShape};
use crate::{Error, Result};

use check::Check;

/// The value of a field of a structured tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// A dense tensor.
    Tensor(DenseTensor),
    /// A ragged tensor.
    Ragged(RaggedTensor),
    /// A nested structured tensor.
    Structured(StructuredTensor),
}
impl FieldValue {
    /// The static shape of the value.
    pub fn static_shape(&self) -> TensorShape {
        match self {
            FieldValue::Tensor(t) => t.static_shape().clone(),
            FieldValue::Ragged(rt) => rt.static_shape(),
            FieldValue::Structured(st) => st.shape().clone(),
        }
    }

    /// The runtime rank of the value.
    pub fn rank(&self) -> usize {
        match self {
            FieldValue::Tensor(t) => t.rank(),
            FieldValue::Ragged(rt) => rt.rank(),
            FieldValue::Structured(st) => st.rank(),
        }
    }

    /// The runtime size of the outermost dimension, `None` for rank 0 values.
    pub fn nrows(&self) -> Option<usize> {
        match self {
            FieldValue::Tensor(t) => t.nrows(),
            FieldValue::Ragged(rt) => Some(rt.nrows()),
            FieldValue::Structured(st) => st.nrows(),
        }
    }

    /// Get the value as a dense tensor.
    pub fn as_tensor(&self) -> Option<&DenseTensor> {
        match self {
            FieldValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Get the value as a ragged tensor.
    pub fn as_ragged(&self) -> Option<&RaggedTensor> {
        match self {
            FieldValue::Ragged(rt) => Some(rt),
            _ => None,
        }
    }

    /// Get the value as a structured tensor.
    pub fn as_structured(&self) -> Option<&StructuredTensor> {
        match self {
            FieldValue::Structured(st) => Some(st),
            _ => None,
        }
    }

    /// Convert the value to a nested native value.
    ///
    /// Dense and ragged tensors become nested lists of scalars, and structured tensors nested lists of
    /// dictionaries, see [`StructuredTensor::to_pyval`].
    pub fn to_pyval(&self) -> Result<NativeValue> {
        match self {
            FieldValue::Tensor(t) => t.to_native(),
            FieldValue::Ragged(rt) => rt.to_native(),
            FieldValue::Structured(st) => st.to_pyval(),
        }
    }

    /// The type spec describing the value.
    pub fn type_spec(&self) -> TypeSpec {
        match self {
            FieldValue::Tensor(t) => TensorSpec::new(t.static_shape().clone(), t.dtype()).into(),
            FieldValue::Ragged(rt) => RaggedTensorSpec::for_value(rt).into(),
            FieldValue::Structured(st) => st.type_spec().into(),
        }
    }

    /// The index type of the row partitions of the value, `None` for values without row partitions.
    pub(crate) fn shape_dtype(&self) -> Option<IndexType> {
        match self {
            FieldValue::Tensor(_) => None,
            FieldValue::Ragged(rt) => Some(rt.row_splits_dtype()),
            FieldValue::Structured(st) => (st.rank() > 0).then_some(st.shape_dtype),
        }
    }
}
impl From<DenseTensor> for FieldValue {
    fn from(value: DenseTensor) -> Self {
        FieldValue::Tensor(value)
    }
}
impl From<RaggedTensor> for FieldValue {
    fn from(value: RaggedTensor) -> Self {
        FieldValue::Ragged(value)
    }
}
impl From<StructuredTensor> for FieldValue {
    fn from(value: StructuredTensor) -> Self {
        FieldValue::Structured(value)
    }
}
impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldValue::Tensor(t) => write!(f, "{t}"),
            FieldValue::Ragged(rt) => write!(f, "{rt}"),
            FieldValue::Structured(st) => write!(f, "{st}"),
        }
    }
}

/// A field passed to [`StructuredTensor::from_fields`]: either a tensor value, or a native value that is converted
/// to a tensor.
///
/// Native values are converted according to their nesting: as long as all the lists at a nesting level have the
/// same length the level is a dense dimension, and starting at the first level with lists of different lengths all
/// the levels are ragged. Dictionaries are not accepted, use a nested [`StructuredTensor`] instead.
#[derive(Clone, Debug)]
pub enum FieldInput {
    /// A tensor value.
    Value(FieldValue),
    /// A native scalar or nested list of scalars.
    Native(NativeValue),
}
impl From<FieldValue> for FieldInput {
    fn from(value: FieldValue) -> Self {
        FieldInput::Value(value)
    }
}
impl From<DenseTensor> for FieldInput {
    fn from(value: DenseTensor) -> Self {
        FieldInput::Value(value.into())
    }
}
impl From<RaggedTensor> for FieldInput {
    fn from(value: RaggedTensor) -> Self {
        FieldInput::Value(value.into())
    }
}
impl From<StructuredTensor> for FieldInput {
    fn from(value: StructuredTensor) -> Self {
        FieldInput::Value(value.into())
    }
}
impl From<NativeValue> for FieldInput {
    fn from(value: NativeValue) -> Self {
        FieldInput::Native(value)
    }
}
macro_rules! impl_native_field_input {
    ($($rust_type:ty),*) => {
        $(
            impl From<$rust_type> for FieldInput {
                fn from(value: $rust_type) -> Self {
                    FieldInput::Native(value.into())
                }
            }
        )*
    };
}
impl_native_field_input!(bool, i32, i64, f32, f64, &str, String);
impl<T: Into<NativeValue>> From<Vec<T>> for FieldInput {
    fn from(value: Vec<T>) -> Self {
        FieldInput::Native(value.into())
    }
}

/// The number of rows of a structured tensor, given as a hint to [`StructuredTensor::from_fields_with`].
///
/// A hint with an index type takes part in the agreement of index types between the fields, like a row count
/// tensor of that dtype would.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nrows {
    value: usize,
    dtype: Option<IndexType>,
}
impl Nrows {
    /// A row count without an index type.
    pub fn new(value: usize) -> Self {
        Self { value, dtype: None }
    }

    /// A row count with an index type.
    pub fn with_dtype(value: usize, dtype: IndexType) -> Self {
        Self {
            value,
            dtype: Some(dtype),
        }
    }

    /// The number of rows.
    pub fn value(self) -> usize {
        self.value
    }

    /// The index type, if any.
    pub fn dtype(self) -> Option<IndexType> {
        self.dtype
    }
}
impl From<usize> for Nrows {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

/// Optional arguments of [`StructuredTensor::from_fields_with`].
#[derive(Clone, Debug, Default)]
pub struct FromFieldsOptions {
    /// The number of rows, allowed only for rank 1 or higher.
    pub nrows: Option<Nrows>,
    /// The row partitions of the inner dimensions, `rank - 1` of them, allowed only for rank 2 or higher.
    pub row_partitions: Option<Vec<RowPartition>>,
    /// Attach runtime consistency checks that can not be performed statically.
    pub validate: bool,
}
impl FromFieldsOptions {
    /// Options without hints and without validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of rows hint.
    pub fn nrows(mut self, nrows: impl Into<Nrows>) -> Self {
        self.nrows = Some(nrows.into());
        self
    }

    /// Set the row partitions hint.
    pub fn row_partitions(mut self, row_partitions: impl IntoIterator<Item = RowPartition>) -> Self {
        self.row_partitions = Some(row_partitions.into_iter().collect());
        self
    }

    /// Enable or disable runtime validation.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// A path of field names, used to look up nested fields with [`StructuredTensor::field_value`].
pub trait FieldPath {
    /// The field names of the path, outermost first.
    fn segments(&self) -> Vec<&str>;
}
impl FieldPath for str {
    fn segments(&self) -> Vec<&str> {
        crate::alloc::vec![self]
    }
}
impl FieldPath for String {
    fn segments(&self) -> Vec<&str> {
        crate::alloc::vec![self.as_str()]
    }
}
impl FieldPath for [&str] {
    fn segments(&self) -> Vec<&str> {
        self.to_vec()
    }
}
impl<const N: usize> FieldPath for [&str; N] {
    fn segments(&self) -> Vec<&str> {
        self.to_vec()
    }
}
impl FieldPath for Vec<&str> {
    fn segments(&self) -> Vec<&str> {
        self.clone()
    }
}

/// Format a path of field names as a tuple, `("a", "b")`, `("a",)` or `()`.
pub(crate) fn format_path<S: AsRef<str>>(segments: &[S]) -> String {
    let path = segments
        .iter()
        .map(|s| format!("{:?}", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    if segments.len() == 1 {
        format!("({path},)")
    } else {
        format!("({path})")
    }
}

/// A collection of named fields sharing a common shape.
///
/// The shape has a known rank, and each field value has at least that rank, with leading dimensions compatible
/// with the shape. For rank 1 and higher the structured tensor has a number of rows, and for rank 2 and higher the
/// inner dimensions are described by `rank - 1` row partitions shared by all fields.
///
/// Structured tensors are immutable. They are created by the validated constructors
/// [`from_fields`](Self::from_fields) and [`from_pyval`](Self::from_pyval), or derived from other structured
/// tensors by [`partition_outer_dimension`](Self::partition_outer_dimension) and [`merge_dims`](Self::merge_dims).
#[derive(Clone, Debug)]
pub struct StructuredTensor {
    fields: BTreeMap<String, FieldValue>,
    shape: TensorShape,
    nrows: Option<usize>,
    row_partitions: Vec<RowPartition>,
    shape_dtype: IndexType,
    checks: Vec<Check>,
}
impl StructuredTensor {
    pub(crate) fn new_unchecked(
        fields: BTreeMap<String, FieldValue>,
        shape: TensorShape,
        nrows: Option<usize>,
        row_partitions: Vec<RowPartition>,
        shape_dtype: IndexType,
        checks: Vec<Check>,
    ) -> Self {
        debug_assert_eq!(shape.rank().map(|r| r.saturating_sub(1)), Some(row_partitions.len()));
        Self {
            fields,
            shape,
            nrows,
            row_partitions,
            shape_dtype,
            checks,
        }
    }

    /// Create a structured tensor from its fields and shape, without hints and without runtime validation.
    ///
    /// See [`from_fields_with`](Self::from_fields_with).
    pub fn from_fields<K: Into<String>>(
        fields: impl IntoIterator<Item = (K, FieldInput)>,
        shape: impl Into<TensorShape>,
    ) -> Result<Self> {
        Self::from_fields_with(fields, shape, FromFieldsOptions::default())
    }

    /// Create a structured tensor from its fields and shape.
    ///
    /// The shape must have a known rank, and its unknown dimensions are inferred from the fields. For rank 1 the
    /// number of rows is inferred from the fields, and must be given by `options.nrows` (or the shape) if there are
    /// no fields. For rank 2 and higher the row partitions are inferred from the fields, and must be given by
    /// `options.row_partitions` if there are no fields and the shape is not fully defined.
    ///
    /// Inconsistencies between the fields that can be detected statically fail immediately. Others are recorded as
    /// deferred checks if `options.validate` is set, and run by [`evaluate`](Self::evaluate).
    ///
    /// # Errors
    ///
    /// Fails if the shape has unknown rank, if the hints do not fit the rank, if a field name is empty or starts
    /// with an underscore, if a native field value can not be converted to a tensor, or if the fields are
    /// incompatible with the shape or with each other.
    pub fn from_fields_with<K: Into<String>>(
        fields: impl IntoIterator<Item = (K, FieldInput)>,
        shape: impl Into<TensorShape>,
        options: FromFieldsOptions,
    ) -> Result<Self> {
        let shape = shape.into();
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect::<Vec<_>>();
        log::debug!(
            "StructuredTensor::from_fields: {} fields, shape={shape}, validate={}",
            fields.len(),
            options.validate
        );
        let FromFieldsOptions {
            nrows,
            row_partitions,
            validate,
        } = options;

        let Some(rank) = shape.rank() else {
            return Err(Error::InvalidArgument(String::from(
                "StructuredTensor's shape must have known rank.",
            )));
        };
        if rank < 2 && row_partitions.as_ref().is_some_and(|rp| !rp.is_empty()) {
            return Err(Error::InvalidArgument(String::from(
                "row_partitions must be None or [] if shape.rank<2",
            )));
        }
        if rank == 0 && nrows.is_some() {
            return Err(Error::InvalidArgument(String::from(
                "nrows must be None if shape.rank==0",
            )));
        }
        let row_partitions = match row_partitions {
            Some(rp) if rank >= 2 && rp.len() != rank - 1 => {
                return Err(Error::InvalidArgument(format!(
                    "len(row_partitions) must be shape.rank-1, got {} row partitions for rank {rank}",
                    rp.len()
                )));
            }
            Some(rp) if rank >= 2 => Some(rp),
            _ => None,
        };

        let fields = validate::convert_fields(fields)?;
        let shape_dtype = validate::find_shape_dtype(&fields, nrows, row_partitions.as_deref())?;
        let resolved = resolve::resolve(
            shape,
            nrows.map(Nrows::value),
            row_partitions,
            &fields,
            shape_dtype,
            validate,
        )?;
        log::debug!(
            "StructuredTensor::from_fields: resolved shape={}, {} deferred checks",
            resolved.shape,
            resolved.checks.len()
        );
        Ok(Self::new_unchecked(
            fields,
            resolved.shape,
            resolved.nrows,
            resolved.row_partitions,
            shape_dtype,
            resolved.checks,
        ))
    }

    /// The names of the fields, in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The fields, in sorted order of their names.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get the value of a field by name, or of a nested field by a path of names.
    ///
    /// ```rust
    /// use structured_tensor::pyval;
    /// use structured_tensor::structured::StructuredTensor;
    ///
    /// let value = StructuredTensor::from_pyval(&pyval!({"a": {"b": 1}}), None)?;
    /// let st = value.as_structured().unwrap();
    /// assert!(st.field_value("a")?.as_structured().is_some());
    /// assert!(st.field_value(&["a", "b"])?.as_tensor().is_some());
    /// assert!(st.field_value(&["a", "c"]).is_err());
    /// # Ok::<(), structured_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the path is empty, or if a name of the path is not a field of the structured tensor containing it.
    pub fn field_value<P: FieldPath + ?Sized>(&self, path: &P) -> Result<&FieldValue> {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::InvalidArgument(String::from("field path must not be empty")));
        };
        let not_found = |missing: &str| {
            Error::NotFound(format!(
                "Field path {} not found in {self}: no field {missing:?}",
                format_path(&segments)
            ))
        };
        let mut st = self;
        for name in parents {
            match st.fields.get(*name) {
                Some(FieldValue::Structured(child)) => st = child,
                _ => return Err(not_found(name)),
            }
        }
        st.fields.get(*last).ok_or_else(|| not_found(last))
    }

    /// The static shape.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// The rank, which is always known.
    pub fn rank(&self) -> usize {
        self.row_partitions.len() + usize::from(self.nrows.is_some())
    }

    /// The number of rows, `None` for rank 0.
    pub fn nrows(&self) -> Option<usize> {
        self.nrows
    }

    /// The row partitions of the inner dimensions, `rank - 1` of them.
    pub fn row_partitions(&self) -> &[RowPartition] {
        &self.row_partitions
    }

    /// The index type of the number of rows and of the row partitions.
    pub fn shape_dtype(&self) -> IndexType {
        self.shape_dtype
    }

    /// Check if the structured tensor, or any nested structured tensor, has deferred checks that were not run yet.
    pub fn has_pending_checks(&self) -> bool {
        !self.checks.is_empty()
            || self.fields.values().any(|v| match v {
                FieldValue::Structured(st) => st.has_pending_checks(),
                _ => false,
            })
    }

    /// Run all the deferred checks, including these of nested structured tensors, and return the materialized
    /// structured tensor without pending checks.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CheckFailed`] on the first failing check.
    pub fn evaluate(&self) -> Result<Self> {
        for check in &self.checks {
            check.run()?;
        }
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Structured(st) => FieldValue::Structured(st.evaluate()?),
                    value => value.clone(),
                };
                Ok((name.clone(), value))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            fields,
            shape: self.shape.clone(),
            nrows: self.nrows,
            row_partitions: self.row_partitions.clone(),
            shape_dtype: self.shape_dtype,
            checks: Vec::new(),
        })
    }

    /// The type spec describing the structured tensor.
    pub fn type_spec(&self) -> StructuredTensorSpec {
        StructuredTensorSpec::for_value(self)
    }
}

/// Deferred checks are not part of the value.
impl PartialEq for StructuredTensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.nrows == other.nrows
            && self.row_partitions == other.row_partitions
            && self.fields == other.fields
    }
}

impl std::fmt::Display for StructuredTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("<StructuredTensor(fields={")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name:?}: {value}")?;
        }
        write!(f, "}}, shape={})>", self.shape)
    }
}
