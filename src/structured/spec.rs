use crate::alloc::{format, BTreeMap, String};
use crate::structured::validate::validate_field_name;
use crate::structured::{FieldValue, StructuredTensor};
use crate::tensor::{DType, IndexType, RaggedTensor, TensorShape};
use crate::{Error, Result};

/// The type of a dense tensor: a static shape and an element type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorSpec {
    shape: TensorShape,
    dtype: DType,
}
impl TensorSpec {
    /// Create a new spec. The shape may have unknown dimensions or unknown rank.
    pub fn new(shape: impl Into<TensorShape>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    /// The static shape.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// The element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

/// The type of a ragged tensor.
///
/// In addition to the static shape and element type, the spec fixes the number of ragged dimensions and the index
/// type of the row partitions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RaggedTensorSpec {
    shape: TensorShape,
    dtype: DType,
    ragged_rank: usize,
    row_splits_dtype: IndexType,
}
impl RaggedTensorSpec {
    /// Create a new spec with ragged rank `rank - 1` and [`IndexType::Int64`] row partitions.
    ///
    /// # Errors
    ///
    /// Fails if the shape does not have a known rank of at least 2.
    pub fn new(shape: impl Into<TensorShape>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        let rank = match shape.rank() {
            Some(rank) if rank >= 2 => rank,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "RaggedTensorSpec requires a shape of known rank at least 2, got {shape}"
                )));
            }
        };
        Ok(Self {
            shape,
            dtype,
            ragged_rank: rank - 1,
            row_splits_dtype: IndexType::default(),
        })
    }

    /// Returns the same spec with a different ragged rank.
    ///
    /// # Errors
    ///
    /// Fails unless `1 <= ragged_rank < rank`.
    pub fn with_ragged_rank(self, ragged_rank: usize) -> Result<Self> {
        let rank = self.shape.rank().unwrap_or(0);
        if ragged_rank == 0 || ragged_rank >= rank {
            return Err(Error::InvalidArgument(format!(
                "ragged_rank must be in the range [1, {rank}), got {ragged_rank}"
            )));
        }
        Ok(Self {
            ragged_rank,
            ..self
        })
    }

    /// Returns the same spec with a different index type for the row partitions.
    pub fn with_row_splits_dtype(self, row_splits_dtype: IndexType) -> Self {
        Self {
            row_splits_dtype,
            ..self
        }
    }

    /// The spec of an existing ragged tensor.
    pub fn for_value(value: &RaggedTensor) -> Self {
        Self {
            shape: value.static_shape(),
            dtype: value.dtype(),
            ragged_rank: value.ragged_rank(),
            row_splits_dtype: value.row_splits_dtype(),
        }
    }

    /// The static shape.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// The element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The number of ragged dimensions.
    pub fn ragged_rank(&self) -> usize {
        self.ragged_rank
    }

    /// The index type of the row partitions.
    pub fn row_splits_dtype(&self) -> IndexType {
        self.row_splits_dtype
    }
}

/// The type of a structured tensor: a static shape of known rank and the specs of its fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructuredTensorSpec {
    shape: TensorShape,
    field_specs: BTreeMap<String, TypeSpec>,
}
impl StructuredTensorSpec {
    /// Create a new spec.
    ///
    /// ```rust
    /// use structured_tensor::structured::{StructuredTensorSpec, TensorSpec};
    /// use structured_tensor::tensor::DType;
    ///
    /// let spec = StructuredTensorSpec::new([2], [("a", TensorSpec::new([2], DType::Int32).into())])?;
    /// assert_eq!(spec.to_string(), "StructuredTensorSpec(shape=(2,), fields={\"a\": TensorSpec(shape=(2,), dtype=int32)})");
    /// # Ok::<(), structured_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the shape has unknown rank, or if a field name is not allowed.
    pub fn new<K: Into<String>>(
        shape: impl Into<TensorShape>,
        field_specs: impl IntoIterator<Item = (K, TypeSpec)>,
    ) -> Result<Self> {
        let shape = shape.into();
        if shape.rank().is_none() {
            return Err(Error::InvalidArgument(String::from(
                "StructuredTensor's shape must have known rank.",
            )));
        }
        let mut specs = BTreeMap::new();
        for (name, spec) in field_specs {
            let name = name.into();
            validate_field_name(&name)?;
            specs.insert(name, spec);
        }
        Ok(Self {
            shape,
            field_specs: specs,
        })
    }

    /// The spec of an existing structured tensor.
    pub fn for_value(value: &StructuredTensor) -> Self {
        Self {
            shape: value.shape().clone(),
            field_specs: value
                .fields()
                .map(|(name, value)| (String::from(name), value.type_spec()))
                .collect(),
        }
    }

    /// The static shape, of known rank.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// The static rank.
    pub fn rank(&self) -> usize {
        self.shape.rank().unwrap_or(0)
    }

    /// The specs of the fields, in sorted order of their names.
    pub fn field_specs(&self) -> &BTreeMap<String, TypeSpec> {
        &self.field_specs
    }

    /// The spec of a single field.
    pub fn field_spec(&self, name: &str) -> Option<&TypeSpec> {
        self.field_specs.get(name)
    }
}

/// The type of a [`FieldValue`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    /// The type of a dense tensor.
    Tensor(TensorSpec),
    /// The type of a ragged tensor.
    Ragged(RaggedTensorSpec),
    /// The type of a structured tensor.
    Structured(StructuredTensorSpec),
}
impl TypeSpec {
    /// The static shape.
    pub fn shape(&self) -> &TensorShape {
        match self {
            TypeSpec::Tensor(spec) => spec.shape(),
            TypeSpec::Ragged(spec) => spec.shape(),
            TypeSpec::Structured(spec) => spec.shape(),
        }
    }

    /// Check if a value could be described by the spec.
    ///
    /// The kinds must match, the static shapes must be compatible, and the element and index types must be equal.
    /// Structured values must have exactly the fields of the spec, each compatible with its field spec.
    pub fn is_compatible_with(&self, value: &FieldValue) -> bool {
        if !self.shape().is_compatible_with(&value.static_shape()) {
            return false;
        }
        match (self, value) {
            (TypeSpec::Tensor(spec), FieldValue::Tensor(t)) => spec.dtype == t.dtype(),
            (TypeSpec::Ragged(spec), FieldValue::Ragged(rt)) => {
                spec.dtype == rt.dtype()
                    && spec.ragged_rank == rt.ragged_rank()
                    && spec.row_splits_dtype == rt.row_splits_dtype()
            }
            (TypeSpec::Structured(spec), FieldValue::Structured(st)) => {
                spec.field_specs.len() == st.field_names().count()
                    && st.fields().all(|(name, value)| {
                        spec.field_specs
                            .get(name)
                            .is_some_and(|spec| spec.is_compatible_with(value))
                    })
            }
            _ => false,
        }
    }
}
impl From<TensorSpec> for TypeSpec {
    fn from(spec: TensorSpec) -> Self {
        TypeSpec::Tensor(spec)
    }
}
impl From<RaggedTensorSpec> for TypeSpec {
    fn from(spec: RaggedTensorSpec) -> Self {
        TypeSpec::Ragged(spec)
    }
}
impl From<StructuredTensorSpec> for TypeSpec {
    fn from(spec: StructuredTensorSpec) -> Self {
        TypeSpec::Structured(spec)
    }
}

impl std::fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "TensorSpec(shape={}, dtype={})", self.shape, self.dtype)
    }
}
impl std::fmt::Display for RaggedTensorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "RaggedTensorSpec(shape={}, dtype={}, ragged_rank={}, row_splits_dtype={})",
            self.shape, self.dtype, self.ragged_rank, self.row_splits_dtype
        )
    }
}
impl std::fmt::Display for StructuredTensorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "StructuredTensorSpec(shape={}, fields={{", self.shape)?;
        for (i, (name, spec)) in self.field_specs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name:?}: {spec}")?;
        }
        f.write_str("})")
    }
}
impl std::fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeSpec::Tensor(spec) => write!(f, "{spec}"),
            TypeSpec::Ragged(spec) => write!(f, "{spec}"),
            TypeSpec::Structured(spec) => write!(f, "{spec}"),
        }
    }
}
