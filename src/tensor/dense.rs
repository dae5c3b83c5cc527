use ndarray::{ArcArray, Array, ArrayD, ArrayViewD, Dimension, IxDyn};

use crate::alloc::{format, Arc, String, Vec};
use crate::native::NativeValue;
use crate::scalar::{bf16, f16, Complex};
use crate::tensor::{DType, Element, TensorShape};
use crate::{Error, Result};

/// The elements of a dense tensor, an n-dimensional array of one of the supported element types.
///
/// The arrays are reference counted, so reshaping and cloning share the elements instead of copying them.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum TensorData {
    Bool(ArcArray<bool, IxDyn>),
    Int32(ArcArray<i32, IxDyn>),
    Int64(ArcArray<i64, IxDyn>),
    Float16(ArcArray<f16, IxDyn>),
    BFloat16(ArcArray<bf16, IxDyn>),
    Float32(ArcArray<f32, IxDyn>),
    Float64(ArcArray<f64, IxDyn>),
    Complex64(ArcArray<Complex<f32>, IxDyn>),
    Complex128(ArcArray<Complex<f64>, IxDyn>),
    String(ArcArray<String, IxDyn>),
}

/// Evaluate an expression on the typed array inside a [`TensorData`].
macro_rules! dispatch {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            TensorData::Bool($array) => $body,
            TensorData::Int32($array) => $body,
            TensorData::Int64($array) => $body,
            TensorData::Float16($array) => $body,
            TensorData::BFloat16($array) => $body,
            TensorData::Float32($array) => $body,
            TensorData::Float64($array) => $body,
            TensorData::Complex64($array) => $body,
            TensorData::Complex128($array) => $body,
            TensorData::String($array) => $body,
        }
    };
}

/// Map the typed array inside a [`TensorData`] to a new array of the same element type.
macro_rules! map_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            TensorData::Bool($array) => TensorData::Bool($body),
            TensorData::Int32($array) => TensorData::Int32($body),
            TensorData::Int64($array) => TensorData::Int64($body),
            TensorData::Float16($array) => TensorData::Float16($body),
            TensorData::BFloat16($array) => TensorData::BFloat16($body),
            TensorData::Float32($array) => TensorData::Float32($body),
            TensorData::Float64($array) => TensorData::Float64($body),
            TensorData::Complex64($array) => TensorData::Complex64($body),
            TensorData::Complex128($array) => TensorData::Complex128($body),
            TensorData::String($array) => TensorData::String($body),
        }
    };
}

impl TensorData {
    /// The element type.
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Bool(_) => DType::Bool,
            TensorData::Int32(_) => DType::Int32,
            TensorData::Int64(_) => DType::Int64,
            TensorData::Float16(_) => DType::Float16,
            TensorData::BFloat16(_) => DType::BFloat16,
            TensorData::Float32(_) => DType::Float32,
            TensorData::Float64(_) => DType::Float64,
            TensorData::Complex64(_) => DType::Complex64,
            TensorData::Complex128(_) => DType::Complex128,
            TensorData::String(_) => DType::String,
        }
    }

    /// The runtime shape of the array.
    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    fn from_leaves(dtype: DType, shape: &[usize], leaves: &[&NativeValue]) -> Result<Self> {
        fn build<A: Element>(shape: &[usize], leaves: &[&NativeValue]) -> Result<ArcArray<A, IxDyn>> {
            let values = leaves
                .iter()
                .map(|v| {
                    A::from_native(v).ok_or_else(|| {
                        Error::InvalidType(format!("Can not convert {v} to a tensor of dtype {}", A::TYPE))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayD::from_shape_vec(IxDyn(shape), values)
                .map(ArrayD::into_shared)
                .map_err(|e| Error::InvalidArgument(format!("Invalid tensor shape {shape:?}: {e}")))
        }
        Ok(match dtype {
            DType::Bool => TensorData::Bool(build(shape, leaves)?),
            DType::Int32 => TensorData::Int32(build(shape, leaves)?),
            DType::Int64 => TensorData::Int64(build(shape, leaves)?),
            DType::Float16 => TensorData::Float16(build(shape, leaves)?),
            DType::BFloat16 => TensorData::BFloat16(build(shape, leaves)?),
            DType::Float32 => TensorData::Float32(build(shape, leaves)?),
            DType::Float64 => TensorData::Float64(build(shape, leaves)?),
            DType::Complex64 => TensorData::Complex64(build(shape, leaves)?),
            DType::Complex128 => TensorData::Complex128(build(shape, leaves)?),
            DType::String => TensorData::String(build(shape, leaves)?),
        })
    }
}

/// A dense n-dimensional tensor with a static shape.
///
/// The elements are shared between clones, so cloning a tensor is cheap. The static shape is always compatible
/// with the runtime shape of the elements, but may know less than it: dimensions (or the whole rank) can be
/// marked as unknown using [`with_static_shape`](DenseTensor::with_static_shape).
#[derive(Clone, Debug)]
pub struct DenseTensor {
    data: Arc<TensorData>,
    static_shape: TensorShape,
}
impl DenseTensor {
    /// Create a tensor from its elements, with a fully defined static shape.
    pub fn from_data(data: TensorData) -> Self {
        let static_shape = TensorShape::from(data.shape());
        Self {
            data: Arc::new(data),
            static_shape,
        }
    }

    /// Create a tensor from an ndarray array.
    pub fn from_array<A: Element, D: Dimension>(array: Array<A, D>) -> Self {
        Self::from_data(A::wrap(array.into_dyn()))
    }

    /// Create a scalar (rank 0) tensor.
    pub fn scalar<A: Element>(value: A) -> Self {
        Self::from_array(ndarray::arr0(value))
    }

    /// Create a vector (rank 1) tensor.
    pub fn from_vec<A: Element>(values: Vec<A>) -> Self {
        Self::from_array(ndarray::Array1::from(values))
    }

    /// Create a tensor from a native value: a scalar or a rectangular nested list of scalars.
    ///
    /// If `dtype` is `None` it is inferred from the values: booleans become [`DType::Bool`], strings
    /// [`DType::String`], complex numbers [`DType::Complex128`], floats [`DType::Float64`] and integers
    /// [`DType::Int32`] if they all fit, [`DType::Int64`] otherwise. An empty list without a dtype is a
    /// [`DType::Float64`] tensor.
    ///
    /// # Errors
    ///
    /// Fails if the lists are not rectangular, if the values contain dictionaries or mix strings or booleans with
    /// other kinds of values, or if a value can not be represented by `dtype`.
    pub fn from_native(value: &NativeValue, dtype: Option<DType>) -> Result<Self> {
        let shape = value.rectangular_shape().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Can not convert non-rectangular nested list to a dense tensor: {value}"
            ))
        })?;
        let mut leaves = Vec::new();
        collect_leaves(value, &mut leaves)?;
        let dtype = match dtype {
            Some(dtype) => dtype,
            None => infer_dtype(&leaves)?,
        };
        Ok(Self::from_data(TensorData::from_leaves(dtype, &shape, &leaves)?))
    }

    /// Convert the tensor to a native value: a scalar for rank 0 tensors and nested lists otherwise.
    ///
    /// # Errors
    ///
    /// Fails for half precision elements if the `half` feature is disabled.
    pub fn to_native(&self) -> Result<NativeValue> {
        dispatch!(&*self.data, a => array_to_native(a.view()))
    }

    /// The elements of the tensor.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// The element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// The runtime shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// The runtime rank.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// The size of the outermost dimension, `None` for scalars.
    pub fn nrows(&self) -> Option<usize> {
        self.shape().first().copied()
    }

    /// The static shape, compatible with the runtime shape.
    pub fn static_shape(&self) -> &TensorShape {
        &self.static_shape
    }

    /// Returns the same tensor with a different static shape.
    ///
    /// # Errors
    ///
    /// Fails if `shape` is not compatible with the runtime shape.
    pub fn with_static_shape(&self, shape: impl Into<TensorShape>) -> Result<Self> {
        let shape = shape.into();
        if !shape.is_compatible_with(&TensorShape::from(self.shape())) {
            return Err(Error::Incompatible(format!(
                "Static shape {shape} is incompatible with the tensor shape {}",
                TensorShape::from(self.shape())
            )));
        }
        Ok(Self {
            data: Arc::clone(&self.data),
            static_shape: shape,
        })
    }

    /// Returns the same tensor with a static shape of unknown rank.
    pub fn with_unknown_shape(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            static_shape: TensorShape::unknown(),
        }
    }

    /// Get a view of the elements as an ndarray array, `None` if the element type is not `A`.
    pub fn as_array<A: Element>(&self) -> Option<ArrayViewD<'_, A>> {
        A::unwrap(&self.data).map(|a| a.view())
    }

    /// Returns a tensor with the same elements in row-major order and a new shape.
    ///
    /// The elements are shared with this tensor if they are in standard layout, and copied otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the number of elements of `shape` differs from the number of elements of the tensor.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        fn reshape_array<A: Clone>(array: &ArcArray<A, IxDyn>, shape: &[usize]) -> Result<ArcArray<A, IxDyn>> {
            let error = |e: ndarray::ShapeError| {
                Error::InvalidArgument(format!(
                    "Can not reshape tensor of shape {:?} to {shape:?}: {e}",
                    array.shape()
                ))
            };
            if array.is_standard_layout() {
                return array.clone().into_shape_with_order(IxDyn(shape)).map_err(error);
            }
            array.to_shape(IxDyn(shape)).map(|a| a.into_owned().into_shared()).map_err(error)
        }
        Ok(Self::from_data(map_data!(&*self.data, a => reshape_array(a, shape)?)))
    }
}
impl PartialEq for DenseTensor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
    }
}
impl<A: Element> From<A> for DenseTensor {
    fn from(value: A) -> Self {
        Self::scalar(value)
    }
}

fn collect_leaves<'a>(value: &'a NativeValue, leaves: &mut Vec<&'a NativeValue>) -> Result<()> {
    match value {
        NativeValue::List(items) => items.iter().try_for_each(|item| collect_leaves(item, leaves)),
        NativeValue::Dict(_) => Err(Error::InvalidType(format!(
            "Can not convert a dictionary to a dense tensor: {value}"
        ))),
        _ => {
            leaves.push(value);
            Ok(())
        }
    }
}

fn infer_dtype(leaves: &[&NativeValue]) -> Result<DType> {
    let (mut bools, mut strs, mut floats, mut complexes, mut wide) = (0, 0, 0, 0, false);
    for leaf in leaves {
        match **leaf {
            NativeValue::Bool(_) => bools += 1,
            NativeValue::Str(_) => strs += 1,
            NativeValue::Float(_) => floats += 1,
            NativeValue::Complex { .. } => complexes += 1,
            NativeValue::Int(i) => wide |= i32::try_from(i).is_err(),
            NativeValue::List(_) | NativeValue::Dict(_) => {}
        }
    }
    let mixed = |kind: &str| {
        Error::InvalidType(format!(
            "Can not convert a mix of {kind} and non-{kind} values to a dense tensor"
        ))
    };
    Ok(if leaves.is_empty() {
        DType::Float64
    } else if strs > 0 {
        if strs != leaves.len() {
            return Err(mixed("string"));
        }
        DType::String
    } else if bools > 0 {
        if bools != leaves.len() {
            return Err(mixed("boolean"));
        }
        DType::Bool
    } else if complexes > 0 {
        DType::Complex128
    } else if floats > 0 {
        DType::Float64
    } else if wide {
        DType::Int64
    } else {
        DType::Int32
    })
}

fn array_to_native<A: Element>(array: ArrayViewD<'_, A>) -> Result<NativeValue> {
    if array.ndim() == 0 {
        let elem = array
            .first()
            .ok_or_else(|| Error::InvalidState(String::from("empty rank 0 array")))?;
        return elem.to_native().ok_or_else(|| {
            Error::InvalidType(format!(
                "Can not convert elements of dtype {} to native values, enable the `half` feature",
                A::TYPE
            ))
        });
    }
    let items = array
        .outer_iter()
        .map(array_to_native)
        .collect::<Result<Vec<_>>>()?;
    Ok(NativeValue::List(items))
}
