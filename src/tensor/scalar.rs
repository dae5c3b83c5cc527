use ndarray::{ArcArray, ArrayD, IxDyn};

use crate::alloc::String;
use crate::native::NativeValue;
use crate::scalar::{bf16, f16, half_conv, Complex};
use crate::tensor::TensorData;

/// Data types (dtypes) of the elements of dense tensors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DType {
    /// Boolean, `bool`
    Bool,
    /// 32-bit signed integer, `i32`
    Int32,
    /// 64-bit signed integer, `i64`
    Int64,
    /// 16-bit floating point, [`structured_tensor::scalar::f16`](`crate::scalar::f16`).
    Float16,
    /// 16-bit floating point using the bfloat16 format, [`structured_tensor::scalar::bf16`](`crate::scalar::bf16`).
    BFloat16,
    /// 32-bit floating point, `f32`
    Float32,
    /// 64-bit floating point, `f64`
    Float64,
    /// 32-bit complex floating point, [`structured_tensor::scalar::Complex<f32>`](`crate::scalar::Complex`).
    Complex64,
    /// 64-bit complex floating point, [`structured_tensor::scalar::Complex<f64>`](`crate::scalar::Complex`).
    Complex128,
    /// UTF-8 string, `String`
    String,
}
impl DType {
    /// Returns the lowercase name of the dtype, for example `int32`.
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::String => "string",
        }
    }
}
impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer types of row partitions and row counts.
///
/// Row splits are always stored as `usize`, the index type only bounds the values they may hold and has to agree
/// between all the fields of a structured tensor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum IndexType {
    /// 32-bit signed indices
    Int32,
    /// 64-bit signed indices
    #[default]
    Int64,
}
impl IndexType {
    /// The largest index representable by this type.
    pub fn max_value(self) -> usize {
        match self {
            IndexType::Int32 => i32::MAX as usize,
            IndexType::Int64 => usize::try_from(i64::MAX).unwrap_or(usize::MAX),
        }
    }

    /// The equivalent tensor dtype.
    pub fn dtype(self) -> DType {
        match self {
            IndexType::Int32 => DType::Int32,
            IndexType::Int64 => DType::Int64,
        }
    }
}
impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.dtype().name())
    }
}

/// A trait for types that can be used as elements of dense tensors.
pub trait Element: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The [`DType`] enum variant of the implementing type.
    const TYPE: DType;

    /// Convert a native scalar to an element, `None` if the value is not representable.
    fn from_native(value: &NativeValue) -> Option<Self>;

    /// Convert an element to a native scalar, `None` if the conversion is not available.
    fn to_native(&self) -> Option<NativeValue>;

    #[doc(hidden)]
    fn wrap(array: ArrayD<Self>) -> TensorData;

    #[doc(hidden)]
    fn unwrap(data: &TensorData) -> Option<&ArcArray<Self, IxDyn>>;

    private_decl! {}
}
macro_rules! impl_element {
    ($rust_type:ty, $variant:ident, |$from:ident| $from_native:expr, |$to:ident| $to_native:expr) => {
        impl Element for $rust_type {
            const TYPE: DType = DType::$variant;
            fn from_native($from: &NativeValue) -> Option<Self> {
                $from_native
            }
            fn to_native(&self) -> Option<NativeValue> {
                let $to = self;
                $to_native
            }
            fn wrap(array: ArrayD<Self>) -> TensorData {
                TensorData::$variant(array.into_shared())
            }
            fn unwrap(data: &TensorData) -> Option<&ArcArray<Self, IxDyn>> {
                match data {
                    TensorData::$variant(array) => Some(array),
                    _ => None,
                }
            }
            private_impl! {}
        }
    };
}

fn as_f64(value: &NativeValue) -> Option<f64> {
    match *value {
        NativeValue::Int(v) => Some(v as f64),
        NativeValue::Float(v) => Some(v),
        _ => None,
    }
}
fn as_complex(value: &NativeValue) -> Option<(f64, f64)> {
    match *value {
        NativeValue::Complex { re, im } => Some((re, im)),
        _ => as_f64(value).map(|re| (re, 0.0)),
    }
}

impl_element!(
    bool,
    Bool,
    |v| match v {
        NativeValue::Bool(b) => Some(*b),
        _ => None,
    },
    |v| Some(NativeValue::Bool(*v))
);
impl_element!(
    i32,
    Int32,
    |v| match v {
        NativeValue::Int(i) => i32::try_from(*i).ok(),
        _ => None,
    },
    |v| Some(NativeValue::Int((*v).into()))
);
impl_element!(
    i64,
    Int64,
    |v| match v {
        NativeValue::Int(i) => Some(*i),
        _ => None,
    },
    |v| Some(NativeValue::Int(*v))
);
impl_element!(
    f16,
    Float16,
    |v| as_f64(v).and_then(half_conv::f16_from_f64),
    |v| half_conv::f16_to_f64(*v).map(NativeValue::Float)
);
impl_element!(
    bf16,
    BFloat16,
    |v| as_f64(v).and_then(half_conv::bf16_from_f64),
    |v| half_conv::bf16_to_f64(*v).map(NativeValue::Float)
);
impl_element!(
    f32,
    Float32,
    |v| as_f64(v).map(|x| x as f32),
    |v| Some(NativeValue::Float((*v).into()))
);
impl_element!(
    f64,
    Float64,
    |v| as_f64(v),
    |v| Some(NativeValue::Float(*v))
);
impl_element!(
    Complex<f32>,
    Complex64,
    |v| as_complex(v).map(|(re, im)| Complex {
        re: re as f32,
        im: im as f32
    }),
    |v| Some(NativeValue::Complex {
        re: v.re.into(),
        im: v.im.into()
    })
);
impl_element!(
    Complex<f64>,
    Complex128,
    |v| as_complex(v).map(|(re, im)| Complex { re, im }),
    |v| Some(NativeValue::Complex { re: v.re, im: v.im })
);
impl_element!(
    String,
    String,
    |v| match v {
        NativeValue::Str(s) => Some(s.clone()),
        _ => None,
    },
    |v| Some(NativeValue::Str(v.clone()))
);
