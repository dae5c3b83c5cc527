//! Custom scalar types that can be used as tensor elements.
//!
//! Half precision floating point types are provided by the `half` feature if enabled, otherwise a simple wrappers
//! around `u16` are provided without any arithmetic operations.
//!
//! Complex numbers are provided by the `num-complex` feature if enabled, otherwise a simple struct with real and
//! imaginary parts is provided without any arithmetic operations.

#[allow(unused_macros)]
macro_rules! half_type {
    ($(#[$outer:meta])* $name:ident) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        $(#[$outer])*
        pub struct $name(u16);
        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` from its raw bit representation.")]
            pub fn from_bits(bits: u16) -> Self {
                Self(bits)
            }
            #[doc = concat!("Get the raw bit representation of the `", stringify!($name), "`.")]
            pub fn to_bits(self) -> u16 {
                self.0
            }
        }
    };
}

cfg_if::cfg_if! { if #[cfg(feature = "half")] {
    pub use half::f16;
    pub use half::bf16;
} else {
    half_type!(
        /// A 16-bit floating point type implementing the IEEE 754-2008 standard `binary16` a.k.a "half"
        /// format.
        ///
        /// Doesn't provide any arithmetic operations, but can be converted to/from `u16`.
        /// Enable the `half` feature to get a fully functional `f16` type.
        #[allow(non_camel_case_types)]
        f16
    );

    half_type!(
        /// A 16-bit floating point type implementing the `bfloat16` format.
        ///
        /// Doesn't provide any arithmetic operations, but can be converted to/from `u16`.
        /// Enable the `half` feature to get a fully functional `bf16` type.
        #[allow(non_camel_case_types)]
        bf16
    );
} }

cfg_if::cfg_if! { if #[cfg(feature = "num-complex")] {
    pub use num_complex::Complex;
} else {
    /// A complex number in Cartesian form.
    ///
    /// Doesn't provide any arithmetic operations, but expose the real and imaginary parts.
    /// Enable the `num-complex` feature to get a fully functional `Complex` type.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    #[repr(C)]
    pub struct Complex<T> {
        /// Real portion of the complex number
        pub re: T,
        /// Imaginary portion of the complex number
        pub im: T,
    }
} }

/// Conversions between half precision floats and `f64`, available only with the `half` feature.
pub(crate) mod half_conv {
    use super::{bf16, f16};

    cfg_if::cfg_if! { if #[cfg(feature = "half")] {
        pub(crate) fn f16_from_f64(value: f64) -> Option<f16> {
            Some(f16::from_f64(value))
        }
        pub(crate) fn f16_to_f64(value: f16) -> Option<f64> {
            Some(value.to_f64())
        }
        pub(crate) fn bf16_from_f64(value: f64) -> Option<bf16> {
            Some(bf16::from_f64(value))
        }
        pub(crate) fn bf16_to_f64(value: bf16) -> Option<f64> {
            Some(value.to_f64())
        }
    } else {
        pub(crate) fn f16_from_f64(_value: f64) -> Option<f16> {
            None
        }
        pub(crate) fn f16_to_f64(_value: f16) -> Option<f64> {
            None
        }
        pub(crate) fn bf16_from_f64(_value: f64) -> Option<bf16> {
            None
        }
        pub(crate) fn bf16_to_f64(_value: bf16) -> Option<f64> {
            None
        }
    } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_parts() {
        let c = Complex { re: 1.5_f64, im: -2.0 };
        assert_eq!(c.re, 1.5);
        assert_eq!(c.im, -2.0);
        assert_eq!(c, Complex { re: 1.5, im: -2.0 });
    }

    #[cfg(feature = "half")]
    #[test]
    fn half_roundtrip() {
        assert_eq!(half_conv::f16_from_f64(0.5).and_then(half_conv::f16_to_f64), Some(0.5));
        assert_eq!(half_conv::bf16_from_f64(2.0).and_then(half_conv::bf16_to_f64), Some(2.0));
    }

    #[cfg(not(feature = "half"))]
    #[test]
    fn half_bits() {
        let x = f16::from_bits(0x3c00);
        assert_eq!(x.to_bits(), 0x3c00);
        assert_eq!(half_conv::f16_from_f64(1.0), None);
        assert_eq!(half_conv::f16_to_f64(x), None);
    }
}
