//! Trees of native values: nested lists and dictionaries of scalars.
//!
//! [`NativeValue`] is the input of [`StructuredTensor::from_pyval`](crate::structured::StructuredTensor::from_pyval)
//! and the output of [`StructuredTensor::to_pyval`](crate::structured::StructuredTensor::to_pyval). The
//! [`pyval!`](crate::pyval) macro builds such trees with a literal syntax:
//! ```rust
//! use structured_tensor::native::NativeValue;
//! use structured_tensor::pyval;
//!
//! let value = pyval!({"a": 1, "b": [1.5, 2.5], "c": {"x": "Z"}});
//! assert!(value.is_dict());
//! assert_eq!(value.as_dict().unwrap()["a"], NativeValue::Int(1));
//! ```

use crate::alloc::{BTreeMap, String, Vec};

/// A native value: a scalar, a list of native values, or a dictionary of native values.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A complex number.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
    /// A string.
    Str(String),
    /// A list of values.
    List(Vec<NativeValue>),
    /// A dictionary with string keys.
    Dict(BTreeMap<String, NativeValue>),
}
impl NativeValue {
    /// Create a list value.
    pub fn list(items: impl IntoIterator<Item = NativeValue>) -> Self {
        NativeValue::List(items.into_iter().collect())
    }

    /// Create a dictionary value.
    pub fn dict<K: Into<String>>(items: impl IntoIterator<Item = (K, NativeValue)>) -> Self {
        NativeValue::Dict(items.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if the value is a dictionary.
    pub fn is_dict(&self) -> bool {
        matches!(self, NativeValue::Dict(_))
    }

    /// Check if the value is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, NativeValue::List(_))
    }

    /// Check if the value is a scalar, neither a list nor a dictionary.
    pub fn is_scalar(&self) -> bool {
        !self.is_list() && !self.is_dict()
    }

    /// Get the items of a list value.
    pub fn as_list(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the entries of a dictionary value.
    pub fn as_dict(&self) -> Option<&BTreeMap<String, NativeValue>> {
        match self {
            NativeValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Returns the maximal nesting depth of lists, `0` for scalars and dictionaries.
    pub fn list_depth(&self) -> usize {
        match self {
            NativeValue::List(items) => 1 + items.iter().map(Self::list_depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Returns the shape of a rectangular nested list, or `None` if the lists are not rectangular or the leaves
    /// are at different depths.
    ///
    /// Scalars (and dictionaries) have an empty shape.
    pub fn rectangular_shape(&self) -> Option<Vec<usize>> {
        let mut shape = Vec::new();
        let mut value = self;
        while let NativeValue::List(items) = value {
            shape.push(items.len());
            match items.first() {
                Some(first) => value = first,
                None => break,
            }
        }
        self.has_shape(&shape).then_some(shape)
    }

    fn has_shape(&self, shape: &[usize]) -> bool {
        match (self, shape.split_first()) {
            (NativeValue::List(items), Some((&len, rest))) => {
                items.len() == len && items.iter().all(|item| item.has_shape(rest))
            }
            (NativeValue::List(_), None) => false,
            (_, Some(_)) => false,
            (_, None) => true,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}
impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int(value.into())
    }
}
impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int(value)
    }
}
impl From<f32> for NativeValue {
    fn from(value: f32) -> Self {
        NativeValue::Float(value.into())
    }
}
impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Float(value)
    }
}
impl From<crate::scalar::Complex<f64>> for NativeValue {
    fn from(value: crate::scalar::Complex<f64>) -> Self {
        NativeValue::Complex {
            re: value.re,
            im: value.im,
        }
    }
}
impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::Str(value.into())
    }
}
impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Str(value)
    }
}
impl<T: Into<NativeValue>> From<Vec<T>> for NativeValue {
    fn from(value: Vec<T>) -> Self {
        NativeValue::List(value.into_iter().map(Into::into).collect())
    }
}
impl From<BTreeMap<String, NativeValue>> for NativeValue {
    fn from(value: BTreeMap<String, NativeValue>) -> Self {
        NativeValue::Dict(value)
    }
}

impl std::fmt::Display for NativeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NativeValue::Bool(value) => write!(f, "{value}"),
            NativeValue::Int(value) => write!(f, "{value}"),
            NativeValue::Float(value) => write!(f, "{value:?}"),
            NativeValue::Complex { re, im } => write!(f, "({re:?}{im:+?}j)"),
            NativeValue::Str(value) => write!(f, "{value:?}"),
            NativeValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            NativeValue::Dict(dict) => {
                f.write_str("{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Build a [`NativeValue`] with a literal syntax similar to Python or JSON.
///
/// Dictionaries are written with string literal keys, lists with brackets, and any other expression is
/// converted with [`NativeValue::from`]. Negative numbers and other multi-token expressions must be
/// parenthesized when nested.
/// ```rust
/// use structured_tensor::pyval;
///
/// let value = pyval!([{"x": 1, "y": [(-1), 2]}, {"x": 2, "y": []}]);
/// assert_eq!(value.to_string(), r#"[{"x": 1, "y": [-1, 2]}, {"x": 2, "y": []}]"#);
/// ```
#[macro_export]
macro_rules! pyval {
    ({ $($key:literal : $value:tt),* $(,)? }) => {
        $crate::native::NativeValue::Dict({
            #[allow(unused_mut)]
            let mut dict = $crate::__private::alloc::BTreeMap::new();
            $(
                dict.insert($crate::__private::alloc::String::from($key), $crate::pyval!($value));
            )*
            dict
        })
    };
    ([ $($value:tt),* $(,)? ]) => {
        $crate::native::NativeValue::List($crate::__private::alloc::vec![$($crate::pyval!($value)),*])
    };
    ($value:expr) => {
        $crate::native::NativeValue::from($value)
    };
}

#[cfg(test)]
mod tests {
    use crate::alloc::{vec, ToString};

    use super::NativeValue;

    #[test]
    fn macro_builds_nested_values() {
        let value = pyval!({"a": 12, "b": [1, 2, 3], "c": {"x": "Z", "y": [true, false]}});
        let dict = value.as_dict().unwrap();
        assert_eq!(dict["a"], NativeValue::Int(12));
        assert_eq!(
            dict["b"],
            NativeValue::List(vec![
                NativeValue::Int(1),
                NativeValue::Int(2),
                NativeValue::Int(3)
            ])
        );
        let c = dict["c"].as_dict().unwrap();
        assert_eq!(c["x"], NativeValue::Str("Z".to_string()));
        assert_eq!(c["y"], NativeValue::from(vec![true, false]));

        assert_eq!(pyval!([]), NativeValue::List(vec![]));
        assert!(pyval!({}).as_dict().unwrap().is_empty());
        assert_eq!(pyval!((-3)), NativeValue::Int(-3));
    }

    #[test]
    fn list_depth() {
        assert_eq!(pyval!(5).list_depth(), 0);
        assert_eq!(pyval!([]).list_depth(), 1);
        assert_eq!(pyval!([[1, 2], [3]]).list_depth(), 2);
        assert_eq!(pyval!([[], [[1]]]).list_depth(), 3);
        assert_eq!(pyval!([{"a": [1]}]).list_depth(), 1);
    }

    #[test]
    fn rectangular_shape() {
        assert_eq!(pyval!(5).rectangular_shape(), Some(vec![]));
        assert_eq!(pyval!([]).rectangular_shape(), Some(vec![0]));
        assert_eq!(pyval!([[], []]).rectangular_shape(), Some(vec![2, 0]));
        assert_eq!(
            pyval!([[1, 2, 3], [4, 5, 6]]).rectangular_shape(),
            Some(vec![2, 3])
        );
        assert_eq!(pyval!([[1, 2], [3]]).rectangular_shape(), None);
        assert_eq!(pyval!([1, [2]]).rectangular_shape(), None);
        assert_eq!(pyval!([[1], 2]).rectangular_shape(), None);
    }

    #[test]
    fn display() {
        let value = pyval!({"a": [1, 2.5], "b": "s", "c": true});
        assert_eq!(value.to_string(), r#"{"a": [1, 2.5], "b": "s", "c": true}"#);
    }
}
