use crate::alloc::Vec;

/// A single static dimension, `None` if unknown.
pub type Dim = Option<usize>;

/// The static shape of a value: possibly unknown rank, and possibly unknown dimensions.
///
/// Static shapes describe what is known about the shape of a value without looking at its data. Two shapes are
/// *compatible* if they could describe the same value, and *merging* them combines the knowledge of both.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TensorShape {
    dims: Option<Vec<Dim>>,
}
impl TensorShape {
    /// A shape of unknown rank.
    pub fn unknown() -> Self {
        Self { dims: None }
    }

    /// The shape of a scalar, rank 0.
    pub fn scalar() -> Self {
        Self {
            dims: Some(Vec::new()),
        }
    }

    /// A shape with the given dimensions.
    pub fn new(dims: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            dims: Some(dims.into_iter().collect()),
        }
    }

    /// A shape of known rank where all dimensions are unknown.
    pub fn unknown_dims(rank: usize) -> Self {
        Self::new(std::iter::repeat(None).take(rank))
    }

    /// The rank of the shape, `None` if unknown.
    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    /// The dimensions of the shape, `None` if the rank is unknown.
    pub fn dims(&self) -> Option<&[Dim]> {
        self.dims.as_deref()
    }

    /// The dimension at the given axis, `None` if unknown or out of range.
    pub fn dim(&self, axis: usize) -> Dim {
        self.dims.as_ref().and_then(|dims| dims.get(axis).copied().flatten())
    }

    /// Check if the rank and all the dimensions are known.
    pub fn is_fully_defined(&self) -> bool {
        self.dims
            .as_ref()
            .is_some_and(|dims| dims.iter().all(Option::is_some))
    }

    /// The dimensions of a fully defined shape.
    pub fn as_list(&self) -> Option<Vec<usize>> {
        self.dims.as_ref()?.iter().copied().collect()
    }

    /// The number of elements of a fully defined shape.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims.as_ref()?.iter().try_fold(1, |acc, d| d.map(|d| acc * d))
    }

    /// Check if the two shapes could describe the same value.
    pub fn is_compatible_with(&self, other: &TensorShape) -> bool {
        self.merge_with(other).is_some()
    }

    /// Combine the knowledge of two shapes, `None` if they are incompatible.
    pub fn merge_with(&self, other: &TensorShape) -> Option<TensorShape> {
        match (&self.dims, &other.dims) {
            (None, _) => Some(other.clone()),
            (_, None) => Some(self.clone()),
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                let dims = a
                    .iter()
                    .zip(b)
                    .map(|(&a, &b)| merge_dim(a, b))
                    .collect::<Option<Vec<_>>>()?;
                Some(TensorShape { dims: Some(dims) })
            }
        }
    }

    /// The first `n` dimensions, or all of them if the rank is smaller than `n`.
    ///
    /// A shape of unknown rank stays unknown.
    pub fn prefix(&self, n: usize) -> TensorShape {
        TensorShape {
            dims: self.dims.as_ref().map(|dims| dims.iter().take(n).copied().collect()),
        }
    }

    /// The dimensions starting at `axis`, empty if the rank is smaller than `axis`.
    ///
    /// A shape of unknown rank stays unknown.
    pub fn suffix(&self, axis: usize) -> TensorShape {
        TensorShape {
            dims: self.dims.as_ref().map(|dims| dims.iter().skip(axis).copied().collect()),
        }
    }

    /// The concatenation of two shapes, unknown if any of them has unknown rank.
    pub fn concatenate(&self, other: &TensorShape) -> TensorShape {
        match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => TensorShape::new(a.iter().chain(b).copied()),
            _ => TensorShape::unknown(),
        }
    }
}

/// Merge two static dimensions, `None` if both are known and differ.
fn merge_dim(a: Dim, b: Dim) -> Option<Dim> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => None,
        (Some(a), _) | (_, Some(a)) => Some(Some(a)),
        (None, None) => Some(None),
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.map(Some))
    }
}
impl<const N: usize> From<[Dim; N]> for TensorShape {
    fn from(dims: [Dim; N]) -> Self {
        Self::new(dims)
    }
}
impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.iter().copied().map(Some))
    }
}
impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims.into_iter().map(Some))
    }
}
impl From<Vec<Dim>> for TensorShape {
    fn from(dims: Vec<Dim>) -> Self {
        Self { dims: Some(dims) }
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Some(dims) = &self.dims else {
            return f.write_str("<unknown>");
        };
        f.write_str("(")?;
        for (i, dim) in dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match dim {
                Some(d) => write!(f, "{d}")?,
                None => f.write_str("None")?,
            }
        }
        if dims.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}
