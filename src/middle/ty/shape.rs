use itertools::{EitherOrBoth, Itertools};

/// Shape of a matrix: a list of dimensions, each possibly unknown. A shape
/// whose number of dimensions is unknown is [`TypeShape::Undefined`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Undefined,
    Dims(Vec<Option<usize>>),
}

impl TypeShape {
    pub fn scalar() -> Self {
        Self::Dims(vec![Some(1), Some(1)])
    }

    pub fn known(dims: impl IntoIterator<Item = usize>) -> Self {
        Self::Dims(dims.into_iter().map(Some).collect())
    }

    /// A 2D shape with unknown extents.
    pub fn unknown_2d() -> Self {
        Self::Dims(vec![None, None])
    }

    pub fn dims(&self) -> Option<&[Option<usize>]> {
        match self {
            TypeShape::Undefined => None,
            TypeShape::Dims(dims) => Some(dims),
        }
    }

    pub fn is_fully_defined(&self) -> bool {
        self.dims().is_some_and(|dims| dims.iter().all(Option::is_some))
    }

    /// Number of elements when every dimension is known and the product fits
    /// in a `usize`.
    pub fn numel(&self) -> Option<usize> {
        self.dims()?.iter().try_fold(1usize, |acc, dim| acc.checked_mul((*dim)?))
    }

    pub fn is_scalar(&self) -> bool {
        self.numel() == Some(1)
    }

    /// Dimensions swapped, for 2D shapes.
    pub fn transposed(&self) -> Self {
        match self.dims() {
            Some([rows, columns]) => Self::Dims(vec![*columns, *rows]),
            _ => Self::Undefined,
        }
    }

    /// The most precise shape describing both sides. Trailing singleton
    /// dimensions are implicit, so `2x3` and `2x3x1` agree.
    pub fn combine(&self, other: &TypeShape) -> TypeShape {
        let (Some(a), Some(b)) = (self.dims(), other.dims()) else {
            return TypeShape::Undefined;
        };

        Self::Dims(
            a.iter()
                .zip_longest(b)
                .map(|pair| match pair {
                    EitherOrBoth::Both(x, y) if x == y => *x,
                    EitherOrBoth::Left(x) | EitherOrBoth::Right(x) if *x == Some(1) => Some(1),
                    _ => None,
                })
                .collect(),
        )
    }
}

impl core::fmt::Display for TypeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeShape::Undefined => write!(f, "[*]"),
            TypeShape::Dims(dims) => write!(
                f,
                "[{}]",
                dims.iter()
                    .map(|dim| dim.map_or("?".to_string(), |d| d.to_string()))
                    .join("x")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numel_requires_every_dimension() {
        assert_eq!(TypeShape::known([2, 3]).numel(), Some(6));
        assert_eq!(TypeShape::Dims(vec![Some(2), None]).numel(), None);
        assert_eq!(TypeShape::Undefined.numel(), None);
        assert!(TypeShape::scalar().is_scalar());
    }

    #[test]
    fn numel_overflow_is_unknown() {
        let huge = TypeShape::known([10_000_000_000, 10_000_000_000]);

        assert_eq!(huge.numel(), None);
        assert!(!huge.is_scalar());
        assert!(huge.is_fully_defined());
    }

    #[test]
    fn combine_keeps_agreeing_dimensions() {
        let a = TypeShape::known([2, 3]);
        let b = TypeShape::known([2, 4]);

        assert_eq!(a.combine(&b), TypeShape::Dims(vec![Some(2), None]));
        assert_eq!(a.combine(&TypeShape::known([2, 3, 1])), TypeShape::known([2, 3, 1]));
        assert_eq!(a.combine(&TypeShape::Undefined), TypeShape::Undefined);
        assert_eq!(a.to_string(), "[2x3]");
        assert_eq!(a.transposed(), TypeShape::known([3, 2]));
    }
}
