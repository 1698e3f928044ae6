//! Least upper bound of two types, used wherever values meet at a control
//! flow join.

use crate::{
    error::{CompileError, CompileResult},
    middle::ty::{ScalarType, VariableType},
};

/// The most precise type that can hold values of both `a` and `b`, or `None`
/// if no such type exists.
pub fn combine(a: &VariableType, b: &VariableType) -> Option<VariableType> {
    if a == b {
        return Some(a.clone());
    }

    match (a, b) {
        (VariableType::Scalar(x), VariableType::Scalar(y)) => Some(combine_scalars(x, y)),
        (
            VariableType::DynamicMatrix {
                element: x,
                shape: x_shape,
            },
            VariableType::DynamicMatrix {
                element: y,
                shape: y_shape,
            },
        ) => Some(VariableType::DynamicMatrix {
            element: x.widen(*y),
            shape: x_shape.combine(y_shape),
        }),
        // Static matrices, strings, pointers, literals and structs only merge
        // with themselves
        _ => None,
    }
}

fn combine_scalars(x: &ScalarType, y: &ScalarType) -> VariableType {
    if x.kind == y.kind {
        // Different constants of the same kind
        return VariableType::scalar(x.kind);
    }

    VariableType::scalar(x.kind.widen(y.kind))
}

/// Folds [`combine`] over all of `types`. An empty list has no bound; a pair
/// without a bound is a conversion error.
pub fn combine_all<'a>(
    types: impl IntoIterator<Item = &'a VariableType>,
) -> CompileResult<Option<VariableType>> {
    let mut types = types.into_iter();
    let Some(first) = types.next() else {
        return Ok(None);
    };

    types
        .try_fold(first.clone(), |acc, ty| {
            combine(&acc, ty).ok_or_else(|| CompileError::conversion(ty, &acc))
        })
        .map(Some)
}
