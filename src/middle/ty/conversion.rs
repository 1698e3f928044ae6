//! Implicit conversions between types, applied when an argument does not have
//! exactly the type a function expects.

use std::sync::Arc;

use hashbrown::HashMap;
use indoc::formatdoc;

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        instance::{FunctionInstance, FunctionType},
        ty::{NumericKind, TypeCategory, VariableType},
    },
};

/// How a value is turned into a value of another type.
#[derive(Debug, Clone)]
pub enum Conversion {
    /// The value already has the target type
    Identity,
    /// A C cast between numeric scalars
    Cast(NumericKind),
    /// A call to a conversion function
    Call(Arc<FunctionInstance>),
}

impl Conversion {
    pub fn is_identity(&self) -> bool {
        matches!(self, Conversion::Identity)
    }

    pub fn instance(&self) -> Option<&Arc<FunctionInstance>> {
        match self {
            Conversion::Call(instance) => Some(instance),
            _ => None,
        }
    }

    /// Wraps `expression` so it evaluates to the target type.
    pub fn apply(&self, expression: &str) -> String {
        match self {
            Conversion::Identity => expression.to_string(),
            Conversion::Cast(kind) => format!("(({}) {expression})", kind.c_type()),
            Conversion::Call(instance) => instance.call_code(&[expression.to_string()]),
        }
    }
}

impl PartialEq for Conversion {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Conversion::Identity, Conversion::Identity) => true,
            (Conversion::Cast(a), Conversion::Cast(b)) => a == b,
            (Conversion::Call(a), Conversion::Call(b)) => a == b,
            _ => false,
        }
    }
}

/// A single way to reach a target type.
#[derive(Clone, Copy)]
pub struct ConversionRule {
    pub accepts: fn(&VariableType, &VariableType) -> bool,
    pub convert: fn(&VariableType, &VariableType) -> CompileResult<Conversion>,
}

/// Conversion rules grouped by the category of their target type. Rules of a
/// category are tried in registration order.
#[derive(Clone, Default)]
pub struct ConversionRules {
    rules: HashMap<TypeCategory, Vec<ConversionRule>>,
}

impl core::fmt::Debug for ConversionRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.rules.iter().map(|(category, rules)| (category, rules.len())))
            .finish()
    }
}

impl ConversionRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules between numeric scalars and matrices.
    pub fn builtin() -> Self {
        let mut rules = Self::empty();

        rules.register(
            TypeCategory::Scalar,
            ConversionRule {
                accepts: |from, _| from.is_scalar(),
                convert: |_, to| Ok(Conversion::Cast(kind_of(to)?)),
            },
        );
        rules.register(
            TypeCategory::Scalar,
            ConversionRule {
                accepts: |from, _| from.is_matrix(),
                convert: |from, to| Ok(Conversion::Call(Arc::new(first_element(from, to)?))),
            },
        );
        rules.register(
            TypeCategory::Matrix,
            ConversionRule {
                accepts: |from, to| {
                    matches!(
                        (from, to),
                        (VariableType::DynamicMatrix { element: a, .. }, VariableType::DynamicMatrix { element: b, .. })
                            if a == b
                    )
                },
                // Dynamic shapes are only checked at run time
                convert: |_, _| Ok(Conversion::Identity),
            },
        );
        rules.register(
            TypeCategory::Matrix,
            ConversionRule {
                accepts: |from, _| from.is_matrix(),
                convert: |from, to| Ok(Conversion::Call(Arc::new(copy_with_cast(from, to)?))),
            },
        );

        rules
    }

    pub fn register(&mut self, target: TypeCategory, rule: ConversionRule) {
        self.rules.entry(target).or_default().push(rule);
    }

    /// Finds a conversion from `from` to `to`. Types equal up to constants
    /// convert by identity, so converting twice is the same as once.
    pub fn convert(&self, from: &VariableType, to: &VariableType) -> CompileResult<Conversion> {
        if from.without_constant() == to.without_constant() {
            return Ok(Conversion::Identity);
        }

        self.rules
            .get(&to.category())
            .into_iter()
            .flatten()
            .find(|rule| (rule.accepts)(from, to))
            .ok_or_else(|| CompileError::conversion(from, to))
            .and_then(|rule| (rule.convert)(from, to))
    }
}

fn kind_of(ty: &VariableType) -> CompileResult<NumericKind> {
    ty.numeric_kind()
        .ok_or_else(|| CompileError::internal("conversion", format!("{ty} is not numeric")))
}

fn first_element(from: &VariableType, to: &VariableType) -> CompileResult<FunctionInstance> {
    let target = kind_of(to)?;
    let name = format!("get_first_{}_{}", from.small_id(), target.small_id());
    let access = match from {
        VariableType::DynamicMatrix { .. } => "a->data[0]",
        _ => "a[0]",
    };

    let code = formatdoc! {"
        static inline {target_type} {name}({parameter})
        {{
            return ({target_type}) {access};
        }}
        ",
        target_type = target.c_type(),
        parameter = from.declaration("a"),
    };

    Ok(FunctionInstance::literal(
        name,
        FunctionType::simple(&[from.clone()], Some(VariableType::scalar(target))),
        code,
    ))
}

fn copy_with_cast(from: &VariableType, to: &VariableType) -> CompileResult<FunctionInstance> {
    let target = kind_of(to)?;
    let name = format!("convert_{}_{}", from.small_id(), to.small_id());

    let code = match (from, to) {
        (VariableType::DynamicMatrix { .. }, VariableType::DynamicMatrix { .. }) => formatdoc! {"
            void {name}(const {from_type} a, {to_type}* y)
            {{
                tensor_{id}_alloc_like(y, a->dims, a->ndims);
                for (size_t i = 0; i < a->length; ++i) {{
                    (*y)->data[i] = ({target_type}) a->data[i];
                }}
            }}
            ",
            from_type = from.code(),
            to_type = to.code(),
            id = target.small_id(),
            target_type = target.c_type(),
        },
        _ => {
            let Some(numel) = from.shape().and_then(|shape| shape.numel()) else {
                return Err(CompileError::conversion(from, to));
            };

            formatdoc! {"
                void {name}({parameter}, {to_type}* y)
                {{
                    for (size_t i = 0; i < {numel}; ++i) {{
                        y[i] = ({target_type}) a[i];
                    }}
                }}
                ",
                parameter = from.declaration("a"),
                to_type = target.c_type(),
                target_type = target.c_type(),
            }
        }
    };

    Ok(FunctionInstance::literal(
        name,
        FunctionType::simple(&[from.clone()], Some(to.clone())),
        code,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::ty::TypeShape;

    #[test]
    fn conversions_are_idempotent() {
        let rules = ConversionRules::builtin();
        let types = [
            VariableType::double(),
            VariableType::scalar_constant(NumericKind::Int32, 4.0),
            VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d()),
            VariableType::static_matrix(NumericKind::Int8, TypeShape::known([2, 2])),
            VariableType::string("x"),
            VariableType::Pointer(Box::new(VariableType::int32())),
        ];

        for ty in &types {
            let conversion = rules.convert(ty, ty).unwrap();
            assert!(conversion.is_identity(), "{ty}");
            assert_eq!(conversion.apply("x"), "x");
        }
    }

    #[test]
    fn scalars_are_cast() {
        let rules = ConversionRules::builtin();
        let conversion = rules
            .convert(&VariableType::int32(), &VariableType::double())
            .unwrap();

        assert_eq!(conversion, Conversion::Cast(NumericKind::Double));
        assert_eq!(conversion.apply("i$1"), "((double) i$1)");
    }

    #[test]
    fn matrices_convert_through_calls() {
        let rules = ConversionRules::builtin();
        let tensor = VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d());

        let to_scalar = rules.convert(&tensor, &VariableType::int32()).unwrap();
        assert_eq!(to_scalar.instance().map(|i| i.name()), Some("get_first_td_i32"));
        assert_eq!(to_scalar.apply("A"), "get_first_td_i32(A)");

        let ints = VariableType::dynamic_matrix(NumericKind::Int32, TypeShape::unknown_2d());
        let to_ints = rules.convert(&tensor, &ints).unwrap();
        assert_eq!(to_ints.instance().map(|i| i.name()), Some("convert_td_ti32"));

        let reshaped = VariableType::dynamic_matrix(NumericKind::Double, TypeShape::known([1, 4]));
        assert!(rules.convert(&tensor, &reshaped).unwrap().is_identity());
    }

    #[test]
    fn missing_rules_are_errors() {
        let rules = ConversionRules::builtin();
        let string = VariableType::string("x");
        let pointer = VariableType::Pointer(Box::new(VariableType::int32()));
        let other_pointer = VariableType::Pointer(Box::new(VariableType::double()));

        assert_eq!(
            rules.convert(&string, &VariableType::double()),
            Err(CompileError::conversion(&string, &VariableType::double()))
        );
        assert_eq!(
            rules.convert(&pointer, &other_pointer),
            Err(CompileError::conversion(&pointer, &other_pointer))
        );
        assert!(
            ConversionRules::empty()
                .convert(&VariableType::int32(), &VariableType::double())
                .is_err()
        );
    }
}
