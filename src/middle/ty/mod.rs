//! Types of the target language. Every SSA variable ends up with one of these
//! after type inference, and function instances are specialized on them.

use itertools::Itertools;
use strum::{EnumIter, EnumString};

pub mod combine;
pub mod conversion;
pub mod numeric;
pub mod shape;

pub use numeric::NumericKind;
pub use shape::TypeShape;

/// A numeric value known at compile time. Compared by bit pattern so types
/// stay hashable.
#[derive(Debug, Clone, Copy)]
pub struct ScalarConstant(pub f64);

impl PartialEq for ScalarConstant {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ScalarConstant {}

impl core::hash::Hash for ScalarConstant {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl core::fmt::Display for ScalarConstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScalarType {
    pub kind: NumericKind,
    pub constant: Option<ScalarConstant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: VariableType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// int32, double (=2.5)
    Scalar(ScalarType),
    /// *T
    Pointer(Box<VariableType>),
    /// double[2x3]
    ///
    /// A fixed size array whose shape is known when compiling
    StaticMatrix {
        element: NumericKind,
        shape: TypeShape,
    },
    /// tensor<double>[?x?]
    ///
    /// A heap allocated tensor carrying its own shape at run time
    DynamicMatrix {
        element: NumericKind,
        shape: TypeShape,
    },
    /// string("abc")
    String { value: Option<String> },
    /// A type spelled verbatim in the target language, like `FILE*`
    Literal(String),
    /// struct name { fields }
    Struct {
        name: String,
        fields: Vec<StructField>,
    },
    /// The type of something that has no value, such as the missing output of
    /// a call that returns nothing
    Undefined,
}

/// The family a type belongs to. Conversion rules are keyed by the category of
/// their target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum TypeCategory {
    Scalar,
    Pointer,
    Matrix,
    String,
    Literal,
    Struct,
    Undefined,
}

impl VariableType {
    pub fn scalar(kind: NumericKind) -> Self {
        Self::Scalar(ScalarType {
            kind,
            constant: None,
        })
    }

    pub fn scalar_constant(kind: NumericKind, value: f64) -> Self {
        Self::Scalar(ScalarType {
            kind,
            constant: Some(ScalarConstant(value)),
        })
    }

    pub fn double() -> Self {
        Self::scalar(NumericKind::Double)
    }

    pub fn int32() -> Self {
        Self::scalar(NumericKind::Int32)
    }

    pub fn logical() -> Self {
        Self::scalar(NumericKind::Logical)
    }

    pub fn dynamic_matrix(element: NumericKind, shape: TypeShape) -> Self {
        Self::DynamicMatrix { element, shape }
    }

    pub fn static_matrix(element: NumericKind, shape: TypeShape) -> Self {
        Self::StaticMatrix { element, shape }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: Some(value.into()),
        }
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            VariableType::Scalar(_) => TypeCategory::Scalar,
            VariableType::Pointer(_) => TypeCategory::Pointer,
            VariableType::StaticMatrix { .. } | VariableType::DynamicMatrix { .. } => {
                TypeCategory::Matrix
            }
            VariableType::String { .. } => TypeCategory::String,
            VariableType::Literal(_) => TypeCategory::Literal,
            VariableType::Struct { .. } => TypeCategory::Struct,
            VariableType::Undefined => TypeCategory::Undefined,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, VariableType::Scalar(_))
    }

    pub fn is_matrix(&self) -> bool {
        self.category() == TypeCategory::Matrix
    }

    pub fn is_string(&self) -> bool {
        matches!(self, VariableType::String { .. })
    }

    /// Scalars and matrices of any numeric kind.
    pub fn is_numeric(&self) -> bool {
        self.numeric_kind().is_some()
    }

    /// The kind of a scalar, or the element kind of a matrix.
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            VariableType::Scalar(scalar) => Some(scalar.kind),
            VariableType::StaticMatrix { element, .. }
            | VariableType::DynamicMatrix { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<&TypeShape> {
        match self {
            VariableType::StaticMatrix { shape, .. } | VariableType::DynamicMatrix { shape, .. } => {
                Some(shape)
            }
            _ => None,
        }
    }

    pub fn constant(&self) -> Option<f64> {
        match self {
            VariableType::Scalar(ScalarType {
                constant: Some(constant),
                ..
            }) => Some(constant.0),
            _ => None,
        }
    }

    /// The same type with any compile time constant forgotten.
    #[must_use]
    pub fn without_constant(&self) -> Self {
        match self {
            VariableType::Scalar(scalar) => VariableType::scalar(scalar.kind),
            VariableType::String { .. } => VariableType::String { value: None },
            other => other.clone(),
        }
    }

    /// Type of a single element of a matrix, as a scalar.
    pub fn element_type(&self) -> Option<VariableType> {
        match self {
            VariableType::StaticMatrix { element, .. }
            | VariableType::DynamicMatrix { element, .. } => Some(VariableType::scalar(*element)),
            _ => None,
        }
    }

    /// C spelling of the type, as used in a declaration.
    pub fn code(&self) -> String {
        match self {
            VariableType::Scalar(scalar) => scalar.kind.c_type().to_string(),
            VariableType::Pointer(inner) => format!("{}*", inner.code()),
            VariableType::StaticMatrix { element, .. } => element.c_type().to_string(),
            VariableType::DynamicMatrix { element, .. } => format!("tensor_{}*", element.small_id()),
            VariableType::String { .. } => "const char*".to_string(),
            VariableType::Literal(code) => code.clone(),
            VariableType::Struct { name, .. } => format!("struct {name}"),
            VariableType::Undefined => "void".to_string(),
        }
    }

    /// A full C declaration of a variable of this type.
    pub fn declaration(&self, name: &str) -> String {
        match self {
            VariableType::StaticMatrix { element, shape } => match shape.numel() {
                Some(numel) => format!("{} {name}[{numel}]", element.c_type()),
                None => format!("{}* {name}", element.c_type()),
            },
            other => format!("{} {name}", other.code()),
        }
    }

    /// Short tag used to build instance names.
    pub fn small_id(&self) -> String {
        match self {
            VariableType::Scalar(scalar) => scalar.kind.small_id().to_string(),
            VariableType::Pointer(inner) => format!("p{}", inner.small_id()),
            VariableType::StaticMatrix { element, shape } => format!(
                "s{}{}",
                element.small_id(),
                shape
                    .dims()
                    .unwrap_or_default()
                    .iter()
                    .map(|dim| dim.map_or("x".to_string(), |d| d.to_string()))
                    .join("_")
            ),
            VariableType::DynamicMatrix { element, .. } => format!("t{}", element.small_id()),
            VariableType::String { .. } => "str".to_string(),
            VariableType::Literal(_) => "l".to_string(),
            VariableType::Struct { name, .. } => name.clone(),
            VariableType::Undefined => "u".to_string(),
        }
    }

    /// Headers the emitted code needs to use this type.
    pub fn includes(&self) -> Vec<&'static str> {
        match self {
            VariableType::Scalar(scalar) => match scalar.kind {
                NumericKind::Logical => vec!["stdbool.h"],
                kind if kind.is_integer() => vec!["stdint.h"],
                _ => Vec::new(),
            },
            VariableType::DynamicMatrix { .. } => vec!["tensor.h"],
            VariableType::Pointer(inner) => inner.includes(),
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Scalar(ScalarType { kind, constant }) => match constant {
                Some(constant) => write!(f, "{kind} (={constant})"),
                None => write!(f, "{kind}"),
            },
            VariableType::Pointer(inner) => write!(f, "*{inner}"),
            VariableType::StaticMatrix { element, shape } => write!(f, "{element}{shape}"),
            VariableType::DynamicMatrix { element, shape } => write!(f, "tensor<{element}>{shape}"),
            VariableType::String { value: Some(value) } => write!(f, "string({value:?})"),
            VariableType::String { value: None } => write!(f, "string"),
            VariableType::Literal(code) => write!(f, "literal({code})"),
            VariableType::Struct { name, fields } => write!(
                f,
                "struct {name} {{ {} }}",
                fields
                    .iter()
                    .map(|field| format!("{}: {}", field.name, field.ty))
                    .join(", ")
            ),
            VariableType::Undefined => write!(f, "undefined"),
        }
    }
}
