//! The builtin operations and the providers building their instances.

use indoc::formatdoc;
use strum::Display;

use crate::{
    config::MemoryAllocation,
    error::{CompileError, CompileResult},
    middle::{
        instance::{
            FunctionInstance, FunctionType, ProviderData,
            checker::InputsChecker,
            provider::{BuiltinProvider, InstanceBuilder, ProviderRegistry},
        },
        ty::{NumericKind, TypeShape, VariableType},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOperator {
    Plus,
    Minus,
    Times,
    RDivide,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Times => "*",
            BinaryOperator::RDivide => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Times
                | BinaryOperator::RDivide
        )
    }

    /// Evaluates the operator on two constants. Division by zero is left for
    /// run time.
    fn fold(self, a: f64, b: f64) -> Option<f64> {
        let truth = |value: bool| if value { 1.0 } else { 0.0 };

        match self {
            BinaryOperator::Plus => Some(a + b),
            BinaryOperator::Minus => Some(a - b),
            BinaryOperator::Times => Some(a * b),
            BinaryOperator::RDivide if b == 0.0 => None,
            BinaryOperator::RDivide => Some(a / b),
            BinaryOperator::Eq => Some(truth(a == b)),
            BinaryOperator::Ne => Some(truth(a != b)),
            BinaryOperator::Lt => Some(truth(a < b)),
            BinaryOperator::Le => Some(truth(a <= b)),
            BinaryOperator::Gt => Some(truth(a > b)),
            BinaryOperator::Ge => Some(truth(a >= b)),
        }
    }

    /// Kind of the result for operands of kind `operands`.
    fn result_kind(self, operands: NumericKind) -> NumericKind {
        match operands {
            _ if self.is_comparison() => NumericKind::Logical,
            kind if self == BinaryOperator::RDivide && !kind.is_float() => NumericKind::Double,
            NumericKind::Logical | NumericKind::Char => NumericKind::Double,
            kind => kind,
        }
    }
}

pub fn registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::default();

    let binary = |registry: &mut ProviderRegistry, operator: BinaryOperator, builder: InstanceBuilder| {
        registry.register(
            operator.to_string(),
            BuiltinProvider::new(
                InputsChecker::new()
                    .number_of_inputs(2)
                    .are_scalar()
                    .are_numeric()
                    .number_of_outputs_at_most(1),
                builder,
            ),
        );
    };

    binary(&mut registry, BinaryOperator::Plus, |data| scalar_binary(data, BinaryOperator::Plus));
    binary(&mut registry, BinaryOperator::Minus, |data| scalar_binary(data, BinaryOperator::Minus));
    binary(&mut registry, BinaryOperator::Times, |data| scalar_binary(data, BinaryOperator::Times));
    binary(&mut registry, BinaryOperator::RDivide, |data| scalar_binary(data, BinaryOperator::RDivide));
    binary(&mut registry, BinaryOperator::Eq, |data| scalar_binary(data, BinaryOperator::Eq));
    binary(&mut registry, BinaryOperator::Ne, |data| scalar_binary(data, BinaryOperator::Ne));
    binary(&mut registry, BinaryOperator::Lt, |data| scalar_binary(data, BinaryOperator::Lt));
    binary(&mut registry, BinaryOperator::Le, |data| scalar_binary(data, BinaryOperator::Le));
    binary(&mut registry, BinaryOperator::Gt, |data| scalar_binary(data, BinaryOperator::Gt));
    binary(&mut registry, BinaryOperator::Ge, |data| scalar_binary(data, BinaryOperator::Ge));

    registry.register(
        "uminus",
        BuiltinProvider::new(
            InputsChecker::new().number_of_inputs(1).are_scalar().are_numeric(),
            scalar_negation,
        ),
    );

    let single = || InputsChecker::new().number_of_inputs(1).number_of_outputs_at_most(1);

    registry.register(
        "copy",
        BuiltinProvider::new(single().not().is_matrix(0), |data| identity(data, "copy")),
    );
    registry.register("copy", BuiltinProvider::new(single().is_matrix(0), matrix_copy));

    registry.register(
        "get",
        BuiltinProvider::new(
            InputsChecker::new()
                .number_of_inputs_between(2, 3)
                .is_matrix(0)
                .are_scalar_from(1)
                .number_of_outputs_at_most(1),
            matrix_get,
        ),
    );
    registry.register(
        "set",
        BuiltinProvider::new(
            InputsChecker::new()
                .number_of_inputs_between(3, 4)
                .is_matrix(0)
                .are_scalar_from(1)
                .are_numeric()
                .number_of_outputs_at_most(1),
            matrix_set,
        ),
    );

    registry.register("numel", BuiltinProvider::new(single().is_scalar(0), |data| {
        let name = data.instance_name("numel");
        let output = VariableType::scalar_constant(NumericKind::Int32, 1.0);

        Ok(FunctionInstance::inlined(
            name,
            FunctionType::simple(data.input_types(), Some(output)),
            |_| "1".to_string(),
        ))
    }));
    registry.register("numel", BuiltinProvider::new(single().is_matrix(0), matrix_numel));

    registry.register(
        "transpose",
        BuiltinProvider::new(single().is_scalar(0), |data| identity(data, "transpose")),
    );
    registry.register("transpose", BuiltinProvider::new(single().is_2d_matrix(0), matrix_transpose));

    registry.register(
        "sum",
        BuiltinProvider::new(single().is_scalar(0).is_numeric(0), |data| identity(data, "sum")),
    );
    registry.register("sum", BuiltinProvider::new(single().is_matrix(0), matrix_sum));

    registry.register(
        "zeros",
        BuiltinProvider::new(InputsChecker::new().number_of_inputs(0), |data| {
            Ok(FunctionInstance::inlined(
                data.instance_name("zeros"),
                FunctionType::simple(&[], Some(VariableType::scalar_constant(NumericKind::Double, 0.0))),
                |_| "0.0".to_string(),
            ))
        }),
    );
    registry.register(
        "zeros",
        BuiltinProvider::new(
            InputsChecker::new()
                .number_of_inputs_between(1, 2)
                .are_scalar()
                .are_numeric()
                .number_of_outputs_at_most(1),
            zeros,
        ),
    );

    registry.register(
        "error",
        BuiltinProvider::new(
            InputsChecker::new()
                .number_of_inputs(1)
                .is_string(0)
                .number_of_outputs_at_most(0),
            error,
        ),
    );

    registry
}

fn argument(arguments: &[String], index: usize) -> &str {
    arguments.get(index).map_or("", String::as_str)
}

fn input(data: &ProviderData, index: usize) -> CompileResult<&VariableType> {
    data.input_type(index).ok_or_else(|| {
        CompileError::internal(
            "builtins",
            format!("missing input {index} of {} given", data.input_types().len()),
        )
    })
}

fn numeric_kind(data: &ProviderData, operation: &str, ty: &VariableType) -> CompileResult<NumericKind> {
    ty.numeric_kind()
        .ok_or_else(|| CompileError::unsupported(operation, data.input_types()))
}

fn scalar_binary(data: &ProviderData, operator: BinaryOperator) -> CompileResult<FunctionInstance> {
    let operation = operator.to_string();
    let (a, b) = (input(data, 0)?, input(data, 1)?);
    let operands = numeric_kind(data, &operation, a)?.widen(numeric_kind(data, &operation, b)?);
    let kind = operator.result_kind(operands);

    let folded = match (data.options().propagate_constants, a.constant(), b.constant()) {
        (true, Some(x), Some(y)) => operator.fold(x, y),
        _ => None,
    };
    let output = match folded {
        Some(value) if kind.is_integer() => VariableType::scalar_constant(kind, value.round()),
        Some(value) => VariableType::scalar_constant(kind, value),
        None => VariableType::scalar(kind),
    };

    let name = data.instance_name(&operation);
    let function_type = FunctionType::simple(data.input_types(), Some(output));
    let symbol = operator.symbol();

    // Integer operands producing a float result are divided in the float type
    let cast = if kind.is_float() && !operands.is_float() {
        format!("({}) ", kind.c_type())
    } else {
        String::new()
    };

    if data.options().should_inline(&operation) {
        return Ok(FunctionInstance::inlined(name, function_type, move |arguments| {
            format!("({cast}{} {symbol} {})", argument(arguments, 0), argument(arguments, 1))
        }));
    }

    let code = formatdoc! {"
        {prototype}
        {{
            return {cast}a {symbol} b;
        }}
        ",
        prototype = function_type.prototype(&name),
    };

    Ok(FunctionInstance::literal(name, function_type, code))
}

fn scalar_negation(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let a = input(data, 0)?;
    let kind = match numeric_kind(data, "uminus", a)? {
        NumericKind::Logical | NumericKind::Char => NumericKind::Double,
        kind => kind,
    };
    let output = match a.constant() {
        Some(value) if data.options().propagate_constants => VariableType::scalar_constant(kind, -value),
        _ => VariableType::scalar(kind),
    };

    Ok(FunctionInstance::inlined(
        data.instance_name("uminus"),
        FunctionType::simple(data.input_types(), Some(output)),
        |arguments| format!("(-{})", argument(arguments, 0)),
    ))
}

/// An instance returning its only input unchanged.
fn identity(data: &ProviderData, operation: &str) -> CompileResult<FunctionInstance> {
    let output = input(data, 0)?.clone();

    Ok(FunctionInstance::inlined(
        data.instance_name(operation),
        FunctionType::simple(data.input_types(), Some(output)),
        |arguments| argument(arguments, 0).to_string(),
    ))
}

fn matrix_copy(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?;
    let name = data.instance_name("copy");
    let function_type = FunctionType::simple(data.input_types(), Some(matrix.clone()));
    let kind = numeric_kind(data, "copy", matrix)?;

    let (statement, include) = match matrix {
        VariableType::StaticMatrix { shape, .. } => {
            let numel = shape
                .numel()
                .ok_or_else(|| CompileError::unsupported("copy", data.input_types()))?;
            (
                format!("memcpy(y, a, sizeof({}) * {numel});", kind.c_type()),
                "string.h",
            )
        }
        _ => (format!("tensor_{}_copy(a, y);", kind.small_id()), "tensor.h"),
    };

    let code = formatdoc! {"
        {prototype}
        {{
            {statement}
        }}
        ",
        prototype = function_type.prototype(&name),
    };

    Ok(FunctionInstance::literal(name, function_type, code).with_include(include))
}

/// Zero based linear index of `indices` into `matrix`, where `rows` is the
/// expression of the leading dimension.
fn linear_index(indices: &[&str], rows: &str) -> String {
    match indices {
        [i] => format!("(size_t) ({i} - 1)"),
        [i, j] => format!("(size_t) ({i} - 1) + (size_t) ({j} - 1) * {rows}"),
        _ => String::new(),
    }
}

/// Expression of the leading dimension of `matrix` named `name`.
fn rows_of(data: &ProviderData, operation: &str, matrix: &VariableType, name: &str) -> CompileResult<String> {
    match matrix {
        VariableType::DynamicMatrix { .. } => Ok(format!("{name}->dims[0]")),
        _ => matrix
            .shape()
            .and_then(TypeShape::dims)
            .and_then(|dims| dims.first().copied().flatten())
            .map(|rows| rows.to_string())
            .ok_or_else(|| CompileError::unsupported(operation, data.input_types())),
    }
}

fn matrix_get(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?.clone();
    let element = matrix
        .element_type()
        .ok_or_else(|| CompileError::unsupported("get", data.input_types()))?;
    let dynamic = matches!(matrix, VariableType::DynamicMatrix { .. });
    let rows = rows_of(data, "get", &matrix, "a")?;

    let name = data.instance_name("get");
    let function_type = FunctionType::simple(data.input_types(), Some(element));

    if data.options().should_inline("get") {
        return Ok(FunctionInstance::inlined(name, function_type, move |arguments| {
            let array = argument(arguments, 0);
            let indices = arguments.iter().skip(1).map(String::as_str).collect::<Vec<_>>();
            let rows = rows.replace("a->", &format!("{array}->"));
            let index = linear_index(&indices, &rows);

            if dynamic {
                format!("{array}->data[{index}]")
            } else {
                format!("{array}[{index}]")
            }
        }));
    }

    let indices = ["b", "c"]
        .into_iter()
        .take(data.input_types().len() - 1)
        .collect::<Vec<_>>();
    let index = linear_index(&indices, &rows);
    let access = if dynamic { format!("a->data[{index}]") } else { format!("a[{index}]") };

    let code = formatdoc! {"
        {prototype}
        {{
            return {access};
        }}
        ",
        prototype = function_type.prototype(&name),
    };

    Ok(FunctionInstance::literal(name, function_type, code))
}

fn matrix_set(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?.clone();
    let kind = numeric_kind(data, "set", &matrix)?;
    let rows = rows_of(data, "set", &matrix, "a")?;
    let count = data.input_types().len();

    let indices = ["b", "c"].into_iter().take(count - 2).collect::<Vec<_>>();
    let value = ["b", "c", "d"][count - 2];
    let index = linear_index(&indices, &rows);

    let name = data.instance_name("set");
    let function_type = FunctionType::simple(data.input_types(), Some(matrix.without_constant()));

    let (store, publish) = match &matrix {
        VariableType::DynamicMatrix { .. } => (
            format!("a->data[{index}] = ({}) {value};", kind.c_type()),
            "*y = a;".to_string(),
        ),
        VariableType::StaticMatrix { shape, .. } => {
            let numel = shape
                .numel()
                .ok_or_else(|| CompileError::unsupported("set", data.input_types()))?;
            (
                format!("a[{index}] = ({}) {value};", kind.c_type()),
                format!("if (y != a) memcpy(y, a, sizeof({}) * {numel});", kind.c_type()),
            )
        }
        _ => return Err(CompileError::unsupported("set", data.input_types())),
    };

    let code = formatdoc! {"
        {prototype}
        {{
            {store}
            {publish}
        }}
        ",
        prototype = function_type.prototype(&name),
    };

    Ok(FunctionInstance::literal(name, function_type, code)
        .with_include("string.h")
        .with_side_effects())
}

fn matrix_numel(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?;
    let numel = matrix.shape().and_then(TypeShape::numel);

    let output = match numel {
        Some(numel) if data.options().propagate_constants => {
            VariableType::scalar_constant(NumericKind::Int32, numel as f64)
        }
        _ => VariableType::int32(),
    };
    let function_type = FunctionType::simple(data.input_types(), Some(output));
    let name = data.instance_name("numel");

    Ok(match (matrix, numel) {
        (VariableType::StaticMatrix { .. }, Some(numel)) => {
            FunctionInstance::inlined(name, function_type, move |_| numel.to_string())
        }
        _ => FunctionInstance::inlined(name, function_type, |arguments| {
            format!("(int32_t) {}->length", argument(arguments, 0))
        }),
    })
}

fn matrix_transpose(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?;
    let kind = numeric_kind(data, "transpose", matrix)?;
    let name = data.instance_name("transpose");

    let (function_type, code) = match matrix {
        VariableType::DynamicMatrix { shape, .. } => {
            let output = VariableType::dynamic_matrix(kind, shape.transposed());
            let function_type = FunctionType::simple(data.input_types(), Some(output));
            let code = formatdoc! {"
                {prototype}
                {{
                    size_t rows = a->dims[0];
                    size_t columns = a->dims[1];
                    tensor_{id}_alloc_2d(y, columns, rows);
                    for (size_t i = 0; i < rows; ++i) {{
                        for (size_t j = 0; j < columns; ++j) {{
                            (*y)->data[j + i * columns] = a->data[i + j * rows];
                        }}
                    }}
                }}
                ",
                prototype = function_type.prototype(&name),
                id = kind.small_id(),
            };
            (function_type, code)
        }
        VariableType::StaticMatrix { shape, .. } => {
            let Some([Some(rows), Some(columns)]) = shape.dims() else {
                return Err(CompileError::unsupported("transpose", data.input_types()));
            };
            let output = VariableType::static_matrix(kind, shape.transposed());
            let function_type = FunctionType::simple(data.input_types(), Some(output));
            let code = formatdoc! {"
                {prototype}
                {{
                    for (size_t i = 0; i < {rows}; ++i) {{
                        for (size_t j = 0; j < {columns}; ++j) {{
                            y[j + i * {columns}] = a[i + j * {rows}];
                        }}
                    }}
                }}
                ",
                prototype = function_type.prototype(&name),
            };
            (function_type, code)
        }
        _ => return Err(CompileError::unsupported("transpose", data.input_types())),
    };

    Ok(FunctionInstance::literal(name, function_type, code))
}

fn matrix_sum(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let matrix = input(data, 0)?;
    let kind = match numeric_kind(data, "sum", matrix)? {
        NumericKind::Single => NumericKind::Single,
        _ => NumericKind::Double,
    };
    let (length, access) = match matrix {
        VariableType::DynamicMatrix { .. } => ("a->length".to_string(), "a->data[i]"),
        _ => (
            matrix
                .shape()
                .and_then(TypeShape::numel)
                .ok_or_else(|| CompileError::unsupported("sum", data.input_types()))?
                .to_string(),
            "a[i]",
        ),
    };

    let name = data.instance_name("sum");
    let function_type = FunctionType::simple(data.input_types(), Some(VariableType::scalar(kind)));

    let code = formatdoc! {"
        {prototype}
        {{
            {c_type} total = 0;
            for (size_t i = 0; i < {length}; ++i) {{
                total += {access};
            }}
            return total;
        }}
        ",
        prototype = function_type.prototype(&name),
        c_type = kind.c_type(),
    };

    Ok(FunctionInstance::literal(name, function_type, code))
}

fn zeros(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let extent = |ty: &VariableType| {
        ty.constant()
            .filter(|value| *value >= 0.0 && value.fract() == 0.0)
            .map(|value| value as usize)
    };

    let dims = match data.input_types() {
        [n] => vec![extent(n), extent(n)],
        [rows, columns] => vec![extent(rows), extent(columns)],
        _ => return Err(CompileError::unsupported("zeros", data.input_types())),
    };
    let shape = TypeShape::Dims(dims);
    let name = data.instance_name("zeros");

    let is_static = data.options().memory_allocation == MemoryAllocation::Static;
    match shape.numel() {
        Some(numel) if is_static => {
            let output = VariableType::static_matrix(NumericKind::Double, shape);
            let function_type = FunctionType::simple(data.input_types(), Some(output));
            let code = formatdoc! {"
                {prototype}
                {{
                    memset(y, 0, sizeof(double) * {numel});
                }}
                ",
                prototype = function_type.prototype(&name),
            };

            Ok(FunctionInstance::literal(name, function_type, code).with_include("string.h"))
        }
        _ => {
            let output = VariableType::dynamic_matrix(NumericKind::Double, shape);
            let function_type = FunctionType::simple(data.input_types(), Some(output));
            let columns = if data.input_types().len() == 2 { "b" } else { "a" };
            let code = formatdoc! {"
                {prototype}
                {{
                    tensor_d_zeros_2d(y, (size_t) a, (size_t) {columns});
                }}
                ",
                prototype = function_type.prototype(&name),
            };

            Ok(FunctionInstance::literal(name, function_type, code))
        }
    }
}

fn error(data: &ProviderData) -> CompileResult<FunctionInstance> {
    let name = data.instance_name("error");
    let function_type = FunctionType::simple(data.input_types(), None);

    let code = formatdoc! {r#"
        {prototype}
        {{
            fprintf(stderr, "%s\n", a);
            exit(1);
        }}
        "#,
        prototype = function_type.prototype(&name),
    };

    Ok(FunctionInstance::literal(name, function_type, code)
        .with_include("stdio.h")
        .with_include("stdlib.h")
        .interrupting())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{config::CompilerOptions, middle::instance::InstanceBody};

    fn build(operation: &str, types: Vec<VariableType>, options: CompilerOptions) -> CompileResult<FunctionInstance> {
        let data = ProviderData::new(types, Arc::new(options));
        registry()
            .build(operation, &data)
            .unwrap_or_else(|| Err(CompileError::unsupported(operation, data.input_types())))
    }

    #[test]
    fn arithmetic_widens_and_folds() {
        let options = CompilerOptions::default();
        let two = VariableType::scalar_constant(NumericKind::Int32, 2.0);
        let half = VariableType::scalar_constant(NumericKind::Double, 0.5);

        let plus = build("plus", vec![two.clone(), half.clone()], options.clone()).unwrap();
        assert_eq!(plus.name(), "plus_i32_d");
        assert_eq!(
            plus.output_types(),
            vec![VariableType::scalar_constant(NumericKind::Double, 2.5)]
        );
        assert_eq!(plus.call_code(&["x".into(), "y".into()]), "(x + y)");

        let unfolded = build(
            "plus",
            vec![two.clone(), half],
            options.clone().with_propagate_constants(false),
        )
        .unwrap();
        assert_eq!(unfolded.output_types(), vec![VariableType::double()]);

        let divide = build("rdivide", vec![two.clone(), VariableType::int32()], options).unwrap();
        assert_eq!(divide.output_types(), vec![VariableType::double()]);
    }

    #[test]
    fn integer_division_divides_as_double() {
        let seven = VariableType::scalar_constant(NumericKind::Int32, 7.0);
        let two = VariableType::scalar_constant(NumericKind::Int32, 2.0);

        let inlined = build("rdivide", vec![seven.clone(), two.clone()], CompilerOptions::default()).unwrap();
        assert_eq!(
            inlined.output_types(),
            vec![VariableType::scalar_constant(NumericKind::Double, 3.5)]
        );
        assert_eq!(inlined.call_code(&["x".into(), "y".into()]), "((double) x / y)");

        let function = build(
            "rdivide",
            vec![seven, two],
            CompilerOptions::default().without_inlining("rdivide"),
        )
        .unwrap();
        let InstanceBody::Literal(code) = function.body() else {
            panic!("expected a literal body");
        };
        assert_eq!(
            code.as_str(),
            "double rdivide_i32_i32(int32_t a, int32_t b)\n{\n    return (double) a / b;\n}\n"
        );

        let doubles = build(
            "rdivide",
            vec![VariableType::double(), VariableType::double()],
            CompilerOptions::default(),
        )
        .unwrap();
        assert_eq!(doubles.call_code(&["x".into(), "y".into()]), "(x / y)");
    }

    #[test]
    fn comparisons_give_logicals() {
        let lt = build(
            "lt",
            vec![VariableType::int32(), VariableType::double()],
            CompilerOptions::default(),
        )
        .unwrap();

        assert_eq!(lt.output_types(), vec![VariableType::logical()]);
        assert!(lt.includes().contains("stdbool.h"));
    }

    #[test]
    fn no_inline_emits_functions() {
        let plus = build(
            "plus",
            vec![VariableType::double(), VariableType::double()],
            CompilerOptions::default().without_inlining("plus"),
        )
        .unwrap();

        let InstanceBody::Literal(code) = plus.body() else {
            panic!("expected a literal body");
        };
        assert_eq!(
            code.as_str(),
            "double plus_d_d(double a, double b)\n{\n    return a + b;\n}\n"
        );
        assert_eq!(plus.call_code(&["x".into(), "y".into()]), "plus_d_d(x, y)");
    }

    #[test]
    fn matrix_access() {
        let tensor = VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d());
        let get = build(
            "get",
            vec![tensor.clone(), VariableType::int32(), VariableType::int32()],
            CompilerOptions::default(),
        )
        .unwrap();

        assert_eq!(get.output_types(), vec![VariableType::double()]);
        assert_eq!(
            get.call_code(&["A".into(), "i".into(), "j".into()]),
            "A->data[(size_t) (i - 1) + (size_t) (j - 1) * A->dims[0]]"
        );

        let set = build(
            "set",
            vec![tensor.clone(), VariableType::int32(), VariableType::double()],
            CompilerOptions::default(),
        )
        .unwrap();
        assert_eq!(set.output_types(), vec![tensor]);
        assert!(!set.is_pure());
    }

    #[test]
    fn zeros_follow_allocation_mode() {
        let two = VariableType::scalar_constant(NumericKind::Double, 2.0);
        let three = VariableType::scalar_constant(NumericKind::Double, 3.0);

        let fixed = build(
            "zeros",
            vec![two.clone(), three.clone()],
            CompilerOptions::default().with_memory_allocation(MemoryAllocation::Static),
        )
        .unwrap();
        assert_eq!(
            fixed.output_types(),
            vec![VariableType::static_matrix(NumericKind::Double, TypeShape::known([2, 3]))]
        );

        let heap = build("zeros", vec![two, three], CompilerOptions::default()).unwrap();
        assert_eq!(
            heap.output_types(),
            vec![VariableType::dynamic_matrix(NumericKind::Double, TypeShape::known([2, 3]))]
        );

        let huge = VariableType::scalar_constant(NumericKind::Double, 1e10);
        let overflowing = build(
            "zeros",
            vec![huge.clone(), huge],
            CompilerOptions::default().with_memory_allocation(MemoryAllocation::Static),
        )
        .unwrap();
        assert_eq!(
            overflowing.output_types(),
            vec![VariableType::dynamic_matrix(
                NumericKind::Double,
                TypeShape::known([10_000_000_000, 10_000_000_000])
            )]
        );

        let unknown = build("zeros", vec![VariableType::double()], CompilerOptions::default()).unwrap();
        assert_eq!(
            unknown.output_types(),
            vec![VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d())]
        );
    }

    #[test]
    fn error_interrupts() {
        let data = ProviderData::new(
            vec![VariableType::string("boom")],
            Arc::new(CompilerOptions::default()),
        )
        .with_number_of_outputs(0);
        let instance = registry().build("error", &data).unwrap().unwrap();

        assert!(instance.interrupts());
        assert!(instance.output_types().is_empty());
        assert!(instance.includes().contains("stdio.h"));

        // Used as an expression, `error` has no value to give
        let as_value = ProviderData::new(
            vec![VariableType::string("boom")],
            Arc::new(CompilerOptions::default()),
        );
        assert!(registry().build("error", &as_value).is_none());
    }

    #[test]
    fn unsupported_inputs_find_no_provider() {
        assert_eq!(
            build(
                "plus",
                vec![VariableType::string("a"), VariableType::double()],
                CompilerOptions::default()
            ),
            Err(CompileError::unsupported(
                "plus",
                &[VariableType::string("a"), VariableType::double()]
            ))
        );
    }
}
