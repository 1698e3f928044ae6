//! Function instances: concrete, fully typed lowerings of an abstract
//! operation for one exact signature.

use std::{collections::BTreeSet, sync::Arc};

use itertools::Itertools;

use crate::{
    config::CompilerOptions,
    middle::{ssa::FunctionBody, ty::VariableType, ty::conversion::Conversion},
};

pub mod builtins;
pub mod checker;
pub mod provider;
pub mod resolver;

/// Everything needed to pick and build an instance: the operand types, the
/// expected outputs if known, and the options in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderData {
    input_types: Vec<VariableType>,
    output_types: Option<Vec<VariableType>>,
    number_of_outputs: usize,
    naming_hint: Option<String>,
    options: Arc<CompilerOptions>,
}

impl ProviderData {
    pub fn new(input_types: Vec<VariableType>, options: Arc<CompilerOptions>) -> Self {
        Self {
            input_types,
            output_types: None,
            number_of_outputs: 1,
            naming_hint: None,
            options,
        }
    }

    pub fn with_output_types(mut self, output_types: Vec<VariableType>) -> Self {
        self.number_of_outputs = output_types.len();
        self.output_types = Some(output_types);
        self
    }

    pub fn with_number_of_outputs(mut self, number_of_outputs: usize) -> Self {
        self.number_of_outputs = number_of_outputs;
        self
    }

    pub fn with_naming_hint(mut self, naming_hint: impl Into<String>) -> Self {
        self.naming_hint = Some(naming_hint.into());
        self
    }

    pub fn input_types(&self) -> &[VariableType] {
        &self.input_types
    }

    pub fn input_type(&self, index: usize) -> Option<&VariableType> {
        self.input_types.get(index)
    }

    pub fn output_types(&self) -> Option<&[VariableType]> {
        self.output_types.as_deref()
    }

    pub fn number_of_outputs(&self) -> usize {
        self.number_of_outputs
    }

    pub fn naming_hint(&self) -> Option<&str> {
        self.naming_hint.as_deref()
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn shared_options(&self) -> Arc<CompilerOptions> {
        self.options.clone()
    }

    /// `plus_i32_d` for `plus` over `(int32, double)`, unless a naming hint
    /// was given.
    pub fn instance_name(&self, operation: &str) -> String {
        if let Some(hint) = &self.naming_hint {
            return hint.clone();
        }

        std::iter::once(operation.to_string())
            .chain(self.input_types.iter().map(VariableType::small_id))
            .join("_")
    }
}

/// Ordered, named inputs and outputs of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionType {
    pub inputs: Vec<(String, VariableType)>,
    pub outputs: Vec<(String, VariableType)>,
}

impl FunctionType {
    pub fn new<S: Into<String>, T: Into<String>>(
        inputs: impl IntoIterator<Item = (S, VariableType)>,
        outputs: impl IntoIterator<Item = (T, VariableType)>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            outputs: outputs.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Inputs named `a`, `b`, ... and a single output `y`.
    pub fn simple(inputs: &[VariableType], output: Option<VariableType>) -> Self {
        Self::new(
            inputs
                .iter()
                .enumerate()
                .map(|(i, ty)| (input_name(i), ty.clone())),
            output.map(|ty| ("y", ty)),
        )
    }

    pub fn input_types(&self) -> impl Iterator<Item = &VariableType> {
        self.inputs.iter().map(|(_, ty)| ty)
    }

    pub fn output_types(&self) -> impl Iterator<Item = &VariableType> {
        self.outputs.iter().map(|(_, ty)| ty)
    }

    /// C prototype for a function with this type.
    pub fn prototype(&self, name: &str) -> String {
        let return_type = match self.outputs.as_slice() {
            [(_, ty)] if !ty.is_matrix() => ty.code(),
            _ => "void".to_string(),
        };

        let mut parameters = self
            .inputs
            .iter()
            .map(|(name, ty)| ty.declaration(name))
            .collect::<Vec<_>>();

        if return_type == "void" {
            parameters.extend(
                self.outputs
                    .iter()
                    .map(|(name, ty)| format!("{}* {name}", ty.code())),
            );
        }

        format!("{return_type} {name}({})", parameters.join(", "))
    }
}

impl core::fmt::Display for FunctionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}) -> ({})",
            self.inputs
                .iter()
                .map(|(name, ty)| format!("{name}: {ty}"))
                .join(", "),
            self.outputs
                .iter()
                .map(|(name, ty)| format!("{name}: {ty}"))
                .join(", ")
        )
    }
}

fn input_name(index: usize) -> String {
    char::from_u32('a' as u32 + index as u32)
        .filter(char::is_ascii_lowercase)
        .map_or_else(|| format!("in{index}"), String::from)
}

/// Expands an inlined instance at a call site, given the argument expressions.
pub type InlineGenerator = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

#[derive(Clone)]
pub enum InstanceBody {
    /// A complete function definition in the target language
    Literal(String),
    /// An expression substituted at every call site
    Inlined(InlineGenerator),
    /// A body lowered like user code
    Instructions(FunctionBody),
}

impl core::fmt::Debug for InstanceBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceBody::Literal(code) => f.debug_tuple("Literal").field(code).finish(),
            InstanceBody::Inlined(_) => f.debug_tuple("Inlined").finish_non_exhaustive(),
            InstanceBody::Instructions(body) => f.debug_tuple("Instructions").field(&body.name()).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionInstance {
    name: String,
    function_type: FunctionType,
    body: InstanceBody,
    includes: BTreeSet<String>,
    /// How each argument is converted to the declared parameter type
    input_conversions: Vec<Conversion>,
    dependencies: Vec<Arc<FunctionInstance>>,
    is_pure: bool,
    interrupts: bool,
}

impl FunctionInstance {
    fn new(name: impl Into<String>, function_type: FunctionType, body: InstanceBody) -> Self {
        let includes = function_type
            .input_types()
            .chain(function_type.output_types())
            .flat_map(VariableType::includes)
            .map(String::from)
            .collect();

        Self {
            name: name.into(),
            function_type,
            body,
            includes,
            input_conversions: Vec::new(),
            dependencies: Vec::new(),
            is_pure: true,
            interrupts: false,
        }
    }

    pub fn literal(
        name: impl Into<String>,
        function_type: FunctionType,
        code: impl Into<String>,
    ) -> Self {
        Self::new(name, function_type, InstanceBody::Literal(code.into()))
    }

    pub fn inlined(
        name: impl Into<String>,
        function_type: FunctionType,
        generator: impl Fn(&[String]) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, function_type, InstanceBody::Inlined(Arc::new(generator)))
    }

    pub fn instructions(name: impl Into<String>, function_type: FunctionType, body: FunctionBody) -> Self {
        Self::new(name, function_type, InstanceBody::Instructions(body))
    }

    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.includes.insert(include.into());
        self
    }

    pub fn with_side_effects(mut self) -> Self {
        self.is_pure = false;
        self
    }

    /// Marks an instance that never returns control to its caller.
    pub fn interrupting(mut self) -> Self {
        self.interrupts = true;
        self.is_pure = false;
        self
    }

    pub fn with_input_conversions(mut self, conversions: Vec<Conversion>) -> Self {
        self.dependencies.extend(conversions.iter().filter_map(Conversion::instance).cloned());
        self.input_conversions = conversions;
        self
    }

    pub fn with_dependency(mut self, dependency: Arc<FunctionInstance>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_type(&self) -> &FunctionType {
        &self.function_type
    }

    pub fn output_types(&self) -> Vec<VariableType> {
        self.function_type.output_types().cloned().collect()
    }

    pub fn body(&self) -> &InstanceBody {
        &self.body
    }

    pub fn includes(&self) -> &BTreeSet<String> {
        &self.includes
    }

    pub fn dependencies(&self) -> &[Arc<FunctionInstance>] {
        &self.dependencies
    }

    pub fn is_pure(&self) -> bool {
        self.is_pure
    }

    pub fn interrupts(&self) -> bool {
        self.interrupts
    }

    pub fn is_inlined(&self) -> bool {
        matches!(self.body, InstanceBody::Inlined(_))
    }

    /// The code of a call to this instance with the given argument
    /// expressions, after argument conversions.
    pub fn call_code(&self, arguments: &[String]) -> String {
        let arguments = arguments
            .iter()
            .enumerate()
            .map(|(i, argument)| match self.input_conversions.get(i) {
                Some(conversion) => conversion.apply(argument),
                None => argument.clone(),
            })
            .collect::<Vec<_>>();

        match &self.body {
            InstanceBody::Inlined(generator) => generator(&arguments),
            InstanceBody::Literal(_) | InstanceBody::Instructions(_) => {
                format!("{}({})", self.name, arguments.join(", "))
            }
        }
    }
}

impl PartialEq for FunctionInstance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.function_type == other.function_type
    }
}
