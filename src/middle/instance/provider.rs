use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::{
    error::CompileResult,
    middle::instance::{FunctionInstance, ProviderData, builtins, checker::InputsChecker},
};

pub type InstanceBuilder = fn(&ProviderData) -> CompileResult<FunctionInstance>;

/// Builds instances of one operation for the inputs its checker accepts.
#[derive(Debug, Clone)]
pub struct BuiltinProvider {
    checker: InputsChecker,
    builder: InstanceBuilder,
}

impl BuiltinProvider {
    pub fn new(checker: InputsChecker, builder: InstanceBuilder) -> Self {
        Self { checker, builder }
    }

    pub fn accepts(&self, data: &ProviderData) -> bool {
        self.checker.check(data)
    }

    pub fn build(&self, data: &ProviderData) -> CompileResult<FunctionInstance> {
        (self.builder)(data)
    }
}

/// Providers by operation name. Within an operation, providers are tried in
/// registration order and the first one accepting the inputs wins.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Vec<BuiltinProvider>>,
}

pub static BUILTIN_PROVIDERS: Lazy<Arc<ProviderRegistry>> =
    Lazy::new(|| Arc::new(builtins::registry()));

impl ProviderRegistry {
    pub fn register(&mut self, operation: impl Into<String>, provider: BuiltinProvider) {
        self.providers
            .entry(operation.into())
            .or_default()
            .push(provider);
    }

    pub fn has_operation(&self, operation: &str) -> bool {
        self.providers.contains_key(operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// `None` when no provider of `operation` accepts `data`.
    pub fn build(
        &self,
        operation: &str,
        data: &ProviderData,
    ) -> Option<CompileResult<FunctionInstance>> {
        self.providers
            .get(operation)?
            .iter()
            .find(|provider| provider.accepts(data))
            .map(|provider| provider.build(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CompilerOptions,
        middle::{instance::FunctionType, ty::VariableType},
    };

    fn named(data: &ProviderData, name: &str) -> CompileResult<FunctionInstance> {
        Ok(FunctionInstance::literal(
            name,
            FunctionType::simple(data.input_types(), None),
            "",
        ))
    }

    #[test]
    fn first_accepting_provider_wins() {
        let mut registry = ProviderRegistry::default();
        registry.register(
            "f",
            BuiltinProvider::new(InputsChecker::new().is_string(0), |data| named(data, "first")),
        );
        registry.register(
            "f",
            BuiltinProvider::new(InputsChecker::new(), |data| named(data, "second")),
        );
        registry.register(
            "f",
            BuiltinProvider::new(InputsChecker::new(), |data| named(data, "third")),
        );

        let options = Arc::new(CompilerOptions::default());
        let string = ProviderData::new(vec![VariableType::string("s")], options.clone());
        let number = ProviderData::new(vec![VariableType::double()], options);

        let name = |data: &ProviderData| registry.build("f", data).map(|r| r.map(|i| i.name().to_string()));
        assert_eq!(name(&string), Some(Ok("first".to_string())));
        assert_eq!(name(&number), Some(Ok("second".to_string())));
        assert!(registry.build("g", &number).is_none());
    }
}
