use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use hashbrown::HashMap;
use once_cell::sync::OnceCell;

use crate::{
    config::CompilerOptions,
    error::{CompileError, CompileResult},
    middle::{
        instance::{
            FunctionInstance, FunctionType, ProviderData,
            provider::{BUILTIN_PROVIDERS, ProviderRegistry},
        },
        ssa::FunctionBody,
        ty::{VariableType, conversion::ConversionRules},
    },
};

/// A function written by the user, with declared parameter and output types.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub function_type: FunctionType,
    pub body: FunctionBody,
}

impl UserFunction {
    pub fn new(function_type: FunctionType, body: FunctionBody) -> Self {
        Self {
            function_type,
            body,
        }
    }

    pub fn name(&self) -> &str {
        self.body.name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    operation: String,
    input_types: Vec<VariableType>,
    output_types: Option<Vec<VariableType>>,
    number_of_outputs: usize,
    naming_hint: Option<String>,
}

impl InstanceKey {
    fn new(operation: &str, data: &ProviderData) -> Self {
        Self {
            operation: operation.to_string(),
            input_types: data.input_types().to_vec(),
            output_types: data.output_types().map(<[_]>::to_vec),
            number_of_outputs: data.number_of_outputs(),
            naming_hint: data.naming_hint().map(str::to_string),
        }
    }
}

type CacheSlot = Arc<OnceCell<CompileResult<Arc<FunctionInstance>>>>;

/// Maps an operation and its input types to a function instance. Builtin
/// providers are consulted first, then user functions.
///
/// Results, errors included, are memoized: every distinct request is built at
/// most once, even when many threads ask for it at the same time.
pub struct InstanceResolver {
    providers: Arc<ProviderRegistry>,
    user_functions: HashMap<String, UserFunction>,
    conversions: ConversionRules,
    options: Arc<CompilerOptions>,
    cache: DashMap<InstanceKey, CacheSlot>,
    builds: AtomicUsize,
}

impl core::fmt::Debug for InstanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceResolver")
            .field("user_functions", &self.user_functions.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl InstanceResolver {
    pub fn new(options: Arc<CompilerOptions>) -> Self {
        Self {
            providers: BUILTIN_PROVIDERS.clone(),
            user_functions: HashMap::new(),
            conversions: ConversionRules::builtin(),
            options,
            cache: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn with_providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_conversions(mut self, conversions: ConversionRules) -> Self {
        self.conversions = conversions;
        self
    }

    pub fn with_user_function(mut self, function: UserFunction) -> Self {
        self.user_functions
            .insert(function.name().to_string(), function);
        self
    }

    pub fn options(&self) -> &Arc<CompilerOptions> {
        &self.options
    }

    pub fn conversions(&self) -> &ConversionRules {
        &self.conversions
    }

    /// Request data for `input_types` under this resolver's options.
    pub fn data(&self, input_types: Vec<VariableType>) -> ProviderData {
        ProviderData::new(input_types, self.options.clone())
    }

    /// How many instances were actually built, cache hits excluded.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn resolve(&self, operation: &str, data: &ProviderData) -> CompileResult<Arc<FunctionInstance>> {
        let key = InstanceKey::new(operation, data);

        // The shard lock is released before building, so slow builds only
        // block requests for the same key
        let slot = self.cache.entry(key).or_default().clone();

        slot.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(operation, "building instance");

            self.build(operation, data).map(Arc::new)
        })
        .clone()
    }

    fn build(&self, operation: &str, data: &ProviderData) -> CompileResult<FunctionInstance> {
        if let Some(instance) = self.providers.build(operation, data) {
            return instance;
        }

        if let Some(function) = self.user_functions.get(operation) {
            return self.instantiate(function, data);
        }

        Err(CompileError::unsupported(operation, data.input_types()))
    }

    fn instantiate(&self, function: &UserFunction, data: &ProviderData) -> CompileResult<FunctionInstance> {
        let parameters = &function.function_type.inputs;

        if parameters.len() != data.input_types().len()
            || data.number_of_outputs() > function.function_type.outputs.len()
        {
            return Err(CompileError::unsupported(function.name(), data.input_types()));
        }

        let conversions = data
            .input_types()
            .iter()
            .zip(parameters)
            .map(|(actual, (_, declared))| self.conversions.convert(actual, declared))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(FunctionInstance::instructions(
            function.name(),
            function.function_type.clone(),
            function.body.clone(),
        )
        .with_input_conversions(conversions))
    }
}
