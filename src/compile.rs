//! Pipeline entry points. A function goes through
//!
//! 1. validation of the incoming SSA,
//! 2. type inference,
//! 3. array access simplification and redundant assignment elimination,
//! 4. block reordering,
//! 5. conversion to conventional SSA,
//! 6. variable allocation and SSA destruction,
//!
//! inferring types again whenever a pass may have changed them.

use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        inference::TypeInferenceEngine,
        instance::{FunctionInstance, resolver::InstanceResolver},
        passes::{
            ArrayAccessSimplification, BlockReordering, ConventionalSsa, PassContext,
            RedundantAssignmentElimination, run_passes,
        },
        ssa::{FunctionBody, validate::validate},
        ty::VariableType,
        unssa::{VariableAllocation, leave_ssa},
    },
};

/// A function ready for code emission: out of SSA form, with the type of
/// every variable and the instances it calls.
#[derive(Debug)]
pub struct CompiledFunction {
    pub body: FunctionBody,
    pub types: HashMap<String, VariableType>,
    pub instances: Vec<Arc<FunctionInstance>>,
    pub allocation: VariableAllocation,
}

impl CompiledFunction {
    pub fn name(&self) -> &str {
        self.body.name()
    }

    /// Types of the variables left after allocation, by name.
    pub fn variable_types(&self) -> Vec<(&str, &VariableType)> {
        let mut variables = self
            .allocation
            .groups()
            .filter_map(|group| {
                let representative = self.allocation.representative(self.allocation.group_of(&group[0])?)?;
                Some((representative, self.types.get(representative)?))
            })
            .collect::<Vec<_>>();

        variables.sort_by_key(|(name, _)| *name);
        variables
    }
}

pub fn compile_function(
    mut body: FunctionBody,
    argument_types: &[VariableType],
    resolver: &InstanceResolver,
) -> CompileResult<CompiledFunction> {
    let options = resolver.options().clone();
    let context = PassContext::new(body.name(), &options);
    let engine = TypeInferenceEngine::new(resolver);

    tracing::debug!(function = body.name(), "compiling");

    validate(&body, "input")?;
    engine.infer(&body, argument_types)?;

    /* Simplification */
    run_passes(
        &mut body,
        &mut [
            &mut ArrayAccessSimplification,
            &mut RedundantAssignmentElimination,
        ],
        &context,
    )?;
    engine.infer(&body, argument_types)?;

    run_passes(&mut body, &mut [&mut BlockReordering], &context)?;
    let inference = engine.infer(&body, argument_types)?;

    /* Out of SSA */
    let mut types = inference.types.clone();
    let conversions = resolver.conversions();

    let namer = |body: &FunctionBody, phi_output: &str, source: &str| -> CompileResult<String> {
        let temporary = body.make_temporary("phi");

        if let Some(target) = types.get(phi_output).cloned() {
            if let Some(source_type) = types.get(source) {
                conversions.convert(source_type, &target)?;
            }
            types.insert(temporary.clone(), target);
        }

        Ok(temporary)
    };
    run_passes(&mut body, &mut [&mut ConventionalSsa::new(namer)], &context)?;
    validate(&body, "conventional_ssa")?;

    let allocation = leave_ssa(&mut body, &types, &context.logger("unssa"))?;

    Ok(CompiledFunction {
        body,
        types,
        instances: inference.instances(),
        allocation,
    })
}

/// Compiles independent functions in parallel. They share `resolver`, so an
/// instance needed by several of them is built once. A failure only affects
/// the function it happened in; results keep the order of `functions`.
pub fn compile_unit(
    functions: Vec<(FunctionBody, Vec<VariableType>)>,
    resolver: &InstanceResolver,
) -> Vec<(String, CompileResult<CompiledFunction>)> {
    functions
        .into_par_iter()
        .map(|(body, argument_types)| {
            let name = body.name().to_string();
            let result = compile_function(body, &argument_types, resolver);

            if let Err(error) = &result {
                if error.is_internal() {
                    tracing::error!(function = %name, "{error}");
                } else {
                    tracing::warn!(function = %name, "{error}");
                }
            }

            (name, result)
        })
        .collect()
}

/// Gathers every instance used across a unit, once each, ordered by name.
pub fn unit_instances<'a>(
    compiled: impl IntoIterator<Item = &'a CompiledFunction>,
) -> Vec<Arc<FunctionInstance>> {
    let mut instances = HashMap::new();

    for function in compiled {
        for instance in &function.instances {
            instances
                .entry(instance.name().to_string())
                .or_insert_with(|| instance.clone());
        }
    }

    let mut instances = instances.into_values().collect::<Vec<_>>();
    instances.sort_by(|a, b| a.name().cmp(b.name()));
    instances
}

/// Turns the per function results of [`compile_unit`] into one result that
/// fails with the first error.
pub fn all_compiled(
    results: Vec<(String, CompileResult<CompiledFunction>)>,
) -> Result<Vec<CompiledFunction>, (String, CompileError)> {
    results
        .into_iter()
        .map(|(name, result)| result.map_err(|error| (name, error)))
        .collect()
}
