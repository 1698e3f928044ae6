//! Forward type inference over SSA form.
//!
//! Blocks are visited in reverse post-order, each block's instructions in
//! order. A block is only visited once one of its incoming edges is live, so
//! code behind an interrupting call never gets types. The walk is repeated
//! until no type and no edge changes, which settles loops.

use std::{collections::BTreeSet, sync::Arc};

use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        instance::{FunctionInstance, resolver::InstanceResolver},
        ssa::{BlockId, FunctionBody, Instruction, InstructionLocation, cfg},
        ty::VariableType,
    },
};

pub mod context;
pub mod rules;

pub use context::TypeInferenceContext;
use rules::*;

/// Walks that still change something after this many rounds are reported as a
/// compiler bug.
const MAX_ITERATIONS: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct TypeInferenceResult {
    pub types: HashMap<String, VariableType>,
    pub reachable_blocks: BTreeSet<BlockId>,
    pub call_instances: HashMap<InstructionLocation, Arc<FunctionInstance>>,
}

impl TypeInferenceResult {
    pub fn type_of(&self, name: &str) -> Option<&VariableType> {
        self.types.get(name)
    }

    pub fn require_type(&self, name: &str) -> CompileResult<&VariableType> {
        self.type_of(name).ok_or_else(|| {
            CompileError::internal("type_inference", format!("no type was inferred for `{name}`"))
        })
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.reachable_blocks.contains(&block)
    }

    pub fn instance_at(&self, location: InstructionLocation) -> Option<&Arc<FunctionInstance>> {
        self.call_instances.get(&location)
    }

    /// Every instance called from the function, once each, ordered by name.
    pub fn instances(&self) -> Vec<Arc<FunctionInstance>> {
        self.call_instances
            .values()
            .unique_by(|instance| instance.name().to_string())
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .cloned()
            .collect()
    }
}

pub struct TypeInferenceEngine<'a> {
    resolver: &'a InstanceResolver,
    rules: Vec<Arc<dyn TypeInferenceRule>>,
}

impl<'a> TypeInferenceEngine<'a> {
    pub fn new(resolver: &'a InstanceResolver) -> Self {
        Self {
            resolver,
            rules: vec![
                Arc::new(ArgumentRule),
                Arc::new(AssignmentRule),
                Arc::new(CopyRule),
                Arc::new(PhiRule),
                Arc::new(FunctionCallRule),
                Arc::new(SimpleGetRule),
                Arc::new(SimpleSetRule),
                Arc::new(ParallelBlockRule),
                Arc::new(ControlFlowRule),
            ],
        }
    }

    /// Adds a rule that takes priority over every rule added before it.
    pub fn with_rule(mut self, rule: impl TypeInferenceRule + 'static) -> Self {
        self.rules.insert(0, Arc::new(rule));
        self
    }

    pub fn resolver(&self) -> &InstanceResolver {
        self.resolver
    }

    pub fn infer(
        &self,
        body: &FunctionBody,
        argument_types: &[VariableType],
    ) -> CompileResult<TypeInferenceResult> {
        if body.blocks.is_empty() {
            return Err(CompileError::internal(
                "type_inference",
                format!("function {} has no blocks", body.name()),
            ));
        }

        let mut context = TypeInferenceContext::new(argument_types.to_vec());

        for iteration in 1..=MAX_ITERATIONS {
            context.start_iteration();
            self.infer_region(body, &mut context, BlockId::ENTRY, None)?;

            if !context.changed() {
                tracing::trace!(function = body.name(), iteration, "types settled");
                return Ok(context.into_result());
            }
        }

        Err(CompileError::internal(
            "type_inference",
            format!(
                "types of {} did not settle after {MAX_ITERATIONS} iterations",
                body.name()
            ),
        ))
    }

    /// Infers the blocks reachable from `start` without going through `stop`.
    /// A parallel block is followed by its end block; its region is inferred
    /// by [`ParallelBlockRule`].
    pub fn infer_region(
        &self,
        body: &FunctionBody,
        context: &mut TypeInferenceContext,
        start: BlockId,
        stop: Option<BlockId>,
    ) -> CompileResult<()> {
        let predecessors = cfg::predecessors(body);

        let order = cfg::reverse_post_order_from(start, |block| {
            if Some(block) == stop {
                return Vec::new();
            }

            match body.block(block).and_then(|b| b.ending_instruction()) {
                Some(Instruction::ParallelBlock { end, .. }) => vec![*end],
                Some(ending) => ending.successors(),
                None => Vec::new(),
            }
        });

        for block_id in order {
            if Some(block_id) == stop {
                continue;
            }

            let block = body.block(block_id).ok_or_else(|| {
                CompileError::internal("type_inference", format!("missing block {block_id}"))
            })?;

            let reachable = block_id == start
                || predecessors
                    .get(block_id)
                    .is_some_and(|list| list.iter().any(|p| context.is_edge_live(*p, block_id)));
            if !reachable {
                continue;
            }

            context.enter_block(block_id);

            for (index, instruction) in block.instructions.iter().enumerate() {
                if context.is_interrupted() {
                    break;
                }

                self.infer_instruction(body, context, InstructionLocation::new(block_id, index), instruction)?;
            }

            if !context.is_interrupted() {
                for successor in block.successors() {
                    context.mark_edge_live(block_id, successor);
                }
            }
        }

        Ok(())
    }

    pub fn infer_instruction(
        &self,
        body: &FunctionBody,
        context: &mut TypeInferenceContext,
        location: InstructionLocation,
        instruction: &Instruction,
    ) -> CompileResult<()> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.accepts(instruction))
            .ok_or_else(|| {
                CompileError::internal(
                    "type_inference",
                    format!("no rule accepts `{instruction}`"),
                )
            })?;

        rule.infer(self, body, context, location, instruction)
    }
}
