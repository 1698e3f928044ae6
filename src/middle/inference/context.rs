use std::{collections::BTreeSet, sync::Arc};

use hashbrown::{HashMap, HashSet};

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        inference::TypeInferenceResult,
        instance::FunctionInstance,
        ssa::{BlockId, InstructionLocation},
        ty::{VariableType, combine::combine},
    },
};

/// State of an inference run. Names are unique in SSA form, so one map holds
/// the types of the whole function; which blocks and edges have been reached
/// is tracked alongside.
///
/// `interrupted` belongs to the path being walked: once set, the rest of the
/// current block is skipped and none of its outgoing edges become live.
/// Blocks visited before are not affected.
#[derive(Debug, Clone)]
pub struct TypeInferenceContext {
    types: HashMap<String, VariableType>,
    argument_types: Vec<VariableType>,
    live_edges: HashSet<(BlockId, BlockId)>,
    reachable_blocks: BTreeSet<BlockId>,
    call_instances: HashMap<InstructionLocation, Arc<FunctionInstance>>,
    current_block: BlockId,
    interrupted: bool,
    changed: bool,
}

impl TypeInferenceContext {
    pub fn new(argument_types: Vec<VariableType>) -> Self {
        Self {
            types: HashMap::new(),
            argument_types,
            live_edges: HashSet::new(),
            reachable_blocks: BTreeSet::new(),
            call_instances: HashMap::new(),
            current_block: BlockId::ENTRY,
            interrupted: false,
            changed: false,
        }
    }

    pub fn type_of(&self, name: &str) -> Option<&VariableType> {
        self.types.get(name)
    }

    pub fn argument_type(&self, index: usize) -> CompileResult<&VariableType> {
        self.argument_types.get(index).ok_or_else(|| {
            CompileError::internal(
                "type_inference",
                format!(
                    "argument {index} requested but only {} argument types were given",
                    self.argument_types.len()
                ),
            )
        })
    }

    /// Records a type for `name`. A type seen on an earlier visit is joined
    /// with the new one, so types only ever grow.
    pub fn set_type(&mut self, name: &str, ty: VariableType) -> CompileResult<()> {
        let joined = match self.types.get(name) {
            Some(existing) if *existing == ty => return Ok(()),
            Some(existing) => {
                combine(existing, &ty).ok_or_else(|| CompileError::conversion(&ty, existing))?
            }
            None => ty,
        };

        if self.types.get(name) != Some(&joined) {
            self.types.insert(name.to_string(), joined);
            self.changed = true;
        }

        Ok(())
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn enter_block(&mut self, block: BlockId) {
        self.current_block = block;
        self.interrupted = false;
        self.reachable_blocks.insert(block);
    }

    /// Control never continues past the current instruction.
    pub fn mark_unreachable(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn mark_edge_live(&mut self, from: BlockId, to: BlockId) {
        if self.live_edges.insert((from, to)) {
            self.changed = true;
        }
    }

    pub fn is_edge_live(&self, from: BlockId, to: BlockId) -> bool {
        self.live_edges.contains(&(from, to))
    }

    pub fn has_live_edge_into(&self, block: BlockId) -> bool {
        self.live_edges.iter().any(|(_, to)| *to == block)
    }

    pub fn is_block_reachable(&self, block: BlockId) -> bool {
        self.reachable_blocks.contains(&block)
    }

    pub fn record_instance(&mut self, location: InstructionLocation, instance: Arc<FunctionInstance>) {
        self.call_instances.insert(location, instance);
    }

    pub(super) fn start_iteration(&mut self) {
        self.changed = false;
    }

    pub(super) fn changed(&self) -> bool {
        self.changed
    }

    /// A context for a nested region, starting from everything known so far.
    pub fn derive(&self) -> Self {
        Self {
            interrupted: false,
            changed: false,
            ..self.clone()
        }
    }

    /// Takes back what a derived context learned. The current block and path
    /// state stay those of `self`.
    pub fn merge(&mut self, child: TypeInferenceContext) {
        self.types = child.types;
        self.live_edges = child.live_edges;
        self.reachable_blocks = child.reachable_blocks;
        self.call_instances = child.call_instances;
        self.changed |= child.changed;
    }

    pub(super) fn into_result(self) -> TypeInferenceResult {
        TypeInferenceResult {
            types: self.types,
            reachable_blocks: self.reachable_blocks,
            call_instances: self.call_instances,
        }
    }
}
