use hashbrown::HashMap;
use strum::{Display, EnumIter, EnumString};

use crate::middle::ssa::BlockId;

/// The value of an [`Instruction::Assignment`].
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
}

/// How the iterations of a parallel region are distributed over workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleStrategy {
    /// One iteration per work item
    #[default]
    Direct,
    /// Several consecutive iterations per work item
    Coarse,
    /// Iterations are shared by the items of a work group
    Cooperative,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParallelSettings {
    pub schedule: ScheduleStrategy,
    pub local_size: Vec<u32>,
}

/// Merges one value per control flow predecessor into a single name.
///
/// Entries keep insertion order, which does not have to match the order in
/// which predecessors are visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiInstruction {
    output: String,
    entries: Vec<(BlockId, String)>,
}

impl PhiInstruction {
    pub fn new<S: Into<String>>(
        output: impl Into<String>,
        entries: impl IntoIterator<Item = (BlockId, S)>,
    ) -> Self {
        Self {
            output: output.into(),
            entries: entries
                .into_iter()
                .map(|(block, variable)| (block, variable.into()))
                .collect(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn entries(&self) -> &[(BlockId, String)] {
        &self.entries
    }

    pub fn input_variables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, variable)| variable.as_str())
    }

    pub fn source_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.entries.iter().map(|(block, _)| *block)
    }

    pub fn input_for(&self, block: BlockId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(source, _)| *source == block)
            .map(|(_, variable)| variable.as_str())
    }

    /// Replaces the variable read along the entry at `position`.
    pub fn set_input_at(&mut self, position: usize, variable: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(position) {
            entry.1 = variable.into();
        }
    }

    pub fn remove_source(&mut self, block: BlockId) {
        self.entries.retain(|(source, _)| *source != block);
    }

    /// Names missing from the mapping are left alone.
    pub fn rename_variables(&mut self, new_names: &HashMap<String, String>) {
        rename(&mut self.output, new_names);
        for (_, variable) in &mut self.entries {
            rename(variable, new_names);
        }
    }

    /// `old_ids[i]` becomes `new_ids[i]`. All entries are remapped at once, so
    /// swapping two ids is fine.
    pub fn rename_blocks(&mut self, old_ids: &[BlockId], new_ids: &[BlockId]) {
        for (block, _) in &mut self.entries {
            *block = remap_block(*block, old_ids, new_ids);
        }
    }

    /// The edge leaving `original` now leaves `end`, the block that inherited
    /// the terminator of `original` when it was split.
    pub fn break_block(&mut self, original: BlockId, _start: BlockId, end: BlockId) {
        for (block, _) in &mut self.entries {
            if *block == original {
                *block = end;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `A$1 = arg 0`
    Argument { output: String, index: usize },
    /// `x$1 = 3`
    Assignment { output: String, value: Constant },
    /// `y$2 = y$1`
    CopyFromVariable { output: String, input: String },
    /// `$out = phi #1:$1, #2:$2`
    Phi(PhiInstruction),
    /// `branch c$1, #1, #2`
    Branch {
        condition: String,
        positive: BlockId,
        negative: BlockId,
    },
    /// `goto #3`
    Goto { destination: BlockId },
    Return,
    /// `x$2 = call plus a$1, b$1`
    FunctionCall {
        function: String,
        outputs: Vec<String>,
        inputs: Vec<String>,
    },
    /// `x$1 = simple_get A$2($index$1)`
    SimpleGet {
        output: String,
        array: String,
        indices: Vec<String>,
    },
    /// `A$2 = simple_set A$1($index$1), v$1`
    SimpleSet {
        output: String,
        array: String,
        indices: Vec<String>,
        value: String,
    },
    /// Runs the region starting at `content` in parallel. The region rejoins
    /// the enclosing code with a jump to `end`.
    ParallelBlock {
        settings: ParallelSettings,
        content: BlockId,
        end: BlockId,
    },
}

impl Instruction {
    pub fn copy(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self::CopyFromVariable {
            output: output.into(),
            input: input.into(),
        }
    }

    pub fn call<S: Into<String>, T: Into<String>>(
        function: impl Into<String>,
        outputs: impl IntoIterator<Item = S>,
        inputs: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::FunctionCall {
            function: function.into(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            inputs: inputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Instruction::Argument { .. }
            | Instruction::Assignment { .. }
            | Instruction::Goto { .. }
            | Instruction::Return
            | Instruction::ParallelBlock { .. } => Vec::new(),
            Instruction::CopyFromVariable { input, .. } => vec![input.as_str()],
            Instruction::Phi(phi) => phi.input_variables().collect(),
            Instruction::Branch { condition, .. } => vec![condition.as_str()],
            Instruction::FunctionCall { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            Instruction::SimpleGet { array, indices, .. } => std::iter::once(array.as_str())
                .chain(indices.iter().map(String::as_str))
                .collect(),
            Instruction::SimpleSet {
                array,
                indices,
                value,
                ..
            } => std::iter::once(array.as_str())
                .chain(indices.iter().map(String::as_str))
                .chain(std::iter::once(value.as_str()))
                .collect(),
        }
    }

    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Instruction::Argument { output, .. }
            | Instruction::Assignment { output, .. }
            | Instruction::CopyFromVariable { output, .. }
            | Instruction::SimpleGet { output, .. }
            | Instruction::SimpleSet { output, .. } => vec![output.as_str()],
            Instruction::Phi(phi) => vec![phi.output()],
            Instruction::FunctionCall { outputs, .. } => {
                outputs.iter().map(String::as_str).collect()
            }
            Instruction::Branch { .. }
            | Instruction::Goto { .. }
            | Instruction::Return
            | Instruction::ParallelBlock { .. } => Vec::new(),
        }
    }

    pub fn uses_variable(&self, name: &str) -> bool {
        self.inputs().contains(&name)
    }

    /// Every block id this instruction mentions, including phi predecessors.
    pub fn block_references(&self) -> Vec<BlockId> {
        match self {
            Instruction::Phi(phi) => phi.source_blocks().collect(),
            Instruction::ParallelBlock { content, end, .. } => vec![*content, *end],
            _ => self.successors(),
        }
    }

    /// Blocks control may transfer to once this instruction executes.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Branch {
                positive, negative, ..
            } => vec![*positive, *negative],
            Instruction::Goto { destination } => vec![*destination],
            Instruction::ParallelBlock { content, .. } => vec![*content],
            _ => Vec::new(),
        }
    }

    /// Whether this instruction must be the last one of its block.
    pub fn is_ending(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::Goto { .. }
                | Instruction::Return
                | Instruction::ParallelBlock { .. }
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instruction::Phi(_))
    }

    pub fn as_phi(&self) -> Option<&PhiInstruction> {
        match self {
            Instruction::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    pub fn as_phi_mut(&mut self) -> Option<&mut PhiInstruction> {
        match self {
            Instruction::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Returns a copy of this instruction with its inputs and outputs renamed.
    #[must_use]
    pub fn renamed_variables(&self, new_names: &HashMap<String, String>) -> Self {
        let mut instruction = self.clone();
        instruction.rename_variables(new_names);
        instruction
    }

    pub fn rename_variables(&mut self, new_names: &HashMap<String, String>) {
        match self {
            Instruction::Argument { output, .. } | Instruction::Assignment { output, .. } => {
                rename(output, new_names)
            }
            Instruction::CopyFromVariable { output, input } => {
                rename(output, new_names);
                rename(input, new_names);
            }
            Instruction::Phi(phi) => phi.rename_variables(new_names),
            Instruction::Branch { condition, .. } => rename(condition, new_names),
            Instruction::FunctionCall {
                outputs, inputs, ..
            } => {
                outputs
                    .iter_mut()
                    .chain(inputs.iter_mut())
                    .for_each(|name| rename(name, new_names));
            }
            Instruction::SimpleGet {
                output,
                array,
                indices,
            } => {
                rename(output, new_names);
                rename(array, new_names);
                indices.iter_mut().for_each(|name| rename(name, new_names));
            }
            Instruction::SimpleSet {
                output,
                array,
                indices,
                value,
            } => {
                rename(output, new_names);
                rename(array, new_names);
                rename(value, new_names);
                indices.iter_mut().for_each(|name| rename(name, new_names));
            }
            Instruction::Goto { .. } | Instruction::Return | Instruction::ParallelBlock { .. } => {}
        }
    }

    pub fn rename_blocks(&mut self, old_ids: &[BlockId], new_ids: &[BlockId]) {
        match self {
            Instruction::Phi(phi) => phi.rename_blocks(old_ids, new_ids),
            Instruction::Branch {
                positive, negative, ..
            } => {
                *positive = remap_block(*positive, old_ids, new_ids);
                *negative = remap_block(*negative, old_ids, new_ids);
            }
            Instruction::Goto { destination } => {
                *destination = remap_block(*destination, old_ids, new_ids)
            }
            Instruction::ParallelBlock { content, end, .. } => {
                *content = remap_block(*content, old_ids, new_ids);
                *end = remap_block(*end, old_ids, new_ids);
            }
            _ => {}
        }
    }

    /// Only phis remember where control came from, so they are the only
    /// instructions affected by splitting a block.
    pub fn break_block(&mut self, original: BlockId, start: BlockId, end: BlockId) {
        if let Instruction::Phi(phi) = self {
            phi.break_block(original, start, end);
        }
    }
}

fn rename(name: &mut String, new_names: &HashMap<String, String>) {
    if let Some(new_name) = new_names.get(name.as_str()) {
        name.clone_from(new_name);
    }
}

fn remap_block(block: BlockId, old_ids: &[BlockId], new_ids: &[BlockId]) -> BlockId {
    old_ids
        .iter()
        .zip(new_ids)
        .find(|(old, _)| **old == block)
        .map_or(block, |(_, new)| *new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index::Index, middle::ssa::pretty_print::normalize};

    fn block(id: usize) -> BlockId {
        BlockId::new(id)
    }

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    fn sample_phi() -> PhiInstruction {
        PhiInstruction::new("$out", [(block(1), "$1"), (block(2), "$2")])
    }

    #[test]
    fn phi_rename_with_empty_mapping_is_identity() {
        let mut phi = sample_phi();
        phi.rename_variables(&HashMap::new());

        assert_eq!(phi, sample_phi());
    }

    #[test]
    fn phi_rename_output_only() {
        let mut phi = sample_phi();
        phi.rename_variables(&names(&[("$out", "$result")]));

        assert_eq!(phi.output(), "$result");
        assert_eq!(phi.input_variables().collect::<Vec<_>>(), ["$1", "$2"]);
    }

    #[test]
    fn phi_rename_inputs_only() {
        let mut phi = sample_phi();
        phi.rename_variables(&names(&[("$1", "$a"), ("$2", "$b")]));

        assert_eq!(phi.output(), "$out");
        assert_eq!(phi.input_variables().collect::<Vec<_>>(), ["$a", "$b"]);
    }

    #[test]
    fn phi_break_block_retargets_the_split_edge() {
        let mut phi = sample_phi();
        phi.break_block(block(1), block(3), block(4));

        assert_eq!(normalize(&phi.to_string()), "$out = phi #4:$1, #2:$2");
        assert_eq!(phi.entries().len(), 2);
        assert_eq!(phi.input_for(block(4)), Some("$1"));
    }

    #[test]
    fn phi_rename_blocks_is_simultaneous() {
        let mut phi = sample_phi();
        phi.rename_blocks(&[block(1), block(2)], &[block(2), block(1)]);

        assert_eq!(phi.input_for(block(2)), Some("$1"));
        assert_eq!(phi.input_for(block(1)), Some("$2"));
    }

    #[test]
    fn renamed_variables_leaves_original_untouched() {
        let original = Instruction::SimpleSet {
            output: "A$2".into(),
            array: "A$1".into(),
            indices: vec!["$index$1".into()],
            value: "x$1".into(),
        };
        let renamed = original.renamed_variables(&names(&[("A$1", "B$1"), ("$index$1", "i$1")]));

        assert_eq!(original.inputs(), ["A$1", "$index$1", "x$1"]);
        assert_eq!(renamed.inputs(), ["B$1", "i$1", "x$1"]);
        assert_eq!(renamed.outputs(), ["A$2"]);
    }

    #[test]
    fn parallel_block_references_both_regions() {
        let instruction = Instruction::ParallelBlock {
            settings: ParallelSettings::default(),
            content: block(1),
            end: block(2),
        };

        assert!(instruction.is_ending());
        assert_eq!(instruction.successors(), [block(1)]);
        assert_eq!(instruction.block_references(), [block(1), block(2)]);
    }
}
