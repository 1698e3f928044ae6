//! SSA (Static Single Assignment) form of a function. A [`FunctionBody`] owns
//! a dense list of blocks; block ids are indices into that list and every
//! structural edit that adds, removes or moves blocks remaps all references to
//! them in one go.

use hashbrown::{HashMap, HashSet};

use crate::{
    error::{CompileError, CompileResult},
    index::{Index, IndexVec, simple_index},
};

pub mod cfg;
pub mod instruction;
pub mod pretty_print;
pub mod validate;
pub mod variable;

pub use instruction::{Constant, Instruction, ParallelSettings, PhiInstruction, ScheduleStrategy};

simple_index! {
    /// Identifies a block within its function body
    pub struct BlockId;
}

impl BlockId {
    pub const ENTRY: Self = Self(0);
}

/// Position of an instruction: its block and its index within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionLocation {
    pub block: BlockId,
    pub index: usize,
}

impl InstructionLocation {
    pub fn new(block: BlockId, index: usize) -> Self {
        Self { block, index }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(instructions: impl IntoIterator<Item = Instruction>) -> Self {
        Self {
            instructions: instructions.into_iter().collect(),
        }
    }

    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn prepend_instruction(&mut self, instruction: Instruction) {
        self.instructions.insert(0, instruction);
    }

    pub fn insert_instruction(&mut self, index: usize, instruction: Instruction) {
        self.instructions.insert(index, instruction);
    }

    /// Inserts right before the ending instruction, or at the end if the
    /// block has none.
    pub fn insert_before_ending(&mut self, instruction: Instruction) {
        let index = match self.ending_instruction() {
            Some(_) => self.instructions.len() - 1,
            None => self.instructions.len(),
        };

        self.instructions.insert(index, instruction);
    }

    pub fn replace_instruction_at(&mut self, index: usize, instruction: Instruction) -> Instruction {
        std::mem::replace(&mut self.instructions[index], instruction)
    }

    pub fn remove_instruction_at(&mut self, index: usize) -> Instruction {
        self.instructions.remove(index)
    }

    pub fn ending_instruction(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_ending())
    }

    pub fn returns(&self) -> bool {
        matches!(self.ending_instruction(), Some(Instruction::Return))
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.ending_instruction()
            .map(Instruction::successors)
            .unwrap_or_default()
    }

    pub fn phis(&self) -> impl Iterator<Item = &PhiInstruction> {
        self.instructions.iter().filter_map(Instruction::as_phi)
    }

    pub fn uses_variable(&self, name: &str) -> bool {
        self.instructions.iter().any(|i| i.uses_variable(name))
    }

    pub fn rename_variables(&mut self, new_names: &HashMap<String, String>) {
        for instruction in &mut self.instructions {
            instruction.rename_variables(new_names);
        }
    }

    pub fn rename_blocks(&mut self, old_ids: &[BlockId], new_ids: &[BlockId]) {
        for instruction in &mut self.instructions {
            instruction.rename_blocks(old_ids, new_ids);
        }
    }

    pub fn break_block(&mut self, original: BlockId, start: BlockId, end: BlockId) {
        for instruction in &mut self.instructions {
            instruction.break_block(original, start, end);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    name: String,
    pub blocks: IndexVec<BlockId, Block>,
}

impl FunctionBody {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: IndexVec::new(),
        }
    }

    pub fn with_blocks(name: impl Into<String>, blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            name: name.into(),
            blocks: blocks.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block)
    }

    /// All instructions with their locations, in block order.
    pub fn locations(&self) -> impl Iterator<Item = (InstructionLocation, &Instruction)> {
        self.blocks.enumerate().flat_map(|(block_id, block)| {
            block
                .instructions
                .iter()
                .enumerate()
                .map(move |(index, i)| (InstructionLocation::new(block_id, index), i))
        })
    }

    pub fn instruction_at(&self, location: InstructionLocation) -> Option<&Instruction> {
        self.blocks
            .get(location.block)?
            .instructions
            .get(location.index)
    }

    pub fn set_instruction(
        &mut self,
        location: InstructionLocation,
        instruction: Instruction,
    ) -> CompileResult<Instruction> {
        let slot = self
            .blocks
            .get_mut(location.block)
            .and_then(|b| b.instructions.get_mut(location.index))
            .ok_or_else(|| bad_location(location))?;

        Ok(std::mem::replace(slot, instruction))
    }

    pub fn insert_instruction(
        &mut self,
        location: InstructionLocation,
        instruction: Instruction,
    ) -> CompileResult<()> {
        let block = self
            .blocks
            .get_mut(location.block)
            .filter(|b| location.index <= b.instructions.len())
            .ok_or_else(|| bad_location(location))?;

        block.insert_instruction(location.index, instruction);
        Ok(())
    }

    pub fn remove_instruction(&mut self, location: InstructionLocation) -> CompileResult<Instruction> {
        let block = self
            .blocks
            .get_mut(location.block)
            .filter(|b| location.index < b.instructions.len())
            .ok_or_else(|| bad_location(location))?;

        Ok(block.remove_instruction_at(location.index))
    }

    pub fn uses_variable(&self, name: &str) -> bool {
        self.blocks.iter().any(|b| b.uses_variable(name))
    }

    /// Every defined variable, in definition order.
    pub fn declared_variables(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .flat_map(Instruction::outputs)
            .collect()
    }

    /// Argument variables ordered by argument index.
    pub fn argument_names(&self) -> Vec<&str> {
        let mut arguments = self
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| match i {
                Instruction::Argument { output, index } => Some((*index, output.as_str())),
                _ => None,
            })
            .collect::<Vec<_>>();

        arguments.sort_by_key(|(index, _)| *index);
        arguments.into_iter().map(|(_, name)| name).collect()
    }

    /// Declared outputs of the function (`name$ret`).
    pub fn output_names(&self) -> Vec<&str> {
        self.declared_variables()
            .into_iter()
            .filter(|name| variable::is_return_name(name))
            .collect()
    }

    /// Creates a `$semantics$N` name that is not mentioned anywhere in the body.
    pub fn make_temporary(&self, semantics: &str) -> String {
        let used = self
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .flat_map(|i| i.inputs().into_iter().chain(i.outputs()))
            .collect::<HashSet<_>>();

        (1..)
            .map(|n| format!("${semantics}${n}"))
            .find(|candidate| !used.contains(candidate.as_str()))
            .unwrap_or_default()
    }

    pub fn rename_variables(&mut self, new_names: &HashMap<String, String>) {
        if new_names.is_empty() {
            return;
        }

        for block in self.blocks.iter_mut() {
            block.rename_variables(new_names);
        }
    }

    pub fn rename_blocks(&mut self, old_ids: &[BlockId], new_ids: &[BlockId]) {
        for block in self.blocks.iter_mut() {
            block.rename_blocks(old_ids, new_ids);
        }
    }

    /// Informs every instruction that `original` was split into `start`
    /// (which keeps the head of the block) and `end` (which receives its
    /// terminator).
    pub fn break_block(&mut self, original: BlockId, start: BlockId, end: BlockId) {
        for block in self.blocks.iter_mut() {
            block.break_block(original, start, end);
        }
    }

    /// Moves blocks so that `order[i]` becomes block `i`. `order` must be a
    /// permutation of the current ids and no instruction may refer to a block
    /// outside the body. On error the body is left untouched.
    pub fn reorder_blocks(&mut self, order: &[BlockId]) -> CompileResult<()> {
        let mut seen = HashSet::new();
        if order.len() != self.blocks.len()
            || !order
                .iter()
                .all(|id| self.blocks.contains(*id) && seen.insert(*id))
        {
            return Err(CompileError::internal(
                "reorder_blocks",
                format!(
                    "block order {:?} is not a permutation of {} blocks",
                    order,
                    self.blocks.len()
                ),
            ));
        }

        self.check_block_references("reorder_blocks")?;

        let mut old = self.blocks.raw.drain(..).map(Some).collect::<Vec<_>>();
        self.blocks = order
            .iter()
            .filter_map(|id| old[id.index()].take())
            .collect();

        let new_ids = self.blocks.indices().collect::<Vec<_>>();
        self.rename_blocks(order, &new_ids);

        Ok(())
    }

    /// Removes the given blocks and compacts the remaining ids. Fails if a
    /// surviving instruction still refers to a removed block.
    pub fn remove_blocks(&mut self, removed: &[BlockId]) -> CompileResult<()> {
        let removed = removed.iter().copied().collect::<HashSet<_>>();

        for (location, instruction) in self.locations() {
            if removed.contains(&location.block) {
                continue;
            }

            if let Some(target) = instruction
                .block_references()
                .into_iter()
                .find(|target| removed.contains(target))
            {
                return Err(CompileError::internal(
                    "remove_blocks",
                    format!("`{instruction}` at {location:?} still refers to removed block {target}"),
                ));
            }
        }

        let kept = self
            .blocks
            .indices()
            .filter(|id| !removed.contains(id))
            .collect::<Vec<_>>();

        let mut old = self.blocks.raw.drain(..).map(Some).collect::<Vec<_>>();
        self.blocks = kept.iter().filter_map(|id| old[id.index()].take()).collect();

        let new_ids = self.blocks.indices().collect::<Vec<_>>();
        self.rename_blocks(&kept, &new_ids);

        Ok(())
    }

    /// Fails if any instruction names a block that does not exist.
    pub fn check_block_references(&self, context: &str) -> CompileResult<()> {
        for (location, instruction) in self.locations() {
            if let Some(target) = instruction
                .block_references()
                .into_iter()
                .find(|target| !self.blocks.contains(*target))
            {
                return Err(CompileError::internal(
                    context,
                    format!("`{instruction}` at {location:?} refers to missing block {target}"),
                ));
            }
        }

        Ok(())
    }
}

fn bad_location(location: InstructionLocation) -> CompileError {
    CompileError::internal(
        "function_body",
        format!("no instruction at {location:?}"),
    )
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn block(id: usize) -> BlockId {
        BlockId::new(id)
    }

    fn diamond() -> FunctionBody {
        FunctionBody::with_blocks(
            "diamond",
            [
                Block::with_instructions([
                    Instruction::Argument {
                        output: "c$1".into(),
                        index: 0,
                    },
                    Instruction::Branch {
                        condition: "c$1".into(),
                        positive: block(1),
                        negative: block(2),
                    },
                ]),
                Block::with_instructions([
                    Instruction::Assignment {
                        output: "$1".into(),
                        value: Constant::Int(1),
                    },
                    Instruction::Goto {
                        destination: block(3),
                    },
                ]),
                Block::with_instructions([
                    Instruction::Assignment {
                        output: "$2".into(),
                        value: Constant::Int(2),
                    },
                    Instruction::Goto {
                        destination: block(3),
                    },
                ]),
                Block::with_instructions([
                    Instruction::Phi(PhiInstruction::new(
                        "y$ret",
                        [(block(1), "$1"), (block(2), "$2")],
                    )),
                    Instruction::Return,
                ]),
            ],
        )
    }

    #[test]
    fn reorder_blocks_remaps_every_reference() {
        let mut body = diamond();
        body.reorder_blocks(&[block(0), block(2), block(1), block(3)])
            .unwrap();

        assert_eq!(
            body.to_normalized_string(),
            indoc! {"
                diamond
                block #0:
                c$1 = arg 0
                branch c$1, #2, #1
                block #1:
                $2 = 2
                goto #3
                block #2:
                $1 = 1
                goto #3
                block #3:
                y$ret = phi #2:$1, #1:$2
                return
            "}
            .trim_end()
        );
    }

    #[test]
    fn reorder_blocks_rejects_non_permutations_without_mutating() {
        let mut body = diamond();
        let before = body.clone();

        assert!(body.reorder_blocks(&[block(0), block(1), block(1), block(3)]).is_err());
        assert!(body.reorder_blocks(&[block(0), block(1)]).is_err());
        assert_eq!(body, before);
    }

    #[test]
    fn reorder_blocks_rejects_dangling_references() {
        let mut body = diamond();
        body.blocks[block(1)].instructions[1] = Instruction::Goto {
            destination: block(9),
        };
        let before = body.clone();

        let error = body
            .reorder_blocks(&[block(0), block(2), block(1), block(3)])
            .unwrap_err();

        assert!(error.is_internal());
        assert_eq!(body, before);
    }

    #[test]
    fn remove_blocks_compacts_ids() {
        let mut body = diamond();
        body.add_block(Block::with_instructions([Instruction::Return]));
        body.remove_blocks(&[block(4)]).unwrap();

        assert_eq!(body.blocks.len(), 4);
        assert_eq!(body, diamond());
    }

    #[test]
    fn remove_blocks_refuses_to_leave_dangling_targets() {
        let mut body = diamond();

        assert!(body.remove_blocks(&[block(2)]).is_err());
        assert_eq!(body.blocks.len(), 4);
    }

    #[test]
    fn make_temporary_skips_used_names() {
        let mut body = diamond();
        body.blocks[block(1)].insert_instruction(
            0,
            Instruction::Assignment {
                output: "$copy$1".into(),
                value: Constant::Int(0),
            },
        );

        assert_eq!(body.make_temporary("copy"), "$copy$2");
        assert_eq!(body.make_temporary("index"), "$index$1");
    }

    #[test]
    fn break_block_applies_to_all_phis() {
        let mut body = diamond();
        body.break_block(block(1), block(1), block(4));

        let phi = body.blocks[block(3)].phis().next().unwrap();
        assert_eq!(phi.input_for(block(4)), Some("$1"));
        assert_eq!(phi.input_for(block(1)), None);
    }

    #[test]
    fn instruction_queries() {
        let body = diamond();

        assert_eq!(body.argument_names(), ["c$1"]);
        assert_eq!(body.output_names(), ["y$ret"]);
        assert!(body.uses_variable("$2"));
        assert!(!body.uses_variable("y$ret"));
        assert!(body.blocks[block(3)].returns());
        assert_eq!(body.blocks[block(0)].successors(), [block(1), block(2)]);
    }

    #[test]
    fn insert_before_ending_keeps_terminator_last() {
        let mut body = diamond();
        body.blocks[block(1)].insert_before_ending(Instruction::copy("$3", "$1"));

        let instructions = &body.blocks[block(1)].instructions;
        assert_eq!(instructions[1], Instruction::copy("$3", "$1"));
        assert!(instructions[2].is_ending());
    }
}
