//! Block level liveness.
//!
//! Backward dataflow to a fixpoint:
//!
//! ```text
//! live_out(B) = U live_in(S) for every successor S
//!             + phi inputs read along an edge leaving B
//!             + every `$ret` variable if B returns
//! live_in(B)  = used(B) + (live_out(B) - defined(B))
//! ```
//!
//! A phi input is only live out of the predecessor it comes from, never at
//! the entry of the block holding the phi.

use std::collections::BTreeSet;

use crate::{
    index::IndexVec,
    middle::ssa::{Block, BlockId, FunctionBody},
};

pub type LiveSet = BTreeSet<String>;

#[derive(Debug, Clone)]
pub struct Liveness {
    live_in: IndexVec<BlockId, LiveSet>,
    live_out: IndexVec<BlockId, LiveSet>,
}

impl Liveness {
    pub fn live_in(&self, block: BlockId) -> Option<&LiveSet> {
        self.live_in.get(block)
    }

    pub fn live_out(&self, block: BlockId) -> Option<&LiveSet> {
        self.live_out.get(block)
    }
}

/// Variables read before being written in the block, and variables written.
fn used_and_defined(block: &Block) -> (LiveSet, LiveSet) {
    let mut used = LiveSet::new();
    let mut defined = LiveSet::new();

    for instruction in &block.instructions {
        if !instruction.is_phi() {
            for input in instruction.inputs() {
                if !defined.contains(input) {
                    used.insert(input.to_string());
                }
            }
        }

        defined.extend(instruction.outputs().into_iter().map(str::to_string));
    }

    (used, defined)
}

pub fn compute_liveness(body: &FunctionBody) -> Liveness {
    let outputs = body
        .output_names()
        .into_iter()
        .map(str::to_string)
        .collect::<LiveSet>();

    let (used, defined): (Vec<LiveSet>, Vec<LiveSet>) =
        body.blocks.iter().map(used_and_defined).unzip();
    let used: IndexVec<BlockId, LiveSet> = IndexVec::from_raw(used);
    let defined: IndexVec<BlockId, LiveSet> = IndexVec::from_raw(defined);

    /* Edge uses: phi inputs and returned values */
    let mut exit_uses: IndexVec<BlockId, LiveSet> = body
        .blocks
        .iter()
        .map(|block| {
            if block.returns() {
                outputs.clone()
            } else {
                LiveSet::new()
            }
        })
        .collect();

    for block in body.blocks.iter() {
        for phi in block.phis() {
            for (source, variable) in phi.entries() {
                if let Some(uses) = exit_uses.get_mut(*source) {
                    uses.insert(variable.clone());
                }
            }
        }
    }

    let mut live_in: IndexVec<BlockId, LiveSet> = body.blocks.iter().map(|_| LiveSet::new()).collect();
    let mut live_out = live_in.clone();

    let mut iterations = 0;
    loop {
        iterations += 1;
        let mut changed = false;

        for block_id in body.blocks.indices().collect::<Vec<_>>().into_iter().rev() {
            let block = &body.blocks[block_id];
            let mut new_out = exit_uses[block_id].clone();
            for successor in block.successors() {
                if let Some(successor_in) = live_in.get(successor) {
                    new_out.extend(successor_in.iter().cloned());
                }
            }

            let mut new_in = used[block_id].clone();
            new_in.extend(
                new_out
                    .iter()
                    .filter(|variable| !defined[block_id].contains(*variable))
                    .cloned(),
            );

            if new_in != live_in[block_id] || new_out != live_out[block_id] {
                changed = true;
                live_in[block_id] = new_in;
                live_out[block_id] = new_out;
            }
        }

        if !changed {
            break;
        }
    }

    tracing::trace!(function = body.name(), iterations, "liveness settled");

    Liveness { live_in, live_out }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        index::Index,
        middle::ssa::{Constant, Instruction, PhiInstruction},
    };

    fn set(names: &[&str]) -> LiveSet {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn counter() -> FunctionBody {
        let block = BlockId::new;
        FunctionBody::with_blocks(
            "count",
            [
                Block::with_instructions([
                    Instruction::Argument {
                        output: "n$1".into(),
                        index: 0,
                    },
                    Instruction::Assignment {
                        output: "i$1".into(),
                        value: Constant::Int(0),
                    },
                    Instruction::Goto { destination: block(1) },
                ]),
                Block::with_instructions([
                    Instruction::Phi(PhiInstruction::new("i$2", [(block(0), "i$1"), (block(1), "i$3")])),
                    Instruction::call("plus", ["i$3"], ["i$2", "n$1"]),
                    Instruction::Branch {
                        condition: "i$3".into(),
                        positive: block(1),
                        negative: block(2),
                    },
                ]),
                Block::with_instructions([Instruction::copy("i$ret", "i$3"), Instruction::Return]),
            ],
        )
    }

    #[test]
    fn phi_inputs_are_live_out_of_their_source_only() {
        let liveness = compute_liveness(&counter());
        let block = BlockId::new;

        assert_eq!(liveness.live_out(block(0)), Some(&set(&["i$1", "n$1"])));
        assert_eq!(liveness.live_in(block(1)), Some(&set(&["n$1"])));
        assert_eq!(liveness.live_out(block(1)), Some(&set(&["i$3", "n$1"])));
        assert_eq!(liveness.live_in(block(0)), Some(&set(&[])));
    }

    #[test]
    fn outputs_are_live_at_returns() {
        let liveness = compute_liveness(&counter());
        let block = BlockId::new;

        assert_eq!(liveness.live_out(block(2)), Some(&set(&["i$ret"])));
        assert_eq!(liveness.live_in(block(2)), Some(&set(&["i$3"])));
    }
}
