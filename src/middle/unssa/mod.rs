//! Leaving SSA form. Variables that never hold different live values at the
//! same time are grouped, every group is renamed to one name and the phis,
//! now reading and writing that same name, disappear.
//!
//! The body has to be in conventional SSA first (see
//! [`ConventionalSsa`](crate::middle::passes::ConventionalSsa)), or phi
//! groups may interfere.

use hashbrown::HashMap;

use crate::{
    error::{CompileError, CompileResult},
    logging::PassLogger,
    middle::{
        ssa::{FunctionBody, Instruction},
        ty::VariableType,
    },
};

pub mod allocator;
pub mod interference;
pub mod liveness;

pub use allocator::{VariableAllocation, allocate};
pub use interference::{InterferenceGraph, build_interference_graph};
pub use liveness::{Liveness, compute_liveness};

/// Renames every variable to its group's representative, then drops the phis
/// and the copies that became `x = x`.
pub fn destruct_ssa(body: &mut FunctionBody, allocation: &VariableAllocation) -> CompileResult<()> {
    body.rename_variables(&allocation.renames());

    for (block_id, block) in body.blocks.enumerate() {
        for phi in block.phis() {
            if let Some(input) = phi.input_variables().find(|input| *input != phi.output()) {
                return Err(CompileError::internal(
                    "destruct_ssa",
                    format!(
                        "phi {} in {block_id} still reads {input} after allocation",
                        phi.output()
                    ),
                ));
            }
        }
    }

    for block in body.blocks.iter_mut() {
        block.instructions.retain(|instruction| match instruction {
            Instruction::Phi(_) => false,
            Instruction::CopyFromVariable { output, input } => output != input,
            _ => true,
        });
    }

    Ok(())
}

/// Liveness, interference, allocation and destruction in one go. `types`
/// must cover every variable of the body.
pub fn leave_ssa(
    body: &mut FunctionBody,
    types: &HashMap<String, VariableType>,
    logger: &PassLogger,
) -> CompileResult<VariableAllocation> {
    logger.log_start();

    let liveness = compute_liveness(body);
    let mut graph = build_interference_graph(body, &liveness);
    let allocation = allocate(body, types, &mut graph)?;

    for group in allocation.groups().filter(|group| group.len() > 1) {
        logger.log(format_args!("{}", group.join(", ")));
    }

    destruct_ssa(body, &allocation)?;

    Ok(allocation)
}
