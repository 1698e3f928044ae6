//! Structural checks on a function body. Passes are run with the validator in
//! between so that the first pass that breaks an invariant is the one named in
//! the error.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::{
    error::{CompileError, CompileResult},
    middle::ssa::{FunctionBody, InstructionLocation, cfg},
};

/// Checks the SSA invariants of `body`. `context` names whoever asked for the
/// check and prefixes the error message.
pub fn validate(body: &FunctionBody, context: &str) -> CompileResult<()> {
    let fail = |message: String| -> CompileResult<()> {
        Err(CompileError::internal(
            context,
            format!("in function {}: {message}", body.name()),
        ))
    };

    if body.blocks.is_empty() {
        return fail("function has no blocks".into());
    }

    /* Block references and block layout */

    for (location, instruction) in body.locations() {
        if let Some(target) = instruction
            .block_references()
            .into_iter()
            .find(|target| !body.blocks.contains(*target))
        {
            return fail(format!(
                "`{instruction}` at {location:?} refers to missing block {target}"
            ));
        }
    }

    for (block_id, block) in body.blocks.enumerate() {
        let mut seen_non_phi = false;

        for (index, instruction) in block.instructions.iter().enumerate() {
            if instruction.is_phi() {
                if seen_non_phi {
                    return fail(format!(
                        "phi `{instruction}` in block {block_id} follows a non-phi instruction"
                    ));
                }
            } else {
                seen_non_phi = true;
            }

            if instruction.is_ending() && index + 1 != block.instructions.len() {
                return fail(format!(
                    "ending instruction `{instruction}` is not the last of block {block_id}"
                ));
            }
        }
    }

    /* Single assignment */

    let mut definitions: HashMap<&str, InstructionLocation> = HashMap::new();
    for (location, instruction) in body.locations() {
        for output in instruction.outputs() {
            if let Some(previous) = definitions.insert(output, location) {
                return fail(format!(
                    "variable {output} is defined at both {previous:?} and {location:?}"
                ));
            }
        }
    }

    for (location, instruction) in body.locations() {
        if let Some(input) = instruction
            .inputs()
            .into_iter()
            .find(|input| !definitions.contains_key(input))
        {
            return fail(format!(
                "`{instruction}` at {location:?} uses undeclared variable {input}"
            ));
        }
    }

    /* Phis agree with the control flow graph */

    let predecessors = cfg::predecessors(body);
    for (block_id, block) in body.blocks.enumerate() {
        for phi in block.phis() {
            if phi.entries().is_empty() {
                return fail(format!("phi for {} has no inputs", phi.output()));
            }

            let mut sources = HashSet::new();
            if let Some(duplicate) = phi.source_blocks().find(|b| !sources.insert(*b)) {
                return fail(format!(
                    "phi `{phi}` lists predecessor {duplicate} more than once"
                ));
            }

            let expected = predecessors[block_id].iter().copied().collect::<HashSet<_>>();
            if sources != expected {
                return fail(format!(
                    "phi `{phi}` in block {block_id} does not match predecessors [{}]",
                    predecessors[block_id].iter().join(", ")
                ));
            }
        }
    }

    Ok(())
}
