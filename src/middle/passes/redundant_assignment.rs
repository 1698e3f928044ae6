use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    error::CompileResult,
    middle::{
        passes::{PassContext, SsaPass},
        ssa::{FunctionBody, Instruction, InstructionLocation, variable},
    },
};

/// Removes copies `y$2 = y$1` by giving both sides one name. A phi whose
/// inputs, apart from its own output, are all the same variable is a copy
/// too.
///
/// With `preserve_final_names`, a copy into a declared output (`y$ret`) is
/// only fused when its source is a temporary; otherwise it stays so the
/// output keeps its name. Without it, names are fused into `a+b$1+2` and an
/// output name always survives. Two output names are never fused.
#[derive(Debug, Default)]
pub struct RedundantAssignmentElimination;

struct Redundancy {
    location: InstructionLocation,
    output: String,
    input: String,
    merged: String,
}

impl SsaPass for RedundantAssignmentElimination {
    fn name(&self) -> &'static str {
        "redundant_assignment_elimination"
    }

    fn apply(&mut self, body: &mut FunctionBody, context: &PassContext<'_>) -> CompileResult<()> {
        let logger = context.logger(self.name());
        logger.log_start();

        let preserve_final_names = context.options().preserve_final_names;
        let mut removed = 0;

        while let Some(redundancy) = find_redundancy(body, preserve_final_names) {
            logger.log(format_args!(
                "{} = {} becomes {}",
                redundancy.output, redundancy.input, redundancy.merged
            ));

            body.remove_instruction(redundancy.location)?;

            let new_names = [redundancy.output, redundancy.input]
                .into_iter()
                .filter(|name| *name != redundancy.merged)
                .map(|name| (name, redundancy.merged.clone()))
                .collect::<HashMap<_, _>>();
            body.rename_variables(&new_names);

            removed += 1;
        }

        if removed == 0 {
            logger.log_skip();
        }

        Ok(())
    }
}

fn find_redundancy(body: &FunctionBody, preserve_final_names: bool) -> Option<Redundancy> {
    body.locations().find_map(|(location, instruction)| {
        let (output, input) = match instruction {
            Instruction::CopyFromVariable { output, input } => (output.as_str(), input.as_str()),
            Instruction::Phi(phi) => {
                let output = phi.output();
                let input = phi
                    .input_variables()
                    .filter(|input| *input != output)
                    .unique()
                    .exactly_one()
                    .ok()?;
                (output, input)
            }
            _ => return None,
        };

        let merged = if output == input {
            output.to_string()
        } else {
            merged_name(output, input, preserve_final_names)?
        };

        Some(Redundancy {
            location,
            output: output.to_string(),
            input: input.to_string(),
            merged,
        })
    })
}

/// The name both sides of `output = input` go by once the copy is gone, or
/// `None` if the copy has to stay.
fn merged_name(output: &str, input: &str, preserve_final_names: bool) -> Option<String> {
    let output_is_final = variable::is_return_name(output);
    let input_is_final = variable::is_return_name(input);

    match (output_is_final, input_is_final) {
        (true, true) => None,
        (true, false) if preserve_final_names => {
            variable::is_anonymous(input).then(|| output.to_string())
        }
        (true, false) => Some(output.to_string()),
        (false, true) => Some(input.to_string()),
        (false, false) if preserve_final_names => Some(input.to_string()),
        (false, false) => Some(fuse_names(input, output)),
    }
}

/// `a$1` and `b$2` give `a+b$1+2`; parts already present are not repeated.
fn fuse_names(first: &str, second: &str) -> String {
    let (first_base, first_version) = variable::split_name(first);
    let (second_base, second_version) = variable::split_name(second);

    let base = first_base
        .split('+')
        .chain(second_base.split('+'))
        .filter(|part| !part.is_empty())
        .unique()
        .join("+");
    let version = first_version
        .split('+')
        .chain(second_version.split('+'))
        .filter(|part| !part.is_empty())
        .unique()
        .join("+");

    variable::make_name(&base, &version)
}
