use crate::{
    error::{CompileError, CompileResult},
    middle::{
        passes::{PassContext, SsaPass},
        ssa::{BlockId, FunctionBody, Instruction, InstructionLocation},
    },
};

/// Names the temporary that carries `source` into the phi defining `output`.
/// The pipeline uses it to type the temporary from inference results.
pub trait TemporaryNamer {
    fn make_temporary(
        &mut self,
        body: &FunctionBody,
        phi_output: &str,
        source: &str,
    ) -> CompileResult<String>;
}

impl<F> TemporaryNamer for F
where
    F: FnMut(&FunctionBody, &str, &str) -> CompileResult<String>,
{
    fn make_temporary(
        &mut self,
        body: &FunctionBody,
        phi_output: &str,
        source: &str,
    ) -> CompileResult<String> {
        self(body, phi_output, source)
    }
}

/// Converts to conventional SSA: every phi input gets its own copy at the end
/// of the predecessor it comes from,
///
/// ```text
/// block #1:                      block #1:
///     goto #3                        $phi$1 = x$1
///                          ==>       goto #3
/// block #3:                      block #3:
///     x$3 = phi #1:x$1, ...          x$3 = phi #1:$phi$1, ...
/// ```
///
/// so that phi-related variables never interfere and can share storage.
pub struct ConventionalSsa<N> {
    namer: N,
}

impl<N: TemporaryNamer> ConventionalSsa<N> {
    pub fn new(namer: N) -> Self {
        Self { namer }
    }
}

struct PhiSite {
    location: InstructionLocation,
    output: String,
    entries: Vec<(BlockId, String)>,
}

impl<N: TemporaryNamer> SsaPass for ConventionalSsa<N> {
    fn name(&self) -> &'static str {
        "conventional_ssa"
    }

    fn apply(&mut self, body: &mut FunctionBody, context: &PassContext<'_>) -> CompileResult<()> {
        let logger = context.logger(self.name());
        logger.log_start();

        let sites = body
            .locations()
            .filter_map(|(location, instruction)| {
                let phi = instruction.as_phi()?;
                Some(PhiSite {
                    location,
                    output: phi.output().to_string(),
                    entries: phi.entries().to_vec(),
                })
            })
            .collect::<Vec<_>>();

        if sites.is_empty() {
            logger.log_skip();
            return Ok(());
        }

        for site in sites {
            for (position, (source_block, source)) in site.entries.iter().enumerate() {
                let temporary = self.namer.make_temporary(body, &site.output, source)?;

                let predecessor = body.block_mut(*source_block).ok_or_else(|| {
                    CompileError::internal(
                        self.name(),
                        format!("phi {} reads from missing block {source_block}", site.output),
                    )
                })?;
                predecessor.insert_before_ending(Instruction::copy(temporary.clone(), source.clone()));

                logger.log(format_args!("{temporary} = {source} in {source_block}"));

                // Insertions go before the ending, so phis never move.
                let phi = body
                    .block_mut(site.location.block)
                    .and_then(|block| block.instructions.get_mut(site.location.index))
                    .and_then(Instruction::as_phi_mut)
                    .ok_or_else(|| {
                        CompileError::internal(self.name(), format!("lost phi {}", site.output))
                    })?;
                phi.set_input_at(position, temporary);
            }
        }

        Ok(())
    }
}
