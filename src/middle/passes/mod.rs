//! Rewrites of a function body in SSA form. Passes run one after another over
//! a single body; whatever they need besides the body comes from the
//! [`PassContext`].

use crate::{
    config::CompilerOptions,
    error::CompileResult,
    logging::PassLogger,
    middle::ssa::{FunctionBody, validate::validate},
};

pub mod array_access;
pub mod block_reorder;
pub mod cssa;
pub mod redundant_assignment;

pub use array_access::ArrayAccessSimplification;
pub use block_reorder::BlockReordering;
pub use cssa::ConventionalSsa;
pub use redundant_assignment::RedundantAssignmentElimination;

#[derive(Debug, Clone)]
pub struct PassContext<'a> {
    function_name: String,
    options: &'a CompilerOptions,
}

impl<'a> PassContext<'a> {
    pub fn new(function_name: impl Into<String>, options: &'a CompilerOptions) -> Self {
        Self {
            function_name: function_name.into(),
            options,
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn options(&self) -> &CompilerOptions {
        self.options
    }

    pub fn logger(&self, pass_name: &'static str) -> PassLogger {
        PassLogger::new(&self.options.logging, pass_name, &self.function_name)
    }
}

pub trait SsaPass {
    fn name(&self) -> &'static str;

    fn apply(&mut self, body: &mut FunctionBody, context: &PassContext<'_>) -> CompileResult<()>;
}

/// Applies `passes` in order, validating the body after each one when
/// [`CompilerOptions::validate_passes`] is set.
pub fn run_passes(
    body: &mut FunctionBody,
    passes: &mut [&mut dyn SsaPass],
    context: &PassContext<'_>,
) -> CompileResult<()> {
    for pass in passes.iter_mut() {
        pass.apply(body, context)?;

        if context.options().validate_passes {
            validate(body, pass.name())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CompileError,
        middle::ssa::{Block, Instruction},
    };

    struct Breaks;

    impl SsaPass for Breaks {
        fn name(&self) -> &'static str {
            "breaks"
        }

        fn apply(&mut self, body: &mut FunctionBody, _: &PassContext<'_>) -> CompileResult<()> {
            body.blocks.raw[0].add_instruction(Instruction::copy("x$1", "nowhere$1"));
            Ok(())
        }
    }

    fn body() -> FunctionBody {
        FunctionBody::with_blocks("f", [Block::with_instructions([Instruction::Return])])
    }

    #[test]
    fn invalid_output_is_caught_after_the_pass() {
        let options = CompilerOptions::default();
        let context = PassContext::new("f", &options);

        let mut body = body();
        let error = run_passes(&mut body, &mut [&mut Breaks], &context).unwrap_err();

        assert!(matches!(
            error,
            CompileError::InternalConsistency { ref context, .. } if context == "breaks"
        ));
    }

    #[test]
    fn validation_can_be_disabled() {
        let options = CompilerOptions::default().with_validate_passes(false);
        let context = PassContext::new("f", &options);

        let mut body = body();
        assert_eq!(run_passes(&mut body, &mut [&mut Breaks], &context), Ok(()));
    }
}
