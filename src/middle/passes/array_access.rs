use crate::{
    error::CompileResult,
    middle::{
        passes::{PassContext, SsaPass},
        ssa::{FunctionBody, Instruction},
    },
};

/// Folds a read of an array version straight after the store that produced
/// it:
///
/// ```text
/// A$2 = simple_set A$1($index$1), v$1
/// x$1 = simple_get A$2($index$1)
/// ```
///
/// becomes a copy `x$1 = v$1`. The indices must be the very same variables;
/// no attempt is made to prove two different index variables equal.
#[derive(Debug, Default)]
pub struct ArrayAccessSimplification;

impl SsaPass for ArrayAccessSimplification {
    fn name(&self) -> &'static str {
        "array_access_simplification"
    }

    fn apply(&mut self, body: &mut FunctionBody, context: &PassContext<'_>) -> CompileResult<()> {
        let logger = context.logger(self.name());
        logger.log_start();

        let mut folded = 0;

        for block in body.blocks.iter_mut() {
            for index in 1..block.instructions.len() {
                let Instruction::SimpleSet {
                    output: stored,
                    indices: store_indices,
                    value,
                    ..
                } = &block.instructions[index - 1]
                else {
                    continue;
                };

                let Instruction::SimpleGet {
                    output,
                    array,
                    indices,
                } = &block.instructions[index]
                else {
                    continue;
                };

                if array != stored || indices != store_indices {
                    continue;
                }

                logger.log(format_args!("{output} reads {value} through {array}"));

                let copy = Instruction::copy(output.clone(), value.clone());
                block.replace_instruction_at(index, copy);
                folded += 1;
            }
        }

        if folded == 0 {
            logger.log_skip();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::CompilerOptions,
        middle::ssa::{Block, pretty_print::normalize},
    };

    fn set(output: &str, array: &str, index: &str, value: &str) -> Instruction {
        Instruction::SimpleSet {
            output: output.into(),
            array: array.into(),
            indices: vec![index.into()],
            value: value.into(),
        }
    }

    fn get(output: &str, array: &str, index: &str) -> Instruction {
        Instruction::SimpleGet {
            output: output.into(),
            array: array.into(),
            indices: vec![index.into()],
        }
    }

    fn run(body: &mut FunctionBody) {
        let options = CompilerOptions::default();
        let context = PassContext::new(body.name(), &options);

        ArrayAccessSimplification.apply(body, &context).unwrap();
    }

    fn prologue() -> Vec<Instruction> {
        vec![
            Instruction::Argument {
                output: "A$1".into(),
                index: 0,
            },
            Instruction::Argument {
                output: "$index$1".into(),
                index: 1,
            },
            Instruction::Argument {
                output: "$index$2".into(),
                index: 2,
            },
            Instruction::Argument {
                output: "v$1".into(),
                index: 3,
            },
        ]
    }

    #[test]
    fn store_then_load_at_the_same_index_is_folded() {
        let mut instructions = prologue();
        instructions.extend([
            set("A$2", "A$1", "$index$1", "v$1"),
            get("x$1", "A$2", "$index$1"),
            Instruction::Return,
        ]);
        let mut body = FunctionBody::with_blocks("f", [Block::with_instructions(instructions)]);

        run(&mut body);

        assert_eq!(
            body.to_normalized_string(),
            normalize(indoc! {"
                f
                block #0:
                    A$1 = arg 0
                    $index$1 = arg 1
                    $index$2 = arg 2
                    v$1 = arg 3
                    A$2 = simple_set A$1($index$1), v$1
                    x$1 = v$1
                    return
            "})
        );
    }

    #[test]
    fn load_at_a_different_index_is_kept() {
        let mut instructions = prologue();
        instructions.extend([
            set("A$2", "A$1", "$index$1", "v$1"),
            get("x$1", "A$2", "$index$2"),
            Instruction::Return,
        ]);
        let mut body = FunctionBody::with_blocks("f", [Block::with_instructions(instructions)]);
        let before = body.to_normalized_string();

        run(&mut body);

        assert_eq!(body.to_normalized_string(), before);
    }

    #[test]
    fn load_of_an_older_version_is_kept() {
        let mut instructions = prologue();
        instructions.extend([
            set("A$2", "A$1", "$index$1", "v$1"),
            get("x$1", "A$1", "$index$1"),
            Instruction::Return,
        ]);
        let mut body = FunctionBody::with_blocks("f", [Block::with_instructions(instructions)]);
        let before = body.to_normalized_string();

        run(&mut body);

        assert_eq!(body.to_normalized_string(), before);
    }
}
