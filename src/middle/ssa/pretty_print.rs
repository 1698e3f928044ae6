use colored::Colorize;
use itertools::Itertools;

use crate::{
    index::Index,
    middle::ssa::{self, BlockId, Constant, Instruction, PhiInstruction},
};

impl core::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl core::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{value}"),
            Constant::Float(value) => write!(f, "{value:?}"),
            Constant::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl core::fmt::Display for PhiInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.output(),
            "=".white(),
            "phi".bright_green(),
            self.entries()
                .iter()
                .map(|(block, variable)| format!("{}:{variable}", block.to_string().blue()))
                .join(", ")
        )
    }
}

impl core::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Argument { output, index } => {
                write!(
                    f,
                    "{output} {} {} {}",
                    "=".white(),
                    "arg".cyan(),
                    index.to_string().purple()
                )
            }
            Instruction::Assignment { output, value } => {
                write!(f, "{output} {} {}", "=".white(), value.to_string().purple())
            }
            Instruction::CopyFromVariable { output, input } => {
                write!(f, "{output} {} {input}", "=".white())
            }
            Instruction::Phi(phi) => write!(f, "{phi}"),
            Instruction::Branch {
                condition,
                positive,
                negative,
            } => write!(
                f,
                "{} {condition}, {}, {}",
                "branch".cyan(),
                positive.to_string().blue(),
                negative.to_string().blue()
            ),
            Instruction::Goto { destination } => {
                write!(f, "{} {}", "goto".cyan(), destination.to_string().blue())
            }
            Instruction::Return => write!(f, "{}", "return".cyan()),
            Instruction::FunctionCall {
                function,
                outputs,
                inputs,
            } => {
                match outputs.as_slice() {
                    [] => {}
                    [output] => write!(f, "{output} {} ", "=".white())?,
                    outputs => write!(f, "[{}] {} ", outputs.iter().join(", "), "=".white())?,
                }

                write!(f, "{} {}", "call".cyan(), function.yellow())?;

                if !inputs.is_empty() {
                    write!(f, " {}", inputs.iter().join(", "))?;
                }

                Ok(())
            }
            Instruction::SimpleGet {
                output,
                array,
                indices,
            } => write!(
                f,
                "{output} {} {} {array}({})",
                "=".white(),
                "simple_get".cyan(),
                indices.iter().join(", ")
            ),
            Instruction::SimpleSet {
                output,
                array,
                indices,
                value,
            } => write!(
                f,
                "{output} {} {} {array}({}), {value}",
                "=".white(),
                "simple_set".cyan(),
                indices.iter().join(", ")
            ),
            Instruction::ParallelBlock {
                settings,
                content,
                end,
            } => write!(
                f,
                "{} {}, {} (schedule: {}, local_size: [{}])",
                "parallel".cyan(),
                content.to_string().blue(),
                end.to_string().blue(),
                settings.schedule,
                settings.local_size.iter().join(", ")
            ),
        }
    }
}

impl core::fmt::Display for ssa::FunctionBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name().blue())?;

        for (block_id, block) in self.blocks.enumerate() {
            writeln!(f, "{}", format!("block {block_id}:").bright_red())?;

            for instruction in &block.instructions {
                writeln!(f, "  {instruction}")?;
            }
        }

        Ok(())
    }
}

impl ssa::FunctionBody {
    /// Textual form without colours, indentation or blank lines. Two bodies
    /// print the same normalized string exactly when they have the same
    /// structure, which makes it the unit of comparison for passes.
    pub fn to_normalized_string(&self) -> String {
        normalize(&self.to_string())
    }
}

/// Strips ANSI escapes, trims every line and drops the empty ones.
pub fn normalize(text: &str) -> String {
    strip_ansi_escapes::strip_str(text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::ssa::ParallelSettings;

    #[test]
    fn normalize_ignores_colours_and_layout() {
        let text = format!("  {}  \n\n{}\n", "goto".cyan(), "#1".blue());

        assert_eq!(normalize(&text), "goto\n#1");
    }

    #[test]
    fn instruction_text() {
        let call = Instruction::call("size", ["r$1", "c$1"], ["A$1"]);
        let set = Instruction::SimpleSet {
            output: "A$2".into(),
            array: "A$1".into(),
            indices: vec!["$index$1".into()],
            value: "v$1".into(),
        };
        let parallel = Instruction::ParallelBlock {
            settings: ParallelSettings {
                schedule: ssa::ScheduleStrategy::Coarse,
                local_size: vec![64],
            },
            content: BlockId::new(1),
            end: BlockId::new(2),
        };
        let literal = Instruction::Assignment {
            output: "x$1".into(),
            value: Constant::Float(2.0),
        };

        assert_eq!(normalize(&call.to_string()), "[r$1, c$1] = call size A$1");
        assert_eq!(
            normalize(&set.to_string()),
            "A$2 = simple_set A$1($index$1), v$1"
        );
        assert_eq!(
            normalize(&parallel.to_string()),
            "parallel #1, #2 (schedule: coarse, local_size: [64])"
        );
        assert_eq!(normalize(&literal.to_string()), "x$1 = 2.0");
    }
}
