//! Small functions, already in SSA form, for the driver to compile.

use arrayc::{
    index::Index,
    middle::{
        ssa::{Block, BlockId, Constant, FunctionBody, Instruction, PhiInstruction},
        ty::{NumericKind, TypeShape, VariableType},
    },
};

fn argument(output: &str, index: usize) -> Instruction {
    Instruction::Argument {
        output: output.into(),
        index,
    }
}

fn constant(output: &str, value: Constant) -> Instruction {
    Instruction::Assignment {
        output: output.into(),
        value,
    }
}

fn goto(destination: usize) -> Instruction {
    Instruction::Goto {
        destination: BlockId::new(destination),
    }
}

fn branch(condition: &str, positive: usize, negative: usize) -> Instruction {
    Instruction::Branch {
        condition: condition.into(),
        positive: BlockId::new(positive),
        negative: BlockId::new(negative),
    }
}

/// `y = a + b`
fn add() -> (FunctionBody, Vec<VariableType>) {
    let body = FunctionBody::with_blocks(
        "add",
        [Block::with_instructions([
            argument("a$1", 0),
            argument("b$1", 1),
            Instruction::call("plus", ["$sum$1"], ["a$1", "b$1"]),
            Instruction::copy("y$ret", "$sum$1"),
            Instruction::Return,
        ])],
    );

    (body, vec![VariableType::double(), VariableType::double()])
}

/// `i = 0; while i < n, i = i + 1; end`
fn count() -> (FunctionBody, Vec<VariableType>) {
    let block = BlockId::new;
    let body = FunctionBody::with_blocks(
        "count",
        [
            Block::with_instructions([
                argument("n$1", 0),
                constant("i$1", Constant::Int(0)),
                constant("$one$1", Constant::Int(1)),
                goto(1),
            ]),
            Block::with_instructions([
                Instruction::Phi(PhiInstruction::new("i$2", [(block(0), "i$1"), (block(2), "i$3")])),
                Instruction::call("lt", ["$condition$1"], ["i$2", "n$1"]),
                branch("$condition$1", 2, 3),
            ]),
            Block::with_instructions([
                Instruction::call("plus", ["i$3"], ["i$2", "$one$1"]),
                goto(1),
            ]),
            Block::with_instructions([Instruction::copy("i$ret", "i$2"), Instruction::Return]),
        ],
    );

    (body, vec![VariableType::int32()])
}

/// `A(i) = v; x = A(i)`
fn store_load() -> (FunctionBody, Vec<VariableType>) {
    let body = FunctionBody::with_blocks(
        "store_load",
        [Block::with_instructions([
            argument("A$1", 0),
            argument("i$1", 1),
            argument("v$1", 2),
            Instruction::SimpleSet {
                output: "A$2".into(),
                array: "A$1".into(),
                indices: vec!["i$1".into()],
                value: "v$1".into(),
            },
            Instruction::SimpleGet {
                output: "x$1".into(),
                array: "A$2".into(),
                indices: vec!["i$1".into()],
            },
            Instruction::copy("x$ret", "x$1"),
            Instruction::copy("A$ret", "A$2"),
            Instruction::Return,
        ])],
    );

    (
        body,
        vec![
            VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d()),
            VariableType::int32(),
            VariableType::double(),
        ],
    )
}

/// `if x < 0, error('negative input'); end; y = x`
fn check() -> (FunctionBody, Vec<VariableType>) {
    let body = FunctionBody::with_blocks(
        "check",
        [
            Block::with_instructions([
                argument("x$1", 0),
                constant("$zero$1", Constant::Int(0)),
                Instruction::call("lt", ["$condition$1"], ["x$1", "$zero$1"]),
                branch("$condition$1", 1, 2),
            ]),
            Block::with_instructions([
                constant("$message$1", Constant::Str("negative input".into())),
                Instruction::call("error", Vec::<String>::new(), ["$message$1"]),
                goto(2),
            ]),
            Block::with_instructions([Instruction::copy("y$ret", "x$1"), Instruction::Return]),
        ],
    );

    (body, vec![VariableType::double()])
}

pub fn all() -> Vec<(FunctionBody, Vec<VariableType>)> {
    vec![add(), count(), store_load(), check()]
}
