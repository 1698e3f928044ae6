use std::sync::Arc;

use arrayc::{
    CompileError, CompilerOptions,
    compile::{compile_function, compile_unit, unit_instances},
    index::Index,
    middle::{
        instance::resolver::InstanceResolver,
        passes::{PassContext, RedundantAssignmentElimination, run_passes},
        ssa::{Block, BlockId, Constant, FunctionBody, Instruction, PhiInstruction},
        ty::{NumericKind, TypeShape, VariableType},
    },
};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn resolver() -> InstanceResolver {
    InstanceResolver::new(Arc::new(CompilerOptions::default()))
}

fn argument(output: &str, index: usize) -> Instruction {
    Instruction::Argument {
        output: output.into(),
        index,
    }
}

fn block(id: usize) -> BlockId {
    BlockId::new(id)
}

fn add() -> FunctionBody {
    FunctionBody::with_blocks(
        "add",
        [Block::with_instructions([
            argument("a$1", 0),
            argument("b$1", 1),
            Instruction::call("plus", ["$sum$1"], ["a$1", "b$1"]),
            Instruction::copy("y$ret", "$sum$1"),
            Instruction::Return,
        ])],
    )
}

/// `x = 1` or `x = 2.5` depending on `c`.
fn select() -> FunctionBody {
    FunctionBody::with_blocks(
        "select",
        [
            Block::with_instructions([
                argument("c$1", 0),
                Instruction::Branch {
                    condition: "c$1".into(),
                    positive: block(1),
                    negative: block(2),
                },
            ]),
            Block::with_instructions([
                Instruction::Assignment {
                    output: "x$1".into(),
                    value: Constant::Int(1),
                },
                Instruction::Goto { destination: block(3) },
            ]),
            Block::with_instructions([
                Instruction::Assignment {
                    output: "x$2".into(),
                    value: Constant::Float(2.5),
                },
                Instruction::Goto { destination: block(3) },
            ]),
            Block::with_instructions([
                Instruction::Phi(PhiInstruction::new("x$3", [(block(1), "x$1"), (block(2), "x$2")])),
                Instruction::copy("y$ret", "x$3"),
                Instruction::Return,
            ]),
        ],
    )
}

#[test]
fn final_names_survive_copy_chains() {
    let mut body = FunctionBody::with_blocks(
        "f",
        [Block::with_instructions([
            argument("y$1", 0),
            Instruction::copy("y$2", "y$1"),
            Instruction::copy("y$ret", "y$2"),
            Instruction::Return,
        ])],
    );
    let options = CompilerOptions::default().with_preserve_final_names(true);
    let context = PassContext::new(body.name(), &options);

    run_passes(&mut body, &mut [&mut RedundantAssignmentElimination], &context).unwrap();

    assert_eq!(
        body.to_normalized_string(),
        indoc! {"
            f
            block #0:
            y$1 = arg 0
            y$ret = y$1
            return
        "}
        .trim_end()
    );
}

#[test]
fn stores_and_loads_share_storage() {
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
    let matrix = VariableType::dynamic_matrix(NumericKind::Double, TypeShape::unknown_2d());

    let compiled = compile_function(
        body,
        &[matrix.clone(), VariableType::int32(), VariableType::double()],
        &resolver(),
    )
    .unwrap();

    assert_eq!(
        compiled.body.to_normalized_string(),
        indoc! {"
            store_load
            block #0:
            A$ret = arg 0
            i$1 = arg 1
            x$ret = arg 2
            A$ret = simple_set A$ret(i$1), x$ret
            return
        "}
        .trim_end()
    );
    assert_eq!(compiled.types.get("A$ret"), Some(&matrix));
}

#[test]
fn joins_of_different_kinds_keep_their_conversion_copy() {
    let compiled = compile_function(select(), &[VariableType::logical()], &resolver()).unwrap();

    assert_eq!(
        compiled.body.to_normalized_string(),
        indoc! {"
            select
            block #0:
            c$1 = arg 0
            branch c$1, #1, #2
            block #1:
            x$1 = 1
            y$ret = x$1
            goto #3
            block #2:
            y$ret = 2.5
            goto #3
            block #3:
            return
        "}
        .trim_end()
    );
    assert_eq!(
        compiled.types.get("y$ret").and_then(VariableType::numeric_kind),
        Some(NumericKind::Double)
    );
    assert_eq!(
        compiled.types.get("x$1"),
        Some(&VariableType::scalar_constant(NumericKind::Int32, 1.0))
    );
}

#[test]
fn joins_without_a_common_type_fail() {
    let mut body = select();
    body.blocks.raw[2].instructions[0] = Instruction::Assignment {
        output: "x$2".into(),
        value: Constant::Str("two".into()),
    };

    let error = compile_function(body, &[VariableType::logical()], &resolver()).unwrap_err();

    assert!(matches!(error, CompileError::TypeConversion { .. }), "{error}");
}

#[test]
fn units_share_one_instance_cache() {
    let resolver = resolver();
    let functions = (0..8)
        .map(|_| (add(), vec![VariableType::double(), VariableType::double()]))
        .collect();

    let results = compile_unit(functions, &resolver);
    let compiled = results
        .iter()
        .map(|(_, result)| result.as_ref().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(compiled.len(), 8);
    assert_eq!(resolver.build_count(), 1);
    assert_eq!(
        unit_instances(compiled.iter().copied())
            .iter()
            .map(|instance| instance.name().to_string())
            .collect::<Vec<_>>(),
        ["plus_d_d"]
    );
}

#[test]
fn code_after_errors_is_never_typed() {
    let body = FunctionBody::with_blocks(
        "fail",
        [
            Block::with_instructions([
                Instruction::Assignment {
                    output: "$message$1".into(),
                    value: Constant::Str("always".into()),
                },
                Instruction::call("error", Vec::<String>::new(), ["$message$1"]),
                Instruction::Goto { destination: block(1) },
            ]),
            Block::with_instructions([
                Instruction::call("transpose", ["y$ret"], ["$message$1"]),
                Instruction::Return,
            ]),
        ],
    );

    let compiled = compile_function(body, &[], &resolver()).unwrap();

    assert_eq!(compiled.types.get("y$ret"), None);
    assert_eq!(
        compiled
            .instances
            .iter()
            .map(|instance| instance.interrupts())
            .collect::<Vec<_>>(),
        [true]
    );
}
