//! Coalesces SSA variables into groups that can share one storage location.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    error::{CompileError, CompileResult},
    middle::{
        ssa::{FunctionBody, Instruction, variable},
        ty::VariableType,
        unssa::interference::InterferenceGraph,
    },
};

/// A partition of the variables of a function. Every variable belongs to
/// exactly one group; emptied groups stay around so group ids are stable.
#[derive(Debug, Clone, Default)]
pub struct VariableAllocation {
    groups: Vec<Vec<String>>,
    group_of: HashMap<String, usize>,
}

impl VariableAllocation {
    /// One group per variable.
    pub fn singletons<S: AsRef<str>>(variables: impl IntoIterator<Item = S>) -> Self {
        let mut allocation = Self::default();
        for variable in variables {
            allocation.add_variable(variable.as_ref());
        }
        allocation
    }

    pub fn add_variable(&mut self, name: &str) -> usize {
        if let Some(&group) = self.group_of.get(name) {
            return group;
        }

        self.groups.push(vec![name.to_string()]);
        self.group_of.insert(name.to_string(), self.groups.len() - 1);
        self.groups.len() - 1
    }

    pub fn group_of(&self, name: &str) -> Option<usize> {
        self.group_of.get(name).copied()
    }

    pub fn group(&self, id: usize) -> &[String] {
        self.groups.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Non-empty groups in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &[String]> {
        self.groups
            .iter()
            .filter(|group| !group.is_empty())
            .map(Vec::as_slice)
    }

    /// Moves the members of one group into the other and returns the id of
    /// the group that now holds all of them.
    pub fn merge(&mut self, a: usize, b: usize) -> usize {
        let (kept, emptied) = if a <= b { (a, b) } else { (b, a) };
        if kept == emptied {
            return kept;
        }

        let moved = std::mem::take(&mut self.groups[emptied]);
        for name in &moved {
            self.group_of.insert(name.clone(), kept);
        }
        self.groups[kept].extend(moved);

        kept
    }

    /// The name a group goes by: a declared output if it holds one, then a
    /// named variable, then whatever came first.
    pub fn representative(&self, id: usize) -> Option<&str> {
        let group = self.group(id);

        group
            .iter()
            .find(|name| variable::is_return_name(name))
            .or_else(|| group.iter().find(|name| !variable::is_anonymous(name)))
            .or_else(|| group.first())
            .map(String::as_str)
    }

    /// Every variable whose name changes, mapped to its group's
    /// representative.
    pub fn renames(&self) -> HashMap<String, String> {
        self.group_of
            .iter()
            .filter_map(|(name, &group)| {
                let representative = self.representative(group)?;
                (representative != name).then(|| (name.clone(), representative.to_string()))
            })
            .collect()
    }
}

/// Groups variables that can share storage:
///
/// 1. every phi with all of its inputs, which must not interfere,
/// 2. copies whose two sides do not interfere,
/// 3. `simple_set` outputs with the array they update.
///
/// Optional merges also require the types to match, constants aside, and
/// never put two declared outputs together.
pub fn allocate(
    body: &FunctionBody,
    types: &HashMap<String, VariableType>,
    graph: &mut InterferenceGraph,
) -> CompileResult<VariableAllocation> {
    let mut allocation = VariableAllocation::singletons(body.declared_variables());

    /* Phi groups */
    for block in body.blocks.iter() {
        for phi in block.phis() {
            for input in phi.input_variables() {
                let a = allocation.add_variable(phi.output());
                let b = allocation.add_variable(input);
                if a == b {
                    continue;
                }

                let (left, right) = (allocation.group(a), allocation.group(b));
                if let Some((x, y)) = first_interference(graph, left, right) {
                    return Err(CompileError::internal(
                        "variable_allocation",
                        format!("phi {} needs {x} and {y} together but they interfere", phi.output()),
                    ));
                }
                if count_outputs(left) + count_outputs(right) > 1 {
                    return Err(CompileError::internal(
                        "variable_allocation",
                        format!("phi {} joins two declared outputs", phi.output()),
                    ));
                }

                merge(&mut allocation, graph, a, b);
            }
        }
    }

    /* Copies */
    for (_, instruction) in body.locations() {
        if let Instruction::CopyFromVariable { output, input } = instruction {
            try_merge(&mut allocation, graph, types, input, output);
        }
    }

    /* Array updates */
    for (_, instruction) in body.locations() {
        if let Instruction::SimpleSet { output, array, .. } = instruction {
            try_merge(&mut allocation, graph, types, output, array);
        }
    }

    Ok(allocation)
}

fn count_outputs(group: &[String]) -> usize {
    group.iter().filter(|name| variable::is_return_name(name)).count()
}

fn first_interference<'a>(
    graph: &InterferenceGraph,
    left: &'a [String],
    right: &'a [String],
) -> Option<(&'a str, &'a str)> {
    left.iter()
        .cartesian_product(right)
        .find(|(x, y)| graph.has_interference(x, y))
        .map(|(x, y)| (x.as_str(), y.as_str()))
}

fn merge(allocation: &mut VariableAllocation, graph: &mut InterferenceGraph, a: usize, b: usize) {
    let kept = allocation.merge(a, b);
    let group = allocation.group(kept);

    if let Some(first) = group.first() {
        graph.merge_group(group, first);
    }
}

fn try_merge(
    allocation: &mut VariableAllocation,
    graph: &mut InterferenceGraph,
    types: &HashMap<String, VariableType>,
    a: &str,
    b: &str,
) -> bool {
    let (Some(group_a), Some(group_b)) = (allocation.group_of(a), allocation.group_of(b)) else {
        return false;
    };
    if group_a == group_b {
        return false;
    }

    let (left, right) = (allocation.group(group_a), allocation.group(group_b));

    // Groups are merged in the graph, so any two members stand for the rest.
    if graph.has_interference(&left[0], &right[0]) {
        return false;
    }

    if count_outputs(left) + count_outputs(right) > 1 {
        return false;
    }

    let same_type = left
        .iter()
        .chain(right)
        .map(|name| types.get(name).map(VariableType::without_constant))
        .all_equal_value()
        .is_ok_and(|ty| ty.is_some());
    if !same_type {
        return false;
    }

    merge(allocation, graph, group_a, group_b);
    true
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        index::Index,
        middle::{
            ssa::{Block, BlockId, Constant, PhiInstruction},
            ty::NumericKind,
            unssa::{interference::build_interference_graph, liveness::compute_liveness},
        },
    };

    fn int_types(names: &[&str]) -> HashMap<String, VariableType> {
        names
            .iter()
            .map(|name| (name.to_string(), VariableType::int32()))
            .collect()
    }

    fn allocate_body(
        body: &FunctionBody,
        types: &HashMap<String, VariableType>,
    ) -> CompileResult<VariableAllocation> {
        let mut graph = build_interference_graph(body, &compute_liveness(body));
        allocate(body, types, &mut graph)
    }

    #[test]
    fn representatives_prefer_outputs_then_names() {
        let mut allocation = VariableAllocation::singletons(["$t$1", "x$1", "y$ret"]);
        let x = allocation.group_of("x$1").unwrap();
        let t = allocation.group_of("$t$1").unwrap();

        let merged = allocation.merge(x, t);
        assert_eq!(allocation.representative(merged), Some("x$1"));

        let y = allocation.group_of("y$ret").unwrap();
        let merged = allocation.merge(merged, y);
        assert_eq!(allocation.representative(merged), Some("y$ret"));
        assert_eq!(allocation.groups().count(), 1);
    }

    #[test]
    fn copies_are_coalesced() {
        let body = FunctionBody::with_blocks(
            "f",
            [Block::with_instructions([
                Instruction::Argument {
                    output: "x$1".into(),
                    index: 0,
                },
                Instruction::copy("$t$1", "x$1"),
                Instruction::copy("y$ret", "$t$1"),
                Instruction::Return,
            ])],
        );
        let types = int_types(&["x$1", "$t$1", "y$ret"]);

        let allocation = allocate_body(&body, &types).unwrap();
        let renames = allocation.renames();

        assert_eq!(renames.get("x$1").map(String::as_str), Some("y$ret"));
        assert_eq!(renames.get("$t$1").map(String::as_str), Some("y$ret"));
        assert_eq!(renames.get("y$ret"), None);
    }

    #[test]
    fn different_types_are_not_coalesced() {
        let body = FunctionBody::with_blocks(
            "f",
            [Block::with_instructions([
                Instruction::Argument {
                    output: "x$1".into(),
                    index: 0,
                },
                Instruction::copy("y$ret", "x$1"),
                Instruction::Return,
            ])],
        );
        let mut types = int_types(&["x$1"]);
        types.insert("y$ret".into(), VariableType::scalar(NumericKind::Double));

        let allocation = allocate_body(&body, &types).unwrap();

        assert!(allocation.renames().is_empty());
    }

    #[test]
    fn live_copies_are_not_coalesced() {
        let body = FunctionBody::with_blocks(
            "f",
            [Block::with_instructions([
                Instruction::Argument {
                    output: "x$1".into(),
                    index: 0,
                },
                Instruction::copy("y$1", "x$1"),
                Instruction::Assignment {
                    output: "one$1".into(),
                    value: Constant::Int(1),
                },
                Instruction::call("plus", ["x$2"], ["x$1", "one$1"]),
                Instruction::call("plus", ["z$ret"], ["x$2", "y$1"]),
                Instruction::Return,
            ])],
        );
        let types = int_types(&["x$1", "y$1", "one$1", "x$2", "z$ret"]);

        let allocation = allocate_body(&body, &types).unwrap();

        assert_ne!(allocation.group_of("x$1"), allocation.group_of("x$2"));
        assert_eq!(allocation.group_of("x$1"), allocation.group_of("y$1"));
    }

    #[test]
    fn interfering_phi_variables_are_a_bug() {
        let block = BlockId::new;
        let body = FunctionBody::with_blocks(
            "f",
            [
                Block::with_instructions([
                    Instruction::Argument {
                        output: "a$1".into(),
                        index: 0,
                    },
                    Instruction::Goto { destination: block(1) },
                ]),
                Block::with_instructions([
                    Instruction::Phi(PhiInstruction::new("b$1", [(block(0), "a$1")])),
                    Instruction::call("plus", ["c$ret"], ["a$1", "b$1"]),
                    Instruction::Return,
                ]),
            ],
        );
        let types = int_types(&["a$1", "b$1", "c$ret"]);

        let error = allocate_body(&body, &types).unwrap_err();

        assert!(error.is_internal(), "{error}");
    }
}
