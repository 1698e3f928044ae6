use hashbrown::{HashMap, HashSet};

use crate::middle::{
    ssa::{FunctionBody, Instruction},
    unssa::liveness::Liveness,
};

/// Which variables are live at the same time and so cannot share storage.
#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    edges: HashMap<String, HashSet<String>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: &str) {
        self.edges.entry_ref(name).or_default();
    }

    pub fn add_interference(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }

        self.edges.entry_ref(a).or_default().insert(b.to_string());
        self.edges.entry_ref(b).or_default().insert(a.to_string());
    }

    pub fn has_interference(&self, a: &str, b: &str) -> bool {
        self.edges.get(a).is_some_and(|neighbors| neighbors.contains(b))
    }

    pub fn neighbors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Makes the variables of `group` behave as one: each of them, and above
    /// all `representative`, now interferes with everything any of them
    /// interfered with. Merging a group that grew from an earlier merge
    /// keeps every interference gathered so far.
    pub fn merge_group<S: AsRef<str>>(&mut self, group: &[S], representative: &str) {
        let members = group
            .iter()
            .map(|name| name.as_ref().to_string())
            .chain([representative.to_string()])
            .collect::<HashSet<_>>();

        let neighbors = members
            .iter()
            .flat_map(|member| self.neighbors(member))
            .filter(|neighbor| !members.contains(*neighbor))
            .map(str::to_string)
            .collect::<HashSet<_>>();

        for neighbor in &neighbors {
            if let Some(edges) = self.edges.get_mut(neighbor) {
                edges.extend(members.iter().cloned());
            }
        }

        for member in &members {
            self.edges.insert(member.clone(), neighbors.clone());
        }
    }
}

/// Builds the graph from block liveness by walking each block backwards. A
/// copy's output does not interfere with its input: they hold the same value.
/// Phi outputs are all defined at block entry, so they interfere with each
/// other and with whatever is live there.
pub fn build_interference_graph(body: &FunctionBody, liveness: &Liveness) -> InterferenceGraph {
    let mut graph = InterferenceGraph::new();

    for (block_id, block) in body.blocks.enumerate() {
        let mut live = liveness
            .live_out(block_id)
            .map(|set| set.iter().cloned().collect::<HashSet<_>>())
            .unwrap_or_default();

        for variable in &live {
            graph.add_variable(variable);
        }

        for instruction in block.instructions.iter().rev().filter(|i| !i.is_phi()) {
            let copied = match instruction {
                Instruction::CopyFromVariable { input, .. } => Some(input.as_str()),
                _ => None,
            };

            for output in instruction.outputs() {
                graph.add_variable(output);

                for other in &live {
                    if Some(other.as_str()) != copied {
                        graph.add_interference(output, other);
                    }
                }
            }

            for output in instruction.outputs() {
                live.remove(output);
            }
            live.extend(instruction.inputs().into_iter().map(str::to_string));
        }

        let phi_outputs = block.phis().map(|phi| phi.output()).collect::<Vec<_>>();
        for (index, output) in phi_outputs.iter().enumerate() {
            graph.add_variable(output);

            for other in &phi_outputs[index + 1..] {
                graph.add_interference(output, other);
            }

            for other in &live {
                graph.add_interference(output, other);
            }
        }
    }

    graph
}
