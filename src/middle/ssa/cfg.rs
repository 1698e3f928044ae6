//! Control flow queries over a [`FunctionBody`].

use hashbrown::HashSet;

use crate::{
    index::IndexVec,
    middle::ssa::{BlockId, FunctionBody},
};

/// Control flow predecessors of every block, sorted and without duplicates.
pub fn predecessors(body: &FunctionBody) -> IndexVec<BlockId, Vec<BlockId>> {
    let mut predecessors: IndexVec<BlockId, Vec<BlockId>> =
        body.blocks.iter().map(|_| Vec::new()).collect();

    for (block_id, block) in body.blocks.enumerate() {
        for successor in block.successors() {
            if let Some(list) = predecessors.get_mut(successor) {
                if !list.contains(&block_id) {
                    list.push(block_id);
                }
            }
        }
    }

    for list in predecessors.iter_mut() {
        list.sort();
    }

    predecessors
}

/// Depth first reverse post-order starting at `entry`. Successors are visited
/// in the order `successors` returns them, so the last successor of a block
/// ends up placed right after it.
pub fn reverse_post_order_from(
    entry: BlockId,
    mut successors: impl FnMut(BlockId) -> Vec<BlockId>,
) -> Vec<BlockId> {
    let mut visited: HashSet<BlockId> = [entry].into_iter().collect();
    let mut post_order = Vec::new();
    let mut stack = vec![(entry, successors(entry), 0usize)];

    while let Some((block, block_successors, next)) = stack.last_mut() {
        if let Some(&successor) = block_successors.get(*next) {
            *next += 1;

            if visited.insert(successor) {
                let successor_successors = successors(successor);
                stack.push((successor, successor_successors, 0));
            }
        } else {
            post_order.push(*block);
            stack.pop();
        }
    }

    post_order.reverse();
    post_order
}

/// Reverse post-order of the blocks reachable from the entry block, laid out
/// so that the positive side of a branch directly follows it.
pub fn reverse_post_order(body: &FunctionBody) -> Vec<BlockId> {
    if body.blocks.is_empty() {
        return Vec::new();
    }

    reverse_post_order_from(BlockId::ENTRY, |block| {
        let mut successors = body
            .block(block)
            .map(|b| b.successors())
            .unwrap_or_default();
        successors.retain(|s| body.blocks.contains(*s));
        successors.reverse();
        successors
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::Index,
        middle::ssa::{Block, Instruction},
    };

    fn block(id: usize) -> BlockId {
        BlockId::new(id)
    }

    fn goto(destination: usize) -> Instruction {
        Instruction::Goto {
            destination: block(destination),
        }
    }

    fn branch(positive: usize, negative: usize) -> Instruction {
        Instruction::Branch {
            condition: "c$1".into(),
            positive: block(positive),
            negative: block(negative),
        }
    }

    #[test]
    fn loop_predecessors_and_order() {
        // #0 -> #1 (header) -> #2 (body) -> #1, #1 -> #3 (exit)
        let body = FunctionBody::with_blocks(
            "loop",
            [
                Block::with_instructions([goto(1)]),
                Block::with_instructions([branch(2, 3)]),
                Block::with_instructions([goto(1)]),
                Block::with_instructions([Instruction::Return]),
            ],
        );

        let predecessors = predecessors(&body);
        assert_eq!(predecessors[block(1)], [block(0), block(2)]);
        assert_eq!(predecessors[block(3)], [block(1)]);
        assert!(predecessors[block(0)].is_empty());

        assert_eq!(
            reverse_post_order(&body),
            [block(0), block(1), block(2), block(3)]
        );
    }

    #[test]
    fn unreachable_blocks_are_not_ordered() {
        let body = FunctionBody::with_blocks(
            "dead",
            [
                Block::with_instructions([goto(2)]),
                Block::with_instructions([Instruction::Return]),
                Block::with_instructions([Instruction::Return]),
            ],
        );

        assert_eq!(reverse_post_order(&body), [block(0), block(2)]);
    }
}
