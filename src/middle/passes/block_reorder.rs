use itertools::Itertools;

use crate::{
    error::CompileResult,
    middle::{
        passes::{PassContext, SsaPass},
        ssa::{FunctionBody, cfg},
    },
};

/// Lays blocks out in reverse post-order so that most jumps fall through to
/// the next block. Blocks not reachable from the entry keep their relative
/// order at the end.
#[derive(Debug, Default)]
pub struct BlockReordering;

impl SsaPass for BlockReordering {
    fn name(&self) -> &'static str {
        "block_reordering"
    }

    fn apply(&mut self, body: &mut FunctionBody, context: &PassContext<'_>) -> CompileResult<()> {
        let logger = context.logger(self.name());
        logger.log_start();

        body.check_block_references(self.name())?;

        let mut order = cfg::reverse_post_order(body);
        let unreachable = body
            .blocks
            .indices()
            .filter(|id| !order.contains(id))
            .collect::<Vec<_>>();
        order.extend(unreachable);

        if order.iter().copied().eq(body.blocks.indices()) {
            logger.log_skip();
            return Ok(());
        }

        logger.log(format_args!("new order {}", order.iter().join(", ")));

        body.reorder_blocks(&order)
    }
}
