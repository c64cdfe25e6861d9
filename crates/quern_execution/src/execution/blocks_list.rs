use std::collections::VecDeque;

use quern_error::Result;

use crate::arrays::block::Block;
use crate::execution::stream::BlockStream;

/// A stream over an in-memory list of blocks.
#[derive(Debug)]
pub struct BlocksListStream {
    id: String,
    sample: Block,
    blocks: VecDeque<Block>,
}

impl BlocksListStream {
    pub fn new(id: impl Into<String>, blocks: Vec<Block>) -> Self {
        let sample = blocks
            .first()
            .map(|block| block.without_data())
            .unwrap_or_else(Block::empty);
        BlocksListStream {
            id: id.into(),
            sample,
            blocks: blocks.into(),
        }
    }
}

impl BlockStream for BlocksListStream {
    fn id(&self) -> String {
        format!("BlocksList({})", self.id)
    }

    fn sample_block(&self) -> Block {
        self.sample.clone()
    }

    fn read(&mut self) -> Result<Block> {
        Ok(self.blocks.pop_front().unwrap_or_else(Block::empty))
    }
}
