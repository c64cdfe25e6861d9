use quern_error::Result;

use crate::arrays::block::Block;

/// A pull-based source of blocks.
///
/// Streams are finite and single-use: `read` yields blocks until it returns
/// an empty block, which marks the end of the stream. A stream is not
/// restartable once drained.
pub trait BlockStream: Send {
    /// Stable identifier for the stream.
    ///
    /// Two streams producing the same data report equal ids; used for plan
    /// caching and equality checks.
    fn id(&self) -> String;

    /// Names and types of the produced blocks, without data.
    fn sample_block(&self) -> Block;

    /// The next block, or an empty block once the stream is exhausted.
    fn read(&mut self) -> Result<Block>;

    /// Hook invoked once after the stream has been fully drained.
    fn read_suffix(&mut self) -> Result<()> {
        Ok(())
    }
}
