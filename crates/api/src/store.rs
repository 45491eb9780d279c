//! Local block store types.

use crate::*;
use std::sync::Arc;

/// The local persistence tier.
///
/// Storage internals are up to the implementor. The only behavioural
/// requirement is that a missing block is reported as
/// [TbsError::NotFound], which is what lets lookups fall through to the
/// remote tiers.
pub trait BlockStore: 'static + Send + Sync + std::fmt::Debug {
    /// Check whether a block is present.
    fn has(&self, cid: Cid) -> BoxFut<'_, TbsResult<bool>>;

    /// Get a block.
    fn get(&self, cid: Cid) -> BoxFut<'_, TbsResult<Block>>;

    /// Put a single block.
    fn put(&self, block: Block) -> BoxFut<'_, TbsResult<()>>;

    /// Put a batch of blocks, using the batching capabilities of the
    /// underlying storage where possible.
    fn put_many(&self, blocks: Vec<Block>) -> BoxFut<'_, TbsResult<()>>;

    /// Delete a block.
    fn delete_block(&self, cid: Cid) -> BoxFut<'_, TbsResult<()>>;
}

/// Trait-object [BlockStore].
pub type DynBlockStore = Arc<dyn BlockStore>;
