//! Peer-exchange types.
//!
//! The exchange is the peer-to-peer tier (bitswap-like). The block
//! service only consumes it through the [Fetcher] and [Exchange] traits.

use crate::*;
use std::sync::Arc;

/// The receiving half of a lazy, unordered, best-effort block stream.
///
/// The stream may end before every requested block was delivered. It is up
/// to the consumer to keep track of what it received.
pub type BlockReceiver = tokio::sync::mpsc::Receiver<Block>;

/// The sending half of a [BlockReceiver].
pub type BlockSender = tokio::sync::mpsc::Sender<Block>;

/// Fetches blocks from the exchange network.
pub trait Fetcher: 'static + Send + Sync + std::fmt::Debug {
    /// Fetch a single block.
    fn get_block(&self, cid: Cid) -> BoxFut<'_, TbsResult<Block>>;

    /// Start fetching a batch of blocks, which are delivered as they
    /// arrive, in no particular order.
    fn get_blocks(
        &self,
        cids: Vec<Cid>,
    ) -> BoxFut<'_, TbsResult<BlockReceiver>>;
}

/// Trait-object [Fetcher].
pub type DynFetcher = Arc<dyn Fetcher>;

/// The full exchange capability.
pub trait Exchange: Fetcher {
    /// Announce to the network that blocks are now available locally.
    fn notify_new_blocks(
        &self,
        blocks: Vec<Block>,
    ) -> BoxFut<'_, TbsResult<()>>;

    /// Release the exchange resources.
    fn close(&self) -> BoxFut<'_, TbsResult<()>>;

    /// Create a request-scoped session used to amortize wantlist
    /// negotiation across related lookups.
    ///
    /// The session lives until the given token is cancelled. Exchanges
    /// without session support return `None`, in which case lookups go
    /// through the exchange itself.
    fn new_session(&self, _cancel: CancellationToken) -> Option<DynFetcher> {
        None
    }
}

/// Trait-object [Exchange].
pub type DynExchange = Arc<dyn Exchange>;

/// The lookup surface shared by the block service and its sessions.
pub trait BlockGetter: 'static + Send + Sync {
    /// Get a single block, consulting the tiers selected by `ctx.policy`.
    fn get_block(
        &self,
        ctx: RequestContext,
        cid: Cid,
    ) -> BoxFut<'_, TbsResult<Block>>;

    /// Get a batch of blocks. Blocks are delivered as they are found, in no
    /// particular order.
    ///
    /// Not every block may be found, and cancelling `ctx.cancel` ends the
    /// stream early. Either way the receiver simply closes.
    fn get_blocks(
        &self,
        ctx: RequestContext,
        cids: Vec<Cid>,
    ) -> BlockReceiver;
}
