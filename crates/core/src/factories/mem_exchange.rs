//! A test implementation of the [`Exchange`] module that serves blocks
//! from memory and records every call made against it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tbs_api::*;

/// Counts of the calls made against a [MemExchange] and its sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemExchangeStats {
    /// Number of `get_block` calls on the exchange itself.
    pub get_block: usize,
    /// Number of identifiers requested by each `get_blocks` call on the
    /// exchange itself.
    pub get_blocks: Vec<usize>,
    /// Number of `get_block` calls on sessions.
    pub session_get_block: usize,
    /// Number of identifiers requested by each `get_blocks` call on
    /// sessions.
    pub session_get_blocks: Vec<usize>,
    /// The size of every `notify_new_blocks` batch, in call order.
    pub notified: Vec<usize>,
    /// Number of sessions created.
    pub sessions: usize,
    /// Whether `close` was called.
    pub closed: bool,
}

impl MemExchangeStats {
    /// Total number of fetch calls, sessions included.
    pub fn fetch_calls(&self) -> usize {
        self.get_block
            + self.get_blocks.len()
            + self.session_get_block
            + self.session_get_blocks.len()
    }
}

#[derive(Debug, Default)]
struct Inner {
    blocks: HashMap<Cid, Block>,
    stats: MemExchangeStats,
    supports_sessions: bool,
    fail_notify: bool,
    hold_streams_open: bool,
    held: Vec<BlockSender>,
    session_tokens: Vec<CancellationToken>,
}

impl Inner {
    fn get_block(&self, cid: Cid) -> TbsResult<Block> {
        self.blocks
            .get(&cid)
            .cloned()
            .ok_or(TbsError::not_found(cid))
    }

    fn get_blocks(&mut self, cids: Vec<Cid>) -> BlockReceiver {
        let (send, recv) = tokio::sync::mpsc::channel(cids.len().max(1));

        for cid in cids {
            if let Some(block) = self.blocks.get(&cid) {
                // capacity covers every requested block
                let _ = send.try_send(block.clone());
            }
        }

        if self.hold_streams_open {
            self.held.push(send);
        }

        recv
    }
}

/// An in-memory [`Exchange`], acting as a stand-in for a peer network
/// that already holds a known set of blocks.
///
/// Streams returned by `get_blocks` are filled before they are returned,
/// so all found blocks are immediately available to the consumer.
#[derive(Default)]
pub struct MemExchange(Arc<Mutex<Inner>>);

impl std::fmt::Debug for MemExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemExchange").finish()
    }
}

impl MemExchange {
    /// Construct a new, empty [MemExchange] without session support.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Construct a new, empty [MemExchange] with session support.
    pub fn create_with_sessions() -> Arc<Self> {
        let out = Self::create();
        out.lock().supports_sessions = true;
        out
    }

    /// Make blocks retrievable through the exchange.
    pub fn insert(&self, blocks: impl IntoIterator<Item = Block>) {
        self.lock()
            .blocks
            .extend(blocks.into_iter().map(|b| (*b.cid(), b)));
    }

    /// Snapshot of the calls made so far.
    pub fn stats(&self) -> MemExchangeStats {
        self.lock().stats.clone()
    }

    /// Make every subsequent `notify_new_blocks` fail.
    pub fn set_fail_notify(&self, fail: bool) {
        self.lock().fail_notify = fail;
    }

    /// Keep the streams returned by `get_blocks` open after the found
    /// blocks were delivered, until [MemExchange::release_streams].
    pub fn set_hold_streams_open(&self, hold: bool) {
        self.lock().hold_streams_open = hold;
    }

    /// Close every stream held open.
    pub fn release_streams(&self) {
        self.lock().held.clear();
    }

    /// For every session created so far, whether its token was cancelled.
    pub fn sessions_cancelled(&self) -> Vec<bool> {
        self.lock()
            .session_tokens
            .iter()
            .map(|t| t.is_cancelled())
            .collect()
    }

    /// Number of streams held open whose consumer is still listening.
    pub fn open_streams(&self) -> usize {
        self.lock().held.iter().filter(|s| !s.is_closed()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("MemExchange inner Mutex is poisoned")
    }
}

impl Fetcher for MemExchange {
    fn get_block(&self, cid: Cid) -> BoxFut<'_, TbsResult<Block>> {
        let mut inner = self.lock();
        inner.stats.get_block += 1;
        let res = inner.get_block(cid);

        Box::pin(async move { res })
    }

    fn get_blocks(
        &self,
        cids: Vec<Cid>,
    ) -> BoxFut<'_, TbsResult<BlockReceiver>> {
        let mut inner = self.lock();
        inner.stats.get_blocks.push(cids.len());
        let recv = inner.get_blocks(cids);

        Box::pin(async move { Ok(recv) })
    }
}

impl Exchange for MemExchange {
    fn notify_new_blocks(
        &self,
        blocks: Vec<Block>,
    ) -> BoxFut<'_, TbsResult<()>> {
        let mut inner = self.lock();
        inner.stats.notified.push(blocks.len());
        let res = if inner.fail_notify {
            Err(TbsError::other("notify failure injected"))
        } else {
            Ok(())
        };

        Box::pin(async move { res })
    }

    fn close(&self) -> BoxFut<'_, TbsResult<()>> {
        let mut inner = self.lock();
        inner.stats.closed = true;
        inner.held.clear();

        Box::pin(async { Ok(()) })
    }

    fn new_session(&self, cancel: CancellationToken) -> Option<DynFetcher> {
        let mut inner = self.lock();
        if !inner.supports_sessions {
            return None;
        }
        inner.stats.sessions += 1;
        inner.session_tokens.push(cancel.clone());

        let out: DynFetcher = Arc::new(MemExchangeSession {
            inner: self.0.clone(),
            cancel,
        });
        Some(out)
    }
}

/// A session of a [MemExchange]. Serves the same blocks, but is counted
/// separately. Once its token is cancelled every fetch fails with
/// [TbsError::Cancelled].
pub struct MemExchangeSession {
    inner: Arc<Mutex<Inner>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for MemExchangeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemExchangeSession").finish()
    }
}

impl MemExchangeSession {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("MemExchange inner Mutex is poisoned")
    }
}

impl Fetcher for MemExchangeSession {
    fn get_block(&self, cid: Cid) -> BoxFut<'_, TbsResult<Block>> {
        let mut inner = self.lock();
        inner.stats.session_get_block += 1;
        let res = if self.cancel.is_cancelled() {
            Err(TbsError::Cancelled)
        } else {
            inner.get_block(cid)
        };

        Box::pin(async move { res })
    }

    fn get_blocks(
        &self,
        cids: Vec<Cid>,
    ) -> BoxFut<'_, TbsResult<BlockReceiver>> {
        let mut inner = self.lock();
        inner.stats.session_get_blocks.push(cids.len());
        let res = if self.cancel.is_cancelled() {
            Err(TbsError::Cancelled)
        } else {
            Ok(inner.get_blocks(cids))
        };

        Box::pin(async move { res })
    }
}
