//! A test implementation of the [`EdgeFetcher`] module serving payloads
//! from memory.

use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tbs_api::*;

#[derive(Debug, Default)]
struct Inner {
    blocks: HashMap<Cid, Bytes>,
    calls: usize,
    fail: Option<TbsError>,
}

/// An in-memory [`EdgeFetcher`], standing in for the scheduler race and
/// the edge HTTP download.
#[derive(Debug, Default)]
pub struct MemEdge(Mutex<Inner>);

impl MemEdge {
    /// Construct a new, empty [MemEdge].
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make blocks retrievable through the edge.
    pub fn insert(&self, blocks: impl IntoIterator<Item = Block>) {
        self.lock().blocks.extend(blocks.into_iter().map(Block::into_parts));
    }

    /// Number of `fetch` calls so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Fail every subsequent fetch with the given error, e.g. a
    /// [TbsError::DiscoveryTimeout]. `None` restores normal operation.
    pub fn set_fail(&self, fail: Option<TbsError>) {
        self.lock().fail = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("MemEdge inner Mutex is poisoned")
    }
}

impl EdgeFetcher for MemEdge {
    fn fetch(&self, cid: Cid) -> BoxFut<'_, TbsResult<Bytes>> {
        let mut inner = self.lock();
        inner.calls += 1;
        let res = match &inner.fail {
            Some(err) => Err(err.clone()),
            None => inner
                .blocks
                .get(&cid)
                .cloned()
                .ok_or(TbsError::not_found(cid)),
        };

        Box::pin(async move { res })
    }
}
