//! A test implementation of the [`BlockStore`] module that keeps all
//! blocks in memory.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tbs_api::*;

/// Counts of the calls made against a [MemBlockStore].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemBlockStoreStats {
    /// Number of `has` calls.
    pub has: usize,
    /// Number of `get` calls.
    pub get: usize,
    /// Number of `put` calls.
    pub put: usize,
    /// The size of every `put_many` batch, in call order.
    pub put_many: Vec<usize>,
    /// Number of `delete_block` calls.
    pub delete: usize,
}

#[derive(Debug, Default)]
struct Inner {
    blocks: HashMap<Cid, Block>,
    stats: MemBlockStoreStats,
    fail_put_many: bool,
}

/// A simple, in-memory implementation of the [`BlockStore`] trait.
#[derive(Default)]
pub struct MemBlockStore(Mutex<Inner>);

impl std::fmt::Debug for MemBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBlockStore").finish()
    }
}

impl MemBlockStore {
    /// Construct a new, empty [MemBlockStore].
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of blocks held.
    pub fn len(&self) -> usize {
        self.lock().blocks.len()
    }

    /// True if no block is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the calls made so far.
    pub fn stats(&self) -> MemBlockStoreStats {
        self.lock().stats.clone()
    }

    /// Make every subsequent `put_many` fail.
    pub fn set_fail_put_many(&self, fail: bool) {
        self.lock().fail_put_many = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("MemBlockStore inner Mutex is poisoned")
    }
}

impl BlockStore for MemBlockStore {
    fn has(&self, cid: Cid) -> BoxFut<'_, TbsResult<bool>> {
        let mut inner = self.lock();
        inner.stats.has += 1;
        let has = inner.blocks.contains_key(&cid);

        Box::pin(async move { Ok(has) })
    }

    fn get(&self, cid: Cid) -> BoxFut<'_, TbsResult<Block>> {
        let mut inner = self.lock();
        inner.stats.get += 1;
        let res = inner
            .blocks
            .get(&cid)
            .cloned()
            .ok_or(TbsError::not_found(cid));

        Box::pin(async move { res })
    }

    fn put(&self, block: Block) -> BoxFut<'_, TbsResult<()>> {
        let mut inner = self.lock();
        inner.stats.put += 1;
        inner.blocks.insert(*block.cid(), block);

        Box::pin(async { Ok(()) })
    }

    fn put_many(&self, blocks: Vec<Block>) -> BoxFut<'_, TbsResult<()>> {
        let mut inner = self.lock();
        inner.stats.put_many.push(blocks.len());
        let res = if inner.fail_put_many {
            Err(TbsError::other("put_many failure injected"))
        } else {
            inner
                .blocks
                .extend(blocks.into_iter().map(|b| (*b.cid(), b)));
            Ok(())
        };

        Box::pin(async move { res })
    }

    fn delete_block(&self, cid: Cid) -> BoxFut<'_, TbsResult<()>> {
        let mut inner = self.lock();
        inner.stats.delete += 1;
        let res = match inner.blocks.remove(&cid) {
            Some(_) => Ok(()),
            None => Err(TbsError::not_found(cid)),
        };

        Box::pin(async move { res })
    }
}
