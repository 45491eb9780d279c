//! Batch block resolution.
//!
//! A batch is resolved in up to three passes, one per tier. Each pass
//! works on the misses of the previous one:
//!
//! - local: probe the store sequentially, in input order.
//! - edge: fetch every remaining identifier concurrently, one task each.
//! - exchange: request a single stream for what is still missing, and
//!   commit what arrives in windows of [EXCHANGE_WINDOW] blocks. A
//!   window is stored and announced before any of it is forwarded.
//!
//! Blocks are forwarded as soon as they are found. The output simply
//! closes when the batch is done, failed or was cancelled.

use crate::fetcher::DynFetcherFactory;
use crate::tier::Tiers;
use tbs_api::*;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::Instrument;

/// Maximum number of exchange blocks committed together.
pub const EXCHANGE_WINDOW: usize = 32;

/// Resolve a batch of blocks in a background task, running in the
/// current span.
pub(crate) fn resolve_many(
    ctx: RequestContext,
    cids: Vec<Cid>,
    tiers: Tiers,
    fetchers: Option<DynFetcherFactory>,
) -> BlockReceiver {
    let (send, recv) = tokio::sync::mpsc::channel(EXCHANGE_WINDOW);

    let task = async move {
        let out = Output {
            send,
            cancel: ctx.cancel,
        };

        match run(ctx.policy, cids, &tiers, fetchers, &out).await {
            Ok(()) => (),
            Err(TbsError::Cancelled) => {
                tracing::debug!("batch retrieval cancelled");
            }
            Err(err) => {
                tracing::warn!(?err, "batch retrieval aborted");
            }
        }
    };
    tokio::task::spawn(task.in_current_span());

    recv
}

/// The downstream side of a batch.
struct Output {
    send: BlockSender,
    cancel: CancellationToken,
}

impl Output {
    /// Forward a block downstream.
    async fn emit(&self, block: Block) -> TbsResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TbsError::Cancelled),
            r = self.send.send(block) => r.map_err(|_| TbsError::Cancelled),
        }
    }

    /// Run an upstream operation, unless the batch is cancelled or
    /// nobody is listening anymore.
    async fn guard<F: std::future::Future>(
        &self,
        fut: F,
    ) -> TbsResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TbsError::Cancelled),
            _ = self.send.closed() => Err(TbsError::Cancelled),
            r = fut => Ok(r),
        }
    }
}

async fn run(
    policy: LoadPolicy,
    cids: Vec<Cid>,
    tiers: &Tiers,
    fetchers: Option<DynFetcherFactory>,
    out: &Output,
) -> TbsResult<()> {
    let mut misses = Vec::with_capacity(cids.len());
    for cid in cids {
        match tiers.validator.validate(&cid) {
            Ok(()) => misses.push(cid),
            Err(err) => tracing::warn!(?err, "dropping invalid cid"),
        }
    }

    if policy.includes_local() {
        misses = local_pass(misses, tiers, out).await?;
    }

    if policy.includes_edge() && !misses.is_empty() {
        match &tiers.edge {
            Some(edge) => misses = edge_pass(misses, tiers, edge, out).await?,
            None => tracing::debug!("no edge configured, skipping edge pass"),
        }
    }

    if policy.includes_exchange() && !misses.is_empty() {
        match fetchers {
            Some(fetchers) => {
                exchange_pass(misses, tiers, &fetchers, out).await?
            }
            None => tracing::debug!("no exchange, skipping exchange pass"),
        }
    }

    Ok(())
}

async fn local_pass(
    cids: Vec<Cid>,
    tiers: &Tiers,
    out: &Output,
) -> TbsResult<Vec<Cid>> {
    let mut misses = Vec::new();

    for cid in cids {
        match out.guard(tiers.store.get(cid)).await? {
            Ok(block) => out.emit(block).await?,
            Err(err) => {
                if !err.is_not_found() {
                    tracing::debug!(?err, %cid, "local store error");
                }
                misses.push(cid);
            }
        }
    }

    Ok(misses)
}

async fn edge_pass(
    cids: Vec<Cid>,
    tiers: &Tiers,
    edge: &DynEdgeFetcher,
    out: &Output,
) -> TbsResult<Vec<Cid>> {
    let mut misses = Vec::new();

    // dropping the set aborts the fetches still in flight
    let mut fetches = tokio::task::JoinSet::new();
    for cid in cids {
        let edge = edge.clone();
        fetches.spawn(
            async move { (cid, edge.fetch(cid).await) }.in_current_span(),
        );
    }

    while let Some(res) = out.guard(fetches.join_next()).await? {
        let (cid, res) = match res {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(?err, "edge fetch task failed");
                continue;
            }
        };

        match res {
            Ok(data) => {
                let block = Block::new_with_cid(data, cid);
                if Tier::Edge.writes_back() {
                    out.guard(tiers.store.put(block.clone())).await??;
                }
                out.emit(block).await?;
            }
            Err(err) => {
                tracing::debug!(?err, %cid, "edge miss");
                misses.push(cid);
            }
        }
    }

    Ok(misses)
}

async fn exchange_pass(
    cids: Vec<Cid>,
    tiers: &Tiers,
    fetchers: &DynFetcherFactory,
    out: &Output,
) -> TbsResult<()> {
    let fetcher = fetchers.materialize();
    let mut stream = out.guard(fetcher.get_blocks(cids)).await??;

    // block for the first item of each window only
    while let Some(first) = out.guard(stream.recv()).await? {
        let mut window = Vec::with_capacity(EXCHANGE_WINDOW);
        window.push(first);

        while window.len() < EXCHANGE_WINDOW {
            match stream.try_recv() {
                Ok(block) => window.push(block),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        if Tier::Exchange.writes_back() {
            out.guard(tiers.store.put_many(window.clone())).await??;
            out.guard(fetcher.notify_new_blocks(window.clone())).await??;
        }

        for block in window {
            out.emit(block).await?;
        }
    }

    Ok(())
}
