//! Single block resolution across the local, edge and exchange tiers.

use crate::common::or_cancel;
use crate::fetcher::DynFetcherFactory;
use tbs_api::*;

/// The tiers a lookup may consult, besides the exchange.
#[derive(Debug, Clone)]
pub(crate) struct Tiers {
    pub validator: DynCidValidator,
    pub store: DynBlockStore,
    pub edge: Option<DynEdgeFetcher>,
}

/// Resolve a single block, walking the tiers selected by `ctx.policy` in
/// order until one of them has it.
///
/// - A local miss falls through, any other local error is returned.
/// - Any edge failure is a miss and falls through.
/// - An exchange hit is stored locally and announced before returning.
///
/// A tier that is not configured is skipped. If every selected tier
/// missed, the error of the last one attempted is returned.
pub(crate) async fn resolve(
    ctx: &RequestContext,
    cid: Cid,
    tiers: &Tiers,
    fetchers: Option<&DynFetcherFactory>,
) -> TbsResult<Block> {
    tiers.validator.validate(&cid)?;

    let resolved = resolve_validated(ctx.policy, cid, tiers, fetchers);
    or_cancel(&ctx.cancel, resolved).await
}

async fn resolve_validated(
    policy: LoadPolicy,
    cid: Cid,
    tiers: &Tiers,
    fetchers: Option<&DynFetcherFactory>,
) -> TbsResult<Block> {
    let mut last_err = None;

    for tier in policy.tiers() {
        let err = match tier {
            Tier::Local => match tiers.store.get(cid).await {
                Ok(block) => return Ok(block),
                Err(err) if err.is_not_found() => err,
                Err(err) => return Err(err),
            },
            Tier::Edge => {
                let Some(edge) = &tiers.edge else {
                    last_err.get_or_insert(TbsError::NoEdge);
                    continue;
                };

                match fetch_edge(cid, tiers, edge).await {
                    Ok(block) => return Ok(block),
                    Err(err) => {
                        tracing::debug!(?err, %cid, "edge miss");
                        err
                    }
                }
            }
            Tier::Exchange => {
                let Some(fetchers) = fetchers else {
                    last_err.get_or_insert(TbsError::NoFetcher);
                    continue;
                };

                return fetch_exchange(cid, tiers, fetchers).await;
            }
        };

        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| TbsError::not_found(cid)))
}

async fn fetch_edge(
    cid: Cid,
    tiers: &Tiers,
    edge: &DynEdgeFetcher,
) -> TbsResult<Block> {
    let data = edge.fetch(cid).await?;
    let block = Block::new_with_cid(data, cid);

    if Tier::Edge.writes_back() {
        tiers.store.put(block.clone()).await?;
    }

    Ok(block)
}

async fn fetch_exchange(
    cid: Cid,
    tiers: &Tiers,
    fetchers: &DynFetcherFactory,
) -> TbsResult<Block> {
    let fetcher = fetchers.materialize();
    let block = fetcher.get_block(cid).await?;

    if Tier::Exchange.writes_back() {
        tiers.store.put(block.clone()).await?;
        fetcher.notify_new_blocks(vec![block.clone()]).await?;
    }

    Ok(block)
}

#[cfg(test)]
mod test;
