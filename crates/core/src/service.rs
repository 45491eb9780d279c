//! The block service facade.

use crate::fetcher::{
    DynFetcherFactory, ExchangeFetcherFactory, ExchangeSession,
};
use crate::tier::Tiers;
use std::sync::Arc;
use tbs_api::*;
use tracing::Instrument;

/// A tiered block service.
///
/// Reads consult, depending on the [LoadPolicy] of the request, the local
/// store, the edge network and the exchange network, in that order.
/// Blocks retrieved from the exchange are written to the local store and
/// announced. Blocks retrieved from the edge are not, see
/// [Tier::writes_back].
///
/// Writes go to the local store and are announced to the exchange.
///
/// Without an exchange the service runs in offline mode: only the local
/// store and the edge network are consulted.
#[derive(Debug)]
pub struct BlockService {
    tiers: Tiers,
    exchange: Option<DynExchange>,
    check_first: bool,
}

impl BlockService {
    /// Construct a block service that skips writing blocks the local
    /// store already holds.
    pub fn new(store: DynBlockStore, exchange: Option<DynExchange>) -> Self {
        Self {
            tiers: Tiers {
                validator: HashSecurity::create(),
                store,
                edge: None,
            },
            exchange,
            check_first: true,
        }
    }

    /// Construct a block service that writes and announces every block
    /// it is given, present or not.
    pub fn new_write_through(
        store: DynBlockStore,
        exchange: Option<DynExchange>,
    ) -> Self {
        Self {
            check_first: false,
            ..Self::new(store, exchange)
        }
    }

    /// Use the given edge fetcher for the edge tier.
    pub fn with_edge(mut self, edge: Option<DynEdgeFetcher>) -> Self {
        self.tiers.edge = edge;
        self
    }

    /// Use the given validator instead of [HashSecurity].
    pub fn with_validator(mut self, validator: DynCidValidator) -> Self {
        self.tiers.validator = validator;
        self
    }

    /// Construct a block service from a builder, reading the
    /// `blockService` module config and building the edge fetcher.
    pub async fn from_builder(
        builder: Arc<Builder>,
        store: DynBlockStore,
        exchange: Option<DynExchange>,
    ) -> TbsResult<Self> {
        let config: BlockServiceConfig =
            builder.config.get_module_config(BLOCK_SERVICE_MOD_NAME)?;
        let edge = builder.edge.create(builder.clone()).await?;

        let out = if config.check_first {
            Self::new(store, exchange)
        } else {
            Self::new_write_through(store, exchange)
        };

        Ok(out
            .with_edge(edge)
            .with_validator(builder.validator.clone()))
    }

    /// The local store.
    pub fn block_store(&self) -> &DynBlockStore {
        &self.tiers.store
    }

    /// The exchange, if not in offline mode.
    pub fn exchange(&self) -> Option<&DynExchange> {
        self.exchange.as_ref()
    }

    /// Start a [Session] sharing this service's tiers.
    ///
    /// The exchange session backing it ends when `ctx` is cancelled.
    pub fn new_session(&self, ctx: &RequestContext) -> Session {
        let cancel = ctx.child().cancel;
        Session {
            tiers: self.tiers.clone(),
            fetchers: self.exchange.clone().map(|exchange| {
                let out: DynFetcherFactory =
                    ExchangeSession::create(exchange, cancel);
                out
            }),
        }
    }

    /// Store a block and announce it to the exchange.
    ///
    /// Announce failures are logged, not returned.
    #[tracing::instrument(
        name = "BlockService::add_block",
        level = "debug",
        skip_all,
        fields(cid = %block.cid())
    )]
    pub async fn add_block(&self, block: Block) -> TbsResult<()> {
        let cid = *block.cid();
        self.tiers.validator.validate(&cid)?;

        if self.check_first && self.tiers.store.has(cid).await? {
            return Ok(());
        }

        self.tiers.store.put(block.clone()).await?;
        tracing::debug!(%cid, "block added");

        if let Some(exchange) = &self.exchange {
            if let Err(err) = exchange.notify_new_blocks(vec![block]).await {
                tracing::error!(?err, %cid, "failed to announce new block");
            }
        }

        Ok(())
    }

    /// Store a batch of blocks and announce them to the exchange.
    ///
    /// Nothing is written unless every identifier is valid. Announce
    /// failures are logged, not returned.
    #[tracing::instrument(
        name = "BlockService::add_blocks",
        level = "debug",
        skip_all,
        fields(count = blocks.len())
    )]
    pub async fn add_blocks(&self, blocks: Vec<Block>) -> TbsResult<()> {
        for block in blocks.iter() {
            self.tiers.validator.validate(block.cid())?;
        }

        let to_put = if self.check_first {
            let mut to_put = Vec::with_capacity(blocks.len());
            for block in blocks {
                if !self.tiers.store.has(*block.cid()).await? {
                    to_put.push(block);
                }
            }
            to_put
        } else {
            blocks
        };

        if to_put.is_empty() {
            return Ok(());
        }

        self.tiers.store.put_many(to_put.clone()).await?;
        tracing::debug!(count = to_put.len(), "blocks added");

        if let Some(exchange) = &self.exchange {
            if let Err(err) = exchange.notify_new_blocks(to_put).await {
                tracing::error!(?err, "failed to announce new blocks");
            }
        }

        Ok(())
    }

    /// Delete a block from the local store.
    #[tracing::instrument(
        name = "BlockService::delete_block",
        level = "debug",
        skip_all,
        fields(cid = %cid)
    )]
    pub async fn delete_block(&self, cid: Cid) -> TbsResult<()> {
        self.tiers.store.delete_block(cid).await?;
        tracing::debug!(%cid, "block deleted");
        Ok(())
    }

    /// Close the exchange. The local store is left to its owner.
    pub async fn close(&self) -> TbsResult<()> {
        tracing::debug!("block service is shutting down");
        match &self.exchange {
            Some(exchange) => exchange.close().await,
            None => Ok(()),
        }
    }

    fn fetchers(&self) -> Option<DynFetcherFactory> {
        self.exchange.clone().map(ExchangeFetcherFactory::create)
    }
}

impl BlockGetter for BlockService {
    fn get_block(
        &self,
        ctx: RequestContext,
        cid: Cid,
    ) -> BoxFut<'_, TbsResult<Block>> {
        let span = tracing::debug_span!("BlockService::get_block", %cid);
        Box::pin(
            async move {
                let fetchers = self.fetchers();
                crate::tier::resolve(&ctx, cid, &self.tiers, fetchers.as_ref())
                    .await
            }
            .instrument(span),
        )
    }

    fn get_blocks(
        &self,
        ctx: RequestContext,
        cids: Vec<Cid>,
    ) -> BlockReceiver {
        let span = tracing::debug_span!(
            "BlockService::get_blocks",
            count = cids.len()
        );
        let _enter = span.enter();
        crate::pipeline::resolve_many(
            ctx,
            cids,
            self.tiers.clone(),
            self.fetchers(),
        )
    }
}

/// A group of related lookups sharing a single exchange session.
///
/// The exchange session is only created once a lookup actually reaches
/// the exchange tier. Exchanges without session support are used
/// directly.
#[derive(Debug)]
pub struct Session {
    tiers: Tiers,
    fetchers: Option<DynFetcherFactory>,
}

impl BlockGetter for Session {
    fn get_block(
        &self,
        ctx: RequestContext,
        cid: Cid,
    ) -> BoxFut<'_, TbsResult<Block>> {
        let span = tracing::debug_span!("Session::get_block", %cid);
        Box::pin(
            async move {
                let fetchers = self.fetchers.as_ref();
                crate::tier::resolve(&ctx, cid, &self.tiers, fetchers).await
            }
            .instrument(span),
        )
    }

    fn get_blocks(
        &self,
        ctx: RequestContext,
        cids: Vec<Cid>,
    ) -> BlockReceiver {
        let span =
            tracing::debug_span!("Session::get_blocks", count = cids.len());
        let _enter = span.enter();
        crate::pipeline::resolve_many(
            ctx,
            cids,
            self.tiers.clone(),
            self.fetchers.clone(),
        )
    }
}
