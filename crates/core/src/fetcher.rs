//! Deferred access to the exchange tier.
//!
//! Lookups only touch the exchange after the cheaper tiers missed, so the
//! exchange capability is handed to them as a [FetcherFactory] that is
//! materialized on demand. For a [crate::Session] this is where the
//! underlying exchange session gets created, at most once.

use std::sync::{Arc, OnceLock};
use tbs_api::*;

/// An exchange fetcher (possibly session scoped) paired with the exchange
/// that announces newly stored blocks.
#[derive(Debug, Clone)]
pub struct NotifyingFetcher {
    exchange: DynExchange,
    session: Option<DynFetcher>,
}

impl NotifyingFetcher {
    /// Fetch through `session` if there is one, otherwise through the
    /// exchange itself.
    pub fn new(exchange: DynExchange, session: Option<DynFetcher>) -> Self {
        Self { exchange, session }
    }

    /// Fetch a single block.
    pub async fn get_block(&self, cid: Cid) -> TbsResult<Block> {
        match &self.session {
            Some(session) => session.get_block(cid).await,
            None => self.exchange.get_block(cid).await,
        }
    }

    /// Start fetching a batch of blocks.
    pub async fn get_blocks(
        &self,
        cids: Vec<Cid>,
    ) -> TbsResult<BlockReceiver> {
        match &self.session {
            Some(session) => session.get_blocks(cids).await,
            None => self.exchange.get_blocks(cids).await,
        }
    }

    /// Announce newly stored blocks to the exchange network.
    pub async fn notify_new_blocks(
        &self,
        blocks: Vec<Block>,
    ) -> TbsResult<()> {
        self.exchange.notify_new_blocks(blocks).await
    }
}

/// Produces the fetcher used for the exchange tier of a lookup.
pub trait FetcherFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Get the fetcher. Repeated calls yield equivalent fetchers.
    fn materialize(&self) -> NotifyingFetcher;
}

/// Trait-object [FetcherFactory].
pub type DynFetcherFactory = Arc<dyn FetcherFactory>;

/// Fetches through the exchange itself.
#[derive(Debug)]
pub struct ExchangeFetcherFactory(DynExchange);

impl ExchangeFetcherFactory {
    /// Construct a new ExchangeFetcherFactory.
    pub fn create(exchange: DynExchange) -> DynFetcherFactory {
        let out: DynFetcherFactory = Arc::new(Self(exchange));
        out
    }
}

impl FetcherFactory for ExchangeFetcherFactory {
    fn materialize(&self) -> NotifyingFetcher {
        NotifyingFetcher::new(self.0.clone(), None)
    }
}

/// Fetches through a single exchange session, created on first use.
///
/// The exchange session lives until `cancel` is cancelled. If the
/// exchange has no session support, fetches go through the exchange
/// itself.
#[derive(Debug)]
pub struct ExchangeSession {
    exchange: DynExchange,
    cancel: CancellationToken,
    session: OnceLock<Option<DynFetcher>>,
}

impl ExchangeSession {
    /// Construct a new ExchangeSession. No exchange session is created
    /// until the first [FetcherFactory::materialize] call.
    pub fn create(
        exchange: DynExchange,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            cancel,
            session: OnceLock::new(),
        })
    }
}

impl FetcherFactory for ExchangeSession {
    fn materialize(&self) -> NotifyingFetcher {
        let session = self
            .session
            .get_or_init(|| {
                let session = self.exchange.new_session(self.cancel.clone());
                if session.is_none() {
                    tracing::debug!("exchange without session support");
                }
                session
            })
            .clone();

        NotifyingFetcher::new(self.exchange.clone(), session)
    }
}
