//! Edge network types.
//!
//! The edge network is an HTTP content delivery tier. Which edge node
//! serves a given block is decided by scheduler services: a client asks
//! the schedulers for [DownloadInfo] and then performs a plain HTTP GET
//! against the returned endpoint.

use crate::*;
use std::sync::Arc;

/// A resolved edge endpoint for a single block.
///
/// Short-lived, never cached across identifiers.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct DownloadInfo {
    /// The url of the edge node serving the block.
    #[serde(rename = "URL", default)]
    pub url: String,

    /// The bearer token to present to the edge node.
    #[serde(rename = "Token", default)]
    pub token: String,
}

impl DownloadInfo {
    /// An endpoint without url or token cannot serve anything.
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() || self.token.is_empty()
    }
}

/// A scheduler service answering "who serves this block".
pub trait Scheduler: 'static + Send + Sync + std::fmt::Debug {
    /// Ask the scheduler for an edge endpoint serving `cid`.
    ///
    /// `requester_hint` tells the scheduler where the request originates,
    /// so it may pick a nearby edge node.
    fn download_info(
        &self,
        cid: Cid,
        requester_hint: String,
    ) -> BoxFut<'_, TbsResult<DownloadInfo>>;
}

/// Trait-object [Scheduler].
pub type DynScheduler = Arc<dyn Scheduler>;

/// Fetches raw block payloads from the edge network.
pub trait EdgeFetcher: 'static + Send + Sync + std::fmt::Debug {
    /// Fetch the payload of `cid`.
    ///
    /// Returns [TbsError::NotFound] if the schedulers know of no edge node
    /// holding the block.
    fn fetch(&self, cid: Cid) -> BoxFut<'_, TbsResult<bytes::Bytes>>;
}

/// Trait-object [EdgeFetcher].
pub type DynEdgeFetcher = Arc<dyn EdgeFetcher>;

/// A factory for constructing [EdgeFetcher] instances.
pub trait EdgeFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> TbsResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> TbsResult<()>;

    /// Construct an edge fetcher.
    ///
    /// Resolves to `None` when the configuration disables the edge tier,
    /// e.g. because no scheduler is configured.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, TbsResult<Option<DynEdgeFetcher>>>;
}

/// Trait-object [EdgeFactory].
pub type DynEdgeFactory = Arc<dyn EdgeFactory>;
