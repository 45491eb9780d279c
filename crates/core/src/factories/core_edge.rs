//! The core edge client implementation.
//!
//! Retrieving a block from the edge network is a two step affair. First
//! every configured scheduler is asked, concurrently, which edge node
//! serves the block. The first successful answer wins and every other
//! outstanding lookup is aborted. Then the payload is fetched from the
//! winning edge node with a single HTTP GET.

use bytes::Bytes;
use std::sync::Arc;
use tbs_api::*;

mod json_rpc;
pub use json_rpc::*;

/// CoreEdge configuration types.
pub mod config {
    /// Module name of [CoreEdgeConfig] within the block service config.
    pub const MOD_NAME: &str = "coreEdge";

    /// Configuration parameters for
    /// [CoreEdgeFactory](super::CoreEdgeFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreEdgeConfig {
        /// The JSON-RPC urls of the edge schedulers,
        /// e.g. `https://scheduler.example/rpc/v0`.
        ///
        /// Leave empty to disable the edge tier.
        pub scheduler_urls: Vec<String>,

        /// Tells the schedulers where requests originate from, so they can
        /// pick a nearby edge node. Default: empty.
        pub requester_hint: String,

        /// Value of the `App-Name` header sent to edge nodes.
        /// Default: `edge`.
        pub app_name: String,

        /// How long to wait for any scheduler to answer.
        /// Default: 5 seconds.
        pub discovery_timeout_ms: u32,

        /// Timeout applied to every HTTP request, scheduler or edge.
        /// Default: 5 seconds.
        pub request_timeout_ms: u32,
    }

    impl Default for CoreEdgeConfig {
        fn default() -> Self {
            Self {
                scheduler_urls: Vec::new(),
                requester_hint: String::new(),
                app_name: "edge".into(),
                discovery_timeout_ms: 1000 * 5,
                request_timeout_ms: 1000 * 5,
            }
        }
    }

    impl tbs_api::config::ModConfig for CoreEdgeConfig {}

    impl CoreEdgeConfig {
        /// Get the discovery timeout duration.
        pub fn discovery_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.discovery_timeout_ms as u64)
        }

        /// Get the request timeout duration.
        pub fn request_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.request_timeout_ms as u64)
        }
    }
}

pub use config::*;

/// The core edge implementation, talking JSON-RPC to the schedulers and
/// plain HTTP to the edge nodes.
#[derive(Debug)]
pub struct CoreEdgeFactory {}

impl CoreEdgeFactory {
    /// Construct a new CoreEdgeFactory.
    pub fn create() -> DynEdgeFactory {
        let out: DynEdgeFactory = Arc::new(CoreEdgeFactory {});
        out
    }
}

impl EdgeFactory for CoreEdgeFactory {
    fn default_config(&self, config: &mut Config) -> TbsResult<()> {
        config.add_default_module_config::<CoreEdgeConfig>(MOD_NAME.into())
    }

    fn validate_config(&self, config: &Config) -> TbsResult<()> {
        let config: CoreEdgeConfig = config.get_module_config(MOD_NAME)?;

        for scheduler_url in config.scheduler_urls.iter() {
            validate_http_url(scheduler_url)?;
        }

        Ok(())
    }

    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, TbsResult<Option<DynEdgeFetcher>>> {
        Box::pin(async move {
            let config: CoreEdgeConfig =
                builder.config.get_module_config(MOD_NAME)?;

            if config.scheduler_urls.is_empty() {
                tracing::debug!("no edge scheduler configured, edge disabled");
                return Ok(None);
            }

            let schedulers = config
                .scheduler_urls
                .iter()
                .map(|url| JsonRpcScheduler::create(url, &config))
                .collect::<TbsResult<Vec<_>>>()?;

            let out: DynEdgeFetcher =
                Arc::new(EdgeClient::new(&config, schedulers)?);
            Ok(Some(out))
        })
    }
}

fn validate_http_url(url: &str) -> TbsResult<()> {
    const ERR: &str = "invalid edge scheduler url";

    let url =
        url::Url::parse(url).map_err(|e| TbsError::other_src(ERR, e))?;

    if url.cannot_be_a_base() {
        return Err(TbsError::other(ERR));
    }

    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(TbsError::other(ERR)),
    }
}

/// Resolves edge endpoints through a scheduler race and downloads block
/// payloads from them.
#[derive(Debug)]
pub struct EdgeClient {
    schedulers: Vec<DynScheduler>,
    http: reqwest::Client,
    app_name: String,
    requester_hint: String,
    discovery_timeout: std::time::Duration,
}

impl EdgeClient {
    /// Construct an edge client racing the given schedulers.
    pub fn new(
        config: &CoreEdgeConfig,
        schedulers: Vec<DynScheduler>,
    ) -> TbsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TbsError::other_src("build edge http client", e))?;

        Ok(Self {
            schedulers,
            http,
            app_name: config.app_name.clone(),
            requester_hint: config.requester_hint.clone(),
            discovery_timeout: config.discovery_timeout(),
        })
    }

    /// Ask every scheduler for an endpoint serving `cid`.
    ///
    /// The first successful answer wins and the remaining lookups are
    /// aborted. If every scheduler fails the last failure is returned, if
    /// none answers in time [TbsError::DiscoveryTimeout] is returned.
    pub async fn discover(&self, cid: Cid) -> TbsResult<DownloadInfo> {
        // dropping the set aborts the lookups still in flight
        let mut race = tokio::task::JoinSet::new();

        for scheduler in self.schedulers.iter().cloned() {
            let requester_hint = self.requester_hint.clone();
            race.spawn(async move {
                scheduler.download_info(cid, requester_hint).await
            });
        }

        let first_ok = async {
            let mut last_err = TbsError::other("no edge scheduler configured");

            while let Some(res) = race.join_next().await {
                match res {
                    Ok(Ok(info)) => return Ok(info),
                    Ok(Err(err)) => {
                        tracing::debug!(?err, %cid, "edge scheduler failed");
                        last_err = err;
                    }
                    Err(err) => {
                        last_err =
                            TbsError::other_src("edge scheduler task", err);
                    }
                }
            }

            Err(last_err)
        };

        match tokio::time::timeout(self.discovery_timeout, first_ok).await {
            Ok(res) => res,
            Err(_) => Err(TbsError::DiscoveryTimeout(self.discovery_timeout)),
        }
    }

    /// Download the payload of `cid` from the edge node described by
    /// `info`.
    pub async fn get_by_http(
        &self,
        cid: Cid,
        info: DownloadInfo,
    ) -> TbsResult<Bytes> {
        let res = self
            .http
            .get(&info.url)
            .query(&[("cid", cid.to_string())])
            .header("Token", info.token)
            .header("App-Name", self.app_name.as_str())
            .send()
            .await
            .map_err(|e| TbsError::other_src("edge request", e))?;

        let status = res.status();
        if status != reqwest::StatusCode::OK {
            return Err(TbsError::other(status));
        }

        res.bytes()
            .await
            .map_err(|e| TbsError::other_src("edge response body", e))
    }
}

impl EdgeFetcher for EdgeClient {
    fn fetch(&self, cid: Cid) -> BoxFut<'_, TbsResult<Bytes>> {
        Box::pin(async move {
            let info = self.discover(cid).await?;

            if info.is_empty() {
                return Err(TbsError::not_found(cid));
            }

            self.get_by_http(cid, info).await
        })
    }
}
