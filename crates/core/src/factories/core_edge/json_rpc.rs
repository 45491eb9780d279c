use super::CoreEdgeConfig;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tbs_api::*;

#[derive(serde::Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: (String, &'a str),
    id: u64,
}

#[derive(serde::Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<DownloadInfo>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(serde::Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// A [Scheduler] reached over HTTP JSON-RPC 2.0.
#[derive(Debug)]
pub struct JsonRpcScheduler {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcScheduler {
    /// The remote method answering download info requests.
    pub const METHOD: &'static str = "titan.GetDownloadInfoWithBlock";

    /// Construct a scheduler client for the given JSON-RPC endpoint.
    pub fn create(
        url: &str,
        config: &CoreEdgeConfig,
    ) -> TbsResult<DynScheduler> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TbsError::other_src("build scheduler client", e))?;

        let out: DynScheduler = Arc::new(Self {
            url: url.to_string(),
            http,
            next_id: AtomicU64::new(1),
        });
        Ok(out)
    }
}

impl Scheduler for JsonRpcScheduler {
    fn download_info(
        &self,
        cid: Cid,
        requester_hint: String,
    ) -> BoxFut<'_, TbsResult<DownloadInfo>> {
        Box::pin(async move {
            let req = RpcRequest {
                jsonrpc: "2.0",
                method: Self::METHOD,
                params: (cid.to_string(), &requester_hint),
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
            };

            let res = self
                .http
                .post(&self.url)
                .json(&req)
                .send()
                .await
                .map_err(|e| TbsError::other_src("scheduler request", e))?;

            let status = res.status();
            if !status.is_success() {
                return Err(TbsError::other(status));
            }

            let res: RpcResponse = res
                .json()
                .await
                .map_err(|e| TbsError::other_src("scheduler response", e))?;

            match (res.result, res.error) {
                (_, Some(err)) => Err(TbsError::other(format!(
                    "scheduler error {}: {}",
                    err.code, err.message
                ))),
                (Some(info), None) => Ok(info),
                (None, None) => {
                    Err(TbsError::other("scheduler response without result"))
                }
            }
        })
    }
}
