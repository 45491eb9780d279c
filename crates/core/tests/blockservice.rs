use bytes::Bytes;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tbs_api::{
    Block, BlockGetter, BlockReceiver, BlockStore, Cid, LoadPolicy,
    RequestContext, BLOCK_SERVICE_MOD_NAME,
};
use tbs_core::{
    default_builder,
    factories::{
        core_edge::config::{CoreEdgeConfig, MOD_NAME},
        JsonRpcScheduler, MemBlockStore, MemExchange,
    },
    BlockService,
};
use tbs_test_utils::{cids_of, enable_tracing, random_blocks};

#[derive(Clone)]
struct EdgeNet {
    edge_url: String,
    blocks: Arc<HashMap<String, Bytes>>,
}

async fn rpc(
    axum::extract::State(s): axum::extract::State<EdgeNet>,
    axum::Json(req): axum::Json<serde_json::Value>,
) -> axum::Json<serde_json::Value> {
    assert_eq!(JsonRpcScheduler::METHOD, req["method"]);
    axum::Json(serde_json::json!({
        "jsonrpc": "2.0",
        "result": { "URL": s.edge_url, "Token": "t0k" },
        "id": req["id"],
    }))
}

async fn block_get(
    axum::extract::State(s): axum::extract::State<EdgeNet>,
    axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>,
) -> Result<Bytes, axum::http::StatusCode> {
    match q.get("cid").and_then(|cid| s.blocks.get(cid)) {
        Some(data) => Ok(data.clone()),
        None => Err(axum::http::StatusCode::NOT_FOUND),
    }
}

/// Serve a scheduler at `/rpc` and an edge node at `/block/get` holding
/// `blocks`. Returns the server address.
async fn edge_net(blocks: &[Block]) -> (String, tokio::task::JoinHandle<()>) {
    use axum::*;

    let l = tokio::net::TcpListener::bind(std::net::SocketAddr::from((
        [127, 0, 0, 1],
        0,
    )))
    .await
    .unwrap();
    let addr = format!("http://{:?}", l.local_addr().unwrap());

    let state = EdgeNet {
        edge_url: format!("{addr}/block/get"),
        blocks: Arc::new(
            blocks
                .iter()
                .map(|b| (b.cid().to_string(), b.data().clone()))
                .collect(),
        ),
    };

    let app: Router = Router::new()
        .route("/rpc", routing::post(rpc))
        .route("/block/get", routing::get(block_get))
        .with_state(state);

    let task = tokio::task::spawn(async move {
        let _ = serve(l, app).await;
    });

    (addr, task)
}

async fn collect(mut recv: BlockReceiver) -> Vec<Block> {
    tokio::time::timeout(Duration::from_secs(10), async move {
        let mut out = Vec::new();
        while let Some(block) = recv.recv().await {
            out.push(block);
        }
        out
    })
    .await
    .unwrap()
}

fn sorted(mut cids: Vec<Cid>) -> Vec<Cid> {
    cids.sort();
    cids
}

#[tokio::test(flavor = "multi_thread")]
async fn three_tiers_end_to_end() {
    enable_tracing();

    let local = random_blocks(2);
    let edge = random_blocks(3);
    let exchange = random_blocks(40);
    let nowhere = random_blocks(1);

    let (addr, task) = edge_net(&edge).await;

    let mut builder = default_builder().with_default_config().unwrap();
    builder
        .config
        .set_module_config(
            MOD_NAME.into(),
            &CoreEdgeConfig {
                scheduler_urls: vec![format!("{addr}/rpc")],
                discovery_timeout_ms: 2000,
                ..Default::default()
            },
        )
        .unwrap();
    let builder = builder.build().unwrap();

    let store = MemBlockStore::create();
    store.put_many(local.clone()).await.unwrap();
    let ex = MemExchange::create_with_sessions();
    ex.insert(exchange.clone());

    let bs =
        BlockService::from_builder(builder, store.clone(), Some(ex.clone()))
            .await
            .unwrap();

    let mut all = Vec::new();
    for set in [&local, &edge, &exchange, &nowhere] {
        all.extend(cids_of(set));
    }

    let ctx = RequestContext::default();
    let session = bs.new_session(&ctx);
    let got = collect(session.get_blocks(ctx.clone(), all)).await;

    let mut expect = cids_of(&local);
    expect.extend(cids_of(&edge));
    expect.extend(cids_of(&exchange));
    assert_eq!(sorted(expect), sorted(cids_of(&got)));

    // exchange hits were committed in windows, edge hits were not cached
    assert_eq!(vec![2, 32, 8], store.stats().put_many);
    assert_eq!(vec![32, 8], ex.stats().notified);
    assert_eq!(1, ex.stats().sessions);

    let local_only = RequestContext::with_policy(LoadPolicy::LocalOnly);
    for block in exchange.iter().chain(local.iter()) {
        bs.get_block(local_only.clone(), *block.cid()).await.unwrap();
    }
    for block in edge.iter() {
        let err = bs
            .get_block(local_only.clone(), *block.cid())
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{err:?}");

        // still served by the edge
        let got = bs
            .get_block(RequestContext::default(), *block.cid())
            .await
            .unwrap();
        assert_eq!(block, &got);
    }

    let err = bs
        .get_block(RequestContext::default(), *nowhere[0].cid())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    bs.close().await.unwrap();
    assert!(ex.stats().closed);

    task.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_policy_selects_tiers() {
    let store = MemBlockStore::create();
    let ex = MemExchange::create();
    let bs = BlockService::new(store.clone(), Some(ex.clone()));

    let blocks = random_blocks(1);
    ex.insert(blocks.clone());

    // 3 is LocalOnly
    let ctx = RequestContext::from_raw_policy(Some(3)).unwrap();
    assert!(bs.get_block(ctx, *blocks[0].cid()).await.is_err());
    assert_eq!(0, ex.stats().fetch_calls());

    let ctx = RequestContext::from_raw_policy(None).unwrap();
    bs.get_block(ctx, *blocks[0].cid()).await.unwrap();
    assert_eq!(1, ex.stats().fetch_calls());

    assert!(RequestContext::from_raw_policy(Some(42)).is_err());
    assert!(bs.block_store().has(*blocks[0].cid()).await.unwrap());

    // the module name is stable config surface
    assert_eq!("blockService", BLOCK_SERVICE_MOD_NAME);
}
