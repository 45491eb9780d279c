use super::*;
use crate::factories::{MemBlockStore, MemEdge, MemExchange};
use crate::fetcher::ExchangeFetcherFactory;
use std::sync::Arc;
use tbs_test_utils::{insecure_cid, random_block};

struct Fixture {
    store: Arc<MemBlockStore>,
    edge: Arc<MemEdge>,
    ex: Arc<MemExchange>,
    tiers: Tiers,
    fetchers: DynFetcherFactory,
}

impl Fixture {
    fn new() -> Self {
        let store = MemBlockStore::create();
        let edge = MemEdge::create();
        let ex = MemExchange::create();

        let edge_fetcher: DynEdgeFetcher = edge.clone();
        let tiers = Tiers {
            validator: HashSecurity::create(),
            store: store.clone(),
            edge: Some(edge_fetcher),
        };
        let fetchers = ExchangeFetcherFactory::create(ex.clone());

        Self {
            store,
            edge,
            ex,
            tiers,
            fetchers,
        }
    }

    async fn get(&self, policy: LoadPolicy, cid: Cid) -> TbsResult<Block> {
        resolve(
            &RequestContext::with_policy(policy),
            cid,
            &self.tiers,
            Some(&self.fetchers),
        )
        .await
    }
}

#[tokio::test]
async fn local_hit_never_touches_remote_tiers() {
    for policy in LoadPolicy::ALL.into_iter().filter(|p| p.includes_local()) {
        let f = Fixture::new();
        let block = random_block();
        f.store.put(block.clone()).await.unwrap();
        f.edge.insert([block.clone()]);
        f.ex.insert([block.clone()]);

        assert_eq!(block, f.get(policy, *block.cid()).await.unwrap());
        assert_eq!(0, f.edge.calls(), "{policy:?}");
        assert_eq!(0, f.ex.stats().fetch_calls(), "{policy:?}");
    }
}

#[tokio::test]
async fn excluded_tiers_record_zero_calls() {
    let f = Fixture::new();
    let block = random_block();

    for policy in LoadPolicy::ALL {
        let _ = f.get(policy, *block.cid()).await;
    }

    // LocalEdgeExchange, LocalEdge, LocalExchange, LocalOnly
    let stats = f.store.stats();
    assert_eq!(4, stats.get);
    // LocalEdgeExchange, LocalEdge, EdgeOnly
    assert_eq!(3, f.edge.calls());
    // LocalEdgeExchange, LocalExchange, ExchangeOnly
    assert_eq!(3, f.ex.stats().get_block);
}

#[tokio::test]
async fn exchange_hit_is_written_back() {
    let f = Fixture::new();
    let block = random_block();
    f.ex.insert([block.clone()]);

    let got = f
        .get(LoadPolicy::LocalEdgeExchange, *block.cid())
        .await
        .unwrap();
    assert_eq!(block, got);
    assert_eq!(1, f.edge.calls());
    assert_eq!(1, f.store.stats().put);
    assert_eq!(vec![1], f.ex.stats().notified);

    let got = f.get(LoadPolicy::LocalOnly, *block.cid()).await.unwrap();
    assert_eq!(block, got);
    assert_eq!(1, f.ex.stats().get_block);
}

#[tokio::test]
async fn edge_hit_is_not_written_back() {
    let f = Fixture::new();
    let block = random_block();
    f.edge.insert([block.clone()]);

    let got = f.get(LoadPolicy::LocalEdge, *block.cid()).await.unwrap();
    assert_eq!(block, got);
    assert!(f.store.is_empty());
    assert!(f.ex.stats().notified.is_empty());

    let err = f.get(LoadPolicy::LocalOnly, *block.cid()).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    // served by the edge again
    f.get(LoadPolicy::LocalEdge, *block.cid()).await.unwrap();
    assert_eq!(2, f.edge.calls());
}

#[tokio::test]
async fn edge_failure_falls_through() {
    let f = Fixture::new();
    let block = random_block();
    f.ex.insert([block.clone()]);
    f.edge.set_fail(Some(TbsError::DiscoveryTimeout(
        std::time::Duration::from_secs(5),
    )));

    let got = f
        .get(LoadPolicy::LocalEdgeExchange, *block.cid())
        .await
        .unwrap();
    assert_eq!(block, got);
    assert_eq!(1, f.edge.calls());

    // with no tier left, the edge error is the final one
    let err = f.get(LoadPolicy::EdgeOnly, *block.cid()).await.unwrap_err();
    assert!(matches!(err, TbsError::DiscoveryTimeout(_)), "{err:?}");
}

#[derive(Debug)]
struct BrokenStore;

impl BlockStore for BrokenStore {
    fn has(&self, _cid: Cid) -> BoxFut<'_, TbsResult<bool>> {
        Box::pin(async { Err(TbsError::other("disk on fire")) })
    }

    fn get(&self, _cid: Cid) -> BoxFut<'_, TbsResult<Block>> {
        Box::pin(async { Err(TbsError::other("disk on fire")) })
    }

    fn put(&self, _block: Block) -> BoxFut<'_, TbsResult<()>> {
        Box::pin(async { Err(TbsError::other("disk on fire")) })
    }

    fn put_many(&self, _blocks: Vec<Block>) -> BoxFut<'_, TbsResult<()>> {
        Box::pin(async { Err(TbsError::other("disk on fire")) })
    }

    fn delete_block(&self, _cid: Cid) -> BoxFut<'_, TbsResult<()>> {
        Box::pin(async { Err(TbsError::other("disk on fire")) })
    }
}

#[tokio::test]
async fn local_store_error_short_circuits() {
    let mut f = Fixture::new();
    f.tiers.store = Arc::new(BrokenStore);
    let block = random_block();
    f.edge.insert([block.clone()]);

    let err = f
        .get(LoadPolicy::LocalEdgeExchange, *block.cid())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk on fire"), "{err}");
    assert_eq!(0, f.edge.calls());
    assert_eq!(0, f.ex.stats().fetch_calls());
}

#[tokio::test]
async fn unavailable_tiers() {
    let mut f = Fixture::new();
    f.tiers.edge = None;
    let cid = *random_block().cid();
    let ctx = RequestContext::with_policy(LoadPolicy::ExchangeOnly);

    let err = resolve(&ctx, cid, &f.tiers, None).await.unwrap_err();
    assert!(matches!(err, TbsError::NoFetcher), "{err:?}");

    let err = f.get(LoadPolicy::EdgeOnly, cid).await.unwrap_err();
    assert!(matches!(err, TbsError::NoEdge), "{err:?}");

    // the last attempted tier decides the error
    let err = f.get(LoadPolicy::LocalEdge, cid).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    let ctx = RequestContext::with_policy(LoadPolicy::LocalExchange);
    let err = resolve(&ctx, cid, &f.tiers, None).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn exchange_errors_are_returned() {
    let f = Fixture::new();
    let block = random_block();

    let err = f
        .get(LoadPolicy::ExchangeOnly, *block.cid())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    f.ex.insert([block.clone()]);
    f.ex.set_fail_notify(true);

    let err = f
        .get(LoadPolicy::ExchangeOnly, *block.cid())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("notify failure"), "{err}");

    // the local write is not rolled back
    assert_eq!(1, f.store.len());
}

#[tokio::test]
async fn invalid_cid_is_rejected_up_front() {
    let f = Fixture::new();

    for policy in LoadPolicy::ALL {
        let err = f.get(policy, insecure_cid()).await.unwrap_err();
        assert!(matches!(err, TbsError::InvalidCid { .. }), "{err:?}");
    }

    assert_eq!(0, f.store.stats().get);
    assert_eq!(0, f.edge.calls());
    assert_eq!(0, f.ex.stats().fetch_calls());
}

#[tokio::test]
async fn cancelled_request_touches_nothing() {
    let f = Fixture::new();
    let block = random_block();
    f.store.put(block.clone()).await.unwrap();

    let ctx = RequestContext::default();
    ctx.cancel.cancel();

    let err = resolve(&ctx, *block.cid(), &f.tiers, Some(&f.fetchers))
        .await
        .unwrap_err();
    assert!(matches!(err, TbsError::Cancelled), "{err:?}");
    assert_eq!(0, f.store.stats().get);
}
