//! Envelope shapes produced by the service facade.

mod common;

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use common::{FaultyStore, StubUpstream, add_account, cards, page, seed_products};
use shelfsync_core::credentials::PlaintextCipher;
use shelfsync_core::store::MemoryStore;
use shelfsync_core::upstream::{AccountIdentity, UpstreamError};
use shelfsync_core::{CacheConfig, CacheService};

fn service(store: Arc<MemoryStore>, upstream: Arc<StubUpstream>) -> CacheService {
    CacheService::new(
        &CacheConfig::default(),
        store,
        upstream,
        Arc::new(PlaintextCipher),
    )
}

fn to_json<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap()
}

#[tokio::test]
async fn out_of_range_limit_is_a_validation_failure() {
    let store = Arc::new(MemoryStore::new());
    let account = add_account(store.as_ref(), "main", "s").await;
    let service = service(store, StubUpstream::new());

    for limit in [0, 1001] {
        let env = to_json(service.get_cached_products(account, limit, 0, false).await);
        assert_eq!(env["success"], false);
        assert_eq!(env["error"]["kind"], "validation");
        assert!(env.get("data").is_none());
    }
}

#[tokio::test]
async fn cached_read_envelope_carries_products() {
    let store = Arc::new(MemoryStore::new());
    let account = add_account(store.as_ref(), "main", "s").await;
    seed_products(store.as_ref(), account, &["a", "b"], Utc::now()).await;
    let service = service(store, StubUpstream::new());

    let env = to_json(service.get_cached_products(account, 1, 0, false).await);

    assert_eq!(env["success"], true);
    assert!(env.get("warning").is_none());
    assert_eq!(env["data"]["total"], 2);
    assert_eq!(env["data"]["from_cache"], true);
    assert_eq!(env["data"]["products"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_without_cache_is_not_a_success() {
    let store = Arc::new(MemoryStore::new());
    let upstream = StubUpstream::new();
    upstream.always(Err(UpstreamError::http(502, "Bad Gateway")));
    let account = add_account(store.as_ref(), "main", "s").await;
    let service = service(store, upstream);

    let env = to_json(service.sync_products_now(account).await);

    assert_eq!(
        env,
        json!({
            "success": false,
            "error": {"kind": "transient_upstream", "message": "HTTP 502: Bad Gateway"}
        })
    );
}

#[tokio::test]
async fn sweep_and_stats_envelopes() {
    let store = Arc::new(MemoryStore::new());
    let upstream = StubUpstream::new();
    upstream.always(Ok(page(cards(&["a"]))));
    let account = add_account(store.as_ref(), "main", "s").await;
    let service = service(store, upstream);

    assert_eq!(
        to_json(service.clear_expired_product_cache().await),
        json!({"success": true, "data": {"cleared_count": 0, "purged_count": 0}})
    );

    service.sync_products_now(account).await;
    let stats = to_json(service.get_product_cache_stats(Some(account)).await);
    assert_eq!(stats["data"]["total_cached_products"], 1);

    let chars = to_json(service.get_characteristics_cache_stats().await);
    assert_eq!(chars["data"]["cache_ttl_days"], 7);
    assert_eq!(chars["data"]["total_cached_subjects"], 0);
}

#[tokio::test]
async fn invalidating_unknown_subject_is_not_found() {
    let service = service(Arc::new(MemoryStore::new()), StubUpstream::new());

    let env = to_json(service.invalidate_subject_characteristics_cache(5).await);

    assert_eq!(env["success"], false);
    assert_eq!(env["error"]["kind"], "not_found");
}

#[tokio::test]
async fn characteristics_envelope() {
    let store = Arc::new(MemoryStore::new());
    let upstream = StubUpstream::new();
    upstream.set_characteristics(42, Ok(json!({"charcs": []})));
    let account = add_account(store.as_ref(), "main", "s").await;
    let service = service(store, upstream);

    let env = to_json(service.get_subject_characteristics(account, 42, false).await);

    assert_eq!(env["success"], true);
    assert_eq!(env["data"]["subject_id"], 42);
    assert_eq!(env["data"]["data"], json!({"charcs": []}));
    assert_eq!(env["data"]["from_cache"], false);
}

#[tokio::test]
async fn registration_stores_seller_identity() {
    let store = Arc::new(MemoryStore::new());
    let upstream = StubUpstream::new();
    upstream.set_identity(Ok(AccountIdentity {
        name: "Shop".into(),
        sid: "sid-1".into(),
        trade_mark: "Brand".into(),
    }));
    let service = service(store, upstream);

    let env = service.register_account("main", None, "token").await;
    assert!(env.success);
    let account = env.data.unwrap();
    assert_eq!(account.seller_id.as_deref(), Some("sid-1"));
    assert_eq!(account.environment, "production");
    assert!(account.is_active);

    let listed = service.list_accounts().await.data.unwrap();
    assert_eq!(listed.len(), 1);

    let disabled = service.set_account_active(account.id, false).await;
    assert!(!disabled.data.unwrap().is_active);
}

#[tokio::test]
async fn registration_rejected_upstream_stores_nothing() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, StubUpstream::new());

    let env = to_json(service.register_account("main", None, "bad").await);

    assert_eq!(env["error"]["kind"], "unauthorized");
    assert_eq!(env["error"]["message"], "Invalid token or unauthorized");
    assert!(service.list_accounts().await.data.unwrap().is_empty());
}

#[tokio::test]
async fn toggling_unknown_account_is_not_found() {
    let service = service(Arc::new(MemoryStore::new()), StubUpstream::new());

    let env = service.set_account_active(uuid::Uuid::now_v7(), true).await;

    assert!(!env.success);
    assert_eq!(env.error.unwrap().kind, "not_found");
}

#[tokio::test]
async fn failed_swap_is_never_a_success_envelope() {
    let store = Arc::new(FaultyStore::swap_unavailable());
    let upstream = StubUpstream::new();
    upstream.always(Ok(page(cards(&["x"]))));
    let account = add_account(store.as_ref(), "main", "s").await;
    seed_products(&store.inner, account, &["a"], Utc::now()).await;
    let service = CacheService::new(
        &CacheConfig::default(),
        store,
        upstream,
        Arc::new(PlaintextCipher),
    );

    let env = to_json(service.sync_products_now(account).await);
    assert_eq!(env["success"], false);
    assert_eq!(env["error"]["kind"], "persistence_error");
    assert!(env.get("data").is_none());
    assert!(env.get("warning").is_none());
}
