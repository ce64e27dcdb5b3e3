//! End-to-end tests for the profile lookup/refresh path, using stub
//! fetchers in place of the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use site_client::{AggregationSource, ResourceFetcher};
use sitehub_common::{HubError, TenantRecord};
use sitehub_core::{HubService, MemoryProfileStore, ProfileAssembler, TenantRegistry};

// ---------------------------------------------------------------------------
// Stub upstreams
// ---------------------------------------------------------------------------

/// Simulates a tenant site that is completely unreachable.
struct FailingFetcher;

#[async_trait]
impl ResourceFetcher for FailingFetcher {
    async fn fetch(
        &self,
        _base_url: &str,
        _path: &str,
        _credential: &str,
        _query: &[(String, String)],
    ) -> Option<Value> {
        None
    }
}

/// Serves canned documents keyed by path.
struct CannedFetcher {
    responses: HashMap<&'static str, Value>,
}

#[async_trait]
impl ResourceFetcher for CannedFetcher {
    async fn fetch(
        &self,
        _base_url: &str,
        path: &str,
        _credential: &str,
        _query: &[(String, String)],
    ) -> Option<Value> {
        self.responses.get(path).cloned()
    }
}

/// Simulates a tenant site that hangs well past any refresh deadline.
struct StalledFetcher;

#[async_trait]
impl ResourceFetcher for StalledFetcher {
    async fn fetch(
        &self,
        _base_url: &str,
        _path: &str,
        _credential: &str,
        _query: &[(String, String)],
    ) -> Option<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        None
    }
}

/// Observes overlap between refresh passes through their site-info calls,
/// of which each pass makes exactly one.
#[derive(Default)]
struct TrackingFetcher {
    site_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl ResourceFetcher for TrackingFetcher {
    async fn fetch(
        &self,
        _base_url: &str,
        path: &str,
        _credential: &str,
        _query: &[(String, String)],
    ) -> Option<Value> {
        if path != "/system/site" {
            return None;
        }
        self.site_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        None
    }
}

struct CannedAggregation {
    connections: Option<Value>,
    streams: Option<Value>,
}

#[async_trait]
impl AggregationSource for CannedAggregation {
    async fn all_connections(&self, _credential: &str) -> Option<Value> {
        self.connections.clone()
    }

    async fn data_streams(&self, _credential: &str) -> Option<Value> {
        self.streams.clone()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn test_tenant() -> TenantRecord {
    let mut tenant = TenantRecord::new("VL-TEST-0001", "https://example.com", "Example");
    tenant.id = "t1".to_string();
    tenant
}

fn healthy_responses() -> HashMap<&'static str, Value> {
    HashMap::from([
        (
            "/system/site",
            json!({"home_url": "https://example.com", "https": true, "wordpress_version": "6.5", "theme": "storefront"}),
        ),
        ("/plugins", json!({"items": [{"name": "seo", "active": true}], "total": 1})),
        ("/themes", json!({"items": [{"name": "storefront", "active": true}], "total": 1})),
        ("/content/posts", json!({"items": [{"id": 1, "title": "Hello"}], "total": 1})),
        ("/content/pages", json!({"items": [{"id": 2, "title": "About"}], "total": 1})),
        ("/users", json!({"items": [{"id": 1, "name": "admin"}], "total": 1})),
    ])
}

fn no_aggregation() -> CannedAggregation {
    CannedAggregation {
        connections: None,
        streams: None,
    }
}

fn service_with(
    fetcher: Arc<dyn ResourceFetcher>,
    aggregation: Arc<dyn AggregationSource>,
    store: Arc<MemoryProfileStore>,
) -> HubService<Arc<MemoryProfileStore>> {
    let registry = TenantRegistry::new(vec![test_tenant()]);
    let assembler = ProfileAssembler::new(fetcher, aggregation);
    HubService::new(registry, store, assembler)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_credential_is_not_found() {
    let service = service_with(
        Arc::new(FailingFetcher),
        Arc::new(no_aggregation()),
        Arc::new(MemoryProfileStore::new()),
    );

    let err = service.get_or_refresh("VL-UNKNOWN", false).await.unwrap_err();
    assert!(matches!(err, HubError::CredentialNotFound));
}

#[tokio::test]
async fn total_fetch_failure_yields_empty_skeleton_without_error() {
    let service = service_with(
        Arc::new(FailingFetcher),
        Arc::new(no_aggregation()),
        Arc::new(MemoryProfileStore::new()),
    );

    let profile = service.get_or_refresh("VL-TEST-0001", false).await.unwrap();

    assert!(profile.posts().is_empty());
    assert!(profile.pages().is_empty());
    assert_eq!(profile.counts.posts, 0);
    assert_eq!(profile.counts.pages, 0);
    assert_eq!(profile.counts.users, 0);
    assert_eq!(profile.counts.plugins, 0);
    assert_eq!(profile.site.home_url, "https://example.com");
    assert!(profile.last_synced_at.is_some());
}

#[tokio::test]
async fn partial_failure_preserves_previous_posts() {
    let store = Arc::new(MemoryProfileStore::new());

    let healthy = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let first = healthy.get_or_refresh("VL-TEST-0001", true).await.unwrap();
    assert_eq!(first.posts().len(), 1);

    // Next refresh: every sub-fetch fails. Nothing may be erased.
    let outage = service_with(
        Arc::new(FailingFetcher),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let second = outage.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    assert_eq!(second.posts(), first.posts());
    assert_eq!(second.pages(), first.pages());
    assert_eq!(second.counts.posts, 1);
}

#[tokio::test]
async fn assembly_is_idempotent_modulo_timestamp() {
    let store = Arc::new(MemoryProfileStore::new());
    let service = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(no_aggregation()),
        store,
    );

    let mut first = service.get_or_refresh("VL-TEST-0001", true).await.unwrap();
    let mut second = service.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    first.last_synced_at = None;
    second.last_synced_at = None;
    assert_eq!(first, second);
}

#[tokio::test]
async fn reported_total_overrides_transferred_length() {
    let mut responses = healthy_responses();
    // A paginated transfer: one page of two items out of ninety.
    responses.insert(
        "/content/posts",
        json!({"items": [{"id": 1}, {"id": 2}], "total": 90}),
    );

    let service = service_with(
        Arc::new(CannedFetcher { responses }),
        Arc::new(no_aggregation()),
        Arc::new(MemoryProfileStore::new()),
    );

    let profile = service.get_or_refresh("VL-TEST-0001", true).await.unwrap();
    assert_eq!(profile.posts().len(), 2);
    assert_eq!(profile.counts.posts, 90);
}

#[tokio::test]
async fn complete_cached_profile_is_served_without_refetch() {
    let store = Arc::new(MemoryProfileStore::new());

    let healthy = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    healthy.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    // The site is now down, but the stored profile is complete, so no
    // refresh is triggered and the cached inventory is served.
    let outage = service_with(
        Arc::new(FailingFetcher),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let cached = outage.get_or_refresh("VL-TEST-0001", false).await.unwrap();

    assert_eq!(cached.posts().len(), 1);
    assert_eq!(cached.site.wordpress_version.as_deref(), Some("6.5"));
    assert_eq!(cached.license_id, "t1");
    assert_eq!(cached.license_key, "VL-TEST-0001");
}

#[tokio::test]
async fn emptied_inventory_zeroes_stale_counts() {
    let store = Arc::new(MemoryProfileStore::new());

    let healthy = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let first = healthy.get_or_refresh("VL-TEST-0001", true).await.unwrap();
    assert_eq!(first.counts.posts, 1);

    // The tenant deleted every post; the next transfer is empty and carries
    // no total field.
    let mut responses = healthy_responses();
    responses.insert("/content/posts", json!({"items": []}));
    let emptied = service_with(
        Arc::new(CannedFetcher { responses }),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let second = emptied.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    assert!(second.posts().is_empty());
    assert_eq!(second.counts.posts, 0);
    // The other collections still count what upstream reports.
    assert_eq!(second.counts.pages, 1);
}

#[tokio::test]
async fn deadline_exceeded_serves_previous_profile_unchanged() {
    let store = Arc::new(MemoryProfileStore::new());

    let healthy = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(no_aggregation()),
        store.clone(),
    );
    let first = healthy.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    let stalled = service_with(
        Arc::new(StalledFetcher),
        Arc::new(no_aggregation()),
        store.clone(),
    )
    .with_refresh_deadline(Duration::from_millis(10));
    let second = stalled.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    // The abandoned pass applied nothing, so even the sync timestamp still
    // reflects the last successful refresh.
    assert_eq!(second.last_synced_at, first.last_synced_at);
    assert_eq!(second.posts(), first.posts());
    assert_eq!(second.counts.posts, 1);
}

#[tokio::test]
async fn concurrent_refreshes_for_one_tenant_are_serialized() {
    let fetcher = Arc::new(TrackingFetcher::default());
    let service = service_with(
        fetcher.clone(),
        Arc::new(no_aggregation()),
        Arc::new(MemoryProfileStore::new()),
    );

    let (a, b) = tokio::join!(
        service.get_or_refresh("VL-TEST-0001", true),
        service.get_or_refresh("VL-TEST-0001", true),
    );
    a.unwrap();
    b.unwrap();

    // Both forced requests refreshed, but one at a time.
    assert_eq!(fetcher.site_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn aggregation_documents_are_reconciled_and_classified() {
    let service = service_with(
        Arc::new(CannedFetcher {
            responses: healthy_responses(),
        }),
        Arc::new(CannedAggregation {
            connections: Some(json!({"connections": {
                "cert": {"ssl_tls_data": {"valid": true}, "name": "Primary cert", "health_score": 97},
                "zone": {"cloudflare_zone_name": "example.com", "status": "active"},
            }})),
            streams: Some(json!({"streams": {
                "traffic": {"status": "active", "categories": ["ga4"], "health_score": 90},
                "stale": {"status": "inactive", "removed": true, "id": "stale"},
            }})),
        }),
        Arc::new(MemoryProfileStore::new()),
    );

    let profile = service.get_or_refresh("VL-TEST-0001", true).await.unwrap();

    // Removed stream excluded; the tagged stream stays and projects to GA4.
    assert_eq!(profile.streams.len(), 1);
    assert_eq!(profile.connections.len(), 3);
}
