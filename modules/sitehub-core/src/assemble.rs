//! Canonical profile assembly.
//!
//! Six independent sub-fetches against the tenant's own site, plus the two
//! central aggregation documents. A failed sub-fetch leaves the previous
//! field untouched: one bad upstream must never erase good data for another.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

use site_client::{AggregationSource, ResourceFetcher};
use sitehub_common::{ContentItem, HubError, Profile, TenantRecord};

use crate::classify::{classify, project_reserved, Classified};
use crate::merge::reconcile;

pub struct ProfileAssembler {
    fetcher: Arc<dyn ResourceFetcher>,
    aggregation: Arc<dyn AggregationSource>,
}

impl ProfileAssembler {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, aggregation: Arc<dyn AggregationSource>) -> Self {
        Self {
            fetcher,
            aggregation,
        }
    }

    /// Rebuild the canonical profile from upstream state. Never fails: in
    /// the worst case every sub-fetch is absent and `previous` comes back
    /// unchanged except for the refreshed timestamp.
    pub async fn assemble(&self, tenant: &TenantRecord, previous: Profile) -> Profile {
        let mut profile = previous;
        normalize_legacy(&mut profile);

        let base = tenant.site_url.as_str();
        let cred = tenant.credential.as_str();
        let paged = [("per_page".to_string(), "100".to_string())];

        let (site, plugins, themes, posts, pages, users) = tokio::join!(
            self.fetcher.fetch(base, "/system/site", cred, &[]),
            self.fetcher.fetch(base, "/plugins", cred, &[]),
            self.fetcher.fetch(base, "/themes", cred, &[]),
            self.fetcher.fetch(base, "/content/posts", cred, &paged),
            self.fetcher.fetch(base, "/content/pages", cred, &paged),
            self.fetcher.fetch(base, "/users", cred, &paged),
        );

        if let Some(doc) = &site {
            apply_site(&mut profile, doc);
        }

        let posts_fetch = apply_collection(&mut profile.posts, posts);
        let pages_fetch = apply_collection(&mut profile.pages, pages);
        let plugins_fetch = apply_collection(&mut profile.plugins, plugins);
        let users_fetch = apply_collection(&mut profile.users, users);
        // Themes carry no count field in the profile.
        apply_collection(&mut profile.themes, themes);

        profile.counts.posts =
            resolve_count(&posts_fetch, profile.posts().len(), profile.counts.posts);
        profile.counts.pages =
            resolve_count(&pages_fetch, profile.pages().len(), profile.counts.pages);
        profile.counts.plugins =
            resolve_count(&plugins_fetch, profile.plugins().len(), profile.counts.plugins);
        profile.counts.users =
            resolve_count(&users_fetch, profile.users().len(), profile.counts.users);

        let (connections_doc, streams_doc) = tokio::join!(
            self.aggregation.all_connections(cred),
            self.aggregation.data_streams(cred),
        );

        match reconcile(
            connections_doc,
            streams_doc,
            "all-connections",
            "data-streams",
        ) {
            Some(merged) => apply_aggregation(&mut profile, &merged),
            None => debug!(
                tenant = %tenant.id,
                cause = %HubError::TotalAggregationFailure,
                "keeping previous connection state"
            ),
        }

        profile.last_synced_at = Some(Utc::now());

        info!(
            tenant = %tenant.id,
            posts = profile.counts.posts,
            pages = profile.counts.pages,
            plugins = profile.counts.plugins,
            users = profile.counts.users,
            connections = profile.connections.len(),
            streams = profile.streams.len(),
            "profile assembled"
        );

        profile
    }
}

/// Backfill current field names from deprecated aliases in older stored
/// documents. The alias data stays in `extra` untouched.
fn normalize_legacy(profile: &mut Profile) {
    if profile.posts.is_none() {
        if let Some(items) = legacy_items(&profile.extra, "_posts") {
            profile.posts = Some(items);
        }
    }
    if profile.pages.is_none() {
        if let Some(items) = legacy_items(&profile.extra, "_pages") {
            profile.pages = Some(items);
        }
    }
}

fn legacy_items(extra: &Map<String, Value>, alias: &str) -> Option<Vec<ContentItem>> {
    let items = extra.get(alias)?.as_array()?;
    Some(
        items
            .iter()
            .cloned()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    )
}

/// Outcome of one collection sub-fetch: whether items were actually
/// transferred, and the total the upstream reported, if any.
struct CollectionFetch {
    transferred: bool,
    total: Option<u64>,
}

/// Replace the collection from a fetched `{items, total}` document.
/// An absent document leaves the previous value untouched.
fn apply_collection<T: DeserializeOwned>(
    slot: &mut Option<Vec<T>>,
    doc: Option<Value>,
) -> CollectionFetch {
    let Some(doc) = doc else {
        return CollectionFetch {
            transferred: false,
            total: None,
        };
    };

    let mut transferred = false;
    if let Some(items) = doc.get("items").and_then(Value::as_array) {
        let parsed = items
            .iter()
            .cloned()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        *slot = Some(parsed);
        transferred = true;
    }

    CollectionFetch {
        transferred,
        total: doc.get("total").and_then(Value::as_u64),
    }
}

/// A reported total is authoritative: paginated sub-resources may transfer
/// a truncated collection while `total` reflects the full count. Without a
/// total, a transferred collection is counted as-is, empty included; an
/// untransferred one keeps the previous count (which may exceed a truncated
/// page's length).
fn resolve_count(fetch: &CollectionFetch, len: usize, existing: u64) -> u64 {
    match fetch.total {
        Some(t) => t,
        None if fetch.transferred => len as u64,
        None => existing.max(len as u64),
    }
}

fn apply_site(profile: &mut Profile, doc: &Value) {
    if let Some(url) = non_empty_str(doc, "home_url") {
        profile.home_url = url.to_string();
        profile.site.home_url = url.to_string();
    }
    match doc.get("https").and_then(Value::as_bool) {
        Some(https) => {
            profile.https = https;
        }
        None => {
            profile.https = profile.home_url.starts_with("https://");
        }
    }
    profile.site.https = profile.https;

    if let Some(version) = non_empty_str(doc, "wordpress_version").or_else(|| {
        // Legacy field name still sent by older site plugins.
        non_empty_str(doc, "wp_version")
    }) {
        profile.site.wordpress_version = Some(version.to_string());
    }
    if let Some(theme) = non_empty_str(doc, "theme") {
        profile.site.theme = Some(theme.to_string());
    }
    if let Some(Value::Object(security)) = doc.get("security") {
        profile.security = security.clone();
    }
}

fn non_empty_str<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Classify every record in the reconciled aggregation document, replacing
/// the derived `connections` and `streams` collections. Streams carrying a
/// reserved category tag are additionally projected into provider-specific
/// connections.
fn apply_aggregation(profile: &mut Profile, merged: &Value) {
    let mut connections = Vec::new();
    let mut streams = Vec::new();

    for collection in ["connections", "streams"] {
        if let Some(Value::Object(records)) = merged.get(collection) {
            for (key, record) in records {
                if key.starts_with('_') {
                    continue;
                }
                match classify(key, record) {
                    Some(Classified::Connection(conn)) => connections.push(conn),
                    Some(Classified::Stream(stream)) => streams.push(stream),
                    None => {}
                }
            }
        }
    }

    for stream in &streams {
        if let Some(conn) = project_reserved(stream) {
            connections.push(conn);
        }
    }

    profile.connections = connections;
    profile.streams = streams;
}
