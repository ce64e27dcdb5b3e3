//! Classification of loosely-shaped aggregation records into the fixed
//! connection taxonomy.
//!
//! Rules live in an ordered table and are evaluated in sequence; the first
//! match wins and classification stops. Field-presence rules outrank
//! vendor-token substring rules because an explicit field is a stronger
//! signal than a name. The mapping is pure: same input, same bucket.

use serde_json::Value;

use sitehub_common::{
    title_case, ConnectionRecord, ConnectionType, StreamRecord, StreamStatus,
};

/// Outcome of classifying one keyed record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Connection(ConnectionRecord),
    Stream(StreamRecord),
}

type Predicate = fn(&str, &Value) -> bool;

/// The ordered rule table. Priority is the listed order.
const RULES: &[(Predicate, ConnectionType)] = &[
    // Field-presence rules: explicit upstream fields.
    (has_ssl_tls_data, ConnectionType::SslTls),
    (has_cloudflare_zone, ConnectionType::Cloudflare),
    (has_bucket_name, ConnectionType::AwsS3),
    (has_competitor_url, ConnectionType::Competitor),
    (has_ga4_property, ConnectionType::Ga4),
    (has_cms_fields, ConnectionType::Cms),
    // Vendor-token rules: substring match on key and name.
    (mentions_ssl, ConnectionType::SslTls),
    (mentions_cloudflare, ConnectionType::Cloudflare),
    (mentions_s3, ConnectionType::AwsS3),
    (mentions_competitor, ConnectionType::Competitor),
    (mentions_lighthouse, ConnectionType::Lighthouse),
    (mentions_analytics, ConnectionType::Ga4),
    (mentions_search_console, ConnectionType::SearchConsole),
    (mentions_wordpress, ConnectionType::Cms),
];

/// Stream category tags that additionally project a stream into a
/// provider-specific connection. The stream stays in `streams`.
const RESERVED_TAGS: &[(&str, ConnectionType)] = &[("ga4", ConnectionType::Ga4)];

/// Used when upstream reports no health score; midpoint, deliberately
/// neither alarming nor reassuring.
const NEUTRAL_HEALTH: u8 = 50;

/// Classify one record from an aggregation document.
///
/// Removed records are excluded before any rule runs. Records matching no
/// connection rule but shaped like a data stream become a generic
/// `StreamRecord`; records matching nothing are dropped (`None`).
pub fn classify(key: &str, record: &Value) -> Option<Classified> {
    if is_removed(record) {
        return None;
    }

    for (predicate, kind) in RULES {
        if predicate(key, record) {
            return Some(Classified::Connection(normalize_connection(
                *kind, key, record,
            )));
        }
    }

    if looks_like_stream(record) {
        return Some(Classified::Stream(normalize_stream(key, record)));
    }

    None
}

/// Project a stream carrying a reserved category tag into the matching
/// provider-specific connection.
pub fn project_reserved(stream: &StreamRecord) -> Option<ConnectionRecord> {
    for (tag, kind) in RESERVED_TAGS {
        if stream.categories.iter().any(|c| c.eq_ignore_ascii_case(tag)) {
            return Some(ConnectionRecord {
                kind: *kind,
                name: stream.name.clone(),
                status: match stream.status {
                    StreamStatus::Active => "active".to_string(),
                    StreamStatus::Inactive => "inactive".to_string(),
                    StreamStatus::Unknown => "unknown".to_string(),
                },
                health_score: stream.health_score.min(100),
                description: stream.description.clone(),
                last_updated: None,
            });
        }
    }
    None
}

// --- Exclusion ---

fn is_removed(record: &Value) -> bool {
    if record.get("removed").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    matches!(record.get("removed_at"), Some(Value::String(s)) if !s.is_empty())
}

// --- Field-presence predicates ---

fn has_field(record: &Value, field: &str) -> bool {
    matches!(record.get(field), Some(v) if !v.is_null())
}

fn has_ssl_tls_data(_key: &str, record: &Value) -> bool {
    has_field(record, "ssl_tls_data")
}

fn has_cloudflare_zone(_key: &str, record: &Value) -> bool {
    has_field(record, "cloudflare_zone_name")
}

fn has_bucket_name(_key: &str, record: &Value) -> bool {
    has_field(record, "bucket_name")
}

fn has_competitor_url(_key: &str, record: &Value) -> bool {
    has_field(record, "competitor_url")
}

fn has_ga4_property(_key: &str, record: &Value) -> bool {
    has_field(record, "ga4_property_id")
}

fn has_cms_fields(_key: &str, record: &Value) -> bool {
    has_field(record, "site_url") || has_field(record, "wp_version")
}

// --- Vendor-token predicates ---

fn haystack(key: &str, record: &Value) -> String {
    let name = record.get("name").and_then(Value::as_str).unwrap_or("");
    format!("{} {}", key, name).to_ascii_lowercase()
}

fn mentions_ssl(key: &str, record: &Value) -> bool {
    let hay = haystack(key, record);
    hay.contains("ssl") || hay.contains("tls")
}

fn mentions_cloudflare(key: &str, record: &Value) -> bool {
    haystack(key, record).contains("cloudflare")
}

fn mentions_s3(key: &str, record: &Value) -> bool {
    let hay = haystack(key, record);
    hay.contains("s3") || hay.contains("aws")
}

fn mentions_competitor(key: &str, record: &Value) -> bool {
    haystack(key, record).contains("competitor")
}

fn mentions_lighthouse(key: &str, record: &Value) -> bool {
    haystack(key, record).contains("lighthouse")
}

fn mentions_analytics(key: &str, record: &Value) -> bool {
    let hay = haystack(key, record);
    hay.contains("google analytics") || hay.contains("ga4")
}

fn mentions_search_console(key: &str, record: &Value) -> bool {
    haystack(key, record).contains("search console")
}

fn mentions_wordpress(key: &str, record: &Value) -> bool {
    haystack(key, record).contains("wordpress")
}

// --- Generic stream fall-through ---

fn looks_like_stream(record: &Value) -> bool {
    if !has_field(record, "status") {
        return false;
    }
    let has_categories = matches!(record.get("categories"), Some(Value::Array(c)) if !c.is_empty());
    let positive_health = record
        .get("health_score")
        .and_then(Value::as_f64)
        .map(|h| h > 0.0)
        .unwrap_or(false);
    has_categories || positive_health || has_field(record, "id") || has_field(record, "last_updated")
}

// --- Normalization ---

fn normalize_connection(kind: ConnectionType, key: &str, record: &Value) -> ConnectionRecord {
    ConnectionRecord {
        kind,
        name: string_field(record, "name").unwrap_or_else(|| title_case(key)),
        status: string_field(record, "status").unwrap_or_else(|| "active".to_string()),
        health_score: health_score(record),
        description: string_field(record, "description")
            .unwrap_or_else(|| format!("{kind} connection")),
        last_updated: string_field(record, "last_updated"),
    }
}

fn normalize_stream(key: &str, record: &Value) -> StreamRecord {
    let status = string_field(record, "status")
        .map(|s| StreamStatus::parse(&s))
        .unwrap_or_default();

    let categories = record
        .get("categories")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    StreamRecord {
        id: string_field(record, "id").unwrap_or_else(|| key.to_string()),
        name: string_field(record, "name").unwrap_or_else(|| title_case(key)),
        status,
        categories,
        health_score: health_score(record),
        description: string_field(record, "description").unwrap_or_default(),
    }
}

fn string_field(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn health_score(record: &Value) -> u8 {
    record
        .get("health_score")
        .and_then(Value::as_f64)
        .map(|h| h.clamp(0.0, 100.0) as u8)
        .unwrap_or(NEUTRAL_HEALTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_presence_outranks_vendor_tokens() {
        // Name says Cloudflare, but the explicit SSL field wins.
        let record = json!({"name": "Cloudflare edge", "ssl_tls_data": {"valid": true}});
        match classify("conn_1", &record).unwrap() {
            Classified::Connection(c) => assert_eq!(c.kind, ConnectionType::SslTls),
            other => panic!("expected connection, got {other:?}"),
        }
    }

    #[test]
    fn vendor_tokens_bucket_by_name() {
        let cases = [
            ("cloudflare_zone", json!({"name": "Main zone"}), ConnectionType::Cloudflare),
            ("backup", json!({"name": "S3 backups"}), ConnectionType::AwsS3),
            ("perf", json!({"name": "Lighthouse audit"}), ConnectionType::Lighthouse),
            ("traffic", json!({"name": "Google Analytics"}), ConnectionType::Ga4),
            ("gsc", json!({"name": "Search Console"}), ConnectionType::SearchConsole),
            ("cms", json!({"name": "WordPress core"}), ConnectionType::Cms),
            ("rival_watch", json!({"name": "Competitor pricing"}), ConnectionType::Competitor),
        ];

        for (key, record, expected) in cases {
            match classify(key, &record).unwrap() {
                Classified::Connection(c) => assert_eq!(c.kind, expected, "key {key}"),
                other => panic!("expected connection for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn removed_records_are_excluded() {
        assert!(classify("ssl_cert", &json!({"removed": true})).is_none());
        assert!(classify("ssl_cert", &json!({"removed_at": "2026-01-01"})).is_none());
        // Empty removed_at does not exclude.
        assert!(classify("ssl_cert", &json!({"removed_at": ""})).is_some());
    }

    #[test]
    fn status_plus_stream_markers_falls_through_to_stream() {
        let record = json!({
            "status": "active",
            "categories": ["seo"],
            "health_score": 88,
        });
        match classify("rankings_feed", &record).unwrap() {
            Classified::Stream(s) => {
                assert_eq!(s.status, StreamStatus::Active);
                assert_eq!(s.health_score, 88);
                assert_eq!(s.name, "Rankings Feed");
                assert_eq!(s.id, "rankings_feed");
            }
            other => panic!("expected stream, got {other:?}"),
        }
    }

    #[test]
    fn unclassifiable_records_are_dropped() {
        assert!(classify("mystery", &json!({"foo": "bar"})).is_none());
        // Status alone is not enough.
        assert!(classify("mystery", &json!({"status": "active"})).is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let record = json!({"name": "Cloudflare zone", "status": "active"});
        let first = classify("zone_a", &record);
        let second = classify("zone_a", &record);
        assert_eq!(first, second);
    }

    #[test]
    fn reserved_tag_projects_stream_into_ga4_connection() {
        let stream = StreamRecord {
            id: "s1".to_string(),
            name: "Web traffic".to_string(),
            status: StreamStatus::Active,
            categories: vec!["GA4".to_string()],
            health_score: 92,
            description: String::new(),
        };

        let conn = project_reserved(&stream).unwrap();
        assert_eq!(conn.kind, ConnectionType::Ga4);
        assert_eq!(conn.name, "Web traffic");
        assert_eq!(conn.health_score, 92);
    }

    #[test]
    fn untagged_stream_is_not_projected() {
        let stream = StreamRecord {
            id: "s2".to_string(),
            name: "Logs".to_string(),
            status: StreamStatus::Unknown,
            categories: vec!["ops".to_string()],
            health_score: 10,
            description: String::new(),
        };
        assert!(project_reserved(&stream).is_none());
    }

    #[test]
    fn health_score_is_clamped() {
        let record = json!({"name": "SSL cert", "health_score": 250});
        match classify("cert", &record).unwrap() {
            Classified::Connection(c) => assert_eq!(c.health_score, 100),
            other => panic!("expected connection, got {other:?}"),
        }
    }
}
