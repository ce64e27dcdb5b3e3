use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// --- Tenant Registry Types ---

/// A registered tenant. Created by the external registration process;
/// read-only to the aggregation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub credential: String,
    pub site_url: String,
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl TenantRecord {
    /// Build a fresh record. Used by the registration process and tests;
    /// the aggregation engine itself never creates tenants.
    pub fn new(credential: &str, site_url: &str, display_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            credential: credential.to_string(),
            site_url: site_url.to_string(),
            display_name: display_name.to_string(),
            active: true,
            created_at: Utc::now(),
            last_seen_at: None,
        }
    }
}

/// Pick the credential from its two accepted transports.
/// Header takes precedence when both are present.
pub fn credential_from_parts<'a>(
    header: Option<&'a str>,
    query: Option<&'a str>,
) -> Option<&'a str> {
    header.filter(|c| !c.is_empty()).or(query)
}

// --- Profile ---

/// The canonical per-tenant document. Created on first resolution, mutated
/// in place on every refresh, never deleted by this engine.
///
/// Inventory collections are `Option<Vec<_>>`: a stored document where the
/// field is absent, null, or not an array deserializes to `None`, which is
/// what drives the completeness-based refresh policy. `None` serializes as
/// `[]` so consumers always see an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub license_id: String,
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub home_url: String,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub site: SiteInfo,

    #[serde(
        default,
        deserialize_with = "lenient_collection",
        serialize_with = "collection_or_empty"
    )]
    pub posts: Option<Vec<ContentItem>>,
    #[serde(
        default,
        deserialize_with = "lenient_collection",
        serialize_with = "collection_or_empty"
    )]
    pub pages: Option<Vec<ContentItem>>,
    #[serde(
        default,
        deserialize_with = "lenient_collection",
        serialize_with = "collection_or_empty"
    )]
    pub plugins: Option<Vec<PluginRecord>>,
    #[serde(
        default,
        deserialize_with = "lenient_collection",
        serialize_with = "collection_or_empty"
    )]
    pub themes: Option<Vec<ThemeRecord>>,
    #[serde(
        default,
        deserialize_with = "lenient_collection",
        serialize_with = "collection_or_empty"
    )]
    pub users: Option<Vec<UserRecord>>,

    #[serde(default)]
    pub counts: ProfileCounts,
    #[serde(default)]
    pub security: Map<String, Value>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Unknown and legacy fields from older stored documents, preserved
    /// verbatim. Deprecated aliases are normalized into current fields
    /// during assembly, never removed from here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Empty skeleton for a tenant with no stored profile yet.
    /// All inventory collections start missing so the first request
    /// triggers a refresh.
    pub fn skeleton(tenant: &TenantRecord) -> Self {
        Self {
            license_id: tenant.id.clone(),
            license_key: tenant.credential.clone(),
            home_url: tenant.site_url.clone(),
            https: tenant.site_url.starts_with("https://"),
            site: SiteInfo {
                home_url: tenant.site_url.clone(),
                https: tenant.site_url.starts_with("https://"),
                wordpress_version: None,
                theme: None,
            },
            posts: None,
            pages: None,
            plugins: None,
            themes: None,
            users: None,
            counts: ProfileCounts::default(),
            security: Map::new(),
            connections: Vec::new(),
            streams: Vec::new(),
            last_synced_at: None,
            extra: Map::new(),
        }
    }

    pub fn posts(&self) -> &[ContentItem] {
        self.posts.as_deref().unwrap_or_default()
    }

    pub fn pages(&self) -> &[ContentItem] {
        self.pages.as_deref().unwrap_or_default()
    }

    pub fn plugins(&self) -> &[PluginRecord] {
        self.plugins.as_deref().unwrap_or_default()
    }

    pub fn themes(&self) -> &[ThemeRecord] {
        self.themes.as_deref().unwrap_or_default()
    }

    pub fn users(&self) -> &[UserRecord] {
        self.users.as_deref().unwrap_or_default()
    }

    /// All five inventory collections present as actual arrays.
    pub fn is_inventory_complete(&self) -> bool {
        self.posts.is_some()
            && self.pages.is_some()
            && self.plugins.is_some()
            && self.themes.is_some()
            && self.users.is_some()
    }

    /// No-network backfill: ensure license identity, home URL, and counts
    /// are populated from whatever data is already present.
    pub fn backfill(&mut self, tenant: &TenantRecord) {
        if self.license_id.is_empty() {
            self.license_id = tenant.id.clone();
        }
        if self.license_key.is_empty() {
            self.license_key = tenant.credential.clone();
        }
        if self.home_url.is_empty() {
            self.home_url = if self.site.home_url.is_empty() {
                tenant.site_url.clone()
            } else {
                self.site.home_url.clone()
            };
        }
        if self.site.home_url.is_empty() {
            self.site.home_url = self.home_url.clone();
        }
        self.https = self.home_url.starts_with("https://");
        self.site.https = self.https;

        // A present-but-empty collection is a real zero; a missing one keeps
        // its previous count, which may come from a reported total larger
        // than the transferred page.
        self.counts.posts = collection_count(&self.posts, self.counts.posts);
        self.counts.pages = collection_count(&self.pages, self.counts.pages);
        self.counts.users = collection_count(&self.users, self.counts.users);
        self.counts.plugins = collection_count(&self.plugins, self.counts.plugins);
    }

    /// License key masked for log-safe display.
    pub fn redacted_license_key(&self) -> String {
        let key = &self.license_key;
        if key.len() <= 4 {
            return "****".to_string();
        }
        format!("****{}", &key[key.len() - 4..])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default)]
    pub home_url: String,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub wordpress_version: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounts {
    #[serde(default)]
    pub posts: u64,
    #[serde(default)]
    pub pages: u64,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub plugins: u64,
}

// --- Inventory Records ---
//
// Upstream shapes vary by site version, so each record keeps its unknown
// fields in `extra` rather than dropping them.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- Connections & Streams ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    SslTls,
    Cloudflare,
    AwsS3,
    Competitor,
    Lighthouse,
    Ga4,
    SearchConsole,
    Cms,
    Generic,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::SslTls => write!(f, "SSL/TLS"),
            ConnectionType::Cloudflare => write!(f, "Cloudflare"),
            ConnectionType::AwsS3 => write!(f, "AWS S3"),
            ConnectionType::Competitor => write!(f, "Competitor"),
            ConnectionType::Lighthouse => write!(f, "Lighthouse"),
            ConnectionType::Ga4 => write!(f, "Google Analytics 4"),
            ConnectionType::SearchConsole => write!(f, "Search Console"),
            ConnectionType::Cms => write!(f, "CMS"),
            ConnectionType::Generic => write!(f, "Generic"),
        }
    }
}

/// Produced by the record classifier; never constructed directly by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    pub name: String,
    pub status: String,
    /// Bounded 0..=100.
    pub health_score: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl StreamStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "active" | "enabled" | "connected" => StreamStatus::Active,
            "inactive" | "disabled" | "disconnected" => StreamStatus::Inactive,
            _ => StreamStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: StreamStatus,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub health_score: u8,
    #[serde(default)]
    pub description: String,
}

// --- Activity Logs (auxiliary time-series, external collaborators) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub role: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(default)]
    pub conversations: Vec<ConversationEntry>,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

fn collection_count<T>(items: &Option<Vec<T>>, existing: u64) -> u64 {
    match items.as_deref() {
        Some([]) => 0,
        Some(items) => (items.len() as u64).max(existing),
        None => existing,
    }
}

/// Convert a snake_case or kebab-case key into a human-readable title.
pub fn title_case(key: &str) -> String {
    key.split(|c| c == '_' || c == '-' || c == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Serde helpers ---

/// Absent, null, or non-array values all deserialize to `None`; array items
/// that fail to parse are skipped rather than failing the whole document.
fn lenient_collection<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn collection_or_empty<S, T>(value: &Option<Vec<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    match value {
        Some(items) => items.serialize(serializer),
        None => serializer.collect_seq(std::iter::empty::<&T>()),
    }
}
