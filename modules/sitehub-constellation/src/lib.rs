//! Renders a canonical profile into a deterministic node/edge graph for the
//! dashboard visualization.
//!
//! Ten fixed categories, each guaranteed at least one node so the chart
//! never shows an empty region. Node values are bounded intensity scores,
//! clamped to [1,10]; the floor keeps every node visible. The scoring is a
//! visualization aid, not a measurement.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sitehub_common::{title_case, ActivityLog, Profile};

pub const MIN_VALUE: u8 = 1;
pub const MAX_VALUE: u8 = 10;
const PLACEHOLDER_VALUE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationNode {
    pub id: String,
    pub label: String,
    pub color: String,
    pub value: u8,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationCategory {
    pub slug: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub nodes: Vec<ConstellationNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationClient {
    pub categories: Vec<ConstellationCategory>,
}

struct CategorySpec {
    slug: &'static str,
    name: &'static str,
    color: &'static str,
    icon: &'static str,
    /// Why the placeholder node exists when there is no real data.
    empty_detail: &'static str,
}

const CATEGORIES: [CategorySpec; 10] = [
    CategorySpec {
        slug: "identity",
        name: "Identity",
        color: "#f59e0b",
        icon: "id-badge",
        empty_detail: "No site identity resolved yet",
    },
    CategorySpec {
        slug: "infrastructure",
        name: "Infrastructure",
        color: "#64748b",
        icon: "server",
        empty_detail: "No system snapshot received yet",
    },
    CategorySpec {
        slug: "security",
        name: "Security",
        color: "#ef4444",
        icon: "shield",
        empty_detail: "No security posture reported yet",
    },
    CategorySpec {
        slug: "content",
        name: "Content",
        color: "#3b82f6",
        icon: "file-text",
        empty_detail: "No content inventory synced yet",
    },
    CategorySpec {
        slug: "plugins",
        name: "Plugins",
        color: "#8b5cf6",
        icon: "plug",
        empty_detail: "No plugin inventory synced yet",
    },
    CategorySpec {
        slug: "themes",
        name: "Themes",
        color: "#ec4899",
        icon: "palette",
        empty_detail: "No theme inventory synced yet",
    },
    CategorySpec {
        slug: "users",
        name: "Users",
        color: "#10b981",
        icon: "users",
        empty_detail: "No user inventory synced yet",
    },
    CategorySpec {
        slug: "conversations",
        name: "Conversations",
        color: "#06b6d4",
        icon: "message-circle",
        empty_detail: "No assistant conversations recorded yet",
    },
    CategorySpec {
        slug: "sessions",
        name: "Sessions",
        color: "#a3e635",
        icon: "clock",
        empty_detail: "No sessions recorded yet",
    },
    CategorySpec {
        slug: "integrations",
        name: "Integrations",
        color: "#f97316",
        icon: "link",
        empty_detail: "No connections or data streams discovered yet",
    },
];

/// Render the profile and the auxiliary activity logs into the
/// visualization payload. Always exactly ten categories, every category
/// non-empty, every node value in [1,10].
pub fn render(profile: &Profile, activity: &ActivityLog) -> ConstellationClient {
    let categories = CATEGORIES
        .iter()
        .map(|spec| {
            let mut nodes = match spec.slug {
                "identity" => identity_nodes(profile),
                "infrastructure" => infrastructure_nodes(profile),
                "security" => flatten_security(&profile.security),
                "content" => content_nodes(profile),
                "plugins" => plugin_nodes(profile),
                "themes" => theme_nodes(profile),
                "users" => user_nodes(profile),
                "conversations" => conversation_nodes(activity),
                "sessions" => session_nodes(activity),
                "integrations" => integration_nodes(profile),
                _ => unreachable!("unknown category slug"),
            };

            if nodes.is_empty() {
                nodes.push(placeholder(spec));
            }
            for node in &mut nodes {
                node.value = node.value.clamp(MIN_VALUE, MAX_VALUE);
                node.color = spec.color.to_string();
            }

            ConstellationCategory {
                slug: spec.slug.to_string(),
                name: spec.name.to_string(),
                color: spec.color.to_string(),
                icon: spec.icon.to_string(),
                nodes,
            }
        })
        .collect();

    ConstellationClient { categories }
}

fn placeholder(spec: &CategorySpec) -> ConstellationNode {
    node(
        format!("{}:placeholder", spec.slug),
        "No data yet".to_string(),
        PLACEHOLDER_VALUE,
        spec.empty_detail.to_string(),
    )
}

fn node(id: String, label: String, value: u8, detail: String) -> ConstellationNode {
    ConstellationNode {
        id,
        label,
        color: String::new(), // Assigned from the category at render time.
        value,
        detail,
    }
}

// --- Category extractors ---

fn identity_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();

    if !profile.home_url.is_empty() {
        let scheme = if profile.https { "HTTPS" } else { "HTTP" };
        nodes.push(node(
            "identity:site".to_string(),
            "Site".to_string(),
            if profile.https { 7 } else { 4 },
            format!("{} ({scheme})", profile.home_url),
        ));
    }
    if !profile.license_key.is_empty() {
        nodes.push(node(
            "identity:license".to_string(),
            "License".to_string(),
            5,
            profile.redacted_license_key(),
        ));
    }

    nodes
}

fn infrastructure_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();

    if let Some(version) = &profile.site.wordpress_version {
        nodes.push(node(
            "infrastructure:core".to_string(),
            "WordPress Core".to_string(),
            6,
            format!("Version {version}"),
        ));
    }

    let inventory_total = profile.counts.posts
        + profile.counts.pages
        + profile.counts.plugins
        + profile.counts.users;
    if inventory_total > 0 {
        nodes.push(node(
            "infrastructure:inventory".to_string(),
            "Inventory".to_string(),
            count_value(inventory_total),
            format!(
                "{} posts, {} pages, {} plugins, {} users",
                profile.counts.posts,
                profile.counts.pages,
                profile.counts.plugins,
                profile.counts.users
            ),
        ));
    }

    nodes
}

fn content_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();

    if profile.counts.posts > 0 {
        nodes.push(node(
            "content:posts".to_string(),
            "Posts".to_string(),
            count_value(profile.counts.posts),
            format!("{} posts", profile.counts.posts),
        ));
    }
    if profile.counts.pages > 0 {
        nodes.push(node(
            "content:pages".to_string(),
            "Pages".to_string(),
            count_value(profile.counts.pages),
            format!("{} pages", profile.counts.pages),
        ));
    }

    nodes
}

fn plugin_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    profile
        .plugins()
        .iter()
        .enumerate()
        .map(|(i, plugin)| {
            let name = plugin
                .name
                .clone()
                .unwrap_or_else(|| format!("Plugin {}", i + 1));
            let value = match plugin.active {
                Some(true) => 7,
                Some(false) => 3,
                None => 5,
            };
            let detail = match &plugin.version {
                Some(version) => format!("Version {version}"),
                None => "Version unknown".to_string(),
            };
            node(format!("plugins:{}", slug(&name)), name, value, detail)
        })
        .collect()
}

fn theme_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    profile
        .themes()
        .iter()
        .enumerate()
        .map(|(i, theme)| {
            let name = theme
                .name
                .clone()
                .unwrap_or_else(|| format!("Theme {}", i + 1));
            let value = if theme.active == Some(true) { 7 } else { 4 };
            let detail = match (&theme.version, theme.active) {
                (Some(version), Some(true)) => format!("Active, version {version}"),
                (Some(version), _) => format!("Installed, version {version}"),
                (None, Some(true)) => "Active".to_string(),
                (None, _) => "Installed".to_string(),
            };
            node(format!("themes:{}", slug(&name)), name, value, detail)
        })
        .collect()
}

fn user_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();

    if profile.counts.users > 0 {
        nodes.push(node(
            "users:total".to_string(),
            "Users".to_string(),
            count_value(profile.counts.users),
            format!("{} users", profile.counts.users),
        ));
    }

    // Role histogram; BTreeMap keeps node order deterministic.
    let mut roles = std::collections::BTreeMap::new();
    for user in profile.users() {
        for role in &user.roles {
            *roles.entry(role.clone()).or_insert(0u64) += 1;
        }
    }
    for (role, count) in roles {
        nodes.push(node(
            format!("users:role:{}", slug(&role)),
            title_case(&role),
            count_value(count + 2),
            format!("{count} with this role"),
        ));
    }

    nodes
}

fn conversation_nodes(activity: &ActivityLog) -> Vec<ConstellationNode> {
    let total = activity.conversations.len();
    if total == 0 {
        return Vec::new();
    }

    let week_ago = chrono::Utc::now() - chrono::Duration::days(7);
    let recent = activity
        .conversations
        .iter()
        .filter(|entry| entry.timestamp > week_ago)
        .count();

    let mut nodes = vec![node(
        "conversations:total".to_string(),
        "Messages".to_string(),
        count_value(total as u64),
        format!("{total} messages exchanged"),
    )];
    if recent > 0 {
        nodes.push(node(
            "conversations:recent".to_string(),
            "This Week".to_string(),
            count_value(recent as u64 + 2),
            format!("{recent} messages in the last 7 days"),
        ));
    }

    nodes
}

fn session_nodes(activity: &ActivityLog) -> Vec<ConstellationNode> {
    let total = activity.sessions.len();
    if total == 0 {
        return Vec::new();
    }

    let mut nodes = vec![node(
        "sessions:total".to_string(),
        "Sessions".to_string(),
        count_value(total as u64),
        format!("{total} sessions"),
    )];

    let durations: Vec<i64> = activity
        .sessions
        .iter()
        .filter_map(|s| s.ended_at.map(|end| (end - s.started_at).num_minutes()))
        .filter(|mins| *mins >= 0)
        .collect();
    if !durations.is_empty() {
        let avg = durations.iter().sum::<i64>() / durations.len() as i64;
        nodes.push(node(
            "sessions:duration".to_string(),
            "Avg Duration".to_string(),
            5,
            format!("{avg} minutes on average"),
        ));
    }

    nodes
}

fn integration_nodes(profile: &Profile) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();

    for conn in &profile.connections {
        nodes.push(node(
            format!("integrations:{}:{}", slug(&conn.kind.to_string()), slug(&conn.name)),
            conn.name.clone(),
            (conn.health_score / 10).max(MIN_VALUE),
            format!("{}, {}", conn.kind, conn.status),
        ));
    }
    for stream in &profile.streams {
        nodes.push(node(
            format!("integrations:stream:{}", slug(&stream.id)),
            stream.name.clone(),
            (stream.health_score / 10).max(MIN_VALUE),
            format!("{:?} stream", stream.status).to_lowercase(),
        ));
    }

    nodes
}

// --- Security flattening ---

/// Flatten the free-form security object into leaf nodes. Path segments are
/// title-cased into the label; booleans score 7/3, numbers |v|+3 capped at
/// 10, strings 4 with the literal text as detail.
fn flatten_security(security: &Map<String, Value>) -> Vec<ConstellationNode> {
    let mut nodes = Vec::new();
    let mut path = Vec::new();
    walk_security(security, &mut path, &mut nodes);
    nodes
}

fn walk_security(
    map: &Map<String, Value>,
    path: &mut Vec<String>,
    nodes: &mut Vec<ConstellationNode>,
) {
    for (key, value) in map {
        path.push(key.clone());
        match value {
            Value::Object(inner) => walk_security(inner, path, nodes),
            Value::Bool(flag) => {
                let detail = if *flag { "enabled" } else { "disabled" };
                push_leaf(nodes, path, if *flag { 7 } else { 3 }, detail.to_string());
            }
            Value::Number(num) => {
                let scored = (num.as_f64().unwrap_or(0.0).abs() + 3.0).min(10.0) as u8;
                push_leaf(nodes, path, scored, num.to_string());
            }
            Value::String(text) if !text.is_empty() => {
                push_leaf(nodes, path, 4, text.clone());
            }
            Value::Array(items) => {
                let detail = items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if !detail.is_empty() {
                    push_leaf(nodes, path, 4, detail);
                }
            }
            _ => {}
        }
        path.pop();
    }
}

fn push_leaf(nodes: &mut Vec<ConstellationNode>, path: &[String], value: u8, detail: String) {
    let label = path
        .iter()
        .map(|segment| title_case(segment))
        .collect::<Vec<_>>()
        .join(" ");
    nodes.push(node(
        format!("security:{}", path.join(".")),
        label,
        value,
        detail,
    ));
}

// --- Helpers ---

fn count_value(n: u64) -> u8 {
    (1 + n / 5).min(MAX_VALUE as u64) as u8
}

fn slug(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
