use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_STATUS: &str = "Ready";
pub const STORE_FORMAT_VERSION: &str = "1.0";

/// A named, URL-addressed dashboard tracked by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default = "default_status")]
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub last_captured: Option<String>,
    #[serde(default)]
    pub capture_count: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Dashboard {
    pub fn has_list(&self, list_name: &str) -> bool {
        self.lists.iter().any(|value| value == list_name)
    }
}

/// Payload for creating a dashboard. Unknown keys (for example the
/// bookkeeping fields of an exported record) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct NewDashboard {
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    pub lists: Vec<String>,
    pub description: String,
    pub created_at: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NewDashboard {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_lists<I, S>(mut self, lists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists = lists.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update for a dashboard. `None` leaves a field untouched.
///
/// `id`, `created_at`, `capture_count` and `updated_at` are accepted so an
/// exported record deserializes cleanly, but the store never applies them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DashboardPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub lists: Option<Vec<String>>,
    pub description: Option<String>,
    pub selected: Option<bool>,
    pub status: Option<String>,
    #[serde(deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    pub last_captured: Option<Option<String>>,
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing)]
    pub id: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: Option<String>,
    #[serde(skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(skip_serializing)]
    pub capture_count: Option<u64>,
}

impl DashboardPatch {
    pub fn touches_identity(&self) -> bool {
        self.name.is_some() || self.url.is_some()
    }
}

/// Distinguishes an explicit `null` from an absent key.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListUsage {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListStatistics {
    pub total_lists: usize,
    pub total_dashboards: usize,
    pub list_usage: BTreeMap<String, usize>,
    pub dashboards_without_lists: usize,
    pub most_used_list: Option<ListUsage>,
    pub least_used_list: Option<ListUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeleteSummary {
    pub removed: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMode {
    #[default]
    Merge,
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImportSummary {
    pub success: bool,
    pub imported_dashboards: usize,
    pub updated_dashboards: usize,
    pub skipped_dashboards: usize,
    pub imported_lists: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![reason.into()],
            ..Self::default()
        }
    }
}

/// On-disk shape of the backing store file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreDocument<'a> {
    pub dashboards: &'a BTreeMap<String, Dashboard>,
    pub lists: Vec<&'a str>,
    pub last_updated: String,
    pub version: &'static str,
}

/// Portable snapshot written by export and read back by import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ExportDocument {
    pub export_timestamp: String,
    pub total_dashboards: usize,
    pub total_lists: usize,
    pub dashboards: Vec<Dashboard>,
    pub lists: Vec<String>,
}
