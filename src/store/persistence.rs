use super::validation::dedupe_lists;
use super::{DashboardStore, StoreState};
use crate::config::backup_path;
use crate::errors::{AppError, AppResult};
use crate::models::{Dashboard, StoreDocument, DEFAULT_STATUS, STORE_FORMAT_VERSION};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

impl DashboardStore {
    /// Writes the whole store to the backing file. Failures are logged and
    /// the previous file is restored from its backup; callers are never told.
    pub(super) fn save(&self, state: &StoreState) {
        let document = StoreDocument {
            dashboards: &state.dashboards,
            lists: state.lists.iter().map(String::as_str).collect(),
            last_updated: self.timestamp(),
            version: STORE_FORMAT_VERSION,
        };
        persist_with_backup(&self.data_file, &document);
    }
}

fn persist_with_backup<T: Serialize>(path: &Path, value: &T) {
    persist_with(path, |target| write_json_file(target, value));
}

fn persist_with<F>(path: &Path, write: F)
where
    F: FnOnce(&Path) -> AppResult<()>,
{
    let backup = backup_path(path);
    if path.exists() {
        if let Err(error) = fs::copy(path, &backup) {
            tracing::warn!(path = %backup.display(), error = %error, "failed to refresh store backup");
        }
    }

    match write(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "saved dashboard store"),
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "failed to save dashboard store");
            restore_from_backup(path, &backup);
        }
    }
}

fn restore_from_backup(path: &Path, backup: &Path) {
    if !backup.exists() {
        return;
    }
    match fs::copy(backup, path) {
        Ok(_) => tracing::info!(path = %path.display(), "restored dashboard store from backup"),
        Err(error) => tracing::error!(path = %path.display(), error = %error, "failed to restore dashboard store from backup"),
    }
}

pub(crate) fn write_json_file<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).map_err(|error| AppError::Io(error.to_string()))
}

pub(crate) fn read_json_value(path: &Path) -> AppResult<Value> {
    let bytes = fs::read(path).map_err(|error| AppError::Io(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| AppError::Import(error.to_string()))
}

/// Loads the backing file. Missing, unreadable or unrecognised files yield an
/// empty store; nothing here is allowed to fail the caller.
pub(super) fn load_state(path: &Path, now: &str) -> StoreState {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no existing dashboard file found, starting empty");
        return StoreState::default();
    }
    match read_json_value(path) {
        Ok(document) => state_from_document(document, now),
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "failed to load dashboard store");
            StoreState::default()
        }
    }
}

fn state_from_document(document: Value, now: &str) -> StoreState {
    let Value::Object(mut root) = document else {
        tracing::error!("unknown dashboard file format");
        return StoreState::default();
    };

    let (records, stored_lists) = match root.remove("dashboards") {
        Some(Value::Object(records)) => (records, root.remove("lists")),
        Some(_) => {
            tracing::error!("unknown dashboard file format");
            return StoreState::default();
        }
        None => {
            tracing::info!("migrating legacy dashboard file");
            (root, None)
        }
    };

    let mut state = StoreState::default();
    for (key, record) in records {
        let Value::Object(mut record) = record else {
            tracing::warn!(dashboard_id = %key, "skipping non-object dashboard record");
            continue;
        };
        migrate_record(&key, &mut record, now);
        match serde_json::from_value::<Dashboard>(Value::Object(record)) {
            Ok(dashboard) => {
                state.register_lists(&dashboard.lists);
                state.dashboards.insert(key, dashboard);
            }
            Err(error) => {
                tracing::warn!(dashboard_id = %key, error = %error, "skipping malformed dashboard record");
            }
        }
    }

    if let Some(Value::Array(lists)) = stored_lists {
        let names = lists
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|list_name| !list_name.is_empty())
            .map(str::to_string);
        state.lists.extend(names);
    }

    tracing::info!(
        dashboards = state.dashboards.len(),
        lists = state.lists.len(),
        "loaded dashboard store"
    );
    state
}

/// Backfills every field a current record must carry. Missing, `null` and
/// wrongly typed values are replaced by defaults; valid values are left
/// alone, so running this twice changes nothing. The map key is
/// authoritative for the id.
pub(crate) fn migrate_record(key: &str, record: &mut Map<String, Value>, now: &str) {
    match record.get("id").and_then(Value::as_str) {
        Some(id) if id == key => {}
        Some(id) => {
            tracing::warn!(dashboard_id = %key, stored_id = %id, "dashboard id did not match its key");
            record.insert("id".to_string(), json!(key));
        }
        None => {
            record.insert("id".to_string(), json!(key));
        }
    }

    let fields: [(&str, Value, fn(&Value) -> bool); 10] = [
        ("name", json!(key), Value::is_string),
        ("url", json!(""), Value::is_string),
        ("created_at", json!(now), Value::is_string),
        ("updated_at", json!(now), Value::is_string),
        ("status", json!(DEFAULT_STATUS), Value::is_string),
        ("selected", json!(false), Value::is_boolean),
        ("description", json!(""), Value::is_string),
        ("last_captured", Value::Null, |value| value.is_null() || value.is_string()),
        ("capture_count", json!(0), Value::is_u64),
        ("metadata", json!({}), Value::is_object),
    ];
    for (field, default, is_valid) in fields {
        match record.get(field).map(is_valid) {
            Some(true) => {}
            Some(false) => {
                tracing::warn!(dashboard_id = %key, field = field, "replacing invalid dashboard field");
                record.insert(field.to_string(), default);
            }
            None => {
                record.insert(field.to_string(), default);
            }
        }
    }

    let lists = match record.get("lists") {
        Some(Value::Array(entries)) => dedupe_lists(
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter(|list_name| !list_name.trim().is_empty())
                .map(str::to_string),
        ),
        Some(other) => {
            tracing::warn!(dashboard_id = %key, found = %other, "replacing invalid dashboard lists");
            Vec::new()
        }
        None => Vec::new(),
    };
    record.insert("lists".to_string(), json!(lists));
}
