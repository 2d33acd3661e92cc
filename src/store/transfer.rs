use super::persistence::{read_json_value, write_json_file};
use super::query::collect_sorted;
use super::{DashboardStore, StoreState};
use crate::errors::{AppError, AppResult};
use crate::models::{DashboardPatch, ExportDocument, ImportMode, ImportSummary, NewDashboard};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

impl DashboardStore {
    /// Writes a portable snapshot. Without a path the file lands in the
    /// export directory as `dashboards_export_<YYYYMMDD_HHMMSS>.json`, stamped
    /// in local time.
    pub fn export(&self, path: Option<&Path>) -> AppResult<PathBuf> {
        let now = self.clock.now();
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self.export_dir.join(export_file_name(now.with_timezone(&Local))),
        };

        let state = self.lock();
        let document = ExportDocument {
            export_timestamp: now.to_rfc3339(),
            total_dashboards: state.dashboards.len(),
            total_lists: state.lists.len(),
            dashboards: collect_sorted(state.dashboards.values()),
            lists: state.lists.iter().cloned().collect(),
        };
        drop(state);

        write_json_file(&target, &document).inspect_err(
            |error| tracing::error!(path = %target.display(), error = %error, "failed to export dashboards"),
        )?;
        tracing::info!(path = %target.display(), dashboards = document.total_dashboards, "exported dashboards");
        Ok(target)
    }

    /// Loads an export file. Unreadable or malformed files fail the whole
    /// import; a bad record only skips that record.
    pub fn import(&self, path: &Path, mode: ImportMode) -> ImportSummary {
        let (records, lists) = match read_import_document(path) {
            Ok(parts) => parts,
            Err(error) => {
                tracing::error!(path = %path.display(), error = %error, "failed to import dashboards");
                return ImportSummary::failed(error.to_string());
            }
        };

        let mut state = self.lock();
        let mut summary = ImportSummary {
            success: true,
            ..ImportSummary::default()
        };

        if mode == ImportMode::Replace {
            state.dashboards.clear();
            state.lists.clear();
        }

        for list_name in lists {
            if state.lists.insert(list_name) {
                summary.imported_lists += 1;
            }
        }

        for record in records {
            self.import_record(&mut state, record, mode, &mut summary);
        }

        self.save(&state);
        tracing::info!(
            imported = summary.imported_dashboards,
            updated = summary.updated_dashboards,
            skipped = summary.skipped_dashboards,
            lists = summary.imported_lists,
            "import completed"
        );
        summary
    }

    fn import_record(&self, state: &mut StoreState, record: Value, mode: ImportMode, summary: &mut ImportSummary) {
        let label = record_label(&record);
        let existing_id = record
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| mode == ImportMode::Merge && state.dashboards.contains_key(*id))
            .map(str::to_string);

        let outcome = match existing_id {
            Some(dashboard_id) => serde_json::from_value::<DashboardPatch>(record)
                .map_err(AppError::from)
                .and_then(|patch| self.apply_update(state, &dashboard_id, patch))
                .map(|_| summary.updated_dashboards += 1),
            None => serde_json::from_value::<NewDashboard>(record)
                .map_err(AppError::from)
                .and_then(|input| self.insert_dashboard(state, input))
                .map(|_| summary.imported_dashboards += 1),
        };

        if let Err(error) = outcome {
            let message = format!("Error importing dashboard {}: {}", label, error);
            tracing::warn!(error = %error, dashboard = %label, "skipped imported dashboard");
            summary.skipped_dashboards += 1;
            summary.errors.push(message);
        }
    }
}

fn export_file_name(now: DateTime<Local>) -> String {
    format!("dashboards_export_{}.json", now.format("%Y%m%d_%H%M%S"))
}

fn read_import_document(path: &Path) -> AppResult<(Vec<Value>, Vec<String>)> {
    let document = read_json_value(path)?;
    let Value::Object(mut root) = document else {
        return Err(AppError::Import("Invalid import file format: expected a JSON object".to_string()));
    };
    let records = match root.remove("dashboards") {
        Some(Value::Array(records)) => records,
        Some(_) => {
            return Err(AppError::Import(
                "Invalid import file format: 'dashboards' must be an array".to_string(),
            ))
        }
        None => {
            return Err(AppError::Import(
                "Invalid import file format: missing 'dashboards' key".to_string(),
            ))
        }
    };
    Ok((records, import_lists(&root)))
}

fn import_lists(root: &Map<String, Value>) -> Vec<String> {
    root.get("lists")
        .and_then(Value::as_array)
        .map(|lists| {
            lists
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|list_name| !list_name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn record_label(record: &Value) -> String {
    record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}
