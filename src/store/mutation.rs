use super::validation::{dedupe_lists, require_list_name, validate_dashboard, validate_list_names, Candidate};
use super::{DashboardStore, StoreState};
use crate::errors::{AppError, AppResult};
use crate::models::{Dashboard, DashboardPatch, DeleteSummary, NewDashboard, DEFAULT_STATUS};

impl DashboardStore {
    pub fn create_dashboard(&self, input: NewDashboard) -> AppResult<Dashboard> {
        let mut state = self.lock();
        let dashboard = self
            .insert_dashboard(&mut state, input)
            .inspect_err(|error| tracing::error!(error = %error, "invalid dashboard data"))?;
        self.save(&state);
        tracing::info!(dashboard_id = %dashboard.id, name = %dashboard.name, "added dashboard");
        Ok(dashboard)
    }

    pub fn update_dashboard(&self, dashboard_id: &str, patch: DashboardPatch) -> AppResult<Dashboard> {
        let mut state = self.lock();
        let dashboard = self
            .apply_update(&mut state, dashboard_id, patch)
            .inspect_err(|error| tracing::error!(dashboard_id = %dashboard_id, error = %error, "dashboard update rejected"))?;
        self.save(&state);
        tracing::info!(dashboard_id = %dashboard_id, name = %dashboard.name, "updated dashboard");
        Ok(dashboard)
    }

    pub fn delete_dashboard(&self, dashboard_id: &str) -> AppResult<DeleteSummary> {
        self.delete_dashboards(&[dashboard_id])
    }

    /// Removes every known id; unknown ids are reported back in `missing`.
    /// Fails only when nothing at all was removed.
    pub fn delete_dashboards<S: AsRef<str>>(&self, dashboard_ids: &[S]) -> AppResult<DeleteSummary> {
        if dashboard_ids.is_empty() {
            tracing::error!("no dashboard ids provided for deletion");
            return Err(AppError::Validation("No dashboard IDs provided for deletion".to_string()));
        }

        let mut state = self.lock();
        let mut summary = DeleteSummary::default();
        let mut deleted_names = Vec::new();
        for dashboard_id in dashboard_ids {
            let dashboard_id: &str = dashboard_id.as_ref();
            match state.dashboards.remove(dashboard_id) {
                Some(dashboard) => {
                    deleted_names.push(dashboard.name);
                    summary.removed.push(dashboard_id.to_string());
                }
                None => {
                    tracing::warn!(dashboard_id = %dashboard_id, "dashboard not found for deletion");
                    summary.missing.push(dashboard_id.to_string());
                }
            }
        }

        if summary.removed.is_empty() {
            tracing::error!("no valid dashboards found for deletion");
            return Err(AppError::NotFound("No valid dashboards found for deletion".to_string()));
        }

        state.prune_unused_lists();
        self.save(&state);
        tracing::info!(names = %deleted_names.join(", "), "deleted dashboards");
        Ok(summary)
    }

    /// Registers a label no dashboard uses yet. It survives until the next
    /// mutation that prunes unused lists.
    pub fn add_list(&self, list_name: &str) -> AppResult<()> {
        let list_name = require_list_name(list_name)
            .inspect_err(|error| tracing::error!(error = %error, "rejected list"))?;
        let mut state = self.lock();
        if state.lists.contains(list_name) {
            tracing::error!(list = %list_name, "list already exists");
            return Err(AppError::Validation(format!("List already exists: {}", list_name)));
        }
        state.lists.insert(list_name.to_string());
        self.save(&state);
        tracing::info!(list = %list_name, "added list");
        Ok(())
    }

    pub fn rename_list(&self, old_name: &str, new_name: &str) -> AppResult<()> {
        let old_name = require_list_name(old_name)?;
        let new_name = require_list_name(new_name)?;

        let mut state = self.lock();
        if !state.lists.contains(old_name) {
            tracing::error!(list = %old_name, "list not found");
            return Err(AppError::NotFound(format!("List not found: {}", old_name)));
        }
        if new_name != old_name && state.lists.contains(new_name) {
            tracing::error!(list = %new_name, "list already exists");
            return Err(AppError::Validation(format!("List already exists: {}", new_name)));
        }

        let now = self.timestamp();
        for dashboard in state.dashboards.values_mut().filter(|dashboard| dashboard.has_list(old_name)) {
            let renamed: Vec<String> = dashboard
                .lists
                .iter()
                .map(|list_name| if list_name == old_name { new_name.to_string() } else { list_name.clone() })
                .collect();
            dashboard.lists = dedupe_lists(renamed);
            dashboard.updated_at = now.clone();
        }
        state.lists.remove(old_name);
        state.lists.insert(new_name.to_string());

        self.save(&state);
        tracing::info!(from = %old_name, to = %new_name, "renamed list");
        Ok(())
    }

    pub fn delete_list(&self, list_name: &str) -> AppResult<()> {
        let list_name = require_list_name(list_name)?;
        let mut state = self.lock();
        if !state.lists.contains(list_name) {
            tracing::error!(list = %list_name, "list not found");
            return Err(AppError::NotFound(format!("List not found: {}", list_name)));
        }

        let now = self.timestamp();
        for dashboard in state.dashboards.values_mut().filter(|dashboard| dashboard.has_list(list_name)) {
            dashboard.lists.retain(|value| value != list_name);
            dashboard.updated_at = now.clone();
        }
        state.lists.remove(list_name);

        self.save(&state);
        tracing::info!(list = %list_name, "deleted list");
        Ok(())
    }

    /// Status hook for the capture layer. A non-blank `last_captured` counts
    /// as one capture event.
    pub fn update_status(
        &self,
        dashboard_id: &str,
        status: &str,
        last_captured: Option<&str>,
    ) -> AppResult<Dashboard> {
        let mut state = self.lock();
        let now = self.timestamp();
        let Some(dashboard) = state.dashboards.get_mut(dashboard_id) else {
            tracing::debug!(dashboard_id = %dashboard_id, "status update for unknown dashboard");
            return Err(AppError::NotFound(format!("Dashboard not found: {}", dashboard_id)));
        };

        dashboard.status = status.to_string();
        dashboard.updated_at = now;
        if let Some(captured_at) = last_captured.map(str::trim).filter(|value| !value.is_empty()) {
            dashboard.last_captured = Some(captured_at.to_string());
            dashboard.capture_count = dashboard.capture_count.saturating_add(1);
        }
        let updated = dashboard.clone();

        self.save(&state);
        tracing::debug!(dashboard_id = %dashboard_id, status = %status, captures = updated.capture_count, "updated dashboard status");
        Ok(updated)
    }

    /// Validates and stores a new dashboard without persisting.
    pub(super) fn insert_dashboard(&self, state: &mut StoreState, input: NewDashboard) -> AppResult<Dashboard> {
        validate_dashboard(
            state,
            Candidate {
                name: &input.name,
                url: &input.url,
                lists: Some(input.lists.as_slice()),
            },
            None,
        )?;

        let id = match input.id.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            Some(id) if state.dashboards.contains_key(id) => {
                return Err(AppError::Validation(format!("Dashboard id \"{}\" already exists", id)));
            }
            Some(id) => id.to_string(),
            None => self.ids.generate(),
        };

        let now = self.timestamp();
        let created_at = input
            .created_at
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| now.clone());
        let dashboard = Dashboard {
            id: id.clone(),
            name: input.name.trim().to_string(),
            url: input.url.trim().to_string(),
            lists: dedupe_lists(input.lists),
            description: input.description.trim().to_string(),
            selected: false,
            status: DEFAULT_STATUS.to_string(),
            created_at,
            updated_at: now,
            last_captured: None,
            capture_count: 0,
            metadata: input.metadata,
        };

        state.register_lists(&dashboard.lists);
        state.dashboards.insert(id, dashboard.clone());
        Ok(dashboard)
    }

    /// Validates and applies a patch without persisting.
    pub(super) fn apply_update(
        &self,
        state: &mut StoreState,
        dashboard_id: &str,
        patch: DashboardPatch,
    ) -> AppResult<Dashboard> {
        let current = state
            .dashboards
            .get(dashboard_id)
            .ok_or_else(|| AppError::NotFound(format!("Dashboard not found: {}", dashboard_id)))?;

        if let Some(lists) = patch.lists.as_deref() {
            validate_list_names(lists)?;
        }
        if patch.touches_identity() {
            let candidate = Candidate {
                name: patch.name.as_deref().unwrap_or(&current.name),
                url: patch.url.as_deref().unwrap_or(&current.url),
                lists: None,
            };
            validate_dashboard(state, candidate, Some(dashboard_id))?;
        }

        let now = self.timestamp();
        let Some(dashboard) = state.dashboards.get_mut(dashboard_id) else {
            return Err(AppError::NotFound(format!("Dashboard not found: {}", dashboard_id)));
        };
        if let Some(name) = patch.name {
            dashboard.name = name.trim().to_string();
        }
        if let Some(url) = patch.url {
            dashboard.url = url.trim().to_string();
        }
        if let Some(description) = patch.description {
            dashboard.description = description.trim().to_string();
        }
        if let Some(selected) = patch.selected {
            dashboard.selected = selected;
        }
        if let Some(status) = patch.status {
            dashboard.status = status;
        }
        if let Some(last_captured) = patch.last_captured {
            dashboard.last_captured = last_captured;
        }
        if let Some(metadata) = patch.metadata {
            dashboard.metadata = metadata;
        }
        let lists_changed = patch.lists.is_some();
        if let Some(lists) = patch.lists {
            dashboard.lists = dedupe_lists(lists);
        }
        dashboard.updated_at = now;
        let updated = dashboard.clone();

        if lists_changed {
            state.register_lists(&updated.lists);
            state.prune_unused_lists();
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_store;
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn labels(store: &DashboardStore) -> Vec<String> {
        store.all_lists()
    }

    fn referenced_labels(store: &DashboardStore) -> BTreeSet<String> {
        store
            .all_dashboards()
            .into_iter()
            .flat_map(|dashboard| dashboard.lists)
            .collect()
    }

    #[test]
    fn create_applies_defaults_and_trims() {
        let (_dir, store) = temp_store();
        let mut input = NewDashboard::new("  Sales  ", " https://x.example/1 ")
            .with_lists(["Ops", "Ops", "Finance"])
            .with_description("  weekly  ");
        input.metadata.insert("owner".to_string(), json!("ops"));

        let created = store.create_dashboard(input).expect("create");
        assert_eq!(created.id, "dash-1");
        assert_eq!(created.name, "Sales");
        assert_eq!(created.url, "https://x.example/1");
        assert_eq!(created.description, "weekly");
        assert_eq!(created.lists, vec!["Ops", "Finance"]);
        assert_eq!(created.status, "Ready");
        assert!(!created.selected);
        assert_eq!(created.capture_count, 0);
        assert_eq!(created.last_captured, None);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.metadata.get("owner"), Some(&json!("ops")));
        assert_eq!(labels(&store), vec!["Finance", "Ops"]);
        assert!(store.data_file().exists());
    }

    #[test]
    fn create_keeps_caller_supplied_id_and_created_at() {
        let (_dir, store) = temp_store();
        let mut input = NewDashboard::new("A", "http://x/1");
        input.id = Some("custom".to_string());
        input.created_at = Some("2020-05-05T00:00:00+00:00".to_string());
        let created = store.create_dashboard(input).expect("create");
        assert_eq!(created.id, "custom");
        assert_eq!(created.created_at, "2020-05-05T00:00:00+00:00");
        assert_ne!(created.updated_at, created.created_at);

        let mut reused = NewDashboard::new("B", "http://x/2");
        reused.id = Some("custom".to_string());
        let error = store.create_dashboard(reused).expect_err("id in use");
        assert!(error.is_validation());
    }

    #[test]
    fn case_insensitive_name_collision_leaves_store_unchanged() {
        let (_dir, store) = temp_store();
        let a = store.create_dashboard(NewDashboard::new("Sales", "http://x/1")).expect("create A");
        let error = store
            .create_dashboard(NewDashboard::new("sales", "http://x/2"))
            .expect_err("name collision");
        assert!(error.is_validation());

        let all = store.all_dashboards();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], a);
    }

    #[test]
    fn create_rejects_blank_list_entries() {
        let (_dir, store) = temp_store();
        let error = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Ops", "  "]))
            .expect_err("blank list");
        assert!(error.is_validation());
        assert!(store.all_lists().is_empty());
    }

    #[test]
    fn update_revalidates_merged_record_excluding_itself() {
        let (_dir, store) = temp_store();
        let a = store.create_dashboard(NewDashboard::new("Sales", "http://x/1")).expect("create A");
        store.create_dashboard(NewDashboard::new("Ops", "http://x/2")).expect("create B");

        let renamed = store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    name: Some(" SALES ".to_string()),
                    ..DashboardPatch::default()
                },
            )
            .expect("rename to own name with new case");
        assert_eq!(renamed.name, "SALES");

        let error = store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    url: Some("http://x/2".to_string()),
                    ..DashboardPatch::default()
                },
            )
            .expect_err("url collision");
        assert!(error.is_validation());
        assert_eq!(store.get_dashboard(&a.id).expect("a").url, "http://x/1");
    }

    #[test]
    fn update_ignores_immutable_fields() {
        let (_dir, store) = temp_store();
        let a = store.create_dashboard(NewDashboard::new("A", "http://x/1")).expect("create");
        let patch: DashboardPatch = serde_json::from_value(json!({
            "id": "hijack",
            "created_at": "1999-01-01T00:00:00Z",
            "capture_count": 99,
            "status": "Capturing",
            "selected": true
        }))
        .expect("patch");

        let updated = store.update_dashboard(&a.id, patch).expect("update");
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.created_at, a.created_at);
        assert_eq!(updated.capture_count, 0);
        assert_eq!(updated.status, "Capturing");
        assert!(updated.selected);
        assert!(updated.updated_at > a.updated_at);
        assert!(store.get_dashboard("hijack").is_none());
    }

    #[test]
    fn update_of_unknown_id_is_not_found() {
        let (_dir, store) = temp_store();
        let error = store
            .update_dashboard("missing", DashboardPatch::default())
            .expect_err("unknown id");
        assert!(error.is_not_found());
    }

    #[test]
    fn replacing_lists_prunes_the_dropped_label() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Temp"]))
            .expect("create");
        assert_eq!(labels(&store), vec!["Temp"]);

        store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    lists: Some(vec!["Keep".to_string(), "Keep".to_string()]),
                    ..DashboardPatch::default()
                },
            )
            .expect("update lists");
        assert_eq!(labels(&store), vec!["Keep"]);
        assert_eq!(store.get_dashboard(&a.id).expect("a").lists, vec!["Keep"]);
    }

    #[test]
    fn update_rejects_blank_list_names_even_without_identity_change() {
        let (_dir, store) = temp_store();
        let a = store.create_dashboard(NewDashboard::new("A", "http://x/1")).expect("create");
        let error = store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    lists: Some(vec![String::new()]),
                    ..DashboardPatch::default()
                },
            )
            .expect_err("blank list");
        assert!(error.is_validation());
    }

    #[test]
    fn batch_delete_reports_missing_ids() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Solo"]))
            .expect("create A");
        let b = store
            .create_dashboard(NewDashboard::new("B", "http://x/2").with_lists(["Shared"]))
            .expect("create B");

        let empty: [&str; 0] = [];
        assert!(store.delete_dashboards(&empty).expect_err("empty").is_validation());
        assert!(store.delete_dashboards(&["nonexistent"]).expect_err("none found").is_not_found());

        let summary = store
            .delete_dashboards(&[a.id.as_str(), "nonexistent"])
            .expect("partial delete");
        assert_eq!(summary.removed, vec![a.id.clone()]);
        assert_eq!(summary.missing, vec!["nonexistent".to_string()]);
        assert!(store.get_dashboard(&a.id).is_none());
        assert!(store.get_dashboard(&b.id).is_some());
        assert_eq!(labels(&store), vec!["Shared"]);
    }

    #[test]
    fn added_list_lives_until_next_pruning_mutation() {
        let (_dir, store) = temp_store();
        store.add_list("  Later ").expect("add list");
        assert_eq!(labels(&store), vec!["Later"]);
        assert!(store.add_list("Later").expect_err("duplicate").is_validation());
        assert!(store.add_list("   ").expect_err("blank").is_validation());

        let a = store.create_dashboard(NewDashboard::new("A", "http://x/1")).expect("create");
        assert_eq!(labels(&store), vec!["Later"]);

        store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    lists: Some(Vec::new()),
                    ..DashboardPatch::default()
                },
            )
            .expect("update");
        assert!(labels(&store).is_empty());
    }

    #[test]
    fn rename_list_cascades_to_dashboards() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Ops"]))
            .expect("create");

        store.rename_list("Ops", "Operations").expect("rename");
        let renamed = store.get_dashboard(&a.id).expect("a");
        assert_eq!(renamed.lists, vec!["Operations"]);
        assert!(renamed.updated_at > a.updated_at);
        assert_eq!(labels(&store), vec!["Operations"]);
    }

    #[test]
    fn rename_list_rejects_unknown_source_and_taken_target() {
        let (_dir, store) = temp_store();
        store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Ops", "Sales"]))
            .expect("create");

        assert!(store.rename_list("Nope", "X").expect_err("unknown").is_not_found());
        assert!(store.rename_list("Ops", "Sales").expect_err("taken").is_validation());
        assert!(store.rename_list("Ops", " ").expect_err("blank").is_validation());
        store.rename_list("Ops", "Ops").expect("rename onto itself");
        assert_eq!(labels(&store), vec!["Ops", "Sales"]);
    }

    #[test]
    fn delete_list_cascades_to_dashboards() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["Ops", "Sales"]))
            .expect("create");

        store.delete_list("Ops").expect("delete list");
        assert_eq!(store.get_dashboard(&a.id).expect("a").lists, vec!["Sales"]);
        assert_eq!(labels(&store), vec!["Sales"]);
        assert!(store.delete_list("Ops").expect_err("gone").is_not_found());
        assert!(store.delete_list("").expect_err("blank").is_validation());
    }

    #[test]
    fn capture_reports_increment_count_by_one() {
        let (_dir, store) = temp_store();
        let a = store.create_dashboard(NewDashboard::new("A", "http://x/1")).expect("create");

        for expected in 1..=3u64 {
            let updated = store
                .update_status(&a.id, "Captured", Some("2024-02-01T10:00:00Z"))
                .expect("status");
            assert_eq!(updated.capture_count, expected);
        }
        let updated = store.update_status(&a.id, "Ready", None).expect("status");
        assert_eq!(updated.capture_count, 3);
        assert_eq!(updated.status, "Ready");
        assert_eq!(updated.last_captured.as_deref(), Some("2024-02-01T10:00:00Z"));

        let blank = store.update_status(&a.id, "Ready", Some("  ")).expect("status");
        assert_eq!(blank.capture_count, 3);

        assert!(store.update_status("missing", "Ready", None).expect_err("unknown").is_not_found());
    }

    #[test]
    fn padded_labels_are_stored_trimmed_and_stay_manageable() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists([" Ops", "Ops ", "Finance"]))
            .expect("create A");
        assert_eq!(a.lists, vec!["Ops", "Finance"]);

        let updated = store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    lists: Some(vec!["  Weekly  ".to_string(), "Ops".to_string()]),
                    ..DashboardPatch::default()
                },
            )
            .expect("update A");
        assert_eq!(updated.lists, vec!["Weekly", "Ops"]);
        assert_eq!(labels(&store), vec!["Ops", "Weekly"]);

        store.rename_list("Weekly", "Recurring").expect("rename trimmed label");
        store.delete_list("Ops").expect("delete trimmed label");
        let a = store.get_dashboard(&a.id).expect("A");
        assert_eq!(a.lists, vec!["Recurring"]);
        assert_eq!(labels(&store), vec!["Recurring"]);
    }

    #[test]
    fn list_set_tracks_union_of_dashboard_lists() {
        let (_dir, store) = temp_store();
        let a = store
            .create_dashboard(NewDashboard::new("A", "http://x/1").with_lists(["One", "Two"]))
            .expect("create A");
        let b = store
            .create_dashboard(NewDashboard::new("B", "http://x/2").with_lists(["Two", "Three"]))
            .expect("create B");
        store
            .update_dashboard(
                &a.id,
                DashboardPatch {
                    lists: Some(vec!["Four".to_string()]),
                    ..DashboardPatch::default()
                },
            )
            .expect("update A");
        store.delete_dashboard(&b.id).expect("delete B");

        let expected: Vec<String> = referenced_labels(&store).into_iter().collect();
        assert_eq!(labels(&store), expected);
        assert_eq!(expected, vec!["Four"]);
    }
}
