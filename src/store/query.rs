use super::{DashboardStore, StoreState};
use crate::models::{Dashboard, ListStatistics, ListUsage};
use std::collections::BTreeMap;

impl DashboardStore {
    pub fn get_dashboard(&self, dashboard_id: &str) -> Option<Dashboard> {
        self.lock().dashboards.get(dashboard_id).cloned()
    }

    /// Every dashboard, oldest first.
    pub fn all_dashboards(&self) -> Vec<Dashboard> {
        let state = self.lock();
        collect_sorted(state.dashboards.values())
    }

    /// Found dashboards in request order; unknown ids are skipped.
    pub fn dashboards_by_ids<S: AsRef<str>>(&self, dashboard_ids: &[S]) -> Vec<Dashboard> {
        let state = self.lock();
        let mut found = Vec::with_capacity(dashboard_ids.len());
        for dashboard_id in dashboard_ids {
            let dashboard_id: &str = dashboard_id.as_ref();
            match state.dashboards.get(dashboard_id) {
                Some(dashboard) => found.push(dashboard.clone()),
                None => tracing::warn!(dashboard_id = %dashboard_id, "dashboard not found"),
            }
        }
        found
    }

    pub fn dashboards_in_list(&self, list_name: &str) -> Vec<Dashboard> {
        let state = self.lock();
        collect_sorted(state.dashboards.values().filter(|dashboard| dashboard.has_list(list_name)))
    }

    /// Case-insensitive substring search over name, url, description and
    /// list labels. A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<Dashboard> {
        let needle = query.trim().to_lowercase();
        let state = self.lock();
        if needle.is_empty() {
            return collect_sorted(state.dashboards.values());
        }
        collect_sorted(state.dashboards.values().filter(|dashboard| matches_query(dashboard, &needle)))
    }

    pub fn all_lists(&self) -> Vec<String> {
        self.lock().lists.iter().cloned().collect()
    }

    pub fn list_statistics(&self) -> ListStatistics {
        statistics(&self.lock())
    }
}

fn matches_query(dashboard: &Dashboard, needle: &str) -> bool {
    dashboard.name.to_lowercase().contains(needle)
        || dashboard.url.to_lowercase().contains(needle)
        || dashboard.description.to_lowercase().contains(needle)
        || dashboard
            .lists
            .iter()
            .any(|list_name| list_name.to_lowercase().contains(needle))
}

pub(super) fn collect_sorted<'a, I>(dashboards: I) -> Vec<Dashboard>
where
    I: Iterator<Item = &'a Dashboard>,
{
    let mut out: Vec<Dashboard> = dashboards.cloned().collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Usage counts per known label. Ties for most/least used go to the
/// lexicographically first label.
fn statistics(state: &StoreState) -> ListStatistics {
    let mut list_usage: BTreeMap<String, usize> =
        state.lists.iter().map(|list_name| (list_name.clone(), 0)).collect();
    let mut dashboards_without_lists = 0;
    for dashboard in state.dashboards.values() {
        if dashboard.lists.is_empty() {
            dashboards_without_lists += 1;
            continue;
        }
        for list_name in &dashboard.lists {
            if let Some(count) = list_usage.get_mut(list_name) {
                *count += 1;
            }
        }
    }

    let mut most_used: Option<(&String, usize)> = None;
    let mut least_used: Option<(&String, usize)> = None;
    for (list_name, &count) in &list_usage {
        if most_used.map_or(true, |(_, best)| count > best) {
            most_used = Some((list_name, count));
        }
        if least_used.map_or(true, |(_, best)| count < best) {
            least_used = Some((list_name, count));
        }
    }
    let to_usage = |entry: Option<(&String, usize)>| {
        entry.map(|(name, count)| ListUsage {
            name: name.clone(),
            count,
        })
    };

    ListStatistics {
        total_lists: state.lists.len(),
        total_dashboards: state.dashboards.len(),
        most_used_list: to_usage(most_used),
        least_used_list: to_usage(least_used),
        list_usage,
        dashboards_without_lists,
    }
}
