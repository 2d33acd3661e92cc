mod mutation;
mod persistence;
mod query;
mod transfer;
mod validation;

use crate::config::StoreConfig;
use crate::models::Dashboard;
use crate::support::{Clock, IdGenerator, SystemClock, UuidGenerator};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Dashboards keyed by id plus the set of known list labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StoreState {
    pub(crate) dashboards: BTreeMap<String, Dashboard>,
    pub(crate) lists: BTreeSet<String>,
}

impl StoreState {
    pub(crate) fn register_lists<'a, I>(&mut self, lists: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.lists.extend(lists.into_iter().cloned());
    }

    /// Drops every label no dashboard references and returns the dropped ones.
    pub(crate) fn prune_unused_lists(&mut self) -> Vec<String> {
        let used: BTreeSet<&str> = self
            .dashboards
            .values()
            .flat_map(|dashboard| dashboard.lists.iter().map(String::as_str))
            .collect();
        let unused: Vec<String> = self
            .lists
            .iter()
            .filter(|list_name| !used.contains(list_name.as_str()))
            .cloned()
            .collect();
        for list_name in &unused {
            self.lists.remove(list_name);
            tracing::debug!(list = %list_name, "removed unused list");
        }
        unused
    }
}

pub struct DashboardStore {
    state: Mutex<StoreState>,
    data_file: PathBuf,
    export_dir: PathBuf,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for DashboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardStore")
            .field("data_file", &self.data_file)
            .field("export_dir", &self.export_dir)
            .finish_non_exhaustive()
    }
}

impl DashboardStore {
    /// Opens the store described by `config`, loading whatever the backing
    /// file holds. Never fails: unreadable files start an empty store.
    pub fn open(config: &StoreConfig) -> Self {
        Self::open_with(config, Arc::new(SystemClock), Arc::new(UuidGenerator))
    }

    pub fn open_with(config: &StoreConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        let state = persistence::load_state(&config.data_file, &clock.timestamp());
        tracing::info!(
            path = %config.data_file.display(),
            dashboards = state.dashboards.len(),
            lists = state.lists.len(),
            "dashboard store initialized"
        );
        Self {
            state: Mutex::new(state),
            data_file: config.data_file.clone(),
            export_dir: config.export_dir.clone(),
            clock,
            ids,
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    // Every step leaves the state consistent, so a poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timestamp(&self) -> String {
        self.clock.timestamp()
    }
}
