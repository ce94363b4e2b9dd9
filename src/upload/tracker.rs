//! In-flight upload tracking.
//!
//! One outstanding upload task per bundle name: the previous upload is
//! aborted before its replacement is spawned, so a stale build can never
//! land after a newer one and two uploads for one name are never live at
//! once. Entries are only touched from the driver loop, so the table is
//! plain instance state with no locking.

use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Bundle name → currently outstanding upload task.
#[derive(Debug, Default)]
pub struct InflightUploads {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl InflightUploads {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Abort and remove the outstanding upload for `name`.
    ///
    /// Returns the aborted handle when a live task was cancelled so the
    /// caller can log (or await) the supersession; an entry that already
    /// finished, or no entry at all, yields `None`.
    pub fn abort(&mut self, name: &str) -> Option<JoinHandle<()>> {
        match self.tasks.remove(name) {
            Some(old) if !old.is_finished() => {
                old.abort();
                Some(old)
            }
            _ => None,
        }
    }

    /// Install `handle` as the outstanding upload for `name`. Any previous
    /// upload for the name must have been aborted first.
    pub fn track(&mut self, name: &str, handle: JoinHandle<()>) {
        self.tasks.insert(name.to_string(), handle);
    }

    /// Is an upload for this name still running?
    pub fn is_inflight(&self, name: &str) -> bool {
        self.tasks
            .get(name)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of uploads still running.
    pub fn active_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Take every tracked task that has not finished yet, clearing the table.
    pub fn drain(&mut self) -> Vec<JoinHandle<()>> {
        self.tasks
            .drain()
            .filter_map(|(_, handle)| (!handle.is_finished()).then_some(handle))
            .collect()
    }
}
