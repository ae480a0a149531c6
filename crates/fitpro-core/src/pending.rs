//! Course ids whose add request the server queued instead of completing.
//!
//! When `POST /users/me/courses` answers 500 the backend has usually queued
//! the add and the course shows up in the profile a little later. The id is
//! remembered here so the UI can show it as selected in the meantime. Ids are
//! pruned as soon as the server lists them in `selectedCourses`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::storage::KeyValueStore;

/// Key under which the pending set is stored (JSON array of ids)
pub const PENDING_KEY: &str = "pendingCourses";

#[derive(Clone)]
pub struct PendingCourses {
    store: Arc<dyn KeyValueStore>,
}

impl PendingCourses {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current pending ids. An unreadable entry counts as empty.
    pub fn ids(&self) -> BTreeSet<String> {
        let Some(raw) = self.store.get(PENDING_KEY) else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable pending course list");
                BTreeSet::new()
            }
        }
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.ids().contains(course_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    pub fn add(&self, course_id: &str) {
        let mut ids = self.ids();
        if ids.insert(course_id.to_string()) {
            debug!(course_id, "Course queued as pending");
            self.write(&ids);
        }
    }

    pub fn remove(&self, course_id: &str) {
        let mut ids = self.ids();
        if ids.remove(course_id) {
            self.write(&ids);
        }
    }

    /// Drop every id the server has confirmed. Returns the ids removed.
    pub fn prune<'a, I>(&self, confirmed: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut ids = self.ids();
        if ids.is_empty() {
            return Vec::new();
        }

        let removed: Vec<String> = confirmed
            .into_iter()
            .filter(|id| ids.remove(id.as_str()))
            .cloned()
            .collect();

        if !removed.is_empty() {
            debug!(?removed, "Pruned confirmed courses from pending set");
            self.write(&ids);
        }
        removed
    }

    pub fn clear(&self) {
        self.store.remove(PENDING_KEY);
    }

    fn write(&self, ids: &BTreeSet<String>) {
        if ids.is_empty() {
            self.store.remove(PENDING_KEY);
            return;
        }
        match serde_json::to_string(ids) {
            Ok(json) => self.store.set(PENDING_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize pending course list"),
        }
    }
}
