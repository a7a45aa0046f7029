use crate::models::{Assignment, AssignmentDraft, AssignmentPatch};
use crate::storage::{KeyValueStore, StorageError};
use crate::view::{self, CompletionStats, ViewParams};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Slot key the collection is stored under.
pub const STORAGE_KEY: &str = "homework-tracker-data";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no assignment with id '{0}'")]
    NotFound(String),
    #[error("stored assignments could not be parsed: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("assignments could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Clock = fn() -> DateTime<Utc>;

// Assignment collection, rewritten to its slot after every change
pub struct AssignmentStore<S> {
    storage: S,
    assignments: Vec<Assignment>,
    clock: Clock,
}

impl<S: KeyValueStore> AssignmentStore<S> {
    /// Loads the collection from `storage`, starting empty if the slot is
    /// missing or unreadable.
    pub fn hydrate(storage: S) -> Self {
        Self::hydrate_with_clock(storage, Utc::now)
    }

    pub fn hydrate_with_clock(storage: S, clock: Clock) -> Self {
        let assignments = match read_slot(&storage) {
            Ok(assignments) => dedupe_ids(assignments),
            Err(err) => {
                warn!(error = %err, "could not load saved assignments, starting empty");
                Vec::new()
            }
        };
        info!(count = assignments.len(), "assignments loaded");

        AssignmentStore {
            storage,
            assignments,
            clock,
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn get(&self, id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub fn visible(&self, params: &ViewParams) -> Vec<&Assignment> {
        view::derive(&self.assignments, params)
    }

    pub fn subjects(&self) -> Vec<String> {
        view::distinct_subjects(&self.assignments)
    }

    pub fn completion_stats(&self) -> CompletionStats {
        CompletionStats::of(&self.assignments)
    }

    pub fn create(&mut self, draft: AssignmentDraft) -> Result<&Assignment, StoreError> {
        let assignment = Assignment {
            id: self.fresh_id(),
            title: draft.title,
            subject: draft.subject,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            is_completed: false,
            created_at: (self.clock)(),
        };
        debug!(id = %assignment.id, title = %assignment.title, "creating assignment");

        let index = self.assignments.len();
        self.assignments.push(assignment);
        self.persist()?;
        Ok(&self.assignments[index])
    }

    /// Merges `patch` into the assignment with `id`.
    ///
    /// Unlike `delete` and `toggle_complete`, an unknown id is reported as
    /// `StoreError::NotFound`. Nothing is written in that case.
    pub fn update(&mut self, id: &str, patch: AssignmentPatch) -> Result<&Assignment, StoreError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        debug!(id, ?patch, "updating assignment");

        self.assignments[index].apply(patch);
        self.persist()?;
        Ok(&self.assignments[index])
    }

    /// Removes the assignment with `id`, returning it. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> Result<Option<Assignment>, StoreError> {
        let Some(index) = self.index_of(id) else {
            debug!(id, "delete of unknown assignment ignored");
            return Ok(None);
        };

        let removed = self.assignments.remove(index);
        debug!(id, title = %removed.title, "deleted assignment");
        self.persist()?;
        Ok(Some(removed))
    }

    /// Flips completion on the assignment with `id`. Unknown ids are a no-op.
    pub fn toggle_complete(&mut self, id: &str) -> Result<Option<&Assignment>, StoreError> {
        let Some(current) = self.get(id).map(|a| a.is_completed) else {
            debug!(id, "toggle of unknown assignment ignored");
            return Ok(None);
        };
        self.update(id, AssignmentPatch::completed(!current))
            .map(Some)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.assignments.iter().position(|a| a.id == id)
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.index_of(&id).is_none() {
                return id;
            }
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&self.assignments).map_err(StoreError::Encode)?;
        self.storage.set(STORAGE_KEY, &payload)?;
        debug!(count = self.assignments.len(), "assignments saved");
        Ok(())
    }
}

fn read_slot<S: KeyValueStore>(storage: &S) -> Result<Vec<Assignment>, StoreError> {
    let records: Vec<serde_json::Value> = match storage.get(STORAGE_KEY)? {
        Some(payload) if !payload.trim().is_empty() => {
            serde_json::from_str(&payload).map_err(StoreError::Corrupt)?
        }
        _ => return Ok(Vec::new()),
    };

    // A record that does not decode is skipped; the rest still load.
    Ok(records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(assignment) => Some(assignment),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable saved assignment");
                None
            }
        })
        .collect())
}

fn dedupe_ids(assignments: Vec<Assignment>) -> Vec<Assignment> {
    let mut seen = HashSet::new();
    assignments
        .into_iter()
        .filter(|assignment| {
            let first = seen.insert(assignment.id.clone());
            if !first {
                warn!(id = %assignment.id, "dropping saved assignment with duplicate id");
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn draft(title: &str, subject: &str, due_in_days: i64, priority: Priority) -> AssignmentDraft {
        AssignmentDraft {
            title: title.to_string(),
            subject: subject.to_string(),
            description: format!("{} notes", title),
            due_date: fixed_now() + Duration::days(due_in_days),
            priority,
        }
    }

    fn store(slots: &mut MemoryStore) -> AssignmentStore<&mut MemoryStore> {
        AssignmentStore::hydrate_with_clock(slots, fixed_now)
    }

    #[test]
    fn test_create_assigns_id_timestamp_and_appends() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);

        let essay_id = store
            .create(draft("Essay", "English", 1, Priority::High))
            .unwrap()
            .id
            .clone();
        let lab = store
            .create(draft("Lab", "Science", -1, Priority::Low))
            .unwrap()
            .clone();

        assert_ne!(essay_id, lab.id);
        assert!(!lab.is_completed);
        assert_eq!(lab.created_at, fixed_now());
        let titles: Vec<&str> = store.assignments().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Essay", "Lab"]);

        drop(store);
        assert_eq!(slots.writes, 2);
    }

    #[test]
    fn test_round_trip_through_slot() {
        let mut slots = MemoryStore::default();
        let original = {
            let mut store = store(&mut slots);
            store.create(draft("Essay", "English", 1, Priority::High)).unwrap();
            let id = store
                .create(draft("Lab", "Science", -1, Priority::Low))
                .unwrap()
                .id
                .clone();
            store.toggle_complete(&id).unwrap();
            store.assignments().to_vec()
        };

        let reloaded = AssignmentStore::hydrate(&mut slots);
        assert_eq!(reloaded.assignments(), original.as_slice());
    }

    #[test]
    fn test_hydrate_reads_browser_style_payload() {
        let payload = r#"[{"id":"5f1c","title":"Essay","subject":"English","description":"",
            "dueDate":"2026-10-20T17:00:00.000Z","priority":"high","isCompleted":true,
            "createdAt":"2026-10-01T09:15:30.250Z"}]"#;
        let store = AssignmentStore::hydrate(MemoryStore::with_slot(STORAGE_KEY, payload));

        let essay = store.get("5f1c").unwrap();
        assert!(essay.is_completed);
        assert_eq!(
            essay.due_date,
            Utc.with_ymd_and_hms(2026, 10, 20, 17, 0, 0).unwrap()
        );
        assert_eq!(essay.created_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_hydrate_falls_back_to_empty() {
        for payload in ["{not json", "", "   ", r#"[{"id":1}]"#] {
            let store = AssignmentStore::hydrate(MemoryStore::with_slot(STORAGE_KEY, payload));
            assert!(store.assignments().is_empty(), "payload {:?}", payload);
        }

        let store = AssignmentStore::hydrate(MemoryStore::default());
        assert!(store.assignments().is_empty());
    }

    #[test]
    fn test_hydrate_keeps_records_around_an_unreadable_one() {
        let payload = r#"[
            {"id":"a1","title":"Essay","subject":"English","dueDate":"2026-10-20T17:00:00.000Z",
             "priority":"high","createdAt":"2026-10-01T09:00:00.000Z"},
            {"id":"b2","title":"Lab","subject":"Science","dueDate":"2026-10-21T17:00:00.000Z",
             "priority":"urgent","createdAt":"2026-10-01T09:00:00.000Z"},
            {"id":"c3","title":"Proofs","subject":"Math","dueDate":"not a date",
             "priority":"low","createdAt":"2026-10-01T09:00:00.000Z"}
        ]"#;
        let mut slots = MemoryStore::with_slot(STORAGE_KEY, payload);
        let mut store = store(&mut slots);

        let titles: Vec<&str> = store.assignments().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Essay"]);

        store.create(draft("New", "Other", 1, Priority::Low)).unwrap();
        drop(store);

        let reloaded = AssignmentStore::hydrate(&mut slots);
        let titles: Vec<&str> = reloaded.assignments().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Essay", "New"]);
    }

    #[test]
    fn test_hydrate_does_not_write() {
        let mut slots = MemoryStore::with_slot(STORAGE_KEY, "{corrupt");
        let _ = store(&mut slots);
        assert_eq!(slots.writes, 0);
        assert_eq!(slots.get(STORAGE_KEY).unwrap().as_deref(), Some("{corrupt"));
    }

    #[test]
    fn test_hydrate_drops_duplicate_ids() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);
        let essay = store
            .create(draft("Essay", "English", 1, Priority::High))
            .unwrap()
            .clone();
        drop(store);

        let mut copy = essay.clone();
        copy.title = "Essay copy".to_string();
        let payload = serde_json::to_string(&vec![essay, copy]).unwrap();

        let store = AssignmentStore::hydrate(MemoryStore::with_slot(STORAGE_KEY, &payload));
        assert_eq!(store.assignments().len(), 1);
        assert_eq!(store.assignments()[0].title, "Essay");
    }

    #[test]
    fn test_update_merges_and_keeps_identity() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);
        let created = store
            .create(draft("Essay", "English", 1, Priority::High))
            .unwrap()
            .clone();

        let updated = store
            .update(
                &created.id,
                AssignmentPatch {
                    subject: Some("Literature".to_string()),
                    priority: Some(Priority::Medium),
                    ..Default::default()
                },
            )
            .unwrap()
            .clone();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.title, "Essay");
        assert_eq!(updated.subject, "Literature");
        assert_eq!(updated.priority, Priority::Medium);

        drop(store);
        assert_eq!(slots.writes, 2);
    }

    #[test]
    fn test_update_unknown_id_is_not_found_and_writes_nothing() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);

        let result = store.update("missing", AssignmentPatch::completed(true));
        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "missing"));

        drop(store);
        assert_eq!(slots.writes, 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);
        let id = store
            .create(draft("Essay", "English", 1, Priority::High))
            .unwrap()
            .id
            .clone();
        store.create(draft("Lab", "Science", 2, Priority::Low)).unwrap();

        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.map(|a| a.title), Some("Essay".to_string()));
        let after_first = store.assignments().to_vec();

        assert!(store.delete(&id).unwrap().is_none());
        assert_eq!(store.assignments(), after_first.as_slice());
        assert_eq!(store.assignments().len(), 1);

        drop(store);
        // Two creates and one effective delete.
        assert_eq!(slots.writes, 3);
    }

    #[test]
    fn test_toggle_complete_twice_restores_state() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);
        let id = store
            .create(draft("Essay", "English", 1, Priority::High))
            .unwrap()
            .id
            .clone();

        assert!(store.toggle_complete(&id).unwrap().unwrap().is_completed);
        assert!(!store.toggle_complete(&id).unwrap().unwrap().is_completed);
        assert!(store.toggle_complete("missing").unwrap().is_none());
    }

    #[test]
    fn test_queries_delegate_to_view() {
        let mut slots = MemoryStore::default();
        let mut store = store(&mut slots);
        store.create(draft("Essay", "English", 1, Priority::High)).unwrap();
        let lab = store
            .create(draft("Lab", "Science", -1, Priority::Low))
            .unwrap()
            .id
            .clone();
        store.create(draft("Proofs", "Math", 4, Priority::Medium)).unwrap();
        store.toggle_complete(&lab).unwrap();

        let stats = store.completion_stats();
        assert_eq!((stats.total, stats.completed, stats.percentage), (3, 1, 33));
        assert_eq!(store.subjects(), vec!["English", "Math", "Science"]);

        let params = ViewParams {
            show_completed: false,
            ..Default::default()
        };
        let titles: Vec<&str> = store
            .visible(&params)
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Essay", "Proofs"]);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    #[test]
    fn test_write_failure_is_reported_but_mutation_stands() {
        let mut store = AssignmentStore::hydrate_with_clock(ReadOnlyStore, fixed_now);
        let result = store.create(draft("Essay", "English", 1, Priority::High));
        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(store.assignments().len(), 1);
    }
}
