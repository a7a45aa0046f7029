use crate::models::{Assignment, Priority};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Earliest due first.
    #[default]
    DueDate,
    /// High before medium before low.
    Priority,
    /// Alphabetical, case-insensitive.
    Subject,
    /// Newest first.
    Created,
}

impl SortKey {
    pub fn next(self) -> SortKey {
        match self {
            SortKey::DueDate => SortKey::Priority,
            SortKey::Priority => SortKey::Subject,
            SortKey::Subject => SortKey::Created,
            SortKey::Created => SortKey::DueDate,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::DueDate => "Due Date",
            SortKey::Priority => "Priority",
            SortKey::Subject => "Subject",
            SortKey::Created => "Created",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewParams {
    pub search_term: String,
    pub subject: Option<String>,
    pub priority: Option<Priority>,
    pub show_completed: bool,
    pub sort_key: SortKey,
}

impl Default for ViewParams {
    fn default() -> Self {
        ViewParams {
            search_term: String::new(),
            subject: None,
            priority: None,
            show_completed: true,
            sort_key: SortKey::DueDate,
        }
    }
}

impl ViewParams {
    /// Resets every filter but keeps the sort order.
    pub fn clear_filters(&mut self) {
        self.search_term.clear();
        self.subject = None;
        self.priority = None;
        self.show_completed = true;
    }

    fn matches(&self, assignment: &Assignment, needle: &str) -> bool {
        let matches_search = needle.is_empty()
            || assignment.title.to_lowercase().contains(needle)
            || assignment.description.to_lowercase().contains(needle);
        let matches_subject = self
            .subject
            .as_deref()
            .map_or(true, |subject| subject.is_empty() || assignment.subject == subject);
        let matches_priority = self
            .priority
            .map_or(true, |priority| assignment.priority == priority);
        let matches_completed = self.show_completed || !assignment.is_completed;

        matches_search && matches_subject && matches_priority && matches_completed
    }
}

/// Filters then stably sorts the collection without touching it.
pub fn derive<'a>(collection: &'a [Assignment], params: &ViewParams) -> Vec<&'a Assignment> {
    let needle = params.search_term.to_lowercase();
    let mut visible: Vec<&Assignment> = collection
        .iter()
        .filter(|assignment| params.matches(assignment, &needle))
        .collect();

    match params.sort_key {
        SortKey::DueDate => visible.sort_by_key(|a| a.due_date),
        SortKey::Priority => visible.sort_by(|a, b| b.priority.cmp(&a.priority)),
        SortKey::Subject => visible.sort_by_cached_key(|a| a.subject.to_lowercase()),
        SortKey::Created => visible.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    visible
}

/// Distinct subjects in the collection, sorted.
pub fn distinct_subjects(collection: &[Assignment]) -> Vec<String> {
    collection
        .iter()
        .map(|assignment| assignment.subject.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionStats {
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
}

impl CompletionStats {
    pub fn of(collection: &[Assignment]) -> CompletionStats {
        let total = collection.len();
        let completed = collection.iter().filter(|a| a.is_completed).count();
        let percentage = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };

        CompletionStats {
            total,
            completed,
            percentage,
        }
    }
}
