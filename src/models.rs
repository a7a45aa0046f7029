use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Priority, ordered Low < Medium < High
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Priority::Low),
            "medium" | "med" | "2" => Ok(Priority::Medium),
            "high" | "3" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

// Assignment struct, persisted with camelCase keys
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    #[serde(default)]
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Merges every `Some` field of the patch into this record.
    pub fn apply(&mut self, patch: AssignmentPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(subject) = patch.subject {
            self.subject = subject;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
    }
}

// User-supplied fields for a new assignment
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentDraft {
    pub title: String,
    pub subject: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
}

// Partial update; id and created_at never change, so they have no field here
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub is_completed: Option<bool>,
}

impl AssignmentPatch {
    pub fn completed(is_completed: bool) -> Self {
        AssignmentPatch {
            is_completed: Some(is_completed),
            ..Default::default()
        }
    }
}
