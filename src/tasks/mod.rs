use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─── Task ─────────────────────────────────────────────────────────────────────

/// A single to-do item, the only entity this service stores.
///
/// `id` is an opaque UUIDv4 string assigned at insert. It is never parsed,
/// never changed by an update, and compared verbatim, so any unknown string
/// simply fails lookup.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
}

/// Insert payload for `POST /api/task` and `tasks add`.
///
/// A caller-supplied id is honored as-is; without one a fresh UUIDv4 is
/// assigned. The other fields default to empty/false when omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl TaskDraft {
    /// Materialize the draft into a full task, assigning an id if the caller
    /// did not send one.
    pub fn into_task(self) -> Task {
        Task {
            id: self
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            description: self.description,
            is_completed: self.is_completed,
        }
    }
}

// ─── Filter ───────────────────────────────────────────────────────────────────

/// Completion filter over a task list.
///
/// `Active` and `Completed` partition the list; `All` keeps everything.
/// The projection is pure: it never reorders, only drops non-matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.is_completed,
            Filter::Completed => task.is_completed,
        }
    }

    /// Apply the filter to a slice, keeping matching tasks in their
    /// original order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!(
                "unknown filter '{other}' (expected all, active, or completed)"
            )),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        };
        f.write_str(name)
    }
}
