use anyhow::{Context as _, Result};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use thiserror::Error;

use crate::tasks::{Task, TaskDraft};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the server indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(QUERY_TIMEOUT.as_secs())),
    }
}

/// Errors returned by task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),
    /// A concurrent writer interfered with this operation. Detected from
    /// affected-row counts: SQLite has no native row version to compare.
    #[error("task {0} was changed by a concurrent writer")]
    Conflict(String),
    #[error("database query timed out after {0}s")]
    Timeout(u64),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds: queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("todod.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap, Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Run pending migrations. Called before the listener binds, so the
    /// schema is always at the current version before traffic arrives.
    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Tasks ───────────────────────────────────────────────────────────────

    /// Every task, in insertion order. No pagination: the whole list is the
    /// unit the API and the client work with.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT id, title, description, is_completed FROM tasks ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT id, title, description, is_completed FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn count_tasks(&self) -> Result<u64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    /// Insert the draft and return the stored row. Ids are assigned here
    /// when the draft carries none; a duplicate caller-supplied id fails
    /// the primary key constraint.
    pub async fn insert_task(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let task = draft.into_task();
        sqlx::query("INSERT INTO tasks (id, title, description, is_completed) VALUES (?, ?, ?, ?)")
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.is_completed)
            .execute(&self.pool)
            .await?;
        self.get_task(&task.id)
            .await?
            .ok_or(StoreError::Conflict(task.id))
    }

    /// Replace every field of the task except its id.
    ///
    /// Zero affected rows means the id was gone at UPDATE time. The re-check
    /// separates plain absence (`NotFound`) from a writer re-creating the row
    /// between the UPDATE and the check (`Conflict`).
    pub async fn update_task(&self, id: &str, task: &Task) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE tasks SET title = ?, description = ?, is_completed = ? WHERE id = ?")
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.is_completed)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return match self.get_task(id).await? {
                None => Err(StoreError::NotFound(id.to_string())),
                Some(_) => Err(StoreError::Conflict(id.to_string())),
            };
        }
        Ok(())
    }

    /// Permanently remove a task. The id is never reused afterwards.
    pub async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_storage(dir: &TempDir) -> Storage {
        Storage::new(dir.path()).await.unwrap()
    }

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_persists() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let task = storage.insert_task(draft("Buy milk")).await.unwrap();
        assert!(!task.id.is_empty());
        assert_eq!(task.title, "Buy milk");
        assert!(!task.is_completed);

        let fetched = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[tokio::test]
    async fn insert_honors_caller_supplied_id() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let task = storage
            .insert_task(TaskDraft {
                id: Some("fixed-id".to_string()),
                title: "pinned".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(task.id, "fixed-id");
        assert!(storage.get_task("fixed-id").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_duplicate_id_fails() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let make = || TaskDraft {
            id: Some("dup".to_string()),
            title: "first".to_string(),
            ..Default::default()
        };
        storage.insert_task(make()).await.unwrap();
        let err = storage.insert_task(make()).await.unwrap_err();
        assert!(matches!(err, StoreError::Db(_)), "got: {err}");
    }

    #[tokio::test]
    async fn list_returns_insertion_order() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let a = storage.insert_task(draft("a")).await.unwrap();
        let b = storage.insert_task(draft("b")).await.unwrap();
        let c = storage.insert_task(draft("c")).await.unwrap();

        let titles: Vec<String> = storage
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;
        assert!(storage.get_task("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_replaces_every_field_but_id() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let task = storage.insert_task(draft("before")).await.unwrap();
        let updated = Task {
            id: task.id.clone(),
            title: "after".to_string(),
            description: "now with detail".to_string(),
            is_completed: true,
        };
        storage.update_task(&task.id, &updated).await.unwrap();

        let fetched = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let ghost = Task {
            id: "ghost".to_string(),
            title: "x".to_string(),
            description: String::new(),
            is_completed: false,
        };
        let err = storage.update_task("ghost", &ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got: {err}");
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        let task = storage.insert_task(draft("gone soon")).await.unwrap();
        storage.delete_task(&task.id).await.unwrap();
        assert!(storage.get_task(&task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;
        let err = storage.delete_task("no-such-id").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got: {err}");
    }

    #[tokio::test]
    async fn count_tracks_inserts_and_deletes() {
        let dir = TempDir::new().unwrap();
        let storage = make_storage(&dir).await;

        assert_eq!(storage.count_tasks().await.unwrap(), 0);
        let task = storage.insert_task(draft("one")).await.unwrap();
        storage.insert_task(draft("two")).await.unwrap();
        assert_eq!(storage.count_tasks().await.unwrap(), 2);
        storage.delete_task(&task.id).await.unwrap();
        assert_eq!(storage.count_tasks().await.unwrap(), 1);
    }
}
