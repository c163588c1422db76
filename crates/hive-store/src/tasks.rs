use rusqlite::Connection;
use tracing::instrument;

use hive_core::{now_millis, Task, TaskFilter, TaskId, TaskPriority, TaskStats, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One page of an owner's task list plus the unpaginated match count.
#[derive(Clone, Debug)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u32,
}

/// Partial update. `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
    }
}

/// Task repository. Every operation is scoped to one owner; a task belonging
/// to someone else is indistinguishable from a missing one.
pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, title, description), fields(user_id = %user_id, priority = %priority))]
    pub fn create(
        &self,
        user_id: &UserId,
        title: &str,
        description: &str,
        priority: TaskPriority,
    ) -> Result<Task, StoreError> {
        let id = TaskId::new();
        let now = now_millis();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, user_id, title, description, priority, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    title,
                    description,
                    priority.as_str(),
                    now,
                ],
            )?;

            Ok(Task {
                id,
                user_id: user_id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                priority,
                completed: false,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, task_id = %id))]
    pub fn get(&self, user_id: &UserId, id: &TaskId) -> Result<Task, StoreError> {
        self.db.with_conn(|conn| fetch(conn, user_id, id))
    }

    /// Apply a partial update and return the resulting row. An empty patch
    /// returns the current row without bumping `updated_at`.
    #[instrument(skip(self, patch), fields(user_id = %user_id, task_id = %id))]
    pub fn update(
        &self,
        user_id: &UserId,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, StoreError> {
        if patch.is_empty() {
            return self.get(user_id, id);
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref title) = patch.title {
            sets.push("title = ?".to_string());
            values.push(Box::new(title.clone()));
        }
        if let Some(ref description) = patch.description {
            sets.push("description = ?".to_string());
            values.push(Box::new(description.clone()));
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?".to_string());
            values.push(Box::new(priority.as_str().to_string()));
        }
        if let Some(completed) = patch.completed {
            sets.push("completed = ?".to_string());
            values.push(Box::new(completed));
        }

        sets.push("updated_at = ?".to_string());
        values.push(Box::new(now_millis()));
        values.push(Box::new(id.as_str().to_string()));
        values.push(Box::new(user_id.as_str().to_string()));

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ? AND user_id = ?",
            sets.join(", ")
        );

        self.db.with_conn(|conn| {
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(AsRef::as_ref).collect();
            let changed = conn.execute(&sql, params_refs.as_slice())?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            fetch(conn, user_id, id)
        })
    }

    /// Delete a task and return its final snapshot.
    #[instrument(skip(self), fields(user_id = %user_id, task_id = %id))]
    pub fn delete(&self, user_id: &UserId, id: &TaskId) -> Result<Task, StoreError> {
        self.db.with_conn(|conn| {
            let task = fetch(conn, user_id, id)?;
            conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                [id.as_str(), user_id.as_str()],
            )?;
            Ok(task)
        })
    }

    /// Filtered, paginated list for one owner, oldest first.
    #[instrument(skip(self, filter), fields(user_id = %user_id, limit, offset))]
    pub fn list(
        &self,
        user_id: &UserId,
        filter: &TaskFilter,
        limit: u32,
        offset: u32,
    ) -> Result<TaskPage, StoreError> {
        let (where_clause, values) = build_where(user_id, filter);

        self.db.with_conn(|conn| {
            let count_sql = format!("SELECT COUNT(*) FROM tasks {where_clause}");
            let count_params: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(AsRef::as_ref).collect();
            let total: u32 =
                conn.query_row(&count_sql, count_params.as_slice(), |row| row.get(0))?;

            let data_sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks {where_clause}
                 ORDER BY created_at, id LIMIT ? OFFSET ?"
            );
            let mut data_values = values;
            data_values.push(Box::new(limit));
            data_values.push(Box::new(offset));
            let data_params: Vec<&dyn rusqlite::types::ToSql> =
                data_values.iter().map(AsRef::as_ref).collect();

            let mut stmt = conn.prepare(&data_sql)?;
            let mut rows = stmt.query(data_params.as_slice())?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }

            Ok(TaskPage { tasks, total })
        })
    }

    /// Every current task for one owner matching the filter, oldest first.
    /// Feeds the subscribe snapshot drain, so no pagination.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub fn snapshot(&self, user_id: &UserId, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let (where_clause, values) = build_where(user_id, filter);

        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks {where_clause} ORDER BY created_at, id"
            );
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(AsRef::as_ref).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_refs.as_slice())?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
    }

    /// Aggregate counts for one owner in a single query.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn stats(&self, user_id: &UserId) -> Result<TaskStats, StoreError> {
        self.db.with_conn(|conn| {
            let (total, completed): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(completed), 0) FROM tasks WHERE user_id = ?1",
                [user_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(TaskStats::from_counts(total, completed))
        })
    }
}

const TASK_COLUMNS: &str =
    "id, user_id, title, description, priority, completed, created_at, updated_at";

fn build_where(
    user_id: &UserId,
    filter: &TaskFilter,
) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut conditions = vec!["user_id = ?".to_string()];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(user_id.as_str().to_string())];

    if let Some(completed) = filter.completed {
        conditions.push("completed = ?".to_string());
        values.push(Box::new(completed));
    }
    if let Some(priority) = filter.priority {
        conditions.push("priority = ?".to_string());
        values.push(Box::new(priority.as_str().to_string()));
    }

    (format!("WHERE {}", conditions.join(" AND ")), values)
}

fn fetch(conn: &Connection, user_id: &UserId, id: &TaskId) -> Result<Task, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"
    ))?;
    let mut rows = stmt.query([id.as_str(), user_id.as_str()])?;
    match rows.next()? {
        Some(row) => row_to_task(row),
        None => Err(StoreError::NotFound(format!("task {id}"))),
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<Task, StoreError> {
    let priority: String = row_helpers::get(row, 4, "tasks", "priority")?;

    Ok(Task {
        id: TaskId::from_raw(row_helpers::get::<String>(row, 0, "tasks", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "tasks", "user_id")?),
        title: row_helpers::get(row, 2, "tasks", "title")?,
        description: row_helpers::get(row, 3, "tasks", "description")?,
        // Unknown stored labels decode to Medium, same as on the wire
        priority: TaskPriority::from_label(&priority),
        completed: row_helpers::get(row, 5, "tasks", "completed")?,
        created_at: row_helpers::get(row, 6, "tasks", "created_at")?,
        updated_at: row_helpers::get(row, 7, "tasks", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{NewUser, UserRepo};

    fn setup() -> (Database, UserId) {
        let db = Database::in_memory().unwrap();
        let users = UserRepo::new(db.clone());
        let user = users
            .create(&NewUser {
                email: "owner@example.com".to_string(),
                username: "owner".to_string(),
                password_hash: "aGFzaA==".to_string(),
                password_salt: "c2FsdA==".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .unwrap();
        (db, user.id)
    }

    fn second_user(db: &Database) -> UserId {
        let users = UserRepo::new(db.clone());
        users
            .create(&NewUser {
                email: "other@example.com".to_string(),
                username: "other".to_string(),
                password_hash: "aGFzaA==".to_string(),
                password_salt: "c2FsdA==".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .unwrap()
            .id
    }

    #[test]
    fn create_then_get_roundtrip() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let created = repo
            .create(&owner, "Buy milk", "two liters", TaskPriority::High)
            .unwrap();
        assert!(created.id.as_str().starts_with("task_"));
        assert!(!created.completed);

        let fetched = repo.get(&owner, &created.id).unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, "Buy milk");
        assert_eq!(fetched.description, "two liters");
        assert_eq!(fetched.priority, TaskPriority::High);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[test]
    fn get_scoped_to_owner() {
        let (db, owner) = setup();
        let stranger = second_user(&db);
        let repo = TaskRepo::new(db);
        let task = repo
            .create(&owner, "Secret", "", TaskPriority::Medium)
            .unwrap();

        let result = repo.get(&stranger, &task.id);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_partial_fields() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo
            .create(&owner, "Write report", "draft", TaskPriority::Low)
            .unwrap();

        let updated = repo
            .update(
                &owner,
                &task.id,
                &TaskPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.title, "Write report");
        assert_eq!(updated.description, "draft");
        assert_eq!(updated.priority, TaskPriority::Low);
    }

    #[test]
    fn update_empty_patch_is_noop() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo
            .create(&owner, "Untouched", "", TaskPriority::Medium)
            .unwrap();

        let same = repo.update(&owner, &task.id, &TaskPatch::default()).unwrap();
        assert_eq!(same.updated_at, task.updated_at);
        assert_eq!(same.title, "Untouched");
    }

    #[test]
    fn update_unknown_task_fails() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let result = repo.update(
            &owner,
            &TaskId::from_raw("task_missing"),
            &TaskPatch {
                title: Some("X".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_scoped_to_owner() {
        let (db, owner) = setup();
        let stranger = second_user(&db);
        let repo = TaskRepo::new(db);
        let task = repo.create(&owner, "Mine", "", TaskPriority::Medium).unwrap();

        let result = repo.update(
            &stranger,
            &task.id,
            &TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        // Unchanged for the real owner
        let fetched = repo.get(&owner, &task.id).unwrap();
        assert!(!fetched.completed);
    }

    #[test]
    fn delete_returns_snapshot() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let task = repo
            .create(&owner, "Ephemeral", "", TaskPriority::Urgent)
            .unwrap();

        let snapshot = repo.delete(&owner, &task.id).unwrap();
        assert_eq!(snapshot.title, "Ephemeral");
        assert_eq!(snapshot.priority, TaskPriority::Urgent);

        assert!(matches!(
            repo.get(&owner, &task.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(&owner, &task.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters_by_completed() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let a = repo.create(&owner, "a", "", TaskPriority::Medium).unwrap();
        repo.create(&owner, "b", "", TaskPriority::Medium).unwrap();
        repo.update(
            &owner,
            &a.id,
            &TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let done = repo
            .list(
                &owner,
                &TaskFilter {
                    completed: Some(true),
                    ..Default::default()
                },
                100,
                0,
            )
            .unwrap();
        assert_eq!(done.total, 1);
        assert_eq!(done.tasks[0].title, "a");

        let open = repo
            .list(
                &owner,
                &TaskFilter {
                    completed: Some(false),
                    ..Default::default()
                },
                100,
                0,
            )
            .unwrap();
        assert_eq!(open.total, 1);
        assert_eq!(open.tasks[0].title, "b");
    }

    #[test]
    fn list_filters_by_priority() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        repo.create(&owner, "low", "", TaskPriority::Low).unwrap();
        repo.create(&owner, "urgent", "", TaskPriority::Urgent).unwrap();

        let page = repo
            .list(
                &owner,
                &TaskFilter {
                    priority: Some(TaskPriority::Urgent),
                    ..Default::default()
                },
                100,
                0,
            )
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.tasks[0].title, "urgent");
    }

    #[test]
    fn list_paginates_with_stable_total() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        for i in 0..5 {
            repo.create(&owner, &format!("t{i}"), "", TaskPriority::Medium)
                .unwrap();
        }

        let page1 = repo.list(&owner, &TaskFilter::default(), 2, 0).unwrap();
        assert_eq!(page1.tasks.len(), 2);
        assert_eq!(page1.total, 5);

        let page3 = repo.list(&owner, &TaskFilter::default(), 2, 4).unwrap();
        assert_eq!(page3.tasks.len(), 1);
        assert_eq!(page3.total, 5);
    }

    #[test]
    fn list_scoped_to_owner() {
        let (db, owner) = setup();
        let stranger = second_user(&db);
        let repo = TaskRepo::new(db);
        repo.create(&owner, "mine", "", TaskPriority::Medium).unwrap();
        repo.create(&stranger, "theirs", "", TaskPriority::Medium)
            .unwrap();

        let page = repo.list(&owner, &TaskFilter::default(), 100, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.tasks[0].title, "mine");
    }

    #[test]
    fn snapshot_is_oldest_first() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        repo.create(&owner, "first", "", TaskPriority::Medium).unwrap();
        repo.create(&owner, "second", "", TaskPriority::Medium).unwrap();
        repo.create(&owner, "third", "", TaskPriority::Medium).unwrap();

        let tasks = repo.snapshot(&owner, &TaskFilter::default()).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn snapshot_applies_filter() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);
        let a = repo.create(&owner, "done", "", TaskPriority::Medium).unwrap();
        repo.create(&owner, "open", "", TaskPriority::Medium).unwrap();
        repo.update(
            &owner,
            &a.id,
            &TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let tasks = repo
            .snapshot(
                &owner,
                &TaskFilter {
                    completed: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "open");
    }

    #[test]
    fn stats_counts_and_rate() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db);

        let empty = repo.stats(&owner).unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.completion_rate, 0.0);

        let a = repo.create(&owner, "a", "", TaskPriority::Medium).unwrap();
        repo.create(&owner, "b", "", TaskPriority::Medium).unwrap();

        let before = repo.stats(&owner).unwrap();
        assert_eq!(before.total, 2);
        assert_eq!(before.completed, 0);
        assert_eq!(before.pending, 2);
        assert_eq!(before.completion_rate, 0.0);

        repo.update(
            &owner,
            &a.id,
            &TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let after = repo.stats(&owner).unwrap();
        assert_eq!(after.total, 2);
        assert_eq!(after.completed, 1);
        assert_eq!(after.pending, 1);
        assert_eq!(after.completion_rate, 0.5);
    }

    #[test]
    fn unknown_priority_label_decodes_to_medium() {
        let (db, owner) = setup();
        let repo = TaskRepo::new(db.clone());
        let task = repo.create(&owner, "odd", "", TaskPriority::Low).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET priority = 'catastrophic' WHERE id = ?1",
                [task.id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();

        let fetched = repo.get(&owner, &task.id).unwrap();
        assert_eq!(fetched.priority, TaskPriority::Medium);
    }
}
