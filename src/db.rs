//! Pool setup and the shared read queries the handlers and reports build on.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use crate::model::{
    project::Project,
    shift::{Shift, ShiftRow},
    task::ProjectTask,
    time_entry::TimeEntry,
    user::User,
};

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

const USER_COLUMNS: &str = r#"
    id, username, email, password, first_name, last_name,
    role_id, is_active, created_at, last_login_at
"#;

const SHIFT_COLUMNS: &str = r#"
    id, shift_type, start_time, end_time, description,
    is_active, created_at, updated_at
"#;

const TIME_ENTRY_COLUMNS: &str = r#"
    id, user_id, project_id, task_id, start_time, end_time, description, version
"#;

pub async fn fetch_users(pool: &MySqlPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn fetch_user(pool: &MySqlPool, user_id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_username(
    pool: &MySqlPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

const PROJECT_COLUMNS: &str = r#"
    id, name, description, status, start_date, end_date, is_active, created_at
"#;

const TASK_COLUMNS: &str = r#"
    id, project_id, name, description, status, priority,
    due_date, assigned_user_id, created_at
"#;

pub async fn fetch_projects(pool: &MySqlPool) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_project(
    pool: &MySqlPool,
    project_id: u64,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await
}

/// Projects `user_id` is a member of.
pub async fn fetch_projects_for_user(
    pool: &MySqlPool,
    user_id: u64,
) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        r#"
        SELECT p.id, p.name, p.description, p.status, p.start_date, p.end_date,
               p.is_active, p.created_at
        FROM projects p
        JOIN project_members pm ON pm.project_id = p.id
        WHERE pm.user_id = ?
        ORDER BY p.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_tasks(pool: &MySqlPool) -> Result<Vec<ProjectTask>, sqlx::Error> {
    sqlx::query_as::<_, ProjectTask>(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn fetch_task(pool: &MySqlPool, task_id: u64) -> Result<Option<ProjectTask>, sqlx::Error> {
    sqlx::query_as::<_, ProjectTask>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

/// Tasks filtered on one column, `project_id` or `assigned_user_id`.
pub async fn fetch_tasks_where(
    pool: &MySqlPool,
    column: TaskFilter,
    id: u64,
) -> Result<Vec<ProjectTask>, sqlx::Error> {
    let column = match column {
        TaskFilter::Project => "project_id",
        TaskFilter::Assignee => "assigned_user_id",
    };
    sqlx::query_as::<_, ProjectTask>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE {column} = ? ORDER BY id"
    ))
    .bind(id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, Copy)]
pub enum TaskFilter {
    Project,
    Assignee,
}

/// Entries started at or after `since`; all entries when `since` is `None`.
pub async fn fetch_time_entries_since(
    pool: &MySqlPool,
    since: Option<NaiveDateTime>,
) -> Result<Vec<TimeEntry>, sqlx::Error> {
    match since {
        Some(since) => {
            sqlx::query_as::<_, TimeEntry>(&format!(
                "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE start_time >= ? ORDER BY start_time"
            ))
            .bind(since)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, TimeEntry>(&format!(
                "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries ORDER BY start_time"
            ))
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn fetch_time_entry(
    pool: &MySqlPool,
    entry_id: u64,
) -> Result<Option<TimeEntry>, sqlx::Error> {
    sqlx::query_as::<_, TimeEntry>(&format!(
        "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE id = ?"
    ))
    .bind(entry_id)
    .fetch_optional(pool)
    .await
}

fn into_shifts(rows: Vec<ShiftRow>, members: Vec<(u64, u64)>) -> Result<Vec<Shift>, sqlx::Error> {
    let mut by_shift: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
    for (shift_id, user_id) in members {
        by_shift.entry(shift_id).or_default().insert(user_id);
    }

    rows.into_iter()
        .map(|row| {
            let assigned = by_shift.remove(&row.id).unwrap_or_default();
            row.into_shift(assigned)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .collect()
}

pub async fn fetch_shifts(pool: &MySqlPool) -> Result<Vec<Shift>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ShiftRow>(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    let members = sqlx::query_as::<_, (u64, u64)>("SELECT shift_id, user_id FROM shift_employees")
        .fetch_all(pool)
        .await?;

    into_shifts(rows, members)
}

pub async fn fetch_shift(pool: &MySqlPool, shift_id: u64) -> Result<Option<Shift>, sqlx::Error> {
    let row = sqlx::query_as::<_, ShiftRow>(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?"
    ))
    .bind(shift_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let members = sqlx::query_as::<_, (u64, u64)>(
        "SELECT shift_id, user_id FROM shift_employees WHERE shift_id = ?",
    )
    .bind(shift_id)
    .fetch_all(pool)
    .await?;

    Ok(into_shifts(vec![row], members)?.pop())
}

/// Active shifts listing `user_id`, with their full member sets.
pub async fn fetch_active_shifts_for_user(
    pool: &MySqlPool,
    user_id: u64,
) -> Result<Vec<Shift>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ShiftRow>(
        r#"
        SELECT s.id, s.shift_type, s.start_time, s.end_time, s.description,
               s.is_active, s.created_at, s.updated_at
        FROM shifts s
        JOIN shift_employees se ON se.shift_id = s.id
        WHERE se.user_id = ? AND s.is_active = TRUE
        ORDER BY s.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let members = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT se.shift_id, se.user_id
        FROM shift_employees se
        JOIN shift_employees mine ON mine.shift_id = se.shift_id
        WHERE mine.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    into_shifts(rows, members)
}

pub async fn project_member_ids(
    pool: &MySqlPool,
    project_id: u64,
) -> Result<Vec<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        "SELECT user_id FROM project_members WHERE project_id = ? ORDER BY user_id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}
