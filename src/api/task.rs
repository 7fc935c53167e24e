use crate::{
    auth::auth::AuthUser,
    db::{self, TaskFilter},
    error::ApiError,
    model::task::{ProjectTask, TaskStatus},
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "status",
    "priority",
    "due_date",
    "assigned_user_id",
];

const DEFAULT_PRIORITY: u8 = 2;

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = 1)]
    pub project_id: u64,
    #[schema(example = "Write migration")]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    /// 1 (high) to 3 (low)
    #[schema(example = 2)]
    pub priority: Option<u8>,
    #[schema(example = "2025-07-01", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    pub assigned_user_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct TaskAssignment {
    /// `null` clears the assignee.
    pub user_id: Option<u64>,
}

fn check_priority(priority: u8) -> Result<(), ApiError> {
    if (1..=3).contains(&priority) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Priority must be between 1 and 3"))
    }
}

/// Field checks for the free-form update payload.
fn check_update_fields(payload: &Value) -> Result<(), ApiError> {
    if let Some(priority) = payload.get("priority") {
        let priority = priority
            .as_u64()
            .and_then(|p| u8::try_from(p).ok())
            .ok_or_else(|| ApiError::bad_request("Priority must be between 1 and 3"))?;
        check_priority(priority)?;
    }

    if let Some(status) = payload.get("status") {
        status
            .as_str()
            .and_then(|s| s.parse::<TaskStatus>().ok())
            .ok_or_else(|| {
                ApiError::bad_request("Status must be one of Todo, InProgress, Done")
            })?;
    }

    if payload.get("name").and_then(Value::as_str).is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Task name must not be empty"));
    }
    Ok(())
}

async fn load_task(pool: &MySqlPool, task_id: u64) -> Result<ProjectTask, ApiError> {
    db::fetch_task(pool, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))
}

/// List tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses((status = 200, description = "All tasks", body = Object)),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let tasks = db::fetch_tasks(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Get a task
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = u64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task found", body = Object),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let task = load_task(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Tasks of a project
#[utoipa::path(
    get,
    path = "/api/tasks/project/{project_id}",
    params(("project_id" = u64, Path, description = "Project id")),
    responses((status = 200, description = "Tasks of the project", body = Object)),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn project_tasks(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let tasks =
        db::fetch_tasks_where(pool.get_ref(), TaskFilter::Project, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Tasks assigned to a user
#[utoipa::path(
    get,
    path = "/api/tasks/user/{user_id}",
    params(("user_id" = u64, Path, description = "Assignee id")),
    responses(
        (status = 200, description = "Tasks assigned to the user", body = Object),
        (status = 403, description = "Not self or admin")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn user_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;
    let tasks = db::fetch_tasks_where(pool.get_ref(), TaskFilter::Assignee, user_id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Create a task
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = Object),
        (status = 400, description = "Invalid priority or empty name"),
        (status = 404, description = "Project not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTask>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Task name must not be empty"));
    }
    let priority = payload.priority.unwrap_or(DEFAULT_PRIORITY);
    check_priority(priority)?;

    if db::fetch_project(pool.get_ref(), payload.project_id).await?.is_none() {
        return Err(ApiError::not_found("Project"));
    }

    let task_id = sqlx::query(
        r#"
        INSERT INTO tasks (project_id, name, description, status, priority, due_date, assigned_user_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.project_id)
    .bind(name)
    .bind(payload.description.as_deref().unwrap_or(""))
    .bind(payload.status.unwrap_or(TaskStatus::Todo).to_string())
    .bind(priority)
    .bind(payload.due_date)
    .bind(payload.assigned_user_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(task_id, project_id = payload.project_id, "Task created");

    let task = load_task(pool.get_ref(), task_id).await?;
    Ok(HttpResponse::Created().json(task))
}

/// Update task fields
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = u64, Path, description = "Task id")),
    request_body(content = Object, example = json!({"priority": 1, "status": "InProgress"})),
    responses(
        (status = 200, description = "Task updated", body = Object),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let task_id = path.into_inner();
    load_task(pool.get_ref(), task_id).await?;

    check_update_fields(&payload)?;
    let update = build_update_sql("tasks", &payload, UPDATABLE_COLUMNS, "id", task_id)?;
    execute_update(pool.get_ref(), update).await?;

    let task = load_task(pool.get_ref(), task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Change a task's status
///
/// Allowed for admins and for the task's assignee.
#[utoipa::path(
    put,
    path = "/api/tasks/{id}/status",
    params(("id" = u64, Path, description = "Task id")),
    request_body = TaskStatusUpdate,
    responses(
        (status = 200, description = "Status changed", body = Object),
        (status = 403, description = "Neither admin nor assignee"),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TaskStatusUpdate>,
) -> Result<HttpResponse, ApiError> {
    let task = load_task(pool.get_ref(), path.into_inner()).await?;

    if !auth.is_admin() && task.assigned_user_id != Some(auth.user_id) {
        return Err(ApiError::Forbidden(
            "Only the assignee or an admin may change this task".into(),
        ));
    }

    sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
        .bind(payload.status.to_string())
        .bind(task.id)
        .execute(pool.get_ref())
        .await?;

    let task = load_task(pool.get_ref(), task.id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Assign or unassign a task
#[utoipa::path(
    put,
    path = "/api/tasks/{id}/assign",
    params(("id" = u64, Path, description = "Task id")),
    request_body = TaskAssignment,
    responses(
        (status = 200, description = "Assignee changed", body = Object),
        (status = 404, description = "Task or user not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn assign_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TaskAssignment>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let task = load_task(pool.get_ref(), path.into_inner()).await?;

    if let Some(user_id) = payload.user_id {
        if db::fetch_user(pool.get_ref(), user_id).await?.is_none() {
            return Err(ApiError::not_found("User"));
        }
    }

    sqlx::query("UPDATE tasks SET assigned_user_id = ? WHERE id = ?")
        .bind(payload.user_id)
        .bind(task.id)
        .execute(pool.get_ref())
        .await?;

    let task = load_task(pool.get_ref(), task.id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = u64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = Object, example = json!({
            "message": "Task deleted successfully"
        })),
        (status = 404, description = "Task not found")
    ),
    tag = "Task",
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Task"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(check_priority(0).is_err());
        assert!(check_priority(1).is_ok());
        assert!(check_priority(3).is_ok());
        assert!(check_priority(4).is_err());
    }

    #[test]
    fn test_update_fields_checked() {
        assert!(check_update_fields(&json!({"priority": 2, "status": "Done"})).is_ok());
        assert!(check_update_fields(&json!({"priority": 9})).is_err());
        assert!(check_update_fields(&json!({"priority": "high"})).is_err());
        assert!(check_update_fields(&json!({"status": "Blocked"})).is_err());
        assert!(check_update_fields(&json!({"name": "  "})).is_err());
        assert!(check_update_fields(&json!({"description": "anything"})).is_ok());
    }
}
