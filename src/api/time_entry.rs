use crate::{
    auth::auth::AuthUser,
    db,
    error::ApiError,
    model::{
        shift::Shift,
        time_entry::{TimeEntry, hours_between},
    },
    service::shift_validation::{find_active_shift, validate_instant, validate_user_range},
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateTimeEntry {
    #[schema(example = 1)]
    pub project_id: u64,
    pub task_id: Option<u64>,
    #[schema(example = "2025-06-09T09:00:00", value_type = String)]
    pub start_time: NaiveDateTime,
    #[schema(example = "2025-06-09T12:30:00", value_type = Option<String>)]
    pub end_time: Option<NaiveDateTime>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTimeEntry {
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    /// Version the caller last read; a mismatch is a conflict.
    #[schema(example = 0)]
    pub version: u32,
}

#[derive(sqlx::FromRow)]
struct TimeEntryRow {
    id: u64,
    user_id: u64,
    user_name: String,
    project_id: u64,
    project_name: String,
    task_id: Option<u64>,
    task_name: Option<String>,
    start_time: NaiveDateTime,
    end_time: Option<NaiveDateTime>,
    description: Option<String>,
    version: u32,
}

#[derive(Serialize, ToSchema)]
pub struct TimeEntryResponse {
    pub id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub project_id: u64,
    pub project_name: String,
    pub task_id: Option<u64>,
    pub task_name: Option<String>,
    #[schema(value_type = String)]
    pub start_time: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub version: u32,
    /// Hours between start and end; zero while running.
    #[schema(example = 3.5)]
    pub duration: f64,
}

impl From<TimeEntryRow> for TimeEntryResponse {
    fn from(row: TimeEntryRow) -> Self {
        let duration = row
            .end_time
            .map(|end| hours_between(row.start_time, end))
            .unwrap_or(0.0);

        Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            project_id: row.project_id,
            project_name: row.project_name,
            task_id: row.task_id,
            task_name: row.task_name,
            start_time: row.start_time,
            end_time: row.end_time,
            description: row.description,
            version: row.version,
            duration,
        }
    }
}

const VIEW_SELECT: &str = r#"
    SELECT te.id, te.user_id, u.username AS user_name,
           te.project_id, p.name AS project_name,
           te.task_id, t.name AS task_name,
           te.start_time, te.end_time, te.description, te.version
    FROM time_entries te
    JOIN users u ON u.id = te.user_id
    JOIN projects p ON p.id = te.project_id
    LEFT JOIN tasks t ON t.id = te.task_id
"#;

async fn fetch_views(
    pool: &MySqlPool,
    user_id: Option<u64>,
) -> Result<Vec<TimeEntryResponse>, sqlx::Error> {
    let rows = match user_id {
        Some(user_id) => {
            sqlx::query_as::<_, TimeEntryRow>(&format!(
                "{VIEW_SELECT} WHERE te.user_id = ? ORDER BY te.start_time DESC"
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TimeEntryRow>(&format!(
                "{VIEW_SELECT} ORDER BY te.start_time DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn fetch_view(pool: &MySqlPool, entry_id: u64) -> Result<TimeEntryResponse, ApiError> {
    sqlx::query_as::<_, TimeEntryRow>(&format!("{VIEW_SELECT} WHERE te.id = ?"))
        .bind(entry_id)
        .fetch_optional(pool)
        .await?
        .map(Into::into)
        .ok_or_else(|| ApiError::not_found("Time entry"))
}

async fn load_entry(pool: &MySqlPool, entry_id: u64) -> Result<TimeEntry, ApiError> {
    db::fetch_time_entry(pool, entry_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Time entry"))
}

fn check_order(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::bad_request(
            "End time must not be before start time",
        )),
        _ => Ok(()),
    }
}

/// Candidate shifts for `user_id`, as the validator expects them.
async fn load_user_shifts(pool: &MySqlPool, user_id: u64) -> Result<Vec<Shift>, ApiError> {
    let shifts = db::fetch_active_shifts_for_user(pool, user_id).await?;
    if shifts.len() > 1 {
        warn!(
            user_id,
            shift_count = shifts.len(),
            "Employee holds more than one active shift; using the lowest id"
        );
    }
    Ok(shifts)
}

/// Validates only the instants that changed against the owner's shift.
async fn validate_changed(
    pool: &MySqlPool,
    user_id: u64,
    changed: &[NaiveDateTime],
) -> Result<(), ApiError> {
    if changed.is_empty() {
        return Ok(());
    }

    let shifts = load_user_shifts(pool, user_id).await?;
    let shift = find_active_shift(&shifts, user_id);
    for instant in changed {
        validate_instant(shift, *instant)?;
    }
    Ok(())
}

async fn check_task_belongs(
    pool: &MySqlPool,
    project_id: u64,
    task_id: Option<u64>,
) -> Result<(), ApiError> {
    let Some(task_id) = task_id else {
        return Ok(());
    };

    let matches = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tasks WHERE id = ? AND project_id = ?",
    )
    .bind(task_id)
    .bind(project_id)
    .fetch_one(pool)
    .await?;

    if matches == 0 {
        return Err(ApiError::bad_request(
            "Task does not belong to the given project",
        ));
    }
    Ok(())
}

/// Zero rows from a version-guarded update: gone or stale.
async fn stale_or_missing(pool: &MySqlPool, entry_id: u64) -> ApiError {
    match db::fetch_time_entry(pool, entry_id).await {
        Ok(Some(_)) => ApiError::conflict(
            "Time entry was modified by someone else. Reload and try again.",
        ),
        Ok(None) => ApiError::not_found("Time entry"),
        Err(e) => e.into(),
    }
}

/// List time entries
///
/// Admins see every entry; employees only their own.
#[utoipa::path(
    get,
    path = "/api/time-entries",
    responses((status = 200, description = "Time entries, newest first", body = [TimeEntryResponse])),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn list_time_entries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let scope = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };
    let entries = fetch_views(pool.get_ref(), scope).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// Get a time entry
#[utoipa::path(
    get,
    path = "/api/time-entries/{id}",
    params(("id" = u64, Path, description = "Time entry id")),
    responses(
        (status = 200, description = "Time entry", body = TimeEntryResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Time entry not found")
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn get_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let entry = fetch_view(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_admin(entry.user_id)?;
    Ok(HttpResponse::Ok().json(entry))
}

/// List a user's time entries
#[utoipa::path(
    get,
    path = "/api/time-entries/user/{user_id}",
    params(("user_id" = u64, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Time entries of the user", body = [TimeEntryResponse]),
        (status = 403, description = "Not self or admin")
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn user_time_entries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;
    let entries = fetch_views(pool.get_ref(), Some(user_id)).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// Log a time entry for the caller
#[utoipa::path(
    post,
    path = "/api/time-entries",
    request_body = CreateTimeEntry,
    responses(
        (status = 201, description = "Time entry created", body = TimeEntryResponse),
        (status = 400, description = "Outside the caller's shift, or end before start", body = Object, example = json!({
            "message": "Time entry is outside of your scheduled shift (09:00 - 17:00). Please contact your supervisor if you need to work outside your scheduled hours."
        }))
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn create_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimeEntry>,
) -> Result<HttpResponse, ApiError> {
    check_order(payload.start_time, payload.end_time)?;

    let shifts = load_user_shifts(pool.get_ref(), auth.user_id).await?;
    validate_user_range(&shifts, auth.user_id, payload.start_time, payload.end_time)?;
    check_task_belongs(pool.get_ref(), payload.project_id, payload.task_id).await?;

    let entry_id = sqlx::query(
        r#"
        INSERT INTO time_entries (user_id, project_id, task_id, start_time, end_time, description)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.project_id)
    .bind(payload.task_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(entry_id, user_id = auth.user_id, "Time entry created");

    let entry = fetch_view(pool.get_ref(), entry_id).await?;
    Ok(HttpResponse::Created().json(entry))
}

/// Update a time entry
///
/// Changed start/end instants are validated against the owner's shift.
#[utoipa::path(
    put,
    path = "/api/time-entries/{id}",
    params(("id" = u64, Path, description = "Time entry id")),
    request_body = UpdateTimeEntry,
    responses(
        (status = 200, description = "Time entry updated", body = TimeEntryResponse),
        (status = 400, description = "Outside the owner's shift, or end before start"),
        (status = 404, description = "Time entry not found"),
        (status = 409, description = "Stale version")
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn update_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTimeEntry>,
) -> Result<HttpResponse, ApiError> {
    let entry_id = path.into_inner();
    let current = load_entry(pool.get_ref(), entry_id).await?;
    auth.require_self_or_admin(current.user_id)?;

    if payload.version != current.version {
        return Err(ApiError::conflict(
            "Time entry was modified by someone else. Reload and try again.",
        ));
    }

    let start_time = payload.start_time.unwrap_or(current.start_time);
    let end_time = payload.end_time.or(current.end_time);
    check_order(start_time, end_time)?;

    let mut changed = Vec::new();
    if start_time != current.start_time {
        changed.push(start_time);
    }
    if let Some(end) = end_time.filter(|end| Some(*end) != current.end_time) {
        changed.push(end);
    }
    validate_changed(pool.get_ref(), current.user_id, &changed).await?;

    let project_id = payload.project_id.unwrap_or(current.project_id);
    let task_id = payload.task_id.or(current.task_id);
    check_task_belongs(pool.get_ref(), project_id, task_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE time_entries
        SET project_id = ?, task_id = ?, start_time = ?, end_time = ?,
            description = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(project_id)
    .bind(task_id)
    .bind(start_time)
    .bind(end_time)
    .bind(payload.description.as_ref().or(current.description.as_ref()))
    .bind(entry_id)
    .bind(payload.version)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale_or_missing(pool.get_ref(), entry_id).await);
    }

    let entry = fetch_view(pool.get_ref(), entry_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

/// Stop a running time entry at the current time
#[utoipa::path(
    put,
    path = "/api/time-entries/{id}/stop",
    params(("id" = u64, Path, description = "Time entry id")),
    responses(
        (status = 200, description = "Time entry stopped", body = TimeEntryResponse),
        (status = 400, description = "Already stopped, or now is outside the owner's shift"),
        (status = 404, description = "Time entry not found"),
        (status = 409, description = "Entry changed concurrently")
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn stop_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let entry_id = path.into_inner();
    let current = load_entry(pool.get_ref(), entry_id).await?;
    auth.require_self_or_admin(current.user_id)?;

    if !current.is_running() {
        return Err(ApiError::bad_request("Time entry already stopped"));
    }

    let now = Utc::now().naive_utc();
    check_order(current.start_time, Some(now))?;
    validate_changed(pool.get_ref(), current.user_id, &[now]).await?;

    let result = sqlx::query(
        r#"
        UPDATE time_entries
        SET end_time = ?, version = version + 1
        WHERE id = ? AND version = ? AND end_time IS NULL
        "#,
    )
    .bind(now)
    .bind(entry_id)
    .bind(current.version)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale_or_missing(pool.get_ref(), entry_id).await);
    }

    info!(
        entry_id,
        user_id = current.user_id,
        hours = current.elapsed_hours(now),
        "Time entry stopped"
    );

    let entry = fetch_view(pool.get_ref(), entry_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

/// Delete a time entry
#[utoipa::path(
    delete,
    path = "/api/time-entries/{id}",
    params(("id" = u64, Path, description = "Time entry id")),
    responses(
        (status = 200, description = "Time entry deleted", body = Object, example = json!({
            "message": "Time entry deleted successfully"
        })),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Time entry not found")
    ),
    tag = "TimeEntry",
    security(("bearer_auth" = []))
)]
pub async fn delete_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let entry_id = path.into_inner();
    let current = load_entry(pool.get_ref(), entry_id).await?;
    auth.require_self_or_admin(current.user_id)?;

    sqlx::query("DELETE FROM time_entries WHERE id = ?")
        .bind(entry_id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Time entry deleted successfully"
    })))
}
