use std::collections::BTreeSet;

use crate::{
    auth::auth::AuthUser,
    db,
    error::ApiError,
    model::project::Project,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, info};
use utoipa::ToSchema;

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "status",
    "start_date",
    "end_date",
    "is_active",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Website relaunch")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "Active")]
    pub status: Option<String>,
    #[schema(example = "2025-06-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-12-31", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = json!([3, 4]))]
    pub user_ids: Option<Vec<u64>>,
}

#[derive(Deserialize, ToSchema)]
pub struct ProjectMembers {
    #[schema(example = json!([3, 4]))]
    pub user_ids: Vec<u64>,
}

#[derive(Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub user_ids: Vec<u64>,
}

async fn load_project(pool: &MySqlPool, project_id: u64) -> Result<ProjectDetail, ApiError> {
    let project = db::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    let user_ids = db::project_member_ids(pool, project_id).await?;
    Ok(ProjectDetail { project, user_ids })
}

async fn replace_members(
    tx: &mut Transaction<'_, MySql>,
    project_id: u64,
    members: &BTreeSet<u64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut **tx)
        .await?;

    for user_id in members {
        sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// List projects
#[utoipa::path(
    get,
    path = "/api/projects",
    responses((status = 200, description = "All projects", body = Object)),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let projects = db::fetch_projects(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// Get a project with its member ids
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project found", body = Object),
        (status = 404, description = "Project not found")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let detail = load_project(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// Projects a user belongs to
#[utoipa::path(
    get,
    path = "/api/projects/user/{user_id}",
    params(("user_id" = u64, Path, description = "Member id")),
    responses(
        (status = 200, description = "Projects of the user", body = Object),
        (status = 403, description = "Not self or admin")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn user_projects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;
    let projects = db::fetch_projects_for_user(pool.get_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Object),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Admin only")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Project name must not be empty"));
    }
    if let Some(end) = payload.end_date.filter(|end| *end < payload.start_date) {
        return Err(ApiError::bad_request(format!(
            "End date {end} is before start date {}",
            payload.start_date
        )));
    }

    let mut tx = pool.begin().await?;

    let project_id = sqlx::query(
        r#"
        INSERT INTO projects (name, description, status, start_date, end_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&payload.description)
    .bind(payload.status.as_deref().unwrap_or("Active"))
    .bind(payload.start_date)
    .bind(payload.end_date)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let members: BTreeSet<u64> = payload.user_ids.iter().flatten().copied().collect();
    replace_members(&mut tx, project_id, &members).await?;
    tx.commit().await?;

    info!(project_id, admin_id = auth.user_id, "Project created");

    let detail = load_project(pool.get_ref(), project_id).await?;
    Ok(HttpResponse::Created().json(detail))
}

/// Update project fields
///
/// Accepts any subset of `name`, `description`, `status`, `start_date`,
/// `end_date` and `is_active`.
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    request_body(content = Object, example = json!({"status": "On hold", "end_date": "2025-12-31"})),
    responses(
        (status = 200, description = "Project updated", body = Object),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Project not found")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let project_id = path.into_inner();
    load_project(pool.get_ref(), project_id).await?;

    let update = build_update_sql(
        "projects",
        &payload,
        UPDATABLE_COLUMNS,
        "id",
        project_id,
    )?;
    debug!(sql = %update.sql, "Updating project");
    execute_update(pool.get_ref(), update).await?;

    let detail = load_project(pool.get_ref(), project_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// Replace a project's member set
#[utoipa::path(
    post,
    path = "/api/projects/{id}/users",
    params(("id" = u64, Path, description = "Project id")),
    request_body = ProjectMembers,
    responses(
        (status = 200, description = "Members replaced", body = Object),
        (status = 404, description = "Project not found")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn set_project_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ProjectMembers>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let project_id = path.into_inner();
    load_project(pool.get_ref(), project_id).await?;

    let members: BTreeSet<u64> = payload.user_ids.iter().copied().collect();
    let mut tx = pool.begin().await?;
    replace_members(&mut tx, project_id, &members).await?;
    tx.commit().await?;

    let detail = load_project(pool.get_ref(), project_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// Delete a project
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted", body = Object, example = json!({
            "message": "Project deleted successfully"
        })),
        (status = 404, description = "Project not found")
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Project deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_flattens_project_fields() {
        let detail = ProjectDetail {
            project: Project {
                id: 7,
                name: "Apollo".into(),
                description: None,
                status: "Active".into(),
                start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                end_date: None,
                is_active: true,
                created_at: NaiveDate::from_ymd_opt(2025, 6, 1)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            },
            user_ids: vec![3, 4],
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "Apollo");
        assert_eq!(value["user_ids"], json!([3, 4]));
    }

    #[test]
    fn test_id_is_not_updatable() {
        let err = build_update_sql("projects", &json!({"id": 9}), UPDATABLE_COLUMNS, "id", 7)
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
