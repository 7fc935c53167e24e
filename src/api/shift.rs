use std::collections::BTreeSet;

use crate::{
    auth::auth::AuthUser,
    db,
    error::ApiError,
    model::shift::{Shift, ShiftType},
    service::shift_validation::find_active_shift,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateShift {
    pub shift_type: ShiftType,
    #[schema(example = "09:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub end_time: NaiveTime,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[schema(example = json!([3, 4]))]
    pub assigned_employees: Option<Vec<u64>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShift {
    pub shift_type: Option<ShiftType>,
    #[schema(example = "22:00:00", value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(example = "06:00:00", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub assigned_employees: Option<Vec<u64>>,
}

#[derive(Deserialize, ToSchema)]
pub struct ShiftMembers {
    #[schema(example = json!([3, 4]))]
    pub user_ids: Vec<u64>,
}

fn check_times(start: NaiveTime, end: NaiveTime) -> Result<(), ApiError> {
    if start == end {
        return Err(ApiError::bad_request(
            "Shift start and end time must differ",
        ));
    }
    Ok(())
}

/// Members of `members` that already hold an active shift other than `shift_id`.
fn members_with_other_active_shift(
    shifts: &[Shift],
    shift_id: Option<u64>,
    members: &BTreeSet<u64>,
) -> BTreeSet<u64> {
    shifts
        .iter()
        .filter(|s| s.is_active && Some(s.id) != shift_id)
        .flat_map(|s| s.assigned_employees.intersection(members).copied())
        .collect()
}

async fn ensure_single_active_shift(
    pool: &MySqlPool,
    shift_id: Option<u64>,
    members: &BTreeSet<u64>,
) -> Result<(), ApiError> {
    if members.is_empty() {
        return Ok(());
    }

    let shifts = db::fetch_shifts(pool).await?;
    let clashing = members_with_other_active_shift(&shifts, shift_id, members);

    if clashing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::conflict(format!(
            "Employees already assigned to another active shift: {:?}",
            clashing
        )))
    }
}

async fn replace_members(
    tx: &mut Transaction<'_, MySql>,
    shift_id: u64,
    members: &BTreeSet<u64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM shift_employees WHERE shift_id = ?")
        .bind(shift_id)
        .execute(&mut **tx)
        .await?;

    for user_id in members {
        sqlx::query("INSERT INTO shift_employees (shift_id, user_id) VALUES (?, ?)")
            .bind(shift_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn load_shift(pool: &MySqlPool, shift_id: u64) -> Result<Shift, ApiError> {
    db::fetch_shift(pool, shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift"))
}

/// List all shifts
#[utoipa::path(
    get,
    path = "/api/shifts",
    responses(
        (status = 200, description = "All shifts with their members", body = Object),
        (status = 403, description = "Admin only")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn list_shifts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let shifts = db::fetch_shifts(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(shifts))
}

/// Get a shift by id
#[utoipa::path(
    get,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift found", body = Object),
        (status = 404, description = "Shift not found")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn get_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let shift = load_shift(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// The caller's active shift
#[utoipa::path(
    get,
    path = "/api/shifts/me",
    responses(
        (status = 200, description = "Active shift of the caller", body = Object),
        (status = 404, description = "No active shift assigned")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn my_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let shifts = db::fetch_active_shifts_for_user(pool.get_ref(), auth.user_id).await?;

    match find_active_shift(&shifts, auth.user_id) {
        Some(shift) => Ok(HttpResponse::Ok().json(shift)),
        None => Err(ApiError::NotFound(
            "No active shift assigned for this employee.".into(),
        )),
    }
}

/// Create a shift
#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = CreateShift,
    responses(
        (status = 201, description = "Shift created", body = Object),
        (status = 400, description = "Start equals end"),
        (status = 409, description = "An employee already holds another active shift")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateShift>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    check_times(payload.start_time, payload.end_time)?;

    let is_active = payload.is_active.unwrap_or(true);
    let members: BTreeSet<u64> = payload
        .assigned_employees
        .iter()
        .flatten()
        .copied()
        .collect();

    if is_active {
        ensure_single_active_shift(pool.get_ref(), None, &members).await?;
    }

    let mut tx = pool.begin().await?;

    let shift_id = sqlx::query(
        r#"
        INSERT INTO shifts (shift_type, start_time, end_time, description, is_active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.shift_type.to_string())
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&payload.description)
    .bind(is_active)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    replace_members(&mut tx, shift_id, &members).await?;
    tx.commit().await?;

    info!(shift_id, admin_id = auth.user_id, "Shift created");

    let shift = load_shift(pool.get_ref(), shift_id).await?;
    Ok(HttpResponse::Created().json(shift))
}

/// Update a shift
#[utoipa::path(
    put,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    request_body = UpdateShift,
    responses(
        (status = 200, description = "Shift updated", body = Object),
        (status = 400, description = "Start equals end"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "An employee already holds another active shift")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateShift>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let shift_id = path.into_inner();
    let current = load_shift(pool.get_ref(), shift_id).await?;
    let payload = payload.into_inner();

    let start_time = payload.start_time.unwrap_or(current.start_time);
    let end_time = payload.end_time.unwrap_or(current.end_time);
    check_times(start_time, end_time)?;

    let is_active = payload.is_active.unwrap_or(current.is_active);
    let members: BTreeSet<u64> = match &payload.assigned_employees {
        Some(ids) => ids.iter().copied().collect(),
        None => current.assigned_employees.clone(),
    };

    if is_active {
        ensure_single_active_shift(pool.get_ref(), Some(shift_id), &members).await?;
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE shifts
        SET shift_type = ?, start_time = ?, end_time = ?, description = ?,
            is_active = ?, updated_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(payload.shift_type.unwrap_or(current.shift_type).to_string())
    .bind(start_time)
    .bind(end_time)
    .bind(payload.description.or(current.description))
    .bind(is_active)
    .bind(shift_id)
    .execute(&mut *tx)
    .await?;

    if payload.assigned_employees.is_some() {
        replace_members(&mut tx, shift_id, &members).await?;
    }
    tx.commit().await?;

    let shift = load_shift(pool.get_ref(), shift_id).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// Assign employees to a shift
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/assign",
    params(("id" = u64, Path, description = "Shift id")),
    request_body = ShiftMembers,
    responses(
        (status = 200, description = "Employees assigned", body = Object),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "An employee already holds another active shift")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn assign_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ShiftMembers>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let shift = load_shift(pool.get_ref(), path.into_inner()).await?;
    let added: BTreeSet<u64> = payload.user_ids.iter().copied().collect();

    if shift.is_active {
        ensure_single_active_shift(pool.get_ref(), Some(shift.id), &added).await?;
    }

    let mut tx = pool.begin().await?;
    for user_id in &added {
        sqlx::query("INSERT IGNORE INTO shift_employees (shift_id, user_id) VALUES (?, ?)")
            .bind(shift.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let shift = load_shift(pool.get_ref(), shift.id).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// Remove employees from a shift
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/unassign",
    params(("id" = u64, Path, description = "Shift id")),
    request_body = ShiftMembers,
    responses(
        (status = 200, description = "Employees removed", body = Object),
        (status = 404, description = "Shift not found")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn unassign_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ShiftMembers>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let shift = load_shift(pool.get_ref(), path.into_inner()).await?;

    let mut tx = pool.begin().await?;
    for user_id in &payload.user_ids {
        sqlx::query("DELETE FROM shift_employees WHERE shift_id = ? AND user_id = ?")
            .bind(shift.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let shift = load_shift(pool.get_ref(), shift.id).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// Delete a shift
#[utoipa::path(
    delete,
    path = "/api/shifts/{id}",
    params(("id" = u64, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift deleted", body = Object, example = json!({
            "message": "Shift deleted successfully"
        })),
        (status = 404, description = "Shift not found")
    ),
    tag = "Shift",
    security(("bearer_auth" = []))
)]
pub async fn delete_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Shift"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Shift deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn shift(id: u64, is_active: bool, members: &[u64]) -> Shift {
        Shift {
            id,
            shift_type: ShiftType::Morning,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            description: None,
            is_active,
            assigned_employees: members.iter().copied().collect(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn test_equal_start_and_end_rejected() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(check_times(nine, nine).is_err());
        assert!(check_times(nine, NaiveTime::from_hms_opt(8, 0, 0).unwrap()).is_ok());
    }

    #[test]
    fn test_clash_detection_ignores_inactive_and_self() {
        let shifts = vec![shift(1, true, &[3, 4]), shift(2, false, &[5]), shift(3, true, &[6])];
        let wanted: BTreeSet<u64> = [4, 5, 6].into_iter().collect();

        let clashing = members_with_other_active_shift(&shifts, Some(3), &wanted);
        assert_eq!(clashing.into_iter().collect::<Vec<_>>(), vec![4]);

        let clashing = members_with_other_active_shift(&shifts, None, &wanted);
        assert_eq!(clashing.into_iter().collect::<Vec<_>>(), vec![4, 6]);
    }
}
