//! Admin reports. Each handler loads the collections it needs, reads the
//! clock once and hands both to `service::statistics`.

use crate::{
    auth::auth::AuthUser,
    db,
    error::ApiError,
    service::{
        statistics::{self, TrendView},
        time_range::TimeRange,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatisticsQuery {
    /// `week`, `month`, `year` (`all` for employee hours only)
    pub time_range: Option<String>,
    /// `hourly` or `daily`, check-in trends only
    pub view_type: Option<String>,
}

impl StatisticsQuery {
    fn range(&self, default: TimeRange, allow_all: bool) -> Result<TimeRange, ApiError> {
        match self.time_range.as_deref() {
            None => Ok(default),
            Some(token) => Ok(TimeRange::from_token(token, allow_all)?),
        }
    }

    fn view(&self) -> Result<TrendView, ApiError> {
        match self.view_type.as_deref() {
            None => Ok(TrendView::Daily),
            Some(token) => token.trim().to_ascii_lowercase().parse().map_err(|_| {
                ApiError::bad_request(format!(
                    "Invalid view type '{token}'. Allowed: hourly, daily"
                ))
            }),
        }
    }
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "data": data
    }))
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Global summary
#[utoipa::path(
    get,
    path = "/api/statistics",
    responses(
        (status = 200, description = "Counts, task breakdown, top users and shift distribution", body = Object),
        (status = 403, description = "Admin only")
    ),
    tag = "Statistics",
    security(("bearer_auth" = []))
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let pool = pool.get_ref();

    let (users, projects, tasks, shifts, entries) = futures::try_join!(
        db::fetch_users(pool),
        db::fetch_projects(pool),
        db::fetch_tasks(pool),
        db::fetch_shifts(pool),
        db::fetch_time_entries_since(pool, None),
    )?;

    let report = statistics::summary(&users, &projects, &tasks, &shifts, &entries);
    Ok(success(report))
}

/// Hours per employee
#[utoipa::path(
    get,
    path = "/api/statistics/employee-hours",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Total and average hours per employee", body = Object),
        (status = 400, description = "Unknown time range")
    ),
    tag = "Statistics",
    security(("bearer_auth" = []))
)]
pub async fn employee_hours(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let range = query.range(TimeRange::Week, true)?;
    let now = now();
    let pool = pool.get_ref();

    debug!(?range, "Employee hours report");

    let (users, entries) = futures::try_join!(
        db::fetch_users(pool),
        db::fetch_time_entries_since(pool, range.window_start(now)),
    )?;

    Ok(success(statistics::employee_hours(&users, &entries, range, now)))
}

/// Check-in and check-out distribution
#[utoipa::path(
    get,
    path = "/api/statistics/checkin-trends",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Hourly or weekday buckets of check-ins and check-outs", body = Object),
        (status = 400, description = "Unknown time range or view type")
    ),
    tag = "Statistics",
    security(("bearer_auth" = []))
)]
pub async fn checkin_trends(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let range = query.range(TimeRange::Week, false)?;
    let view = query.view()?;
    let now = now();

    let entries = db::fetch_time_entries_since(pool.get_ref(), range.window_start(now)).await?;

    Ok(success(statistics::check_in_out_trends(
        &entries, range, view, now,
    )))
}

/// Attendance, lateness and absences
#[utoipa::path(
    get,
    path = "/api/statistics/attendance",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Per-employee attendance with daily late/absence counts", body = Object),
        (status = 400, description = "Unknown time range")
    ),
    tag = "Statistics",
    security(("bearer_auth" = []))
)]
pub async fn attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let range = query.range(TimeRange::Month, false)?;
    let now = now();
    let pool = pool.get_ref();

    let (users, entries) = futures::try_join!(
        db::fetch_users(pool),
        db::fetch_time_entries_since(pool, range.window_start(now)),
    )?;

    Ok(success(statistics::attendance(&users, &entries, range, now)))
}

/// Most active employees
#[utoipa::path(
    get,
    path = "/api/statistics/active-employees",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Top employees, project distribution and completion rates", body = Object),
        (status = 400, description = "Unknown time range")
    ),
    tag = "Statistics",
    security(("bearer_auth" = []))
)]
pub async fn active_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let range = query.range(TimeRange::Month, false)?;
    let now = now();
    let pool = pool.get_ref();

    let (users, projects, entries) = futures::try_join!(
        db::fetch_users(pool),
        db::fetch_projects(pool),
        db::fetch_time_entries_since(pool, range.window_start(now)),
    )?;

    Ok(success(statistics::most_active_employees(
        &users, &projects, &entries, range, now,
    )))
}
