use crate::{
    auth::{
        auth::AuthUser,
        handlers::{NewUser, insert_user},
        password::hash_password,
    },
    db,
    error::ApiError,
    model::{role::Role, user::User},
    utils::username_index,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Admin only
    pub role: Option<Role>,
    /// Admin only
    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "Employee")]
    pub role: String,
    pub is_active: bool,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub last_login_at: Option<NaiveDateTime>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let role = user
            .role()
            .map(|r| r.to_string())
            .unwrap_or_else(|| format!("Unknown({})", user.role_id));

        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

async fn load_user(pool: &MySqlPool, user_id: u64) -> Result<User, ApiError> {
    db::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Role and activation flag are reserved to admins.
fn check_privileged_fields(auth: &AuthUser, payload: &UpdateUser) -> Result<(), ApiError> {
    if !auth.is_admin() && (payload.role.is_some() || payload.is_active.is_some()) {
        return Err(ApiError::Forbidden(
            "Only an admin may change role or active status".into(),
        ));
    }
    Ok(())
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Admin only")
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let users: Vec<UserResponse> = db::fetch_users(pool.get_ref())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

/// Create a user with any role
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 409, description = "Username already taken")
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let user_id = insert_user(
        pool.get_ref(),
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password: &payload.password,
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            role: payload.role.unwrap_or(Role::Employee),
        },
    )
    .await?;

    info!(user_id, admin_id = auth.user_id, "User created");

    let user = load_user(pool.get_ref(), user_id).await?;
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Not self or admin"),
        (status = 404, description = "User not found")
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;
    let user = load_user(pool.get_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Not allowed to change this user or field"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username already taken")
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUser>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;
    check_privileged_fields(&auth, &payload)?;

    let current = load_user(pool.get_ref(), user_id).await?;
    let payload = payload.into_inner();

    let username = match payload.username.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::bad_request("Username must not be empty")),
        Some(new) if !new.eq_ignore_ascii_case(&current.username) => {
            let available = username_index::is_available(pool.get_ref(), new)
                .await
                .map_err(|e| {
                    error!(error = %e, "Username availability check failed");
                    ApiError::Internal
                })?;
            if !available {
                return Err(ApiError::conflict("Username already taken"));
            }
            new.to_string()
        }
        _ => current.username.clone(),
    };

    let password = match payload.password.as_deref() {
        Some("") => return Err(ApiError::bad_request("Password must not be empty")),
        Some(plain) => hash_password(plain).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            ApiError::Internal
        })?,
        None => current.password.clone(),
    };

    let role_id = payload.role.map(Role::id).unwrap_or(current.role_id);

    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password = ?, first_name = ?, last_name = ?,
            role_id = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(&username)
    .bind(payload.email.unwrap_or(current.email))
    .bind(&password)
    .bind(payload.first_name.unwrap_or(current.first_name))
    .bind(payload.last_name.unwrap_or(current.last_name))
    .bind(role_id)
    .bind(payload.is_active.unwrap_or(current.is_active))
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    if username != current.username {
        username_index::forget(&current.username).await;
        username_index::mark_taken(&username).await;
    }

    let user = load_user(pool.get_ref(), user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = Object, example = json!({
            "message": "User deleted successfully"
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let user = load_user(pool.get_ref(), path.into_inner()).await?;

    if user.id == auth.user_id {
        return Err(ApiError::bad_request("Admins cannot delete their own account"));
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    username_index::forget(&user.username).await;
    info!(user_id = user.id, admin_id = auth.user_id, "User deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "User deleted successfully"
    })))
}
