use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    // Set by `auth_middleware` on protected scopes.
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token =
        bearer_token(req).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;

    let config = req.app_data::<Data<Config>>().ok_or_else(|| {
        tracing::error!("Config missing from app data");
        ApiError::Internal
    })?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role)
        .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
    })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    /// Owners may act on their own records; admins on anyone's.
    pub fn require_self_or_admin(&self, owner_id: u64) -> Result<(), ApiError> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed to access this resource".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::test::TestRequest;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "test-secret".into(),
            server_addr: String::new(),
            access_token_ttl: 60,
            refresh_token_ttl: 60,
            rate_login_per_min: 60,
            rate_register_per_min: 60,
            rate_refresh_per_min: 60,
            rate_protected_per_min: 60,
            api_prefix: "/api".into(),
            log_dir: "logs".into(),
        }
    }

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 5,
            username: "alice".into(),
            role,
        }
    }

    #[test]
    fn test_capability_checks() {
        assert!(user(Role::Admin).require_admin().is_ok());
        assert!(user(Role::Employee).require_admin().is_err());
        assert!(user(Role::Employee).require_self_or_admin(5).is_ok());
        assert!(user(Role::Employee).require_self_or_admin(6).is_err());
        assert!(user(Role::Admin).require_self_or_admin(6).is_ok());
    }

    #[actix_web::test]
    async fn test_extracts_user_from_access_token() {
        let token = generate_access_token(9, "bob".into(), Role::Admin.id(), "test-secret", 60)
            .unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let auth = AuthUser::extract(&req).await.unwrap();
        assert_eq!(auth.user_id, 9);
        assert_eq!(auth.role, Role::Admin);
    }

    #[actix_web::test]
    async fn test_refresh_token_not_accepted_as_access() {
        let (token, _) =
            generate_refresh_token(9, "bob".into(), Role::Admin.id(), "test-secret", 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[actix_web::test]
    async fn test_missing_header_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .to_http_request();

        match AuthUser::extract(&req).await {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Missing token"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
