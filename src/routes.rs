use crate::{
    api::{project, shift, statistics, task, time_entry, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiter; `None` when the governor rejects the quota.
fn build_limiter(requests_per_min: u32) -> Option<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Arc::new(Governor::new(&cfg)))
}

/// Rate limiters shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let build = |name: &str, per_min: u32| {
            build_limiter(per_min)
                .ok_or_else(|| format!("Invalid rate limit for {name}: {per_min} per minute"))
        };

        Ok(Self {
            login: build("login", config.rate_login_per_min)?,
            register: build("register", config.rate_register_per_min)?,
            refresh: build("refresh", config.rate_refresh_per_min)?,
            protected: build("protected routes", config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: Limiters) {
    let Limiters {
        login: login_limiter,
        register: register_limiter,
        refresh: refresh_limiter,
        protected: protected_limiter,
    } = limiters;

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::get().to(user::list_users))
                            .route(web::post().to(user::create_user)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/shifts")
                    .service(
                        web::resource("")
                            .route(web::get().to(shift::list_shifts))
                            .route(web::post().to(shift::create_shift)),
                    )
                    // before /{id} so "me" is not parsed as an id
                    .service(web::resource("/me").route(web::get().to(shift::my_shift)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(shift::get_shift))
                            .route(web::put().to(shift::update_shift))
                            .route(web::delete().to(shift::delete_shift)),
                    )
                    .service(
                        web::resource("/{id}/assign")
                            .route(web::post().to(shift::assign_employees)),
                    )
                    .service(
                        web::resource("/{id}/unassign")
                            .route(web::post().to(shift::unassign_employees)),
                    ),
            )
            .service(
                web::scope("/projects")
                    .service(
                        web::resource("")
                            .route(web::get().to(project::list_projects))
                            .route(web::post().to(project::create_project)),
                    )
                    .service(
                        web::resource("/user/{user_id}")
                            .route(web::get().to(project::user_projects)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(project::get_project))
                            .route(web::put().to(project::update_project))
                            .route(web::delete().to(project::delete_project)),
                    )
                    .service(
                        web::resource("/{id}/users")
                            .route(web::post().to(project::set_project_users)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("")
                            .route(web::get().to(task::list_tasks))
                            .route(web::post().to(task::create_task)),
                    )
                    .service(
                        web::resource("/project/{project_id}")
                            .route(web::get().to(task::project_tasks)),
                    )
                    .service(web::resource("/user/{user_id}").route(web::get().to(task::user_tasks)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(task::get_task))
                            .route(web::put().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    )
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(task::update_task_status)),
                    )
                    .service(web::resource("/{id}/assign").route(web::put().to(task::assign_task))),
            )
            .service(
                web::scope("/time-entries")
                    .service(
                        web::resource("")
                            .route(web::get().to(time_entry::list_time_entries))
                            .route(web::post().to(time_entry::create_time_entry)),
                    )
                    .service(
                        web::resource("/user/{user_id}")
                            .route(web::get().to(time_entry::user_time_entries)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(time_entry::get_time_entry))
                            .route(web::put().to(time_entry::update_time_entry))
                            .route(web::delete().to(time_entry::delete_time_entry)),
                    )
                    .service(
                        web::resource("/{id}/stop")
                            .route(web::put().to(time_entry::stop_time_entry)),
                    ),
            )
            .service(
                web::scope("/statistics")
                    .service(web::resource("").route(web::get().to(statistics::summary)))
                    .service(
                        web::resource("/employee-hours")
                            .route(web::get().to(statistics::employee_hours)),
                    )
                    .service(
                        web::resource("/checkin-trends")
                            .route(web::get().to(statistics::checkin_trends)),
                    )
                    .service(
                        web::resource("/attendance").route(web::get().to(statistics::attendance)),
                    )
                    .service(
                        web::resource("/active-employees")
                            .route(web::get().to(statistics::active_employees)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_quota_bounds() {
        // a zero burst is not a quota
        assert!(build_limiter(0).is_none());
        assert!(build_limiter(1).is_some());
        assert!(build_limiter(1000).is_some());
        assert!(build_limiter(120_000).is_some());
    }
}
