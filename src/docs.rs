use crate::api::{
    project::{CreateProject, ProjectMembers},
    shift::{CreateShift, ShiftMembers, UpdateShift},
    task::{CreateTask, TaskAssignment, TaskStatusUpdate},
    time_entry::{CreateTimeEntry, TimeEntryResponse, UpdateTimeEntry},
    user::{CreateUser, UpdateUser, UserResponse},
};
use crate::model::{role::Role, shift::ShiftType, task::TaskStatus};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Time Tracking API",
        version = "1.0.0",
        description = r#"
## Employee Time Tracking

Employees log time against projects and tasks inside the shift they are
assigned to; administrators manage accounts, projects, tasks and shifts and
read attendance and activity reports.

### 🔹 Key Features
- **Shifts**: daily windows (overnight allowed) with a 15 minute grace period
- **Time entries**: validated against the owner's active shift, optimistic versioning
- **Projects & tasks**: membership, assignment and status tracking
- **Statistics**: hours per employee, check-in trends, attendance, activity

### 🔐 Security
All endpoints except `/auth/*` require a **JWT Bearer** access token.
Administrative operations require the **Admin** role.

### 📦 Response Format
- JSON bodies; errors are `{"message": "..."}`
- Reports are wrapped as `{"success": true, "data": ...}`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::user::list_users,
        crate::api::user::create_user,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,

        crate::api::shift::list_shifts,
        crate::api::shift::get_shift,
        crate::api::shift::my_shift,
        crate::api::shift::create_shift,
        crate::api::shift::update_shift,
        crate::api::shift::assign_employees,
        crate::api::shift::unassign_employees,
        crate::api::shift::delete_shift,

        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::user_projects,
        crate::api::project::create_project,
        crate::api::project::update_project,
        crate::api::project::set_project_users,
        crate::api::project::delete_project,

        crate::api::task::list_tasks,
        crate::api::task::get_task,
        crate::api::task::project_tasks,
        crate::api::task::user_tasks,
        crate::api::task::create_task,
        crate::api::task::update_task,
        crate::api::task::update_task_status,
        crate::api::task::assign_task,
        crate::api::task::delete_task,

        crate::api::time_entry::list_time_entries,
        crate::api::time_entry::get_time_entry,
        crate::api::time_entry::user_time_entries,
        crate::api::time_entry::create_time_entry,
        crate::api::time_entry::update_time_entry,
        crate::api::time_entry::stop_time_entry,
        crate::api::time_entry::delete_time_entry,

        crate::api::statistics::summary,
        crate::api::statistics::employee_hours,
        crate::api::statistics::checkin_trends,
        crate::api::statistics::attendance,
        crate::api::statistics::active_employees
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            Role,
            CreateUser,
            UpdateUser,
            UserResponse,
            ShiftType,
            CreateShift,
            UpdateShift,
            ShiftMembers,
            CreateProject,
            ProjectMembers,
            TaskStatus,
            CreateTask,
            TaskStatusUpdate,
            TaskAssignment,
            CreateTimeEntry,
            UpdateTimeEntry,
            TimeEntryResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "User", description = "Account management"),
        (name = "Shift", description = "Shift scheduling"),
        (name = "Project", description = "Project management"),
        (name = "Task", description = "Task management"),
        (name = "TimeEntry", description = "Time logging"),
        (name = "Statistics", description = "Admin reports"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
