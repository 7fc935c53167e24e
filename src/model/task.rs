use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectTask {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub priority: u8,
    pub due_date: Option<NaiveDate>,
    pub assigned_user_id: Option<u64>,
    pub created_at: NaiveDateTime,
}

impl ProjectTask {
    pub fn is_done(&self) -> bool {
        self.status.parse::<TaskStatus>() == Ok(TaskStatus::Done)
    }
}
