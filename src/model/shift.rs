use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Advisory label only; validation never looks at it.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter, ToSchema,
)]
pub enum ShiftType {
    Morning,
    Evening,
    Night,
}

#[derive(Debug, Clone, Serialize)]
pub struct Shift {
    pub id: u64,
    pub shift_type: ShiftType,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub description: Option<String>,
    pub is_active: bool,
    pub assigned_employees: BTreeSet<u64>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Shift {
    /// Overnight shifts end on the calendar day after they start.
    pub fn is_overnight(&self) -> bool {
        self.end_time < self.start_time
    }

    pub fn is_assigned(&self, user_id: u64) -> bool {
        self.assigned_employees.contains(&user_id)
    }
}

/// Row shape of the `shifts` table; members come from `shift_employees`.
#[derive(Debug, sqlx::FromRow)]
pub struct ShiftRow {
    pub id: u64,
    pub shift_type: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl ShiftRow {
    pub fn into_shift(self, assigned_employees: BTreeSet<u64>) -> Result<Shift, strum::ParseError> {
        Ok(Shift {
            id: self.id,
            shift_type: self.shift_type.parse()?,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description,
            is_active: self.is_active,
            assigned_employees,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
