use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeEntry {
    pub id: u64,
    pub user_id: u64,
    pub project_id: u64,
    pub task_id: Option<u64>,
    pub start_time: NaiveDateTime,
    /// `None` while the timer is still running.
    pub end_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub version: u32,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Hours between start and end; open entries have no closed duration.
    pub fn closed_hours(&self) -> Option<f64> {
        self.end_time.map(|end| hours_between(self.start_time, end))
    }

    /// Elapsed hours, measured against `now` while the entry is running.
    pub fn elapsed_hours(&self, now: NaiveDateTime) -> f64 {
        hours_between(self.start_time, self.end_time.unwrap_or(now))
    }
}

pub fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn entry(end: Option<NaiveDateTime>) -> TimeEntry {
        TimeEntry {
            id: 1,
            user_id: 1,
            project_id: 1,
            task_id: None,
            start_time: at(9, 0),
            end_time: end,
            description: None,
            version: 0,
        }
    }

    #[test]
    fn test_closed_hours_only_for_stopped_entries() {
        assert_eq!(entry(Some(at(11, 30))).closed_hours(), Some(2.5));
        assert_eq!(entry(None).closed_hours(), None);
    }

    #[test]
    fn test_running_entry_elapsed_uses_now() {
        let running = entry(None);
        assert!(running.is_running());
        assert_eq!(running.elapsed_hours(at(10, 15)), 1.25);
    }
}
