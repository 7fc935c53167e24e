//! Admissibility of check-in/check-out instants against an employee's shift.
//!
//! A shift window is the shift's time-of-day interval widened by a fixed
//! grace period on both sides. Overnight shifts (end before start) wrap past
//! midnight, and the grace period itself may push either edge across
//! midnight. Both cases are handled by placing the window on a seconds axis
//! that may run below 0 or past 24h, and testing the instant's time-of-day
//! at its own position as well as one day earlier and later.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use derive_more::Display;

use crate::model::shift::Shift;

pub const GRACE_PERIOD_MINUTES: i64 = 15;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const GRACE_SECONDS: i64 = GRACE_PERIOD_MINUTES * 60;

/// Why an instant was refused. Expected outcome, not a fault.
#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum ShiftRejection {
    #[display(fmt = "No active shift assigned for this employee.")]
    NoActiveShift,
    #[display(
        fmt = "Time entry is outside of your scheduled shift ({} - {}). Please contact your supervisor if you need to work outside your scheduled hours.",
        "start.format(\"%H:%M\")",
        "end.format(\"%H:%M\")"
    )]
    OutsideShift { start: NaiveTime, end: NaiveTime },
}

/// Shift window in seconds relative to midnight of the shift's start day.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShiftWindow {
    earliest: i64,
    latest: i64,
}

impl ShiftWindow {
    pub fn for_shift(shift: &Shift) -> Self {
        let start_secs = seconds_of_day(shift.start_time);
        let mut end_secs = seconds_of_day(shift.end_time);
        if shift.is_overnight() {
            end_secs += SECONDS_PER_DAY;
        }

        Self {
            earliest: start_secs - GRACE_SECONDS,
            latest: end_secs + GRACE_SECONDS,
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let t = seconds_of_day(time);
        [t - SECONDS_PER_DAY, t, t + SECONDS_PER_DAY]
            .into_iter()
            .any(|candidate| self.earliest <= candidate && candidate <= self.latest)
    }
}

fn seconds_of_day(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64
}

/// Picks the active shift that lists `user_id` among its members.
///
/// More than one match is treated as a data problem upstream; the lowest id
/// wins so repeated calls agree.
pub fn find_active_shift(shifts: &[Shift], user_id: u64) -> Option<&Shift> {
    shifts
        .iter()
        .filter(|s| s.is_active && s.is_assigned(user_id))
        .min_by_key(|s| s.id)
}

pub fn validate_instant(
    shift: Option<&Shift>,
    instant: NaiveDateTime,
) -> Result<(), ShiftRejection> {
    let shift = shift.ok_or(ShiftRejection::NoActiveShift)?;

    if ShiftWindow::for_shift(shift).contains(instant.time()) {
        Ok(())
    } else {
        Err(ShiftRejection::OutsideShift {
            start: shift.start_time,
            end: shift.end_time,
        })
    }
}

/// Checks `start`, then `end` when present; the first rejection wins.
pub fn validate_range(
    shift: Option<&Shift>,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
) -> Result<(), ShiftRejection> {
    validate_instant(shift, start)?;
    if let Some(end) = end {
        validate_instant(shift, end)?;
    }
    Ok(())
}

/// Convenience over a user's candidate shifts, as loaded by the store.
pub fn validate_user_range(
    shifts: &[Shift],
    user_id: u64,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
) -> Result<(), ShiftRejection> {
    validate_range(find_active_shift(shifts, user_id), start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shift::ShiftType;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_time(hm(h, m))
    }

    fn shift(id: u64, start: NaiveTime, end: NaiveTime, members: &[u64]) -> Shift {
        Shift {
            id,
            shift_type: ShiftType::Morning,
            start_time: start,
            end_time: end,
            description: None,
            is_active: true,
            assigned_employees: members.iter().copied().collect::<BTreeSet<_>>(),
            created_at: at(0, 0),
            updated_at: None,
        }
    }

    #[test]
    fn test_day_shift_grace_boundaries() {
        let day = shift(1, hm(9, 0), hm(17, 0), &[7]);
        assert!(validate_instant(Some(&day), at(8, 45)).is_ok());
        assert!(validate_instant(Some(&day), at(17, 15)).is_ok());
        assert!(validate_instant(Some(&day), at(12, 0)).is_ok());
        assert!(validate_instant(Some(&day), at(8, 44)).is_err());
        assert!(validate_instant(Some(&day), at(17, 16)).is_err());
    }

    #[test]
    fn test_day_shift_rejects_second_past_grace() {
        let day = shift(1, hm(9, 0), hm(17, 0), &[7]);
        let late = at(17, 15) + chrono::TimeDelta::seconds(1);
        assert!(validate_instant(Some(&day), late).is_err());
    }

    #[test]
    fn test_overnight_shift_wraps_midnight() {
        let night = shift(2, hm(22, 0), hm(6, 0), &[7]);
        assert!(night.is_overnight());
        for ok in [at(21, 45), at(23, 59), at(0, 0), at(3, 30), at(6, 14)] {
            assert!(validate_instant(Some(&night), ok).is_ok(), "{ok} should pass");
        }
        for bad in [at(6, 16), at(21, 44), at(12, 0)] {
            assert!(validate_instant(Some(&night), bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_grace_before_start_crosses_midnight() {
        let early = shift(3, hm(0, 10), hm(8, 0), &[7]);
        assert!(!early.is_overnight());
        assert!(validate_instant(Some(&early), at(23, 55)).is_ok());
        assert!(validate_instant(Some(&early), at(0, 0)).is_ok());
        assert!(validate_instant(Some(&early), at(23, 54)).is_err());
        assert!(validate_instant(Some(&early), at(8, 16)).is_err());
    }

    #[test]
    fn test_grace_after_end_crosses_midnight() {
        let evening = shift(4, hm(16, 0), hm(23, 50), &[7]);
        assert!(validate_instant(Some(&evening), at(0, 5)).is_ok());
        assert!(validate_instant(Some(&evening), at(0, 6)).is_err());
        assert!(validate_instant(Some(&evening), at(15, 44)).is_err());
    }

    #[test]
    fn test_missing_shift_always_rejected() {
        for instant in [at(0, 0), at(9, 0), at(23, 59)] {
            let err = validate_instant(None, instant).unwrap_err();
            assert_eq!(err, ShiftRejection::NoActiveShift);
            assert!(err.to_string().contains("No active shift"));
        }
    }

    #[test]
    fn test_rejection_reason_names_shift_hours() {
        let day = shift(1, hm(9, 0), hm(17, 30), &[7]);
        let reason = validate_instant(Some(&day), at(20, 0)).unwrap_err().to_string();
        assert!(reason.contains("(09:00 - 17:30)"), "{reason}");
    }

    #[test]
    fn test_range_short_circuits_on_first_failure() {
        let day = shift(1, hm(9, 0), hm(17, 0), &[7]);
        assert!(validate_range(Some(&day), at(9, 0), Some(at(17, 0))).is_ok());
        assert!(validate_range(Some(&day), at(9, 0), None).is_ok());
        assert!(validate_range(Some(&day), at(9, 0), Some(at(19, 0))).is_err());
        assert_eq!(
            validate_range(None, at(9, 0), Some(at(19, 0))),
            Err(ShiftRejection::NoActiveShift)
        );
    }

    #[test]
    fn test_find_active_shift_skips_inactive_and_foreign() {
        let mut inactive = shift(1, hm(9, 0), hm(17, 0), &[7]);
        inactive.is_active = false;
        let foreign = shift(2, hm(9, 0), hm(17, 0), &[8]);
        let mine_late = shift(5, hm(22, 0), hm(6, 0), &[7]);
        let mine_early = shift(3, hm(6, 0), hm(14, 0), &[7, 8]);
        let shifts = vec![inactive, foreign, mine_late, mine_early];

        assert_eq!(find_active_shift(&shifts, 7).map(|s| s.id), Some(3));
        assert_eq!(find_active_shift(&shifts, 8).map(|s| s.id), Some(2));
        assert!(find_active_shift(&shifts, 9).is_none());
    }

    #[test]
    fn test_validate_user_range_uses_user_shift() {
        let shifts = vec![shift(1, hm(22, 0), hm(6, 0), &[7])];
        assert!(validate_user_range(&shifts, 7, at(22, 30), Some(at(5, 50))).is_ok());
        assert_eq!(
            validate_user_range(&shifts, 8, at(22, 30), None),
            Err(ShiftRejection::NoActiveShift)
        );
    }

    #[test]
    fn test_validation_is_repeatable() {
        let day = shift(1, hm(9, 0), hm(17, 0), &[7]);
        let first = validate_instant(Some(&day), at(18, 0));
        let second = validate_instant(Some(&day), at(18, 0));
        assert_eq!(first, second);
    }
}
