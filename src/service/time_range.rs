use chrono::{Months, NaiveDateTime, TimeDelta};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Lookback selector for reports, anchored at a caller-supplied `now`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeRange {
    Week,
    Month,
    Year,
    All,
}

#[derive(Debug, Display, PartialEq, Eq)]
#[display(fmt = "Invalid time range '{}'. Allowed: {}", token, allowed)]
pub struct InvalidRange {
    pub token: String,
    pub allowed: &'static str,
}

impl TimeRange {
    /// Parses a query token. `all` is only meaningful for reports that can
    /// average over an unbounded history.
    pub fn from_token(token: &str, allow_all: bool) -> Result<Self, InvalidRange> {
        let allowed = if allow_all {
            "week, month, year, all"
        } else {
            "week, month, year"
        };

        match token.trim().to_ascii_lowercase().parse::<TimeRange>() {
            Ok(TimeRange::All) if !allow_all => Err(InvalidRange {
                token: token.to_string(),
                allowed,
            }),
            Ok(range) => Ok(range),
            Err(_) => Err(InvalidRange {
                token: token.to_string(),
                allowed,
            }),
        }
    }

    /// Earliest instant included in the window; `None` means unbounded.
    pub fn window_start(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeRange::Week => Some(now - TimeDelta::days(7)),
            TimeRange::Month => Some(now.checked_sub_months(Months::new(1)).unwrap_or(now)),
            TimeRange::Year => Some(now.checked_sub_months(Months::new(12)).unwrap_or(now)),
            TimeRange::All => None,
        }
    }

    /// Nominal length used as the divisor for per-day averages.
    pub fn span_days(self) -> Option<f64> {
        match self {
            TimeRange::Week => Some(7.0),
            TimeRange::Month => Some(30.0),
            TimeRange::Year => Some(365.0),
            TimeRange::All => None,
        }
    }

    pub fn contains(self, instant: NaiveDateTime, now: NaiveDateTime) -> bool {
        self.window_start(now).is_none_or(|start| instant >= start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_tokens_parse_case_insensitively() {
        assert_eq!(TimeRange::from_token("week", false), Ok(TimeRange::Week));
        assert_eq!(TimeRange::from_token("Month", false), Ok(TimeRange::Month));
        assert_eq!(TimeRange::from_token(" YEAR ", false), Ok(TimeRange::Year));
        assert_eq!(TimeRange::from_token("all", true), Ok(TimeRange::All));
    }

    #[test]
    fn test_all_rejected_where_not_allowed() {
        let err = TimeRange::from_token("all", false).unwrap_err();
        assert_eq!(err.token, "all");
        assert!(err.to_string().contains("week, month, year"));
    }

    #[test]
    fn test_unknown_token_rejected() {
        assert!(TimeRange::from_token("fortnight", true).is_err());
        assert!(TimeRange::from_token("", true).is_err());
    }

    #[test]
    fn test_month_window_clamps_to_shorter_month() {
        let start = TimeRange::Month.window_start(now()).unwrap();
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(TimeRange::All.window_start(now()), None);
    }

    #[test]
    fn test_contains_is_inclusive_at_window_start() {
        let start = TimeRange::Week.window_start(now()).unwrap();
        assert!(TimeRange::Week.contains(start, now()));
        assert!(!TimeRange::Week.contains(start - TimeDelta::seconds(1), now()));
        assert!(TimeRange::All.contains(start - TimeDelta::days(999), now()));
    }
}
