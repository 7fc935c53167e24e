//! Read-only reporting over materialized users, projects, tasks, shifts and
//! time entries. Every function is pure: same inputs and `now`, same output.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use serde::Serialize;
use strum::{Display, EnumString, IntoEnumIterator};

use crate::model::{
    project::Project,
    shift::{Shift, ShiftType},
    task::ProjectTask,
    time_entry::{TimeEntry, hours_between},
    user::User,
};

use super::time_range::TimeRange;

const TOP_ACTIVE_EMPLOYEES: usize = 6;
const TOP_PROJECTS: usize = 6;
const TOP_TASK_COMPLETION: usize = 5;
const TOP_SUMMARY_USERS: usize = 5;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Check-ins strictly after this time of day are late.
pub const LATE_THRESHOLD: NaiveTime = match NaiveTime::from_hms_opt(9, 0, 0) {
    Some(time) => time,
    None => panic!("09:00 is a valid time of day"),
};

/// Rounds half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / whole as f64)
}

fn in_range<'a>(
    entries: &'a [TimeEntry],
    range: TimeRange,
    now: NaiveDateTime,
) -> impl Iterator<Item = &'a TimeEntry> + 'a {
    entries
        .iter()
        .filter(move |e| range.contains(e.start_time, now))
}

fn by_user<'a>(entries: impl Iterator<Item = &'a TimeEntry>) -> BTreeMap<u64, Vec<&'a TimeEntry>> {
    let mut grouped: BTreeMap<u64, Vec<&TimeEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.user_id).or_default().push(entry);
    }
    grouped
}

fn closed_hours_sum<'a>(entries: impl IntoIterator<Item = &'a &'a TimeEntry>) -> f64 {
    entries.into_iter().filter_map(|e| e.closed_hours()).sum()
}

fn distinct_projects(entries: &[&TimeEntry]) -> usize {
    entries
        .iter()
        .map(|e| e.project_id)
        .collect::<BTreeSet<_>>()
        .len()
}

// ---------------------------------------------------------------------------
// Employee hours
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeHours {
    pub user_id: u64,
    pub user_name: String,
    pub total_hours: f64,
    pub project_count: usize,
    pub average_hours_per_day: f64,
}

pub fn employee_hours(
    users: &[User],
    entries: &[TimeEntry],
    range: TimeRange,
    now: NaiveDateTime,
) -> Vec<EmployeeHours> {
    let grouped = by_user(in_range(entries, range, now));
    let empty = Vec::new();

    users
        .iter()
        .map(|user| {
            let mine = grouped.get(&user.id).unwrap_or(&empty);
            let closed: Vec<&TimeEntry> = mine
                .iter()
                .copied()
                .filter(|e| !e.is_running())
                .collect();
            let total_hours = closed_hours_sum(&closed);

            let average_hours_per_day = match closed.iter().map(|e| e.start_time).min() {
                None => 0.0,
                Some(first_start) => {
                    // `all`: days since the first closed entry, floored at one day.
                    let span = range
                        .span_days()
                        .unwrap_or_else(|| (hours_between(first_start, now) / 24.0).max(1.0));
                    total_hours / span
                }
            };

            EmployeeHours {
                user_id: user.id,
                user_name: user.username.clone(),
                total_hours,
                project_count: distinct_projects(mine),
                average_hours_per_day,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Check-in / check-out trends
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TrendView {
    Hourly,
    Daily,
}

impl TrendView {
    fn labels(self) -> Vec<String> {
        match self {
            TrendView::Hourly => (0..24).map(|h| h.to_string()).collect(),
            TrendView::Daily => DAY_NAMES.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn bucket_of(self, instant: NaiveDateTime) -> usize {
        match self {
            TrendView::Hourly => instant.hour() as usize,
            TrendView::Daily => instant.weekday().num_days_from_monday() as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendBucket {
    pub time: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInOutTrends {
    pub check_in_trends: Vec<TrendBucket>,
    pub check_out_trends: Vec<TrendBucket>,
}

fn histogram(view: TrendView, instants: impl Iterator<Item = NaiveDateTime>) -> Vec<TrendBucket> {
    let mut buckets: Vec<TrendBucket> = view
        .labels()
        .into_iter()
        .map(|time| TrendBucket { time, count: 0 })
        .collect();

    for instant in instants {
        buckets[view.bucket_of(instant)].count += 1;
    }
    buckets
}

pub fn check_in_out_trends(
    entries: &[TimeEntry],
    range: TimeRange,
    view: TrendView,
    now: NaiveDateTime,
) -> CheckInOutTrends {
    CheckInOutTrends {
        check_in_trends: histogram(view, in_range(entries, range, now).map(|e| e.start_time)),
        check_out_trends: histogram(view, in_range(entries, range, now).filter_map(|e| e.end_time)),
    }
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display)]
pub enum AttendanceStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

pub fn attendance_status(rate: f64, late_count: u32) -> AttendanceStatus {
    if rate >= 95.0 && late_count <= 1 {
        AttendanceStatus::Excellent
    } else if rate >= 90.0 && late_count <= 3 {
        AttendanceStatus::Good
    } else if rate >= 85.0 && late_count <= 5 {
        AttendanceStatus::Fair
    } else {
        AttendanceStatus::Poor
    }
}

/// Monday to Friday dates strictly after `after` up to and including `through`.
pub fn workdays_between(after: NaiveDate, through: NaiveDate) -> Vec<NaiveDate> {
    after
        .iter_days()
        .skip(1)
        .take_while(|d| *d <= through)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeAttendance {
    pub user_id: u64,
    pub user_name: String,
    pub days_present: u32,
    pub total_workdays: u32,
    pub absence_count: u32,
    pub late_count: u32,
    pub attendance_rate: f64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceReport {
    pub late_arrivals: Vec<DateCount>,
    pub absences: Vec<DateCount>,
    pub summary_by_employee: Vec<EmployeeAttendance>,
}

/// Per workday: whether any entry starts that day, and how many start late.
/// Entries on other dates do not count towards either figure.
fn check_ins_by_workday(
    entries: &[&TimeEntry],
    workdays: &BTreeSet<NaiveDate>,
) -> BTreeMap<NaiveDate, u32> {
    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for entry in entries {
        let date = entry.start_time.date();
        if !workdays.contains(&date) {
            continue;
        }
        let late = days.entry(date).or_default();
        if entry.start_time.time() > LATE_THRESHOLD {
            *late += 1;
        }
    }
    days
}

pub fn attendance(
    users: &[User],
    entries: &[TimeEntry],
    range: TimeRange,
    now: NaiveDateTime,
) -> AttendanceReport {
    let grouped = by_user(in_range(entries, range, now));
    let window_start = range
        .window_start(now)
        .or_else(|| entries.iter().map(|e| e.start_time - TimeDelta::days(1)).min())
        .unwrap_or(now);
    let workdays = workdays_between(window_start.date(), now.date());
    let total_workdays = workdays.len() as u32;
    let workday_set: BTreeSet<NaiveDate> = workdays.iter().copied().collect();

    let mut late_by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut absent_by_date: BTreeMap<NaiveDate, u32> =
        workdays.iter().map(|d| (*d, 0)).collect();
    let mut summary_by_employee = Vec::new();
    let empty = Vec::new();

    for user in users.iter().filter(|u| u.is_active && u.is_employee()) {
        let mine = grouped.get(&user.id).unwrap_or(&empty);
        let check_ins = check_ins_by_workday(mine, &workday_set);

        let mut days_present = 0;
        for day in &workdays {
            if check_ins.contains_key(day) {
                days_present += 1;
            } else if let Some(count) = absent_by_date.get_mut(day) {
                *count += 1;
            }
        }

        let mut late_count = 0;
        for (day, late) in &check_ins {
            if *late > 0 {
                late_count += late;
                *late_by_date.entry(*day).or_default() += late;
            }
        }

        let attendance_rate = percentage(days_present, total_workdays);
        summary_by_employee.push(EmployeeAttendance {
            user_id: user.id,
            user_name: user.username.clone(),
            days_present,
            total_workdays,
            absence_count: total_workdays - days_present,
            late_count,
            attendance_rate,
            status: attendance_status(attendance_rate, late_count),
        });
    }

    AttendanceReport {
        late_arrivals: late_by_date
            .into_iter()
            .map(|(date, count)| DateCount { date, count })
            .collect(),
        absences: absent_by_date
            .into_iter()
            .map(|(date, count)| DateCount { date, count })
            .collect(),
        summary_by_employee,
    }
}

// ---------------------------------------------------------------------------
// Most active employees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveEmployee {
    pub user_id: u64,
    pub user_name: String,
    pub hours_worked: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectShare {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCompletion {
    pub user_id: u64,
    pub user_name: String,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveEmployeesReport {
    pub top_employees: Vec<ActiveEmployee>,
    pub project_distribution: Vec<ProjectShare>,
    pub task_completion: Vec<TaskCompletion>,
}

pub fn most_active_employees(
    users: &[User],
    projects: &[Project],
    entries: &[TimeEntry],
    range: TimeRange,
    now: NaiveDateTime,
) -> ActiveEmployeesReport {
    let grouped = by_user(in_range(entries, range, now));
    let names: HashMap<u64, &str> = users.iter().map(|u| (u.id, u.username.as_str())).collect();

    let mut top_employees: Vec<ActiveEmployee> = grouped
        .iter()
        .filter_map(|(user_id, mine)| {
            Some(ActiveEmployee {
                user_id: *user_id,
                user_name: names.get(user_id)?.to_string(),
                hours_worked: closed_hours_sum(mine),
                project_count: distinct_projects(mine),
            })
        })
        .collect();
    top_employees.sort_by(|a, b| {
        b.hours_worked
            .total_cmp(&a.hours_worked)
            .then(a.user_id.cmp(&b.user_id))
    });
    top_employees.truncate(TOP_ACTIVE_EMPLOYEES);

    let project_names: HashMap<u64, &str> =
        projects.iter().map(|p| (p.id, p.name.as_str())).collect();
    let mut per_project: BTreeMap<&str, u32> = BTreeMap::new();
    for entry in in_range(entries, range, now) {
        if let Some(name) = project_names.get(&entry.project_id) {
            *per_project.entry(*name).or_default() += 1;
        }
    }
    let mut project_distribution: Vec<ProjectShare> = per_project
        .into_iter()
        .map(|(name, value)| ProjectShare {
            name: name.to_string(),
            value,
        })
        .collect();
    // BTreeMap order already breaks ties by name; the sort is stable.
    project_distribution.sort_by(|a, b| b.value.cmp(&a.value));
    project_distribution.truncate(TOP_PROJECTS);

    let mut task_completion: Vec<TaskCompletion> = grouped
        .iter()
        .filter_map(|(user_id, mine)| {
            let total_tasks = mine.len() as u32;
            let completed_tasks = mine.iter().filter(|e| !e.is_running()).count() as u32;
            Some(TaskCompletion {
                user_id: *user_id,
                user_name: names.get(user_id)?.to_string(),
                completed_tasks,
                total_tasks,
                completion_rate: percentage(completed_tasks, total_tasks),
            })
        })
        .collect();
    task_completion.sort_by(|a, b| {
        b.completion_rate
            .total_cmp(&a.completion_rate)
            .then(a.user_id.cmp(&b.user_id))
    });
    task_completion.truncate(TOP_TASK_COMPLETION);

    ActiveEmployeesReport {
        top_employees,
        project_distribution,
        task_completion,
    }
}

// ---------------------------------------------------------------------------
// Global summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserHoursSummary {
    pub user_id: u64,
    pub username: String,
    pub total_hours: f64,
    pub completed_tasks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub total_users: usize,
    pub active_users: usize,
    pub total_projects: usize,
    pub active_projects: usize,
    pub total_tasks: usize,
    pub tasks_by_status: BTreeMap<String, u32>,
    pub average_time_per_project: BTreeMap<String, f64>,
    pub top_users_by_hours: Vec<UserHoursSummary>,
    pub shift_distribution: BTreeMap<String, u32>,
}

pub fn summary(
    users: &[User],
    projects: &[Project],
    tasks: &[ProjectTask],
    shifts: &[Shift],
    entries: &[TimeEntry],
) -> StatisticsSummary {
    let mut tasks_by_status: BTreeMap<String, u32> = BTreeMap::new();
    for task in tasks {
        *tasks_by_status.entry(task.status.clone()).or_default() += 1;
    }

    let mut average_time_per_project = BTreeMap::new();
    for project in projects {
        let durations: Vec<f64> = entries
            .iter()
            .filter(|e| e.project_id == project.id)
            .filter_map(|e| e.closed_hours())
            .collect();
        if !durations.is_empty() {
            let average = durations.iter().sum::<f64>() / durations.len() as f64;
            average_time_per_project.insert(project.name.clone(), average);
        }
    }

    let grouped = by_user(entries.iter());
    let mut top_users_by_hours: Vec<UserHoursSummary> = users
        .iter()
        .map(|user| UserHoursSummary {
            user_id: user.id,
            username: user.username.clone(),
            total_hours: grouped
                .get(&user.id)
                .map(|mine| closed_hours_sum(mine))
                .unwrap_or(0.0),
            completed_tasks: tasks
                .iter()
                .filter(|t| t.assigned_user_id == Some(user.id) && t.is_done())
                .count() as u32,
        })
        .collect();
    top_users_by_hours.sort_by(|a, b| {
        b.total_hours
            .total_cmp(&a.total_hours)
            .then(a.user_id.cmp(&b.user_id))
    });
    top_users_by_hours.truncate(TOP_SUMMARY_USERS);

    let mut shift_distribution: BTreeMap<String, u32> =
        ShiftType::iter().map(|t| (t.to_string(), 0)).collect();
    for shift in shifts {
        *shift_distribution
            .entry(shift.shift_type.to_string())
            .or_default() += 1;
    }

    StatisticsSummary {
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.is_active).count(),
        total_projects: projects.len(),
        active_projects: projects.iter().filter(|p| p.is_active).count(),
        total_tasks: tasks.len(),
        tasks_by_status,
        average_time_per_project,
        top_users_by_hours,
        shift_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    // June 2025: the 9th is a Monday, the 13th a Friday.
    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn now() -> NaiveDateTime {
        at(13, 18, 0)
    }

    fn user(id: u64, name: &str, role: Role, active: bool) -> User {
        User {
            id,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: String::new(),
            first_name: name.to_string(),
            last_name: "Test".to_string(),
            role_id: role.id(),
            is_active: active,
            created_at: at(1, 0, 0),
            last_login_at: None,
        }
    }

    fn employee(id: u64, name: &str) -> User {
        user(id, name, Role::Employee, true)
    }

    fn entry(
        id: u64,
        user_id: u64,
        project_id: u64,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> TimeEntry {
        TimeEntry {
            id,
            user_id,
            project_id,
            task_id: None,
            start_time: start,
            end_time: end,
            description: None,
            version: 0,
        }
    }

    fn project(id: u64, name: &str, active: bool) -> Project {
        Project {
            id,
            name: name.to_string(),
            description: None,
            status: "Active".to_string(),
            start_date: day(1),
            end_date: None,
            is_active: active,
            created_at: at(1, 0, 0),
        }
    }

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(66.66), 66.7);
        assert_eq!(round1(12.25), 12.3);
        assert_eq!(round1(-12.25), -12.3);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_employee_hours_sums_closed_entries_only() {
        let users = vec![employee(1, "alice")];
        let entries = vec![
            entry(1, 1, 10, at(9, 9, 0), Some(at(9, 11, 30))),
            entry(2, 1, 10, at(10, 9, 0), Some(at(10, 10, 15))),
            entry(3, 1, 11, at(11, 9, 0), None),
        ];

        let stats = employee_hours(&users, &entries, TimeRange::Week, now());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_hours, 3.75);
        assert_eq!(stats[0].project_count, 2);
        assert_eq!(stats[0].average_hours_per_day, 3.75 / 7.0);
    }

    #[test]
    fn test_employee_hours_ignores_entries_before_window() {
        let users = vec![employee(1, "alice"), employee(2, "bob")];
        let entries = vec![
            entry(1, 1, 10, at(1, 9, 0), Some(at(1, 17, 0))),
            entry(2, 1, 10, at(12, 9, 0), Some(at(12, 10, 0))),
        ];

        let stats = employee_hours(&users, &entries, TimeRange::Week, now());
        assert_eq!(stats[0].total_hours, 1.0);
        assert_eq!(stats[1].total_hours, 0.0);
        assert_eq!(stats[1].project_count, 0);
        assert_eq!(stats[1].average_hours_per_day, 0.0);
    }

    #[test]
    fn test_employee_hours_all_averages_since_first_entry() {
        let users = vec![employee(1, "alice")];
        // Ten days before `now`, 20 hours in total.
        let entries = vec![
            entry(1, 1, 10, at(3, 18, 0), Some(at(4, 2, 0))),
            entry(2, 1, 10, at(10, 8, 0), Some(at(10, 20, 0))),
        ];

        let stats = employee_hours(&users, &entries, TimeRange::All, now());
        assert_eq!(stats[0].total_hours, 20.0);
        assert_eq!(stats[0].average_hours_per_day, 2.0);
    }

    #[test]
    fn test_employee_hours_all_floors_span_at_one_day() {
        let users = vec![employee(1, "alice")];
        let entries = vec![entry(1, 1, 10, at(13, 9, 0), Some(at(13, 12, 0)))];

        let stats = employee_hours(&users, &entries, TimeRange::All, now());
        assert_eq!(stats[0].average_hours_per_day, 3.0);
    }

    #[test]
    fn test_trend_buckets_seeded_for_empty_input() {
        let hourly = check_in_out_trends(&[], TimeRange::Week, TrendView::Hourly, now());
        assert_eq!(hourly.check_in_trends.len(), 24);
        assert_eq!(hourly.check_out_trends.len(), 24);
        assert!(hourly.check_in_trends.iter().all(|b| b.count == 0));
        assert_eq!(hourly.check_in_trends[0].time, "0");
        assert_eq!(hourly.check_in_trends[23].time, "23");

        let daily = check_in_out_trends(&[], TimeRange::Month, TrendView::Daily, now());
        assert_eq!(daily.check_in_trends.len(), 7);
        assert_eq!(daily.check_in_trends[0].time, "Monday");
        assert_eq!(daily.check_out_trends[6].time, "Sunday");
        assert!(daily.check_out_trends.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_trends_count_starts_and_closed_ends() {
        let entries = vec![
            entry(1, 1, 10, at(9, 8, 55), Some(at(9, 17, 5))),
            entry(2, 2, 10, at(10, 8, 10), Some(at(10, 16, 30))),
            entry(3, 2, 10, at(12, 22, 0), None),
        ];

        let hourly = check_in_out_trends(&entries, TimeRange::Week, TrendView::Hourly, now());
        assert_eq!(hourly.check_in_trends[8].count, 2);
        assert_eq!(hourly.check_out_trends[17].count, 1);
        assert_eq!(hourly.check_out_trends[16].count, 1);
        let total_out: u32 = hourly.check_out_trends.iter().map(|b| b.count).sum();
        assert_eq!(total_out, 2);

        let daily = check_in_out_trends(&entries, TimeRange::Week, TrendView::Daily, now());
        assert_eq!(daily.check_in_trends[0].count, 1); // Monday 9th
        assert_eq!(daily.check_in_trends[1].count, 1); // Tuesday 10th
        assert_eq!(daily.check_in_trends[3].count, 1); // Thursday 12th
        assert_eq!(daily.check_in_trends[5].count, 0);
    }

    #[test]
    fn test_trend_view_parses_lowercase_tokens() {
        assert_eq!("hourly".parse::<TrendView>().ok(), Some(TrendView::Hourly));
        assert_eq!("daily".parse::<TrendView>().ok(), Some(TrendView::Daily));
        assert!("weekly".parse::<TrendView>().is_err());
    }

    #[test]
    fn test_workdays_skip_weekends_and_window_start() {
        // Sat 7th .. Fri 13th: Mon 9th through Fri 13th.
        let days = workdays_between(day(6), day(13));
        assert_eq!(days, vec![day(9), day(10), day(11), day(12), day(13)]);
        assert!(workdays_between(day(13), day(13)).is_empty());
    }

    #[test]
    fn test_attendance_rate_eighteen_of_twenty() {
        assert_eq!(percentage(18, 20), 90.0);
        assert_eq!(attendance_status(90.0, 3), AttendanceStatus::Good);
        assert_eq!(attendance_status(90.0, 4), AttendanceStatus::Fair);
    }

    #[test]
    fn test_attendance_status_bands_in_order() {
        assert_eq!(attendance_status(100.0, 0), AttendanceStatus::Excellent);
        assert_eq!(attendance_status(95.0, 1), AttendanceStatus::Excellent);
        assert_eq!(attendance_status(95.0, 2), AttendanceStatus::Good);
        assert_eq!(attendance_status(89.9, 0), AttendanceStatus::Fair);
        assert_eq!(attendance_status(85.0, 5), AttendanceStatus::Fair);
        assert_eq!(attendance_status(85.0, 6), AttendanceStatus::Poor);
        assert_eq!(attendance_status(84.9, 0), AttendanceStatus::Poor);
    }

    #[test]
    fn test_attendance_over_four_week_month() {
        // Window (Sun Feb 2 12:00, Sun Mar 2 12:00]: workdays Feb 3..28 = 20.
        let feb = |d: u32| NaiveDate::from_ymd_opt(2025, 2, d).unwrap();
        let now = NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let users = vec![employee(1, "alice")];
        let mut entries = Vec::new();
        let mut id = 0;
        for d in workdays_between(feb(2), feb(28)).into_iter().skip(2) {
            id += 1;
            let late = id <= 3;
            let start = d.and_hms_opt(if late { 9 } else { 8 }, 30, 0).unwrap();
            entries.push(entry(id, 1, 10, start, Some(start + TimeDelta::hours(8))));
        }
        assert_eq!(entries.len(), 18);

        let report = attendance(&users, &entries, TimeRange::Month, now);
        let alice = &report.summary_by_employee[0];
        assert_eq!(alice.total_workdays, 20);
        assert_eq!(alice.days_present, 18);
        assert_eq!(alice.absence_count, 2);
        assert_eq!(alice.late_count, 3);
        assert_eq!(alice.attendance_rate, 90.0);
        assert_eq!(alice.status, AttendanceStatus::Good);

        let absent_days: Vec<NaiveDate> = report
            .absences
            .iter()
            .filter(|a| a.count > 0)
            .map(|a| a.date)
            .collect();
        assert_eq!(absent_days, vec![feb(3), feb(4)]);
        assert_eq!(report.absences.len(), 20);
        assert_eq!(report.late_arrivals.len(), 3);
    }

    #[test]
    fn test_open_entry_counts_toward_presence() {
        let users = vec![employee(1, "alice")];
        let entries = vec![entry(1, 1, 10, at(12, 8, 0), None)];

        let report = attendance(&users, &entries, TimeRange::Week, now());
        assert_eq!(report.summary_by_employee[0].days_present, 1);

        let hours = employee_hours(&users, &entries, TimeRange::Week, now());
        assert_eq!(hours[0].total_hours, 0.0);
    }

    #[test]
    fn test_late_counts_every_entry_after_nine() {
        let users = vec![employee(1, "alice")];
        let entries = vec![
            entry(1, 1, 10, at(12, 8, 30), Some(at(12, 12, 0))),
            entry(2, 1, 10, at(12, 13, 0), Some(at(12, 17, 0))),
            entry(3, 1, 10, at(11, 8, 0), Some(at(11, 12, 0))),
            entry(4, 1, 10, at(11, 14, 0), Some(at(11, 18, 0))),
            entry(5, 1, 10, at(10, 9, 0), Some(at(10, 17, 0))),
        ];

        let report = attendance(&users, &entries, TimeRange::Week, now());
        assert_eq!(report.summary_by_employee[0].late_count, 2);
        assert_eq!(report.summary_by_employee[0].days_present, 3);
        assert_eq!(
            report.late_arrivals,
            vec![
                DateCount {
                    date: day(11),
                    count: 1
                },
                DateCount {
                    date: day(12),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_late_and_presence_share_workdays() {
        // Window starts Fri 6th 18:00; the 6th itself and the weekend are not workdays.
        let users = vec![employee(1, "alice")];
        let entries = vec![
            entry(1, 1, 10, at(6, 19, 0), Some(at(6, 21, 0))),
            entry(2, 1, 10, at(7, 10, 0), Some(at(7, 12, 0))),
            entry(3, 1, 10, at(9, 9, 30), Some(at(9, 17, 0))),
        ];

        let report = attendance(&users, &entries, TimeRange::Week, now());
        let alice = &report.summary_by_employee[0];
        assert_eq!(alice.days_present, 1);
        assert_eq!(alice.late_count, 1);
        assert_eq!(
            report.late_arrivals,
            vec![DateCount {
                date: day(9),
                count: 1
            }]
        );
    }

    #[test]
    fn test_attendance_population_is_active_employees() {
        let users = vec![
            employee(1, "alice"),
            user(2, "boss", Role::Admin, true),
            user(3, "gone", Role::Employee, false),
        ];
        let report = attendance(&users, &[], TimeRange::Week, now());
        assert_eq!(report.summary_by_employee.len(), 1);
        assert_eq!(report.summary_by_employee[0].user_id, 1);
        assert_eq!(report.summary_by_employee[0].status, AttendanceStatus::Poor);
        assert!(report.absences.iter().all(|a| a.count == 1));
    }

    #[test]
    fn test_most_active_ranks_and_truncates() {
        let users: Vec<User> = (1..=8).map(|i| employee(i, &format!("u{i}"))).collect();
        let projects = vec![project(10, "Apollo", true), project(11, "Borealis", true)];
        let mut entries = Vec::new();
        for i in 1..=8u64 {
            let start = at(12, 8, 0);
            entries.push(entry(i, i, 10, start, Some(start + TimeDelta::hours(i as i64))));
        }
        entries.push(entry(100, 1, 11, at(12, 18, 0), None));

        let report = most_active_employees(&users, &projects, &entries, TimeRange::Week, now());
        let ids: Vec<u64> = report.top_employees.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 4, 3]);
        assert_eq!(report.top_employees[0].hours_worked, 8.0);

        assert_eq!(
            report.project_distribution,
            vec![
                ProjectShare {
                    name: "Apollo".to_string(),
                    value: 8
                },
                ProjectShare {
                    name: "Borealis".to_string(),
                    value: 1
                },
            ]
        );

        assert_eq!(report.task_completion.len(), 5);
        assert!(report.task_completion.iter().all(|t| t.user_id != 1));
        assert_eq!(report.task_completion[0].completion_rate, 100.0);
    }

    #[test]
    fn test_task_completion_rate_rounds() {
        let users = vec![employee(1, "alice")];
        let projects = vec![project(10, "Apollo", true)];
        let entries = vec![
            entry(1, 1, 10, at(12, 8, 0), Some(at(12, 9, 0))),
            entry(2, 1, 10, at(12, 10, 0), Some(at(12, 11, 0))),
            entry(3, 1, 10, at(12, 12, 0), None),
        ];
        let report = most_active_employees(&users, &projects, &entries, TimeRange::Week, now());
        let alice = &report.task_completion[0];
        assert_eq!(alice.completed_tasks, 2);
        assert_eq!(alice.total_tasks, 3);
        assert_eq!(alice.completion_rate, 66.7);
    }

    #[test]
    fn test_summary_counts_and_distributions() {
        let users = vec![
            employee(1, "alice"),
            employee(2, "bob"),
            user(3, "carol", Role::Employee, false),
        ];
        let projects = vec![project(10, "Apollo", true), project(11, "Borealis", false)];
        let task = |id: u64, status: &str, assignee: Option<u64>| ProjectTask {
            id,
            project_id: 10,
            name: format!("t{id}"),
            description: String::new(),
            status: status.to_string(),
            priority: 1,
            due_date: None,
            assigned_user_id: assignee,
            created_at: at(1, 0, 0),
        };
        let tasks = vec![
            task(1, "Done", Some(2)),
            task(2, "Done", Some(2)),
            task(3, "Todo", Some(1)),
        ];
        let shifts = vec![Shift {
            id: 1,
            shift_type: ShiftType::Night,
            start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            description: None,
            is_active: true,
            assigned_employees: BTreeSet::from([1]),
            created_at: at(1, 0, 0),
            updated_at: None,
        }];
        let entries = vec![
            entry(1, 1, 10, at(9, 8, 0), Some(at(9, 10, 0))),
            entry(2, 1, 10, at(10, 8, 0), Some(at(10, 12, 0))),
            entry(3, 2, 10, at(10, 8, 0), Some(at(10, 9, 0))),
            entry(4, 2, 11, at(11, 8, 0), None),
        ];

        let s = summary(&users, &projects, &tasks, &shifts, &entries);
        assert_eq!((s.total_users, s.active_users), (3, 2));
        assert_eq!((s.total_projects, s.active_projects), (2, 1));
        assert_eq!(s.total_tasks, 3);
        assert_eq!(s.tasks_by_status["Done"], 2);
        assert_eq!(s.tasks_by_status["Todo"], 1);
        assert_eq!(s.average_time_per_project["Apollo"], 7.0 / 3.0);
        assert!(!s.average_time_per_project.contains_key("Borealis"));

        assert_eq!(s.top_users_by_hours[0].username, "alice");
        assert_eq!(s.top_users_by_hours[0].total_hours, 6.0);
        assert_eq!(s.top_users_by_hours[1].completed_tasks, 2);
        assert_eq!(s.top_users_by_hours[2].total_hours, 0.0);

        assert_eq!(s.shift_distribution["Night"], 1);
        assert_eq!(s.shift_distribution["Morning"], 0);
        assert_eq!(s.shift_distribution.len(), 3);
    }

    #[test]
    fn test_reports_are_repeatable() {
        let users = vec![employee(1, "alice"), employee(2, "bob")];
        let projects = vec![project(10, "Apollo", true)];
        let entries = vec![
            entry(1, 1, 10, at(9, 9, 30), Some(at(9, 17, 0))),
            entry(2, 2, 10, at(10, 8, 0), None),
        ];

        assert_eq!(
            employee_hours(&users, &entries, TimeRange::Month, now()),
            employee_hours(&users, &entries, TimeRange::Month, now())
        );
        assert_eq!(
            attendance(&users, &entries, TimeRange::Month, now()),
            attendance(&users, &entries, TimeRange::Month, now())
        );
        assert_eq!(
            most_active_employees(&users, &projects, &entries, TimeRange::Month, now()),
            most_active_employees(&users, &projects, &entries, TimeRange::Month, now())
        );
    }
}
