use crate::models::Assignment;
use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use std::fmt;

// Calendar days are judged in the time zone of `now`
fn in_zone_of<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> DateTime<Tz> {
    due.with_timezone(&now.timezone())
}

fn shift_days<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> DateTime<Tz> {
    // Calendar shift keeps the wall-clock time; fall back to a fixed span
    // when the shifted local time does not exist.
    now.clone()
        .checked_add_days(Days::new(days))
        .unwrap_or_else(|| now.clone() + Duration::days(days as i64))
}

fn is_same_day<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    in_zone_of(due, now).date_naive() == now.date_naive()
}

/// Past due, and on an earlier calendar day than `now`.
pub fn is_overdue<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    in_zone_of(due, now) < *now && !is_same_day(due, now)
}

pub fn is_due_today<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    is_same_day(due, now)
}

/// True when `now + 1 day <= due <= now + 3 days`.
///
/// The bounds are full timestamps, not calendar days: something due
/// tomorrow morning is not "due soon" when `now` is this afternoon.
pub fn is_due_soon<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    let due = in_zone_of(due, now);
    let tomorrow = shift_days(now, 1);
    let three_days_from_now = shift_days(now, 3);

    due >= tomorrow && due <= three_days_from_now
}

/// Signed calendar-day distance from today to the due date.
pub fn days_until_due<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> i64 {
    in_zone_of(due, now)
        .date_naive()
        .signed_duration_since(now.date_naive())
        .num_days()
}

/// e.g. `Mon, Oct 19, 2026`
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format("%a, %b %-d, %Y").to_string()
}

/// e.g. `3:05 PM`
pub fn format_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format("%-I:%M %p").to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueStatus {
    Completed,
    Overdue(i64),
    DueToday,
    DueSoon(i64),
    Upcoming(i64),
}

impl DueStatus {
    pub fn of<Tz: TimeZone>(assignment: &Assignment, now: &DateTime<Tz>) -> DueStatus {
        let due = &assignment.due_date;
        if assignment.is_completed {
            return DueStatus::Completed;
        }
        if is_overdue(due, now) {
            return DueStatus::Overdue(days_until_due(due, now).abs());
        }
        if is_due_today(due, now) {
            return DueStatus::DueToday;
        }

        // Neither overdue nor today, so at least one day out.
        let days = days_until_due(due, now);
        if is_due_soon(due, now) {
            DueStatus::DueSoon(days)
        } else {
            DueStatus::Upcoming(days)
        }
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

impl fmt::Display for DueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DueStatus::Completed => f.write_str("Completed"),
            DueStatus::Overdue(days) => write!(f, "{} day{} overdue", days, plural(days)),
            DueStatus::DueToday => f.write_str("Due today"),
            DueStatus::DueSoon(days) | DueStatus::Upcoming(days) => {
                write!(f, "Due in {} day{}", days, plural(days))
            }
        }
    }
}
