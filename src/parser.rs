use crate::models::{Assignment, Priority};
use chrono::{
    DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use regex::Regex;
use std::fmt;

// When only a date is given, the assignment is due at the end of that day.
const DEFAULT_DUE_HOUR: u32 = 23;
const DEFAULT_DUE_MINUTE: u32 = 59;

// `\!`, `\#` and `\@` keep a marker character literal. While parsing, each
// escaped character is swapped for a private-use stand-in.
static ESCAPES: [(char, char); 3] = [('!', '\u{E000}'), ('#', '\u{E001}'), ('@', '\u{E002}')];

fn hide_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        let escaped = chars
            .peek()
            .filter(|_| c == '\\')
            .and_then(|next| ESCAPES.iter().find(|(marker, _)| marker == next));
        match escaped {
            Some(&(_, stand_in)) => {
                out.push(stand_in);
                chars.next();
            }
            None => out.push(c),
        }
    }
    out
}

fn restore_escapes(text: &str) -> String {
    text.chars()
        .map(|c| {
            ESCAPES
                .iter()
                .find(|(_, stand_in)| *stand_in == c)
                .map_or(c, |&(marker, _)| marker)
        })
        .collect()
}

fn escape_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPES.iter().any(|(marker, _)| *marker == c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DueInput {
    InDays(u64),
    On(NaiveDate),
    At(NaiveDateTime),
}

impl DueInput {
    fn parse(token: &str) -> Option<DueInput> {
        match token.to_ascii_lowercase().as_str() {
            "today" => return Some(DueInput::InDays(0)),
            "tomorrow" => return Some(DueInput::InDays(1)),
            _ => {}
        }
        if let Some(days) = token.strip_prefix('+') {
            return days.parse::<u64>().ok().map(DueInput::InDays);
        }
        if let Ok(at) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M") {
            return Some(DueInput::At(at));
        }
        NaiveDate::parse_from_str(token, "%Y-%m-%d")
            .ok()
            .map(DueInput::On)
    }

    /// Wall-clock due time, relative to `today` where needed. `None` when a
    /// day offset runs past the calendar.
    pub fn resolve(&self, today: NaiveDate) -> Option<NaiveDateTime> {
        let end_of_day = NaiveTime::from_hms_opt(DEFAULT_DUE_HOUR, DEFAULT_DUE_MINUTE, 0)
            .unwrap_or(NaiveTime::MIN);
        match *self {
            DueInput::InDays(days) => today
                .checked_add_days(Days::new(days))
                .map(|date| date.and_time(end_of_day)),
            DueInput::On(date) => Some(date.and_time(end_of_day)),
            DueInput::At(at) => Some(at),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ParsedAssignment {
    pub title: String,
    pub subject: Option<String>,
    pub priority: Option<Priority>,
    pub due: Option<DueInput>,
}

/// Parses quick-add input such as `Essay !high #English @tomorrow`.
///
/// Markers may appear anywhere. The first valid marker of each kind wins;
/// invalid ones are dropped from the title and otherwise ignored. A marker
/// character preceded by a backslash is kept literally.
pub fn parse_assignment_input(input: &str) -> ParsedAssignment {
    let input = hide_escapes(input);
    let input = input.as_str();
    let priority_re = Regex::new(r"(?i)!(low|medium|med|high|\d+)\b\s*").unwrap();
    let subject_re = Regex::new(r"(^|\s)#(\S+)").unwrap();
    let due_re = Regex::new(r"(^|\s)@(\S+)").unwrap();

    let priority = priority_re
        .captures_iter(input)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| m.as_str().parse::<Priority>().ok());

    let subject = subject_re
        .captures_iter(input)
        .filter_map(|caps| caps.get(2))
        .map(|m| restore_escapes(&m.as_str().replace('_', " ")))
        .next();

    let due = due_re
        .captures_iter(input)
        .filter_map(|caps| caps.get(2))
        .find_map(|m| DueInput::parse(m.as_str()));

    let title = priority_re.replace_all(input, "");
    let title = subject_re.replace_all(&title, " ");
    let title = due_re.replace_all(&title, " ");

    let title = Regex::new(r"\s+").unwrap().replace_all(&title, " ");
    let title = restore_escapes(title.trim());

    ParsedAssignment {
        title,
        subject,
        priority,
        due,
    }
}

/// Renders an assignment back into quick-add syntax, due time in `tz`.
pub fn render_assignment_input<Tz: TimeZone>(assignment: &Assignment, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut parts = vec![
        escape_markers(&assignment.title),
        format!("!{}", assignment.priority),
    ];
    if !assignment.subject.trim().is_empty() {
        let subject = escape_markers(assignment.subject.trim());
        parts.push(format!("#{}", subject.replace(' ', "_")));
    }
    let due: DateTime<Tz> = assignment.due_date.with_timezone(tz);
    parts.push(format!("@{}", due.format("%Y-%m-%dT%H:%M")));
    parts.join(" ")
}

/// Converts a wall-clock time in `tz` to UTC, picking the earlier instant
/// when the local time is ambiguous.
///
/// A time skipped by a forward DST jump keeps the offset in force before
/// the jump, so 02:30 in a 02:00-03:00 gap becomes 03:30.
pub fn to_utc<Tz: TimeZone>(local: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    if let Some(at) = tz.from_local_datetime(&local).earliest() {
        return at.with_timezone(&Utc);
    }
    let offset = tz
        .from_local_datetime(&(local - Duration::days(1)))
        .earliest()
        .map(|before| before.offset().fix())
        .unwrap_or_else(|| tz.offset_from_utc_datetime(&local).fix());
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_all_markers() {
        let input = "Write essay !high #English @2026-10-21T17:30";
        let expected = ParsedAssignment {
            title: "Write essay".to_string(),
            subject: Some("English".to_string()),
            priority: Some(Priority::High),
            due: Some(DueInput::At(date(2026, 10, 21).and_hms_opt(17, 30, 0).unwrap())),
        };
        assert_eq!(parse_assignment_input(input), expected);
    }

    #[test]
    fn test_parse_markers_in_middle_with_extra_spaces() {
        let result = parse_assignment_input("Lab   !2 report #Computer_Science   for   @tomorrow class");
        assert_eq!(result.title, "Lab report for class");
        assert_eq!(result.priority, Some(Priority::Medium));
        assert_eq!(result.subject.as_deref(), Some("Computer Science"));
        assert_eq!(result.due, Some(DueInput::InDays(1)));
    }

    #[test]
    fn test_parse_plain_title() {
        let result = parse_assignment_input("  Read chapter 3  ");
        assert_eq!(
            result,
            ParsedAssignment {
                title: "Read chapter 3".to_string(),
                subject: None,
                priority: None,
                due: None,
            }
        );
    }

    #[test]
    fn test_first_valid_priority_wins() {
        let result = parse_assignment_input("!9 !low Problems !high");
        assert_eq!(result.priority, Some(Priority::Low));
        assert_eq!(result.title, "Problems");
    }

    #[test]
    fn test_invalid_due_is_stripped_and_ignored() {
        let result = parse_assignment_input("Quiz @someday #Math");
        assert_eq!(result.title, "Quiz");
        assert_eq!(result.due, None);
        assert_eq!(result.subject.as_deref(), Some("Math"));
    }

    #[test]
    fn test_hash_inside_word_is_kept() {
        let result = parse_assignment_input("C# exercises !low");
        assert_eq!(result.title, "C# exercises");
        assert_eq!(result.subject, None);
    }

    #[test]
    fn test_relative_due_resolves_to_end_of_day() {
        let today = date(2026, 10, 19);
        let due = parse_assignment_input("Essay @+3").due.unwrap();
        assert_eq!(
            due.resolve(today),
            date(2026, 10, 22).and_hms_opt(23, 59, 0)
        );
        assert_eq!(
            DueInput::On(date(2026, 11, 1)).resolve(today),
            date(2026, 11, 1).and_hms_opt(23, 59, 0)
        );
        assert_eq!(
            parse_assignment_input("Essay @today").due.unwrap().resolve(today),
            today.and_hms_opt(23, 59, 0)
        );
    }

    #[test]
    fn test_day_offset_past_calendar_does_not_resolve() {
        let due = parse_assignment_input("Essay @+99999999999").due.unwrap();
        assert_eq!(due.resolve(date(2026, 10, 19)), None);
    }

    #[test]
    fn test_escaped_markers_stay_in_title() {
        let result = parse_assignment_input(r"Email \@teacher about \#3 \!high !low #Math");
        assert_eq!(result.title, "Email @teacher about #3 !high");
        assert_eq!(result.priority, Some(Priority::Low));
        assert_eq!(result.subject.as_deref(), Some("Math"));
        assert_eq!(result.due, None);

        let result = parse_assignment_input(r"Path C:\dir \ end");
        assert_eq!(result.title, r"Path C:\dir \ end");
    }

    #[test]
    fn test_marker_like_title_renders_escaped() {
        let assignment = Assignment {
            id: "id".to_string(),
            title: "Lab !1 prep #3 @home".to_string(),
            subject: "C#".to_string(),
            description: String::new(),
            due_date: Utc.with_ymd_and_hms(2026, 10, 22, 17, 0, 0).unwrap(),
            priority: Priority::High,
            is_completed: false,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        };

        let rendered = render_assignment_input(&assignment, &Utc);
        assert_eq!(rendered, r"Lab \!1 prep \#3 \@home !high #C\# @2026-10-22T17:00");

        let parsed = parse_assignment_input(&rendered);
        assert_eq!(parsed.title, assignment.title);
        assert_eq!(parsed.subject.as_deref(), Some("C#"));
        assert_eq!(parsed.priority, Some(Priority::High));
    }

    // Local time with a 02:00-03:00 spring-forward gap on 2026-03-29,
    // UTC+1 before it and UTC+2 after.
    #[derive(Debug, Clone, Copy)]
    struct SpringForward;

    impl SpringForward {
        fn switch() -> NaiveDateTime {
            date(2026, 3, 29).and_hms_opt(1, 0, 0).unwrap()
        }

        fn winter() -> FixedOffset {
            FixedOffset::east_opt(3600).unwrap()
        }

        fn summer() -> FixedOffset {
            FixedOffset::east_opt(7200).unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, _local: &NaiveDate) -> LocalResult<FixedOffset> {
            LocalResult::Single(Self::winter())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let gap_start = date(2026, 3, 29).and_hms_opt(2, 0, 0).unwrap();
            let gap_end = date(2026, 3, 29).and_hms_opt(3, 0, 0).unwrap();
            if *local < gap_start {
                LocalResult::Single(Self::winter())
            } else if *local < gap_end {
                LocalResult::None
            } else {
                LocalResult::Single(Self::summer())
            }
        }

        fn offset_from_utc_date(&self, _utc: &NaiveDate) -> FixedOffset {
            Self::winter()
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch() {
                Self::winter()
            } else {
                Self::summer()
            }
        }
    }

    #[test]
    fn test_time_in_dst_gap_moves_forward() {
        let in_gap = date(2026, 3, 29).and_hms_opt(2, 30, 0).unwrap();
        let utc = to_utc(in_gap, &SpringForward);
        assert_eq!(utc, Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap());
        assert_eq!(
            utc.with_timezone(&SpringForward).naive_local(),
            date(2026, 3, 29).and_hms_opt(3, 30, 0).unwrap()
        );

        let after = date(2026, 3, 29).and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(
            to_utc(after, &SpringForward),
            Utc.with_ymd_and_hms(2026, 3, 29, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rendered_input_parses_back() {
        let assignment = Assignment {
            id: "id".to_string(),
            title: "Lab report".to_string(),
            subject: "Computer Science".to_string(),
            description: String::new(),
            due_date: Utc.with_ymd_and_hms(2026, 10, 21, 17, 30, 0).unwrap(),
            priority: Priority::Low,
            is_completed: false,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        };

        let rendered = render_assignment_input(&assignment, &Utc);
        assert_eq!(rendered, "Lab report !low #Computer_Science @2026-10-21T17:30");

        let parsed = parse_assignment_input(&rendered);
        assert_eq!(parsed.title, assignment.title);
        assert_eq!(parsed.subject.as_deref(), Some("Computer Science"));
        assert_eq!(parsed.priority, Some(Priority::Low));
        let due = parsed.due.unwrap().resolve(date(2026, 10, 19)).unwrap();
        assert_eq!(to_utc(due, &Utc), assignment.due_date);
    }
}
