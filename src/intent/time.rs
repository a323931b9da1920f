//! Spoken reminder times

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

/// Clock time used when a reminder names none
pub const DEFAULT_REMINDER_TIME: NaiveTime = match NaiveTime::from_hms_opt(9, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

const NOON: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?\s*(?:([ap])\.?\s?m\.?)?$").expect("valid regex")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+|an?|one)\s+(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)$")
        .expect("valid regex")
});

/// When a reminder should fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    /// Wall-clock time ("5pm", "17:30")
    Clock(NaiveTime),
    /// Offset from creation ("in 10 minutes")
    After(TimeDelta),
    /// No time given
    Unspecified,
    /// Unparseable text, kept verbatim
    Text(String),
}

impl TimeSpec {
    /// Parse a clock expression
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() || text == "today" {
            return Self::Unspecified;
        }

        match text.as_str() {
            "noon" | "midday" => return Self::Clock(NOON),
            "midnight" => return Self::Clock(NaiveTime::MIN),
            _ => {}
        }

        parse_clock(&text).map_or(Self::Text(text), Self::Clock)
    }

    /// Parse an offset expression ("10 minutes", "an hour")
    #[must_use]
    pub fn parse_relative(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Self::Unspecified;
        }

        parse_offset(&text).map_or(Self::Text(text), Self::After)
    }

    /// Absolute time this refers to
    ///
    /// `date` applies to clock times; unspecified times use
    /// [`DEFAULT_REMINDER_TIME`]. Unparseable text has no resolution.
    #[must_use]
    pub fn resolve(&self, date: Option<NaiveDate>, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let day = date.unwrap_or_else(|| now.date());
        match self {
            Self::Clock(time) => Some(day.and_time(*time)),
            Self::After(delta) => now.checked_add_signed(*delta),
            Self::Unspecified => Some(day.and_time(DEFAULT_REMINDER_TIME)),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock(time) => write!(f, "{}", time.format("%H:%M")),
            Self::After(delta) => write!(f, "in {} minutes", delta.num_minutes()),
            Self::Unspecified => write!(f, "{}", DEFAULT_REMINDER_TIME.format("%H:%M")),
            Self::Text(text) => f.write_str(text),
        }
    }
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    let caps = CLOCK.captures(text)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;

    match caps.get(3).map(|m| m.as_str()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour %= 12;
            if meridiem == "p" {
                hour += 12;
            }
        }
        None if hour > 23 => return None,
        None => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_offset(text: &str) -> Option<TimeDelta> {
    let caps = RELATIVE.captures(text)?;
    let amount: i64 = match caps.get(1)?.as_str() {
        "a" | "an" | "one" => 1,
        n => n.parse().ok()?,
    };

    let unit = caps.get(2)?.as_str();
    if unit.starts_with("sec") {
        TimeDelta::try_seconds(amount)
    } else if unit.starts_with("min") {
        TimeDelta::try_minutes(amount)
    } else if unit.starts_with('h') {
        TimeDelta::try_hours(amount)
    } else {
        TimeDelta::try_days(amount)
    }
}
