//! Native command rule table
//!
//! Ordered, first-match classification of fixed phrasings. Anything that does
//! not match is left for the language model.

use std::sync::LazyLock;

use regex::Regex;

use super::time::TimeSpec;
use super::types::{ActionIntent, Section, Setting};

const STOP_PHRASES: &[&str] = &[
    "stop",
    "cancel",
    "stop listening",
    "shut up",
    "quiet",
    "exit",
    "goodbye",
    "bye",
];

const REMINDER_TRIGGERS: &[&str] = &[
    "remind me",
    "set reminder",
    "set a reminder",
    "set alarm",
    "set an alarm",
];

const REMINDER_PREFIXES: &[&str] = &[
    "remind me to ",
    "set a reminder to ",
    "set reminder ",
    "set an alarm for ",
    "set alarm for ",
    "wake me up at ",
];

const WEBSITE_SUFFIXES: &[&str] = &[".com", ".org", ".net", ".io"];

/// Launch commands with at least this many words go to the model instead
const LAUNCH_MAX_WORDS: usize = 6;

static YOUTUBE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:search for|play|watch|find) (.+) on youtube").expect("valid regex"),
        Regex::new(r"youtube.*(?:search|find|play|watch) (.+)").expect("valid regex"),
    ]
});

static SPOTIFY: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:play|listen to) (.+) on spotify").expect("valid regex"),
        Regex::new(r"spotify.*(?:play|listen to) (.+)").expect("valid regex"),
    ]
});

static GOOGLE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:google|search for)\s+").expect("valid regex"));

static LAUNCH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:open|launch|start|go to)\s+").expect("valid regex"));

static SCHEDULE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:schedule|add to schedule|create event)\s+").expect("valid regex")
});

static TIME_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s(at|in|for|by)\s").expect("valid regex"));

/// Classify `text` against the native rule table
#[must_use]
pub fn classify(text: &str) -> ActionIntent {
    let lower = text.trim().to_lowercase();

    if STOP_PHRASES.contains(&lower.as_str()) {
        return ActionIntent::StopListening;
    }

    if let Some(url) = deep_search(&lower) {
        return ActionIntent::OpenWebsite(url);
    }

    if contains_any(&lower, &["start gym", "start workout", "begin workout", "track workout"]) {
        return ActionIntent::StartWorkout;
    }
    if contains_any(&lower, &["stop gym", "end workout", "finish workout", "stop workout"]) {
        return ActionIntent::EndWorkout;
    }
    if contains_any(
        &lower,
        &[
            "how many steps",
            "step count",
            "daily report",
            "health status",
            "my stats",
            "health report",
        ],
    ) {
        return ActionIntent::ReportHealth;
    }
    if contains_any(&lower, &["open health", "show health", "open fitness"]) {
        return ActionIntent::Navigate(Section::Health);
    }

    if contains_any(
        &lower,
        &[
            "read screen",
            "read the screen",
            "read my screen",
            "what is on the screen",
            "what is on my screen",
            "what's on my screen",
            "what's on the screen",
            "describe the screen",
            "describe screen",
            "look at my screen",
            "what do you see",
        ],
    ) {
        return ActionIntent::ReadScreen;
    }

    if let Some(intent) = device_toggle(&lower) {
        return intent;
    }

    if contains_any(&lower, &["take screenshot", "capture screen", "screenshot this"]) {
        return ActionIntent::Screenshot;
    }

    if let Some(section) = navigation(&lower) {
        return ActionIntent::Navigate(section);
    }

    if let Some(intent) = launch(&lower) {
        return intent;
    }

    if contains_any(&lower, REMINDER_TRIGGERS) || lower.starts_with("wake me up") {
        return reminder(&lower);
    }

    if let Some(m) = SCHEDULE_PREFIX.find(&lower) {
        return ActionIntent::AddSchedule {
            title: lower[m.end()..].trim().to_string(),
        };
    }

    ActionIntent::None
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn deep_search(lower: &str) -> Option<String> {
    if let Some(query) = first_capture(&*YOUTUBE, lower) {
        let query = query.replacen("for", "", 1);
        let query = query.trim();
        return Some(format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(query)
        ));
    }

    if let Some(query) = first_capture(&*SPOTIFY, lower) {
        return Some(format!(
            "https://open.spotify.com/search/{}",
            urlencoding::encode(query.trim())
        ));
    }

    let google = lower.starts_with("google ")
        || (lower.starts_with("search for ")
            && !lower.contains("youtube")
            && !lower.contains("spotify"));
    if google {
        let query = GOOGLE_PREFIX.replace(lower, "");
        return Some(format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(&query)
        ));
    }

    None
}

fn device_toggle(lower: &str) -> Option<ActionIntent> {
    const TOGGLES: &[(Setting, bool, &[&str])] = &[
        (Setting::Wifi, true, &["turn on wifi", "enable wifi", "wifi on"]),
        (Setting::Wifi, false, &["turn off wifi", "disable wifi", "wifi off"]),
        (
            Setting::Bluetooth,
            true,
            &["turn on bluetooth", "enable bluetooth", "bluetooth on"],
        ),
        (
            Setting::Bluetooth,
            false,
            &["turn off bluetooth", "disable bluetooth", "bluetooth off"],
        ),
        (
            Setting::Flashlight,
            true,
            &["turn on flashlight", "flashlight on", "torch on"],
        ),
        (
            Setting::Flashlight,
            false,
            &["turn off flashlight", "flashlight off", "torch off"],
        ),
    ];

    TOGGLES
        .iter()
        .find(|(_, _, phrases)| contains_any(lower, phrases))
        .map(|&(setting, value, _)| ActionIntent::ToggleSetting { setting, value })
}

fn navigation(lower: &str) -> Option<Section> {
    if contains_any(lower, &["go to settings", "open settings"]) {
        Some(Section::Settings)
    } else if contains_any(
        lower,
        &["show reminders", "open reminders", "show alarms", "open alarms"],
    ) {
        Some(Section::Reminders)
    } else if contains_any(lower, &["show schedule", "open schedule", "show calendar"]) {
        Some(Section::Schedule)
    } else if contains_any(lower, &["show notifications", "open notifications"]) {
        Some(Section::Notifications)
    } else {
        None
    }
}

fn launch(lower: &str) -> Option<ActionIntent> {
    let prefix = LAUNCH_PREFIX.find(lower)?;
    if lower.contains('?') || lower.split(' ').count() >= LAUNCH_MAX_WORDS {
        return None;
    }

    let target = lower[prefix.end()..].to_string();
    if WEBSITE_SUFFIXES.iter().any(|s| target.contains(s)) {
        Some(ActionIntent::OpenWebsite(target))
    } else {
        Some(ActionIntent::OpenApp(target))
    }
}

fn reminder(lower: &str) -> ActionIntent {
    let mut clean = lower.to_string();
    for prefix in REMINDER_PREFIXES {
        clean = clean.replacen(prefix, "", 1);
    }

    let (mut task, mut time) = match TIME_DELIMITER.captures(&clean) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let rest = &clean[whole.end..];
            let rest = TIME_DELIMITER.find(rest).map_or(rest, |m| &rest[..m.start()]);
            let time = if caps.get(1).is_some_and(|d| d.as_str() == "in") {
                TimeSpec::parse_relative(rest)
            } else {
                TimeSpec::parse(rest)
            };
            (clean[..whole.start].to_string(), time)
        }
        None => (clean.clone(), TimeSpec::Unspecified),
    };

    if let Some(when) = lower.strip_prefix("wake me up") {
        task = "Wake up".to_string();
        time = when
            .trim()
            .strip_prefix("at ")
            .map_or_else(|| TimeSpec::parse("7:00 am"), TimeSpec::parse);
    }

    if task.is_empty() || task.starts_with(|c: char| c.is_ascii_digit()) {
        time = TimeSpec::parse(&task);
        task = "Alarm".to_string();
    }

    ActionIntent::AddReminder {
        text: capitalize(task.trim()),
        time,
        date: None,
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
