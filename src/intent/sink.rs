//! Side-effect collaborators
//!
//! The dispatcher applies native and structured actions through
//! [`ActionSink`] and fetches external data through [`Lookups`].

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tokio::sync::Mutex;

use super::time::TimeSpec;
use super::types::{Section, Setting};
use crate::{Error, Result};

/// Where an external launch should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    /// Deep link or URL to open first
    pub primary: String,

    /// Web URL to open if the deep link is not handled
    pub fallback: Option<String>,
}

impl LaunchTarget {
    fn url(url: impl Into<String>) -> Self {
        Self {
            primary: url.into(),
            fallback: None,
        }
    }

    fn deep_link(link: &str, fallback: Option<&str>) -> Self {
        Self {
            primary: link.to_string(),
            fallback: fallback.map(str::to_string),
        }
    }
}

/// Map a spoken app name or website to something launchable
#[must_use]
pub fn resolve_launch(target: &str, is_website: bool) -> LaunchTarget {
    if target.starts_with("http") {
        return LaunchTarget::url(target);
    }

    if is_website {
        let url: String = target.chars().filter(|c| !c.is_whitespace()).collect();
        return LaunchTarget::url(format!("https://{url}"));
    }

    let name = target.to_lowercase();
    let name = name.trim();

    if name.contains("google") {
        LaunchTarget::url("https://google.com")
    } else if name.contains("youtube") {
        LaunchTarget::deep_link("vnd.youtube://", Some("https://youtube.com"))
    } else if name.contains("spotify") {
        LaunchTarget::deep_link("spotify://", Some("https://open.spotify.com"))
    } else if name.contains("maps") {
        LaunchTarget::url("https://maps.google.com")
    } else if name.contains("instagram") {
        LaunchTarget::deep_link("instagram://app", Some("https://instagram.com"))
    } else if name.contains("twitter") || name == "x" {
        LaunchTarget::deep_link("twitter://", Some("https://twitter.com"))
    } else if name.contains("whatsapp") {
        LaunchTarget::deep_link("whatsapp://", None)
    } else if name.contains("calculator") {
        LaunchTarget::deep_link("calculator://", None)
    } else {
        LaunchTarget::url(format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(target)
        ))
    }
}

/// Applies side effects requested by the user
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Store a reminder
    async fn add_reminder(&self, text: &str, time: &TimeSpec, date: Option<NaiveDate>)
    -> Result<()>;

    /// Store a schedule entry
    async fn add_schedule(
        &self,
        title: &str,
        start: NaiveTime,
        end: NaiveTime,
        date: NaiveDate,
    ) -> Result<()>;

    /// Switch the visible section
    async fn navigate(&self, section: Section) -> Result<()>;

    /// Open an external app or website
    async fn launch_external(&self, target: &str, is_website: bool) -> Result<()>;

    /// Flip a device setting
    async fn toggle_setting(&self, setting: Setting, value: bool) -> Result<()>;

    /// Spoken summary of today's activity
    async fn health_report(&self) -> Result<String>;

    async fn start_workout(&self) -> Result<()>;

    /// Stop tracking; returns a spoken summary if a workout was running
    async fn stop_workout(&self) -> Result<Option<String>>;

    /// Capture the screen as JPEG, if the platform can
    async fn capture_screen(&self) -> Result<Option<Vec<u8>>>;

    async fn take_screenshot(&self) -> Result<()>;
}

/// Current weather at a location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub location: String,
    pub temp: f64,
    pub condition: String,
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub title: String,
    pub source: String,
}

/// A stock price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
}

/// One web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// External data sources
#[async_trait]
pub trait Lookups: Send + Sync {
    async fn weather(&self, location: &str) -> Result<Weather>;
    async fn news(&self, query: Option<&str>) -> Result<Vec<Article>>;
    async fn stock(&self, symbol: &str) -> Result<StockQuote>;
    async fn web_search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Lookups for builds without any data source; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookups;

#[async_trait]
impl Lookups for NoLookups {
    async fn weather(&self, _location: &str) -> Result<Weather> {
        Err(Error::Action("weather lookup unavailable".to_string()))
    }

    async fn news(&self, _query: Option<&str>) -> Result<Vec<Article>> {
        Err(Error::Action("news lookup unavailable".to_string()))
    }

    async fn stock(&self, _symbol: &str) -> Result<StockQuote> {
        Err(Error::Action("stock lookup unavailable".to_string()))
    }

    async fn web_search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Err(Error::Action("web search unavailable".to_string()))
    }
}

/// A stored reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub text: String,
    pub time: TimeSpec,
    pub due: Option<NaiveDateTime>,
}

/// A stored schedule entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub title: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub date: NaiveDate,
}

#[derive(Debug, Default)]
struct ConsoleState {
    reminders: Vec<Reminder>,
    schedule: Vec<ScheduleEntry>,
    section: Option<Section>,
    launched: Vec<LaunchTarget>,
    settings: HashMap<Setting, bool>,
    workout_started: Option<Instant>,
    steps: u32,
}

/// In-memory action sink that logs every action
#[derive(Debug, Default)]
pub struct ConsoleSink {
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders stored so far
    pub async fn reminders(&self) -> Vec<Reminder> {
        self.state.lock().await.reminders.clone()
    }

    /// Schedule entries stored so far
    pub async fn schedule(&self) -> Vec<ScheduleEntry> {
        self.state.lock().await.schedule.clone()
    }

    /// Last section navigated to
    pub async fn section(&self) -> Option<Section> {
        self.state.lock().await.section
    }

    /// External launches so far
    pub async fn launched(&self) -> Vec<LaunchTarget> {
        self.state.lock().await.launched.clone()
    }

    /// Current value of a device setting
    pub async fn setting(&self, setting: Setting) -> Option<bool> {
        self.state.lock().await.settings.get(&setting).copied()
    }

    /// Record today's step count for the health report
    pub async fn set_steps(&self, steps: u32) {
        tracing::debug!(steps, "step count updated");
        self.state.lock().await.steps = steps;
    }
}

#[async_trait]
impl ActionSink for ConsoleSink {
    async fn add_reminder(
        &self,
        text: &str,
        time: &TimeSpec,
        date: Option<NaiveDate>,
    ) -> Result<()> {
        let due = time.resolve(date, chrono::Local::now().naive_local());
        tracing::info!(text, %time, ?due, "reminder added");

        self.state.lock().await.reminders.push(Reminder {
            text: text.to_string(),
            time: time.clone(),
            due,
        });
        Ok(())
    }

    async fn add_schedule(
        &self,
        title: &str,
        start: NaiveTime,
        end: NaiveTime,
        date: NaiveDate,
    ) -> Result<()> {
        tracing::info!(title, %start, %end, %date, "schedule entry added");

        self.state.lock().await.schedule.push(ScheduleEntry {
            title: title.to_string(),
            start,
            end,
            date,
        });
        Ok(())
    }

    async fn navigate(&self, section: Section) -> Result<()> {
        tracing::info!(%section, "navigate");
        self.state.lock().await.section = Some(section);
        Ok(())
    }

    async fn launch_external(&self, target: &str, is_website: bool) -> Result<()> {
        let launch = resolve_launch(target, is_website);
        tracing::info!(target, url = %launch.primary, fallback = ?launch.fallback, "launch");
        self.state.lock().await.launched.push(launch);
        Ok(())
    }

    async fn toggle_setting(&self, setting: Setting, value: bool) -> Result<()> {
        tracing::info!(%setting, value, "toggle setting");
        self.state.lock().await.settings.insert(setting, value);
        Ok(())
    }

    async fn health_report(&self) -> Result<String> {
        let steps = self.state.lock().await.steps;
        Ok(format!("{steps} steps today."))
    }

    async fn start_workout(&self) -> Result<()> {
        tracing::info!("workout started");
        self.state.lock().await.workout_started = Some(Instant::now());
        Ok(())
    }

    async fn stop_workout(&self) -> Result<Option<String>> {
        let started = self.state.lock().await.workout_started.take();
        Ok(started.map(|at| {
            let minutes = at.elapsed().as_secs() / 60;
            tracing::info!(minutes, "workout stopped");
            format!("Workout finished after {minutes} minutes.")
        }))
    }

    async fn capture_screen(&self) -> Result<Option<Vec<u8>>> {
        tracing::debug!("screen capture not available on console");
        Ok(None)
    }

    async fn take_screenshot(&self) -> Result<()> {
        tracing::info!("screenshot captured");
        Ok(())
    }
}
