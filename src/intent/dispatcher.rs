//! Intent dispatcher
//!
//! Turns a committed utterance into a reply. Native commands run first; the
//! language model handles everything else. Collaborator failures never escape:
//! every turn ends with something to say.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use super::native::classify;
use super::sink::{ActionSink, Lookups};
use super::time::TimeSpec;
use super::types::{ActionIntent, DispatchOutcome, Section};
use crate::Result;
use crate::llm::{ActionType, History, HistoryEntry, LanguageModel, StructuredAction};

/// Spoken when a collaborator fails
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting to the network.";

/// Spoken when the model returns nothing
pub const EMPTY_REPLY: &str = "I didn't catch that.";

const DEFAULT_LOCATION: &str = "London";

const DEFAULT_START: NaiveTime = match NaiveTime::from_hms_opt(10, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

const DEFAULT_END: NaiveTime = match NaiveTime::from_hms_opt(11, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Routes committed text to native actions or the language model
#[derive(Clone)]
pub struct Dispatcher {
    model: Arc<dyn LanguageModel>,
    sink: Arc<dyn ActionSink>,
    lookups: Arc<dyn Lookups>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        sink: Arc<dyn ActionSink>,
        lookups: Arc<dyn Lookups>,
    ) -> Self {
        Self {
            model,
            sink,
            lookups,
        }
    }

    /// Dispatch one committed utterance
    ///
    /// `history` is the conversation so far, not including `text`.
    pub async fn dispatch(&self, text: &str, history: &History) -> DispatchOutcome {
        let intent = classify(text);
        tracing::debug!(text, ?intent, "classified utterance");

        match intent {
            ActionIntent::StopListening => DispatchOutcome::close(),
            ActionIntent::None => self.converse(text, history).await,
            native => match self.execute_native(native, history).await {
                Ok(reply) => DispatchOutcome::say(reply),
                Err(e) => {
                    tracing::warn!(error = %e, "native action failed");
                    DispatchOutcome::say(FALLBACK_REPLY)
                }
            },
        }
    }

    async fn execute_native(&self, intent: ActionIntent, history: &History) -> Result<String> {
        let reply = match intent {
            ActionIntent::None | ActionIntent::StopListening => "Done.".to_string(),
            ActionIntent::ReadScreen => match self.sink.capture_screen().await? {
                Some(image) => {
                    self.model
                        .complete(history, "Describe screen.", Some(image.as_slice()))
                        .await?
                }
                None => "Screen capture failed.".to_string(),
            },
            ActionIntent::StartWorkout => {
                self.sink.start_workout().await?;
                self.sink.navigate(Section::Gym).await?;
                "Gym started.".to_string()
            }
            ActionIntent::EndWorkout => self
                .sink
                .stop_workout()
                .await?
                .unwrap_or_else(|| "Stopped.".to_string()),
            ActionIntent::ReportHealth => {
                self.sink.navigate(Section::Health).await?;
                self.sink.health_report().await?
            }
            ActionIntent::Navigate(section) => {
                self.sink.navigate(section).await?;
                format!("Opening {section}.")
            }
            ActionIntent::OpenApp(target) => {
                self.sink.launch_external(&target, false).await?;
                format!("Opening {target}")
            }
            ActionIntent::OpenWebsite(target) => {
                self.sink.launch_external(&target, true).await?;
                format!("Opening {target}")
            }
            ActionIntent::AddReminder { text, time, date } => {
                self.sink.add_reminder(&text, &time, date).await?;
                "Reminder set.".to_string()
            }
            ActionIntent::AddSchedule { title } => {
                self.sink
                    .add_schedule(&title, DEFAULT_START, DEFAULT_END, today())
                    .await?;
                "Scheduled.".to_string()
            }
            ActionIntent::ToggleSetting { setting, value } => {
                self.sink.toggle_setting(setting, value).await?;
                "Done.".to_string()
            }
            ActionIntent::Screenshot => {
                self.sink.take_screenshot().await?;
                "Captured.".to_string()
            }
        };

        Ok(reply)
    }

    async fn converse(&self, text: &str, history: &History) -> DispatchOutcome {
        let context = history.with(HistoryEntry::user(text));

        match self.model.extract(&context, text).await {
            Ok(Some(action)) if action.is_actionable() => {
                tracing::debug!(action = ?action.action_type, "structured action extracted");
                let reply = match self.execute_structured(&action, &context).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(error = %e, "structured action failed");
                        FALLBACK_REPLY.to_string()
                    }
                };
                return DispatchOutcome::conversational(text, reply);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "action extraction failed, falling back to chat"),
        }

        let reply = match self.model.complete(history, text, None).await {
            Ok(reply) if reply.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "completion failed");
                FALLBACK_REPLY.to_string()
            }
        };

        DispatchOutcome::conversational(text, reply)
    }

    async fn execute_structured(
        &self,
        action: &StructuredAction,
        context: &History,
    ) -> Result<String> {
        let data = &action.data;
        let ready = action.reply().map(str::to_string);

        let reply = match action.action_type {
            ActionType::Schedule => {
                let title = data.title.as_deref().unwrap_or("Event");
                let start = parse_time(data.start_time.as_deref()).unwrap_or(DEFAULT_START);
                let end = parse_time(data.end_time.as_deref()).unwrap_or(DEFAULT_END);
                let date = parse_date(data.date.as_deref()).unwrap_or_else(today);
                self.sink.add_schedule(title, start, end, date).await?;
                ready.unwrap_or_else(|| format!("Scheduled {title}."))
            }
            ActionType::ReminderBatch => {
                for reminder in data.reminders.iter().flatten() {
                    let time = TimeSpec::parse(reminder.time.as_deref().unwrap_or_default());
                    let date = parse_date(reminder.date.as_deref());
                    self.sink.add_reminder(&reminder.text, &time, date).await?;
                }
                ready.unwrap_or_else(|| "Reminders set.".to_string())
            }
            ActionType::FetchWeather => {
                let location = data.location.as_deref().unwrap_or(DEFAULT_LOCATION);
                let weather = self.lookups.weather(location).await?;
                ready.unwrap_or_else(|| format!("{}° in {}.", weather.temp, weather.location))
            }
            ActionType::FetchNews => {
                let articles = self.lookups.news(data.query.as_deref()).await?;
                tracing::debug!(count = articles.len(), "news fetched");
                ready.unwrap_or_else(|| "Top headlines.".to_string())
            }
            ActionType::FetchStock => {
                let symbol = data.symbol.as_deref().unwrap_or_default();
                let quote = self.lookups.stock(symbol).await?;
                ready.unwrap_or_else(|| format!("{} is {}.", quote.symbol, quote.price))
            }
            ActionType::FetchWebSearch => {
                let query = data.query.as_deref().unwrap_or_default();
                let results = self.lookups.web_search(query).await?;
                let prompt = format!("Summarize: {}", serde_json::to_string(&results)?);
                self.model.complete(context, &prompt, None).await?
            }
            ActionType::None => ready.unwrap_or_else(|| "Done.".to_string()),
        };

        Ok(reply)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_time(value: Option<&str>) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value?.trim(), "%H:%M").ok()
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?.trim(), "%Y-%m-%d").ok()
}
