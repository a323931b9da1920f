//! Intent classification and dispatch

mod dispatcher;
mod native;
mod sink;
mod time;
mod types;

pub use dispatcher::{Dispatcher, EMPTY_REPLY, FALLBACK_REPLY};
pub use native::classify;
pub use sink::{
    ActionSink, Article, ConsoleSink, LaunchTarget, Lookups, NoLookups, Reminder, ScheduleEntry,
    SearchResult, StockQuote, Weather, resolve_launch,
};
pub use time::{DEFAULT_REMINDER_TIME, TimeSpec};
pub use types::{ActionIntent, DispatchOutcome, Reply, Section, Setting};
