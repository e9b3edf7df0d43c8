//! Leveled log events broadcast to a fixed set of sinks.
//!
//! Every component owns an [`EventLog`]. A parent component observes a
//! child by handing it a log built with [`EventLog::forward_to`]: each
//! event the child emits is delivered to the child's sinks and then
//! re-broadcast through the parent, so one sink at the top sees the
//! activity of every nested component.
//!
//! Sinks are fixed at construction. [`EventLog::emit`] is called from many
//! request tasks at once, so sinks must tolerate concurrent calls.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One emitted log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Name of the component that emitted the event.
    pub source: String,
    pub message: String,
}

/// Receives log events.
pub trait LogSink: Send + Sync {
    fn on_event(&self, event: &LogEvent);
}

impl<F> LogSink for F
where
    F: Fn(&LogEvent) + Send + Sync,
{
    fn on_event(&self, event: &LogEvent) {
        self(event)
    }
}

/// A component's log channel.
///
/// Cloning shares the sink list.
#[derive(Clone)]
pub struct EventLog {
    source: String,
    sinks: Arc<[Arc<dyn LogSink>]>,
}

impl EventLog {
    pub fn new(source: impl Into<String>, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        EventLog {
            source: source.into(),
            sinks: sinks.into(),
        }
    }

    /// A log nobody listens to.
    pub fn silent(source: impl Into<String>) -> Self {
        Self::new(source, Vec::new())
    }

    /// A child log whose events are re-broadcast through `parent`.
    pub fn forward_to(source: impl Into<String>, parent: &EventLog) -> Self {
        let forwarder: Arc<dyn LogSink> = Arc::new(Forwarder {
            parent: parent.clone(),
        });
        Self::new(source, vec![forwarder])
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    /// Deliver an event to every sink, in registration order.
    pub fn emit(&self, event: &LogEvent) {
        for sink in self.sinks.iter() {
            sink.on_event(event);
        }
    }

    fn log(&self, level: LogLevel, message: String) {
        if self.sinks.is_empty() {
            return;
        }
        self.emit(&LogEvent {
            level,
            source: self.source.clone(),
            message,
        });
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("source", &self.source)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

struct Forwarder {
    parent: EventLog,
}

impl LogSink for Forwarder {
    fn on_event(&self, event: &LogEvent) {
        self.parent.emit(event);
    }
}

/// Keeps every event in memory. Useful for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl LogSink for RecordingSink {
    fn on_event(&self, event: &LogEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasts_to_every_sink() {
        let first = RecordingSink::new();
        let second = RecordingSink::new();
        let log = EventLog::new("host", vec![first.clone(), second.clone()]);
        log.info("hello");
        assert_eq!(first.messages(), ["hello"]);
        assert_eq!(second.messages(), ["hello"]);
    }

    #[test]
    fn levels_are_recorded() {
        let sink = RecordingSink::new();
        let log = EventLog::new("host", vec![sink.clone()]);
        log.info("a");
        log.warn("b");
        log.error("c");
        let levels: Vec<_> = sink.events().iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn child_events_reach_the_parent_with_their_source() {
        let sink = RecordingSink::new();
        let host = EventLog::new("host", vec![sink.clone()]);
        let listener = EventLog::forward_to("api", &host);
        let nested = EventLog::forward_to("api.worker", &listener);

        listener.warn("from listener");
        nested.error("from worker");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source, "api");
        assert_eq!(events[1].source, "api.worker");
        assert_eq!(events[1].level, LogLevel::Error);
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let sink: Arc<dyn LogSink> = Arc::new(move |_: &LogEvent| {
            *counter.lock().unwrap() += 1;
        });
        let log = EventLog::new("host", vec![sink]);
        log.info("one");
        log.info("two");
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn concurrent_emits_are_all_delivered() {
        let sink = RecordingSink::new();
        let log = EventLog::new("host", vec![sink.clone()]);
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.info(format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(sink.events().len(), 400);
    }
}
