//! Ready-made handlers

use crate::dispatcher::Handler;
use crate::event::{EventState, LogEvent};
use std::sync::{Arc, Mutex};

/// Collects every event it receives
///
/// `handler()` always returns the same [`Handler`], so registering it twice
/// is a no-op like for any other handler.
#[derive(Debug, Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<LogEvent>>>,
    handler: Handler,
}

impl Recorder {
    pub fn new() -> Self {
        let events: Arc<Mutex<Vec<LogEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handler = Handler::new(move |event| {
            match sink.lock() {
                Ok(mut guard) => guard.push(event.clone()),
                Err(poisoned) => poisoned.into_inner().push(event.clone()),
            }
            Ok(())
        });
        Self { events, handler }
    }

    pub fn handler(&self) -> Handler {
        self.handler.clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// `(state, context)` pairs, handy for ordering assertions
    pub fn states(&self) -> Vec<(EventState, String)> {
        self.events()
            .into_iter()
            .map(|e| (e.state, e.context))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints one line per event to stdout
pub struct PrintHandler;

impl PrintHandler {
    pub fn handler() -> Handler {
        Handler::new(|event| {
            println!("{}", event.format());
            Ok(())
        })
    }
}

/// Forwards events into `tracing` under the `marginalia::events` target
///
/// `working` events map their severity level onto a tracing level
/// (<20 debug, <30 info, <40 warn, otherwise error); `failure` is always
/// an error and the remaining lifecycle states are debug.
pub struct TracingHandler;

impl TracingHandler {
    pub fn handler() -> Handler {
        Handler::new(|event| {
            let payload = event.payload.to_string();
            match (event.state, event.severity.as_ref().map(|s| s.level)) {
                (EventState::Failure, _) => {
                    tracing::error!(target: "marginalia::events", context = %event.context, state = %event.state, "{}", payload)
                }
                (EventState::Working, Some(level)) if level >= 40 => {
                    tracing::error!(target: "marginalia::events", context = %event.context, state = %event.state, "{}", payload)
                }
                (EventState::Working, Some(level)) if level >= 30 => {
                    tracing::warn!(target: "marginalia::events", context = %event.context, state = %event.state, "{}", payload)
                }
                (EventState::Working, Some(level)) if level >= 20 => {
                    tracing::info!(target: "marginalia::events", context = %event.context, state = %event.state, "{}", payload)
                }
                _ => {
                    tracing::debug!(target: "marginalia::events", context = %event.context, state = %event.state, "{}", payload)
                }
            }
            Ok(())
        })
    }
}
