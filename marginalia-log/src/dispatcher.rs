//! Handler registry and broadcast

use crate::event::{EventState, LogEvent, Payload};
use crate::severity::{SeverityEntry, SeverityError, SeverityTable};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Error returned by a handler; propagates to the emitting code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("handler is not registered")]
    NotRegistered,
}

type HandlerFn = dyn Fn(&LogEvent) -> Result<(), HandlerError> + Send + Sync;

/// A registered callable. Identity is the allocation, so clones of one
/// `Handler` are the same handler.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LogEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Handler(Arc::new(f))
    }

    pub fn call(&self, event: &LogEvent) -> Result<(), HandlerError> {
        (self.0)(event)
    }

    pub fn same(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0))
    }
}

/// Ordered set of distinct handlers plus the severity table
///
/// Mutation is serialized behind a lock; `emit` iterates over a snapshot of
/// the handler list, so a handler may register or remove handlers without
/// deadlocking and the change takes effect from the next `emit`.
#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: RwLock<Vec<Handler>>,
    severities: RwLock<SeverityTable>,
}

static GLOBAL: Lazy<Arc<Dispatcher>> = Lazy::new(|| Arc::new(Dispatcher::new()));

impl Dispatcher {
    /// A dispatcher with no handlers and the default severity table
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default instance
    pub fn global() -> Arc<Dispatcher> {
        Arc::clone(&GLOBAL)
    }

    /// Register a handler. Registering the same handler twice is a no-op.
    pub fn register(&self, handler: Handler) -> Handler {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !handlers.iter().any(|h| h.same(&handler)) {
            handlers.push(handler.clone());
            tracing::debug!(target: "marginalia::dispatch", count = handlers.len(), "handler registered");
        }
        handler
    }

    pub fn remove(&self, handler: &Handler) -> Result<(), DispatchError> {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = handlers
            .iter()
            .position(|h| h.same(handler))
            .ok_or(DispatchError::NotRegistered)?;
        handlers.remove(index);
        tracing::debug!(target: "marginalia::dispatch", count = handlers.len(), "handler removed");
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Vec<Handler> {
        match self.handlers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Broadcast to every handler in registration order.
    ///
    /// The first handler error stops the broadcast and is returned.
    pub fn emit(&self, event: &LogEvent) -> Result<(), HandlerError> {
        for handler in self.snapshot() {
            handler.call(event)?;
        }
        Ok(())
    }

    /// Build and broadcast an event
    pub fn emit_with(
        &self,
        state: EventState,
        context: &str,
        payload: Payload,
    ) -> Result<(), HandlerError> {
        self.emit(&LogEvent::new(state, context, payload))
    }

    pub fn define_severity(&self, symbol: &str, level: i64, name: &str) -> Result<(), SeverityError> {
        let mut table = match self.severities.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.define(symbol, level, name)
    }

    pub fn resolve_severity(&self, symbol: &str) -> Result<(i64, String), SeverityError> {
        let table = self.severities();
        table.resolve(symbol).map(|(level, name)| (level, name.to_string()))
    }

    /// Entry registered for `symbol`, if any
    pub fn severity_entry(&self, symbol: &str) -> Option<SeverityEntry> {
        let table = match self.severities.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.entry(symbol).cloned()
    }

    /// A copy of the current severity table
    pub fn severities(&self) -> SeverityTable {
        match self.severities.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tagging(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        Handler::new(move |event| {
            log.lock().unwrap().push(format!("{}:{}", tag, event.context));
            Ok(())
        })
    }

    #[test]
    fn test_emission_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(tagging(log.clone(), "h1"));
        dispatcher.register(tagging(log.clone(), "h2"));

        dispatcher.emit(&LogEvent::working("m:a", "x")).unwrap();
        dispatcher.emit(&LogEvent::working("m:b", "y")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["h1:m:a", "h2:m:a", "h1:m:b", "h2:m:b"]
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = tagging(log.clone(), "h");

        let returned = dispatcher.register(handler.clone());
        dispatcher.register(handler.clone());
        assert!(returned.same(&handler));
        assert_eq!(dispatcher.handler_count(), 1);

        dispatcher.emit(&LogEvent::working("m:f", "once")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let dispatcher = Dispatcher::new();
        let handler = Handler::new(|_| Ok(()));

        assert_eq!(dispatcher.remove(&handler), Err(DispatchError::NotRegistered));
        dispatcher.register(handler.clone());
        assert!(dispatcher.remove(&handler).is_ok());
        assert_eq!(dispatcher.handler_count(), 0);
        assert_eq!(dispatcher.remove(&handler), Err(DispatchError::NotRegistered));
    }

    #[test]
    fn test_handler_error_stops_broadcast() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Handler::new(|_| Err(HandlerError::new("sink full"))));
        dispatcher.register(tagging(log.clone(), "after"));

        let err = dispatcher.emit(&LogEvent::working("m:f", "x")).unwrap_err();
        assert_eq!(err.message, "sink full");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_may_mutate_registry_during_emit() {
        let dispatcher = Arc::new(Dispatcher::new());
        let inner = Arc::clone(&dispatcher);
        let late = Handler::new(|_| Ok(()));
        let late_clone = late.clone();
        dispatcher.register(Handler::new(move |_| {
            inner.register(late_clone.clone());
            Ok(())
        }));

        dispatcher.emit(&LogEvent::working("m:f", "x")).unwrap();
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[test]
    fn test_severity_through_dispatcher() {
        let dispatcher = Dispatcher::new();
        dispatcher.define_severity("~", 5, "TRACE").unwrap();
        assert_eq!(dispatcher.resolve_severity("~").unwrap(), (5, "TRACE".to_string()));
        assert!(dispatcher.define_severity("a b", 1, "X").is_err());
        assert!(dispatcher.severities().contains(":"));
    }

    #[test]
    fn test_global_is_shared() {
        let a = Dispatcher::global();
        let b = Dispatcher::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
