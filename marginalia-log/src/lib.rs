//! marginalia-log - log event dispatch
//!
//! Commentary markers inside scripts become [`LogEvent`]s at run time. This
//! crate owns everything that happens to an event after it leaves the VM:
//!
//! - **[`SeverityTable`]**: maps marker symbols (`?`, `:`, `!`, `!!`) to a
//!   numeric level and a display name
//! - **[`Dispatcher`]**: ordered registry of handlers, broadcast on `emit`
//! - **Handlers**: [`Recorder`], [`PrintHandler`], [`TracingHandler`]
//!
//! The dispatcher is an explicit object. [`Dispatcher::global`] exists as a
//! convenience for binaries; libraries and tests should construct their own.
//!
//! # Example
//!
//! ```
//! use marginalia_log::{Dispatcher, LogEvent, Recorder};
//!
//! let dispatcher = Dispatcher::new();
//! let recorder = Recorder::new();
//! dispatcher.register(recorder.handler());
//!
//! dispatcher.emit(&LogEvent::working("app:main", "hello")).unwrap();
//! assert_eq!(recorder.events().len(), 1);
//! ```

mod dispatcher;
mod event;
mod handlers;
mod severity;

pub use dispatcher::{DispatchError, Dispatcher, Handler, HandlerError};
pub use event::{ErrorDescription, EventState, LogEvent, Payload};
pub use handlers::{PrintHandler, Recorder, TracingHandler};
pub use severity::{SeverityEntry, SeverityError, SeverityTable};
