//! Macro replay: sequential async step dispatch over a document host.

mod events;
mod executor;
mod host;

pub use events::{ConsoleListener, ReplayEmitter, ReplayEvent};
pub use executor::{
    cancel_pair, CancelHandle, CancelToken, ReplayExecutor, ReplaySession,
    ReplayStatus, RunReport,
};
pub use host::{DocumentHost, DomHost, Notification};
