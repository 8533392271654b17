pub mod config;
pub mod dom;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod replay;
pub mod selector;
pub mod step;

// Re-export common items
pub use error::{DomrecError, Result};
pub use step::Step;
