//! Event capture and translation into steps.

mod capture;
mod session;

pub use capture::CaptureEvent;
pub use session::{Recorder, RecorderStatus};
