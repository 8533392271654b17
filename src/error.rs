use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomrecError {
    /// A step's selector matched nothing at replay time. Fatal to the run;
    /// `step` is the 1-based index of the failing step.
    #[error("step {step}: no element matches selector '{selector}'")]
    ElementNotFound { step: usize, selector: String },

    /// A host effect failed while dispatching a step.
    #[error("step {step} failed: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording is in progress")]
    NotRecording,

    #[error("replay cancelled")]
    Cancelled,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DomrecError>;
