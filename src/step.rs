use serde::{Deserialize, Serialize};

/// One recorded user interaction, in replayable form.
///
/// Steps are serialized with an internal `kind` tag and camelCase field
/// names, so a recorded macro reads naturally as JSON:
///
/// ```json
/// { "kind": "click", "selector": "#submit", "tag": "button",
///   "text": "Submit", "timestampMs": 1203 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    /// Click on an element. `tag` and `text` are informational context for
    /// readers of the macro; replay uses only the selector. `checked` is
    /// present when the click represents a checkbox/radio toggle and carries
    /// the state the control ended up in.
    Click {
        selector: String,
        tag: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        #[serde(default)]
        timestamp_ms: u64,
    },
    /// Final text of an editable field. For secret fields `text` holds the
    /// redaction marker, never the literal value.
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        is_secret: bool,
        #[serde(default)]
        timestamp_ms: u64,
    },
    /// Committed value of a select control.
    Select {
        selector: String,
        value: String,
        #[serde(default)]
        timestamp_ms: u64,
    },
    /// Pause during replay. `timeout_ms: None` means the configured default.
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(default)]
        timestamp_ms: u64,
    },
    /// Catch-all for step kinds written by a newer producer. Replay skips
    /// these with a warning instead of failing the run.
    #[serde(other)]
    Unknown,
}

impl Step {
    /// The selector this step targets, if it targets an element at all.
    pub fn selector(&self) -> Option<&str> {
        match self {
            Step::Click { selector, .. }
            | Step::Type { selector, .. }
            | Step::Select { selector, .. } => Some(selector),
            Step::Wait { .. } | Step::Unknown => None,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Step::Click { timestamp_ms, .. }
            | Step::Type { timestamp_ms, .. }
            | Step::Select { timestamp_ms, .. }
            | Step::Wait { timestamp_ms, .. } => *timestamp_ms,
            Step::Unknown => 0,
        }
    }

    /// Short human-readable description used in progress output.
    pub fn describe(&self) -> String {
        match self {
            Step::Click { selector, text, .. } => {
                if text.is_empty() {
                    format!("click {}", selector)
                } else {
                    format!("click {} ({})", selector, text)
                }
            }
            Step::Type { selector, is_secret, text, .. } => {
                if *is_secret {
                    format!("type into {} (secret)", selector)
                } else {
                    format!("type '{}' into {}", text, selector)
                }
            }
            Step::Select { selector, value, .. } => {
                format!("select '{}' in {}", value, selector)
            }
            Step::Wait { timeout_ms, .. } => match timeout_ms {
                Some(ms) => format!("wait {}ms", ms),
                None => "wait".to_string(),
            },
            Step::Unknown => "unknown step".to_string(),
        }
    }
}
