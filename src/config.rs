/// Replay timing configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Pause after scrolling a target into view, before acting (ms)
    pub settle_delay_ms: u64,

    /// Pause between steps, giving the page time to react (ms)
    pub inter_step_delay_ms: u64,

    /// Duration of a `Wait` step that carries no explicit timeout (ms)
    pub default_wait_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 150,
            inter_step_delay_ms: 500,
            default_wait_ms: 1000,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Maximum length of the rendered-text snippet stored on Click steps
    pub text_snippet_len: usize,

    /// Stored in place of the literal value for secret fields
    pub redaction_marker: String,

    /// Element id of the recorder's own status overlay; clicks on it or
    /// inside it are not recorded
    pub overlay_id: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            text_snippet_len: 50,
            redaction_marker: "********".to_string(),
            overlay_id: "domrec-status".to_string(),
        }
    }
}
