use std::time::Instant;

use crate::config::RecorderConfig;
use crate::dom::{Document, NodeId};
use crate::error::{DomrecError, Result};
use crate::selector::{self, SelectorDiagnostic};
use crate::step::Step;

use super::capture::{snippet, CaptureEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
}

/// A recording session. Owns its step buffer; callers hold the session for
/// as long as they want recording to be possible, there is no global state.
///
/// `start` while already recording is an error rather than a silent reset,
/// so a controller that double-starts finds out instead of losing a buffer.
pub struct Recorder {
    status: RecorderStatus,
    buffer: Vec<Step>,
    started_at: Option<Instant>,
    last_timestamp_ms: u64,
    config: RecorderConfig,
    diagnostics: Vec<SelectorDiagnostic>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            status: RecorderStatus::Idle,
            buffer: Vec::new(),
            started_at: None,
            last_timestamp_ms: 0,
            config,
            diagnostics: Vec::new(),
        }
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecorderStatus::Recording
    }

    pub fn step_count(&self) -> usize {
        self.buffer.len()
    }

    /// Begin a new recording with an empty buffer.
    pub fn start(&mut self) -> Result<()> {
        if self.is_recording() {
            return Err(DomrecError::AlreadyRecording);
        }
        self.buffer.clear();
        self.diagnostics.clear();
        self.started_at = Some(Instant::now());
        self.last_timestamp_ms = 0;
        self.status = RecorderStatus::Recording;
        log::info!("recording started");
        Ok(())
    }

    /// End the recording and hand over the captured steps.
    pub fn stop(&mut self) -> Result<Vec<Step>> {
        if !self.is_recording() {
            return Err(DomrecError::NotRecording);
        }
        self.status = RecorderStatus::Idle;
        self.started_at = None;
        let steps = std::mem::take(&mut self.buffer);
        log::info!("recording stopped with {} steps", steps.len());
        Ok(steps)
    }

    /// Resolver fallbacks observed since the recording started.
    pub fn take_diagnostics(&mut self) -> Vec<SelectorDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Translate one capture event against the current document state.
    /// Events arriving while idle are dropped.
    pub fn handle_event(&mut self, doc: &Document, event: CaptureEvent) {
        if !self.is_recording() {
            log::debug!("ignoring {:?} while idle", event);
            return;
        }
        match event {
            CaptureEvent::Click { target } => self.on_click(doc, target),
            CaptureEvent::Input { target, value } => {
                self.on_input(doc, target, value)
            }
            CaptureEvent::Change { target } => self.on_change(doc, target),
        }
    }

    fn on_click(&mut self, doc: &Document, target: NodeId) {
        if self.in_overlay(doc, target) {
            log::debug!("click inside status overlay, not recorded");
            return;
        }
        let el = doc.get(target);
        if el.is_toggle() {
            // the change event is the canonical record for toggles
            return;
        }
        let timestamp_ms = self.timestamp();
        let selector = self.resolve(doc, target);
        let tag = el.tag.clone();
        let text = snippet(&doc.rendered_text(target), self.config.text_snippet_len);
        self.buffer.push(Step::Click {
            selector,
            tag,
            text,
            checked: None,
            timestamp_ms,
        });
    }

    fn on_input(&mut self, doc: &Document, target: NodeId, value: String) {
        let el = doc.get(target);
        if !el.is_editable() {
            log::debug!("input event on non-editable <{}>, ignored", el.tag);
            return;
        }
        let timestamp_ms = self.timestamp();
        let selector = self.resolve(doc, target);
        let is_secret = el.is_secret();
        let text = if is_secret {
            self.config.redaction_marker.clone()
        } else {
            value
        };
        // keystrokes collapse to one step holding the field's final value
        self.buffer.retain(
            |s| !matches!(s, Step::Type { selector: sel, .. } if *sel == selector),
        );
        self.buffer.push(Step::Type {
            selector,
            text,
            is_secret,
            timestamp_ms,
        });
    }

    fn on_change(&mut self, doc: &Document, target: NodeId) {
        let el = doc.get(target);
        if el.is_select() {
            let timestamp_ms = self.timestamp();
            let selector = self.resolve(doc, target);
            let value = el.value.clone();
            self.buffer.push(Step::Select {
                selector,
                value,
                timestamp_ms,
            });
        } else if el.is_toggle() {
            let timestamp_ms = self.timestamp();
            let selector = self.resolve(doc, target);
            let tag = el.tag.clone();
            let checked = el.checked;
            let text =
                snippet(&doc.rendered_text(target), self.config.text_snippet_len);
            self.buffer.push(Step::Click {
                selector,
                tag,
                text,
                checked: Some(checked),
                timestamp_ms,
            });
        } else {
            log::debug!("change event on <{}>, ignored", el.tag);
        }
    }

    fn resolve(&mut self, doc: &Document, node: NodeId) -> String {
        let mut seen = Vec::new();
        let selector = selector::resolve_with(doc, node, &mut |d| seen.push(d));
        for d in seen {
            log::warn!("{}", d);
            self.diagnostics.push(d);
        }
        selector
    }

    /// Milliseconds since recording started, clamped non-decreasing.
    fn timestamp(&mut self) -> u64 {
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let ts = elapsed.max(self.last_timestamp_ms);
        self.last_timestamp_ms = ts;
        ts
    }

    /// The recorder's own status overlay must not record itself.
    fn in_overlay(&self, doc: &Document, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if doc.get(n).id() == Some(self.config.overlay_id.as_str()) {
                return true;
            }
            cur = doc.parent(n);
        }
        false
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}
