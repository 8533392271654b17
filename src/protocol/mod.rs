//! Controller message boundary.
//!
//! Requests arrive one at a time as JSON objects tagged by `type`; each gets
//! exactly one JSON response. `runMacro` is acknowledged immediately and its
//! terminal [`RunReport`] is delivered afterwards as a separate
//! `{"report": …}` line, so controllers always learn how a run ended.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::config::{RecorderConfig, ReplayConfig};
use crate::dom::Document;
use crate::error::{DomrecError, Result};
use crate::recorder::{CaptureEvent, Recorder};
use crate::replay::{DomHost, ReplayExecutor, RunReport};
use crate::step::Step;

/// A request from the controlling process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerRequest {
    StartRecording,
    StopRecording,
    RunMacro {
        steps: Vec<Step>,
    },
    /// A raw interaction observed by the embedding, addressed by child-index
    /// path from the document root (e.g. `"0.2"`). `value` carries the new
    /// field value for input events and the committed value or checked state
    /// for change events.
    CaptureEvent {
        event: CaptureKind,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Click,
    Input,
    Change,
}

/// One response per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControllerResponse {
    Steps { steps: Vec<Step> },
    Status { status: String },
    Error { error: String },
}

impl ControllerResponse {
    fn status(text: &str) -> Self {
        ControllerResponse::Status { status: text.to_string() }
    }

    fn error(text: impl ToString) -> Self {
        ControllerResponse::Error { error: text.to_string() }
    }
}

/// A persisted macro: the step list wrapped with identity and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroFile {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
}

impl MacroFile {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            steps,
        }
    }

    pub fn load(path: &Path) -> Result<MacroFile> {
        let raw = std::fs::read_to_string(path)?;
        // accept both the wrapped form and a bare step array
        if let Ok(file) = serde_json::from_str::<MacroFile>(&raw) {
            return Ok(file);
        }
        let steps: Vec<Step> = serde_json::from_str(&raw)?;
        Ok(MacroFile::new("unnamed", steps))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Owns the document snapshot and the recording session, and services
/// controller requests against them.
pub struct Service {
    doc: Document,
    recorder: Recorder,
    replay_config: ReplayConfig,
}

impl Service {
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            recorder: Recorder::new(RecorderConfig::default()),
            replay_config: ReplayConfig::default(),
        }
    }

    pub fn with_replay_config(mut self, config: ReplayConfig) -> Self {
        self.replay_config = config;
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn start_recording(&mut self) -> ControllerResponse {
        match self.recorder.start() {
            Ok(()) => ControllerResponse::status("recording started"),
            Err(e) => ControllerResponse::error(e),
        }
    }

    pub fn stop_recording(&mut self) -> ControllerResponse {
        match self.recorder.stop() {
            Ok(steps) => ControllerResponse::Steps { steps },
            Err(e) => ControllerResponse::error(e),
        }
    }

    /// Apply the observed state change to the document, then let the
    /// recorder translate the event.
    pub fn capture_event(
        &mut self,
        kind: CaptureKind,
        path: &str,
        value: Option<String>,
    ) -> ControllerResponse {
        let indices = match parse_path(path) {
            Ok(p) => p,
            Err(e) => return ControllerResponse::error(e),
        };
        let Some(target) = self.doc.node_at_path(&indices) else {
            return ControllerResponse::error(format!(
                "no node at path '{}'",
                path
            ));
        };
        let event = match kind {
            CaptureKind::Click => CaptureEvent::Click { target },
            CaptureKind::Input => {
                let value = value.unwrap_or_default();
                self.doc.get_mut(target).value = value.clone();
                CaptureEvent::Input { target, value }
            }
            CaptureKind::Change => {
                if let Some(value) = value {
                    let el = self.doc.get_mut(target);
                    if el.is_toggle() {
                        el.checked = value == "true";
                    } else {
                        el.value = value;
                    }
                }
                CaptureEvent::Change { target }
            }
        };
        self.recorder.handle_event(&self.doc, event);
        ControllerResponse::status("event captured")
    }

    /// Run a macro against the current document and adopt the resulting
    /// state. The ack/report split happens in [`Service::serve`].
    pub async fn run_macro(&mut self, steps: Vec<Step>) -> RunReport {
        let host = DomHost::new(self.doc.clone());
        let mut executor = ReplayExecutor::new(host, self.replay_config.clone());
        let session = executor.run(&steps).await;
        self.doc = executor.into_host().into_document();
        session.report()
    }

    /// JSON-lines request loop. Ends when the input closes.
    pub async fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ControllerRequest>(line) {
                Ok(ControllerRequest::StartRecording) => {
                    let resp = self.start_recording();
                    write_json(&mut output, &resp).await?;
                }
                Ok(ControllerRequest::StopRecording) => {
                    let resp = self.stop_recording();
                    write_json(&mut output, &resp).await?;
                }
                Ok(ControllerRequest::CaptureEvent { event, path, value }) => {
                    let resp = self.capture_event(event, &path, value);
                    write_json(&mut output, &resp).await?;
                }
                Ok(ControllerRequest::RunMacro { steps }) => {
                    let ack = ControllerResponse::status("macro running");
                    write_json(&mut output, &ack).await?;
                    let report = self.run_macro(steps).await;
                    write_json(&mut output, &serde_json::json!({ "report": report }))
                        .await?;
                }
                Err(e) => {
                    let resp =
                        ControllerResponse::error(format!("bad request: {}", e));
                    write_json(&mut output, &resp).await?;
                }
            }
        }
        Ok(())
    }
}

async fn write_json<W, T>(output: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}

fn parse_path(path: &str) -> Result<Vec<usize>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('.')
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                DomrecError::Parse(format!("bad path segment '{}'", part))
            })
        })
        .collect()
}
