use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::ReplayConfig;
use crate::error::{DomrecError, Result};
use crate::step::Step;

use super::events::{ReplayEmitter, ReplayEvent};
use super::host::DocumentHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Running,
    Completed,
    Aborted,
}

/// Transient state of one run. Created by [`ReplayExecutor::run`], returned
/// as the outcome, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySession {
    pub status: ReplayStatus,
    /// 1-based index of the step currently (or last) being dispatched.
    pub index: usize,
    pub total: usize,
    pub last_error: Option<String>,
}

impl ReplaySession {
    fn new(total: usize) -> Self {
        Self {
            status: ReplayStatus::Running,
            index: 0,
            total,
            last_error: None,
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            status: self.status,
            failed_step: match self.status {
                ReplayStatus::Aborted => Some(self.index),
                _ => None,
            },
            error: self.last_error.clone(),
        }
    }
}

/// Terminal run outcome, serialized for controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: ReplayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Requests cancellation of a running replay.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Checked between steps and raced against every sleep inside the run loop.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested. Pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A linked handle/token pair for one run.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

enum Dispatch {
    Done,
    Skipped(String),
}

/// Sequential macro runner over a [`DocumentHost`].
///
/// Steps run strictly in order. The first step whose selector matches
/// nothing, or whose effect fails, aborts the whole remaining run; there is
/// no retry and no rollback of effects already applied.
pub struct ReplayExecutor<H: DocumentHost> {
    host: H,
    config: ReplayConfig,
    emitter: ReplayEmitter,
}

impl<H: DocumentHost> ReplayExecutor<H> {
    pub fn new(host: H, config: ReplayConfig) -> Self {
        Self {
            host,
            config,
            emitter: ReplayEmitter::new(),
        }
    }

    pub fn emitter(&self) -> &ReplayEmitter {
        &self.emitter
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Run to completion without external cancellation.
    pub async fn run(&mut self, steps: &[Step]) -> ReplaySession {
        let (_handle, token) = cancel_pair();
        self.run_with_cancel(steps, token).await
    }

    /// Run with a cancellation token. A cancelled run ends `Aborted` with a
    /// `Cancelled` error at the step it was interrupted on.
    pub async fn run_with_cancel(
        &mut self,
        steps: &[Step],
        mut cancel: CancelToken,
    ) -> ReplaySession {
        let total = steps.len();
        let mut session = ReplaySession::new(total);
        log::info!("replaying {} steps", total);

        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            session.index = index;
            if cancel.is_cancelled() {
                return self.abort(session, DomrecError::Cancelled);
            }
            self.emitter.emit(ReplayEvent::StepStarted {
                index,
                total,
                description: step.describe(),
            });
            match self.dispatch(step, index, &mut cancel).await {
                Ok(Dispatch::Done) => {
                    self.emitter.emit(ReplayEvent::StepCompleted { index });
                }
                Ok(Dispatch::Skipped(reason)) => {
                    self.emitter.emit(ReplayEvent::StepSkipped { index, reason });
                    continue;
                }
                Err(e) => return self.abort(session, e),
            }
            if index < total {
                if let Err(e) =
                    self.pause(self.config.inter_step_delay_ms, &mut cancel).await
                {
                    return self.abort(session, e);
                }
            }
        }

        session.status = ReplayStatus::Completed;
        self.emitter
            .emit(ReplayEvent::RunFinished { report: session.report() });
        session
    }

    async fn dispatch(
        &mut self,
        step: &Step,
        index: usize,
        cancel: &mut CancelToken,
    ) -> Result<Dispatch> {
        match step {
            Step::Wait { timeout_ms, .. } => {
                let ms = timeout_ms.unwrap_or(self.config.default_wait_ms);
                self.pause(ms, cancel).await?;
                Ok(Dispatch::Done)
            }
            Step::Unknown => {
                log::warn!("step {}: unknown step kind, skipping", index);
                Ok(Dispatch::Skipped("unknown step kind".to_string()))
            }
            Step::Click { selector, .. } => {
                let node = self.prepare(selector, index, cancel).await?;
                self.host
                    .click(node)
                    .await
                    .map_err(|e| DomrecError::StepFailed { step: index, source: e })?;
                Ok(Dispatch::Done)
            }
            Step::Type { selector, text, .. } => {
                let node = self.prepare(selector, index, cancel).await?;
                self.host
                    .fill(node, text)
                    .await
                    .map_err(|e| DomrecError::StepFailed { step: index, source: e })?;
                Ok(Dispatch::Done)
            }
            Step::Select { selector, value, .. } => {
                let node = self.prepare(selector, index, cancel).await?;
                self.host
                    .select(node, value)
                    .await
                    .map_err(|e| DomrecError::StepFailed { step: index, source: e })?;
                Ok(Dispatch::Done)
            }
        }
    }

    /// Locate the target and walk it through the scroll/settle/highlight
    /// sequence shared by every element-directed step.
    async fn prepare(
        &mut self,
        selector: &str,
        index: usize,
        cancel: &mut CancelToken,
    ) -> Result<crate::dom::NodeId> {
        let node = self.host.query(selector).ok_or_else(|| {
            DomrecError::ElementNotFound {
                step: index,
                selector: selector.to_string(),
            }
        })?;
        self.host
            .scroll_into_view(node)
            .await
            .map_err(|e| DomrecError::StepFailed { step: index, source: e })?;
        self.pause(self.config.settle_delay_ms, cancel).await?;
        self.host
            .highlight(node)
            .await
            .map_err(|e| DomrecError::StepFailed { step: index, source: e })?;
        Ok(node)
    }

    async fn pause(&self, ms: u64, cancel: &mut CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(DomrecError::Cancelled);
        }
        if ms == 0 {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
            _ = cancel.cancelled() => Err(DomrecError::Cancelled),
        }
    }

    fn abort(&self, mut session: ReplaySession, err: DomrecError) -> ReplaySession {
        log::error!("replay aborted: {}", err);
        session.status = ReplayStatus::Aborted;
        session.last_error = Some(err.to_string());
        self.emitter
            .emit(ReplayEvent::RunFinished { report: session.report() });
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;
    use crate::dom::Document;
    use crate::recorder::{CaptureEvent, Recorder};
    use crate::replay::host::DomHost;

    const PAGE: &str = r#"
        <body>
          <button id="go">Go</button>
          <input name="user" type="text"/>
          <input id="agree" type="checkbox"/>
          <select name="color">
            <option value="red">Red</option>
            <option value="blue">Blue</option>
          </select>
        </body>
    "#;

    fn fast_config() -> ReplayConfig {
        ReplayConfig {
            settle_delay_ms: 0,
            inter_step_delay_ms: 0,
            default_wait_ms: 0,
        }
    }

    fn executor() -> ReplayExecutor<DomHost> {
        let host = DomHost::new(Document::parse(PAGE).unwrap());
        ReplayExecutor::new(host, fast_config())
    }

    fn click(selector: &str) -> Step {
        Step::Click {
            selector: selector.to_string(),
            tag: "button".to_string(),
            text: String::new(),
            checked: None,
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_empty_macro_completes() {
        let mut ex = executor();
        let session = ex.run(&[]).await;
        assert_eq!(session.status, ReplayStatus::Completed);
        assert!(ex.host().journal().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_reports_one_based_index() {
        let mut ex = executor();
        let steps = vec![click("#go"), click("#missing"), click("#go")];
        let session = ex.run(&steps).await;
        assert_eq!(session.status, ReplayStatus::Aborted);
        assert_eq!(session.index, 2);
        let err = session.last_error.unwrap();
        assert!(err.contains("step 2"), "{}", err);
        assert!(err.contains("#missing"), "{}", err);
        // step 1's effect stays applied, step 3 never ran
        assert_eq!(ex.host().journal().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_steps_skipped_without_abort() {
        let mut ex = executor();
        let steps = vec![click("#go"), Step::Unknown, click("#go")];
        let session = ex.run(&steps).await;
        assert_eq!(session.status, ReplayStatus::Completed);
        assert_eq!(ex.host().journal().len(), 2);
    }

    #[tokio::test]
    async fn test_wait_step_with_explicit_timeout() {
        let mut ex = executor();
        let steps =
            vec![Step::Wait { timeout_ms: Some(1), timestamp_ms: 0 }, click("#go")];
        let session = ex.run(&steps).await;
        assert_eq!(session.status, ReplayStatus::Completed);
        assert_eq!(ex.host().journal().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_run_aborts_first_step() {
        let mut ex = executor();
        let (handle, token) = cancel_pair();
        handle.cancel();
        let session = ex.run_with_cancel(&[click("#go")], token).await;
        assert_eq!(session.status, ReplayStatus::Aborted);
        assert_eq!(session.index, 1);
        assert!(ex.host().journal().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_a_wait() {
        let mut ex = executor();
        let (handle, token) = cancel_pair();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });
        let steps =
            vec![Step::Wait { timeout_ms: Some(60_000), timestamp_ms: 0 }];
        let session = ex.run_with_cancel(&steps, token).await;
        assert_eq!(session.status, ReplayStatus::Aborted);
        assert_eq!(session.last_error.as_deref(), Some("replay cancelled"));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_events_trace_the_run() {
        let mut ex = executor();
        let mut rx = ex.emitter().subscribe();
        let steps = vec![click("#go"), Step::Unknown];
        ex.run(&steps).await;
        let mut trace = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            trace.push(ev);
        }
        assert!(matches!(
            trace[0],
            ReplayEvent::StepStarted { index: 1, total: 2, .. }
        ));
        assert!(matches!(trace[1], ReplayEvent::StepCompleted { index: 1 }));
        assert!(matches!(trace[2], ReplayEvent::StepStarted { index: 2, .. }));
        assert!(matches!(trace[3], ReplayEvent::StepSkipped { index: 2, .. }));
        match &trace[4] {
            ReplayEvent::RunFinished { report } => {
                assert_eq!(report.status, ReplayStatus::Completed);
                assert_eq!(report.failed_step, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_then_replay_round_trip() {
        let mut record_doc = Document::parse(PAGE).unwrap();
        let mut recorder = Recorder::new(RecorderConfig::default());
        recorder.start().unwrap();

        let go = crate::selector::query(&record_doc, "#go").unwrap();
        let user = crate::selector::query(&record_doc, "[name=\"user\"]").unwrap();
        let sel = crate::selector::query(&record_doc, "[name=\"color\"]").unwrap();
        recorder.handle_event(&record_doc, CaptureEvent::Click { target: go });
        recorder.handle_event(
            &record_doc,
            CaptureEvent::Input { target: user, value: "42".to_string() },
        );
        record_doc.get_mut(sel).value = "blue".to_string();
        recorder.handle_event(&record_doc, CaptureEvent::Change { target: sel });
        let steps = recorder.stop().unwrap();
        assert_eq!(steps.len(), 3);

        // replay against a fresh copy of the same page
        let mut ex = executor();
        let session = ex.run(&steps).await;
        assert_eq!(session.status, ReplayStatus::Completed);
        let host = ex.into_host();
        let doc = host.document();
        let user = crate::selector::query(doc, "[name=\"user\"]").unwrap();
        let sel = crate::selector::query(doc, "[name=\"color\"]").unwrap();
        assert_eq!(doc.get(user).value, "42");
        assert_eq!(doc.get(sel).value, "blue");
        let go = crate::selector::query(doc, "#go").unwrap();
        assert!(host
            .journal()
            .iter()
            .any(|n| n.node == go && n.event == "click"));
    }

    #[test]
    fn test_run_report_serialization() {
        let report = RunReport {
            status: ReplayStatus::Aborted,
            failed_step: Some(2),
            error: Some("step 2: no element matches selector '#x'".to_string()),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["failedStep"], 2);
        let ok = RunReport {
            status: ReplayStatus::Completed,
            failed_step: None,
            error: None,
        };
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, r#"{"status":"completed"}"#);
    }
}
