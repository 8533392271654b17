use colored::Colorize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::executor::{RunReport, ReplayStatus};

/// Progress notifications emitted while a macro runs. Step indexes are
/// 1-based, matching the index reported on failure.
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    StepStarted {
        index: usize,
        total: usize,
        description: String,
    },
    StepCompleted {
        index: usize,
    },
    StepSkipped {
        index: usize,
        reason: String,
    },
    /// Terminal outcome of the run, delivered after the ack so controllers
    /// can observe completion asynchronously.
    RunFinished {
        report: RunReport,
    },
}

/// Broadcast fan-out for replay progress. Cheap to clone; emitting with no
/// subscribers is fine.
#[derive(Clone)]
pub struct ReplayEmitter {
    tx: broadcast::Sender<ReplayEvent>,
}

impl ReplayEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ReplayEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for ReplayEmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders replay progress to stdout. Runs until the emitter is dropped.
pub struct ConsoleListener;

impl ConsoleListener {
    pub fn spawn(mut rx: broadcast::Receiver<ReplayEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => Self::render(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("console listener dropped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn render(event: &ReplayEvent) {
        match event {
            ReplayEvent::StepStarted { index, total, description } => {
                println!(
                    "{} {}",
                    format!("[{}/{}]", index, total).cyan(),
                    description
                );
            }
            ReplayEvent::StepCompleted { .. } => {
                println!("      {}", "ok".green());
            }
            ReplayEvent::StepSkipped { reason, .. } => {
                println!("      {} {}", "skipped:".yellow(), reason);
            }
            ReplayEvent::RunFinished { report } => match report.status {
                ReplayStatus::Completed => {
                    println!("{}", "run completed".green().bold());
                }
                ReplayStatus::Aborted => {
                    println!(
                        "{} {}",
                        "run aborted:".red().bold(),
                        report.error.as_deref().unwrap_or("unknown error")
                    );
                }
                ReplayStatus::Running => {}
            },
        }
    }
}
