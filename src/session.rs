//! Single-owner simulation session.
//!
//! A spawned task owns the [`DisplayModel`] and the synchronizer and works
//! through a bounded command queue one message at a time, so commands apply
//! in arrival order. After every applied update the task publishes a copy of
//! the model on a watch channel. Readers borrow that copy, so views and
//! exports never wait behind a command that is still talking to the engine
//! and never observe a half-applied update.
//! Everything else talks to the task through a cloneable [`SessionHandle`].

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::engine::{Command, EngineChannel};
use crate::export::{ExportEncoder, ExportError, ExportFormat};
use crate::memory::{MemoryRow, ROW_COUNT};
use crate::metrics::record_export;
use crate::model::{DisplayModel, RunStatus};
use crate::registers::{FlagSet, RegisterSet};
use crate::snapshots::Snapshot;
use crate::sync::{CommandSynchronizer, SyncError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("simulation session has stopped")]
    Closed,
}

/// What the console renders after every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleView {
    pub status: RunStatus,
    pub registers: RegisterSet,
    pub flags: FlagSet,
    #[serde(rename = "currentInstruction")]
    pub current_instruction: String,
    pub microinstructions: Vec<String>,
    pub memory: [MemoryRow; ROW_COUNT],
}

impl ConsoleView {
    pub fn of(model: &DisplayModel) -> Self {
        let trace = model.trace();
        Self {
            status: model.status(),
            registers: model.registers().clone(),
            flags: *model.flags(),
            current_instruction: trace.display().to_string(),
            microinstructions: trace.microinstructions.clone(),
            memory: model.memory_rows(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

struct Dispatch {
    command: Command,
    reply: oneshot::Sender<Result<ConsoleView, SyncError>>,
}

pub struct Session<C> {
    sync: CommandSynchronizer<C>,
    model: DisplayModel,
    published: watch::Sender<DisplayModel>,
    inbox: mpsc::Receiver<Dispatch>,
}

impl<C: EngineChannel> Session<C> {
    /// Start the session task. The task ends once every handle is dropped.
    pub fn spawn(channel: C, model: DisplayModel, encoder: ExportEncoder, queue_depth: usize) -> SessionHandle {
        let (tx, inbox) = mpsc::channel(queue_depth.max(1));
        let (published, current) = watch::channel(model.clone());
        let session = Session {
            sync: CommandSynchronizer::new(channel),
            model,
            published,
            inbox,
        };
        tokio::spawn(session.run());
        SessionHandle { tx, current, encoder }
    }

    async fn run(mut self) {
        while let Some(Dispatch { command, reply }) = self.inbox.recv().await {
            let result = self.sync.dispatch(&mut self.model, &command).await;
            let result = result.map(|_| {
                self.published.send_replace(self.model.clone());
                ConsoleView::of(&self.model)
            });
            // the caller may have gone away; the update still stands
            let _ = reply.send(result);
        }
        tracing::debug!("session queue closed");
    }
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Dispatch>,
    current: watch::Receiver<DisplayModel>,
    encoder: ExportEncoder,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dispatch({})", self.command.action())
    }
}

impl SessionHandle {
    /// Queue a command and wait for the view it produced.
    pub async fn dispatch(&self, command: Command) -> Result<ConsoleView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Dispatch { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        let result = rx.await.map_err(|_| SessionError::Closed)?;
        Ok(result?)
    }

    /// The last applied state. Does not wait for commands in flight.
    pub fn view(&self) -> ConsoleView {
        ConsoleView::of(&self.current.borrow())
    }

    pub fn snapshot(&self, source: &str) -> Snapshot {
        self.current.borrow().snapshot(source)
    }

    /// Snapshot the last applied state and encode it on the caller's task.
    pub fn export(&self, source: &str, format: ExportFormat) -> Result<Artifact, SessionError> {
        let snapshot = self.snapshot(source);
        let bytes = self.encoder.encode(&snapshot, format)?;
        record_export(format.name());
        tracing::info!(format = format.name(), bytes = bytes.len(), "report exported");
        Ok(Artifact { format, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TransportError;
    use crate::registers::Register;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    // Replies with AX set to a counter that increases on every request.
    struct CountingEngine {
        next: AtomicU16,
    }

    impl EngineChannel for CountingEngine {
        async fn exchange(&self, _body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(r#"{{"success":true,"registers":{{"AX":{}}}}}"#, n).into_bytes())
        }
    }

    fn spawn_counting() -> SessionHandle {
        Session::spawn(
            CountingEngine { next: AtomicU16::new(0) },
            DisplayModel::new(),
            ExportEncoder::default(),
            8,
        )
    }

    #[tokio::test]
    async fn test_dispatch_returns_updated_view() {
        let handle = spawn_counting();
        let view = handle.dispatch(Command::Step).await.unwrap();
        assert_eq!(view.registers.get(Register::AX), "0x0001 (1)");
        assert_eq!(handle.view(), view);
    }

    #[tokio::test]
    async fn test_commands_apply_in_queue_order() {
        let handle = spawn_counting();
        let pending: Vec<_> = (0..5)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.dispatch(Command::Step).await })
            })
            .collect();
        for task in pending {
            task.await.unwrap().unwrap();
        }

        let view = handle.view();
        assert_eq!(view.registers.get(Register::AX), "0x0005 (5)");
    }

    #[tokio::test]
    async fn test_export_snapshot_carries_source() {
        let handle = spawn_counting();
        handle.dispatch(Command::Load("INC AX".into())).await.unwrap();

        let artifact = handle.export("INC AX", ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(value["code"], "INC AX");
        assert_eq!(value["registers"]["AX"], "0x0001 (1)");
    }

    #[tokio::test]
    async fn test_view_serializes_status() {
        let handle = spawn_counting();
        let json = serde_json::to_value(handle.view()).unwrap();
        assert_eq!(json["status"], "unknown");
        assert_eq!(json["currentInstruction"], "No instruction loaded");
    }

    // Signals once a request reaches it, then never answers.
    struct StalledEngine {
        entered: Arc<Notify>,
    }

    impl EngineChannel for StalledEngine {
        async fn exchange(&self, _body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            self.entered.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_command_in_flight() {
        let entered = Arc::new(Notify::new());
        let handle = Session::spawn(
            StalledEngine { entered: entered.clone() },
            DisplayModel::new(),
            ExportEncoder::default(),
            8,
        );

        let stuck = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.dispatch(Command::Step).await })
        };
        entered.notified().await;

        assert_eq!(handle.view(), ConsoleView::of(&DisplayModel::new()));
        assert_eq!(handle.snapshot("HLT").source, "HLT");
        let artifact = handle.export("HLT", ExportFormat::Json).unwrap();
        assert!(!artifact.bytes.is_empty());
        assert!(!stuck.is_finished());
        stuck.abort();
    }
}
