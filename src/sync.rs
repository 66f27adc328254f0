use std::collections::BTreeMap;

use thiserror::Error;

use crate::engine::{Command, EngineChannel, EngineResponse, RegisterValue, TransportError};
use crate::memory::MemoryImage;
use crate::metrics::{record_command, Timer};
use crate::model::{DisplayModel, EngineStateUpdate, RunStatus};
use crate::registers::{format_word, Flag, Register};

const NO_ERROR_MESSAGE: &str = "engine reported failure without a message";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("engine rejected command: {0}")]
    EngineRejected(String),
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),
}

impl SyncError {
    pub fn outcome(&self) -> &'static str {
        match self {
            SyncError::EngineRejected(_) => "rejected",
            SyncError::TransportFailure(_) => "transport",
            SyncError::MalformedResponse(_) => "malformed",
        }
    }
}

/// Decode a raw engine reply into a typed update. Nothing is applied here.
pub fn decode_response(body: &[u8]) -> Result<EngineStateUpdate, SyncError> {
    let response: EngineResponse =
        serde_json::from_slice(body).map_err(|e| SyncError::MalformedResponse(e.to_string()))?;

    if !response.success {
        let message = response.error.unwrap_or_else(|| NO_ERROR_MESSAGE.to_string());
        return Err(SyncError::EngineRejected(message));
    }

    let registers = response.registers.map(|entries| {
        let mut merged = BTreeMap::new();
        for (name, value) in entries {
            let Some(register) = Register::from_name(&name) else {
                tracing::debug!(register = %name, "ignoring unknown register");
                continue;
            };
            let display = match value {
                RegisterValue::Text(text) => text,
                RegisterValue::Word(word) => format_word(word),
            };
            merged.insert(register, display);
        }
        merged
    });

    let flags = response.flags.map(|entries| {
        let mut merged = BTreeMap::new();
        for (name, value) in entries {
            match Flag::from_name(&name) {
                Some(flag) => {
                    merged.insert(flag, value);
                }
                None => tracing::debug!(flag = %name, "ignoring unknown flag"),
            }
        }
        merged
    });

    let status = match response.status.as_deref() {
        None => None,
        Some("running") => Some(RunStatus::Running),
        Some("halted") => Some(RunStatus::Halted),
        Some(other) => {
            return Err(SyncError::MalformedResponse(format!("unknown status {:?}", other)));
        }
    };

    Ok(EngineStateUpdate {
        registers,
        flags,
        current_instruction: response.current_instruction,
        microinstructions: response.microinstructions,
        memory: response.memory.map(MemoryImage::from_engine),
        status,
    })
}

/// Runs command round trips against the engine and folds the replies into
/// a [`DisplayModel`].
#[derive(Debug)]
pub struct CommandSynchronizer<C> {
    channel: C,
}

impl<C: EngineChannel> CommandSynchronizer<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Send one command and wait for its reply. On success the update has
    /// already been applied to `model`; on any failure `model` is untouched.
    pub async fn dispatch(
        &self,
        model: &mut DisplayModel,
        command: &Command,
    ) -> Result<EngineStateUpdate, SyncError> {
        let timer = Timer::new();
        let action = command.action();
        tracing::debug!(action, "dispatching command");

        let result = self.round_trip(command).await;
        record_command(action, result.as_ref().map_or_else(|e| e.outcome(), |_| "ok"), timer.elapsed());

        match result {
            Ok(update) => {
                model.apply_update(&update);
                tracing::info!(action, elapsed_ms = timer.elapsed().as_millis() as u64, "command applied");
                Ok(update)
            }
            Err(err) => {
                tracing::warn!(action, error = %err, "command failed");
                Err(err)
            }
        }
    }

    async fn round_trip(&self, command: &Command) -> Result<EngineStateUpdate, SyncError> {
        let body = serde_json::to_vec(&command.request())
            .map_err(|e| SyncError::TransportFailure(TransportError::Request(e.to_string())))?;
        let reply = self.channel.exchange(body).await?;
        decode_response(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedEngine {
        reply: Result<&'static str, u16>,
        seen: Mutex<Vec<String>>,
    }

    impl CannedEngine {
        fn replying(body: &'static str) -> Self {
            Self { reply: Ok(body), seen: Mutex::new(Vec::new()) }
        }

        fn failing(status: u16) -> Self {
            Self { reply: Err(status), seen: Mutex::new(Vec::new()) }
        }
    }

    impl EngineChannel for CannedEngine {
        async fn exchange(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            self.seen.lock().unwrap().push(String::from_utf8(body).unwrap());
            match self.reply {
                Ok(text) => Ok(text.as_bytes().to_vec()),
                Err(status) => Err(TransportError::Status(status)),
            }
        }
    }

    #[tokio::test]
    async fn test_successful_dispatch_applies_update() {
        let sync = CommandSynchronizer::new(CannedEngine::replying(
            r#"{"success":true,"registers":{"AX":"0x0005 (5)"},"flags":{"ZF":true},
                "current_instruction":"MOV AX, 5","microinstructions":["MOV AX, 0x5"],
                "memory":[72,101,108,108,111],"status":"running","ip":1}"#,
        ));
        let mut model = DisplayModel::new();

        let update = sync.dispatch(&mut model, &Command::Step).await.unwrap();

        assert!(!update.is_empty());
        assert_eq!(model.register(Register::AX), "0x0005 (5)");
        assert_eq!(model.register(Register::BX), "0x0000 (0)");
        assert!(model.flag(Flag::Zero));
        assert_eq!(model.trace().display(), "MOV AX, 5");
        assert_eq!(model.memory_rows()[0].ascii, "Hello...");
        assert_eq!(model.status(), RunStatus::Running);
        assert_eq!(
            sync.channel().seen.lock().unwrap().as_slice(),
            &[r#"{"action":"step","code":""}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_load_sends_program_text() {
        let sync = CommandSynchronizer::new(CannedEngine::replying(r#"{"success":true}"#));
        let mut model = DisplayModel::new();
        sync.dispatch(&mut model, &Command::Load("MOV AX, 1\nHLT".into())).await.unwrap();

        let seen = sync.channel().seen.lock().unwrap();
        assert_eq!(seen[0], r#"{"action":"load","code":"MOV AX, 1\nHLT"}"#);
    }

    #[tokio::test]
    async fn test_bare_failure_is_rejected_and_model_unchanged() {
        let sync = CommandSynchronizer::new(CannedEngine::replying(r#"{"success":false}"#));
        let mut model = DisplayModel::new();

        let err = sync.dispatch(&mut model, &Command::Run).await.unwrap_err();

        assert!(matches!(err, SyncError::EngineRejected(ref msg) if msg == NO_ERROR_MESSAGE));
        assert_eq!(model, DisplayModel::new());
    }

    #[tokio::test]
    async fn test_failure_with_state_applies_nothing() {
        let sync = CommandSynchronizer::new(CannedEngine::replying(
            r#"{"success":false,"error":"Unknown instruction: FOO","registers":{"AX":7}}"#,
        ));
        let mut model = DisplayModel::new();

        let err = sync.dispatch(&mut model, &Command::Step).await.unwrap_err();

        assert_eq!(err.to_string(), "engine rejected command: Unknown instruction: FOO");
        assert_eq!(model.register(Register::AX), "0x0000 (0)");
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let sync = CommandSynchronizer::new(CannedEngine::failing(503));
        let mut model = DisplayModel::new();

        let err = sync.dispatch(&mut model, &Command::Reset).await.unwrap_err();

        assert!(matches!(err, SyncError::TransportFailure(TransportError::Status(503))));
        assert_eq!(err.outcome(), "transport");
        assert_eq!(model, DisplayModel::new());
    }

    #[tokio::test]
    async fn test_malformed_replies() {
        for body in [
            "not json",
            r#"{"registers":{}}"#,
            r#"{"success":true,"memory":[300]}"#,
            r#"{"success":true,"flags":{"ZF":"yes"}}"#,
            r#"{"success":true,"status":"paused"}"#,
        ] {
            let sync = CommandSynchronizer::new(CannedEngine::replying(body));
            let mut model = DisplayModel::new();
            let err = sync.dispatch(&mut model, &Command::Step).await.unwrap_err();
            assert!(matches!(err, SyncError::MalformedResponse(_)), "{}", body);
            assert_eq!(model, DisplayModel::new());
        }
    }

    #[test]
    fn test_decode_formats_raw_words_and_skips_unknown_names() {
        let update = decode_response(
            br#"{"success":true,"registers":{"SP":65534,"EAX":1},"flags":{"XF":true,"CF":true}}"#,
        )
        .unwrap();

        let regs = update.registers.unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[&Register::SP], "0xFFFE (65534)");

        let flags = update.flags.unwrap();
        assert_eq!(flags.len(), 1);
        assert!(flags[&Flag::Carry]);
    }

    #[test]
    fn test_decode_truncates_long_memory() {
        let memory: Vec<String> = (0..300).map(|i| (i % 256).to_string()).collect();
        let body = format!(r#"{{"success":true,"memory":[{}]}}"#, memory.join(","));
        let update = decode_response(body.as_bytes()).unwrap();
        assert_eq!(update.memory.unwrap().len(), 256);
    }
}
