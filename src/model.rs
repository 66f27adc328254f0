//! Last-known simulator state as reported by the execution engine.
//!
//! The model starts from fixed defaults and only changes through
//! [`DisplayModel::apply_update`]. Updates are partial: any field left as
//! `None` keeps whatever the model already shows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::memory::{project, MemoryImage, MemoryRow, ROW_COUNT};
use crate::registers::{Flag, FlagSet, Register, RegisterSet};
use crate::snapshots::{assemble, Snapshot};

pub const NO_INSTRUCTION: &str = "No instruction loaded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Unknown,
    Running,
    Halted,
}

/// Decoded instruction plus its micro-operation breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionTrace {
    pub instruction: Option<String>,
    pub microinstructions: Vec<String>,
}

impl InstructionTrace {
    pub fn display(&self) -> &str {
        self.instruction.as_deref().unwrap_or(NO_INSTRUCTION)
    }
}

/// Typed partial view of an engine reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineStateUpdate {
    pub registers: Option<BTreeMap<Register, String>>,
    pub flags: Option<BTreeMap<Flag, bool>>,
    /// `Some(None)` clears the instruction back to the sentinel.
    pub current_instruction: Option<Option<String>>,
    pub microinstructions: Option<Vec<String>>,
    pub memory: Option<MemoryImage>,
    pub status: Option<RunStatus>,
}

impl EngineStateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == EngineStateUpdate::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayModel {
    registers: RegisterSet,
    flags: FlagSet,
    trace: InstructionTrace,
    memory: MemoryImage,
    status: RunStatus,
}

impl DisplayModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update field by field. The result does not depend on the
    /// order entries appear in the update.
    pub fn apply_update(&mut self, update: &EngineStateUpdate) {
        if let Some(registers) = &update.registers {
            for (&register, display) in registers {
                self.registers.set(register, display.clone());
            }
        }

        if let Some(flags) = &update.flags {
            for (&flag, &value) in flags {
                self.flags.set(flag, value);
            }
        }

        if let Some(instruction) = &update.current_instruction {
            self.trace.instruction = instruction.clone();
        }

        if let Some(micro) = &update.microinstructions {
            self.trace.microinstructions = micro.clone();
        }

        if let Some(memory) = &update.memory {
            self.memory = memory.clone();
        }

        if let Some(status) = update.status {
            self.status = status;
        }
    }

    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    pub fn register(&self, register: Register) -> &str {
        self.registers.get(register)
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.get(flag)
    }

    pub fn trace(&self) -> &InstructionTrace {
        &self.trace
    }

    pub fn memory(&self) -> &MemoryImage {
        &self.memory
    }

    pub fn memory_rows(&self) -> [MemoryRow; ROW_COUNT] {
        project(&self.memory)
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Independent copy of the current state together with the editor text.
    pub fn snapshot(&self, source: &str) -> Snapshot {
        assemble(self, source)
    }
}
