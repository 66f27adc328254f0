use serde::Serialize;

use crate::memory::{MemoryRow, ROW_COUNT};
use crate::model::DisplayModel;
use crate::registers::{FlagSet, RegisterSet};

/// Frozen copy of everything the console shows, plus the editor text.
///
/// Field order here is the field order of exported reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "code")]
    pub source: String,
    pub registers: RegisterSet,
    pub flags: FlagSet,
    #[serde(rename = "currentInstruction")]
    pub current_instruction: String,
    pub microinstructions: Vec<String>,
    pub memory: [MemoryRow; ROW_COUNT],
}

/// Build a snapshot by value. Nothing in the result borrows from `model`.
pub fn assemble(model: &DisplayModel, source: &str) -> Snapshot {
    let trace = model.trace();

    Snapshot {
        source: source.to_string(),
        registers: model.registers().clone(),
        flags: *model.flags(),
        current_instruction: trace.display().to_string(),
        microinstructions: trace.microinstructions.clone(),
        memory: model.memory_rows(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryImage;
    use crate::model::{EngineStateUpdate, NO_INSTRUCTION};
    use crate::registers::{Flag, Register};
    use std::collections::BTreeMap;

    #[test]
    fn test_assemble_default_model() {
        let snapshot = assemble(&DisplayModel::new(), "");
        assert_eq!(snapshot.source, "");
        assert_eq!(snapshot.current_instruction, NO_INSTRUCTION);
        assert!(snapshot.microinstructions.is_empty());
        assert_eq!(snapshot.memory.len(), 16);
        assert_eq!(snapshot.registers, RegisterSet::new());
    }

    #[test]
    fn test_snapshot_is_independent_of_later_updates() {
        let mut model = DisplayModel::new();
        let mut regs = BTreeMap::new();
        regs.insert(Register::AX, "0x0001 (1)".to_string());
        model.apply_update(&EngineStateUpdate {
            registers: Some(regs),
            current_instruction: Some(Some("MOV AX, 1".to_string())),
            memory: Some(MemoryImage::from_engine(vec![0x41])),
            ..Default::default()
        });

        let snapshot = model.snapshot("MOV AX, 1");
        let frozen = snapshot.clone();

        let mut regs = BTreeMap::new();
        regs.insert(Register::AX, "0x0002 (2)".to_string());
        let mut flags = BTreeMap::new();
        flags.insert(Flag::Carry, true);
        model.apply_update(&EngineStateUpdate {
            registers: Some(regs),
            flags: Some(flags),
            current_instruction: Some(Some("ADD AX, 1".to_string())),
            microinstructions: Some(vec!["ADD AX, 0x1".to_string()]),
            memory: Some(MemoryImage::from_engine(vec![0x42])),
            ..Default::default()
        });

        assert_eq!(snapshot, frozen);
        assert_eq!(snapshot.registers.get(Register::AX), "0x0001 (1)");
        assert!(!snapshot.flags.get(Flag::Carry));
        assert_eq!(snapshot.current_instruction, "MOV AX, 1");
        assert_eq!(snapshot.memory[0].ascii, "A.......");
    }

    #[test]
    fn test_snapshot_key_order() {
        let json = serde_json::to_string(&assemble(&DisplayModel::new(), "HLT")).unwrap();
        let positions: Vec<usize> = [
            "\"code\"",
            "\"registers\"",
            "\"flags\"",
            "\"currentInstruction\"",
            "\"microinstructions\"",
            "\"memory\"",
        ]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();

        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }
}
