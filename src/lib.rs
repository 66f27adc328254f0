//! # 8086 Simulator Console
//!
//! Presentation layer for an instruction-level 8086 simulator. The console
//! drives an external execution engine with `load`, `reset`, `step` and
//! `run` commands, keeps the last state the engine reported, and renders it
//! as register and flag panels, an instruction trace and a hex/ASCII memory
//! grid. The same state can be frozen into a snapshot and exported as a JSON
//! or PDF report.
//!
//! ## Features
//!
//! - Typed partial updates: fields missing from an engine reply keep their
//!   previous value
//! - All-or-nothing command application with distinct transport, rejection
//!   and malformed-reply errors
//! - Deterministic 16-row memory projection of the first 256 bytes
//! - Byte-for-byte reproducible JSON and PDF reports
//! - A single-owner session task fed by a dispatch queue
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use sim8086_console::memory::{project, MemoryImage};
//! use sim8086_console::model::{DisplayModel, EngineStateUpdate};
//! use sim8086_console::registers::Register;
//!
//! let mut model = DisplayModel::new();
//! let mut registers = BTreeMap::new();
//! registers.insert(Register::AX, "0x0005 (5)".to_string());
//!
//! model.apply_update(&EngineStateUpdate {
//!     registers: Some(registers),
//!     memory: Some(MemoryImage::from_engine(b"Hello".to_vec())),
//!     ..Default::default()
//! });
//!
//! assert_eq!(model.register(Register::AX), "0x0005 (5)");
//! assert_eq!(model.register(Register::BX), "0x0000 (0)");
//!
//! let rows = project(model.memory());
//! assert_eq!(rows[0].address_label(), "0x0000");
//! assert_eq!(rows[0].ascii, "Hello...");
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod export;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod registers;
pub mod server;
pub mod session;
pub mod snapshots;
pub mod sync;

pub use model::DisplayModel;
pub use session::{Session, SessionHandle};
pub use snapshots::Snapshot;
pub use sync::{CommandSynchronizer, SyncError};
