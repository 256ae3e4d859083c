//! Verity-Store: record persistence for VerityAI
//!
//! Every assessment and orchestration is persisted as one JSON document keyed
//! by its identifier. This crate owns that persistence and nothing else.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: whole-record replace semantics and faithful reporting of missing or
//! unreadable records.
//!
//! ## Key Components
//!
//! - `RecordStore`: save / load / exists by record ID
//! - `FsRecordStore`: one `<id>.json` file per record, written atomically
//! - `fakes::MemoryRecordStore`: in-memory store for tests

mod error;
pub mod fakes;
mod fs;
pub mod record_store;

pub use error::StoreError;
pub use fs::FsRecordStore;
pub use record_store::{load_record, save_record, validate_record_id, RecordStore, StoreResult};
