//! # Mission State
//!
//! Persistence for everything that outlives one dispatch cycle.
//!
//! - `db` - SQLite handle with schema migrations (`.aeroguard/aeroguard.db`)
//! - `mission_log` - command history, one entry per cycle
//! - `report` - markdown mission report

pub mod db;
pub mod mission_log;
pub mod report;

pub use db::AeroDb;
pub use mission_log::{LogEntry, LogKind, MissionLog};
pub use report::MissionReport;
