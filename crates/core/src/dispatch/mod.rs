//! # Dispatch
//!
//! One hazard observation in, at most one squad deployment out.
//!
//! ## Flow
//!
//! ```text
//! observation ──▶ prompts::build_request ──▶ ReasoningClient::stream
//!                                                   │
//!                       thinking / answer events ◀──┤
//!                                                   ▼
//!                                      parser::parse_decision
//!                                                   │
//!                                                   ▼
//!                           SquadRegistry::apply_deployment ──▶ status event
//! ```

pub mod agent;
pub mod events;
pub mod observation;
pub mod parser;
pub mod prompts;

pub use agent::{CycleOutcome, CyclePhase, DispatchAgent, DispatchReport};
pub use events::{DispatchEvent, DispatchEventKind};
pub use observation::{describe, HazardStats, Severity};
pub use parser::{parse_decision, try_parse_decision, Decision, DecisionAction, ParseFailure};
pub use prompts::{build_request, COMMANDER_POLICY};
