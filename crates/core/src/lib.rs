//! # AeroGuard Core
//!
//! The incident commander: turns drone hazard observations into squad
//! deployments by asking a streaming reasoning model for a decision.
//!
//! ## Architecture
//!
//! - `squads/` - Squad registry and default roster
//! - `reasoning/` - Streaming client for the reasoning service
//! - `dispatch/` - Decision parser, progress events and the dispatch agent
//! - `models` - Service configuration (reasoning model, vision server)
//! - `tools/` - Vision server client
//! - `state/` - Mission log and report persistence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aeroguard_core::dispatch::DispatchAgent;
//! use aeroguard_core::models::ReasoningConfig;
//! use aeroguard_core::reasoning::ChatCompletionsClient;
//! use aeroguard_core::squads::{default_roster, SquadRegistry};
//!
//! let client = ChatCompletionsClient::new(ReasoningConfig::from_env())?;
//! let mut registry = SquadRegistry::from_roster(default_roster())?;
//! let agent = DispatchAgent::new(Arc::new(client));
//! let report = agent.run("Visual Scan: FLOOD. Coverage: 45%.", &mut registry).await;
//! ```

pub mod dispatch;
pub mod models;
pub mod reasoning;
pub mod squads;
pub mod state;
pub mod tools;
