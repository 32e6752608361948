//! # Squads
//!
//! The live table of dispatchable response units.
//!
//! The registry is created once from a roster and afterwards only mutated by
//! the dispatch agent through [`SquadRegistry::apply_deployment`].

pub mod registry;
pub mod roster;

pub use registry::{RegistryError, Squad, SquadRegistry, SquadStatus, HOME_LOCATION};
pub use roster::{default_roster, load_roster};
