//! # Squad Registry
//!
//! In-memory table of squads keyed by name. Presentation layers read it;
//! the dispatch agent is the only writer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The distinguished home location every idle squad starts from
pub const HOME_LOCATION: &str = "Base";

/// Operational status of a squad
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SquadStatus {
    Idle,
    Busy,
    Deployed,
}

impl fmt::Display for SquadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquadStatus::Idle => write!(f, "Idle"),
            SquadStatus::Busy => write!(f, "Busy"),
            SquadStatus::Deployed => write!(f, "Deployed"),
        }
    }
}

/// A dispatchable response unit
///
/// The name is fixed at construction. Status and location can only change
/// together, through [`SquadRegistry::apply_deployment`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Squad {
    name: String,
    status: SquadStatus,
    /// Capability tag ("Ground", "Aerial", "Medical", ...)
    #[serde(rename = "type")]
    unit_type: String,
    #[serde(rename = "loc")]
    location: String,
    #[serde(default)]
    capacity: u32,
    #[serde(default)]
    equipment: Vec<String>,
}

impl Squad {
    /// Create an idle squad waiting at [`HOME_LOCATION`]
    pub fn new(name: impl Into<String>, unit_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: SquadStatus::Idle,
            unit_type: unit_type.into(),
            location: HOME_LOCATION.to_string(),
            capacity: 0,
            equipment: Vec::new(),
        }
    }

    /// Roster-time override of status and location (e.g. already busy elsewhere)
    pub fn stationed(mut self, status: SquadStatus, location: impl Into<String>) -> Self {
        self.status = status;
        self.location = location.into();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_equipment<I, S>(mut self, equipment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment = equipment.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SquadStatus {
        self.status
    }

    pub fn unit_type(&self) -> &str {
        &self.unit_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn equipment(&self) -> &[String] {
        &self.equipment
    }

    /// Whether the squad is idle at its home location
    pub fn is_home(&self) -> bool {
        self.status == SquadStatus::Idle && self.location == HOME_LOCATION
    }

    /// `name: status (type)`, the line format used in reasoning context
    pub fn summary_line(&self) -> String {
        format!("{}: {} ({})", self.name, self.status, self.unit_type)
    }
}

/// Registry failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown squad '{0}'")]
    UnknownSquad(String),
    #[error("duplicate squad '{0}' in roster")]
    DuplicateSquad(String),
}

/// Mapping from squad name to squad
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SquadRegistry {
    squads: BTreeMap<String, Squad>,
}

impl SquadRegistry {
    /// Build the registry once from a roster. Names must be unique.
    pub fn from_roster(roster: Vec<Squad>) -> Result<Self, RegistryError> {
        let mut squads = BTreeMap::new();
        for squad in roster {
            if squads.contains_key(&squad.name) {
                return Err(RegistryError::DuplicateSquad(squad.name));
            }
            squads.insert(squad.name.clone(), squad);
        }
        Ok(Self { squads })
    }

    /// Look up a squad by exact name
    pub fn get(&self, name: &str) -> Result<&Squad, RegistryError> {
        self.squads
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSquad(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.squads.contains_key(name)
    }

    /// Mark a squad deployed at `location`.
    ///
    /// Status and location are written together or not at all. This is the
    /// only mutation path the registry offers.
    pub fn apply_deployment(&mut self, name: &str, location: &str) -> Result<&Squad, RegistryError> {
        let squad = self
            .squads
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownSquad(name.to_string()))?;
        squad.status = SquadStatus::Deployed;
        squad.location = location.to_string();
        tracing::info!(squad = %name, location = %location, "Squad deployed");
        Ok(squad)
    }

    /// Squads in name order
    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.values()
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    /// One `name: status (type)` line per squad, sorted by name
    pub fn status_summary(&self) -> String {
        self.iter()
            .map(Squad::summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Owned copy of every squad, for presentation and reporting
    pub fn snapshot(&self) -> Vec<Squad> {
        self.iter().cloned().collect()
    }

    /// Number of squads currently in each status
    pub fn count_by_status(&self, status: SquadStatus) -> usize {
        self.iter().filter(|s| s.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> SquadRegistry {
        SquadRegistry::from_roster(vec![
            Squad::new("Echo", "Rescue").with_capacity(12),
            Squad::new("Hotel", "Firefighting").stationed(SquadStatus::Busy, "Sector 3"),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_unknown_squad() {
        let registry = test_registry();
        assert_eq!(
            registry.get("Zulu"),
            Err(RegistryError::UnknownSquad("Zulu".to_string()))
        );
        assert_eq!(registry.get("Echo").unwrap().capacity(), 12);
    }

    #[test]
    fn test_apply_deployment_updates_status_and_location() {
        let mut registry = test_registry();
        let squad = registry.apply_deployment("Echo", "Sector 4").unwrap();
        assert_eq!(squad.status(), SquadStatus::Deployed);
        assert_eq!(squad.location(), "Sector 4");

        // Untouched squad keeps its roster state
        let hotel = registry.get("Hotel").unwrap();
        assert_eq!(hotel.status(), SquadStatus::Busy);
        assert_eq!(hotel.location(), "Sector 3");
    }

    #[test]
    fn test_apply_deployment_unknown_leaves_registry_unchanged() {
        let mut registry = test_registry();
        let before = registry.clone();
        let result = registry.apply_deployment("Zulu", "X");
        assert!(matches!(result, Err(RegistryError::UnknownSquad(_))));
        assert_eq!(registry, before);
    }

    #[test]
    fn test_duplicate_roster_rejected() {
        let result = SquadRegistry::from_roster(vec![
            Squad::new("Alpha", "Ground"),
            Squad::new("Alpha", "Aerial"),
        ]);
        assert_eq!(result, Err(RegistryError::DuplicateSquad("Alpha".to_string())));
    }

    #[test]
    fn test_status_summary_is_sorted() {
        let registry = test_registry();
        assert_eq!(
            registry.status_summary(),
            "Echo: Idle (Rescue)\nHotel: Busy (Firefighting)"
        );
    }

    #[test]
    fn test_squad_serialization_uses_roster_keys() {
        let squad = Squad::new("Golf", "Recon").with_equipment(["Binoculars", "Map"]);
        let json = serde_json::to_value(&squad).unwrap();
        assert_eq!(json["type"], "Recon");
        assert_eq!(json["loc"], "Base");
        assert_eq!(json["status"], "Idle");
        assert!(squad.is_home());
    }
}
