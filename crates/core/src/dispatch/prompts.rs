//! Dispatch policy and context building.

use crate::reasoning::ReasoningRequest;
use crate::squads::SquadRegistry;

/// Incident-commander policy: hazard suitability, availability rule, output shape
pub const COMMANDER_POLICY: &str = include_str!("defaults/commander.md");

/// Build the reasoning request for one cycle from the observation and
/// the registry as it stands right now
pub fn build_request(observation: &str, registry: &SquadRegistry) -> ReasoningRequest {
    ReasoningRequest {
        system: COMMANDER_POLICY.to_string(),
        user: format!(
            "Drone Observation: {}\n\nSquad Status:\n{}",
            observation.trim(),
            registry.status_summary()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squads::{default_roster, SquadRegistry};

    #[test]
    fn test_policy_covers_hazard_rules_and_output_shape() {
        for needle in ["FLOOD", "FIRE", "RUBBLE", "CLEAR", "CRITICAL", "\"action\"", "squad_name"] {
            assert!(COMMANDER_POLICY.contains(needle), "policy lacks {needle}");
        }
    }

    #[test]
    fn test_request_lists_every_squad() {
        let registry = SquadRegistry::from_roster(default_roster()).unwrap();
        let request = build_request("Visual Scan: FIRE. Coverage: 42%.", &registry);

        assert_eq!(request.system, COMMANDER_POLICY);
        assert!(request.user.starts_with("Drone Observation: Visual Scan: FIRE."));
        assert!(request.user.contains("Hotel: Busy (Firefighting)"));
        assert!(request.user.contains("Echo: Idle (Rescue)"));
        assert_eq!(request.user.lines().filter(|l| l.contains(": ")).count(), 9);
    }
}
