//! Fixed roster the registry is seeded from at session start.

use super::registry::{Squad, SquadStatus};
use anyhow::{Context, Result};
use std::path::Path;

/// The standard eight-squad roster
pub fn default_roster() -> Vec<Squad> {
    vec![
        Squad::new("Alpha", "Ground")
            .with_capacity(10)
            .with_equipment(["Rations", "Medical Kit"]),
        Squad::new("Bravo", "Aerial")
            .with_capacity(5)
            .with_equipment(["Surveillance Drone", "Radio"]),
        Squad::new("Charlie", "Medical")
            .stationed(SquadStatus::Busy, "Sector 9")
            .with_capacity(8)
            .with_equipment(["Stretcher", "First Aid"]),
        Squad::new("Delta", "Engineering")
            .with_capacity(6)
            .with_equipment(["Toolbox", "Generator"]),
        Squad::new("Echo", "Rescue")
            .with_capacity(12)
            .with_equipment(["Ropes", "Lifeboat"]),
        Squad::new("Foxtrot", "Logistics")
            .with_capacity(15)
            .with_equipment(["Supplies", "Fuel"]),
        Squad::new("Golf", "Recon")
            .with_capacity(4)
            .with_equipment(["Binoculars", "Map"]),
        Squad::new("Hotel", "Firefighting")
            .stationed(SquadStatus::Busy, "Sector 3")
            .with_capacity(10)
            .with_equipment(["Hose", "Extinguisher"]),
    ]
}

/// Load an operator-defined roster from a JSON array of squads
pub fn load_roster<P: AsRef<Path>>(path: P) -> Result<Vec<Squad>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster {}", path.display()))?;
    let roster: Vec<Squad> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid roster JSON in {}", path.display()))?;
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squads::SquadRegistry;
    use std::io::Write;

    #[test]
    fn test_default_roster_builds_registry() {
        let registry = SquadRegistry::from_roster(default_roster()).unwrap();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.count_by_status(SquadStatus::Busy), 2);
        assert_eq!(registry.get("Charlie").unwrap().location(), "Sector 9");
        assert!(registry.get("Echo").unwrap().is_home());
    }

    #[test]
    fn test_load_roster_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "Kilo", "status": "Idle", "type": "Aerial", "loc": "Base"}},
                {{"name": "Lima", "status": "Busy", "type": "Medical", "loc": "Sector 2",
                  "capacity": 6, "equipment": ["Stretcher"]}}
            ]"#
        )
        .unwrap();

        let roster = load_roster(file.path()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].capacity(), 0);
        assert_eq!(roster[1].equipment(), ["Stretcher".to_string()]);
    }

    #[test]
    fn test_load_roster_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_roster(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid roster JSON"));
    }
}
