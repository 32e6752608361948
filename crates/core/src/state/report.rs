//! Markdown mission report: system status, squad board, command history.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use super::mission_log::LogEntry;
use crate::dispatch::Severity;
use crate::squads::SquadRegistry;

pub struct MissionReport;

impl MissionReport {
    /// Render the report as of now. `history` is oldest first.
    pub fn render(
        observation: Option<&str>,
        severity: Option<Severity>,
        registry: &SquadRegistry,
        history: &[LogEntry],
    ) -> String {
        Self::render_at(Utc::now(), observation, severity, registry, history)
    }

    pub fn render_at(
        generated_at: DateTime<Utc>,
        observation: Option<&str>,
        severity: Option<Severity>,
        registry: &SquadRegistry,
        history: &[LogEntry],
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# AeroGuard Mission Report");
        let _ = writeln!(
            out,
            "\nGenerated: {}\n",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let _ = writeln!(out, "## 1. System Status\n");
        let _ = writeln!(
            out,
            "- Latest Observation: {}",
            observation.unwrap_or("No scan yet")
        );
        let _ = writeln!(
            out,
            "- Hazard Level: {}\n",
            severity.map(|s| s.to_string()).unwrap_or_else(|| "UNKNOWN".to_string())
        );

        let _ = writeln!(out, "## 2. Squad Deployment Status\n");
        for squad in registry.iter() {
            let _ = writeln!(
                out,
                "- {} ({}): {} @ {}",
                squad.name(),
                squad.unit_type(),
                squad.status(),
                squad.location()
            );
        }

        let _ = writeln!(out, "\n## 3. Command History\n");
        if history.is_empty() {
            let _ = writeln!(out, "_No commands issued._");
        }
        for entry in history {
            let _ = writeln!(out, "- {}", entry.display_line());
        }

        out
    }
}
