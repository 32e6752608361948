//! # Dispatch Agent
//!
//! Runs one dispatch cycle: observation in, at most one registry mutation out,
//! with every intermediate step reported as a [`DispatchEvent`].
//!
//! ```text
//! Idle ──▶ Streaming ──▶ Parsing ──▶ Applying ──▶ Terminal(status)
//!              │             │            │
//!              ▼             ▼            ▼
//!       Terminal(error) Terminal(warning) Terminal(warning)
//! ```
//!
//! No failure escapes a cycle. Every run ends with exactly one terminal event
//! (status, warning or error) and the registry is only touched on the
//! status path of a deploy decision.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use super::events::{DispatchEvent, DispatchEventKind};
use super::parser::{excerpt, try_parse_decision, Decision, DecisionAction};
use super::prompts::build_request;
use crate::reasoning::{Fragment, ReasoningClient, ReasoningError, ReasoningRequest};
use crate::squads::{RegistryError, SquadRegistry};

/// Characters of raw model output quoted in parse warnings
const RAW_EXCERPT_CHARS: usize = 200;

/// Phase of a dispatch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Streaming,
    Parsing,
    Applying,
    Terminal,
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A squad was deployed
    Deployed { squad: String, location: String },
    /// The commander chose to hold
    Held,
    /// The decision was unusable; registry untouched
    Rejected { reason: String },
    /// The reasoning service failed; registry untouched
    Failed { cause: String },
}

impl CycleOutcome {
    /// Kind of the terminal event this outcome produces
    pub fn terminal_kind(&self) -> DispatchEventKind {
        match self {
            Self::Deployed { .. } | Self::Held => DispatchEventKind::Status,
            Self::Rejected { .. } => DispatchEventKind::Warning,
            Self::Failed { .. } => DispatchEventKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deployed { .. } | Self::Held)
    }
}

/// Result of running one dispatch cycle
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub observation: String,
    /// Every event emitted, in emission order
    pub events: Vec<DispatchEvent>,
    pub outcome: CycleOutcome,
    /// The parsed decision, when parsing succeeded
    pub decision: Option<Decision>,
    /// Accumulated thinking channel
    pub thinking: String,
    /// Accumulated answer channel (the text handed to the parser)
    pub answer: String,
}

impl DispatchReport {
    /// The last event of the cycle
    pub fn terminal_event(&self) -> Option<&DispatchEvent> {
        self.events.last().filter(|e| e.is_terminal())
    }
}

/// The squad-dispatch agent
pub struct DispatchAgent {
    client: Arc<dyn ReasoningClient>,
    event_tx: Option<mpsc::Sender<DispatchEvent>>,
}

impl DispatchAgent {
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self {
            client,
            event_tx: None,
        }
    }

    /// Set event channel for streaming events live
    pub fn with_event_channel(mut self, tx: mpsc::Sender<DispatchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run one cycle against `registry`.
    ///
    /// The registry is borrowed mutably for the whole cycle, so the context
    /// the model sees and the state the decision is applied to are the same.
    #[tracing::instrument(skip(self, registry), fields(observation_preview = %observation.chars().take(50).collect::<String>()))]
    pub async fn run(&self, observation: &str, registry: &mut SquadRegistry) -> DispatchReport {
        let request = build_request(observation, registry);
        match self.decide(observation, &request).await {
            Ok((decision, cycle)) => {
                let resolution = resolve(&decision, registry);
                conclude(decision, resolution, cycle).await
            }
            Err(report) => report,
        }
    }

    /// Run one cycle against a registry shared with readers.
    ///
    /// A read lock is taken to build the context and a write lock only to
    /// apply the decision; neither is held while the model streams. Callers
    /// must serialize cycles themselves so nothing mutates the registry
    /// between the two.
    #[tracing::instrument(skip(self, registry), fields(observation_preview = %observation.chars().take(50).collect::<String>()))]
    pub async fn run_shared(
        &self,
        observation: &str,
        registry: &RwLock<SquadRegistry>,
    ) -> DispatchReport {
        let request = build_request(observation, &*registry.read().await);
        match self.decide(observation, &request).await {
            Ok((decision, cycle)) => {
                let resolution = resolve(&decision, &mut *registry.write().await);
                conclude(decision, resolution, cycle).await
            }
            Err(report) => report,
        }
    }

    /// Stream and parse. Returns the decision to apply, or the finished
    /// report when the cycle already ended.
    async fn decide(
        &self,
        observation: &str,
        request: &ReasoningRequest,
    ) -> Result<(Decision, Cycle), DispatchReport> {
        let mut cycle = Cycle::new(observation, self.event_tx.clone());

        cycle.enter(CyclePhase::Streaming);
        if let Err(e) = self.stream_fragments(request, &mut cycle).await {
            tracing::warn!(error = %e, "Reasoning stream failed");
            return Err(cycle.fail(e).await);
        }

        cycle.enter(CyclePhase::Parsing);
        match try_parse_decision(&cycle.answer) {
            Ok(decision) => {
                cycle.enter(CyclePhase::Applying);
                Ok((decision, cycle))
            }
            Err(failure) => {
                let reason = format!(
                    "No usable decision ({failure}). Raw response: {}",
                    excerpt(&cycle.answer, RAW_EXCERPT_CHARS)
                );
                Err(cycle.reject(reason).await)
            }
        }
    }

    /// Forward fragments live while buffering both channels
    async fn stream_fragments(
        &self,
        request: &ReasoningRequest,
        cycle: &mut Cycle,
    ) -> Result<(), ReasoningError> {
        let mut fragments = self.client.stream(request).await?;

        while let Some(item) = fragments.next().await {
            match item? {
                Fragment::Thinking(text) => {
                    cycle.thinking.push_str(&text);
                    cycle.emit(DispatchEvent::thinking(text)).await;
                }
                Fragment::Answer(text) => {
                    cycle.answer.push_str(&text);
                    cycle.emit(DispatchEvent::answer(text)).await;
                }
            }
        }

        Ok(())
    }
}

/// What applying a decision did to the registry
enum Resolution {
    Deployed { squad: String, location: String },
    Held,
    Rejected(String),
}

/// Apply `decision` to the registry. Synchronous so a shared registry is
/// write-locked only for the mutation itself.
fn resolve(decision: &Decision, registry: &mut SquadRegistry) -> Resolution {
    match &decision.action {
        DecisionAction::Deploy => {
            let (Some(squad), Some(location)) = (&decision.squad_name, &decision.location) else {
                return Resolution::Rejected(
                    "Deploy decision without squad or location; no deployment made.".to_string(),
                );
            };

            match registry.apply_deployment(squad, location) {
                Ok(_) => Resolution::Deployed {
                    squad: squad.clone(),
                    location: location.clone(),
                },
                Err(RegistryError::UnknownSquad(name)) => Resolution::Rejected(format!(
                    "Decision names unknown squad '{name}'; no deployment made."
                )),
                Err(e) => Resolution::Rejected(e.to_string()),
            }
        }
        DecisionAction::Hold => Resolution::Held,
        DecisionAction::Other(value) => {
            Resolution::Rejected(format!("Unrecognized action '{value}'; no changes made."))
        }
    }
}

async fn conclude(decision: Decision, resolution: Resolution, mut cycle: Cycle) -> DispatchReport {
    let reasoning = decision.reasoning.clone();
    cycle.decision = Some(decision);

    match resolution {
        Resolution::Deployed { squad, location } => {
            cycle
                .emit(DispatchEvent::Reasoning {
                    content: reasoning,
                    squad: Some(squad.clone()),
                    location: Some(location.clone()),
                    action: DecisionAction::Deploy.to_string(),
                })
                .await;
            let status = DispatchEvent::status(format!("Squad {squad} deployed to {location}."));
            cycle
                .finish(CycleOutcome::Deployed { squad, location }, status)
                .await
        }
        Resolution::Held => {
            cycle
                .emit(DispatchEvent::Reasoning {
                    content: reasoning,
                    squad: None,
                    location: None,
                    action: DecisionAction::Hold.to_string(),
                })
                .await;
            cycle
                .finish(
                    CycleOutcome::Held,
                    DispatchEvent::status("Holding position: all squads remain on station."),
                )
                .await
        }
        Resolution::Rejected(reason) => cycle.reject(reason).await,
    }
}

/// Bookkeeping for one cycle in flight
struct Cycle {
    observation: String,
    phase: CyclePhase,
    events: Vec<DispatchEvent>,
    event_tx: Option<mpsc::Sender<DispatchEvent>>,
    decision: Option<Decision>,
    thinking: String,
    answer: String,
}

impl Cycle {
    fn new(observation: &str, event_tx: Option<mpsc::Sender<DispatchEvent>>) -> Self {
        Self {
            observation: observation.to_string(),
            phase: CyclePhase::Idle,
            events: Vec::new(),
            event_tx,
            decision: None,
            thinking: String::new(),
            answer: String::new(),
        }
    }

    fn enter(&mut self, phase: CyclePhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Dispatch phase");
        self.phase = phase;
    }

    /// Record an event and forward it to the live channel, if any
    async fn emit(&mut self, event: DispatchEvent) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    async fn fail(self, err: ReasoningError) -> DispatchReport {
        let cause = err.to_string();
        self.finish(
            CycleOutcome::Failed {
                cause: cause.clone(),
            },
            DispatchEvent::error(cause),
        )
        .await
    }

    async fn reject(self, reason: impl Into<String>) -> DispatchReport {
        let reason = reason.into();
        tracing::warn!(phase = ?self.phase, %reason, "Dispatch cycle rejected");
        self.finish(
            CycleOutcome::Rejected {
                reason: reason.clone(),
            },
            DispatchEvent::warning(reason),
        )
        .await
    }

    async fn finish(mut self, outcome: CycleOutcome, terminal: DispatchEvent) -> DispatchReport {
        self.emit(terminal).await;
        self.enter(CyclePhase::Terminal);
        tracing::info!(?outcome, "Dispatch cycle complete");

        DispatchReport {
            observation: self.observation,
            events: self.events,
            outcome,
            decision: self.decision,
            thinking: self.thinking,
            answer: self.answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ScriptedClient;
    use crate::squads::{default_roster, Squad, SquadStatus};

    const OBSERVATION: &str =
        "Visual Scan: FLOOD. Coverage: 45%. Severity: CRITICAL. Active Masks: 6.";

    fn registry() -> SquadRegistry {
        SquadRegistry::from_roster(default_roster()).unwrap()
    }

    async fn run_with(client: ScriptedClient, registry: &mut SquadRegistry) -> DispatchReport {
        DispatchAgent::new(Arc::new(client))
            .run(OBSERVATION, registry)
            .await
    }

    fn changed_squads(before: &SquadRegistry, after: &SquadRegistry) -> Vec<String> {
        before
            .iter()
            .zip(after.iter())
            .filter(|(a, b)| a != b)
            .map(|(a, _)| a.name().to_string())
            .collect()
    }

    fn assert_terminal_last(report: &DispatchReport) {
        let terminal_count = report.events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal_count, 1, "events: {:?}", report.events);
        assert!(report.events.last().unwrap().is_terminal());
        assert_eq!(
            report.terminal_event().unwrap().kind(),
            report.outcome.terminal_kind()
        );
    }

    #[tokio::test]
    async fn test_deploy_echo_to_sector_4() {
        let mut registry = registry();
        let before = registry.clone();
        let client = ScriptedClient::answering(
            r#"{"action":"deploy","squad_name":"Echo","location":"Sector 4","reasoning":"flood"}"#,
        );

        let report = run_with(client, &mut registry).await;

        let echo = registry.get("Echo").unwrap();
        assert_eq!(echo.status(), SquadStatus::Deployed);
        assert_eq!(echo.location(), "Sector 4");
        assert_eq!(changed_squads(&before, &registry), vec!["Echo".to_string()]);

        assert_eq!(
            report.outcome,
            CycleOutcome::Deployed {
                squad: "Echo".to_string(),
                location: "Sector 4".to_string()
            }
        );
        let reasoning = report
            .events
            .iter()
            .find(|e| e.kind() == DispatchEventKind::Reasoning)
            .unwrap();
        assert_eq!(
            reasoning,
            &DispatchEvent::Reasoning {
                content: "flood".to_string(),
                squad: Some("Echo".to_string()),
                location: Some("Sector 4".to_string()),
                action: "deploy".to_string(),
            }
        );
        assert_eq!(report.terminal_event().unwrap().kind(), DispatchEventKind::Status);
        assert_terminal_last(&report);
    }

    #[tokio::test]
    async fn test_no_braces_ends_in_warning() {
        let mut registry = registry();
        let before = registry.clone();

        let report = run_with(ScriptedClient::answering("I cannot decide"), &mut registry).await;

        assert_eq!(registry, before);
        assert!(report.decision.is_none());
        let terminal = report.terminal_event().unwrap();
        assert_eq!(terminal.kind(), DispatchEventKind::Warning);
        assert!(terminal.content().contains("I cannot decide"));
        assert_terminal_last(&report);
    }

    #[tokio::test]
    async fn test_unknown_squad_ends_in_warning() {
        let mut registry = registry();
        let before = registry.clone();
        let client = ScriptedClient::answering(
            r#"{"action":"deploy","squad_name":"Zulu","location":"X","reasoning":"r"}"#,
        );

        let report = run_with(client, &mut registry).await;

        assert_eq!(registry, before);
        let terminal = report.terminal_event().unwrap();
        assert_eq!(terminal.kind(), DispatchEventKind::Warning);
        assert!(terminal.content().contains("Zulu"));
        assert!(!report
            .events
            .iter()
            .any(|e| e.kind() == DispatchEventKind::Reasoning));
        assert_terminal_last(&report);
    }

    #[tokio::test]
    async fn test_connection_failure_emits_single_error() {
        let mut registry = registry();
        let before = registry.clone();

        let report = run_with(ScriptedClient::unreachable("connection refused"), &mut registry).await;

        assert_eq!(registry, before);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].kind(), DispatchEventKind::Error);
        assert!(report.events[0].content().contains("connection refused"));
        assert!(matches!(report.outcome, CycleOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_mixed_case_hold() {
        let mut registry = registry();
        let before = registry.clone();

        let report = run_with(
            ScriptedClient::answering(r#"{"action":"HOLD","reasoning":"clear"}"#),
            &mut registry,
        )
        .await;

        assert_eq!(registry, before);
        assert_eq!(report.outcome, CycleOutcome::Held);
        assert_eq!(report.decision.as_ref().unwrap().action, DecisionAction::Hold);
        assert!(report.events.contains(&DispatchEvent::Reasoning {
            content: "clear".to_string(),
            squad: None,
            location: None,
            action: "hold".to_string(),
        }));
        assert_eq!(report.terminal_event().unwrap().kind(), DispatchEventKind::Status);
        assert_terminal_last(&report);
    }

    #[tokio::test]
    async fn test_unrecognized_action_is_warning() {
        let mut registry = registry();
        let before = registry.clone();

        let report = run_with(
            ScriptedClient::answering(r#"{"action":"evacuate","reasoning":"r"}"#),
            &mut registry,
        )
        .await;

        assert_eq!(registry, before);
        let terminal = report.terminal_event().unwrap();
        assert_eq!(terminal.kind(), DispatchEventKind::Warning);
        assert!(terminal.content().contains("evacuate"));
        assert!(report.decision.is_some());
    }

    #[tokio::test]
    async fn test_incomplete_deploy_is_warning() {
        let mut registry = registry();
        let before = registry.clone();

        let report = run_with(
            ScriptedClient::answering(r#"{"action":"deploy","squad_name":"Echo","reasoning":"r"}"#),
            &mut registry,
        )
        .await;

        assert_eq!(registry, before);
        assert!(matches!(report.outcome, CycleOutcome::Rejected { .. }));
        assert!(report.terminal_event().unwrap().content().contains("location"));
    }

    #[tokio::test]
    async fn test_stream_error_short_circuits_without_parsing() {
        let mut registry = registry();
        let before = registry.clone();
        let client = ScriptedClient::with_items(vec![
            Ok(Fragment::Thinking("Flood spreading".to_string())),
            Ok(Fragment::Answer(
                r#"{"action":"deploy","squad_name":"Echo","location":"Sector 4","reasoning":"r"}"#
                    .to_string(),
            )),
            Err(ReasoningError::timeout(std::time::Duration::from_secs(30))),
            Ok(Fragment::Answer("ignored".to_string())),
        ]);

        let report = run_with(client, &mut registry).await;

        assert_eq!(registry, before);
        let kinds: Vec<_> = report.events.iter().map(DispatchEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                DispatchEventKind::Thinking,
                DispatchEventKind::Answer,
                DispatchEventKind::Error
            ]
        );
        assert!(report.decision.is_none());
        assert!(!report.answer.contains("ignored"));
    }

    #[tokio::test]
    async fn test_fragments_forwarded_in_order_and_buffered() {
        let mut registry = registry();
        let client = ScriptedClient::with_fragments(vec![
            Fragment::Thinking("Flood at ".to_string()),
            Fragment::Answer("Sure: {\"action\":".to_string()),
            Fragment::Thinking("Sector 4.".to_string()),
            Fragment::Answer("\"hold\",\"reasoning\":\"wait\"}".to_string()),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let agent = DispatchAgent::new(Arc::new(client)).with_event_channel(tx);

        let report = agent.run(OBSERVATION, &mut registry).await;
        drop(agent);

        let mut live = Vec::new();
        while let Some(event) = rx.recv().await {
            live.push(event);
        }

        assert_eq!(live, report.events);
        assert_eq!(live[0], DispatchEvent::thinking("Flood at "));
        assert_eq!(live[1], DispatchEvent::answer("Sure: {\"action\":"));
        assert_eq!(live[2], DispatchEvent::thinking("Sector 4."));
        assert_eq!(report.thinking, "Flood at Sector 4.");
        assert_eq!(report.answer, "Sure: {\"action\":\"hold\",\"reasoning\":\"wait\"}");
        assert_eq!(report.outcome, CycleOutcome::Held);
        assert_terminal_last(&report);
    }

    #[tokio::test]
    async fn test_context_reflects_current_registry() {
        let mut registry = SquadRegistry::from_roster(vec![
            Squad::new("Echo", "Rescue"),
            Squad::new("Bravo", "Aerial").stationed(SquadStatus::Busy, "Ridge"),
        ])
        .unwrap();
        let client = Arc::new(ScriptedClient::answering(r#"{"action":"hold","reasoning":"x"}"#));
        let agent = DispatchAgent::new(client.clone());

        agent.run(OBSERVATION, &mut registry).await;

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user.contains(OBSERVATION));
        assert!(requests[0].user.contains("Bravo: Busy (Aerial)\nEcho: Idle (Rescue)"));
    }

    #[tokio::test]
    async fn test_redeploying_a_busy_squad_is_applied() {
        let mut registry = registry();
        let client = ScriptedClient::answering(
            r#"{"action":"deploy","squad_name":"Hotel","location":"Sector 7","reasoning":"critical fire"}"#,
        );

        let report = run_with(client, &mut registry).await;

        assert!(report.outcome.is_success());
        let hotel = registry.get("Hotel").unwrap();
        assert_eq!(hotel.status(), SquadStatus::Deployed);
        assert_eq!(hotel.location(), "Sector 7");
    }

    #[tokio::test]
    async fn test_shared_registry_is_readable_while_streaming() {
        let registry = RwLock::new(registry());
        let client = ScriptedClient::answering(
            r#"{"action":"deploy","squad_name":"Echo","location":"Sector 4","reasoning":"flood"}"#,
        )
        .paced(std::time::Duration::from_millis(300));
        let agent = DispatchAgent::new(Arc::new(client));

        let reader = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let guard = tokio::time::timeout(
                std::time::Duration::from_millis(100),
                registry.read(),
            )
            .await
            .expect("registry read blocked by a streaming cycle");
            let status = guard.get("Echo").unwrap().status();
            status
        };

        let (report, echo_mid_cycle) = tokio::join!(agent.run_shared(OBSERVATION, &registry), reader);

        assert_eq!(echo_mid_cycle, SquadStatus::Idle);
        assert!(matches!(report.outcome, CycleOutcome::Deployed { .. }));
        assert_eq!(registry.read().await.get("Echo").unwrap().status(), SquadStatus::Deployed);
        assert_terminal_last(&report);
    }
}
