//! Shared server state and the cycle runner used by the HTTP handlers.

use aeroguard_core::dispatch::{DispatchAgent, DispatchEvent, DispatchReport, Severity};
use aeroguard_core::reasoning::ReasoningClient;
use aeroguard_core::squads::SquadRegistry;
use aeroguard_core::state::{AeroDb, LogEntry, MissionLog};
use aeroguard_core::tools::VisionClient;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

/// Latest scan result, shown in status and the mission report
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub latest_observation: Option<String>,
    pub severity: Option<Severity>,
}

/// Application state
pub struct AppState {
    /// Write-locked only while a decision is applied
    pub registry: RwLock<SquadRegistry>,
    /// Held for the whole dispatch cycle; concurrent cycles queue here
    cycle_lock: Mutex<()>,
    pub reasoning: RwLock<Arc<dyn ReasoningClient>>,
    pub vision: RwLock<VisionClient>,
    pub event_tx: broadcast::Sender<DispatchEvent>,
    pub mission_log: MissionLog,
    pub scene: RwLock<Scene>,
}

impl Scene {
    /// Record a dispatched observation. The scan severity only stays when
    /// it describes this same observation.
    pub fn observe(&mut self, observation: &str) {
        if self.latest_observation.as_deref() != Some(observation) {
            self.severity = None;
        }
        self.latest_observation = Some(observation.to_string());
    }
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        registry: SquadRegistry,
        reasoning: Arc<dyn ReasoningClient>,
        vision: VisionClient,
        db: &AeroDb,
    ) -> Self {
        let (event_tx, _) = broadcast::channel::<DispatchEvent>(100);
        Self {
            registry: RwLock::new(registry),
            cycle_lock: Mutex::new(()),
            reasoning: RwLock::new(reasoning),
            vision: RwLock::new(vision),
            event_tx,
            mission_log: MissionLog::new(db),
            scene: RwLock::new(Scene::default()),
        }
    }

    /// Run one dispatch cycle against the shared registry.
    ///
    /// Events go to the broadcast channel and, when given, to `live`. The
    /// finished cycle is appended to the mission log.
    pub async fn run_cycle(
        &self,
        observation: &str,
        live: Option<mpsc::Sender<DispatchEvent>>,
    ) -> DispatchReport {
        let client = self.reasoning.read().await.clone();
        let (cycle_tx, mut cycle_rx) = mpsc::channel::<DispatchEvent>(64);
        let agent = DispatchAgent::new(client).with_event_channel(cycle_tx);

        let broadcast_tx = self.event_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = cycle_rx.recv().await {
                let _ = broadcast_tx.send(event.clone());
                if let Some(tx) = &live {
                    let _ = tx.send(event).await;
                }
            }
        });

        let _cycle = self.cycle_lock.lock().await;
        let report = agent.run_shared(observation, &self.registry).await;
        drop(agent);
        let _ = forward.await;

        if let Err(e) = self.mission_log.record(&LogEntry::from_report(&report)) {
            tracing::warn!(error = %e, "Failed to record mission log entry");
        }
        self.scene.write().await.observe(observation);

        report
    }
}
