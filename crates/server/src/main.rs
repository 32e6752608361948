//! AeroGuard Server
//!
//! Axum server exposing the squad registry, dispatch cycles and mission log,
//! plus a CLI for one-shot dispatches without the server.

mod api;
mod config;
mod state;

use aeroguard_core::dispatch::{DispatchAgent, DispatchEvent};
use aeroguard_core::reasoning::ChatCompletionsClient;
use aeroguard_core::squads::{default_roster, load_roster, SquadRegistry};
use aeroguard_core::state::AeroDb;
use aeroguard_core::tools::VisionClient;
use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};

use crate::config::PersistedConfig;
use crate::state::{AppState, SharedState};

#[derive(Parser, Clone)]
#[command(author, version, about = "AeroGuard - Drone Hazard Incident Commander")]
struct Args {
    /// Roster JSON file (defaults to the built-in roster)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the AeroGuard server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run one dispatch cycle on an observation (CLI mode, no server)
    Dispatch {
        /// Hazard observation, e.g. "Visual Scan: FLOOD. Coverage: 45%."
        observation: String,
    },
    /// Print the squad roster
    Squads,
}

fn build_registry(roster: Option<&Path>) -> anyhow::Result<SquadRegistry> {
    let squads = match roster {
        Some(path) => load_roster(path)?,
        None => default_roster(),
    };
    SquadRegistry::from_roster(squads).context("Invalid roster")
}

pub async fn run_server(port: u16, registry: SquadRegistry) -> anyhow::Result<()> {
    let config = PersistedConfig::load().await;
    let reasoning_config = config.reasoning_config();
    let vision_config = config.vision_config();

    let db = AeroDb::open().context("Failed to open mission database")?;
    let reasoning = ChatCompletionsClient::new(reasoning_config.clone())?;
    let vision = VisionClient::new(vision_config.clone())?;

    let state: SharedState = Arc::new(AppState::new(registry, Arc::new(reasoning), vision, &db));

    let app = Router::new()
        .nest("/api/v1", api::routes())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚁 AeroGuard Server running at http://{}", addr);
    println!("   Reasoning: {} ({})", reasoning_config.base_url, reasoning_config.model);
    println!("   Vision:    {}", vision_config.server_url);
    println!("   API v1 Routes:");
    println!("   Squads:    /api/v1/squads, /squads/:name");
    println!("   Dispatch:  /api/v1/dispatch (POST, SSE), /scan (POST)");
    println!("   Events:    /api/v1/events (SSE)");
    println!("   Mission:   /api/v1/status, /log, /report");
    println!("   Config:    /api/v1/config (GET, PATCH)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_dispatch(observation: &str, mut registry: SquadRegistry) -> anyhow::Result<()> {
    let config = PersistedConfig::load().await.reasoning_config();
    println!("🧠 Reasoning with {} at {}", config.model, config.base_url);

    let client = ChatCompletionsClient::new(config)?;
    let (tx, mut rx) = mpsc::channel::<DispatchEvent>(64);
    let agent = DispatchAgent::new(Arc::new(client)).with_event_channel(tx);

    let printer = tokio::spawn(async move {
        let mut in_answer = false;
        while let Some(event) = rx.recv().await {
            print_event(&event, &mut in_answer);
        }
    });

    let report = agent.run(observation, &mut registry).await;
    drop(agent);
    printer.await?;

    println!("\n📋 Squad Status:");
    println!("{}", registry.status_summary());

    if report.outcome.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            report
                .terminal_event()
                .map(|e| e.content().to_string())
                .unwrap_or_default()
        )
    }
}

fn print_event(event: &DispatchEvent, in_answer: &mut bool) {
    match event {
        DispatchEvent::Thinking { content } => {
            print!("{}", content);
        }
        DispatchEvent::Answer { content } => {
            if !*in_answer {
                println!("\n\n📝 Decision:");
                *in_answer = true;
            }
            print!("{}", content);
        }
        DispatchEvent::Reasoning { content, .. } => println!("\n\n💡 {}", content),
        DispatchEvent::Status { content } => println!("✅ {}", content),
        DispatchEvent::Warning { content } => println!("\n⚠️ {}", content),
        DispatchEvent::Error { content } => println!("\n❌ {}", content),
    }
    let _ = std::io::stdout().flush();
}

fn print_squads(registry: &SquadRegistry) {
    for squad in registry.iter() {
        println!(
            "  {:<8} {:<12} {:<9} @ {:<10} cap {:>2}  {}",
            squad.name(),
            squad.unit_type(),
            squad.status().to_string(),
            squad.location(),
            squad.capacity(),
            squad.equipment().join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let registry = build_registry(args.roster.as_deref())?;

    match args.command {
        Some(CliCommand::Dispatch { observation }) => run_dispatch(&observation, registry).await,
        Some(CliCommand::Squads) => {
            println!("🛡️ {} squads on roster", registry.len());
            print_squads(&registry);
            Ok(())
        }
        Some(CliCommand::Serve { port }) => serve(port, registry).await,
        None => serve(8080, registry).await,
    }
}

async fn serve(port: u16, registry: SquadRegistry) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════╗");
    println!("║          AEROGUARD SERVER            ║");
    println!("╚══════════════════════════════════════╝");

    run_server(port, registry).await
}
