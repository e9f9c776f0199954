//! Match Simulator CLI Tool
//!
//! Drives an in-process lobby with simulated clients and prints what each
//! client and the bridge observe.
//!
//! Usage:
//!   cargo run --bin match-simulator -- --help
//!   cargo run --bin match-simulator pair
//!   cargo run --bin match-simulator cancel
//!   cargo run --bin match-simulator burst --clients 40 --fill-target 4

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use pvp_lobby::client::Client;
use pvp_lobby::config::{validate_config, AppConfig};
use pvp_lobby::metrics::MetricsCollector;
use pvp_lobby::network::ChannelPacketSender;
use pvp_lobby::types::{ServerPacket, StartupRoomInfo};
use pvp_lobby::{LobbyService, SearchOutcome};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "match-simulator")]
#[command(about = "Simulate clients searching for opponents against an in-process pvp-lobby")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of members a room needs before it is promoted
    #[arg(long, global = true, default_value = "2")]
    fill_target: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill one room, then validate and finish it through the bridge
    Pair,
    /// A client searches, then cancels before an opponent arrives
    Cancel,
    /// Many clients search at once
    Burst {
        /// Number of simulated clients
        #[arg(short, long, default_value = "20")]
        clients: usize,
    },
}

/// A simulated connection: the lobby-side client and its inbound packets
struct SimClient {
    label: String,
    client: Arc<Client>,
    inbox: UnboundedReceiver<ServerPacket>,
}

impl SimClient {
    fn connect(lobby: &LobbyService, label: impl Into<String>) -> Result<Self> {
        let (sender, inbox) = ChannelPacketSender::channel();
        let client = lobby.on_client_connected(Arc::new(sender))?;
        Ok(Self {
            label: label.into(),
            client,
            inbox,
        })
    }

    fn startup_info(&mut self) -> Option<StartupRoomInfo> {
        match self.inbox.try_recv().ok()? {
            ServerPacket::StartupRoomInfo(info) => Some(info),
        }
    }
}

fn build_lobby(fill_target: usize) -> Result<LobbyService> {
    let mut config = AppConfig::default();
    config.matchmaking.fill_target = fill_target;
    validate_config(&config)?;

    let metrics = Arc::new(MetricsCollector::new()?);
    Ok(LobbyService::new(&config, metrics))
}

fn describe(outcome: &SearchOutcome) -> String {
    match outcome {
        SearchOutcome::Waiting { member_count } => {
            format!("⏳ waiting ({} in pending room)", member_count)
        }
        SearchOutcome::Promoted {
            room_id,
            member_count,
        } => format!("🚀 promoted room {} with {} members", room_id, member_count),
        SearchOutcome::AlreadyInRoom => "↩️  already in a room".to_string(),
        SearchOutcome::Cancelled { checkpoint } => format!("🛑 cancelled at {}", checkpoint),
        SearchOutcome::LockTimeout => "⌛ fill section busy, try again".to_string(),
    }
}

async fn run_pair(fill_target: usize) -> Result<()> {
    println!("🎮 Pair scenario (fill target {})", fill_target);
    let lobby = build_lobby(fill_target)?;
    let bridge = lobby.bridge();

    let mut clients = (0..fill_target)
        .map(|i| SimClient::connect(&lobby, format!("client-{}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    for sim in &clients {
        let outcome = lobby.matchmaker().find_opponent(&sim.client).await?;
        println!("  {} -> {}", sim.label, describe(&outcome));
    }

    let mut room_id = None;
    for sim in &mut clients {
        let info = sim
            .startup_info()
            .ok_or_else(|| anyhow!("{} received no startup packet", sim.label))?;
        println!(
            "  📨 {} got room {} via '{}' ({})",
            sim.label,
            info.room_id,
            info.bridge_identity,
            info.bridge_endpoints.join(", ")
        );

        let valid = bridge
            .validate_session(info.room_id, &info.session_identity)
            .await?;
        println!("  🔐 bridge validates {}: {}", sim.label, valid);
        room_id = Some(info.room_id);
    }

    let room_id = room_id.ok_or_else(|| anyhow!("no room was promoted"))?;
    let startup = bridge.room_startup_info(room_id).await?;
    println!(
        "  🏁 room startup info: ready={}, members={}",
        startup.ready, startup.member_count
    );

    let finished = bridge.finish_room(room_id, b"match-result").await?;
    println!("  ✅ room finished: {}", finished);

    for sim in &clients {
        lobby.on_client_disconnected(Some(&sim.client)).await?;
    }
    Ok(())
}

async fn run_cancel(fill_target: usize) -> Result<()> {
    println!("🎮 Cancel scenario (fill target {})", fill_target);
    let lobby = build_lobby(fill_target)?;
    let matchmaker = lobby.matchmaker();

    let mut sim = SimClient::connect(&lobby, "client-1")?;
    let outcome = matchmaker.find_opponent(&sim.client).await?;
    println!("  {} -> {}", sim.label, describe(&outcome));
    println!(
        "  pending room members: {}",
        matchmaker.pending_member_count().await
    );

    let withdrew = matchmaker.abandon_search(&sim.client).await?;
    println!("  {} cancelled search (left room: {})", sim.label, withdrew);
    println!(
        "  pending room members: {}",
        matchmaker.pending_member_count().await
    );

    if sim.startup_info().is_some() {
        return Err(anyhow!("cancelled client should not receive a startup packet"));
    }
    println!("  ✅ no startup packet delivered");

    lobby.on_client_disconnected(Some(&sim.client)).await?;
    Ok(())
}

async fn run_burst(fill_target: usize, count: usize) -> Result<()> {
    println!(
        "🎮 Burst scenario ({} clients, fill target {})",
        count, fill_target
    );
    let lobby = Arc::new(build_lobby(fill_target)?);

    let mut clients = (0..count)
        .map(|i| SimClient::connect(&lobby, format!("client-{}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    let start = Instant::now();
    let searches: Vec<_> = clients
        .iter()
        .map(|sim| {
            let lobby = Arc::clone(&lobby);
            let client = Arc::clone(&sim.client);
            tokio::spawn(async move { lobby.matchmaker().find_opponent(&client).await })
        })
        .collect();

    let mut promoted = 0;
    let mut waiting = 0;
    let mut other = 0;
    for search in searches {
        match search.await?? {
            SearchOutcome::Promoted { .. } => promoted += 1,
            SearchOutcome::Waiting { .. } => waiting += 1,
            _ => other += 1,
        }
    }
    let elapsed = start.elapsed();

    let notified = clients
        .iter_mut()
        .filter_map(|sim| sim.startup_info())
        .count();

    println!("  ⏱️  {} searches in {:?}", count, elapsed);
    println!("  🚀 rooms promoted: {}", promoted);
    println!("  ⏳ searches left waiting: {}", waiting);
    println!("  ❓ other outcomes: {}", other);
    println!("  📨 clients notified: {}", notified);
    println!(
        "  👥 still in pending room: {}",
        lobby.matchmaker().pending_member_count().await
    );

    let snapshot = lobby.snapshot()?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pair => run_pair(cli.fill_target).await?,
        Commands::Cancel => run_cancel(cli.fill_target).await?,
        Commands::Burst { clients } => run_burst(cli.fill_target, clients).await?,
    }

    Ok(())
}
