//! Gomoku Royale - Unified CLI
//!
//! Play the computer from a terminal, watch two peers duel over an
//! in-process hub, or ask the heuristic for a move.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use gomoku_royale::{
    Amount, Board, ComputerPlayer, EngineConfig, HumanPlayer, InMemoryAccounts, LlmClient,
    LlmSuggester, LocalHub, MatchEvent, MatchSession, MoveAdvisor, MoveSuggester, PeerClient,
    PeerEvent, PeerId, PeerProtocol, PeerTimings, Room, Seat, run_local_match, run_peer_match,
    select_move,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Play {
            wager,
            seat,
            player,
            llm,
        } => {
            let config = match player {
                Some(name) => config.with_player(name),
                None => config,
            };
            run_play(config, wager, seat, llm).await
        }
        Command::Duel {
            wager,
            room,
            delay_ms,
        } => run_duel(config, wager, room, Duration::from_millis(delay_ms)).await,
        Command::Suggest { board, seat } => run_suggest(board.as_deref(), seat).await,
    }
}

fn initialize_tracing() {
    // Logs go to stderr so the board on stdout stays readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gomoku_royale=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[instrument(fields(path = %path.display()))]
fn load_config(path: &Path) -> Result<EngineConfig> {
    if path.exists() {
        Ok(EngineConfig::from_file(path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(EngineConfig::default())
    }
}

fn build_suggester(config: &EngineConfig) -> Result<Option<Arc<dyn MoveSuggester>>> {
    let Some(llm_config) = config.create_llm_config()? else {
        warn!("--llm given but the config has no [llm] section; heuristic only");
        return Ok(None);
    };
    info!(provider = ?llm_config.provider(), model = llm_config.model(), "LLM suggestions enabled");
    Ok(Some(Arc::new(LlmSuggester::new(LlmClient::new(llm_config)))))
}

/// Human on stdin against the computer.
#[instrument(skip(config))]
async fn run_play(config: EngineConfig, wager: Amount, seat: Seat, llm: bool) -> Result<()> {
    let suggester = if llm { build_suggester(&config)? } else { None };
    let advisor = MoveAdvisor::from_settings(config.advisor(), suggester);
    let accounts = Arc::new(InMemoryAccounts::new());

    let mut session = MatchSession::new(config.player().clone(), accounts.clone())
        .with_policy(config.wager().clone())
        .with_advisor(advisor)
        .vs_computer(seat);
    session.start_with_wager(wager)?;
    println!(
        "{} plays {} for {}. Enter moves as \"row col\", q to quit.",
        config.player(),
        seat.symbol(),
        wager
    );

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(line).is_err() {
                break;
            }
        }
    });
    let mut human = HumanPlayer::new(config.player().clone(), input_rx);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(None, event_rx));
    let outcome = run_local_match(&mut session, &mut human, &event_tx).await?;
    drop(event_tx);
    printer.await?;

    let balance = accounts.record(config.player()).map(|r| *r.balance()).unwrap_or_default();
    println!("Result: {}. Balance: {}", outcome, balance);
    Ok(())
}

/// Two heuristic peers over an in-process hub.
#[instrument(skip(config))]
async fn run_duel(
    config: EngineConfig,
    wager: Amount,
    room: Option<String>,
    delay: Duration,
) -> Result<()> {
    let room = Room::from_code(room.as_deref())?;
    let hub: Arc<LocalHub> = Arc::new(LocalHub::new());
    let accounts = Arc::new(InMemoryAccounts::new());
    let timings = PeerTimings::from(config.protocol());

    let mut tasks = Vec::new();
    for name in ["north", "south"] {
        let protocol = PeerProtocol::new(PeerId::generate(), name, accounts.clone())
            .with_policy(config.wager().clone())
            .with_timings(timings);
        let mut client = PeerClient::new(protocol, hub.clone());
        let mut player = ComputerPlayer::new(name, MoveAdvisor::heuristic_only().with_thinking_delay(delay));
        let room = room.clone();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(Some(name), event_rx));
        tasks.push(tokio::spawn(async move {
            let outcome = run_peer_match(&mut client, &mut player, wager, room, &event_tx).await;
            drop(event_tx);
            let _ = printer.await;
            outcome
        }));
    }

    for task in tasks {
        let outcome = task.await??;
        info!(%outcome, "Peer finished");
    }

    for record in accounts.leaderboard(2) {
        println!("{:>6}: balance {}, won {}/{}", record.name(), record.balance(), record.won(), record.played());
    }
    Ok(())
}

/// Heuristic move for a board read from a file or stdin.
async fn run_suggest(path: Option<&Path>, seat: Seat) -> Result<()> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    let rows: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let board = Board::from_rows(&rows)?;

    match select_move(&board, seat) {
        Some(coord) => println!("{} {}", coord.row, coord.col),
        None => anyhow::bail!("Board is full"),
    }
    Ok(())
}

async fn print_events(label: Option<&'static str>, mut events: mpsc::UnboundedReceiver<MatchEvent>) {
    let prefix = label.map(|l| format!("[{}] ", l)).unwrap_or_default();
    while let Some(event) = events.recv().await {
        match event {
            MatchEvent::Board(board) if label.is_none() => println!("{}", board),
            MatchEvent::Board(_) => {}
            MatchEvent::Thinking { .. } => {}
            MatchEvent::MovePlayed { seat, coord } => println!("{}{} plays {}", prefix, seat.symbol(), coord),
            MatchEvent::IllegalMove { coord, reason } => println!("{}{} rejected: {}", prefix, coord, reason),
            MatchEvent::Protocol(PeerEvent::Paired { seat, wager, .. }) => {
                println!("{}Paired as {} for {}", prefix, seat, wager)
            }
            MatchEvent::Protocol(PeerEvent::Stalled { waited }) => {
                println!("{}Opponent silent for {}s", prefix, waited.as_secs())
            }
            MatchEvent::Protocol(_) => {}
            MatchEvent::Finished { outcome } => println!("{}Finished: {}", prefix, outcome),
        }
    }
}
