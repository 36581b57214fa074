//! Command-line interface for gomoku_royale.

use clap::{Parser, Subcommand};
use gomoku_royale::Seat;
use std::path::PathBuf;

/// Gomoku Royale - wager-backed five-in-a-row
#[derive(Parser, Debug)]
#[command(name = "gomoku_royale")]
#[command(about = "Five-in-a-row for stakes against the computer or a peer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the engine config (defaults apply when the file is missing)
    #[arg(short, long, global = true, default_value = "gomoku.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play against the computer, entering moves as "row col" on stdin
    Play {
        /// Stake; must be one of the table tiers
        #[arg(short, long, default_value = "5000")]
        wager: u64,

        /// Seat to play: A (X, moves first) or B (O)
        #[arg(short, long, default_value = "A", value_parser = parse_seat)]
        seat: Seat,

        /// Override the player name from the config
        #[arg(long)]
        player: Option<String>,

        /// Ask the configured LLM for the computer's moves
        #[arg(long)]
        llm: bool,
    },

    /// Run two in-process peers against each other over a local hub
    Duel {
        /// Stake both peers seek at
        #[arg(short, long, default_value = "5000")]
        wager: u64,

        /// Four-digit private room; the public queue when omitted
        #[arg(long)]
        room: Option<String>,

        /// Artificial thinking delay per move, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Print the heuristic move for a board given as 15 text rows
    Suggest {
        /// File with the rows ('.', 'X', 'O'); stdin when omitted
        #[arg(short, long)]
        board: Option<PathBuf>,

        /// Seat to move: A/X or B/O
        #[arg(short, long, value_parser = parse_seat)]
        seat: Seat,
    },
}

fn parse_seat(input: &str) -> Result<Seat, String> {
    match input.trim().to_ascii_uppercase().as_str() {
        "A" | "X" => Ok(Seat::A),
        "B" | "O" => Ok(Seat::B),
        other => Err(format!("unknown seat {:?}; expected A, B, X or O", other)),
    }
}
