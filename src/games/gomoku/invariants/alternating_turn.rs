//! Alternating turn invariant: seats alternate A, B, A, B, ...

use super::super::{GameInProgress, Seat};
use super::Invariant;

/// Invariant: seats alternate and the stone counts agree with whose turn it is.
///
/// Seat A moves first, so A has either as many stones as B (A to move) or
/// exactly one more (B to move).
pub struct AlternatingTurnInvariant;

impl Invariant<GameInProgress> for AlternatingTurnInvariant {
    fn holds(game: &GameInProgress) -> bool {
        if game
            .history()
            .windows(2)
            .any(|pair| pair[0].seat == pair[1].seat)
        {
            return false;
        }

        let a = game.board().stone_count(Seat::A);
        let b = game.board().stone_count(Seat::B);
        match game.to_move() {
            Seat::A => a == b,
            Seat::B => a == b + 1,
        }
    }

    fn description() -> &'static str {
        "Seats alternate turns (A, B, A, B, ...)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::gomoku::{GameResult, GameSetup, Move};

    #[test]
    fn test_alternation_holds() {
        let game = GameSetup::new().start();
        assert!(AlternatingTurnInvariant::holds(&game));
        let Ok(GameResult::InProgress(game)) = game.make_move(Move::at(Seat::A, 0, 0)) else {
            panic!("Expected in-progress game");
        };
        assert_eq!(game.to_move(), Seat::B);
        assert!(AlternatingTurnInvariant::holds(&game));
    }

    #[test]
    fn test_wrong_turn_marker_violates() {
        let game = GameSetup::new().start();
        let Ok(GameResult::InProgress(mut game)) = game.make_move(Move::at(Seat::A, 0, 0)) else {
            panic!("Expected in-progress game");
        };
        game.to_move = Seat::A;
        assert!(!AlternatingTurnInvariant::holds(&game));
    }
}
