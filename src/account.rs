//! Player balances and match records.
//!
//! Sessions only talk to [`AccountService`]; the in-memory implementation
//! here stands in for a real backend.

use crate::wager::Amount;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Balance granted to a player the first time they are seen.
pub const STARTING_BALANCE: Amount = 1_000_000;

/// Result of one match, reported to the account backend at resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct MatchRecord {
    /// Matches played (always 1 for a single report).
    pub played: u32,
    /// Matches won (0 or 1).
    pub won: u32,
    /// Prize minus stake on a win, minus the stake on a loss, 0 otherwise.
    pub net_change: i64,
}

/// Balance and lifetime statistics for a player.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Display name.
    name: String,
    /// Current balance.
    balance: Amount,
    /// Matches played.
    played: u32,
    /// Matches won.
    won: u32,
    /// Sum of positive net changes.
    total_earned: Amount,
}

impl PlayerRecord {
    fn fresh(name: &str) -> Self {
        Self {
            name: name.to_string(),
            balance: STARTING_BALANCE,
            played: 0,
            won: 0,
            total_earned: 0,
        }
    }
}

/// Account backend consumed by match sessions.
pub trait AccountService: Send + Sync + std::fmt::Debug {
    /// Returns the player's balance.
    fn balance(&self, player: &str) -> Result<Amount, AccountError>;

    /// Removes `amount` from the balance, failing if it would go negative.
    fn debit(&self, player: &str, amount: Amount) -> Result<Amount, AccountError>;

    /// Adds `amount` to the balance.
    fn credit(&self, player: &str, amount: Amount) -> Result<Amount, AccountError>;

    /// Records the result of a finished match.
    fn record_result(&self, player: &str, record: MatchRecord) -> Result<(), AccountError>;
}

/// Error from the account backend.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum AccountError {
    /// The balance cannot cover the debit.
    #[display("Insufficient funds for {}: needs {}, has {}", player, needed, available)]
    InsufficientFunds {
        /// Player name.
        player: String,
        /// Amount requested.
        needed: Amount,
        /// Balance available.
        available: Amount,
    },

    /// Deposits and withdrawals must move a positive amount.
    #[display("Amount must be positive")]
    ZeroAmount,

    /// The credit would push the balance past the largest amount.
    #[display("Crediting {} to {} overflows the balance", amount, player)]
    Overflow {
        /// Player name.
        player: String,
        /// Amount refused.
        amount: Amount,
    },
}

/// Thread-safe in-memory account store.
///
/// Unknown players are opened on first touch with [`STARTING_BALANCE`].
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    players: Mutex<HashMap<String, PlayerRecord>>,
}

impl InMemoryAccounts {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory account store");
        Self::default()
    }

    fn with_player<T>(&self, player: &str, f: impl FnOnce(&mut PlayerRecord) -> T) -> T {
        let mut players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        let record = players.entry(player.to_string()).or_insert_with(|| {
            info!(player, balance = STARTING_BALANCE, "Opening account");
            PlayerRecord::fresh(player)
        });
        f(record)
    }

    /// Returns the player's record, opening an account if needed.
    #[instrument(skip(self))]
    pub fn open_account(&self, player: &str) -> PlayerRecord {
        self.with_player(player, |record| record.clone())
    }

    /// Returns the player's record if the account exists.
    pub fn record(&self, player: &str) -> Option<PlayerRecord> {
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player)
            .cloned()
    }

    /// Adds funds from outside the game.
    #[instrument(skip(self))]
    pub fn deposit(&self, player: &str, amount: Amount) -> Result<Amount, AccountError> {
        if amount == 0 {
            return Err(AccountError::ZeroAmount);
        }
        self.credit(player, amount)
    }

    /// Takes funds out of the game.
    #[instrument(skip(self))]
    pub fn withdraw(&self, player: &str, amount: Amount) -> Result<Amount, AccountError> {
        if amount == 0 {
            return Err(AccountError::ZeroAmount);
        }
        self.debit(player, amount)
    }

    /// Returns up to `limit` players ordered by balance, richest first.
    ///
    /// Equal balances are ordered by name.
    #[instrument(skip(self))]
    pub fn leaderboard(&self, limit: usize) -> Vec<PlayerRecord> {
        let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ranked: Vec<PlayerRecord> = players.values().cloned().collect();
        ranked.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(limit);
        debug!(entries = ranked.len(), "Leaderboard built");
        ranked
    }
}

impl AccountService for InMemoryAccounts {
    fn balance(&self, player: &str) -> Result<Amount, AccountError> {
        Ok(self.with_player(player, |record| record.balance))
    }

    #[instrument(skip(self))]
    fn debit(&self, player: &str, amount: Amount) -> Result<Amount, AccountError> {
        self.with_player(player, |record| {
            if record.balance < amount {
                warn!(player, amount, balance = record.balance, "Debit refused");
                return Err(AccountError::InsufficientFunds {
                    player: player.to_string(),
                    needed: amount,
                    available: record.balance,
                });
            }
            record.balance -= amount;
            debug!(player, amount, balance = record.balance, "Debited");
            Ok(record.balance)
        })
    }

    #[instrument(skip(self))]
    fn credit(&self, player: &str, amount: Amount) -> Result<Amount, AccountError> {
        self.with_player(player, |record| {
            let Some(balance) = record.balance.checked_add(amount) else {
                warn!(player, amount, balance = record.balance, "Credit refused");
                return Err(AccountError::Overflow {
                    player: player.to_string(),
                    amount,
                });
            };
            record.balance = balance;
            debug!(player, amount, balance, "Credited");
            Ok(balance)
        })
    }

    #[instrument(skip(self))]
    fn record_result(&self, player: &str, result: MatchRecord) -> Result<(), AccountError> {
        self.with_player(player, |record| {
            record.played = record.played.saturating_add(result.played);
            record.won = record.won.saturating_add(result.won);
            if result.net_change > 0 {
                record.total_earned = record.total_earned.saturating_add(result.net_change.unsigned_abs());
            }
        });
        info!(player, net_change = result.net_change, "Match result recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_gets_starting_balance() {
        let accounts = InMemoryAccounts::new();
        assert_eq!(accounts.balance("alice"), Ok(STARTING_BALANCE));
    }

    #[test]
    fn test_debit_refuses_overdraft() {
        let accounts = InMemoryAccounts::new();
        let err = accounts.debit("bob", STARTING_BALANCE + 1).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds { .. }));
        assert_eq!(accounts.balance("bob"), Ok(STARTING_BALANCE));
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let accounts = InMemoryAccounts::new();
        assert_eq!(accounts.deposit("carol", 500), Ok(STARTING_BALANCE + 500));
        assert_eq!(accounts.withdraw("carol", 1_500), Ok(STARTING_BALANCE - 1_000));
        assert_eq!(accounts.withdraw("carol", 0), Err(AccountError::ZeroAmount));
    }

    #[test]
    fn test_credit_refuses_overflow() {
        let accounts = InMemoryAccounts::new();
        accounts.deposit("gina", Amount::MAX - STARTING_BALANCE).expect("deposit");
        assert!(matches!(
            accounts.credit("gina", 1),
            Err(AccountError::Overflow { amount: 1, .. })
        ));
        assert_eq!(accounts.balance("gina"), Ok(Amount::MAX));
    }

    #[test]
    fn test_record_result_tracks_earnings() {
        let accounts = InMemoryAccounts::new();
        accounts
            .record_result("dave", MatchRecord::new(1, 1, 40_000))
            .expect("record");
        accounts
            .record_result("dave", MatchRecord::new(1, 0, -50_000))
            .expect("record");
        let record = accounts.record("dave").expect("opened");
        assert_eq!(*record.played(), 2);
        assert_eq!(*record.won(), 1);
        assert_eq!(*record.total_earned(), 40_000);
    }

    #[test]
    fn test_leaderboard_orders_by_balance() {
        let accounts = InMemoryAccounts::new();
        accounts.deposit("erin", 10).expect("deposit");
        accounts.withdraw("frank", 10).expect("withdraw");
        accounts.open_account("gina");

        let names: Vec<String> = accounts
            .leaderboard(2)
            .iter()
            .map(|r| r.name().clone())
            .collect();
        assert_eq!(names, vec!["erin".to_string(), "gina".to_string()]);
    }
}
