//! Table rules for wagers: allowed stakes and the winner's payout.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Amount of currency, in whole units.
pub type Amount = u64;

/// Stakes offered at the table, smallest first.
pub const DEFAULT_TIERS: [Amount; 4] = [5_000, 20_000, 50_000, 200_000];

/// Table minimum stake.
pub const DEFAULT_MINIMUM: Amount = 5_000;

/// Winner receives the stake times 1.8.
pub const DEFAULT_PAYOUT_PERCENT: u32 = 180;

/// Wager rules for a table.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct WagerPolicy {
    /// Stakes a seat may choose from.
    #[serde(default = "default_tiers")]
    tiers: Vec<Amount>,

    /// Lowest stake accepted, including peer-proposed stakes.
    #[serde(default = "default_minimum")]
    minimum: Amount,

    /// Winner's credit as a percentage of the stake.
    #[serde(default = "default_payout_percent")]
    payout_percent: u32,
}

fn default_tiers() -> Vec<Amount> {
    DEFAULT_TIERS.to_vec()
}

fn default_minimum() -> Amount {
    DEFAULT_MINIMUM
}

fn default_payout_percent() -> u32 {
    DEFAULT_PAYOUT_PERCENT
}

impl Default for WagerPolicy {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            minimum: default_minimum(),
            payout_percent: default_payout_percent(),
        }
    }
}

impl WagerPolicy {
    /// Creates a policy with explicit values.
    pub fn new(tiers: Vec<Amount>, minimum: Amount, payout_percent: u32) -> Self {
        Self {
            tiers,
            minimum,
            payout_percent,
        }
    }

    /// Validates a stake chosen by the initiating seat.
    #[instrument(skip(self))]
    pub fn validate_choice(&self, amount: Amount) -> Result<(), WagerError> {
        self.validate_proposed(amount)?;
        if !self.tiers.contains(&amount) {
            warn!(amount, tiers = ?self.tiers, "Stake is not a table tier");
            return Err(WagerError::InvalidWager(amount));
        }
        Ok(())
    }

    /// Validates a stake proposed by the peer holding role A.
    ///
    /// Proposed stakes are taken verbatim; only the table minimum applies.
    #[instrument(skip(self))]
    pub fn validate_proposed(&self, amount: Amount) -> Result<(), WagerError> {
        if amount < self.minimum {
            warn!(amount, minimum = self.minimum, "Stake below table minimum");
            return Err(WagerError::InvalidWager(amount));
        }
        Ok(())
    }

    /// Credit paid to the winner of a match staked at `wager` (rounded down).
    ///
    /// Saturates at `Amount::MAX`; the credit is then refused by the account.
    pub fn payout(&self, wager: Amount) -> Amount {
        let prize = u128::from(wager) * u128::from(self.payout_percent) / 100;
        Amount::try_from(prize).unwrap_or(Amount::MAX)
    }
}

/// Error raised while choosing or staking a wager.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum WagerError {
    /// Stake is not allowed at this table.
    #[display("Wager {} is not allowed at this table", _0)]
    InvalidWager(Amount),

    /// Player cannot cover the stake.
    #[display("Insufficient funds: wager {} exceeds balance {}", wager, balance)]
    InsufficientFunds {
        /// Requested stake.
        wager: Amount,
        /// Balance at the time of the check.
        balance: Amount,
    },

    /// No stake has been chosen yet.
    #[display("No wager chosen")]
    NoWager,

    /// The match has already left the wagering phase.
    #[display("Match already started; the wager is locked")]
    AlreadyStarted,
}

impl std::error::Error for WagerError {}
