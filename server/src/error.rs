//! Error taxonomy for match hosting
//!
//! None of these are fatal to the process. Capacity, lookup and join
//! failures are surfaced to whoever asked; invalid input and delivery
//! failures are logged by the engine and never leave it.

use shared::{ParseDirectionError, PlayerSlot};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("maximum number of concurrent matches reached ({0})")]
    CapacityExceeded(usize),

    #[error("match {0} not found")]
    NotFound(String),

    #[error("match {0} is full")]
    MatchFull(String),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ParseDirectionError),

    #[error("delivery to player {slot} failed: {reason}")]
    DeliveryFailure { slot: PlayerSlot, reason: String },
}

pub type Result<T> = std::result::Result<T, ArenaError>;
