//! Per-match engine
//!
//! A [`Match`] wraps one [`MatchState`] behind an exclusive lock and drives
//! its lifecycle:
//!
//! - `waiting` until both slots are filled
//! - `countdown` for [`COUNTDOWN_SECONDS`] seconds, run by its own task
//! - `playing`, where a simulation task ticks at [`FRAME_RATE`] and pushes a
//!   snapshot to both players after every tick
//!
//! Any departure resets the match to `waiting`. The reset bumps the state's
//! epoch, and both background tasks check the epoch they were started under
//! every time they take the lock, so a stale task stops on its next
//! iteration without broadcasting anything.
//!
//! The lock is held for exactly one logical operation and is always released
//! before awaiting a delivery.

use crate::error::{ArenaError, Result};
use crate::game::MatchState;
use crate::peer::{broadcast, CloseCode, CloseFrame, PeerSender};
use log::{debug, info, warn};
use shared::{
    Direction, MatchSnapshot, MatchStatus, PlayerSlot, ServerMessage, COUNTDOWN_SECONDS,
    FRAME_RATE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

pub fn tick_period() -> Duration {
    Duration::from_secs_f64(1.0 / FRAME_RATE as f64)
}

#[derive(Debug)]
pub struct Match {
    code: String,
    state: Mutex<MatchState>,
}

impl Match {
    pub fn new(code: String) -> Arc<Self> {
        info!("New match with code {}", code);
        Arc::new(Self {
            state: Mutex::new(MatchState::new(code.clone())),
            code,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Seats a new player bound to `peer`.
    ///
    /// The player-assigned message is queued on `peer` before anything else,
    /// so it always precedes the first countdown tick. Filling the second
    /// slot starts the countdown.
    pub async fn join(self: &Arc<Self>, peer: PeerSender) -> Result<PlayerSlot> {
        let mut state = self.state.lock().await;

        let slot = state
            .seat(peer.clone())
            .ok_or_else(|| ArenaError::MatchFull(self.code.clone()))?;

        let countdown_epoch = if state.is_full() {
            info!("Starting countdown for match {}", self.code);
            Some(state.begin_countdown())
        } else {
            None
        };

        let assigned = ServerMessage::PlayerAssigned {
            player_id: slot.id(),
            game_state: state.snapshot(),
        };
        if let Err(e) = peer.try_send(assigned) {
            warn!("Error sending initial message to player {}: {}", slot, e);
        }

        if let Some(epoch) = countdown_epoch {
            tokio::spawn(Arc::clone(self).run_countdown(epoch));
        }

        Ok(slot)
    }

    /// Releases `slot` and resets the match to `waiting`.
    ///
    /// The reset happens even if the slot was already empty, so call this
    /// exactly once per real departure. The remaining player stays connected.
    /// Removing an empty match from the registry is left to the caller.
    pub async fn leave(&self, slot: PlayerSlot) {
        let mut state = self.state.lock().await;
        info!("Removing player {} from match {}", slot, self.code);

        if let Some(player) = state.vacate(slot) {
            player
                .peer
                .close(CloseFrame::new(CloseCode::Normal, "Player disconnected"));
        }

        state.reset();
    }

    /// Applies a movement request from `slot`.
    ///
    /// Unknown directions are logged and dropped. Input is accepted in every
    /// phase, it just has no visible effect until play starts.
    pub async fn apply_input(&self, slot: PlayerSlot, direction: &str) {
        let direction = match direction.parse::<Direction>() {
            Ok(direction) => direction,
            Err(e) => {
                warn!(
                    "Match {}: player {}: {}",
                    self.code,
                    slot,
                    ArenaError::from(e)
                );
                return;
            }
        };

        let mut state = self.state.lock().await;
        if !state.set_direction(slot, direction) {
            warn!("Match {}: cannot move absent player {}", self.code, slot);
        }
    }

    pub async fn snapshot(&self) -> MatchSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn status(&self) -> MatchStatus {
        self.state.lock().await.status
    }

    pub async fn player_count(&self) -> usize {
        self.state.lock().await.player_count()
    }

    pub async fn occupied_slots(&self) -> Vec<PlayerSlot> {
        let state = self.state.lock().await;
        [PlayerSlot::Left, PlayerSlot::Right]
            .into_iter()
            .filter(|slot| state.player(*slot).is_some())
            .collect()
    }

    pub async fn is_vacant(&self) -> bool {
        self.player_count().await == 0
    }

    #[cfg(test)]
    pub(crate) async fn lock_state(&self) -> tokio::sync::MutexGuard<'_, MatchState> {
        self.state.lock().await
    }

    /// Counts down once per second, then starts play.
    ///
    /// Countdown and start messages are queued while the lock is held, so a
    /// reset observed by the next check can never be followed by a stale
    /// countdown or start message.
    async fn run_countdown(self: Arc<Self>, epoch: u64) {
        loop {
            {
                let mut state = self.state.lock().await;
                if !state.in_phase(MatchStatus::Countdown, epoch) {
                    debug!("Countdown for match {} abandoned", self.code);
                    return;
                }
                if state.countdown == 0 {
                    state.begin_play();
                    state.notify(&ServerMessage::GameStart);
                    break;
                }
                state.notify(&ServerMessage::Countdown(state.countdown));
            }

            sleep(COUNTDOWN_STEP).await;

            let mut state = self.state.lock().await;
            if !state.in_phase(MatchStatus::Countdown, epoch) {
                debug!("Countdown for match {} abandoned", self.code);
                return;
            }
            state.countdown -= 1;
        }

        self.run_simulation(epoch).await;
    }

    /// Ticks the simulation until the match leaves `playing`.
    ///
    /// Snapshots are delivered from their own task so a slow player never
    /// delays the next tick; tick bodies are still serialized by the lock.
    async fn run_simulation(self: Arc<Self>, epoch: u64) {
        info!("Starting loop for match {}", self.code);

        let mut ticker = interval(tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let (snapshot, recipients) = {
                let mut state = self.state.lock().await;
                if !state.in_phase(MatchStatus::Playing, epoch) {
                    info!("Stopping loop for match {}", self.code);
                    return;
                }
                let outcome = state.advance(Instant::now(), &mut rand::thread_rng());
                if outcome.paddle_hits > 0 {
                    debug!(
                        "Match {}: paddle hit, streak {}",
                        self.code, state.hit_streak
                    );
                }
                if let Some(side) = outcome.conceded {
                    debug!("Match {}: player {} missed the ball", self.code, side);
                }
                (state.snapshot(), state.recipients())
            };

            tokio::spawn(async move {
                broadcast(&recipients, &ServerMessage::GameState(snapshot)).await;
            });
        }
    }
}
