use crate::peer::{PeerSender, Recipient};
use log::{debug, info, warn};
use rand::Rng;
use shared::{
    Ball, Direction, MatchSnapshot, MatchStatus, Paddle, PlayerSlot, ServerMessage,
    BASE_BALL_SPEED, COUNTDOWN_SECONDS, FIELD_HEIGHT, FIELD_WIDTH, FRAME_RATE, MAX_BALL_SPEED, PADDLE_HEIGHT,
    PADDLE_WIDTH, SPEED_STEP,
};
use std::time::Duration;
use tokio::time::Instant;

/// Longest frame delta fed into the physics step
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// A joined player: their paddle plus the queue that reaches their connection
#[derive(Debug)]
pub struct Player {
    pub paddle: Paddle,
    pub peer: PeerSender,
}

impl Player {
    pub fn new(slot: PlayerSlot, peer: PeerSender) -> Self {
        Self {
            paddle: Paddle::new(slot),
            peer,
        }
    }
}

/// What happened during one physics step
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub paddle_hits: u32,
    /// Side the ball left the field through, if a point was played out
    pub conceded: Option<PlayerSlot>,
}

#[derive(Debug)]
pub struct MatchState {
    pub code: String,
    pub left: Option<Player>,
    pub right: Option<Player>,
    pub ball: Ball,
    pub status: MatchStatus,
    pub hit_streak: u32,
    pub countdown: u32,
    pub last_update: Instant,
    /// Bumped on every reset. Countdown and simulation tasks remember the
    /// epoch that started them and stop once it moves on.
    pub epoch: u64,
}

impl MatchState {
    pub fn new(code: String) -> Self {
        Self {
            code,
            left: None,
            right: None,
            ball: Ball::new(),
            status: MatchStatus::Waiting,
            hit_streak: 0,
            countdown: 0,
            last_update: Instant::now(),
            epoch: 0,
        }
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        match slot {
            PlayerSlot::Left => self.left.as_ref(),
            PlayerSlot::Right => self.right.as_ref(),
        }
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> Option<&mut Player> {
        match slot {
            PlayerSlot::Left => self.left.as_mut(),
            PlayerSlot::Right => self.right.as_mut(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.left.is_some() as usize + self.right.is_some() as usize
    }

    pub fn is_full(&self) -> bool {
        self.player_count() == 2
    }

    /// Puts a new player in the first open slot, left before right
    pub fn seat(&mut self, peer: PeerSender) -> Option<PlayerSlot> {
        let slot = if self.left.is_none() {
            PlayerSlot::Left
        } else if self.right.is_none() {
            PlayerSlot::Right
        } else {
            return None;
        };

        let player = Player::new(slot, peer);
        match slot {
            PlayerSlot::Left => self.left = Some(player),
            PlayerSlot::Right => self.right = Some(player),
        }
        info!("Player {} joined match {}", slot, self.code);
        Some(slot)
    }

    pub fn vacate(&mut self, slot: PlayerSlot) -> Option<Player> {
        let player = match slot {
            PlayerSlot::Left => self.left.take(),
            PlayerSlot::Right => self.right.take(),
        };
        if player.is_some() {
            info!("Player {} left match {}", slot, self.code);
        }
        player
    }

    /// Returns the match to its initial waiting state, keeping whoever is
    /// still connected
    pub fn reset(&mut self) {
        self.ball = Ball::new();
        self.status = MatchStatus::Waiting;
        self.hit_streak = 0;
        self.countdown = 0;
        self.last_update = Instant::now();
        self.epoch += 1;

        for player in [&mut self.left, &mut self.right].into_iter().flatten() {
            player.paddle.score = 0;
            player.paddle.vy = 0.0;
            player.paddle.y = Paddle::centered_y();
        }
    }

    /// Enters the countdown phase and returns the epoch it belongs to
    pub fn begin_countdown(&mut self) -> u64 {
        self.status = MatchStatus::Countdown;
        self.countdown = COUNTDOWN_SECONDS;
        self.epoch
    }

    pub fn begin_play(&mut self) {
        self.status = MatchStatus::Playing;
        self.countdown = 0;
        self.last_update = Instant::now();
    }

    /// True while the match is still in `status` during the given epoch
    pub fn in_phase(&self, status: MatchStatus, epoch: u64) -> bool {
        self.status == status && self.epoch == epoch
    }

    pub fn set_direction(&mut self, slot: PlayerSlot, direction: Direction) -> bool {
        match self.player_mut(slot) {
            Some(player) => {
                player.paddle.vy = direction.velocity();
                true
            }
            None => false,
        }
    }

    /// Runs one physics step scaled by the real time elapsed since the last one
    pub fn advance<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> TickOutcome {
        let mut elapsed = now.saturating_duration_since(self.last_update);
        self.last_update = now;

        if elapsed > MAX_FRAME_DELTA {
            warn!(
                "Match {}: large frame delta ({:.3}s), capping to {:.3}s",
                self.code,
                elapsed.as_secs_f64(),
                MAX_FRAME_DELTA.as_secs_f64()
            );
            elapsed = MAX_FRAME_DELTA;
        }

        self.step(elapsed.as_secs_f64() * FRAME_RATE as f64, rng)
    }

    /// Advances the simulation by `scale` nominal frames
    pub fn step<R: Rng + ?Sized>(&mut self, scale: f64, rng: &mut R) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.ball.x += self.ball.vx * scale;
        self.ball.y += self.ball.vy * scale;

        let top = self.ball.radius;
        let bottom = FIELD_HEIGHT - self.ball.radius;
        if self.ball.y <= top {
            self.ball.vy = self.ball.vy.abs();
            self.ball.y = top;
        } else if self.ball.y >= bottom {
            self.ball.vy = -self.ball.vy.abs();
            self.ball.y = bottom;
        }

        for player in [&mut self.left, &mut self.right].into_iter().flatten() {
            let paddle = &mut player.paddle;
            paddle.y = (paddle.y + paddle.vy * scale).clamp(0.0, FIELD_HEIGHT - PADDLE_HEIGHT);
        }

        let spans = match (&self.left, &self.right) {
            (Some(left), Some(right)) => Some((left.paddle.span(), right.paddle.span())),
            _ => None,
        };

        if let Some((left_span, right_span)) = spans {
            if self.ball.x - self.ball.radius <= PADDLE_WIDTH && covers(left_span, self.ball.y) {
                self.ball.vx = self.ball.vx.abs();
                self.ball.x = PADDLE_WIDTH + self.ball.radius;
                self.register_hit();
                outcome.paddle_hits += 1;
            }

            if self.ball.x + self.ball.radius >= FIELD_WIDTH - PADDLE_WIDTH
                && covers(right_span, self.ball.y)
            {
                self.ball.vx = -self.ball.vx.abs();
                self.ball.x = FIELD_WIDTH - PADDLE_WIDTH - self.ball.radius;
                self.register_hit();
                outcome.paddle_hits += 1;
            }
        }

        outcome.conceded = if self.ball.x < 0.0 {
            Some(PlayerSlot::Left)
        } else if self.ball.x > FIELD_WIDTH {
            Some(PlayerSlot::Right)
        } else {
            None
        };

        if let Some(side) = outcome.conceded {
            self.award_point(side.opponent());
            self.reset_ball(side, rng);
        }

        outcome
    }

    pub fn register_hit(&mut self) {
        self.hit_streak += 1;

        let multiplier = 1.0 + self.hit_streak as f64 * SPEED_STEP;
        let new_speed = (BASE_BALL_SPEED * multiplier).min(MAX_BALL_SPEED);
        let current_speed = self.ball.speed();

        if current_speed > 0.0 {
            self.ball.vx = self.ball.vx / current_speed * new_speed;
            self.ball.vy = self.ball.vy / current_speed * new_speed;
        }
    }

    fn award_point(&mut self, scorer: PlayerSlot) {
        let code = self.code.clone();
        match self.player_mut(scorer) {
            Some(player) => {
                player.paddle.score += 1;
                debug!(
                    "Match {}: player {} scores ({})",
                    code, scorer, player.paddle.score
                );
            }
            None => debug!("Match {}: point with no player {} to award", code, scorer),
        }
    }

    /// Re-centers the ball and serves it towards the side that lost the point
    pub fn reset_ball<R: Rng + ?Sized>(&mut self, toward: PlayerSlot, rng: &mut R) {
        let direction = match toward {
            PlayerSlot::Left => -1.0,
            PlayerSlot::Right => 1.0,
        };

        self.ball.x = FIELD_WIDTH / 2.0;
        self.ball.y = FIELD_HEIGHT / 2.0;
        self.ball.vx = BASE_BALL_SPEED * direction;
        self.ball.vy = BASE_BALL_SPEED * rng.gen_range(-1.0..=1.0);
        self.hit_streak = 0;
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            code: self.code.clone(),
            left_player: self.left.as_ref().map(|p| p.paddle.clone()),
            right_player: self.right.as_ref().map(|p| p.paddle.clone()),
            ball: self.ball.clone(),
            status: self.status,
            hit_streak: self.hit_streak,
            countdown: self.countdown,
        }
    }

    /// Queues `message` for everyone seated without waiting.
    ///
    /// Runs under the match lock, so nothing queued here can land after a
    /// reset that follows it. A full or closed queue drops the message.
    pub fn notify(&self, message: &ServerMessage) {
        for recipient in self.recipients() {
            if let Err(e) = recipient.peer.try_send(message.clone()) {
                warn!(
                    "Match {}: dropped message for player {}: {}",
                    self.code, recipient.slot, e
                );
            }
        }
    }

    /// Everyone currently seated, for broadcasting outside the lock
    pub fn recipients(&self) -> Vec<Recipient> {
        [
            (PlayerSlot::Left, &self.left),
            (PlayerSlot::Right, &self.right),
        ]
        .into_iter()
        .filter_map(|(slot, player)| {
            player.as_ref().map(|p| Recipient {
                slot,
                peer: p.peer.clone(),
            })
        })
        .collect()
    }
}

fn covers((top, bottom): (f64, f64), y: f64) -> bool {
    y >= top && y <= bottom
}
