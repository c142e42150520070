use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 400.0;
pub const PADDLE_WIDTH: f64 = 10.0;
pub const PADDLE_HEIGHT: f64 = 80.0;
pub const PADDLE_SPEED: f64 = 40.0;
pub const BALL_RADIUS: f64 = 5.0;
pub const BASE_BALL_SPEED: f64 = 10.0;
pub const MAX_BALL_SPEED: f64 = BASE_BALL_SPEED * 5.0;
/// Speed gained per consecutive paddle hit, as a fraction of the base speed.
pub const SPEED_STEP: f64 = 0.1;
pub const FRAME_RATE: u32 = 30;
pub const MAX_MATCHES: usize = 10;
pub const COUNTDOWN_SECONDS: u32 = 5;
pub const MATCH_CODE_WIDTH: usize = 5;

/// Which side of the field a player occupies. Left is always filled first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSlot {
    Left,
    Right,
}

impl PlayerSlot {
    /// Numeric player id used on the wire (1 = left, 2 = right)
    pub fn id(self) -> u8 {
        match self {
            PlayerSlot::Left => 1,
            PlayerSlot::Right => 2,
        }
    }

    pub fn opponent(self) -> PlayerSlot {
        match self {
            PlayerSlot::Left => PlayerSlot::Right,
            PlayerSlot::Right => PlayerSlot::Left,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Countdown,
    Playing,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Countdown => "countdown",
            MatchStatus::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// A player's paddle. `y` is the top edge of the paddle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Paddle {
    pub id: u8,
    pub y: f64,
    pub vy: f64,
    pub score: u32,
}

impl Paddle {
    pub fn new(slot: PlayerSlot) -> Self {
        Self {
            id: slot.id(),
            y: Self::centered_y(),
            vy: 0.0,
            score: 0,
        }
    }

    pub fn centered_y() -> f64 {
        FIELD_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0
    }

    /// Vertical span covered by the paddle as (top, bottom)
    pub fn span(&self) -> (f64, f64) {
        (self.y, self.y + PADDLE_HEIGHT)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
}

impl Ball {
    pub fn new() -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT / 2.0,
            vx: BASE_BALL_SPEED,
            vy: BASE_BALL_SPEED,
            radius: BALL_RADIUS,
        }
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

/// Paddle movement requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Stopped,
}

impl Direction {
    /// Paddle velocity for this direction. Screen y grows downwards.
    pub fn velocity(self) -> f64 {
        match self {
            Direction::Up => -PADDLE_SPEED,
            Direction::Down => PADDLE_SPEED,
            Direction::Stopped => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized direction {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "stopped" => Ok(Direction::Stopped),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// Full authoritative state of one match as seen by clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub code: String,
    pub left_player: Option<Paddle>,
    pub right_player: Option<Paddle>,
    pub ball: Ball,
    pub status: MatchStatus,
    pub hit_streak: u32,
    pub countdown: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerAssigned {
        #[serde(rename = "playerId")]
        player_id: u8,
        #[serde(rename = "gameState")]
        game_state: MatchSnapshot,
    },
    Countdown(u32),
    GameStart,
    GameState(MatchSnapshot),
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Messages sent by clients. The direction stays a raw string so that
/// unknown values can be reported as invalid input instead of a decode error.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Move(String),
}

impl ClientMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
