//! # Match Server Library
//!
//! This library hosts many concurrent two-player Pong matches. Each match
//! runs its own authoritative simulation and streams the resulting state to
//! both connected players.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns ball and paddle physics, collisions, scoring and speed
//! escalation. Clients only send movement requests and render whatever the
//! server reports.
//!
//! ### Match Lifecycle
//! Every match moves through `waiting` → `countdown` → `playing`. Filling
//! the second slot starts a five second countdown, and any departure resets
//! the match back to `waiting`, keeping the remaining player connected.
//!
//! ### State Broadcasting
//! After every simulation tick the full match state is pushed to both
//! players. Deliveries run concurrently and are bounded by a timeout, so a
//! stalled or broken connection only loses its own messages.
//!
//! ## Concurrency Model
//!
//! Each match keeps its state behind a single exclusive lock. Connection
//! tasks, the countdown task and the simulation task all go through it, and
//! the lock is never held while waiting on a delivery. Countdown and
//! simulation tasks remember the epoch they were started in; a reset moves
//! the epoch on, and stale tasks stop at their next iteration.
//!
//! The registry guards its code map with a separate reader/writer lock, so
//! looking up or creating a match never waits on a running simulation.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Plain match state and the physics step, free of any locking or timers.
//!
//! ### Engine Module (`engine`)
//! The per-match lock plus join, leave, input, countdown and simulation loop.
//!
//! ### Registry Module (`registry`)
//! Creation, lookup and teardown of matches by code, with a capacity limit.
//!
//! ### Peer Module (`peer`)
//! Per-player outbound queues and the concurrent broadcast.
//!
//! ### Network Module (`network`)
//! HTTP routes and WebSocket handling on top of `axum`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::registry::MatchRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MatchRegistry::new(shared::MAX_MATCHES));
//!     let server = Server::new("127.0.0.1:8080", registry).await?;
//!
//!     // GET /game/new creates a match, GET /ws/{code} joins it
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod game;
pub mod network;
pub mod peer;
pub mod registry;
