//! Registry of live matches
//!
//! The registry owns every [`Match`] and is the only place matches are
//! created or destroyed. It enforces the concurrent match limit and hands
//! out short numeric codes that players share to find each other.
//!
//! The code map sits behind its own reader/writer lock. No registry
//! operation waits on a match lock while holding it, so lookups stay cheap
//! while matches are busy simulating.

use crate::engine::Match;
use crate::error::{ArenaError, Result};
use log::info;
use rand::Rng;
use shared::MATCH_CODE_WIDTH;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct MatchRegistry {
    matches: RwLock<HashMap<String, Arc<Match>>>,
    max_matches: usize,
}

impl MatchRegistry {
    pub fn new(max_matches: usize) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            max_matches,
        }
    }

    /// Creates an empty match under a fresh code.
    ///
    /// Fails with `CapacityExceeded`, leaving the registry untouched, when
    /// the maximum number of live matches is already reached.
    pub async fn create(&self) -> Result<Arc<Match>> {
        let mut matches = self.matches.write().await;

        if matches.len() >= self.max_matches {
            info!("Max matches reached ({})", self.max_matches);
            return Err(ArenaError::CapacityExceeded(self.max_matches));
        }

        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = generate_code(&mut rng);
            if !matches.contains_key(&candidate) {
                break candidate;
            }
        };

        let game = Match::new(code.clone());
        matches.insert(code, Arc::clone(&game));
        Ok(game)
    }

    pub async fn get(&self, code: &str) -> Result<Arc<Match>> {
        self.matches
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| ArenaError::NotFound(code.to_string()))
    }

    /// Tears a match down, closing the connection of anyone still in it.
    ///
    /// The forced departures run on their own task, so this returns without
    /// waiting on the match's lock. Returns false if no match had this code.
    pub async fn remove(&self, code: &str) -> bool {
        let removed = self.matches.write().await.remove(code);

        match removed {
            Some(game) => {
                tokio::spawn(async move {
                    for slot in game.occupied_slots().await {
                        game.leave(slot).await;
                    }
                });
                info!("Match {} removed", code);
                true
            }
            None => {
                info!("Attempted to remove non-existent match {}", code);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }

    pub fn max_matches(&self) -> usize {
        self.max_matches
    }
}

/// Uniformly samples a zero-padded code from the fixed-width numeric space
fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let space = 10u32.pow(MATCH_CODE_WIDTH as u32);
    format!(
        "{:0width$}",
        rng.gen_range(0..space),
        width = MATCH_CODE_WIDTH
    )
}
