//! In-memory game-metadata cache shared between the odds refresher, the
//! orchestrator, and the API. An explicit `Arc` handle, never a module-level
//! global.

use std::sync::Arc;

use dashmap::DashMap;

use crate::types::Game;

pub struct GameStore {
    games: DashMap<String, Game>,
}

impl GameStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { games: DashMap::new() })
    }

    pub fn add_game(&self, game: Game) {
        self.games.insert(game.id.clone(), game);
    }

    pub fn add_games(&self, games: Vec<Game>) {
        for game in games {
            self.add_game(game);
        }
    }

    pub fn get(&self, game_id: &str) -> Option<Game> {
        self.games.get(game_id).map(|g| g.clone())
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Games whose commence time is still in the future. Games without a
    /// known commence time are included; detection should not starve them.
    pub fn upcoming(&self, now_ms: i64) -> Vec<Game> {
        self.games
            .iter()
            .filter(|e| e.value().commence_time_ms.map_or(true, |t| t > now_ms))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Games whose known commence time has passed.
    pub fn started(&self, now_ms: i64) -> Vec<Game> {
        self.games
            .iter()
            .filter(|e| e.value().commence_time_ms.is_some_and(|t| t <= now_ms))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Drop games well past commence; their edges are expired and their
    /// snapshots are no longer read.
    pub fn evict_started(&self, cutoff_ms: i64) -> usize {
        let stale: Vec<String> = self
            .games
            .iter()
            .filter(|e| e.value().commence_time_ms.is_some_and(|t| t < cutoff_ms))
            .map(|e| e.key().clone())
            .collect();
        for id in &stale {
            self.games.remove(id);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: &str, commence_ms: Option<i64>) -> Game {
        Game {
            id: id.to_string(),
            sport: "basketball_nba".to_string(),
            home_team: "Home".to_string(),
            away_team: "Away".to_string(),
            commence_time_ms: commence_ms,
        }
    }

    #[test]
    fn upcoming_excludes_started_games() {
        let store = GameStore::new();
        store.add_game(game("past", Some(1_000)));
        store.add_game(game("future", Some(9_000)));
        store.add_game(game("unknown", None));

        let upcoming = store.upcoming(5_000);
        let ids: Vec<&str> = upcoming.iter().map(|g| g.id.as_str()).collect();
        assert!(ids.contains(&"future"));
        assert!(ids.contains(&"unknown"));
        assert!(!ids.contains(&"past"));
    }

    #[test]
    fn evict_started_removes_only_known_past_games() {
        let store = GameStore::new();
        store.add_game(game("past", Some(1_000)));
        store.add_game(game("unknown", None));
        assert_eq!(store.evict_started(5_000), 1);
        assert_eq!(store.game_count(), 1);
    }
}
