//! Score persistence. The simulation hands a finished match's result across
//! this boundary exactly once and never reads it back during play.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ws::protocol::MatchStats;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("score file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("score serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Final standings of one match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub room_id: Uuid,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u32,
    pub winner_id: Option<Uuid>,
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: Uuid,
    pub display_name: String,
    pub is_bot: bool,
    pub kills: u32,
    pub score: u32,
    pub placement: u32,
    pub alive_time_secs: u32,
}

impl MatchResult {
    pub fn from_stats(room_id: Uuid, winner_id: Option<Uuid>, stats: &MatchStats) -> Self {
        Self {
            room_id,
            ended_at: Utc::now(),
            duration_secs: stats.duration_secs,
            winner_id,
            scores: stats
                .placements
                .iter()
                .map(|p| ScoreEntry {
                    player_id: p.player_id,
                    display_name: p.display_name.clone(),
                    is_bot: p.is_bot,
                    kills: p.kills,
                    score: p.score,
                    placement: p.placement,
                    alive_time_secs: p.alive_time_secs,
                })
                .collect(),
        }
    }
}

/// Where final scores go
pub trait ScoreStore: Send + Sync {
    fn record_match(&self, result: &MatchResult) -> Result<(), StoreError>;
}

/// Appends one JSON line per match
pub struct FileScoreStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileScoreStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }
}

impl ScoreStore for FileScoreStore {
    fn record_match(&self, result: &MatchResult) -> Result<(), StoreError> {
        let line = serde_json::to_string(result)?;
        let _guard = self.guard.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Discards results; used when no score file is configured
pub struct NullScoreStore;

impl ScoreStore for NullScoreStore {
    fn record_match(&self, _result: &MatchResult) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::CombatantResult;

    fn sample_stats(winner: Uuid) -> MatchStats {
        MatchStats {
            duration_secs: 95,
            total_combatants: 2,
            placements: vec![
                CombatantResult {
                    player_id: winner,
                    display_name: "Talon".to_string(),
                    is_bot: true,
                    kills: 1,
                    score: 0,
                    placement: 1,
                    alive_time_secs: 95,
                },
                CombatantResult {
                    player_id: Uuid::new_v4(),
                    display_name: "human".to_string(),
                    is_bot: false,
                    kills: 0,
                    score: 0,
                    placement: 2,
                    alive_time_secs: 40,
                },
            ],
        }
    }

    #[test]
    fn file_store_appends_parseable_json_lines() {
        let path = std::env::temp_dir().join(format!("arena-scores-{}.jsonl", Uuid::new_v4()));
        let store = FileScoreStore::new(path.clone());

        let winner = Uuid::new_v4();
        let room_id = Uuid::new_v4();
        let result = MatchResult::from_stats(room_id, Some(winner), &sample_stats(winner));
        store.record_match(&result).unwrap();
        store.record_match(&result).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: MatchResult = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.room_id, room_id);
            assert_eq!(parsed.winner_id, Some(winner));
            assert_eq!(parsed.scores.len(), 2);
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn null_store_accepts_everything() {
        let winner = Uuid::new_v4();
        let result = MatchResult::from_stats(Uuid::new_v4(), Some(winner), &sample_stats(winner));
        assert!(NullScoreStore.record_match(&result).is_ok());
    }
}
