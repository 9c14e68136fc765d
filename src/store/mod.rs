//! Persistence boundary for final match results

pub mod scores;

pub use scores::{FileScoreStore, MatchResult, NullScoreStore, ScoreEntry, ScoreStore, StoreError};
