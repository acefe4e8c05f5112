//! Matching module for table_sync
//!
//! This module pairs client tables with server tables and scores the pairs.

pub mod matcher;
pub mod overrides;
pub mod pairs;
pub mod quality;

// Re-export key types
pub use matcher::NameMatcher;
pub use overrides::OverrideMap;
pub use pairs::{MatchMethod, TablePairResult};
pub use quality::{MatchQuality, MatchType, QualityLevel, QualityScorer, QualityWeights};
