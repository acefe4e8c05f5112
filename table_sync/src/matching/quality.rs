//! Match quality scoring
//!
//! Combines name similarity with field-level evidence into one composite
//! score and an accept/reject verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::compare::compare_fields;
use crate::schema::types::TableInfo;

/// Column names that identify the game-data domain
pub const CORE_FIELDS: &[&str] = &[
    "id",
    "name",
    "desc",
    "description",
    "type",
    "level",
    "grade",
    "name_id",
];

/// Scoring weights and acceptance thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub name_weight: f64,
    pub field_weight: f64,
    pub core_field_weight: f64,
    pub field_count_weight: f64,
    pub primary_key_weight: f64,
    /// Fuzzy matches below this overall quality are rejected
    pub min_overall_quality: f64,
    /// Fuzzy matches sharing fewer fields than this ratio are rejected
    pub min_field_count_ratio: f64,
    /// Lowest name similarity reported for a semantic match
    pub semantic_similarity_floor: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            name_weight: 0.6,
            field_weight: 0.4,
            core_field_weight: 0.5,
            field_count_weight: 0.3,
            primary_key_weight: 0.2,
            min_overall_quality: 0.45,
            min_field_count_ratio: 0.20,
            semantic_similarity_floor: 0.95,
        }
    }
}

/// How a pair was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Semantic,
    Fuzzy,
}

/// Reporting buckets for overall quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    VeryLow,
    Low,
    Medium,
    Good,
    Excellent,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            QualityLevel::Excellent
        } else if score >= 0.70 {
            QualityLevel::Good
        } else if score >= 0.55 {
            QualityLevel::Medium
        } else if score >= 0.40 {
            QualityLevel::Low
        } else {
            QualityLevel::VeryLow
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Medium => "medium",
            QualityLevel::Low => "low",
            QualityLevel::VeryLow => "very low",
        };
        f.write_str(label)
    }
}

/// Composite quality of one candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuality {
    pub table_name_similarity: f64,
    pub field_match_score: f64,
    pub overall_quality: f64,
    pub match_type: MatchType,
    pub common_field_count: usize,
    pub core_field_count: usize,
    pub client_field_count: usize,
    pub server_field_count: usize,
    pub client_only_count: usize,
    pub server_only_count: usize,
    pub core_field_ratio: f64,
    pub field_count_ratio: f64,
    pub primary_key_match: bool,
    acceptable: bool,
}

impl MatchQuality {
    /// Quality forced to 1.0, for manual mappings and exact name matches
    pub fn forced(client: &TableInfo, server: &TableInfo) -> Self {
        let fields = compare_fields(client, server);
        Self {
            table_name_similarity: 1.0,
            field_match_score: 1.0,
            overall_quality: 1.0,
            match_type: MatchType::Exact,
            common_field_count: fields.common.len(),
            core_field_count: count_core(fields.common.iter().map(|f| f.name.as_str())),
            client_field_count: client.columns.len(),
            server_field_count: server.columns.len(),
            client_only_count: fields.left_only.len(),
            server_only_count: fields.right_only.len(),
            core_field_ratio: 1.0,
            field_count_ratio: 1.0,
            primary_key_match: primary_keys_agree(client, server),
            acceptable: true,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.acceptable
    }

    pub fn quality_level(&self) -> QualityLevel {
        QualityLevel::from_score(self.overall_quality)
    }
}

/// Scores candidate pairs
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// `name_weight * name + field_weight * field`
    pub fn overall(&self, name_similarity: f64, field_match_score: f64) -> f64 {
        self.weights.name_weight * name_similarity + self.weights.field_weight * field_match_score
    }

    /// Score a pair from its name similarity and field evidence
    pub fn score(
        &self,
        client: &TableInfo,
        server: &TableInfo,
        name_similarity: f64,
        match_type: MatchType,
    ) -> MatchQuality {
        let fields = compare_fields(client, server);
        let common = fields.common.len();

        let core_common = count_core(fields.common.iter().map(|f| f.name.as_str()));
        let core_seen = count_core(
            client
                .columns
                .iter()
                .chain(fields.right_only.iter())
                .map(|c| c.name.as_str()),
        );
        let core_field_ratio = ratio(core_common, core_seen);

        let largest = client.columns.len().max(server.columns.len());
        let field_count_ratio = ratio(common, largest);

        let primary_key_match = primary_keys_agree(client, server);
        let pk_score = if primary_key_match { 1.0 } else { 0.0 };

        let w = &self.weights;
        let field_match_score = w.core_field_weight * core_field_ratio
            + w.field_count_weight * field_count_ratio
            + w.primary_key_weight * pk_score;
        let overall_quality = self.overall(name_similarity, field_match_score);

        let acceptable = match match_type {
            MatchType::Exact | MatchType::Semantic => true,
            MatchType::Fuzzy => {
                overall_quality >= w.min_overall_quality
                    && field_count_ratio >= w.min_field_count_ratio
            }
        };

        MatchQuality {
            table_name_similarity: name_similarity,
            field_match_score,
            overall_quality,
            match_type,
            common_field_count: common,
            core_field_count: core_common,
            client_field_count: client.columns.len(),
            server_field_count: server.columns.len(),
            client_only_count: fields.left_only.len(),
            server_only_count: fields.right_only.len(),
            core_field_ratio,
            field_count_ratio,
            primary_key_match,
            acceptable,
        }
    }
}

/// Both key lists non-empty and identical
pub fn primary_keys_agree(client: &TableInfo, server: &TableInfo) -> bool {
    let a = client.primary_key();
    !a.is_empty() && a == server.primary_key()
}

fn count_core<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names
        .filter(|n| CORE_FIELDS.contains(&n.to_lowercase().as_str()))
        .count()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::hierarchy::HierarchyClassifier;
    use crate::schema::types::ColumnInfo;

    fn table(name: &str, pk: &[&str], columns: &[&str]) -> TableInfo {
        let classifier = HierarchyClassifier::default();
        let mut t = TableInfo::new(name, &classifier, false);
        for c in pk {
            t.add_column(ColumnInfo::new(c, "int").primary_key());
        }
        for c in columns {
            t.add_column(ColumnInfo::new(c, "varchar"));
        }
        t
    }

    #[test]
    fn identical_tables_score_full_field_evidence() {
        let client = table("client_item", &["id"], &["name", "desc"]);
        let server = table("item", &["id"], &["name", "desc"]);

        let q = QualityScorer::default().score(&client, &server, 1.0, MatchType::Exact);

        assert!((q.field_match_score - 1.0).abs() < 1e-9);
        assert!((q.overall_quality - 1.0).abs() < 1e-9);
        assert_eq!(q.core_field_count, 3);
        assert!(q.primary_key_match);
        assert_eq!(q.quality_level(), QualityLevel::Excellent);
    }

    #[test]
    fn fuzzy_needs_both_thresholds() {
        // same fields, weak name: field evidence carries it
        let client = table("client_abc", &["id"], &["name", "grade"]);
        let server = table("xyz", &["id"], &["name", "grade"]);
        let q = QualityScorer::default().score(&client, &server, 0.0, MatchType::Fuzzy);
        assert!((q.overall_quality - 0.4).abs() < 1e-9);
        assert!(!q.is_acceptable());

        let q = QualityScorer::default().score(&client, &server, 0.2, MatchType::Fuzzy);
        assert!(q.overall_quality >= 0.45);
        assert!(q.is_acceptable());
    }

    #[test]
    fn low_field_ratio_rejects_even_with_good_name() {
        let client = table("client_monster", &["id"], &["a", "b", "c", "d", "e", "f", "g", "h", "i"]);
        let server = table("monster", &[], &["id", "s1", "s2"]);
        let q = QualityScorer::default().score(&client, &server, 0.9, MatchType::Fuzzy);

        assert!(q.overall_quality >= 0.45);
        assert!(q.field_count_ratio < 0.2);
        assert!(!q.is_acceptable());
    }

    #[test]
    fn semantic_and_exact_always_acceptable() {
        let client = table("client_a", &[], &["x"]);
        let server = table("a", &[], &["y"]);
        let scorer = QualityScorer::default();
        assert!(scorer.score(&client, &server, 0.1, MatchType::Semantic).is_acceptable());
        assert!(scorer.score(&client, &server, 0.1, MatchType::Exact).is_acceptable());
    }

    #[test]
    fn primary_keys_must_be_non_empty() {
        let a = table("a", &[], &["x"]);
        let b = table("b", &[], &["x"]);
        assert!(!primary_keys_agree(&a, &b));
        assert!(!primary_keys_agree(&table("a", &["id"], &[]), &table("b", &["code"], &[])));
    }

    #[test]
    fn quality_buckets() {
        assert_eq!(QualityLevel::from_score(0.85), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(0.7), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(0.6), QualityLevel::Medium);
        assert_eq!(QualityLevel::from_score(0.4), QualityLevel::Low);
        assert_eq!(QualityLevel::from_score(0.1), QualityLevel::VeryLow);
    }

    #[test]
    fn synthetic_weights() {
        let weights = QualityWeights {
            name_weight: 1.0,
            field_weight: 0.0,
            ..QualityWeights::default()
        };
        let scorer = QualityScorer::new(weights);
        assert!((scorer.overall(0.3, 1.0) - 0.3).abs() < 1e-9);
    }
}
