//! Client -> server table name matching
//!
//! A client table is matched against same-level server candidates by, in
//! order: manual override, exact name, semantic (normalized) name, and fuzzy
//! edit distance scored with field evidence. The first stage that produces a
//! match wins.

use std::collections::HashMap;

use crate::config::MatchingConfig;
use crate::matching::overrides::OverrideMap;
use crate::matching::pairs::{MatchMethod, TablePairResult};
use crate::matching::quality::{MatchQuality, MatchType, QualityScorer};
use crate::schema::hierarchy::HierarchyClassifier;
use crate::schema::types::TableInfo;
use crate::utils::naming::{name_similarity, normalize_table_name};

/// Matches client tables to server tables
#[derive(Debug, Clone)]
pub struct NameMatcher {
    pub(crate) classifier: HierarchyClassifier,
    scorer: QualityScorer,
    overrides: OverrideMap,
    name_bonus: HashMap<String, f64>,
}

impl NameMatcher {
    pub fn new(classifier: HierarchyClassifier, scorer: QualityScorer, overrides: OverrideMap) -> Self {
        Self {
            classifier,
            scorer,
            overrides,
            name_bonus: HashMap::new(),
        }
    }

    /// Matcher configured from the `[matching]` section
    pub fn from_config(
        config: &MatchingConfig,
        classifier: HierarchyClassifier,
        overrides: OverrideMap,
    ) -> Self {
        Self::new(classifier, QualityScorer::new(config.weights.clone()), overrides)
            .with_name_bonus(config.name_bonus.clone())
    }

    /// Boost name similarity for table families whose names contain a key
    pub fn with_name_bonus(mut self, name_bonus: HashMap<String, f64>) -> Self {
        self.name_bonus = name_bonus;
        self
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    fn bonus_for(&self, stripped_name: &str) -> f64 {
        let lowered = stripped_name.to_lowercase();
        self.name_bonus
            .iter()
            .filter(|(family, _)| lowered.contains(&family.to_lowercase()))
            .map(|(_, bonus)| *bonus)
            .fold(0.0, f64::max)
    }

    /// Find the best server match for one client table, if any
    pub fn match_table(&self, client: &TableInfo, candidates: &[TableInfo]) -> Option<TablePairResult> {
        let same_level: Vec<&TableInfo> = candidates
            .iter()
            .filter(|c| self.classifier.same_level(&client.name, &c.name))
            .collect();

        if let Some(target) = self.overrides.get(&client.name) {
            match same_level.iter().find(|c| c.name == target) {
                Some(server) => {
                    tracing::debug!(client = %client.name, server = %server.name, "Manual override");
                    return Some(TablePairResult::matched(
                        client,
                        server,
                        1.0,
                        MatchMethod::Manual,
                        MatchQuality::forced(client, server),
                    ));
                }
                None => tracing::warn!(
                    client = %client.name,
                    server = target,
                    "Override target missing or on a different level, falling back to automatic matching"
                ),
            }
        }

        let stripped = self.classifier.strip_prefix(&client.name);

        if let Some(server) = same_level
            .iter()
            .find(|c| self.classifier.strip_prefix(&c.name) == stripped)
        {
            return Some(TablePairResult::matched(
                client,
                server,
                1.0,
                MatchMethod::Exact,
                MatchQuality::forced(client, server),
            ));
        }

        let normalized = normalize_table_name(stripped);
        let floor = self.scorer.weights().semantic_similarity_floor;

        let semantic = same_level
            .iter()
            .filter(|c| normalize_table_name(self.classifier.strip_prefix(&c.name)) == normalized)
            .map(|server| {
                let raw = name_similarity(stripped, self.classifier.strip_prefix(&server.name));
                let quality = self
                    .scorer
                    .score(client, server, raw.max(floor), MatchType::Semantic);
                (*server, quality)
            })
            .max_by(|a, b| a.1.overall_quality.total_cmp(&b.1.overall_quality));

        if let Some((server, quality)) = semantic {
            return Some(TablePairResult::matched(
                client,
                server,
                quality.table_name_similarity,
                MatchMethod::Semantic,
                quality,
            ));
        }

        let bonus = self.bonus_for(stripped);
        let mut best: Option<(&TableInfo, MatchQuality)> = None;

        for server in &same_level {
            let candidate = normalize_table_name(self.classifier.strip_prefix(&server.name));
            let similarity = (name_similarity(&normalized, &candidate) + bonus).min(1.0);
            let quality = self.scorer.score(client, server, similarity, MatchType::Fuzzy);

            let better = best
                .as_ref()
                .map_or(true, |(_, q)| quality.overall_quality > q.overall_quality);
            if better {
                best = Some((*server, quality));
            }
        }

        match best {
            Some((server, quality)) if quality.is_acceptable() => Some(TablePairResult::matched(
                client,
                server,
                quality.table_name_similarity,
                MatchMethod::Fuzzy,
                quality,
            )),
            Some((server, quality)) => {
                tracing::debug!(
                    client = %client.name,
                    best = %server.name,
                    overall = quality.overall_quality,
                    field_ratio = quality.field_count_ratio,
                    "Best fuzzy candidate rejected"
                );
                None
            }
            None => None,
        }
    }
}
