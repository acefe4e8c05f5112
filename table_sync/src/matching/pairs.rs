//! Schema-wide table pairing
//!
//! Roots are matched first. A child table is only attempted once its root
//! ancestor has a match; otherwise it is reported as `parent_unmatched`
//! without running the matcher.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::matching::matcher::NameMatcher;
use crate::matching::quality::MatchQuality;
use crate::schema::types::TableInfo;

/// How a pair was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Manual,
    Exact,
    Semantic,
    Fuzzy,
    Unmatched,
    ParentUnmatched,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchMethod::Manual => "manual",
            MatchMethod::Exact => "exact",
            MatchMethod::Semantic => "semantic",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Unmatched => "unmatched",
            MatchMethod::ParentUnmatched => "parent_unmatched",
        };
        f.write_str(label)
    }
}

/// Matching outcome for one client table
#[derive(Debug, Clone, Serialize)]
pub struct TablePairResult {
    pub client: TableInfo,
    pub server: Option<TableInfo>,
    pub similarity: f64,
    pub match_method: MatchMethod,
    /// Another client table resolved to the same server table
    pub is_multiple_match: bool,
    pub quality: Option<MatchQuality>,
}

impl TablePairResult {
    pub fn matched(
        client: &TableInfo,
        server: &TableInfo,
        similarity: f64,
        match_method: MatchMethod,
        quality: MatchQuality,
    ) -> Self {
        Self {
            client: client.clone(),
            server: Some(server.clone()),
            similarity,
            match_method,
            is_multiple_match: false,
            quality: Some(quality),
        }
    }

    pub fn unmatched(client: &TableInfo, match_method: MatchMethod) -> Self {
        Self {
            client: client.clone(),
            server: None,
            similarity: 0.0,
            match_method,
            is_multiple_match: false,
            quality: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.server.is_some()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.name.as_str())
    }
}

impl NameMatcher {
    /// Pair every client table with its best server table.
    ///
    /// Returns one result per client table: roots first, then level-1 and
    /// level-2 children.
    pub fn build_pairs(&self, clients: &[TableInfo], servers: &[TableInfo]) -> Vec<TablePairResult> {
        let mut ordered: Vec<&TableInfo> = clients.iter().collect();
        ordered.sort_by_key(|t| self.classifier.classify(&t.name).level);

        let mut results = Vec::with_capacity(clients.len());
        let mut matched_roots: HashSet<String> = HashSet::new();

        for client in ordered {
            let hierarchy = self.classifier.classify(&client.name);

            if !hierarchy.level.is_root() && !matched_roots.contains(&hierarchy.root_name) {
                tracing::debug!(client = %client.name, root = %hierarchy.root_name, "Root unmatched, skipping child");
                results.push(TablePairResult::unmatched(client, MatchMethod::ParentUnmatched));
                continue;
            }

            match self.match_table(client, servers) {
                Some(pair) => {
                    if hierarchy.level.is_root() {
                        matched_roots.insert(client.name.clone());
                    }
                    results.push(pair);
                }
                None => results.push(TablePairResult::unmatched(client, MatchMethod::Unmatched)),
            }
        }

        flag_multiple_matches(&mut results);

        tracing::info!(
            clients = results.len(),
            matched = results.iter().filter(|r| r.is_matched()).count(),
            multiple = results.iter().filter(|r| r.is_multiple_match).count(),
            "Table pairing complete"
        );
        results
    }

    /// Split a scan result by side and pair it
    pub fn batch_match(&self, tables: &[TableInfo]) -> Vec<TablePairResult> {
        let (clients, servers): (Vec<TableInfo>, Vec<TableInfo>) =
            tables.iter().cloned().partition(|t| t.is_client_side);
        self.build_pairs(&clients, &servers)
    }
}

/// Flag every pair whose server table is claimed by more than one client
pub fn flag_multiple_matches(results: &mut [TablePairResult]) {
    let mut claims: HashMap<String, usize> = HashMap::new();
    for name in results.iter().filter_map(|r| r.server_name()) {
        *claims.entry(name.to_string()).or_default() += 1;
    }

    for result in results.iter_mut() {
        let claimed = result
            .server_name()
            .and_then(|name| claims.get(name))
            .copied()
            .unwrap_or(0);
        result.is_multiple_match = claimed > 1;
    }
}
