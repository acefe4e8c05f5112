//! Table hierarchy classification
//!
//! Table names encode nesting with a double underscore: `item` is a root,
//! `item__drop` a level-1 child of `item`, `item__drop__rate` a level-2 child
//! of `item__drop`. Client tables carry an extra prefix that is ignored when
//! computing the level, so `client_item__drop` and `item__drop` always land on
//! the same level.

use serde::{Deserialize, Serialize};

use crate::utils::naming::{strip_client_prefix, NESTING_DELIMITER};

/// Prefix marking client-side tables unless configured otherwise
pub const DEFAULT_CLIENT_PREFIX: &str = "client_";

/// Structural depth of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HierarchyLevel {
    Root,
    Level1,
    Level2,
}

impl HierarchyLevel {
    pub fn is_root(self) -> bool {
        self == HierarchyLevel::Root
    }
}

/// Level and parent linkage derived from a table name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub level: HierarchyLevel,
    /// Direct parent, with the client prefix re-attached. `None` for roots.
    pub parent_name: Option<String>,
    /// Prefix-stripped name after the root segment; empty for roots
    pub child_suffix: String,
    /// Root ancestor, with the client prefix re-attached
    pub root_name: String,
}

/// Classifies table names into hierarchy levels
#[derive(Debug, Clone)]
pub struct HierarchyClassifier {
    client_prefix: String,
}

impl Default for HierarchyClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_PREFIX)
    }
}

impl HierarchyClassifier {
    pub fn new(client_prefix: impl Into<String>) -> Self {
        Self {
            client_prefix: client_prefix.into(),
        }
    }

    pub fn client_prefix(&self) -> &str {
        &self.client_prefix
    }

    /// Name without the client prefix
    pub fn strip_prefix<'a>(&self, table_name: &'a str) -> &'a str {
        strip_client_prefix(table_name, &self.client_prefix)
    }

    /// True if the name carries the client prefix
    pub fn has_client_prefix(&self, table_name: &str) -> bool {
        !self.client_prefix.is_empty() && table_name.starts_with(&self.client_prefix)
    }

    /// Derive level and parent linkage. Total and pure.
    pub fn classify(&self, table_name: &str) -> Hierarchy {
        let stripped = self.strip_prefix(table_name);
        let prefix = &table_name[..table_name.len() - stripped.len()];
        let delimiters: Vec<usize> = stripped
            .match_indices(NESTING_DELIMITER)
            .map(|(idx, _)| idx)
            .collect();

        match delimiters.as_slice() {
            [] => Hierarchy {
                level: HierarchyLevel::Root,
                parent_name: None,
                child_suffix: String::new(),
                root_name: table_name.to_string(),
            },
            [first] => {
                let root = format!("{}{}", prefix, &stripped[..*first]);
                Hierarchy {
                    level: HierarchyLevel::Level1,
                    parent_name: Some(root.clone()),
                    child_suffix: stripped[first + NESTING_DELIMITER.len()..].to_string(),
                    root_name: root,
                }
            }
            [first, second, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(
                        table = table_name,
                        depth = delimiters.len(),
                        "Nesting deeper than two levels, classifying as level 2"
                    );
                }
                Hierarchy {
                    level: HierarchyLevel::Level2,
                    parent_name: Some(format!("{}{}", prefix, &stripped[..*second])),
                    child_suffix: stripped[first + NESTING_DELIMITER.len()..].to_string(),
                    root_name: format!("{}{}", prefix, &stripped[..*first]),
                }
            }
        }
    }

    /// The only gate deciding whether two tables may ever be paired
    pub fn same_level(&self, a: &str, b: &str) -> bool {
        self.classify(a).level == self.classify(b).level
    }
}
