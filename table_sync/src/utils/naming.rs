//! Naming utilities for table_sync
//!
//! This module provides the name transformations shared by the classifier,
//! the matcher and the sync engine.

use inflector::Inflector;
use once_cell::sync::Lazy;
use regex::Regex;

/// Delimiter encoding parent/child nesting in table names
pub const NESTING_DELIMITER: &str = "__";

/// Numeric or version suffixes such as `_2` or `_v3`
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_v?\d+$").expect("valid regex"));

/// Suffixes that carry no identity (`item_data` is `item`)
static NOISE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(data|info|table|list)$").expect("valid regex"));

/// Strip the client prefix if present
pub fn strip_client_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return name;
    }
    name.strip_prefix(prefix).unwrap_or(name)
}

/// Normalize a (prefix-stripped) table name for semantic comparison.
///
/// Each nesting segment is lowercased, loses version and noise suffixes,
/// and is singularized.
pub fn normalize_table_name(name: &str) -> String {
    name.split(NESTING_DELIMITER)
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join(NESTING_DELIMITER)
}

fn normalize_segment(segment: &str) -> String {
    let mut current = segment.to_lowercase();

    loop {
        let stripped = VERSION_SUFFIX.replace(&current, "");
        let stripped = NOISE_SUFFIX.replace(&stripped, "").into_owned();
        if stripped == current || stripped.is_empty() {
            break;
        }
        current = stripped;
    }

    singularize_simple(&current)
}

/// Singularize the simple English plural endings found in table names
pub fn singularize_simple(word: &str) -> String {
    if word.len() > 3 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if word.len() > 3 && word.ends_with("ses") {
        word[..word.len() - 2].to_string()
    } else if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Edit distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();
    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// `1 - levenshtein / max(len)`, in `[0.0, 1.0]`
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Candidate foreign-key column names for children of `parent`, in lookup order
pub fn foreign_key_candidates(parent: &str) -> Vec<String> {
    let singular = parent.to_singular();
    let mut candidates = vec![
        format!("{}_id", parent),
        format!("{}_id", singular),
        format!("{}Id", parent.to_camel_case()),
        format!("{}Id", singular.to_camel_case()),
        "parent_id".to_string(),
        format!("{}_key", parent),
        "pid".to_string(),
    ];

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    candidates
}

/// Sanitize identifiers for SQL
pub fn sanitize_identifier(name: &str) -> String {
    let mut sanitized = name.replace(|c: char| !c.is_alphanumeric() && c != '_', "_");

    if sanitized.chars().next().map_or(false, |c| c.is_numeric()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Quote a MySQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// MySQL identifier length limit
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Truncate an identifier to fit database limits, keeping it unique via a hash
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        name.to_string()
    } else {
        // room for "_" plus 8 hash characters
        let mut keep_length = max_length.saturating_sub(9);
        while !name.is_char_boundary(keep_length) {
            keep_length -= 1;
        }
        let hash = format!("{:x}", md5::compute(name.as_bytes()));
        let prefix = &name[..keep_length];

        format!("{}_{}", prefix, &hash[0..8])
    }
}

/// Name of the backup copy taken before a destructive sync
pub fn backup_table_name(table: &str, at: chrono::DateTime<chrono::Utc>) -> String {
    let name = format!("{}_bak_{}", table, at.format("%Y%m%d%H%M%S"));
    truncate_identifier(&name, MAX_IDENTIFIER_LENGTH)
}
