//! Matching scenarios over whole client/server schemas

use pretty_assertions::assert_eq;
use rstest::*;

use table_sync::matching::quality::{MatchType, QualityScorer};
use table_sync::matching::{MatchMethod, NameMatcher, OverrideMap};
use table_sync::schema::hierarchy::HierarchyClassifier;
use table_sync::schema::types::{ColumnInfo, TableInfo};

fn table(name: &str, pk: &[&str], columns: &[&str]) -> TableInfo {
    let classifier = HierarchyClassifier::default();
    let mut t = TableInfo::new(name, &classifier, classifier.has_client_prefix(name));
    for c in pk {
        t.add_column(ColumnInfo::new(c, "int").primary_key());
    }
    for c in columns {
        t.add_column(ColumnInfo::new(c, "varchar").column_type("varchar(64)"));
    }
    t
}

fn client_side(mut t: TableInfo) -> TableInfo {
    t.is_client_side = true;
    t
}

#[fixture]
fn matcher() -> NameMatcher {
    NameMatcher::new(HierarchyClassifier::default(), QualityScorer::default(), OverrideMap::new())
}

#[rstest]
fn numeric_suffix_is_a_semantic_match(matcher: NameMatcher) {
    let client = table("client_item_misc_2", &["id"], &["name", "desc"]);
    let server = table("item_misc", &["id"], &["name", "desc"]);

    let pair = matcher.match_table(&client, &[server]).expect("semantic match");
    let quality = pair.quality.expect("quality");

    assert_eq!(pair.match_method, MatchMethod::Semantic);
    assert_eq!(quality.match_type, MatchType::Semantic);
    assert_eq!(quality.common_field_count, 3);
    assert!(quality.primary_key_match);
    assert!(quality.overall_quality >= 0.95);
    assert!(quality.is_acceptable());
}

#[rstest]
fn shared_id_alone_does_not_make_a_match(matcher: NameMatcher) {
    let mut client_columns = vec!["name", "desc", "type", "level"];
    let extra: Vec<String> = (1..=15).map(|i| format!("client_stat_{}", i)).collect();
    client_columns.extend(extra.iter().map(String::as_str));
    let client = client_side(table("string_monster", &["id"], &client_columns));

    let server_extra: Vec<String> = (1..=13).map(|i| format!("server_stat_{}", i)).collect();
    let mut server_columns: Vec<&str> = vec!["grade"];
    server_columns.extend(server_extra.iter().map(String::as_str));
    let server = table("monster", &[], &["id"]);
    let server = server_columns
        .iter()
        .fold(server, |t, c| t.with_column(ColumnInfo::new(c, "int")));

    assert_eq!(client.columns.len(), 20);
    assert_eq!(server.columns.len(), 15);

    let quality = matcher
        .scorer()
        .score(&client, &server, 0.5, MatchType::Fuzzy);
    assert_eq!(quality.common_field_count, 1);
    assert!(quality.field_count_ratio < 0.2);
    assert!(quality.overall_quality < 0.45);
    assert!(!quality.is_acceptable());

    let results = matcher.build_pairs(&[client], &[server]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].match_method, MatchMethod::Unmatched);
    assert!(results[0].server.is_none());
}

#[rstest]
#[case("client_item__drop", "item_drop")]
#[case("client_item", "item__drop")]
#[case("client_item__drop__rate", "item__drop")]
#[case("client_item__drop", "item__drop__rate")]
fn tables_on_different_levels_are_never_paired(matcher: NameMatcher, #[case] client: &str, #[case] server: &str) {
    let client = table(client, &["id"], &["name"]);
    let server = table(server, &["id"], &["name"]);
    assert!(matcher.match_table(&client, &[server.clone()]).is_none());

    let mut overrides = OverrideMap::new();
    overrides.insert(client.name.as_str(), server.name.as_str()).unwrap();
    let forced = NameMatcher::new(HierarchyClassifier::default(), QualityScorer::default(), overrides);
    assert!(forced.match_table(&client, &[server]).is_none());
}

#[rstest]
#[case("client_item", "item")]
#[case("client_item__drop", "item__drop")]
#[case("client_npc__dialog__line", "npc__dialog__line")]
fn exact_names_win_with_full_quality(matcher: NameMatcher, #[case] client: &str, #[case] server: &str) {
    let client = table(client, &["id"], &["name", "desc"]);
    let decoy = table(&format!("{}s", server), &["id"], &["name", "desc"]);
    let exact = table(server, &[], &["unrelated"]);

    let pair = matcher.match_table(&client, &[decoy, exact]).unwrap();
    assert_eq!(pair.server_name(), Some(server));
    assert_eq!(pair.match_method, MatchMethod::Exact);
    assert!((pair.quality.unwrap().overall_quality - 1.0).abs() < 1e-9);
}

#[rstest]
#[case(0.0)]
#[case(0.3)]
#[case(0.7)]
#[case(1.0)]
fn overall_quality_is_monotonic_in_field_evidence(#[case] name_similarity: f64) {
    let scorer = QualityScorer::default();
    let client = table("client_skill", &["id"], &["name", "type", "level", "cooldown"]);

    let servers = [
        table("ability", &[], &["power"]),
        table("ability", &[], &["name", "power"]),
        table("ability", &[], &["name", "type", "power"]),
        table("ability", &["id"], &["name", "type", "level", "cooldown"]),
    ];

    let scores: Vec<(f64, f64)> = servers
        .iter()
        .map(|s| scorer.score(&client, s, name_similarity, MatchType::Fuzzy))
        .map(|q| (q.field_match_score, q.overall_quality))
        .collect();

    for window in scores.windows(2) {
        let (field_a, overall_a) = window[0];
        let (field_b, overall_b) = window[1];
        assert!(field_b >= field_a);
        assert!(overall_b >= overall_a);
    }
}

#[rstest]
fn full_schema_pairing(matcher: NameMatcher) {
    let clients = vec![
        table("client_item", &["id"], &["name", "desc", "grade"]),
        table("client_item__drop", &["id"], &["item_id", "rate"]),
        table("client_monsters", &["id"], &["name", "level"]),
        table("client_monsters__skill", &["id"], &["monster_id", "skill_id"]),
        table("client_zz_orphan", &["id"], &["qqq"]),
        table("client_zz_orphan__child", &["id"], &["zz_orphan_id"]),
    ];
    let servers = vec![
        table("item", &["id"], &["name", "desc", "grade"]),
        table("item__drop", &["id"], &["item_id", "rate"]),
        table("monster", &["id"], &["name", "level"]),
        table("monster__skill", &["id"], &["monster_id", "skill_id"]),
        table("unrelated__child", &["id"], &["zz_orphan_id"]),
    ];

    let results = matcher.build_pairs(&clients, &servers);
    let summary: Vec<(&str, Option<&str>, MatchMethod)> = results
        .iter()
        .map(|r| (r.client.name.as_str(), r.server_name(), r.match_method))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("client_item", Some("item"), MatchMethod::Exact),
            ("client_monsters", Some("monster"), MatchMethod::Semantic),
            ("client_zz_orphan", None, MatchMethod::Unmatched),
            ("client_item__drop", Some("item__drop"), MatchMethod::Exact),
            ("client_monsters__skill", Some("monster__skill"), MatchMethod::Semantic),
            ("client_zz_orphan__child", None, MatchMethod::ParentUnmatched),
        ]
    );
    assert!(results.iter().all(|r| !r.is_multiple_match));
}
