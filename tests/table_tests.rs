//! Table façade types and the JSON decoding they build on (§4.5, §4.6, §8).

use fast_azure_storage::decode::json;
use fast_azure_storage::table::{ETag, UpdateMode, MAX_TOP};

#[test]
fn query_entities_top_cap_matches_the_documented_limit() {
    assert_eq!(MAX_TOP, 1000);
}

#[test]
fn update_mode_variants_are_distinct() {
    assert_ne!(UpdateMode::Replace, UpdateMode::Merge);
}

#[test]
fn etag_variants_cover_insert_or_x_replace_if_exists_and_exact_match() {
    assert_eq!(ETag::None, ETag::None);
    assert_ne!(ETag::Any, ETag::None);
    assert_ne!(ETag::Tag("W/\"abc\"".to_string()), ETag::Any);
}

#[test]
fn query_tables_decoding_is_reachable_from_the_public_surface() {
    let body = r#"{"value":[{"TableName":"Orders"},{"TableName":"Customers"}]}"#;
    let tables = json::parse_query_tables(body).unwrap();
    assert_eq!(tables, vec!["Orders".to_string(), "Customers".to_string()]);
}

#[test]
fn query_entities_decoding_preserves_arbitrary_entity_fields() {
    let body = r#"{"value":[{"PartitionKey":"jungle","RowKey":"1","Count":3}]}"#;
    let entities = json::parse_query_entities(body).unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].get("PartitionKey").unwrap().as_str(), Some("jungle"));
    assert_eq!(entities[0].get("Count").unwrap().as_i64(), Some(3));
}

#[test]
fn get_entity_decodes_a_single_object() {
    let body = r#"{"PartitionKey":"jungle","RowKey":"1"}"#;
    let entity = json::parse_entity(body).unwrap();
    assert_eq!(entity.get("RowKey").unwrap().as_str(), Some("1"));
}
