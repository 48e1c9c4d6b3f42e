mod common;

use common::{expr, schema};
use jx_lang::{JxError, split_expression_by_depth, split_expression_by_path};
use serde_json::json;

#[test]
fn test_split_by_depth() {
    let e = expr(json!({"and": [{"eq": {"a": 1}}, {"eq": {"items.x": 2}}]}));
    let split = split_expression_by_depth(&e, &schema()).unwrap();
    assert_eq!(
        split,
        vec![
            vec![expr(json!({"eq": {"a": 1}}))],
            vec![expr(json!({"eq": {"items.x": 2}}))],
        ]
    );
}

#[test]
fn test_single_depth_is_kept_whole() {
    let e = expr(json!({"or": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]}));
    let split = split_expression_by_depth(&e, &schema()).unwrap();
    assert_eq!(split, vec![vec![e]]);

    let e = expr(json!({"or": [{"eq": {"items.x": 1}}, {"eq": {"items.y": "z"}}]}));
    let split = split_expression_by_path(&e, &schema()).unwrap();
    assert_eq!(split.keys().collect::<Vec<_>>(), vec!["items"]);
}

#[test]
fn test_only_deeper_levels() {
    let e = expr(json!({"eq": {"items.x": 1}}));
    let split = split_expression_by_depth(&e, &schema()).unwrap();
    assert_eq!(split.len(), 2);
    assert!(split[0].is_empty());
    assert_eq!(split[1], vec![e]);
}

#[test]
fn test_constants_belong_to_the_root() {
    let split = split_expression_by_depth(&expr(json!(true)), &schema()).unwrap();
    assert_eq!(split, vec![vec![expr(json!(true))]]);
}

#[test]
fn test_split_by_path() {
    let e = expr(json!({"and": [
        {"eq": {"a": 1}},
        {"eq": {"items.x": 2}},
        {"prefix": {"items.y": "z"}},
        {"exists": "s"}
    ]}));
    let split = split_expression_by_path(&e, &schema()).unwrap();
    assert_eq!(split.len(), 2);
    assert_eq!(split["."].len(), 2);
    assert_eq!(split["items"].len(), 2);
}

#[test]
fn test_mixed_disjunction_is_rejected() {
    let e = expr(json!({"or": [{"eq": {"a": 1}}, {"eq": {"items.x": 2}}]}));
    assert!(matches!(
        split_expression_by_depth(&e, &schema()),
        Err(JxError::TooComplex(_))
    ));

    let e = expr(json!({"and": [
        {"eq": {"b": 1}},
        {"not": {"and": [{"eq": {"a": 1}}, {"eq": {"items.x": 2}}]}}
    ]}));
    assert!(matches!(
        split_expression_by_path(&e, &schema()),
        Err(JxError::TooComplex(_))
    ));
}
