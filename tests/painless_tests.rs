mod common;

use common::{expr, schema};
use jx_lang::{BuildOptions, Builder, JxError, JxType, OpenSchema, to_painless, to_painless_filter};
use serde_json::json;

#[test]
fn test_arithmetic_is_guarded_and_boxed() {
    let se = to_painless(&expr(json!({"add": ["a", 1]})), &schema()).unwrap();
    assert_eq!(se.source, "(doc['a'].value + 1L)");
    assert_eq!(se.miss, "(doc['a'].size() == 0)");
    assert_eq!(se.ty, JxType::Integer);
    assert_eq!(
        se.script(),
        "(((doc['a'].size() == 0)) ? null : Long.valueOf((doc['a'].value + 1L)))"
    );
}

#[test]
fn test_comparison_filter() {
    assert_eq!(
        to_painless_filter(&expr(json!({"gt": {"a": 1}})), &schema()).unwrap(),
        "((!(doc['a'].size() == 0)) && (doc['a'].value > 1L))"
    );
}

#[test]
fn test_coalesce_checks_each_term_in_order() {
    let se = to_painless(&expr(json!({"coalesce": ["s", "t"]})), &schema()).unwrap();
    assert_eq!(
        se.source,
        "((doc['s'].size() == 0) ? doc['t'].value : doc['s'].value)"
    );
    assert_eq!(se.miss, "(doc['s'].size() == 0) && (doc['t'].size() == 0)");
}

#[test]
fn test_multi_valued_equality() {
    let filter = to_painless_filter(&expr(json!({"eq": {"tags": "x"}})), &schema()).unwrap();
    assert!(filter.contains("doc['tags'].stream().anyMatch(x -> x == \"x\")"));
    assert!(filter.contains("doc['tags'].size() == 0"));
}

#[test]
fn test_constants() {
    let se = to_painless(&expr(json!(true)), &schema()).unwrap();
    assert_eq!(se.source, "true");
    assert!(se.is_never_missing());

    let se = to_painless(&expr(json!({"literal": "it\"s"})), &schema()).unwrap();
    assert_eq!(se.source, "\"it\\\"s\"");

    let se = to_painless(&expr(json!("nope")), &schema()).unwrap();
    assert!(se.is_always_missing());
    assert_eq!(se.script(), "null");
}

#[test]
fn test_string_of_number_drops_trailing_zero() {
    let se = to_painless(&expr(json!({"string": "n"})), &schema()).unwrap();
    assert!(se.source.contains("String.valueOf((long)(doc['n'].value))"));
    assert_eq!(se.ty, JxType::String);
}

#[test]
fn test_string_tests() {
    let filter = to_painless_filter(&expr(json!({"prefix": {"s": "ab"}})), &schema()).unwrap();
    assert!(filter.contains("doc['s'].value.startsWith(\"ab\")"));

    let filter = to_painless_filter(&expr(json!({"regexp": {"s": "a/b.*"}})), &schema()).unwrap();
    assert!(filter.contains("/a\\/b.*/.matcher(doc['s'].value).matches()"));
}

#[test]
fn test_conditional() {
    let se = to_painless(
        &expr(json!({"when": {"gt": {"a": 1}}, "then": {"literal": "big"}, "else": {"literal": "small"}})),
        &schema(),
    )
    .unwrap();
    assert!(se.source.contains("? \"big\" : \"small\""));
    assert!(se.is_never_missing());
}

#[test]
fn test_open_schema() {
    let se = to_painless(&expr(json!("anything")), &OpenSchema).unwrap();
    assert_eq!(se.source, "doc['anything'].value");
    assert_eq!(se.ty, JxType::Object);
}

#[test]
fn test_inline_script_passes_through() {
    let builder = Builder::new(BuildOptions { allow_scripts: true });
    let e = builder.build(&json!({"script": "doc['a'].value * 2"})).unwrap();
    let se = to_painless(&e, &schema()).unwrap();
    assert_eq!(se.source, "doc['a'].value * 2");
}

#[test]
fn test_object_literal_is_unsupported() {
    let err = to_painless(&expr(json!({"literal": {"k": 1}})), &schema()).unwrap_err();
    assert!(matches!(err, JxError::Unsupported { backend: "painless", .. }));
}

#[test]
fn test_unparsable_number_is_missing() {
    let se = to_painless(&expr(json!({"number": "s"})), &schema()).unwrap();
    assert_eq!(se.source, "Double.parseDouble(doc['s'].value.trim())");
    assert!(se.miss.starts_with("((doc['s'].size() == 0)) || (!(/"));
    assert!(se.miss.ends_with(".matcher(doc['s'].value.trim()).matches()))"));

    let se = to_painless(&expr(json!({"integer": "s"})), &schema()).unwrap();
    assert!(se.source.starts_with("(long)(Double.parseDouble("));
    assert!(se.miss.contains(".matcher(doc['s'].value.trim()).matches()"));
}
