mod common;

use common::{expr, schema, simplified};
use jx_lang::{Column, Expr, JxError, JxType, MemorySchema, Op};
use serde_json::json;

fn eq(name: &str, n: i64) -> Expr {
    Expr::eq(Expr::var(name), Expr::int(n))
}

#[test]
fn test_constant_folding() {
    assert_eq!(simplified(json!({"add": [1, 2]})), Expr::int(3));
    assert_eq!(simplified(json!({"eq": [1, 1]})), Expr::True);
    assert_eq!(
        simplified(json!({"gt": [{"literal": "b"}, {"literal": "a"}]})),
        Expr::True
    );
    assert_eq!(
        simplified(json!({"concat": [{"literal": "a"}, null, {"literal": "b"}], "separator": "-"})),
        Expr::string("a-b")
    );
}

#[test]
fn test_singletons_are_canonical() {
    assert!(matches!(simplified(json!({"and": [{"eq": [1, 1]}, true]})), Expr::True));
    assert!(matches!(simplified(json!({"or": []})), Expr::False));
    assert!(matches!(simplified(json!({"coalesce": [null, null]})), Expr::Null));
}

#[test]
fn test_and_flattens_and_dedups() {
    let e = simplified(json!({"and": [
        {"eq": {"a": 1}},
        {"and": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]}
    ]}));
    assert_eq!(e, Expr::and(vec![eq("a", 1), eq("b", 2)]));
}

#[test]
fn test_or_short_circuits() {
    assert_eq!(simplified(json!({"or": [{"eq": {"a": 1}}, true]})), Expr::True);
    assert_eq!(
        simplified(json!({"or": [false, null, {"eq": {"a": 1}}]})),
        eq("a", 1)
    );
}

#[test]
fn test_term_and_its_inverse() {
    assert_eq!(
        simplified(json!({"and": [{"eq": {"a": 1}}, {"not": {"eq": {"a": 1}}}]})),
        Expr::False
    );
    assert_eq!(
        simplified(json!({"or": [{"exists": "a"}, {"missing": "a"}]})),
        Expr::True
    );
}

#[test]
fn test_absorption() {
    assert_eq!(
        simplified(json!({"or": [
            {"eq": {"a": 1}},
            {"and": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]}
        ]})),
        eq("a", 1)
    );
    assert_eq!(
        simplified(json!({"and": [
            {"eq": {"a": 1}},
            {"or": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]}
        ]})),
        eq("a", 1)
    );
}

#[test]
fn test_common_conjuncts_are_factored() {
    let e = simplified(json!({"or": [
        {"and": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]},
        {"and": [{"eq": {"a": 1}}, {"eq": {"b": 3}}]}
    ]}));
    assert_eq!(
        e,
        Expr::and(vec![eq("a", 1), Expr::or(vec![eq("b", 2), eq("b", 3)])])
    );
}

#[test]
fn test_de_morgan() {
    let pushed = simplified(json!({"not": {"and": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]}}));
    let written = simplified(json!({"or": [{"ne": {"a": 1}}, {"ne": {"b": 2}}]}));
    assert_eq!(pushed, written);

    let pushed = simplified(json!({"not": {"and": [{"gt": {"a": 1}}, {"lt": {"b": 2}}]}}));
    let written = simplified(json!({"or": [{"not": {"gt": {"a": 1}}}, {"not": {"lt": {"b": 2}}}]}));
    assert_eq!(pushed, written);
}

#[test]
fn test_not_of_equality_is_inequality() {
    assert_eq!(
        simplified(json!({"not": {"eq": {"a": 1}}})),
        Expr::binary(Op::Ne, Expr::var("a"), Expr::int(1))
    );
}

#[test]
fn test_not_of_ordering_keeps_missing_rows() {
    assert_eq!(
        simplified(json!({"not": {"gt": {"a": 1}}})),
        Expr::or(vec![
            Expr::is_missing(Expr::var("a")),
            Expr::binary(Op::Lte, Expr::var("a"), Expr::int(1)),
        ])
    );
}

#[test]
fn test_not_of_ordering_on_multi_valued_field_stays_negated() {
    let e = expr(json!({"not": {"gt": {"tags": 1}}})).resolve(&schema());
    let e = e.partial_eval().unwrap();
    assert!(e.is_op(Op::Not));
}

#[test]
fn test_double_negation() {
    assert_eq!(simplified(json!({"not": {"not": {"eq": {"a": 1}}}})), eq("a", 1));
    // "a" may be missing or non-boolean, so the negations stay
    assert_eq!(
        simplified(json!({"not": {"not": "a"}})),
        Expr::not(Expr::not(Expr::var("a")))
    );
}

#[test]
fn test_eq_null_is_missing() {
    assert_eq!(
        simplified(json!({"eq": ["a", null]})),
        Expr::is_missing(Expr::var("a"))
    );
    assert_eq!(
        simplified(json!({"ne": ["a", null]})),
        Expr::is_present(Expr::var("a"))
    );
    assert_eq!(simplified(json!({"eq": ["a", "a"]})), Expr::True);
}

#[test]
fn test_literal_moves_right() {
    assert_eq!(simplified(json!({"eq": [1, "a"]})), eq("a", 1));
    assert_eq!(
        simplified(json!({"gt": [1, "a"]})),
        Expr::binary(Op::Lt, Expr::var("a"), Expr::int(1))
    );
}

#[test]
fn test_in() {
    assert_eq!(simplified(json!({"in": {"a": []}})), Expr::False);
    assert_eq!(simplified(json!({"in": {"a": [1]}})), eq("a", 1));
}

#[test]
fn test_null_items_never_match() {
    assert_eq!(simplified(json!({"in": {"a": [null]}})), Expr::False);
    assert_eq!(simplified(json!({"in": {"a": [null, 1]}})), eq("a", 1));
}

#[test]
fn test_missing_algebra() {
    assert_eq!(simplified(json!({"missing": 1})), Expr::False);
    assert_eq!(simplified(json!({"missing": null})), Expr::True);
    assert_eq!(simplified(json!({"missing": {"eq": {"a": 1}}})), Expr::False);
    assert_eq!(simplified(json!({"missing": {"add": ["a", 1], "default": 0}})), Expr::False);
    assert_eq!(
        simplified(json!({"missing": {"add": ["a", 1]}})),
        Expr::is_missing(Expr::var("a"))
    );
    assert_eq!(
        simplified(json!({"exists": {"add": ["a", 1]}})),
        Expr::is_present(Expr::var("a"))
    );
}

#[test]
fn test_coalesce_stops_at_a_constant() {
    assert_eq!(
        simplified(json!({"coalesce": ["a", 1, "b"]})),
        Expr::coalesce(vec![Expr::var("a"), Expr::int(1)])
    );
    assert_eq!(simplified(json!({"coalesce": [null, "x"]})), Expr::var("x"));
}

#[test]
fn test_coalesce_with_absent_field() {
    let schema = MemorySchema::new(vec![Column::new("x", JxType::String)]);
    let e = expr(json!({"coalesce": ["y", "x"]}))
        .resolve(&schema)
        .partial_eval()
        .unwrap();
    assert_eq!(e.as_variable().map(|v| v.name.as_str()), Some("x"));
    assert_eq!(e.jx_type(), JxType::String);
}

#[test]
fn test_when() {
    assert_eq!(
        simplified(json!({"when": true, "then": 1, "else": 2})),
        Expr::int(1)
    );
    assert_eq!(
        simplified(json!({"when": {"eq": {"a": 1}}, "then": true, "else": false})),
        eq("a", 1)
    );
    assert_eq!(
        simplified(json!({"when": "c", "then": 2, "else": 2})),
        Expr::int(2)
    );
}

#[test]
fn test_when_with_non_boolean_literal_condition() {
    let err = expr(json!({"when": {"literal": "yes"}, "then": 1, "else": 2}))
        .partial_eval()
        .unwrap_err();
    assert!(matches!(err, JxError::Type(_)));
}

#[test]
fn test_case_drops_false_branches() {
    assert_eq!(
        simplified(json!({"case": [
            {"when": false, "then": 1},
            {"when": "c", "then": 2},
            3
        ]})),
        Expr::when(Expr::var("c"), Expr::int(2), Expr::int(3))
    );
    assert_eq!(
        simplified(json!({"case": [{"when": true, "then": 1}, 3]})),
        Expr::int(1)
    );
}

#[test]
fn test_case_with_a_conditional_default() {
    let e = simplified(json!({"case": [
        {"when": "c", "then": 1},
        {"when": "d", "then": 2},
        {"when": true, "then": {"when": "e", "then": 3, "else": 4}}
    ]}));
    assert_eq!(
        e,
        expr(json!({"case": [
            {"when": "c", "then": 1},
            {"when": "d", "then": 2},
            {"when": "e", "then": 3},
            4
        ]}))
    );
}

#[test]
fn test_idempotent_and_marked() {
    let once = simplified(json!({"not": {"and": [
        {"gt": {"a": 1}},
        {"or": [{"eq": {"b": 2}}, {"prefix": {"s": "x"}}]}
    ]}}));
    assert!(once.is_simplified());
    assert_eq!(once.partial_eval().unwrap(), once);
}

#[test]
fn test_absent_fields_fold_away() {
    let e = expr(json!({"and": [{"eq": {"a": 1}}, {"gt": {"nope": 3}}]}))
        .resolve(&schema())
        .partial_eval()
        .unwrap();
    assert_eq!(e, Expr::False);
}
