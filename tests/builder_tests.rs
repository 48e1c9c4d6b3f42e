mod common;

use common::expr;
use jx_lang::{BuildOptions, Builder, Expr, JxError, Op, Params, Value, build, parse};
use serde_json::json;

fn build_err(clause: serde_json::Value) -> JxError {
    build(&clause).unwrap_err()
}

#[test]
fn test_simple_form_matches_full_form() {
    assert_eq!(
        expr(json!({"eq": {"a": 1}})),
        expr(json!({"eq": [{"var": "a"}, {"literal": 1}]}))
    );
    assert_eq!(
        expr(json!({"prefix": {"s": "ab"}})),
        Expr::binary(Op::Prefix, Expr::var("s"), Expr::string("ab"))
    );
}

#[test]
fn test_simple_form_with_several_fields_is_a_conjunction() {
    assert_eq!(
        expr(json!({"eq": {"a": 1, "b": 2}})),
        Expr::and(vec![
            Expr::eq(Expr::var("a"), Expr::int(1)),
            Expr::eq(Expr::var("b"), Expr::int(2)),
        ])
    );
}

#[test]
fn test_aliases() {
    assert_eq!(expr(json!({"term": {"a": 1}})), expr(json!({"eq": {"a": 1}})));
    assert_eq!(expr(json!({"minus": ["a", 1]})), expr(json!({"sub": ["a", 1]})));
    assert!(expr(json!({"terms": {"a": [1, 2]}})).is_op(Op::In));
}

#[test]
fn test_single_operand_needs_no_list() {
    assert_eq!(
        expr(json!({"exists": "a"})),
        Expr::call(Op::Exists, vec![Expr::var("a")])
    );
    assert_eq!(expr(json!({"not": true})), Expr::not(Expr::True));
}

#[test]
fn test_decorations() {
    assert_eq!(
        expr(json!({"add": ["a", 1], "default": 0})),
        Expr::call_with(
            Op::Add,
            vec![Expr::var("a"), Expr::int(1)],
            Params::with_default(Expr::int(0))
        )
    );
    let concat = expr(json!({"concat": ["a", "b"], "separator": ", "}));
    assert_eq!(concat.as_call().unwrap().separator(), ", ");
}

#[test]
fn test_when_and_case() {
    assert_eq!(
        expr(json!({"when": {"gt": {"a": 1}}, "then": "b"})),
        Expr::when(
            Expr::binary(Op::Gt, Expr::var("a"), Expr::int(1)),
            Expr::var("b"),
            Expr::Null
        )
    );

    let case = expr(json!({"case": [
        {"when": {"eq": {"a": 1}}, "then": {"literal": "one"}},
        {"literal": "other"}
    ]}));
    let call = case.as_call().unwrap();
    let (whens, default) = call.case_parts();
    assert_eq!(whens.len(), 1);
    assert_eq!(*default, Expr::string("other"));
}

#[test]
fn test_when_list_form() {
    assert_eq!(
        expr(json!({"when": ["c", 1, 2]})),
        Expr::when(Expr::var("c"), Expr::int(1), Expr::int(2))
    );
    assert_eq!(
        expr(json!({"when": ["c", 1]})),
        Expr::when(Expr::var("c"), Expr::int(1), Expr::Null)
    );
    assert!(matches!(
        build_err(json!({"when": ["c", 1, 2, 3]})),
        JxError::Arity { op: "when", got: 4, .. }
    ));
    assert!(build_err(json!({"when": ["c", 1], "then": 2})).is_malformed());
}

#[test]
fn test_case_without_default_gets_null() {
    let case = expr(json!({"case": [{"when": "c", "then": 1}]}));
    let (_, default) = case.as_call().unwrap().case_parts();
    assert_eq!(*default, Expr::Null);
}

#[test]
fn test_literal_strings_need_wrapping() {
    assert_eq!(expr(json!({"literal": "hello world"})), Expr::string("hello world"));
    assert!(build_err(json!("hello world")).is_malformed());
}

#[test]
fn test_unknown_operator() {
    match build_err(json!({"frobnicate": [1, 2]})) {
        JxError::UnknownOperator(name) => assert_eq!(name, "frobnicate"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_two_operators_in_one_clause() {
    assert!(build_err(json!({"eq": {"a": 1}, "ne": {"b": 2}})).is_malformed());
}

#[test]
fn test_unexpected_decoration() {
    assert!(build_err(json!({"eq": {"a": 1}, "default": 0})).is_malformed());
}

#[test]
fn test_arity() {
    assert!(matches!(
        build_err(json!({"sub": [1]})),
        JxError::Arity { op: "sub", got: 1, .. }
    ));
    assert!(matches!(build_err(json!({"eq": ["a"]})), JxError::Arity { .. }));
    assert!(build(&json!({"and": []})).is_ok());
}

#[test]
fn test_separator_must_be_literal() {
    assert!(matches!(
        build_err(json!({"concat": ["a", "b"], "separator": {"var": "x"}})),
        JxError::LiteralRequired { op: "concat", key: "separator" }
    ));
}

#[test]
fn test_scripts_are_opt_in() {
    let clause = json!({"script": "doc['a'].value > 1"});
    assert!(matches!(build_err(clause.clone()), JxError::ScriptsDisabled));

    let builder = Builder::new(BuildOptions { allow_scripts: true });
    let script = builder.build(&clause).unwrap();
    assert!(script.is_op(Op::Script));
    assert_eq!(
        script.as_call().unwrap().terms[0].literal_value(),
        Some(Value::String("doc['a'].value > 1".into()))
    );
}

#[test]
fn test_parse_text() {
    assert_eq!(parse(r#"{"eq": {"a": 1}}"#).unwrap(), expr(json!({"eq": {"a": 1}})));
    assert!(matches!(parse("{not json"), Err(JxError::Json(_))));
}
