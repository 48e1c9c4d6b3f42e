mod common;

use common::{eval, expr};
use jx_lang::{Expr, Op};
use serde_json::json;

fn missing(name: &str) -> Expr {
    Expr::is_missing(Expr::var(name))
}

#[test]
fn test_literals() {
    assert_eq!(Expr::Null.missing(), Expr::True);
    assert_eq!(Expr::int(0).missing(), Expr::False);
    assert_eq!(Expr::string("").missing(), Expr::False);
    assert_eq!(Expr::True.missing(), Expr::False);
    assert_eq!(Expr::False.missing(), Expr::False);
}

#[test]
fn test_boolean_operators_are_never_missing() {
    for clause in [
        json!({"and": ["a", "b"]}),
        json!({"or": ["a"]}),
        json!({"not": "a"}),
        json!({"gt": {"a": 1}}),
        json!({"exists": "a"}),
        json!({"prefix": {"s": "x"}}),
    ] {
        assert_eq!(expr(clause.clone()).missing(), Expr::False, "{}", clause);
    }
}

#[test]
fn test_arithmetic() {
    assert_eq!(
        expr(json!({"sub": ["a", "b"]})).missing(),
        Expr::or(vec![missing("a"), missing("b")])
    );
    assert_eq!(
        expr(json!({"mod": ["a", "b"]})).missing(),
        Expr::or(vec![
            missing("a"),
            missing("b"),
            Expr::eq(Expr::var("b"), Expr::int(0)),
        ])
    );
    assert_eq!(expr(json!({"mul": ["a", 2], "default": 1})).missing(), Expr::False);
    assert_eq!(
        expr(json!({"mul": ["a", 2], "default": "b"})).missing(),
        Expr::and(vec![missing("a"), missing("b")])
    );
}

#[test]
fn test_fallbacks() {
    assert_eq!(
        expr(json!({"concat": ["a", "b"]})).missing(),
        Expr::and(vec![missing("a"), missing("b")])
    );
    assert_eq!(expr(json!({"coalesce": ["a", 0]})).missing(), Expr::False);
}

#[test]
fn test_conditionals() {
    let cond = Expr::binary(Op::Gt, Expr::var("a"), Expr::int(1));
    assert_eq!(
        expr(json!({"when": {"gt": {"a": 1}}, "then": "b"})).missing(),
        Expr::or(vec![
            Expr::and(vec![cond.clone(), missing("b")]),
            Expr::not(cond),
        ])
    );
    assert_eq!(
        expr(json!({"when": "c", "then": 1, "else": 2})).missing(),
        Expr::False
    );
}

#[test]
fn test_coercions_follow_their_operand() {
    assert_eq!(expr(json!({"string": "a"})).missing(), missing("a"));
    assert_eq!(expr(json!({"length": "s"})).missing(), missing("s"));
    assert_eq!(expr(json!({"first": "a"})).missing(), missing("a"));
    assert_eq!(
        expr(json!({"left": ["s", "n"]})).missing(),
        Expr::or(vec![missing("s"), missing("n")])
    );
}

#[test]
fn test_missing_agrees_with_evaluation() {
    let clauses = [
        json!({"add": ["a", 1]}),
        json!({"div": ["a", "b"]}),
        json!({"coalesce": ["a", "b"]}),
        json!({"concat": ["a", "b"], "separator": "-"}),
        json!({"when": {"gt": {"a": 1}}, "then": "b"}),
        json!({"case": [{"when": {"eq": {"b": 0}}, "then": "a"}, "s"]}),
        json!({"string": "a"}),
        json!({"left": ["s", 2]}),
        json!({"find": ["s", {"literal": "l"}]}),
        json!({"length": "s"}),
    ];
    let docs = [
        json!({}),
        json!({"a": 2, "b": 0}),
        json!({"a": 1, "b": 3, "s": "hello"}),
        json!({"b": 2, "s": "x"}),
    ];
    for clause in &clauses {
        let e = expr(clause.clone());
        let m = e.missing();
        for doc in &docs {
            let value = eval(&e, doc).unwrap();
            let is_missing = eval(&m, doc).unwrap();
            assert_eq!(is_missing, json!(value.is_null()), "{} on {}", clause, doc);
        }
    }
}
