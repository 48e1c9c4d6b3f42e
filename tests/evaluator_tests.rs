mod common;

use common::{eval, eval_json, expr};
use jx_lang::{BuildOptions, Builder};
use serde_json::json;

#[test]
fn test_variable_paths() {
    let doc = json!({"a": {"b": {"c": 5}}, "list": [{"x": 1}, {"x": 2}]});
    assert_eq!(eval_json(json!("a.b.c"), doc.clone()), json!(5));
    assert_eq!(eval_json(json!("a.nope"), doc.clone()), json!(null));
    assert_eq!(eval_json(json!("list.x"), doc), json!([1, 2]));
}

#[test]
fn test_arithmetic() {
    let doc = json!({"a": 41, "f": 1.5});
    assert_eq!(eval_json(json!({"add": ["a", 1]}), doc.clone()), json!(42));
    assert_eq!(eval_json(json!({"mul": ["a", "f"]}), doc.clone()), json!(61.5));
    assert_eq!(eval_json(json!({"sub": ["a", 1]}), doc.clone()), json!(40));
    assert_eq!(eval_json(json!({"mod": ["a", 5]}), doc), json!(1));
}

#[test]
fn test_arithmetic_on_missing_is_null() {
    assert_eq!(eval_json(json!({"add": ["a", 1]}), json!({})), json!(null));
    assert_eq!(
        eval_json(json!({"add": ["a", 1], "default": 0}), json!({})),
        json!(0)
    );
    assert_eq!(eval_json(json!({"div": ["a", 0]}), json!({"a": 3})), json!(null));
}

#[test]
fn test_equality_is_total() {
    assert_eq!(eval_json(json!({"eq": ["a", "b"]}), json!({})), json!(true));
    assert_eq!(eval_json(json!({"eq": {"a": 1}}), json!({})), json!(false));
    assert_eq!(eval_json(json!({"ne": {"a": 1}}), json!({})), json!(true));
    assert_eq!(eval_json(json!({"eq": {"a": 1}}), json!({"a": 1.0})), json!(true));
}

#[test]
fn test_ordering_is_false_when_missing() {
    assert_eq!(eval_json(json!({"gt": {"a": 1}}), json!({})), json!(false));
    assert_eq!(eval_json(json!({"lte": {"a": 1}}), json!({})), json!(false));
    assert_eq!(eval_json(json!({"not": {"gt": {"a": 1}}}), json!({})), json!(true));
    assert_eq!(
        eval_json(json!({"gt": {"s": "abc"}}), json!({"s": "abd"})),
        json!(true)
    );
}

#[test]
fn test_multi_valued_fields() {
    let doc = json!({"tags": ["x", "y"]});
    assert_eq!(eval_json(json!({"eq": {"tags": "y"}}), doc.clone()), json!(true));
    assert_eq!(eval_json(json!({"in": {"tags": ["z", "x"]}}), doc.clone()), json!(true));
    assert_eq!(eval_json(json!({"prefix": {"tags": "y"}}), doc.clone()), json!(true));
    assert_eq!(eval_json(json!({"first": "tags"}), doc), json!("x"));
}

#[test]
fn test_boolean_operators_are_never_missing() {
    assert_eq!(eval_json(json!({"and": ["a", "b"]}), json!({})), json!(false));
    assert_eq!(eval_json(json!({"or": ["a", "b"]}), json!({"b": "x"})), json!(true));
    assert_eq!(eval_json(json!({"not": "a"}), json!({})), json!(true));
    assert_eq!(eval_json(json!({"and": []}), json!({})), json!(true));
}

#[test]
fn test_coalesce_and_conditionals() {
    let doc = json!({"b": 2, "c": true});
    assert_eq!(eval_json(json!({"coalesce": ["a", "b", 3]}), doc.clone()), json!(2));
    assert_eq!(
        eval_json(json!({"when": "c", "then": {"literal": "yes"}, "else": {"literal": "no"}}), doc.clone()),
        json!("yes")
    );
    assert_eq!(
        eval_json(json!({"when": {"exists": "a"}, "then": 1}), doc.clone()),
        json!(null)
    );
    let case = json!({"case": [
        {"when": {"eq": {"b": 1}}, "then": {"literal": "one"}},
        {"when": {"eq": {"b": 2}}, "then": {"literal": "two"}},
        {"literal": "many"}
    ]});
    assert_eq!(eval_json(case, doc), json!("two"));
}

#[test]
fn test_concat() {
    let doc = json!({"a": "x", "c": "z", "n": 7.0});
    assert_eq!(
        eval_json(json!({"concat": ["a", "b", "c"], "separator": "-"}), doc.clone()),
        json!("x-z")
    );
    assert_eq!(eval_json(json!({"concat": ["a", "n"]}), doc.clone()), json!("x7"));
    assert_eq!(eval_json(json!({"concat": ["b"]}), doc.clone()), json!(null));
    assert_eq!(
        eval_json(json!({"concat": ["b"], "default": {"literal": "-"}}), doc),
        json!("-")
    );
}

#[test]
fn test_string_functions() {
    let doc = json!({"s": "hello"});
    assert_eq!(eval_json(json!({"length": "s"}), doc.clone()), json!(5));
    assert_eq!(eval_json(json!({"left": ["s", 2]}), doc.clone()), json!("he"));
    assert_eq!(eval_json(json!({"right": ["s", 2]}), doc.clone()), json!("lo"));
    assert_eq!(eval_json(json!({"left": ["s", 99]}), doc.clone()), json!("hello"));
    assert_eq!(eval_json(json!({"substring": ["s", 1, 3]}), doc.clone()), json!("el"));
    assert_eq!(eval_json(json!({"substring": ["s", 3]}), doc.clone()), json!("lo"));
    assert_eq!(
        eval_json(json!({"find": ["s", {"literal": "l"}]}), doc.clone()),
        json!(2)
    );
    assert_eq!(
        eval_json(json!({"find": ["s", {"literal": "l"}], "start": 3}), doc.clone()),
        json!(3)
    );
    assert_eq!(
        eval_json(json!({"find": ["s", {"literal": "z"}]}), doc.clone()),
        json!(null)
    );
    assert_eq!(
        eval_json(json!({"find": ["s", {"literal": "z"}], "default": -1}), doc.clone()),
        json!(-1)
    );
    assert_eq!(eval_json(json!({"suffix": {"s": "llo"}}), doc), json!(true));
}

#[test]
fn test_regexp_matches_whole_string() {
    let doc = json!({"s": "hello"});
    assert_eq!(eval_json(json!({"regexp": {"s": "h.*o"}}), doc.clone()), json!(true));
    assert_eq!(eval_json(json!({"regexp": {"s": "ell"}}), doc), json!(false));
}

#[test]
fn test_coercions() {
    let doc = json!({"n": 7.0, "f": 2.5, "s": "12", "flag": "TRUE"});
    assert_eq!(eval_json(json!({"string": "n"}), doc.clone()), json!("7"));
    assert_eq!(eval_json(json!({"string": "f"}), doc.clone()), json!("2.5"));
    assert_eq!(eval_json(json!({"number": "s"}), doc.clone()), json!(12.0));
    assert_eq!(eval_json(json!({"integer": "f"}), doc.clone()), json!(2));
    assert_eq!(eval_json(json!({"boolean": "flag"}), doc.clone()), json!(true));
    assert_eq!(eval_json(json!({"string": "missing"}), doc), json!(null));
}

#[test]
fn test_script_cannot_be_evaluated() {
    let builder = Builder::new(BuildOptions { allow_scripts: true });
    let script = builder.build(&json!({"script": "1 + 1"})).unwrap();
    assert!(eval(&script, &json!({})).is_err());
}

#[test]
fn test_partial_eval_agrees_with_evaluation() {
    let clauses = [
        json!({"not": {"gt": {"a": 1}}}),
        json!({"not": {"and": [{"eq": {"a": 1}}, {"lt": {"b": 3}}]}}),
        json!({"or": [
            {"and": [{"eq": {"a": 1}}, {"eq": {"b": 2}}]},
            {"and": [{"eq": {"a": 1}}, {"eq": {"b": 3}}]}
        ]}),
        json!({"coalesce": ["a", "b", 7]}),
        json!({"add": ["a", "b"], "default": 0}),
        json!({"when": {"gt": {"a": 1}}, "then": true, "else": {"eq": {"b": 2}}}),
        json!({"not": {"when": {"exists": "a"}, "then": {"eq": {"b": 2}}, "else": false}}),
        json!({"ne": ["a", null]}),
        json!({"in": {"a": [1]}}),
        json!({"eq": [2, "b"]}),
    ];
    let docs = [
        json!({}),
        json!({"a": 1}),
        json!({"a": 2, "b": 2}),
        json!({"a": 1, "b": 3}),
        json!({"b": 2}),
    ];
    for clause in &clauses {
        let original = expr(clause.clone());
        let simplified = original.partial_eval().unwrap();
        for doc in &docs {
            assert_eq!(
                eval(&original, doc),
                eval(&simplified, doc),
                "{} on {}",
                clause,
                doc
            );
        }
    }
}
