//! Filter clean-up.
//!
//! Works on rendered filter JSON, not on the AST: collapses redundant
//! boolean wrappers, removes double negation, drops `match_all` from
//! conjunctions and merges range bounds on the same field. Running it twice
//! gives the same result as running it once.

use serde_json::{Map, Value as Json, json};

const MAX_PASSES: usize = 4;

/// Normalize a filter in either dialect.
pub fn normalize_filter(filter: &Json) -> Json {
    let mut current = normalize_once(filter);
    for _ in 1..MAX_PASSES {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn single_entry(filter: &Json) -> Option<(&str, &Json)> {
    match filter.as_object() {
        Some(obj) if obj.len() == 1 => obj.iter().next().map(|(k, v)| (k.as_str(), v)),
        _ => None,
    }
}

fn is_match_all(filter: &Json) -> bool {
    matches!(single_entry(filter), Some(("match_all", _)))
}

fn is_match_none(filter: &Json) -> bool {
    match single_entry(filter) {
        Some(("not", inner)) => is_match_all(inner),
        Some(("bool", body)) => {
            body.as_object().is_some_and(|b| b.len() == 1)
                && list(body.get("must_not")).iter().any(is_match_all)
        }
        _ => false,
    }
}

fn list(value: Option<&Json>) -> Vec<Json> {
    match value {
        Some(Json::Array(items)) => items.clone(),
        Some(Json::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

fn normalize_once(filter: &Json) -> Json {
    match single_entry(filter) {
        Some(("bool", body)) => normalize_bool(body),
        Some(("and", items)) => normalize_and(list(Some(items))),
        Some(("or", items)) => normalize_or(list(Some(items))),
        Some(("not", inner)) => normalize_not(inner),
        Some(("nested", body)) => normalize_nested(body),
        _ => filter.clone(),
    }
}

fn dedup(items: Vec<Json>) -> Vec<Json> {
    let mut out: Vec<Json> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// The side of a range a bound key constrains. A `range` clause holds at
/// most one bound per side.
fn bound_side(key: &str) -> &str {
    match key {
        "gt" | "gte" => "lower",
        "lt" | "lte" => "upper",
        other => other,
    }
}

/// Merge `range` clauses on the same field when each adds a side the other
/// lacks.
fn merge_ranges(items: Vec<Json>) -> Vec<Json> {
    let mut out: Vec<Json> = Vec::with_capacity(items.len());
    for item in items {
        let incoming = match single_entry(&item) {
            Some(("range", body)) => body.as_object().filter(|b| b.len() == 1).and_then(|b| {
                let (field, bounds) = b.iter().next()?;
                Some((field.clone(), bounds.as_object()?.clone()))
            }),
            _ => None,
        };
        let Some((field, bounds)) = incoming else {
            out.push(item);
            continue;
        };
        let target = out.iter_mut().find_map(|existing| {
            let range = existing.get_mut("range")?.as_object_mut()?;
            if range.len() != 1 {
                return None;
            }
            let existing_bounds = range.get_mut(&field)?.as_object_mut()?;
            bounds
                .keys()
                .all(|k| existing_bounds.keys().all(|e| bound_side(e) != bound_side(k)))
                .then_some(existing_bounds)
        });
        match target {
            Some(existing_bounds) => existing_bounds.extend(bounds),
            None => out.push(item),
        }
    }
    out
}

fn normalize_bool(body: &Json) -> Json {
    let Some(obj) = body.as_object() else {
        return json!({"bool": body.clone()});
    };

    let mut filter: Vec<Json> = list(obj.get("filter"))
        .iter()
        .chain(list(obj.get("must")).iter())
        .map(normalize_once)
        .collect();
    let mut must_not = Vec::new();
    let should: Vec<Json> = list(obj.get("should")).iter().map(normalize_once).collect();
    let extra: Map<String, Json> = obj
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "filter" | "must" | "must_not" | "should"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for item in list(obj.get("must_not")).iter().map(normalize_once) {
        if is_match_all(&item) {
            return json!({"bool": {"must_not": [{"match_all": {}}]}});
        }
        // must_not(bool(must_not(x))) == x
        match single_entry(&item) {
            Some(("bool", inner))
                if inner.as_object().is_some_and(|b| b.len() == 1)
                    && list(inner.get("must_not")).len() == 1 =>
            {
                filter.extend(list(inner.get("must_not")));
            }
            _ => must_not.push(item),
        }
    }

    let mut flat = Vec::with_capacity(filter.len());
    for item in filter {
        if is_match_all(&item) {
            continue;
        }
        let pure_conjunction = single_entry(&item).and_then(|(k, inner)| {
            let inner = inner.as_object()?;
            (k == "bool" && inner.keys().all(|key| key == "filter" || key == "must_not"))
                .then_some(inner)
        });
        match pure_conjunction {
            Some(inner) => {
                flat.extend(list(inner.get("filter")));
                must_not.extend(list(inner.get("must_not")));
            }
            None => flat.push(item),
        }
    }

    if must_not.iter().any(is_match_all) {
        return json!({"bool": {"must_not": [{"match_all": {}}]}});
    }
    let flat: Vec<Json> = merge_ranges(dedup(flat))
        .into_iter()
        .filter(|f| !is_match_all(f))
        .collect();
    let must_not = dedup(must_not);

    if should.is_empty() && extra.is_empty() && must_not.is_empty() {
        match flat.len() {
            0 => return json!({"match_all": {}}),
            1 => return flat.into_iter().next().unwrap_or_else(|| json!({"match_all": {}})),
            _ => {}
        }
    }

    let mut out = Map::new();
    if !flat.is_empty() {
        out.insert("filter".to_string(), Json::Array(flat));
    }
    if !must_not.is_empty() {
        out.insert("must_not".to_string(), Json::Array(must_not));
    }
    if !should.is_empty() {
        out.insert("should".to_string(), Json::Array(should));
    }
    out.extend(extra);
    if out.is_empty() {
        return json!({"match_all": {}});
    }
    json!({"bool": out})
}

fn normalize_and(items: Vec<Json>) -> Json {
    let mut flat = Vec::with_capacity(items.len());
    for item in items.iter().map(normalize_once) {
        if is_match_all(&item) {
            continue;
        }
        if is_match_none(&item) {
            return json!({"not": {"match_all": {}}});
        }
        match single_entry(&item) {
            Some(("and", inner)) => flat.extend(list(Some(inner))),
            _ => flat.push(item),
        }
    }
    let mut flat = merge_ranges(dedup(flat));
    match flat.len() {
        0 => json!({"match_all": {}}),
        1 => flat.remove(0),
        _ => json!({"and": flat}),
    }
}

fn normalize_or(items: Vec<Json>) -> Json {
    let mut flat = Vec::with_capacity(items.len());
    for item in items.iter().map(normalize_once) {
        if is_match_none(&item) {
            continue;
        }
        if is_match_all(&item) {
            return json!({"match_all": {}});
        }
        match single_entry(&item) {
            Some(("or", inner)) => flat.extend(list(Some(inner))),
            _ => flat.push(item),
        }
    }
    let mut flat = dedup(flat);
    match flat.len() {
        0 => json!({"not": {"match_all": {}}}),
        1 => flat.remove(0),
        _ => json!({"or": flat}),
    }
}

fn normalize_not(inner: &Json) -> Json {
    let inner = normalize_once(inner);
    match single_entry(&inner) {
        Some(("not", x)) => x.clone(),
        _ => json!({"not": inner}),
    }
}

fn normalize_nested(body: &Json) -> Json {
    let Some(obj) = body.as_object() else {
        return json!({"nested": body.clone()});
    };
    let mut out = obj.clone();
    for key in ["query", "filter"] {
        if let Some(inner) = obj.get(key) {
            out.insert(key.to_string(), normalize_once(inner));
        }
    }
    json!({"nested": out})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_ranges() {
        let merged = merge_ranges(vec![
            json!({"range": {"a": {"gt": 1}}}),
            json!({"term": {"b": 2}}),
            json!({"range": {"a": {"lt": 5}}}),
        ]);
        assert_eq!(
            merged,
            vec![json!({"range": {"a": {"gt": 1, "lt": 5}}}), json!({"term": {"b": 2}})]
        );
    }

    #[test]
    fn test_conflicting_bounds_stay_apart() {
        let merged = merge_ranges(vec![
            json!({"range": {"a": {"gt": 1}}}),
            json!({"range": {"a": {"gt": 2}}}),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_strict_and_inclusive_bounds_on_one_side_stay_apart() {
        let lower = vec![
            json!({"range": {"a": {"gt": 5}}}),
            json!({"range": {"a": {"gte": 2}}}),
        ];
        assert_eq!(merge_ranges(lower.clone()), lower);

        let upper = vec![
            json!({"range": {"a": {"lte": 9}}}),
            json!({"range": {"a": {"lt": 3}}}),
        ];
        assert_eq!(merge_ranges(upper.clone()), upper);

        let merged = merge_ranges(vec![
            json!({"range": {"a": {"gte": 2}}}),
            json!({"range": {"a": {"lt": 3}}}),
            json!({"range": {"a": {"gt": 5}}}),
        ]);
        assert_eq!(
            merged,
            vec![
                json!({"range": {"a": {"gte": 2, "lt": 3}}}),
                json!({"range": {"a": {"gt": 5}}}),
            ]
        );
    }

    #[test]
    fn test_match_none_detection() {
        assert!(is_match_none(&json!({"not": {"match_all": {}}})));
        assert!(is_match_none(&json!({"bool": {"must_not": [{"match_all": {}}]}})));
        assert!(!is_match_none(&json!({"bool": {"must_not": [{"term": {"a": 1}}]}})));
    }
}
