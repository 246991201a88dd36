//! # Document Filters and Updates
//!
//! Query-operator matching, update operators, projection and sorting over
//! JSON documents. Field names may be dotted paths (`address.city`,
//! `tags.0`).

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Field-level comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

impl FilterOperator {
    /// Parse an operator key such as `$gte`
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOperator::Eq,
            "$ne" => FilterOperator::Ne,
            "$gt" => FilterOperator::Gt,
            "$gte" => FilterOperator::Gte,
            "$lt" => FilterOperator::Lt,
            "$lte" => FilterOperator::Lte,
            "$in" => FilterOperator::In,
            "$nin" => FilterOperator::Nin,
            "$exists" => FilterOperator::Exists,
            _ => return None,
        })
    }

    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "$eq",
            FilterOperator::Ne => "$ne",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::In => "$in",
            FilterOperator::Nin => "$nin",
            FilterOperator::Exists => "$exists",
        }
    }

    fn test(&self, field: Option<&Value>, operand: &Value) -> Result<bool, String> {
        Ok(match self {
            FilterOperator::Eq => values_equal(field, operand),
            FilterOperator::Ne => !values_equal(field, operand),
            FilterOperator::Gt => ordered(field, operand, |o| o == Ordering::Greater),
            FilterOperator::Gte => ordered(field, operand, |o| o != Ordering::Less),
            FilterOperator::Lt => ordered(field, operand, |o| o == Ordering::Less),
            FilterOperator::Lte => ordered(field, operand, |o| o != Ordering::Greater),
            FilterOperator::In => in_list(field, operand, self)?,
            FilterOperator::Nin => !in_list(field, operand, self)?,
            FilterOperator::Exists => field.is_some() == truthy(operand),
        })
    }
}

/// Check if a document matches a filter object
pub fn matches(doc: &Value, filter: &Value) -> Result<bool, String> {
    let filter = filter
        .as_object()
        .ok_or_else(|| format!("filter must be an object, got {}", filter))?;

    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => each_clause(condition, key)?
                .into_iter()
                .map(|clause| matches(doc, clause))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .all(|m| m),
            "$or" => each_clause(condition, key)?
                .into_iter()
                .map(|clause| matches(doc, clause))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .any(|m| m),
            op if op.starts_with('$') => {
                return Err(format!("unsupported top-level operator {}", op));
            }
            field => matches_field(get_path(doc, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn each_clause<'v>(condition: &'v Value, key: &str) -> Result<Vec<&'v Value>, String> {
    condition
        .as_array()
        .map(|items| items.iter().collect())
        .ok_or_else(|| format!("{} expects an array of filters", key))
}

fn matches_field(field: Option<&Value>, condition: &Value) -> Result<bool, String> {
    match condition {
        Value::Object(ops) if is_operator_object(ops) => {
            for (key, operand) in ops {
                let op = FilterOperator::from_key(key)
                    .ok_or_else(|| format!("unsupported query operator {}", key))?;
                if !op.test(field, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        literal => Ok(values_equal(field, literal)),
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$')) && !is_date(map)
}

fn is_date(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key("$date")
}

/// Equality with array-membership semantics: a missing field equals `null`,
/// an array field equals any of its elements.
fn values_equal(field: Option<&Value>, target: &Value) -> bool {
    match field {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| scalar_equal(item, target))
        }
        Some(value) => scalar_equal(value, target),
    }
}

fn scalar_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            compare_json_values(a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

fn ordered(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match field {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_json_values(item, operand).is_some_and(&accept)),
        Some(value) => compare_json_values(value, operand).is_some_and(accept),
        None => false,
    }
}

fn in_list(field: Option<&Value>, operand: &Value, op: &FilterOperator) -> Result<bool, String> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| format!("{} expects an array", op.as_str()))?;
    Ok(candidates.iter().any(|c| values_equal(field, c)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Compare two JSON values of the same kind; `None` when they are not comparable
pub fn compare_json_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a_f = a.as_f64().unwrap_or(0.0);
            let b_f = b.as_f64().unwrap_or(0.0);
            a_f.partial_cmp(&b_f)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Object(a), Value::Object(b)) if is_date(a) && is_date(b) => {
            compare_json_values(&a["$date"], &b["$date"])
        }
        _ => None,
    }
}

/// Resolve a dotted path inside a document
pub fn get_path<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(doc, |current, seg| match current {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Set a dotted path, creating intermediate objects
pub fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), String> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut target = doc;
    for seg in parents.into_iter().flat_map(|p| p.split('.')) {
        let slot = target
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        target = slot
            .as_object_mut()
            .ok_or_else(|| format!("cannot set '{}': '{}' is not an object", path, seg))?;
    }
    target.insert(leaf.to_string(), value);
    Ok(())
}

fn remove_path(doc: &mut Map<String, Value>, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.remove(path).is_some(),
        Some((head, rest)) => doc
            .get_mut(head)
            .and_then(Value::as_object_mut)
            .is_some_and(|child| remove_path(child, rest)),
    }
}

/// Apply an update document. Returns whether the document changed.
///
/// Operators run against a copy; `doc` is only replaced when every
/// operator succeeds.
pub fn apply_update(doc: &mut Map<String, Value>, update: &Value) -> Result<bool, String> {
    let update = update
        .as_object()
        .ok_or_else(|| "update must be an object".to_string())?;
    if update.is_empty() || !update.keys().all(|k| k.starts_with('$')) {
        return Err("update document must only contain update operators".to_string());
    }

    let mut next = doc.clone();

    for (op, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| format!("{} expects an object", op))?;

        for (path, operand) in fields {
            if path == "_id" {
                return Err("the _id field is immutable".to_string());
            }
            match op.as_str() {
                "$set" => set_path(&mut next, path, operand.clone())?,
                "$unset" => {
                    remove_path(&mut next, path);
                }
                "$inc" => {
                    let current = map_get(&next, path).cloned();
                    let sum = increment(current.as_ref(), operand)
                        .ok_or_else(|| format!("$inc on non-numeric field '{}'", path))?;
                    set_path(&mut next, path, sum)?;
                }
                "$push" => {
                    let current = map_get(&next, path).cloned();
                    let mut items = match current {
                        None => Vec::new(),
                        Some(Value::Array(items)) => items,
                        Some(_) => return Err(format!("$push on non-array field '{}'", path)),
                    };
                    items.push(operand.clone());
                    set_path(&mut next, path, Value::Array(items))?;
                }
                other => return Err(format!("unsupported update operator {}", other)),
            }
        }
    }

    let changed = next != *doc;
    *doc = next;
    Ok(changed)
}

fn map_get<'m>(doc: &'m Map<String, Value>, path: &str) -> Option<&'m Value> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => doc.get(head).and_then(|v| get_path(v, rest)),
    }
}

fn increment(current: Option<&Value>, by: &Value) -> Option<Value> {
    let Value::Number(by) = by else {
        return None;
    };
    let current = match current {
        None => return Some(Value::Number(by.clone())),
        Some(Value::Number(n)) => n,
        Some(_) => return None,
    };
    match (current.as_i64(), by.as_i64()) {
        (Some(a), Some(b)) => Some(Value::from(a.checked_add(b)?)),
        _ => serde_json::Number::from_f64(current.as_f64()? + by.as_f64()?).map(Value::Number),
    }
}

/// Apply a projection (`{"name": 1}` includes, `{"secret": 0}` excludes).
/// Any truthy flag, `_id` included, makes the projection inclusive.
pub fn project(doc: &Value, projection: &Value) -> Result<Value, String> {
    let spec = projection
        .as_object()
        .ok_or_else(|| "projection must be an object".to_string())?;
    let Some(source) = doc.as_object() else {
        return Ok(doc.clone());
    };
    if spec.is_empty() {
        return Ok(doc.clone());
    }

    let inclusive = spec.values().any(truthy);

    if inclusive {
        let mut out = Map::new();
        let keep_id = spec.get("_id").map_or(true, truthy);
        if keep_id {
            if let Some(id) = source.get("_id") {
                out.insert("_id".to_string(), id.clone());
            }
        }
        for (path, flag) in spec {
            if path == "_id" || !truthy(flag) {
                continue;
            }
            if let Some(value) = get_path(doc, path) {
                set_path(&mut out, path, value.clone())?;
            }
        }
        Ok(Value::Object(out))
    } else {
        let mut out = source.clone();
        for (path, flag) in spec {
            if !truthy(flag) {
                remove_path(&mut out, path);
            }
        }
        Ok(Value::Object(out))
    }
}

/// Sort documents by a `{field: 1 | -1}` specification
pub fn sort_documents(docs: &mut [Value], spec: &Value) -> Result<(), String> {
    let spec = spec
        .as_object()
        .ok_or_else(|| "sort must be an object".to_string())?;

    let keys = spec
        .iter()
        .map(|(field, dir)| match dir.as_i64() {
            Some(1) => Ok((field.as_str(), false)),
            Some(-1) => Ok((field.as_str(), true)),
            _ => Err(format!("sort direction for '{}' must be 1 or -1", field)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let ord = sort_order(get_path(a, field), get_path(b, field));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(())
}

/// Total order across kinds: missing/null, numbers, strings, objects, arrays, booleans
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Object(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Bool(_)) => 5,
        }
    }

    match (a, b) {
        (Some(x), Some(y)) => compare_json_values(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}
