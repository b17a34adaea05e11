// Operator Bodies
// One function per registered operator. Contracts:
//
// - The runtime has already short-circuited an AbsorbingNone context, so
//   handlers see a real value.
// - A positional argument that evaluates to AbsorbingNone absorbs the whole
//   call, except where the operator iterates: filter, select, and
//   grouped_filter skip per-element AbsorbingNone instead of aborting, and
//   the lowest family skips elements whose key is missing.
// - Wrong context kinds raise a type error carrying the operator name and
//   the step's byte offset; type errors are never swallowed.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::chain::{Chain, Span};
use crate::errors::QueryError;
use crate::runtime::Evaluator;
use crate::value::{GroupKey, ObjectGrouping, Sao, Value};

fn type_error(
    operator: &'static str,
    expected: &'static str,
    got: &Value,
    span: Span,
) -> QueryError {
    QueryError::Type {
        operator,
        expected,
        got: got.kind_name().to_string(),
        offset: span.start,
    }
}

/// Compact one-line description for disagreement errors.
fn describe(value: &Value) -> String {
    let text = match value {
        Value::Object(sao) => sao.handle(),
        other => other.to_display_json().to_string(),
    };
    match text.char_indices().nth(60) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Field access and link traversal

pub(crate) fn get_field(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let name_value = ev.eval_chain(&args[0], ctx.clone())?;
    if name_value.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    let name = match name_value {
        Value::Str(name) => name,
        other => return Err(type_error("get_field", "string field name", &other, span)),
    };

    match ctx {
        Value::Object(sao) => field_of(ev, &sao, &name),
        Value::Objects(objects) => {
            let mut out = Vec::with_capacity(objects.len());
            for sao in &objects {
                let value = field_of(ev, sao, &name)?;
                if !value.is_absorbing() {
                    out.push(value);
                }
            }
            Ok(Value::List(out))
        }
        Value::Map(map) => Ok(map.get(&name).cloned().unwrap_or(Value::AbsorbingNone)),
        other => Err(type_error(
            "get_field",
            "object, object list, or map",
            &other,
            span,
        )),
    }
}

fn field_of(ev: &mut Evaluator, sao: &Arc<Sao>, name: &str) -> Result<Value, QueryError> {
    if let Some(reserved) = sao.reserved_field(name) {
        return Ok(reserved);
    }
    match sao.field(name) {
        None => Ok(Value::AbsorbingNone),
        Some(value) => {
            if let Some(link) = value.as_link() {
                let query = link.query.to_string();
                ev.resolve_link(&query)
            } else {
                Ok(value.clone())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering and projection

pub(crate) fn filter(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let objects = match ctx {
        Value::Objects(objects) => objects,
        other => return Err(type_error("filter", "object list", &other, span)),
    };
    let kept = apply_filter(ev, objects, &args[0], span)?;
    Ok(Value::Objects(kept))
}

/// Shared by `filter` and the optimizer's residual-predicate path.
pub(crate) fn apply_filter(
    ev: &mut Evaluator,
    objects: Vec<Arc<Sao>>,
    predicate: &Chain,
    span: Span,
) -> Result<Vec<Arc<Sao>>, QueryError> {
    let mut kept = Vec::new();
    for sao in objects {
        let verdict = ev.eval_chain(predicate, Value::Object(sao.clone()))?;
        match verdict {
            Value::Bool(true) => kept.push(sao),
            // A missing field silently removes the object from results.
            Value::Bool(false) | Value::AbsorbingNone => {}
            other => {
                return Err(type_error(
                    "filter",
                    "boolean predicate result",
                    &other,
                    span,
                ))
            }
        }
    }
    Ok(kept)
}

pub(crate) fn select(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    for arg in args {
        if arg.field_name_at(0).is_none() {
            return Err(type_error(
                "select",
                "field-access argument chains",
                &Value::Chain(arg.clone()),
                span,
            ));
        }
    }
    match ctx {
        Value::Object(sao) => Ok(Value::Object(Arc::new(project(ev, &sao, args)?))),
        Value::Objects(objects) => {
            let mut out = Vec::with_capacity(objects.len());
            for sao in &objects {
                out.push(Arc::new(project(ev, sao, args)?));
            }
            Ok(Value::Objects(out))
        }
        other => Err(type_error("select", "object or object list", &other, span)),
    }
}

/// A projected copy keeps the reserved identity plus only the selected
/// fields; a selection that comes back missing is simply omitted.
fn project(ev: &mut Evaluator, sao: &Arc<Sao>, args: &[Chain]) -> Result<Sao, QueryError> {
    let mut fields = IndexMap::with_capacity(args.len());
    for arg in args {
        let name = arg
            .field_name_at(0)
            .expect("select validated argument shapes")
            .to_string();
        let value = ev.eval_chain(arg, Value::Object(sao.clone()))?;
        if !value.is_absorbing() {
            fields.insert(name, value);
        }
    }
    Ok(sao.with_fields(fields))
}

// ---------------------------------------------------------------------------
// Scalars and logic

pub(crate) fn count(
    _ev: &mut Evaluator,
    ctx: Value,
    _args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    match ctx {
        Value::Objects(objects) => Ok(Value::Int(objects.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(type_error("count", "object list or list", &other, span)),
    }
}

pub(crate) fn equals(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    _span: Span,
) -> Result<Value, QueryError> {
    let left = ev.eval_chain(&args[0], ctx.clone())?;
    if left.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    let right = ev.eval_chain(&args[1], ctx)?;
    if right.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    // Strict comparison: kinds must match, Int(1) != Float(1.0).
    Ok(Value::Bool(left == right))
}

fn boolean_operand(
    operator: &'static str,
    value: Value,
    span: Span,
) -> Result<Option<bool>, QueryError> {
    match value {
        Value::Bool(b) => Ok(Some(b)),
        Value::AbsorbingNone => Ok(None),
        other => Err(type_error(operator, "boolean operand", &other, span)),
    }
}

pub(crate) fn and(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let left = ev.eval_chain(&args[0], ctx.clone())?;
    match boolean_operand("and", left, span)? {
        None => Ok(Value::AbsorbingNone),
        Some(false) => Ok(Value::Bool(false)),
        Some(true) => {
            let right = ev.eval_chain(&args[1], ctx)?;
            match boolean_operand("and", right, span)? {
                None => Ok(Value::AbsorbingNone),
                Some(b) => Ok(Value::Bool(b)),
            }
        }
    }
}

pub(crate) fn or(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let left = ev.eval_chain(&args[0], ctx.clone())?;
    match boolean_operand("or", left, span)? {
        None => Ok(Value::AbsorbingNone),
        Some(true) => Ok(Value::Bool(true)),
        Some(false) => {
            let right = ev.eval_chain(&args[1], ctx)?;
            match boolean_operand("or", right, span)? {
                None => Ok(Value::AbsorbingNone),
                Some(b) => Ok(Value::Bool(b)),
            }
        }
    }
}

pub(crate) fn not(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let operand = ev.eval_chain(&args[0], ctx)?;
    match boolean_operand("not", operand, span)? {
        None => Ok(Value::AbsorbingNone),
        Some(b) => Ok(Value::Bool(!b)),
    }
}

pub(crate) fn contains(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let needle = ev.eval_chain(&args[0], ctx.clone())?;
    if needle.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    match ctx {
        Value::List(items) => Ok(Value::Bool(items.contains(&needle))),
        Value::Objects(objects) => Ok(Value::Bool(
            objects
                .iter()
                .any(|sao| Value::Object(sao.clone()) == needle),
        )),
        other => Err(type_error("contains", "list", &other, span)),
    }
}

pub(crate) fn regex_match(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let pattern_value = ev.eval_chain(&args[0], ctx.clone())?;
    if pattern_value.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    let pattern = match pattern_value {
        Value::Str(pattern) => pattern,
        other => return Err(type_error("regex_match", "string pattern", &other, span)),
    };
    let subject = match ctx {
        Value::Str(subject) => subject,
        other => return Err(type_error("regex_match", "string", &other, span)),
    };
    let re = ev.compile_regex(&pattern, args[0].span().start)?;
    Ok(Value::Bool(re.is_match(&subject)))
}

// ---------------------------------------------------------------------------
// Aggregates and grouping

/// Total order over comparable key values. Int and Float compare
/// numerically with each other; any other kind mix is a type error.
fn compare_keys(left: &Value, right: &Value, span: Span) -> Result<Ordering, QueryError> {
    let ord = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ord.ok_or_else(|| QueryError::Type {
        operator: "lowest",
        expected: "comparable key values",
        got: format!("{} vs {}", left.kind_name(), right.kind_name()),
        offset: span.start,
    })
}

/// The element minimizing the key expression; ties keep the earliest.
/// Elements whose key is missing are skipped; no candidates at all is
/// AbsorbingNone.
fn lowest_of(
    ev: &mut Evaluator,
    objects: &[Arc<Sao>],
    key_expr: &Chain,
    span: Span,
) -> Result<Option<Arc<Sao>>, QueryError> {
    let mut best: Option<(Arc<Sao>, Value)> = None;
    for sao in objects {
        let key = ev.eval_chain(key_expr, Value::Object(sao.clone()))?;
        if key.is_absorbing() {
            continue;
        }
        best = match best {
            None => Some((sao.clone(), key)),
            Some((best_sao, best_key)) => {
                if compare_keys(&key, &best_key, span)? == Ordering::Less {
                    Some((sao.clone(), key))
                } else {
                    Some((best_sao, best_key))
                }
            }
        };
    }
    Ok(best.map(|(sao, _)| sao))
}

pub(crate) fn lowest(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let objects = match ctx {
        Value::Objects(objects) => objects,
        other => return Err(type_error("lowest", "object list", &other, span)),
    };
    match lowest_of(ev, &objects, &args[0], span)? {
        Some(sao) => Ok(Value::Object(sao)),
        None => Ok(Value::AbsorbingNone),
    }
}

/// Evaluate the key chain per element, pairing each object with its group
/// key. Elements whose key is missing are skipped.
fn group_elements(
    ev: &mut Evaluator,
    operator: &'static str,
    objects: &[Arc<Sao>],
    keys_expr: &Chain,
    span: Span,
) -> Result<Vec<(Arc<Sao>, GroupKey)>, QueryError> {
    let mut keyed = Vec::with_capacity(objects.len());
    for sao in objects {
        let key_value = ev.eval_chain(keys_expr, Value::Object(sao.clone()))?;
        if key_value.is_absorbing() {
            continue;
        }
        let key = GroupKey::try_from_value(&key_value).ok_or_else(|| QueryError::Type {
            operator,
            expected: "primitive grouping key (or list of primitives)",
            got: key_value.kind_name().to_string(),
            offset: span.start,
        })?;
        keyed.push((sao.clone(), key));
    }
    Ok(keyed)
}

pub(crate) fn grouped_lowest(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let objects = match ctx {
        Value::Objects(objects) => objects,
        other => return Err(type_error("grouped_lowest", "object list", &other, span)),
    };
    let keyed = group_elements(ev, "grouped_lowest", &objects, &args[1], span)?;

    let mut groups: IndexMap<GroupKey, Vec<Arc<Sao>>> = IndexMap::new();
    for (sao, key) in keyed {
        groups.entry(key).or_default().push(sao);
    }

    let mut grouping = ObjectGrouping::new();
    for (key, members) in groups {
        if let Some(winner) = lowest_of(ev, &members, &args[0], span)? {
            grouping.insert_group(key, vec![winner]);
        }
    }
    Ok(Value::Grouping(grouping))
}

pub(crate) fn grouped_filter(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let objects = match ctx {
        Value::Objects(objects) => objects,
        other => return Err(type_error("grouped_filter", "object list", &other, span)),
    };
    let keyed = group_elements(ev, "grouped_filter", &objects, &args[1], span)?;

    let mut groups: IndexMap<GroupKey, Vec<Arc<Sao>>> = IndexMap::new();
    for (sao, key) in &keyed {
        groups.entry(key.clone()).or_default().push(sao.clone());
    }

    // The predicate sees each whole group as its context.
    let mut retained: HashSet<GroupKey> = HashSet::new();
    for (key, members) in &groups {
        let verdict = ev.eval_chain(&args[0], Value::Objects(members.clone()))?;
        match verdict {
            Value::Bool(true) => {
                retained.insert(key.clone());
            }
            Value::Bool(false) | Value::AbsorbingNone => {}
            other => {
                return Err(type_error(
                    "grouped_filter",
                    "boolean predicate result",
                    &other,
                    span,
                ))
            }
        }
    }

    // Survivors keep their original input order.
    let kept = keyed
        .into_iter()
        .filter(|(_, key)| retained.contains(key))
        .map(|(sao, _)| sao)
        .collect();
    Ok(Value::Objects(kept))
}

// ---------------------------------------------------------------------------
// Collapsing operators

pub(crate) fn single(
    _ev: &mut Evaluator,
    ctx: Value,
    _args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let items: Vec<Value> = match ctx {
        Value::List(items) => items,
        Value::Objects(objects) => objects.into_iter().map(Value::Object).collect(),
        other => Err(type_error("single", "list or object list", &other, span))?,
    };
    let Some(first) = items.first().cloned() else {
        return Ok(Value::AbsorbingNone);
    };
    for item in &items[1..] {
        if *item != first {
            return Err(QueryError::SingleDisagreement {
                left: describe(&first),
                right: describe(item),
                offset: span.start,
            });
        }
    }
    Ok(first)
}

pub(crate) fn value(
    _ev: &mut Evaluator,
    ctx: Value,
    _args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let (len, unwrapped) = match ctx {
        Value::List(mut items) => {
            let len = items.len();
            (len, items.pop())
        }
        Value::Objects(mut objects) => {
            let len = objects.len();
            (len, objects.pop().map(Value::Object))
        }
        other => return Err(type_error("value", "list or object list", &other, span)),
    };
    match (len, unwrapped) {
        (1, Some(item)) => Ok(item),
        (0, _) => Ok(Value::AbsorbingNone),
        (n, _) => Err(QueryError::Type {
            operator: "value",
            expected: "exactly one element",
            got: format!("{n} elements"),
            offset: span.start,
        }),
    }
}

pub(crate) fn index(
    ev: &mut Evaluator,
    ctx: Value,
    args: &[Chain],
    span: Span,
) -> Result<Value, QueryError> {
    let index_value = ev.eval_chain(&args[0], ctx.clone())?;
    if index_value.is_absorbing() {
        return Ok(Value::AbsorbingNone);
    }
    let n = match index_value {
        Value::Int(n) => n,
        other => return Err(type_error("index", "integer index", &other, span)),
    };
    let len = match &ctx {
        Value::Objects(objects) => objects.len(),
        Value::List(items) => items.len(),
        other => return Err(type_error("index", "object list or list", other, span)),
    };
    if n < 0 || (n as usize) >= len {
        return Err(QueryError::IndexOutOfRange {
            index: n,
            len,
            offset: span.start,
        });
    }
    let item = match ctx {
        Value::Objects(objects) => Value::Object(objects[n as usize].clone()),
        Value::List(items) => items[n as usize].clone(),
        _ => unreachable!("kind checked above"),
    };
    Ok(item)
}
