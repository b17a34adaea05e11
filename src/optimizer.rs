// Peephole Optimizer
// Inspects the head of a chain before evaluation and swaps recognizable
// whole-store filters for direct index lookups. A rewrite is applied only
// when provably equivalent to naive execution:
//
// - the rewritten step must be the chain's first step (the only point where
//   the input is the untouched root object list), and
// - an id pattern must be a purely anchored literal with no metacharacters.
//
// Decisions are returned as notes so the profiler and debug logging can
// surface which path served the query.

use crate::chain::{Chain, StepKind};
use crate::value::{FIELD_ID, FIELD_TYPES};

/// What to seed evaluation with instead of scanning the root list.
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    /// `filter(.__types__.contains('T'))` -> `by_type[T]`
    TypeIndex(String),
    /// `filter(.__id__ =~ '^x$')` with a literal body -> `by_id[x]`
    IdIndex(String),
    /// `filter(.__types__.contains('T') AND rest)` -> `by_type[T]`, then
    /// `filter(rest)` over the reduced candidate set.
    TypeIndexResidual { type_name: String, residual: Chain },
}

/// The rewrite decision for one chain.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub seed: Option<Seed>,
    pub notes: Vec<String>,
}

/// Decide the fast path for a chain that will be evaluated against the root
/// object list.
pub fn plan(chain: &Chain) -> Plan {
    let mut plan = Plan::default();
    let Some(predicate) = head_filter_predicate(chain) else {
        return plan;
    };

    if let Some(type_name) = as_type_membership(predicate) {
        plan.notes
            .push(format!("filter → type_index ('{type_name}')"));
        plan.seed = Some(Seed::TypeIndex(type_name.to_string()));
        return plan;
    }

    if let Some(id) = as_anchored_id_literal(predicate) {
        plan.notes.push(format!("filter → id_index ('{id}')"));
        plan.seed = Some(Seed::IdIndex(id));
        return plan;
    }

    // A complex predicate that starts with a type constant still gets the
    // index as a pre-filter.
    if let Some(("and", and_args)) = predicate.call_at(0) {
        if predicate.steps.len() == 1 && and_args.len() == 2 {
            if let Some(type_name) = as_type_membership(&and_args[0]) {
                plan.notes.push(format!(
                    "filter → type_index ('{type_name}') + residual predicate"
                ));
                plan.seed = Some(Seed::TypeIndexResidual {
                    type_name: type_name.to_string(),
                    residual: and_args[1].clone(),
                });
            }
        }
    }
    plan
}

/// The predicate of the chain's first step, when that step is a one-argument
/// `filter`.
fn head_filter_predicate(chain: &Chain) -> Option<&Chain> {
    match chain.steps.first()?.kind {
        StepKind::Call { ref name, ref args } if name == "filter" && args.len() == 1 => {
            Some(&args[0])
        }
        _ => None,
    }
}

/// Matches `.__types__.contains('T')` exactly.
fn as_type_membership(predicate: &Chain) -> Option<&str> {
    if predicate.steps.len() != 2 || predicate.field_name_at(0)? != FIELD_TYPES {
        return None;
    }
    match predicate.call_at(1)? {
        ("contains", [needle]) => needle.as_str_literal(),
        _ => None,
    }
}

/// Matches `.__id__ =~ '^x$'` where `x` contains no regex metacharacters.
fn as_anchored_id_literal(predicate: &Chain) -> Option<String> {
    if predicate.steps.len() != 2 || predicate.field_name_at(0)? != FIELD_ID {
        return None;
    }
    let pattern = match predicate.call_at(1)? {
        ("regex_match", [pattern]) => pattern.as_str_literal()?,
        _ => return None,
    };
    let body = pattern.strip_prefix('^')?.strip_suffix('$')?;
    if body.is_empty() || body.chars().any(is_regex_metacharacter) {
        return None;
    }
    Some(body.to_string())
}

fn is_regex_metacharacter(c: char) -> bool {
    matches!(
        c,
        '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' | '^' | '$'
    )
}
