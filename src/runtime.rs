// Operator Runtime
// Evaluates chains against an immutable store snapshot. Operators are
// registered by name in a table; each registration declares its arity and a
// handler. Predicate arguments arrive as unevaluated chains and re-enter the
// evaluator against whatever context the operator chooses, which is how
// filter, lowest, and friends iterate.
//
// AbsorbingNone policy lives here, not in the handlers: a call whose input
// context is AbsorbingNone returns AbsorbingNone before its handler runs.
// Handlers only deal with the per-argument and per-element cases.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::chain::{Chain, Span, StepKind};
use crate::errors::QueryError;
use crate::metrics::{ProfileReport, QueryProfiler};
use crate::operators;
use crate::optimizer::{self, Seed};
use crate::parser;
use crate::store::StoreSnapshot;
use crate::value::Value;

/// Links may hop this many times inside one `get_field` before resolution
/// gives up.
pub const MAX_LINK_DEPTH: usize = 32;

/// How many argument chains an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, argc: usize) -> bool {
        match self {
            Arity::Exact(n) => argc == *n,
            Arity::AtLeast(n) => argc >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n} argument(s)"),
            Arity::AtLeast(n) => write!(f, "at least {n} argument(s)"),
        }
    }
}

type OpHandler = fn(&mut Evaluator, Value, &[Chain], Span) -> Result<Value, QueryError>;

/// One registered operator.
pub struct OperatorDef {
    pub name: &'static str,
    pub arity: Arity,
    run: OpHandler,
}

static REGISTRY: Lazy<HashMap<&'static str, OperatorDef>> = Lazy::new(|| {
    let defs = [
        OperatorDef {
            name: "get_field",
            arity: Arity::Exact(1),
            run: operators::get_field,
        },
        OperatorDef {
            name: "filter",
            arity: Arity::Exact(1),
            run: operators::filter,
        },
        OperatorDef {
            name: "select",
            arity: Arity::AtLeast(1),
            run: operators::select,
        },
        OperatorDef {
            name: "count",
            arity: Arity::Exact(0),
            run: operators::count,
        },
        OperatorDef {
            name: "equals",
            arity: Arity::Exact(2),
            run: operators::equals,
        },
        OperatorDef {
            name: "and",
            arity: Arity::Exact(2),
            run: operators::and,
        },
        OperatorDef {
            name: "or",
            arity: Arity::Exact(2),
            run: operators::or,
        },
        OperatorDef {
            name: "not",
            arity: Arity::Exact(1),
            run: operators::not,
        },
        OperatorDef {
            name: "contains",
            arity: Arity::Exact(1),
            run: operators::contains,
        },
        OperatorDef {
            name: "regex_match",
            arity: Arity::Exact(1),
            run: operators::regex_match,
        },
        OperatorDef {
            name: "lowest",
            arity: Arity::Exact(1),
            run: operators::lowest,
        },
        OperatorDef {
            name: "grouped_lowest",
            arity: Arity::Exact(2),
            run: operators::grouped_lowest,
        },
        OperatorDef {
            name: "grouped_filter",
            arity: Arity::Exact(2),
            run: operators::grouped_filter,
        },
        OperatorDef {
            name: "single",
            arity: Arity::Exact(0),
            run: operators::single,
        },
        OperatorDef {
            name: "value",
            arity: Arity::Exact(0),
            run: operators::value,
        },
        OperatorDef {
            name: "index",
            arity: Arity::Exact(1),
            run: operators::index,
        },
    ];
    defs.into_iter().map(|def| (def.name, def)).collect()
});

/// Look up a registered operator by name. The parser uses this to reject
/// unknown names and wrong arities at parse time.
pub fn lookup_operator(name: &str) -> Option<&'static OperatorDef> {
    REGISTRY.get(name)
}

/// Per-query evaluation switches.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Apply the index fast paths when provably equivalent.
    pub optimize: bool,
    /// Collect the per-operator timing breakdown.
    pub profile: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            profile: false,
        }
    }
}

/// Evaluates chains against one snapshot. Cheap to construct per query;
/// carries the caches that only live for a single evaluation.
pub struct Evaluator {
    snapshot: Arc<StoreSnapshot>,
    options: QueryOptions,
    profiler: QueryProfiler,
    regex_cache: HashMap<String, Regex>,
    link_chains: HashMap<String, Chain>,
    link_stack: Vec<String>,
}

impl Evaluator {
    pub fn new(snapshot: Arc<StoreSnapshot>, options: QueryOptions) -> Self {
        Self {
            snapshot,
            options,
            profiler: QueryProfiler::new(options.profile),
            regex_cache: HashMap::new(),
            link_chains: HashMap::new(),
            link_stack: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &Arc<StoreSnapshot> {
        &self.snapshot
    }

    /// Evaluate a full query: context starts as the root object list.
    pub fn eval_query(&mut self, chain: &Chain) -> Result<Value, QueryError> {
        let root = Value::Objects(self.snapshot.all().to_vec());
        self.eval_rooted(chain, root)
    }

    /// The profiling report for the queries evaluated so far, if profiling
    /// was requested.
    pub fn take_profile(&mut self) -> Option<ProfileReport> {
        self.profiler.take_report()
    }

    /// Evaluate a chain whose input is the root object list. This is the one
    /// place the optimizer may rewrite: the fast paths are only equivalent
    /// when the first filter acts on the full store.
    fn eval_rooted(&mut self, chain: &Chain, root: Value) -> Result<Value, QueryError> {
        if !self.options.optimize {
            return self.eval_steps(&chain.steps, root);
        }
        let plan = optimizer::plan(chain);
        for note in &plan.notes {
            debug!(note = %note, "optimizer fast path");
            self.profiler.note(note.clone());
        }
        let (mut current, resume_at) = match plan.seed {
            None => (root, 0),
            Some(Seed::TypeIndex(ref type_name)) => (
                Value::Objects(self.snapshot.by_type(type_name).to_vec()),
                1,
            ),
            Some(Seed::IdIndex(ref id)) => {
                (Value::Objects(self.snapshot.by_id(id).to_vec()), 1)
            }
            Some(Seed::TypeIndexResidual {
                ref type_name,
                ref residual,
            }) => {
                let candidates = self.snapshot.by_type(type_name).to_vec();
                let span = chain.steps[0].span;
                let filtered = operators::apply_filter(self, candidates, residual, span)?;
                (Value::Objects(filtered), 1)
            }
        };
        current = self.eval_steps(&chain.steps[resume_at..], current)?;
        Ok(current)
    }

    /// Evaluate a chain against an explicit context. Argument chains come
    /// through here.
    pub(crate) fn eval_chain(&mut self, chain: &Chain, ctx: Value) -> Result<Value, QueryError> {
        self.eval_steps(&chain.steps, ctx)
    }

    fn eval_steps(
        &mut self,
        steps: &[crate::chain::Step],
        mut current: Value,
    ) -> Result<Value, QueryError> {
        for step in steps {
            current = self.eval_step(step, current)?;
        }
        Ok(current)
    }

    fn eval_step(
        &mut self,
        step: &crate::chain::Step,
        current: Value,
    ) -> Result<Value, QueryError> {
        match &step.kind {
            StepKind::Literal(lit) => Ok(lit.to_value()),
            StepKind::Context => Ok(current),
            StepKind::All => Ok(Value::Objects(self.snapshot.all().to_vec())),
            StepKind::Call { name, args } => {
                let def = lookup_operator(name).ok_or_else(|| QueryError::Parse {
                    offset: step.span.start,
                    message: format!("unknown operator '{name}'"),
                })?;
                if !def.arity.accepts(args.len()) {
                    return Err(QueryError::Arity {
                        operator: name.clone(),
                        expected: def.arity.to_string(),
                        got: args.len(),
                        offset: step.span.start,
                    });
                }
                // Missing propagates through every operator untouched.
                if current.is_absorbing() {
                    return Ok(Value::AbsorbingNone);
                }
                self.profiler.enter(def.name);
                let result = (def.run)(self, current, args, step.span);
                self.profiler.exit();
                result
            }
        }
    }

    /// Compile (or fetch from the per-query cache) a regex pattern.
    pub(crate) fn compile_regex(
        &mut self,
        pattern: &str,
        offset: usize,
    ) -> Result<Regex, QueryError> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| QueryError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
            offset,
        })?;
        self.regex_cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Resolve a link field by running its query against the root object
    /// list. A visited set bounds traversal within a single `get_field`
    /// evaluation; a repeated query or exceeded depth is a cycle.
    pub(crate) fn resolve_link(&mut self, query: &str) -> Result<Value, QueryError> {
        if self.link_stack.iter().any(|seen| seen == query) {
            return Err(QueryError::LinkResolution {
                query: query.to_string(),
                reason: "link cycle detected".to_string(),
            });
        }
        if self.link_stack.len() >= MAX_LINK_DEPTH {
            return Err(QueryError::LinkResolution {
                query: query.to_string(),
                reason: format!("link depth limit ({MAX_LINK_DEPTH}) exceeded"),
            });
        }
        let chain = match self.link_chains.get(query) {
            Some(chain) => chain.clone(),
            None => {
                let chain = parser::parse_query(query).map_err(|e| {
                    QueryError::LinkResolution {
                        query: query.to_string(),
                        reason: format!("link query failed to parse: {e}"),
                    }
                })?;
                self.link_chains.insert(query.to_string(), chain.clone());
                chain
            }
        };
        self.link_stack.push(query.to_string());
        let root = Value::Objects(self.snapshot.all().to_vec());
        let result = self.eval_rooted(&chain, root);
        self.link_stack.pop();
        result
    }
}

/// Parse and evaluate in one call. The shell-facing convenience entry.
pub fn run_query(
    snapshot: Arc<StoreSnapshot>,
    query: &str,
    options: QueryOptions,
) -> Result<(Value, Option<ProfileReport>), QueryError> {
    let chain = parser::parse_query(query)?;
    let mut evaluator = Evaluator::new(snapshot, options);
    let value = evaluator.eval_query(&chain)?;
    let report = evaluator.take_profile();
    Ok((value, report))
}
