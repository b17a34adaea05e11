// Chain Representation
// A parsed query is a chain: an ordered list of steps, each carrying an
// operator invocation (or a primary) and its source span. Chains are values
// themselves; operators that take predicates receive them un-evaluated and
// re-enter the evaluator against a context of their choosing.

use std::fmt;

use crate::value::Value;

/// Byte range of a step in the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A literal embedded in a chain. Kept separate from `Value` so a chain stays
/// a pure syntax object.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl LiteralValue {
    pub fn to_value(&self) -> Value {
        match self {
            LiteralValue::Str(s) => Value::Str(s.clone()),
            LiteralValue::Int(n) => Value::Int(*n),
            LiteralValue::Float(x) => Value::Float(*x),
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Null => Value::Null,
        }
    }
}

/// What a single step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// A literal primary (`'x'`, `100`, `1.5`, `true`, `null`).
    Literal(LiteralValue),
    /// `.` — the current context, unchanged.
    Context,
    /// `*` — the root object list, regardless of the current context.
    All,
    /// An operator invocation with unevaluated argument chains.
    Call { name: String, args: Vec<Chain> },
}

/// One step of a chain: operator plus source position.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub span: Span,
}

/// Step equality is structural; the source position is metadata, so the
/// same chain parsed from different surface spellings still compares equal.
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Step {
    pub fn new(kind: StepKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn call(name: impl Into<String>, args: Vec<Chain>, span: Span) -> Self {
        Self::new(
            StepKind::Call {
                name: name.into(),
                args,
            },
            span,
        )
    }

    pub fn literal(lit: LiteralValue, span: Span) -> Self {
        Self::new(StepKind::Literal(lit), span)
    }
}

/// An ordered list of steps. The first step's input is the evaluation
/// context; each later step consumes the previous step's output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chain {
    pub steps: Vec<Step>,
}

impl Chain {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn single(step: Step) -> Self {
        Self { steps: vec![step] }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// The chain's overall span (first step start to last step end).
    pub fn span(&self) -> Span {
        match (self.steps.first(), self.steps.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
            _ => Span::default(),
        }
    }

    /// If the chain is exactly one string literal, return it.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self.steps.as_slice() {
            [Step {
                kind: StepKind::Literal(LiteralValue::Str(s)),
                ..
            }] => Some(s),
            _ => None,
        }
    }

    /// If the chain is exactly one integer literal, return it.
    pub fn as_int_literal(&self) -> Option<i64> {
        match self.steps.as_slice() {
            [Step {
                kind: StepKind::Literal(LiteralValue::Int(n)),
                ..
            }] => Some(*n),
            _ => None,
        }
    }

    /// If step `i` is `get_field` with a literal name, return the name.
    pub fn field_name_at(&self, i: usize) -> Option<&str> {
        match self.steps.get(i)?.kind {
            StepKind::Call { ref name, ref args } if name == "get_field" && args.len() == 1 => {
                args[0].as_str_literal()
            }
            _ => None,
        }
    }

    /// If step `i` is a call, return its name and args.
    pub fn call_at(&self, i: usize) -> Option<(&str, &[Chain])> {
        match self.steps.get(i)?.kind {
            StepKind::Call { ref name, ref args } => Some((name.as_str(), args.as_slice())),
            _ => None,
        }
    }
}

// Canonical text form. Parsing the rendered text yields the same chain, which
// is what the round-trip tests lean on.

fn is_plain_ident(name: &str) -> bool {
    // Keywords would re-lex as something other than an identifier.
    const KEYWORDS: [&str; 6] = ["true", "false", "null", "AND", "OR", "NOT"];
    if KEYWORDS.contains(&name) {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'")?;
    for c in s.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\'' => write!(f, "\\'")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    write!(f, "'")
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Str(s) => write_str_literal(f, s),
            LiteralValue::Int(n) => write!(f, "{n}"),
            LiteralValue::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    // Keep a trailing digit so the literal re-lexes as a float.
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            LiteralValue::Bool(b) => write!(f, "{b}"),
            LiteralValue::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StepKind::Literal(lit) => write!(f, "{lit}"),
            StepKind::Context => write!(f, "."),
            StepKind::All => write!(f, "*"),
            StepKind::Call { name, args } => match (name.as_str(), args.as_slice()) {
                ("get_field", [arg]) => match arg.as_str_literal() {
                    Some(field) if is_plain_ident(field) => write!(f, ".{field}"),
                    _ => {
                        write!(f, ".get_field(")?;
                        write_args(f, args)?;
                        write!(f, ")")
                    }
                },
                ("index", [arg]) if arg.as_int_literal().is_some() => {
                    write!(f, "[{}]", arg.as_int_literal().unwrap())
                }
                _ => {
                    write!(f, ".{name}(")?;
                    write_args(f, args)?;
                    write!(f, ")")
                }
            },
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Chain]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
