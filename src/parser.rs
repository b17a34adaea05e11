// SA Query Language Parser
// Hand-written lexer and recursive-descent parser. The parser performs all
// surface desugaring, so the runtime only ever sees literal, context, all,
// and call steps:
//
//   person      -> .filter(.__types__.contains('person'))
//   #a          -> .filter(.__id__ =~ '^a$')
//   @hr         -> .filter(.__source__ == 'hr')
//   x{.a, .b}   -> x.select(.a, .b)
//   x[expr]     -> x.filter(expr)      ([n] with an int literal indexes)
//   a == b      -> .equals(a, b)       a =~ p -> a.regex_match(p)
//   a AND b     -> .and(a, b)          !a   -> .not(a)
//
// Operator names and fixed arities are checked against the runtime registry
// here, so an unknown operator or a wrong argument count is a parse error
// with a byte offset.

use crate::chain::{Chain, LiteralValue, Span, Step, StepKind};
use crate::errors::QueryError;
use crate::runtime;
use crate::value::{FIELD_ID, FIELD_SOURCE, FIELD_TYPES};

/// Parse a query string into a chain.
pub fn parse_query(src: &str) -> Result<Chain, QueryError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        src_len: src.len(),
    };
    let chain = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(chain)
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Dot,
    Hash,
    At,
    Star,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    EqEq,
    Match,
    AndOp,
    OrOp,
    NotOp,
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Dot => "'.'".into(),
            Tok::Hash => "'#'".into(),
            Tok::At => "'@'".into(),
            Tok::Star => "'*'".into(),
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
            Tok::LBracket => "'['".into(),
            Tok::RBracket => "']'".into(),
            Tok::LBrace => "'{'".into(),
            Tok::RBrace => "'}'".into(),
            Tok::Comma => "','".into(),
            Tok::EqEq => "'=='".into(),
            Tok::Match => "'=~'".into(),
            Tok::AndOp => "'AND'".into(),
            Tok::OrOp => "'OR'".into(),
            Tok::NotOp => "'NOT'".into(),
            Tok::Ident(name) => format!("identifier '{name}'"),
            Tok::Str(_) => "string literal".into(),
            Tok::Int(_) => "integer literal".into(),
            Tok::Float(_) => "float literal".into(),
            Tok::True => "'true'".into(),
            Tok::False => "'false'".into(),
            Tok::Null => "'null'".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    span: Span,
}

fn parse_err(offset: usize, message: impl Into<String>) -> QueryError {
    QueryError::Parse {
        offset,
        message: message.into(),
    }
}

fn lex(src: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token {
                    tok: Tok::Dot,
                    span: Span::new(start, start + 1),
                });
            }
            '#' | '@' | '*' | '(' | ')' | '[' | ']' | '{' | '}' | ',' | '!' => {
                chars.next();
                let tok = match c {
                    '#' => Tok::Hash,
                    '@' => Tok::At,
                    '*' => Tok::Star,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    ',' => Tok::Comma,
                    _ => Tok::NotOp,
                };
                tokens.push(Token {
                    tok,
                    span: Span::new(start, start + 1),
                });
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        tokens.push(Token {
                            tok: Tok::EqEq,
                            span: Span::new(start, start + 2),
                        });
                    }
                    Some(&(_, '~')) => {
                        chars.next();
                        tokens.push(Token {
                            tok: Tok::Match,
                            span: Span::new(start, start + 2),
                        });
                    }
                    _ => return Err(parse_err(start, "unexpected character '='")),
                }
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '&')) => {
                        chars.next();
                        tokens.push(Token {
                            tok: Tok::AndOp,
                            span: Span::new(start, start + 2),
                        });
                    }
                    _ => return Err(parse_err(start, "unexpected character '&'")),
                }
            }
            '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '|')) => {
                        chars.next();
                        tokens.push(Token {
                            tok: Tok::OrOp,
                            span: Span::new(start, start + 2),
                        });
                    }
                    _ => return Err(parse_err(start, "unexpected character '|'")),
                }
            }
            '\'' | '"' => {
                tokens.push(lex_string(&mut chars)?);
            }
            '-' | '0'..='9' => {
                tokens.push(lex_number(src, &mut chars)?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                tokens.push(lex_ident(src, &mut chars));
            }
            other => {
                return Err(parse_err(start, format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Token, QueryError> {
    let (start, quote) = chars.next().expect("caller checked quote");
    let mut text = String::new();
    loop {
        match chars.next() {
            None => return Err(parse_err(start, "unterminated string literal")),
            Some((end, c)) if c == quote => {
                return Ok(Token {
                    tok: Tok::Str(text),
                    span: Span::new(start, end + c.len_utf8()),
                });
            }
            Some((esc_at, '\\')) => match chars.next() {
                Some((_, '\\')) => text.push('\\'),
                Some((_, '\'')) => text.push('\''),
                Some((_, '"')) => text.push('"'),
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, other)) => {
                    return Err(parse_err(
                        esc_at,
                        format!("invalid escape sequence '\\{other}'"),
                    ))
                }
                None => return Err(parse_err(start, "unterminated string literal")),
            },
            Some((_, c)) => text.push(c),
        }
    }
}

fn lex_number(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Token, QueryError> {
    let (start, first) = chars.next().expect("caller checked digit or '-'");
    let mut end = start + first.len_utf8();
    if first == '-' && !matches!(chars.peek(), Some(&(_, '0'..='9'))) {
        return Err(parse_err(start, "expected digits after '-'"));
    }
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            chars.next();
            end = i + 1;
        } else {
            break;
        }
    }
    let mut is_float = false;
    if let Some(&(dot_at, '.')) = chars.peek() {
        // Only consume the dot when digits follow; `1.count()` is an int
        // followed by an operator call.
        let mut lookahead = chars.clone();
        lookahead.next();
        if matches!(lookahead.peek(), Some(&(_, '0'..='9'))) {
            is_float = true;
            chars.next();
            end = dot_at + 1;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    chars.next();
                    end = i + 1;
                } else {
                    break;
                }
            }
        }
    }
    let text = &src[start..end];
    let tok = if is_float {
        let x: f64 = text
            .parse()
            .map_err(|_| parse_err(start, format!("invalid float literal '{text}'")))?;
        Tok::Float(x)
    } else {
        let n: i64 = text
            .parse()
            .map_err(|_| parse_err(start, "numeric literal out of range"))?;
        Tok::Int(n)
    };
    Ok(Token {
        tok,
        span: Span::new(start, end),
    })
}

fn lex_ident(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Token {
    let (start, first) = chars.next().expect("caller checked ident start");
    let mut end = start + first.len_utf8();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            chars.next();
            end = i + 1;
        } else {
            break;
        }
    }
    let text = &src[start..end];
    let tok = match text {
        "true" => Tok::True,
        "false" => Tok::False,
        "null" => Tok::Null,
        "AND" => Tok::AndOp,
        "OR" => Tok::OrOp,
        "NOT" => Tok::NotOp,
        _ => Tok::Ident(text.to_string()),
    };
    Token {
        tok,
        span: Span::new(start, end),
    }
}

// ---------------------------------------------------------------------------
// Parser

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    src_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.src_len, |t| t.span.start)
    }

    fn expect(&mut self, want: Tok) -> Result<Token, QueryError> {
        match self.advance() {
            Some(token) if token.tok == want => Ok(token),
            Some(token) => Err(parse_err(
                token.span.start,
                format!("expected {}, got {}", want.describe(), token.tok.describe()),
            )),
            None => Err(parse_err(
                self.src_len,
                format!("expected {}, got end of input", want.describe()),
            )),
        }
    }

    fn expect_eof(&mut self) -> Result<(), QueryError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(parse_err(
                token.span.start,
                format!("unexpected {}", token.tok.describe()),
            )),
        }
    }

    // Precedence, high to low: postfix, NOT, =~/==, AND, OR.

    fn parse_expr(&mut self) -> Result<Chain, QueryError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Chain, QueryError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek().map(|t| &t.tok), Some(Tok::OrOp)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = infix_call("or", lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Chain, QueryError> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek().map(|t| &t.tok), Some(Tok::AndOp)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = infix_call("and", lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Chain, QueryError> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek().map(|t| &t.tok) {
                Some(Tok::EqEq) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = infix_call("equals", lhs, rhs);
                }
                Some(Tok::Match) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    let span = Span::new(lhs.span().start, rhs.span().end);
                    lhs.push(Step::call("regex_match", vec![rhs], span));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Chain, QueryError> {
        if matches!(self.peek().map(|t| &t.tok), Some(Tok::NotOp)) {
            let not_token = self.advance().expect("peeked");
            let operand = self.parse_unary()?;
            let span = Span::new(not_token.span.start, operand.span().end);
            return Ok(Chain::single(Step::call("not", vec![operand], span)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Chain, QueryError> {
        let mut chain = self.parse_primary()?;
        loop {
            match self.peek().map(|t| &t.tok) {
                Some(Tok::Dot) => {
                    let dot = self.advance().expect("peeked");
                    let step = self.parse_member(dot.span)?;
                    chain.push(step);
                }
                Some(Tok::LBracket) => {
                    let open = self.advance().expect("peeked");
                    let inner = self.parse_expr()?;
                    let close = self.expect(Tok::RBracket)?;
                    let span = Span::new(open.span.start, close.span.end);
                    if inner.as_int_literal().is_some() {
                        chain.push(Step::call("index", vec![inner], span));
                    } else {
                        chain.push(Step::call("filter", vec![inner], span));
                    }
                }
                Some(Tok::LBrace) => {
                    let open = self.advance().expect("peeked");
                    let mut args = vec![self.parse_projection_element()?];
                    while matches!(self.peek().map(|t| &t.tok), Some(Tok::Comma)) {
                        self.advance();
                        args.push(self.parse_projection_element()?);
                    }
                    let close = self.expect(Tok::RBrace)?;
                    let span = Span::new(open.span.start, close.span.end);
                    self.check_operator("select", args.len(), span.start)?;
                    chain.push(Step::call("select", args, span));
                }
                _ => break,
            }
        }
        Ok(chain)
    }

    /// `.name` (field access) or `.name(args…)` (operator call), after the
    /// dot has been consumed.
    fn parse_member(&mut self, dot_span: Span) -> Result<Step, QueryError> {
        let token = self.advance().ok_or_else(|| {
            parse_err(self.src_len, "expected identifier after '.'")
        })?;
        let name = match token.tok {
            Tok::Ident(name) => name,
            other => {
                return Err(parse_err(
                    token.span.start,
                    format!("expected identifier after '.', got {}", other.describe()),
                ))
            }
        };
        if matches!(self.peek().map(|t| &t.tok), Some(Tok::LParen)) {
            let name = normalize_operator(&name);
            let args = self.parse_call_args()?;
            let end = self.tokens[self.pos - 1].span.end;
            let span = Span::new(dot_span.start, end);
            self.check_operator(&name, args.len(), token.span.start)?;
            return Ok(Step::call(name, args, span));
        }
        let span = Span::new(dot_span.start, token.span.end);
        Ok(get_field_step(&name, span))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Chain>, QueryError> {
        self.expect(Tok::LParen)?;
        let mut args = Vec::new();
        if matches!(self.peek().map(|t| &t.tok), Some(Tok::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Some(Token {
                    tok: Tok::Comma, ..
                }) => continue,
                Some(Token {
                    tok: Tok::RParen, ..
                }) => break,
                Some(token) => {
                    return Err(parse_err(
                        token.span.start,
                        format!("expected ',' or ')', got {}", token.tok.describe()),
                    ))
                }
                None => {
                    return Err(parse_err(self.src_len, "expected ')', got end of input"))
                }
            }
        }
        Ok(args)
    }

    fn parse_projection_element(&mut self) -> Result<Chain, QueryError> {
        let start = self.offset();
        let element = self.parse_expr()?;
        match element.call_at(0) {
            Some(("get_field", _)) => Ok(element),
            _ => Err(parse_err(
                start,
                "projection element must start with a field access",
            )),
        }
    }

    fn parse_primary(&mut self) -> Result<Chain, QueryError> {
        let token = self
            .advance()
            .ok_or_else(|| parse_err(self.src_len, "unexpected end of input"))?;
        match token.tok {
            Tok::Dot => {
                // `.name` / `.name(args)` reads the dot as the member dot;
                // a bare `.` is the current context.
                if matches!(self.peek().map(|t| &t.tok), Some(Tok::Ident(_))) {
                    let step = self.parse_member(token.span)?;
                    Ok(Chain::single(step))
                } else {
                    Ok(Chain::single(Step::new(StepKind::Context, token.span)))
                }
            }
            Tok::Star => Ok(Chain::single(Step::new(StepKind::All, token.span))),
            Tok::Ident(name) => Ok(Chain::single(type_filter_step(&name, token.span))),
            Tok::Hash => {
                let (id, end) = self.parse_ref_name("'#'")?;
                let span = Span::new(token.span.start, end);
                Ok(Chain::single(id_filter_step(&id, span)))
            }
            Tok::At => {
                let (source, end) = self.parse_ref_name("'@'")?;
                let span = Span::new(token.span.start, end);
                Ok(Chain::single(source_filter_step(&source, span)))
            }
            Tok::Str(s) => Ok(Chain::single(Step::literal(
                LiteralValue::Str(s),
                token.span,
            ))),
            Tok::Int(n) => Ok(Chain::single(Step::literal(
                LiteralValue::Int(n),
                token.span,
            ))),
            Tok::Float(x) => Ok(Chain::single(Step::literal(
                LiteralValue::Float(x),
                token.span,
            ))),
            Tok::True => Ok(Chain::single(Step::literal(
                LiteralValue::Bool(true),
                token.span,
            ))),
            Tok::False => Ok(Chain::single(Step::literal(
                LiteralValue::Bool(false),
                token.span,
            ))),
            Tok::Null => Ok(Chain::single(Step::literal(LiteralValue::Null, token.span))),
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            other => Err(parse_err(
                token.span.start,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    /// The name after `#` or `@`: an identifier, an integer, or a quoted
    /// string for names that are not identifier-shaped.
    fn parse_ref_name(&mut self, after: &str) -> Result<(String, usize), QueryError> {
        match self.advance() {
            Some(Token {
                tok: Tok::Ident(name),
                span,
            }) => Ok((name, span.end)),
            Some(Token {
                tok: Tok::Int(n),
                span,
            }) if n >= 0 => Ok((n.to_string(), span.end)),
            Some(Token {
                tok: Tok::Str(s),
                span,
            }) => Ok((s, span.end)),
            Some(token) => Err(parse_err(
                token.span.start,
                format!("expected name after {after}, got {}", token.tok.describe()),
            )),
            None => Err(parse_err(
                self.src_len,
                format!("expected name after {after}, got end of input"),
            )),
        }
    }

    fn check_operator(
        &self,
        name: &str,
        argc: usize,
        offset: usize,
    ) -> Result<(), QueryError> {
        let Some(def) = runtime::lookup_operator(name) else {
            return Err(parse_err(offset, format!("unknown operator '{name}'")));
        };
        if !def.arity.accepts(argc) {
            return Err(parse_err(
                offset,
                format!(
                    "operator '{name}' expects {}, got {argc} argument(s)",
                    def.arity
                ),
            ));
        }
        Ok(())
    }
}

/// Surface aliases accepted for operator names.
fn normalize_operator(name: &str) -> String {
    match name {
        "includes" => "contains".to_string(),
        other => other.to_string(),
    }
}

fn infix_call(name: &str, lhs: Chain, rhs: Chain) -> Chain {
    let span = Span::new(lhs.span().start, rhs.span().end);
    Chain::single(Step::call(name, vec![lhs, rhs], span))
}

fn str_literal_chain(s: &str, span: Span) -> Chain {
    Chain::single(Step::literal(LiteralValue::Str(s.to_string()), span))
}

fn get_field_step(name: &str, span: Span) -> Step {
    Step::call("get_field", vec![str_literal_chain(name, span)], span)
}

/// `T` -> `.filter(.__types__.contains('T'))`
fn type_filter_step(type_name: &str, span: Span) -> Step {
    let pred = Chain::new(vec![
        get_field_step(FIELD_TYPES, span),
        Step::call("contains", vec![str_literal_chain(type_name, span)], span),
    ]);
    Step::call("filter", vec![pred], span)
}

/// `#x` -> `.filter(.__id__ =~ '^x$')`
fn id_filter_step(id: &str, span: Span) -> Step {
    let pattern = format!("^{id}$");
    let pred = Chain::new(vec![
        get_field_step(FIELD_ID, span),
        Step::call("regex_match", vec![str_literal_chain(&pattern, span)], span),
    ]);
    Step::call("filter", vec![pred], span)
}

/// `@s` -> `.filter(.__source__ == 's')`
fn source_filter_step(source: &str, span: Span) -> Step {
    let pred = Chain::single(Step::call(
        "equals",
        vec![
            Chain::single(get_field_step(FIELD_SOURCE, span)),
            str_literal_chain(source, span),
        ],
        span,
    ));
    Step::call("filter", vec![pred], span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StepKind;

    fn call_name(step: &Step) -> &str {
        match &step.kind {
            StepKind::Call { name, .. } => name,
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_type_ref_desugars_to_filter() {
        let chain = parse_query("person").unwrap();
        assert_eq!(chain.steps.len(), 1);
        assert_eq!(call_name(&chain.steps[0]), "filter");
        let (_, args) = chain.call_at(0).unwrap();
        assert_eq!(args[0].field_name_at(0), Some("__types__"));
        let (name, contains_args) = args[0].call_at(1).unwrap();
        assert_eq!(name, "contains");
        assert_eq!(contains_args[0].as_str_literal(), Some("person"));
    }

    #[test]
    fn test_id_ref_desugars_to_anchored_regex() {
        let chain = parse_query("#a").unwrap();
        let (_, args) = chain.call_at(0).unwrap();
        assert_eq!(args[0].field_name_at(0), Some("__id__"));
        let (name, regex_args) = args[0].call_at(1).unwrap();
        assert_eq!(name, "regex_match");
        assert_eq!(regex_args[0].as_str_literal(), Some("^a$"));
    }

    #[test]
    fn test_field_access_and_calls() {
        let chain = parse_query(".name").unwrap();
        assert_eq!(chain.field_name_at(0), Some("name"));

        let chain = parse_query("person.count()").unwrap();
        assert_eq!(chain.steps.len(), 2);
        assert_eq!(call_name(&chain.steps[1]), "count");
    }

    #[test]
    fn test_bracket_index_vs_filter() {
        let chain = parse_query("person[0]").unwrap();
        assert_eq!(call_name(&chain.steps[1]), "index");

        let chain = parse_query("person[.salary == 100]").unwrap();
        assert_eq!(call_name(&chain.steps[1]), "filter");
        let (_, args) = chain.call_at(1).unwrap();
        assert_eq!(args[0].call_at(0).unwrap().0, "equals");
    }

    #[test]
    fn test_projection_desugars_to_select() {
        let chain = parse_query("person{.name, .salary}").unwrap();
        let (name, args) = chain.call_at(1).unwrap();
        assert_eq!(name, "select");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].field_name_at(0), Some("name"));

        let err = parse_query("person{100}").unwrap_err();
        assert!(err.to_string().contains("field access"));
    }

    #[test]
    fn test_infix_precedence() {
        // AND binds tighter than OR; == tighter than AND.
        let chain = parse_query(".a == 1 AND .b == 2 OR .c == 3").unwrap();
        let (name, args) = chain.call_at(0).unwrap();
        assert_eq!(name, "or");
        assert_eq!(args[0].call_at(0).unwrap().0, "and");
        assert_eq!(args[1].call_at(0).unwrap().0, "equals");
    }

    #[test]
    fn test_not_and_symbolic_forms() {
        let chain = parse_query("!(.a == 1) && .b == 2 || NOT .c").unwrap();
        assert_eq!(chain.call_at(0).unwrap().0, "or");
        let chain = parse_query(".__id__ =~ '^a$'").unwrap();
        assert_eq!(chain.call_at(1).unwrap().0, "regex_match");
    }

    #[test]
    fn test_includes_alias_normalizes() {
        let chain = parse_query(".__types__.includes('person')").unwrap();
        assert_eq!(chain.call_at(1).unwrap().0, "contains");
    }

    #[test]
    fn test_string_escapes() {
        let chain = parse_query(r#"'a\'b\\c\nd\te'"#).unwrap();
        assert_eq!(chain.as_str_literal(), Some("a'b\\c\nd\te"));
        let chain = parse_query(r#""double \" quoted""#).unwrap();
        assert_eq!(chain.as_str_literal(), Some("double \" quoted"));
    }

    #[test]
    fn test_parse_error_offsets() {
        let err = parse_query("person[.salary == ").unwrap_err();
        assert_eq!(err.offset(), Some(18));

        let err = parse_query("'unterminated").unwrap_err();
        assert_eq!(err.offset(), Some(0));

        let err = parse_query("person.bogus_operator()").unwrap_err();
        assert!(err.to_string().contains("unknown operator"));

        let err = parse_query("person.count(1)").unwrap_err();
        assert!(err.to_string().contains("expects"));

        let err = parse_query("99999999999999999999").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_query("-5").unwrap().as_int_literal(), Some(-5));
        let chain = parse_query("1.5").unwrap();
        match &chain.steps[0].kind {
            StepKind::Literal(LiteralValue::Float(x)) => assert_eq!(*x, 1.5),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn test_context_and_all() {
        let chain = parse_query(".").unwrap();
        assert!(matches!(chain.steps[0].kind, StepKind::Context));
        let chain = parse_query("*.count()").unwrap();
        assert!(matches!(chain.steps[0].kind, StepKind::All));
    }
}
