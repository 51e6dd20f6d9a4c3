//! The logical query language behind intensional collections.
//!
//! ```text
//! expr      := or
//! or        := and ("OR" and)*
//! and       := unary (["AND"] unary)*
//! unary     := "NOT" unary | "(" expr ")" | predicate
//! predicate := field ":" value
//! ```
//!
//! Fields: `kind`, `tag`, `status`, `mime`, `type`, `name`, `about`, `from`,
//! `in`. Values may be double-quoted to include spaces or parentheses.
//! Keywords are case-insensitive. Queries compile to one SQL `WHERE` clause
//! over the entity registry, so a resolve reads a single snapshot.

use rusqlite::Connection;

use super::tags;
use super::types::EntityKind;
use crate::error::{GraphError, GraphResult};

const MAX_DEPTH: usize = 64;
/// Upper bound on predicates per query. Every predicate adds a level to the
/// compiled SQL, which SQLite caps.
const MAX_PREDICATES: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Pred(Predicate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Kind(EntityKind),
    Tag(String),
    /// Artifact status or thing status.
    Status(String),
    Mime(String),
    /// Thing domain type.
    Type(String),
    /// Case-insensitive substring of a thing, note or collection name. Held
    /// already case-folded; matched against `fold_case(name)`.
    Name(String),
    /// Notes whose live subject is this id.
    About(String),
    /// Fragments extracted from this artifact.
    From(String),
    /// Stored members of this extensional collection.
    In(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Pred(Predicate),
}

/// Parse a query string. Errors are `InvalidInput`.
pub fn parse(input: &str) -> GraphResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(GraphError::invalid("query must not be empty"));
    }
    let predicates = tokens.iter().filter(|t| matches!(t, Token::Pred(_))).count();
    if predicates > MAX_PREDICATES {
        return Err(GraphError::invalid(format!(
            "query has {predicates} predicates, at most {MAX_PREDICATES} allowed"
        )));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(GraphError::invalid(format!(
            "unexpected {:?} at token {}",
            parser.tokens[parser.pos], parser.pos
        )));
    }
    Ok(expr)
}

/// Ids of all entities matching `expr`, sorted, never including `exclude`.
pub fn evaluate(conn: &Connection, expr: &Expr, exclude: Option<&str>) -> GraphResult<Vec<String>> {
    let mut params = Vec::new();
    let clause = to_sql(expr, &mut params);
    params.push(exclude.unwrap_or_default().to_string());
    let sql = format!(
        "SELECT e.id FROM entities e WHERE ({clause}) AND e.id <> ?{} ORDER BY e.id",
        params.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn to_sql(expr: &Expr, params: &mut Vec<String>) -> String {
    match expr {
        Expr::And(a, b) => format!("({} AND {})", to_sql(a, params), to_sql(b, params)),
        Expr::Or(a, b) => format!("({} OR {})", to_sql(a, params), to_sql(b, params)),
        Expr::Not(a) => format!("(NOT {})", to_sql(a, params)),
        Expr::Pred(p) => predicate_sql(p, params),
    }
}

fn predicate_sql(pred: &Predicate, params: &mut Vec<String>) -> String {
    let mut bind = |value: &str| {
        params.push(value.to_string());
        format!("?{}", params.len())
    };
    match pred {
        Predicate::Kind(kind) => format!("e.kind = {}", bind(kind.as_str())),
        Predicate::Tag(label) => format!(
            "e.id IN (SELECT et.entity_id FROM entity_tags et JOIN tags t ON t.id = et.tag_id \
             WHERE t.label = {})",
            bind(label)
        ),
        Predicate::Status(status) => {
            let p = bind(status);
            format!(
                "e.id IN (SELECT id FROM artifacts WHERE status = {p} \
                 UNION SELECT id FROM things WHERE status = {p})"
            )
        }
        Predicate::Mime(mime) => format!(
            "e.id IN (SELECT id FROM artifacts WHERE mime_type = {})",
            bind(mime)
        ),
        Predicate::Type(thing_type) => format!(
            "e.id IN (SELECT id FROM things WHERE thing_type = {})",
            bind(thing_type)
        ),
        Predicate::Name(name) => {
            let p = bind(name);
            format!(
                "e.id IN (SELECT id FROM things WHERE instr(fold_case(name), {p}) > 0 \
                 UNION SELECT id FROM notes WHERE instr(fold_case(name), {p}) > 0 \
                 UNION SELECT id FROM collections WHERE instr(fold_case(name), {p}) > 0)"
            )
        }
        Predicate::About(subject) => format!(
            "e.id IN (SELECT id FROM notes WHERE subject_live = 1 AND subject_id = {})",
            bind(subject)
        ),
        Predicate::From(artifact) => format!(
            "e.id IN (SELECT id FROM fragments WHERE artifact_id = {})",
            bind(artifact)
        ),
        Predicate::In(collection) => format!(
            "e.id IN (SELECT member_id FROM collection_members WHERE collection_id = {})",
            bind(collection)
        ),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self, depth: usize) -> GraphResult<Expr> {
        let mut left = self.and(depth)?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and(depth)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self, depth: usize) -> GraphResult<Expr> {
        let mut left = self.unary(depth)?;
        loop {
            match self.peek() {
                Some(Token::And) => self.pos += 1,
                Some(Token::Not | Token::LParen | Token::Pred(_)) => {}
                _ => break,
            }
            let right = self.unary(depth)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self, depth: usize) -> GraphResult<Expr> {
        if depth > MAX_DEPTH {
            return Err(GraphError::invalid("query nests too deeply"));
        }
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| GraphError::invalid("query ends unexpectedly"))?;
        self.pos += 1;

        match token {
            Token::Not => Ok(Expr::Not(Box::new(self.unary(depth + 1)?))),
            Token::LParen => {
                let inner = self.or(depth + 1)?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(GraphError::invalid("missing closing parenthesis"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Pred(p) => Ok(Expr::Pred(p)),
            other => Err(GraphError::invalid(format!("unexpected {other:?}"))),
        }
    }
}

fn tokenize(input: &str) -> GraphResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' || c == ')' {
            chars.next();
            tokens.push(if c == '(' { Token::LParen } else { Token::RParen });
            continue;
        }

        // a bare word or field:value, where the value may be quoted
        let mut word = String::new();
        let mut value: Option<String> = None;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            chars.next();
            if c == ':' && value.is_none() {
                value = Some(read_value(&mut chars)?);
                break;
            }
            word.push(c);
        }

        tokens.push(match value {
            None => match word.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "NOT" => Token::Not,
                _ => {
                    return Err(GraphError::invalid(format!(
                        "expected field:value, found {word:?}"
                    )))
                }
            },
            Some(value) => Token::Pred(predicate(&word, value)?),
        });
    }

    Ok(tokens)
}

fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> GraphResult<String> {
    let mut value = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        loop {
            match chars.next() {
                Some('"') => break,
                Some('\\') => match chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(GraphError::invalid("unterminated escape in query")),
                },
                Some(c) => value.push(c),
                None => return Err(GraphError::invalid("unterminated quote in query")),
            }
        }
    } else {
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            value.push(c);
            chars.next();
        }
    }
    Ok(value)
}

fn predicate(field: &str, value: String) -> GraphResult<Predicate> {
    if value.is_empty() {
        return Err(GraphError::invalid(format!("empty value for field {field:?}")));
    }
    Ok(match field.to_ascii_lowercase().as_str() {
        "kind" => Predicate::Kind(value.parse().map_err(GraphError::InvalidInput)?),
        "tag" => Predicate::Tag(tags::normalize_label(&value)?),
        "status" => Predicate::Status(value),
        "mime" => Predicate::Mime(value),
        "type" => Predicate::Type(value),
        "name" => Predicate::Name(value.to_lowercase()),
        "about" => Predicate::About(value),
        "from" => Predicate::From(value),
        "in" => Predicate::In(value),
        _ => return Err(GraphError::invalid(format!("unknown query field {field:?}"))),
    })
}
