//! The predicate tree: parsing, evaluation and canonical stringification.
//!
//! Grammar (case-insensitive keywords, tightest-to-loosest precedence NOT, AND, OR):
//! `or := and (('OR'|'or') and)*`, `and := not (('AND'|'and') not)*`,
//! `not := ('NOT'|'not')? atom`, `atom := '(' or ')' | field op value`.

use crate::lexer::{Op, Scanner};
use crate::value;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum LeafValue {
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Regex { source: String, compiled: Option<Arc<Regex>> },
}

impl PartialEq for LeafValue {
    fn eq(&self, other: &Self) -> bool {
        use LeafValue::*;
        match (self, other) {
            (Str(a), Str(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Real(a), Real(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Regex { source: a, .. }, Regex { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl LeafValue {
    fn unparse(&self) -> String {
        match self {
            LeafValue::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            LeafValue::Int(i) => i.to_string(),
            LeafValue::Real(r) => format_real(*r),
            LeafValue::Bool(b) => b.to_string(),
            LeafValue::Regex { source, .. } => source.clone(),
        }
    }
}

fn format_real(r: f64) -> String {
    let s = format!("{}", r);
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Leaf { field: String, op: Op, value: LeafValue },
}

/// Parse one predicate expression off a shared scanner, stopping at whatever token ends
/// the expression (end of input, `)`, `|`, or a top-level nQL keyword). Used both by
/// `Predicate::parse` and by the query grammar, which embeds predicates inline.
pub(crate) fn parse_expr(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    parse_or(s)
}

impl Predicate {
    pub fn parse(src: &str) -> Result<Predicate, crate::error::EngineError> {
        let mut s = Scanner::new(src);
        let p = parse_expr(&mut s)?;
        s.skip_ws();
        if !s.eof() {
            return Err(crate::error::EngineError::Parse(format!(
                "unexpected trailing input near '{}'",
                s.rest_trimmed()
            )));
        }
        Ok(p)
    }

    /// Canonical stringification used by the parse-unparse round-trip property: fully
    /// parenthesized, uppercase boolean keywords, canonical operator spelling.
    pub fn unparse(&self) -> String {
        match self {
            Predicate::And(a, b) => format!("({} AND {})", a.unparse(), b.unparse()),
            Predicate::Or(a, b) => format!("({} OR {})", a.unparse(), b.unparse()),
            Predicate::Not(a) => format!("NOT {}", a.unparse()),
            Predicate::Leaf { field, op, value } => {
                format!("{} {} {}", field, op.as_str(), value.unparse())
            }
        }
    }

    /// Evaluate the predicate against a JSON payload. Missing fields and regex-compile
    /// failures degrade to `false` rather than raising.
    pub fn eval(&self, payload: &Value) -> bool {
        match self {
            Predicate::And(a, b) => a.eval(payload) && b.eval(payload),
            Predicate::Or(a, b) => a.eval(payload) || b.eval(payload),
            Predicate::Not(a) => !a.eval(payload),
            Predicate::Leaf { field, op, value } => eval_leaf(payload, field, *op, value),
        }
    }
}

fn eval_leaf(payload: &Value, field: &str, op: Op, lit: &LeafValue) -> bool {
    let Some(fv) = value::field_lookup(payload, field) else {
        return false;
    };
    match op {
        Op::Eq => values_equal(fv, lit),
        Op::Ne => !values_equal(fv, lit),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => numeric_compare(fv, lit, op),
        Op::RegexMatch | Op::RegexNotMatch => {
            let LeafValue::Regex { compiled, .. } = lit else {
                return false;
            };
            let (Some(s), Some(re)) = (fv.as_str(), compiled.as_ref()) else {
                return false;
            };
            let hit = re.is_match(s);
            if op == Op::RegexMatch {
                hit
            } else {
                !hit
            }
        }
        Op::In => fv
            .as_array()
            .map(|arr| arr.iter().any(|x| values_equal(x, lit)))
            .unwrap_or(false),
        Op::Contains => match (fv.as_str(), lit) {
            (Some(s), LeafValue::Str(needle)) => s.contains(needle.as_str()),
            _ => false,
        },
    }
}

fn values_equal(fv: &Value, lit: &LeafValue) -> bool {
    match lit {
        LeafValue::Str(s) => fv.as_str() == Some(s.as_str()),
        LeafValue::Bool(b) => fv.as_bool() == Some(*b),
        LeafValue::Int(i) => {
            if value::is_real(fv) {
                value::as_f64(fv) == Some(*i as f64)
            } else {
                fv.as_i64() == Some(*i)
            }
        }
        LeafValue::Real(r) => value::as_f64(fv) == Some(*r),
        LeafValue::Regex { .. } => false,
    }
}

fn numeric_compare(fv: &Value, lit: &LeafValue, op: Op) -> bool {
    let (is_real, litf) = match lit {
        LeafValue::Int(i) => (false, *i as f64),
        LeafValue::Real(r) => (true, *r),
        _ => return false,
    };
    match value::numeric_cmp(fv, is_real, litf) {
        Some(ord) => match op {
            Op::Lt => ord.is_lt(),
            Op::Le => ord.is_le(),
            Op::Gt => ord.is_gt(),
            Op::Ge => ord.is_ge(),
            _ => false,
        },
        None => false,
    }
}

fn parse_or(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    let mut left = parse_and(s)?;
    loop {
        let checkpoint = s.pos();
        if s.take_keyword("or") {
            let right = parse_and(s)?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        } else {
            s.set_pos(checkpoint);
            break;
        }
    }
    Ok(left)
}

fn parse_and(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    let mut left = parse_not(s)?;
    loop {
        let checkpoint = s.pos();
        if s.take_keyword("and") {
            let right = parse_not(s)?;
            left = Predicate::And(Box::new(left), Box::new(right));
        } else {
            s.set_pos(checkpoint);
            break;
        }
    }
    Ok(left)
}

fn parse_not(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    if s.take_keyword("not") {
        Ok(Predicate::Not(Box::new(parse_not(s)?)))
    } else {
        parse_atom(s)
    }
}

fn parse_atom(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    if s.take_char('(') {
        let inner = parse_or(s)?;
        if !s.take_char(')') {
            return Err(crate::error::EngineError::Parse("expected ')'".into()));
        }
        return Ok(inner);
    }
    parse_leaf(s)
}

fn parse_leaf(s: &mut Scanner) -> Result<Predicate, crate::error::EngineError> {
    let field = s
        .take_ident()
        .ok_or_else(|| crate::error::EngineError::Parse("expected field path".into()))?;
    let op = s
        .take_op()
        .ok_or_else(|| crate::error::EngineError::Parse("expected comparison operator".into()))?;
    let value = match op {
        Op::RegexMatch | Op::RegexNotMatch => {
            let source = s
                .take_raw_token()
                .ok_or_else(|| crate::error::EngineError::Parse("expected regex literal".into()))?;
            let compiled = Regex::new(&format!("^(?:{})$", source)).ok().map(Arc::new);
            LeafValue::Regex { source, compiled }
        }
        _ => parse_literal(s)?,
    };
    Ok(Predicate::Leaf { field, op, value })
}

fn parse_literal(s: &mut Scanner) -> Result<LeafValue, crate::error::EngineError> {
    if let Some(text) = s.take_string()? {
        return Ok(LeafValue::Str(text));
    }
    if s.take_keyword("true") {
        return Ok(LeafValue::Bool(true));
    }
    if s.take_keyword("false") {
        return Ok(LeafValue::Bool(false));
    }
    if let Some(num) = s.take_number() {
        return if num.contains('.') {
            num.parse::<f64>()
                .map(LeafValue::Real)
                .map_err(|_| crate::error::EngineError::Parse(format!("invalid real literal '{}'", num)))
        } else {
            num.parse::<i64>()
                .map(LeafValue::Int)
                .map_err(|_| crate::error::EngineError::Parse(format!("invalid integer literal '{}'", num)))
        };
    }
    Err(crate::error::EngineError::Parse("expected a string, number, true, false or regex".into()))
}
