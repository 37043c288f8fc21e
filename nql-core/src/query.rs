//! The nQL top-level grammar: pipelines of filter/show/aggregate/correlate stages.

use crate::error::EngineError;
use crate::lexer::Scanner;
use crate::predicate::{self, Predicate};

#[derive(Debug, Clone, PartialEq)]
pub enum AggFunc {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
    Percentile(String, f64),
    Distinct(String),
}

impl AggFunc {
    pub fn field(&self) -> Option<&str> {
        match self {
            AggFunc::Count => None,
            AggFunc::Sum(f) | AggFunc::Avg(f) | AggFunc::Min(f) | AggFunc::Max(f) | AggFunc::Distinct(f) => Some(f),
            AggFunc::Percentile(f, _) => Some(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    None,
    Tumbling(u64),
    Sliding(u64, u64),
    Session(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowFields {
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Filter(Predicate),
    Show {
        fields: ShowFields,
        where_pred: Option<Predicate>,
    },
    Correlate {
        left: Predicate,
        right: Predicate,
        within_ms: u64,
    },
    Aggregate {
        funcs: Vec<AggFunc>,
        by: Vec<String>,
        where_pred: Option<Predicate>,
        window: Window,
    },
    Pipeline(Vec<Query>),
}

impl Query {
    pub fn parse(src: &str) -> Result<Query, EngineError> {
        let mut s = Scanner::new(src);
        let q = parse_pipeline(&mut s)?;
        s.skip_ws();
        if !s.eof() {
            return Err(EngineError::Parse(format!(
                "unexpected trailing input near '{}'",
                s.rest_trimmed()
            )));
        }
        Ok(q)
    }
}

fn expect_char(s: &mut Scanner, c: char) -> Result<(), EngineError> {
    if s.take_char(c) {
        Ok(())
    } else {
        Err(EngineError::Parse(format!("expected '{}'", c)))
    }
}

fn parse_pipeline(s: &mut Scanner) -> Result<Query, EngineError> {
    let mut stages = vec![parse_stage(s)?];
    while s.take_char('|') {
        stages.push(parse_stage(s)?);
    }
    if stages.len() == 1 {
        Ok(stages.pop().expect("len == 1"))
    } else {
        Ok(Query::Pipeline(stages))
    }
}

fn parse_stage(s: &mut Scanner) -> Result<Query, EngineError> {
    if s.take_keyword("correlate") {
        return parse_correlate(s);
    }
    if s.take_keyword("aggregate") {
        return parse_aggregate(s);
    }
    if s.take_keyword("show") {
        return parse_show(s);
    }
    Ok(Query::Filter(predicate::parse_expr(s)?))
}

fn parse_correlate(s: &mut Scanner) -> Result<Query, EngineError> {
    let left = predicate::parse_expr(s)?;
    s.expect_keyword("with")?;
    let right = predicate::parse_expr(s)?;
    let within_ms = if s.take_keyword("within") { parse_duration(s)? } else { 100 };
    Ok(Query::Correlate { left, right, within_ms })
}

fn parse_duration(s: &mut Scanner) -> Result<u64, EngineError> {
    let raw = s
        .take_number()
        .ok_or_else(|| EngineError::Parse("expected a duration, e.g. '100ms'".into()))?;
    let n: u64 = raw
        .parse()
        .map_err(|_| EngineError::Parse(format!("duration must be a non-negative integer, got '{}'", raw)))?;
    if s.take_keyword("ms") {
        Ok(n)
    } else if s.take_keyword("s") {
        Ok(n * 1_000)
    } else if s.take_keyword("m") {
        Ok(n * 60_000)
    } else if s.take_keyword("h") {
        Ok(n * 3_600_000)
    } else {
        Err(EngineError::Parse("expected duration unit 'ms', 's', 'm' or 'h'".into()))
    }
}

fn parse_agg(s: &mut Scanner) -> Result<AggFunc, EngineError> {
    if s.take_keyword("count") {
        expect_char(s, '(')?;
        expect_char(s, ')')?;
        return Ok(AggFunc::Count);
    }
    if s.take_keyword("percentile") {
        expect_char(s, '(')?;
        let field = s.take_ident().ok_or_else(|| EngineError::Parse("expected field".into()))?;
        expect_char(s, ',')?;
        let p = s
            .take_number()
            .ok_or_else(|| EngineError::Parse("expected percentile number".into()))?
            .parse::<f64>()
            .map_err(|_| EngineError::Parse("invalid percentile number".into()))?;
        expect_char(s, ')')?;
        return Ok(AggFunc::Percentile(field, p));
    }
    for (kw, ctor) in [
        ("sum", AggFunc::Sum as fn(String) -> AggFunc),
        ("avg", AggFunc::Avg as fn(String) -> AggFunc),
        ("min", AggFunc::Min as fn(String) -> AggFunc),
        ("max", AggFunc::Max as fn(String) -> AggFunc),
        ("distinct", AggFunc::Distinct as fn(String) -> AggFunc),
    ] {
        if s.take_keyword(kw) {
            expect_char(s, '(')?;
            let field = s.take_ident().ok_or_else(|| EngineError::Parse("expected field".into()))?;
            expect_char(s, ')')?;
            return Ok(ctor(field));
        }
    }
    Err(EngineError::Parse(
        "expected one of count(), sum(f), avg(f), min(f), max(f), percentile(f, p), distinct(f)".into(),
    ))
}

fn parse_aggregate(s: &mut Scanner) -> Result<Query, EngineError> {
    let mut funcs = vec![parse_agg(s)?];
    while s.take_char(',') {
        funcs.push(parse_agg(s)?);
    }
    let mut by = Vec::new();
    if s.take_keyword("by") {
        by.push(s.take_ident().ok_or_else(|| EngineError::Parse("expected field after 'by'".into()))?);
        while s.take_char(',') {
            by.push(s.take_ident().ok_or_else(|| EngineError::Parse("expected field".into()))?);
        }
    }
    let where_pred = if s.take_keyword("where") {
        Some(predicate::parse_expr(s)?)
    } else {
        None
    };
    let window = if s.take_keyword("window") { parse_window(s)? } else { Window::None };
    Ok(Query::Aggregate { funcs, by, where_pred, window })
}

fn parse_window(s: &mut Scanner) -> Result<Window, EngineError> {
    if s.take_keyword("tumbling") {
        expect_char(s, '(')?;
        let d = parse_duration(s)?;
        expect_char(s, ')')?;
        return Ok(Window::Tumbling(d));
    }
    if s.take_keyword("sliding") {
        expect_char(s, '(')?;
        let size = parse_duration(s)?;
        expect_char(s, ',')?;
        let slide = parse_duration(s)?;
        expect_char(s, ')')?;
        return Ok(Window::Sliding(size, slide));
    }
    if s.take_keyword("session") {
        expect_char(s, '(')?;
        let timeout = parse_duration(s)?;
        expect_char(s, ')')?;
        return Ok(Window::Session(timeout));
    }
    Err(EngineError::Parse("expected window kind 'tumbling', 'sliding' or 'session'".into()))
}

fn parse_show(s: &mut Scanner) -> Result<Query, EngineError> {
    let fields = if s.take_char('*') {
        ShowFields::All
    } else {
        let mut fs = vec![s
            .take_ident()
            .ok_or_else(|| EngineError::Parse("expected a field or '*'".into()))?];
        while s.take_char(',') {
            fs.push(s.take_ident().ok_or_else(|| EngineError::Parse("expected field".into()))?);
        }
        ShowFields::Fields(fs)
    };
    let where_pred = if s.take_keyword("where") {
        Some(predicate::parse_expr(s)?)
    } else {
        None
    };
    Ok(Query::Show { fields, where_pred })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_predicate_is_a_filter() {
        let q = Query::parse("log.level == \"ERROR\"").unwrap();
        assert!(matches!(q, Query::Filter(_)));
    }

    #[test]
    fn correlate_default_within() {
        let q = Query::parse("correlate log.level == \"ERROR\" with network.dst_port == 3306").unwrap();
        match q {
            Query::Correlate { within_ms, .. } => assert_eq!(within_ms, 100),
            _ => panic!("expected Correlate"),
        }
    }

    #[test]
    fn correlate_explicit_within_unit_conversion() {
        let q = Query::parse("correlate a == 1 with b == 2 within 2m").unwrap();
        match q {
            Query::Correlate { within_ms, .. } => assert_eq!(within_ms, 120_000),
            _ => panic!("expected Correlate"),
        }
    }

    #[test]
    fn aggregate_with_group_by_and_window() {
        let q = Query::parse(
            "aggregate count(), avg(network.latency_ms) where log.level == \"ERROR\" by log.service window tumbling(1s)",
        );
        // `by` must precede `where`/`window` per the grammar; this ordering is invalid.
        assert!(q.is_err());
    }

    #[test]
    fn aggregate_full_form() {
        let q = Query::parse(
            "aggregate count(), avg(network.latency_ms) by log.service where log.level == \"ERROR\" window tumbling(1s)",
        )
        .unwrap();
        match q {
            Query::Aggregate { funcs, by, where_pred, window } => {
                assert_eq!(funcs.len(), 2);
                assert_eq!(by, vec!["log.service".to_string()]);
                assert!(where_pred.is_some());
                assert_eq!(window, Window::Tumbling(1_000));
            }
            _ => panic!("expected Aggregate"),
        }
    }

    #[test]
    fn sliding_and_session_windows() {
        let q = Query::parse("aggregate count() window sliding(1m, 10s)").unwrap();
        assert!(matches!(q, Query::Aggregate { window: Window::Sliding(60_000, 10_000), .. }));

        let q = Query::parse("aggregate count() window session(30s)").unwrap();
        assert!(matches!(q, Query::Aggregate { window: Window::Session(30_000), .. }));
    }

    #[test]
    fn percentile_agg_function() {
        let q = Query::parse("aggregate percentile(network.latency_ms, 95)").unwrap();
        match q {
            Query::Aggregate { funcs, .. } => {
                assert_eq!(funcs[0], AggFunc::Percentile("network.latency_ms".into(), 95.0));
            }
            _ => panic!("expected Aggregate"),
        }
    }

    #[test]
    fn show_star_and_fields() {
        let q = Query::parse("show *").unwrap();
        assert!(matches!(q, Query::Show { fields: ShowFields::All, where_pred: None }));

        let q = Query::parse("show a, b where c == 1").unwrap();
        match q {
            Query::Show { fields, where_pred } => {
                assert_eq!(fields, ShowFields::Fields(vec!["a".into(), "b".into()]));
                assert!(where_pred.is_some());
            }
            _ => panic!("expected Show"),
        }
    }

    #[test]
    fn pipeline_of_stages() {
        let q = Query::parse("log.level == \"ERROR\" | show *").unwrap();
        match q {
            Query::Pipeline(stages) => assert_eq!(stages.len(), 2),
            _ => panic!("expected Pipeline"),
        }
    }

    #[test]
    fn regex_with_alternation_does_not_split_pipeline() {
        let q = Query::parse(r#"message =~ fail|error"#).unwrap();
        assert!(matches!(q, Query::Filter(_)));
    }

    #[test]
    fn unknown_stage_error_message() {
        let err = Query::parse("correlate a == 1 with b == 2 xyz").unwrap_err();
        match err {
            EngineError::Parse(msg) => assert!(msg.contains("trailing")),
            _ => panic!("expected Parse error"),
        }
    }
}
