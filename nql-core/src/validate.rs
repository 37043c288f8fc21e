//! Optional DSL validation: a best-effort lint over a parsed query that flags field
//! references outside this domain's known vocabulary and suggests near matches.
//!
//! This is purely additive. Events are free-form JSON, so `value::field_lookup` still
//! treats any unrecognized field as simply absent at eval time (degrading to `false`,
//! never an error) regardless of what this pass says. A caller that wants friendlier
//! up-front diagnostics — a REPL, a query-file linter, a config-time check — can run
//! `validate` before executing, the way a compiler's validation pass catches a typo
//! before it silently becomes "never matches."

use crate::predicate::Predicate;
use crate::query::Query;
use crate::value;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Field names this domain's events commonly carry. Not a schema — any field is legal
/// at eval time — just the vocabulary the suggestion engine checks against.
static KNOWN_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "source_ip",
        "destination_ip",
        "source_port",
        "destination_port",
        "user_name",
        "level",
        "message",
        "service",
        "vendor",
        "product",
        "action",
        "device_time",
        "tags",
        "event_id",
    ])
});

/// Head segment of a dotted path that names a nested object (`network.latency_ms`,
/// `log.level`) rather than a leaf field, so the head isn't flagged as unknown itself.
static KNOWN_NAMESPACES: Lazy<HashSet<&'static str>> = Lazy::new(|| HashSet::from(["log", "network", "user", "device"]));

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiagnostic {
    pub field: String,
    pub message: String,
    pub suggestions: Vec<String>,
}

fn is_known(field: &str) -> bool {
    let canonical = value::canonicalize(field);
    if KNOWN_FIELDS.contains(canonical) || KNOWN_FIELDS.contains(field) {
        return true;
    }
    match field.split_once('.') {
        Some((head, _)) => KNOWN_NAMESPACES.contains(head),
        None => false,
    }
}

fn suggest(field: &str) -> Vec<String> {
    let lower = field.to_ascii_lowercase();
    let mut out: Vec<String> = KNOWN_FIELDS.iter().filter(|k| k.contains(lower.as_str()) || lower.contains(**k)).map(|k| k.to_string()).collect();
    out.sort();
    out.dedup();
    out
}

fn collect_predicate_fields(pred: &Predicate, out: &mut Vec<String>) {
    match pred {
        Predicate::And(a, b) | Predicate::Or(a, b) => {
            collect_predicate_fields(a, out);
            collect_predicate_fields(b, out);
        }
        Predicate::Not(a) => collect_predicate_fields(a, out),
        Predicate::Leaf { field, .. } => out.push(field.clone()),
    }
}

fn collect_query_fields(query: &Query, out: &mut Vec<String>) {
    match query {
        Query::Filter(p) => collect_predicate_fields(p, out),
        Query::Show { where_pred, .. } => {
            if let Some(p) = where_pred {
                collect_predicate_fields(p, out);
            }
        }
        Query::Correlate { left, right, .. } => {
            collect_predicate_fields(left, out);
            collect_predicate_fields(right, out);
        }
        Query::Aggregate { funcs, by, where_pred, .. } => {
            for f in funcs {
                if let Some(field) = f.field() {
                    out.push(field.to_string());
                }
            }
            out.extend(by.iter().cloned());
            if let Some(p) = where_pred {
                collect_predicate_fields(p, out);
            }
        }
        Query::Pipeline(stages) => {
            for stage in stages {
                collect_query_fields(stage, out);
            }
        }
    }
}

/// Walk every field reference in a parsed query and flag the ones outside the known
/// vocabulary, each with near-match suggestions. Reports each distinct field once.
pub fn validate(query: &Query) -> Vec<FieldDiagnostic> {
    let mut fields = Vec::new();
    collect_query_fields(query, &mut fields);
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter(|f| !is_known(f))
        .map(|field| {
            let suggestions = suggest(&field);
            FieldDiagnostic { message: format!("unknown field '{}'", field), suggestions, field }
        })
        .collect()
}
