//! Palo Alto Networks log parser: detects LEEF, CEF or bare syslog-with-kv
//! framing, extracts the vendor's key=value extension, and maps the handful
//! of fields the core cares about onto the names `nql_core::value` already
//! knows as aliases (`src_ip`, `dst_port`, `user`, ...), leaving everything
//! else attached verbatim so predicates can still reach it by its original key.

use crate::LineParser;
use chrono::{NaiveDateTime, Utc};
use nql_core::{Event, EventKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

static LEEF_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^LEEF:([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|?(.*)$").unwrap());
static CEF_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CEF:([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|(.*)$").unwrap());

enum Framing {
    Leef,
    Cef,
    Raw,
}

fn detect_framing(line: &str) -> Framing {
    if line.starts_with("LEEF:") {
        Framing::Leef
    } else if line.starts_with("CEF:") {
        Framing::Cef
    } else {
        Framing::Raw
    }
}

fn split_kv_pairs(extension: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for pair in extension.split_whitespace() {
        if let Some(eq_pos) = pair.find('=') {
            let key = pair[..eq_pos].trim();
            let value = pair[eq_pos + 1..].trim();
            if !key.is_empty() && !value.is_empty() {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }
    fields
}

fn parse_leef(line: &str) -> Option<HashMap<String, String>> {
    let caps = LEEF_HEADER.captures(line)?;
    let mut fields = split_kv_pairs(&caps[6]);
    fields.insert("vendor".to_string(), caps[2].to_string());
    fields.insert("product".to_string(), caps[3].to_string());
    fields.insert("event_id".to_string(), caps[5].to_string());
    Some(fields)
}

fn parse_cef(line: &str) -> Option<HashMap<String, String>> {
    let caps = CEF_HEADER.captures(line)?;
    let mut fields = split_kv_pairs(&caps[8]);
    fields.insert("vendor".to_string(), caps[2].to_string());
    fields.insert("product".to_string(), caps[3].to_string());
    fields.insert("name".to_string(), caps[6].to_string());
    fields.insert("severity".to_string(), caps[7].to_string());
    Some(fields)
}

/// `PaloAltoParser` never errors on a bad line; an unrecognized framing still
/// yields a best-effort event carrying the raw text as `message`, since a log
/// a human can't classify is still worth keeping for a `message =~` search.
#[derive(Debug, Default)]
pub struct PaloAltoParser;

impl PaloAltoParser {
    pub fn new() -> Self {
        PaloAltoParser
    }

    fn extract(&self, line: &str) -> HashMap<String, String> {
        match detect_framing(line) {
            Framing::Leef => parse_leef(line).unwrap_or_default(),
            Framing::Cef => parse_cef(line).unwrap_or_default(),
            Framing::Raw => split_kv_pairs(line),
        }
    }
}

impl LineParser for PaloAltoParser {
    fn parse(&self, raw_line: &str, source: &str, timestamp_ns: u64) -> Option<Event> {
        let raw_line = raw_line.trim();
        if raw_line.is_empty() {
            return None;
        }
        let fields = self.extract(raw_line);

        let mut payload = Map::new();
        payload.insert("vendor".to_string(), Value::from(fields.get("vendor").cloned().unwrap_or_else(|| "Palo Alto Networks".to_string())));
        payload.insert("product".to_string(), Value::from(fields.get("product").cloned().unwrap_or_else(|| "PAN-OS".to_string())));
        payload.insert("message".to_string(), Value::from(raw_line.to_string()));

        if let Some(src) = fields.get("src").or_else(|| fields.get("sourceAddress")) {
            payload.insert("source_ip".to_string(), Value::from(src.clone()));
        }
        if let Some(dst) = fields.get("dst").or_else(|| fields.get("destinationAddress")) {
            payload.insert("destination_ip".to_string(), Value::from(dst.clone()));
        }
        if let Some(sport) = fields.get("srcPort").or_else(|| fields.get("sourcePort")) {
            if let Ok(n) = sport.parse::<i64>() {
                payload.insert("source_port".to_string(), Value::from(n));
            }
        }
        if let Some(dport) = fields.get("dstPort").or_else(|| fields.get("destinationPort")) {
            if let Ok(n) = dport.parse::<i64>() {
                payload.insert("destination_port".to_string(), Value::from(n));
            }
        }
        if let Some(user) = fields.get("srcUser").or_else(|| fields.get("user")) {
            payload.insert("user_name".to_string(), Value::from(user.clone()));
        }
        if let Some(ts) = fields.get("devTime").or_else(|| fields.get("timestamp")) {
            if let Ok(dt) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
                payload.insert("device_time".to_string(), Value::from(dt.and_utc().to_rfc3339()));
            }
        } else {
            payload.insert("device_time".to_string(), Value::from(Utc::now().to_rfc3339()));
        }
        if let Some(action) = fields.get("act").or_else(|| fields.get("action")) {
            let level = match action.to_lowercase().as_str() {
                "deny" | "drop" | "block" | "reset" | "reject" => "ERROR",
                _ => "INFO",
            };
            payload.insert("level".to_string(), Value::from(level));
            payload.insert("action".to_string(), Value::from(action.clone()));
        }

        const MAPPED: &[&str] = &[
            "vendor", "product", "src", "sourceAddress", "dst", "destinationAddress", "srcPort", "sourcePort", "dstPort",
            "destinationPort", "srcUser", "user", "act", "action", "devTime", "timestamp",
        ];
        for (key, value) in &fields {
            if !MAPPED.contains(&key.as_str()) {
                payload.insert(key.clone(), Value::from(value.clone()));
            }
        }

        Some(Event::with_source(EventKind::Network, timestamp_ns, source.to_string(), Value::Object(payload)))
    }
}
