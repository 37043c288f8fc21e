//! Field-path resolution and numeric coercion over the JSON-like structured value.
//!
//! The value representation itself (`serde_json::Value`) is an external collaborator;
//! this module is the part of the value model that belongs to the core: the dotted-path
//! lookup rule and the int/real coercion used when comparing two numbers.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Common field synonyms normalized before lookup is attempted. Additive sugar on top
/// of the literal-then-split-on-dot rule below — it never changes that rule, it just
/// gives the literal-key attempt a better first guess.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("src_ip", "source_ip");
    m.insert("srcip", "source_ip");
    m.insert("dst_ip", "destination_ip");
    m.insert("dest_ip", "destination_ip");
    m.insert("dstip", "destination_ip");
    m.insert("src_port", "source_port");
    m.insert("dst_port", "destination_port");
    m.insert("dest_port", "destination_port");
    m.insert("user", "user_name");
    m.insert("username", "user_name");
    m
});

pub(crate) fn canonicalize(field: &str) -> &str {
    ALIASES.get(field).copied().unwrap_or(field)
}

/// Resolve a dotted field path against a payload.
///
/// Resolution order: first attempt a flat lookup using the whole path as a literal
/// object key (after alias canonicalization). If that's absent, split the path on its
/// first dot and, if the first segment names a JSON object, recurse into it with the
/// remaining path. Returns `None` if the path bottoms out anywhere that isn't an
/// object, or the final key is absent.
pub fn field_lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let obj = payload.as_object()?;
    let canon = canonicalize(path);
    if let Some(v) = obj.get(canon) {
        return Some(v);
    }
    if canon != path {
        if let Some(v) = obj.get(path) {
            return Some(v);
        }
    }
    let (head, tail) = path.split_once('.')?;
    let child = obj.get(head)?;
    field_lookup(child, tail)
}

/// Returns `v` as an `f64` if it is a JSON number (int or real), else `None`.
pub fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

/// True if the field holds a real number (has a fractional representation), as opposed
/// to an integer, matching the int/real distinction nQL's grammar draws at parse time.
pub fn is_real(v: &Value) -> bool {
    v.is_f64()
}

/// Numeric comparison per §4.1: if either side is a real, both are compared as reals;
/// otherwise compared as integers. Returns `None` if either side isn't numeric.
pub fn numeric_cmp(field: &Value, literal_is_real: bool, literal: f64) -> Option<std::cmp::Ordering> {
    if field.is_i64() && !literal_is_real {
        let fi = field.as_i64()?;
        let li = literal as i64;
        return Some(fi.cmp(&li));
    }
    let fv = as_f64(field)?;
    fv.partial_cmp(&literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_lookup_wins_over_nested_split() {
        let payload = json!({ "a.b": "flat", "a": { "b": "nested" } });
        assert_eq!(field_lookup(&payload, "a.b").unwrap(), "flat");
    }

    #[test]
    fn falls_back_to_split_on_dot_when_flat_key_absent() {
        let payload = json!({ "a": { "b": "nested" } });
        assert_eq!(field_lookup(&payload, "a.b").unwrap(), "nested");
    }

    #[test]
    fn deep_nesting_recurses() {
        let payload = json!({ "a": { "b": { "c": 42 } } });
        assert_eq!(field_lookup(&payload, "a.b.c").unwrap(), 42);
    }

    #[test]
    fn missing_path_is_none() {
        let payload = json!({ "a": 1 });
        assert!(field_lookup(&payload, "a.b").is_none());
        assert!(field_lookup(&payload, "z").is_none());
    }

    #[test]
    fn non_object_intermediate_is_none() {
        let payload = json!({ "a": 1 });
        assert!(field_lookup(&payload, "a.b.c").is_none());
    }

    #[test]
    fn alias_canonicalizes_before_flat_lookup() {
        let payload = json!({ "source_ip": "10.0.0.1" });
        assert_eq!(field_lookup(&payload, "src_ip").unwrap(), "10.0.0.1");
    }

    #[test]
    fn int_vs_int_compares_as_int() {
        let field = json!(5);
        assert_eq!(numeric_cmp(&field, false, 5.0), Some(std::cmp::Ordering::Equal));
    }

    #[test]
    fn int_field_vs_real_literal_compares_as_real() {
        let field = json!(5);
        assert_eq!(numeric_cmp(&field, true, 5.5), Some(std::cmp::Ordering::Less));
    }
}
