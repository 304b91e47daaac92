//! RFC 6902 JSON-Patch construction and JSON-Pointer escaping (spec §4.2
//! step 2, §6 "JSON-Patch format", testable property 2).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// One RFC 6902 patch operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op")]
pub enum PatchOp {
    #[serde(rename = "add")]
    Add { path: String, value: Value },
    #[serde(rename = "remove")]
    Remove { path: String },
    #[serde(rename = "replace")]
    Replace { path: String, value: Value },
    #[serde(rename = "test")]
    Test { path: String, value: Value },
}

/// Escapes one JSON-Pointer reference token: `~` → `~0`, `/` → `~1`. Order
/// matters — `~` must be escaped first or a `/`-derived `~1` would be
/// mangled by a later `~` pass.
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Diffs `current` against `desired` finalizer lists (spec §4.2 step 2
/// "Finalizers: add / remove / replace / noop by empty-ness").
pub fn diff_finalizers(current: &[String], desired: &[String], path: &str) -> Option<PatchOp> {
    if current == desired {
        return None;
    }
    match (current.is_empty(), desired.is_empty()) {
        (true, true) => None,
        (true, false) => Some(PatchOp::Add {
            path: path.to_string(),
            value: serde_json::to_value(desired).unwrap(),
        }),
        (false, true) => Some(PatchOp::Remove {
            path: path.to_string(),
        }),
        (false, false) => Some(PatchOp::Replace {
            path: path.to_string(),
            value: serde_json::to_value(desired).unwrap(),
        }),
    }
}

/// Diffs `current` against `desired` annotation/label maps (spec §4.2 step
/// 2 "Annotations & labels").
///
/// - both absent → no ops;
/// - current absent, desired present → one `add` of the whole map;
/// - current present, desired absent → one `remove` of the whole map;
/// - both present and equal → no ops;
/// - both present and different → a `test` of the current map (to make the
///   patch optimistically-concurrent), then one `remove` per dropped key and
///   one `add`/`replace` per added/changed key, keys JSON-Pointer-escaped.
pub fn diff_map(
    path: &str,
    current: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> Vec<PatchOp> {
    match (current, desired) {
        (None, None) => vec![],
        (None, Some(d)) => vec![PatchOp::Add {
            path: path.to_string(),
            value: serde_json::to_value(d).unwrap(),
        }],
        (Some(_), None) => vec![PatchOp::Remove {
            path: path.to_string(),
        }],
        (Some(c), Some(d)) => {
            if c == d {
                return vec![];
            }
            let mut ops = Vec::new();
            ops.push(PatchOp::Test {
                path: path.to_string(),
                value: serde_json::to_value(c).unwrap(),
            });
            for key in c.keys() {
                if !d.contains_key(key) {
                    ops.push(PatchOp::Remove {
                        path: format!("{path}/{}", escape_pointer_token(key)),
                    });
                }
            }
            for (key, value) in d.iter() {
                match c.get(key) {
                    None => ops.push(PatchOp::Add {
                        path: format!("{path}/{}", escape_pointer_token(key)),
                        value: Value::String(value.clone()),
                    }),
                    Some(current_value) if current_value != value => ops.push(PatchOp::Replace {
                        path: format!("{path}/{}", escape_pointer_token(key)),
                        value: Value::String(value.clone()),
                    }),
                    _ => {}
                }
            }
            ops
        }
    }
}
