//! Request fingerprints used as cache and in-flight keys

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic key for a request, derived from its path and body
///
/// The body is serialized canonically (object keys sorted, no whitespace)
/// before hashing, so two bodies that differ only in key order share a
/// fingerprint. The hex digest doubles as a cache file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Computes the fingerprint for `path` with an optional JSON body
    pub fn new(path: &str, body: Option<&Value>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        match body {
            Some(body) => {
                let mut canonical = String::new();
                write_canonical(body, &mut canonical);
                // Separator byte keeps "path" + "body" from colliding with a
                // longer path and a shorter body.
                hasher.update([0x1f_u8]);
                hasher.update(canonical.as_bytes());
            }
            None => hasher.update([0x00_u8]),
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds a fingerprint from a stored digest, rejecting anything that
    /// is not a 64-char lowercase hex string
    pub fn from_hex(digest: &str) -> Option<Self> {
        let valid = digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(digest.to_string()))
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for log lines
        f.write_str(&self.0[..12])
    }
}

/// Writes `value` as compact JSON with object keys in sorted order
///
/// `serde_json::Map` only iterates sorted while the `preserve_order` feature
/// is off, and any crate in the graph can switch it on, so keys are sorted here.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
