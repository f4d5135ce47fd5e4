use serde_json::Value;
use sha2::{Digest, Sha256};

use transflow_core::Record;

/// Content address of one (rule, revision, record) evaluation.
///
/// Two records that differ only in key order produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    rule: String,
    digest: String,
}

impl Fingerprint {
    pub fn new(rule: &str, revision: u64, record: &Record) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(rule.as_bytes());
        hasher.update([0u8]);
        hasher.update(revision.to_string().as_bytes());
        hasher.update([0u8]);
        write_object(&mut hasher, record);
        Self {
            rule: rule.to_string(),
            digest: hex::encode(hasher.finalize()),
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Hex SHA-256 digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Backend key: `{namespace}:{rule}:{digest}`.
    pub fn key(&self, namespace: &str) -> String {
        format!("{}:{}:{}", namespace, self.rule, self.digest)
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    // serde_json string escaping is total for &str.
    let quoted = serde_json::to_string(s).unwrap_or_default();
    hasher.update(quoted.as_bytes());
}

fn write_object(hasher: &mut Sha256, map: &serde_json::Map<String, Value>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    hasher.update(b"{");
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        write_str(hasher, key);
        hasher.update(b":");
        write_value(hasher, &map[key]);
    }
    hasher.update(b"}");
}

/// Canonical JSON: object keys sorted at every depth, no whitespace.
fn write_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"null"),
        Value::Bool(b) => hasher.update(if *b { &b"true"[..] } else { &b"false"[..] }),
        Value::Number(n) => hasher.update(n.to_string().as_bytes()),
        Value::String(s) => write_str(hasher, s),
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_value(hasher, item);
            }
            hasher.update(b"]");
        }
        Value::Object(map) => write_object(hasher, map),
    }
}
