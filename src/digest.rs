//! Content digests for sourced nodes.
//!
//! A digest is the SHA256 of the canonical JSON encoding of a node's field
//! mapping. `serde_json::Map` keeps keys sorted, so two mappings with the
//! same fields and values always encode (and therefore hash) identically,
//! regardless of the order the remote source returned them in.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute the SHA256 content digest of a serializable value.
///
/// The value is serialized to JSON, then hashed. The digest depends on the
/// value only, never on which entity type it was sourced for, so it can be
/// used to detect unchanged data across runs.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized to JSON.
pub fn content_digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check if a node has changed since it was last stored.
///
/// Returns `true` if there is no stored digest or the digests differ.
#[must_use]
pub fn has_changed(current_digest: &str, stored_digest: Option<&str>) -> bool {
    stored_digest.is_none_or(|d| d != current_digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_deterministic() {
        let fields = json!({"handle": "shirt", "locale": "en-us", "title": "Shirt"});

        let d1 = content_digest(&fields).unwrap();
        let d2 = content_digest(&fields).unwrap();

        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"handle":"shirt","title":"Shirt"}"#).unwrap();
        let b: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"title":"Shirt","handle":"shirt"}"#).unwrap();

        assert_eq!(content_digest(&a).unwrap(), content_digest(&b).unwrap());
    }

    #[test]
    fn test_digest_changes_with_any_field() {
        let a = json!({"handle": "shirt", "title": "Shirt"});
        let b = json!({"handle": "shirt", "title": "Shirt!"});

        assert_ne!(content_digest(&a).unwrap(), content_digest(&b).unwrap());
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
