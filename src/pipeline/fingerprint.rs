//! Request keys for the response cache.

use crate::core::{ContextItemId, INTENT_SET_VERSION, Intent};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Normalizes message text for keying: trims, collapses whitespace runs to
/// one space and lowercases.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key of a generated answer: normalized text, intent, intent-set
/// version and the identifiers of the context used, hex-encoded SHA-256.
///
/// Context order matters; the retriever always returns a canonical order.
#[must_use]
pub fn fingerprint(normalized: &str, intent: Intent, context: &[ContextItemId]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([0]);
    hasher.update(intent.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(INTENT_SET_VERSION.to_le_bytes());
    for id in context {
        hasher.update([0]);
        hasher.update(id.to_string().as_bytes());
    }

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Cool-down key of a request: normalized text and intent only, so it can
/// be checked before retrieval.
#[must_use]
pub fn cooldown_key(normalized: &str, intent: Intent) -> String {
    format!("{intent}\u{1f}{normalized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  진료과를\n\t알려주세요  "), "진료과를 알려주세요");
        assert_eq!(normalize("Clinic   HOURS"), "clinic hours");
    }

    #[test]
    fn test_fingerprint_stable_and_hex() {
        let ids = [ContextItemId::Fragment { chunk_id: 1 }];
        let a = fingerprint("진료과", Intent::InfoQuery, &ids);
        assert_eq!(a, fingerprint("진료과", Intent::InfoQuery, &ids));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_depends_on_every_part() {
        let one = [ContextItemId::Fragment { chunk_id: 1 }];
        let two = [ContextItemId::Fragment { chunk_id: 2 }];
        let base = fingerprint("진료과", Intent::InfoQuery, &one);
        assert_ne!(base, fingerprint("진료과", Intent::Fallback, &one));
        assert_ne!(base, fingerprint("진료과", Intent::InfoQuery, &two));
        assert_ne!(base, fingerprint("진료과 ", Intent::InfoQuery, &one));
        assert_ne!(base, fingerprint("진료과", Intent::InfoQuery, &[]));
    }

    #[test]
    fn test_cooldown_key_ignores_context() {
        assert_eq!(
            cooldown_key(&normalize("Hello  there"), Intent::Fallback),
            cooldown_key(&normalize("hello there"), Intent::Fallback)
        );
    }
}
