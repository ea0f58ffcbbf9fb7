//! Deterministic request fingerprints.

use crate::algorithms::AlgorithmHint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest over every input that affects a route result.
///
/// Two requests with equal fingerprints are the same request for caching
/// purposes. The timeout and the idempotency key are deliberately not part
/// of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(graph_hash: &str, start: &str, goal: &str, hint: AlgorithmHint) -> Self {
        let mut hasher = Sha256::new();
        for part in [graph_hash, start, goal, hint.as_str()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, enough to correlate log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Fingerprint::compute("abc", "A", "B", AlgorithmHint::Auto);
        let b = Fingerprint::compute("abc", "A", "B", AlgorithmHint::Auto);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_every_input_contributes() {
        let base = Fingerprint::compute("abc", "A", "B", AlgorithmHint::Auto);
        assert_ne!(base, Fingerprint::compute("abd", "A", "B", AlgorithmHint::Auto));
        assert_ne!(base, Fingerprint::compute("abc", "B", "A", AlgorithmHint::Auto));
        assert_ne!(base, Fingerprint::compute("abc", "A", "B", AlgorithmHint::Dijkstra));
        // Length prefixes keep field boundaries unambiguous
        assert_ne!(
            Fingerprint::compute("h", "AB", "C", AlgorithmHint::Auto),
            Fingerprint::compute("h", "A", "BC", AlgorithmHint::Auto)
        );
    }
}
