//! Verification of the server's signature over our challenge.
//!
//! The protocol does not fix a signature scheme, so the runtime asks a
//! [`ChallengeVerifier`] and feeds the verdict back into the connection.

use std::collections::HashMap;

use tracing::warn;

/// Decides whether a challenge answer is genuine.
pub trait ChallengeVerifier: Send + Sync + 'static {
    /// Check `signed` as the signature of `challenge` by server `uuid`.
    fn verify(&self, uuid: &str, challenge: &str, signed: &str) -> bool;
}

impl<F> ChallengeVerifier for F
where
    F: Fn(&str, &str, &str) -> bool + Send + Sync + 'static,
{
    fn verify(&self, uuid: &str, challenge: &str, signed: &str) -> bool {
        self(uuid, challenge, signed)
    }
}

/// Verifier backed by a table of known server signatures.
///
/// An answer from a listed server is accepted when its signature matches the
/// configured one. Unlisted servers are rejected unless `accept_unverified`
/// is set. The default table is empty and rejects every answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedServers {
    signatures: HashMap<String, String>,
    accept_unverified: bool,
}

impl TrustedServers {
    /// Trust `uuid` when it answers with `signed`.
    #[must_use]
    pub fn trust(mut self, uuid: impl Into<String>, signed: impl Into<String>) -> Self {
        self.signatures.insert(uuid.into(), signed.into());
        self
    }

    /// Accept answers from servers that are not in the table.
    #[must_use]
    pub fn accept_unverified(mut self, accept: bool) -> Self {
        self.accept_unverified = accept;
        self
    }

    /// Number of servers with a known signature.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// True when no server signature is known.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl ChallengeVerifier for TrustedServers {
    fn verify(&self, uuid: &str, _challenge: &str, signed: &str) -> bool {
        match self.signatures.get(uuid) {
            Some(expected) if expected == signed => true,
            Some(_) => {
                warn!(uuid, "signature does not match the trusted one");
                false
            },
            None if self.accept_unverified => {
                warn!(uuid, "accepting answer from an unknown server");
                true
            },
            None => {
                warn!(uuid, "unknown server; rejecting challenge answer");
                false
            },
        }
    }
}
