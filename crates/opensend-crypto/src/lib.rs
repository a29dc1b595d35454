//! Crypto provider for the OpenSend client.
//!
//! The protocol engine needs exactly two primitives: a hex digest for
//! envelope integrity stamps and secure random bytes for authentication
//! challenges. Both sit behind [`CryptoProvider`] so the engine can run
//! against a seeded provider in tests.
//!
//! # Security
//!
//! [`SystemCrypto`] draws randomness from the OS entropy pool via `getrandom`.
//! Never back a production provider with a non-cryptographic RNG.
#![forbid(unsafe_code)]

use std::fmt;

use sha2::{Digest, Sha384};
use thiserror::Error;

/// Digest algorithms supported for envelope hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-384 (the only algorithm the protocol defines)
    #[default]
    Sha384,
}

impl HashAlgorithm {
    /// Wire name used in the envelope's `hash.algorithm` field.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha384 => "sha384",
        }
    }

    /// Look up an algorithm by wire name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("sha384") { Some(Self::Sha384) } else { None }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from the crypto provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The entropy source could not produce bytes
    #[error("entropy source failed: {0}")]
    Entropy(String),
}

/// Digest and randomness primitives consumed by the protocol engine.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Digest `bytes` and return the lowercase hex encoding.
    fn digest(&self, algorithm: HashAlgorithm, bytes: &[u8]) -> String;

    /// Produce `length` cryptographically secure random bytes.
    fn secure_random(&self, length: usize) -> Result<Vec<u8>, CryptoError>;
}

/// Production provider: `sha2` digests, OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCrypto;

impl CryptoProvider for SystemCrypto {
    fn digest(&self, algorithm: HashAlgorithm, bytes: &[u8]) -> String {
        match algorithm {
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
        }
    }

    fn secure_random(&self, length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut buffer = vec![0u8; length];
        getrandom::fill(&mut buffer).map_err(|e| CryptoError::Entropy(e.to_string()))?;
        Ok(buffer)
    }
}
