//! Seeded CryptoProvider implementation for deterministic testing.

use std::sync::{Arc, Mutex, PoisonError};

use opensend_crypto::{CryptoError, CryptoProvider, HashAlgorithm, SystemCrypto};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Simulation crypto provider.
///
/// - **Digests**: real SHA-384, identical to [`SystemCrypto`], so envelopes
///   stamped in simulation verify against production code.
/// - **Seeded RNG**: challenges come from ChaCha20Rng seeded with a fixed
///   value, so the same scenario always issues the same challenges.
///
/// Clones share RNG state (important for a proper RNG sequence).
#[derive(Debug, Clone)]
pub struct SimCrypto {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimCrypto {
    /// Create a new SimCrypto with default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a new SimCrypto with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimCrypto {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for SimCrypto {
    fn digest(&self, algorithm: HashAlgorithm, bytes: &[u8]) -> String {
        SystemCrypto.digest(algorithm, bytes)
    }

    fn secure_random(&self, length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut buffer = vec![0u8; length];
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(&mut buffer);
        Ok(buffer)
    }
}
