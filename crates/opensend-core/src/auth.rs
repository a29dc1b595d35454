//! Authentication challenge tracking.
//!
//! When the server identifies itself, the client generates a random challenge
//! and asks the server to sign it. At most one challenge is pending per
//! connection; it is dropped once authentication completes, is rejected, times
//! out, or the connection goes away.

use opensend_crypto::{CryptoError, CryptoProvider};

/// Random bytes of entropy per challenge.
pub const CHALLENGE_LENGTH: usize = 512;

/// A challenge issued to an identified server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationChallenge {
    uuid: String,
    challenge: String,
}

impl AuthenticationChallenge {
    /// Generate a fresh challenge for the server identified by `uuid`.
    ///
    /// The random bytes are hex-encoded so the challenge travels as a plain
    /// JSON string.
    pub fn generate<C: CryptoProvider>(
        uuid: impl Into<String>,
        crypto: &C,
    ) -> Result<Self, CryptoError> {
        let bytes = crypto.secure_random(CHALLENGE_LENGTH)?;
        Ok(Self { uuid: uuid.into(), challenge: hex::encode(bytes) })
    }

    /// Server identity the challenge was issued to.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The challenge string sent to the server.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Whether `candidate` is the challenge we issued.
    pub fn matches(&self, candidate: &str) -> bool {
        self.challenge == candidate
    }
}

/// Owner of the (at most one) pending challenge.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationFlow {
    pending: Option<AuthenticationChallenge>,
}

impl AuthenticationFlow {
    /// Issue a new challenge, replacing any pending one.
    pub fn begin<C: CryptoProvider>(
        &mut self,
        uuid: impl Into<String>,
        crypto: &C,
    ) -> Result<&AuthenticationChallenge, CryptoError> {
        let challenge = AuthenticationChallenge::generate(uuid, crypto)?;
        Ok(self.pending.insert(challenge))
    }

    /// The pending challenge, if any.
    pub fn pending(&self) -> Option<&AuthenticationChallenge> {
        self.pending.as_ref()
    }

    /// Remove and return the pending challenge.
    pub fn take(&mut self) -> Option<AuthenticationChallenge> {
        self.pending.take()
    }

    /// Drop the pending challenge.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
