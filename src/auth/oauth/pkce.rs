use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const VERIFIER_LENGTH: usize = 64;
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE verifier/challenge pair for one authorization round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    code_verifier: String,
    code_challenge: String,
}

impl PkcePair {
    /// Generates a new pair using the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let verifier: String = (0..VERIFIER_LENGTH)
            .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();
        Self::from_verifier(verifier)
    }

    /// Rebuilds the pair from a verifier stored before the redirect.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let code_verifier = verifier.into();
        let digest = Sha256::digest(code_verifier.as_bytes());
        let code_challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
        Self {
            code_verifier,
            code_challenge,
        }
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// Base64url (unpadded) SHA-256 of the verifier.
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Challenge method in the lowercase form the identity service expects.
    pub fn method(&self) -> &'static str {
        "s256"
    }
}
