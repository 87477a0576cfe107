//! PKCE and state generation for the authorization code flow

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A PKCE verifier/challenge pair (method `S256`).
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// The `code_verifier` sent with the token exchange.
    pub verifier: String,
    /// The `code_challenge` sent with the authorization request.
    pub challenge: String,
}

impl PkcePair {
    /// Generates a fresh pair: 32 random bytes, URL-safe base64 encoded,
    /// with the challenge as the base64url SHA-256 of the verifier text.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generates a random `state` value for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
