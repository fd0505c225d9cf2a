use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

const VERIFIER_LENGTH: usize = 64;
const VERIFIER_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE pair for one authorization attempt.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    /// base64url(SHA-256(verifier)), no padding
    pub code_challenge: String,
}

impl PkceParams {
    pub const METHOD: &'static str = "S256";

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..VERIFIER_LENGTH)
            .map(|_| VERIFIER_CHARS[rng.gen_range(0..VERIFIER_CHARS.len())] as char)
            .collect();
        Self::from_verifier(code_verifier)
    }

    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
        Self {
            code_verifier,
            code_challenge,
        }
    }
}
