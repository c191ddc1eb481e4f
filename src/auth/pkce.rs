//! PKCE S256 verifier and challenge generation
//!
//! This module implements the Proof Key for Code Exchange (PKCE) extension
//! to OAuth 2.0 as defined in RFC 7636, specifically the `S256` challenge
//! method.
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy random string called the `code_verifier`.
//! 2. The client computes a SHA-256 hash of the verifier and base64url-encodes
//!    it to produce the `code_challenge`.
//! 3. The authorization request includes `code_challenge` and
//!    `code_challenge_method=S256`.
//! 4. The token exchange request includes the original `code_verifier`.
//!
//! Randomness comes from a [`RandomSource`] injected by the caller, so the
//! engine never has to detect which runtime it is running in.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Number of random bytes behind every code verifier.
pub const CODE_VERIFIER_BYTES: usize = 32;

/// The only challenge method this crate emits.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

// ---------------------------------------------------------------------------
// RandomSource
// ---------------------------------------------------------------------------

/// A source of cryptographically secure random bytes.
///
/// Implement this to plug in a platform-specific generator (a hardware
/// module, a host-provided API, a deterministic source in tests).
pub trait RandomSource: Send + Sync {
    /// Fills `dest` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying generator is unavailable.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// [`RandomSource`] backed by the operating system via `rand`'s thread-local
/// CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        use rand::RngCore as _;
        rand::rng().fill_bytes(dest);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PkceChallenge
// ---------------------------------------------------------------------------

/// A PKCE S256 challenge pair consisting of a verifier and its derived
/// challenge value.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::pkce::{OsRandomSource, PkceChallenge};
///
/// let challenge = PkceChallenge::generate(&OsRandomSource).unwrap();
/// assert_eq!(challenge.method, "S256");
/// assert_eq!(challenge.verifier.len(), 43);
/// ```
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// The code verifier: 32 random bytes, base64url-encoded without padding.
    ///
    /// Sent to the token endpoint in the `code_verifier` parameter.
    pub verifier: String,

    /// The base64url-encoded (no padding) SHA-256 digest of the verifier.
    ///
    /// Sent to the authorization endpoint in the `code_challenge` parameter.
    pub challenge: String,

    /// The challenge method. Always `"S256"`.
    pub method: String,
}

impl PkceChallenge {
    /// Generates a fresh verifier from `random` and derives its challenge.
    ///
    /// # Errors
    ///
    /// Propagates failures of the random source.
    pub fn generate(random: &dyn RandomSource) -> Result<Self> {
        let verifier = generate_code_verifier(random)?;
        let challenge = derive_code_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
            method: CODE_CHALLENGE_METHOD.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Generates a code verifier: 32 random bytes encoded as base64url without
/// padding (43 characters).
///
/// # Errors
///
/// Propagates failures of the random source.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::pkce::{generate_code_verifier, OsRandomSource};
///
/// let verifier = generate_code_verifier(&OsRandomSource).unwrap();
/// assert_eq!(verifier.len(), 43);
/// ```
pub fn generate_code_verifier(random: &dyn RandomSource) -> Result<String> {
    let mut random_bytes = [0u8; CODE_VERIFIER_BYTES];
    random.fill_bytes(&mut random_bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes))
}

/// Derives the `S256` code challenge for `verifier`.
///
/// `BASE64URL(SHA256(ASCII(code_verifier)))` per RFC 7636 section 4.2.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::pkce::derive_code_challenge;
///
/// assert_eq!(
///     derive_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
///     "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
/// );
/// ```
pub fn derive_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
