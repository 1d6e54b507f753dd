//! HMAC-SHA256 webhook signature verification.
//!
//! The digest is computed over the exact raw request bytes, never a
//! re-serialized JSON object, so key ordering and whitespace cannot break
//! verification. Comparison is constant time via [`Mac::verify_slice`].
//!
//! A configuration without a secret treats verification as not required
//! (vendors and configurations that predate signature support); the
//! ingestion coordinator logs such deliveries as unverified so operators
//! can audit exposure.

use crate::Vendor;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HTTP header carrying a vendor's signature digest.
pub fn signature_header(vendor: Vendor) -> &'static str {
    match vendor {
        Vendor::Msg91 => "x-msg91-signature",
        Vendor::Gupshup => "x-gupshup-signature",
        Vendor::Twilio => "x-twilio-signature",
        Vendor::Sendgrid => "x-sendgrid-signature",
    }
}

/// Signature verification failures.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Signature header value is not a hex digest.
    #[error("Signature is not valid hex")]
    MalformedSignature,

    /// Secret cannot be used as an HMAC key.
    #[error("Secret cannot be used as HMAC key")]
    InvalidKey,

    /// Computed digest does not match the provided signature.
    #[error("HMAC-SHA256 digest does not match")]
    Mismatch,
}

/// Stateless HMAC-SHA256 verifier.
///
/// Accepts digests in bare hex or `sha256=<hex>` form (several vendors
/// copied the GitHub convention).
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new verifier.
    pub fn new() -> Self {
        Self
    }

    /// Verify `signature` against the HMAC-SHA256 of `payload` under `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedSignature`] when the signature
    /// cannot be decoded as hex, [`SignatureError::Mismatch`] when the
    /// digest does not match.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<(), SignatureError> {
        let hex_part = signature.strip_prefix("sha256=").unwrap_or(signature);
        let sig_bytes = hex::decode(hex_part).map_err(|_| SignatureError::MalformedSignature)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(payload);

        mac.verify_slice(&sig_bytes)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Compute the hex digest a vendor would send for `payload`.
    ///
    /// Used by tests and local tooling; production never signs.
    pub fn sign(&self, payload: &[u8], secret: &str) -> Result<String, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
