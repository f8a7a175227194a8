//! Wire form of a signed license.
//!
//! The distributable key is base64url (no padding) over the JSON envelope
//! `{"payload": <b64>, "sig": <b64>, "v": <format version>}`. The payload is
//! the canonical JSON of the claims and is what the signature covers.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;

use super::error::VerificationError;

/// Bump on any change to the payload schema or its serialization rules.
pub const FORMAT_VERSION: u32 = 1;

pub const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLicense {
    pub format_version: u32,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Deserialize)]
struct Envelope {
    v: u32,
    payload: String,
    sig: String,
}

impl SignedLicense {
    pub fn new(payload: Vec<u8>, signature: Vec<u8>) -> Self {
        Self { format_version: FORMAT_VERSION, payload, signature }
    }

    /// Render the distributable key string.
    pub fn encode(&self) -> String {
        let envelope = serde_json::json!({
            "v": self.format_version,
            "payload": STANDARD.encode(&self.payload),
            "sig": STANDARD.encode(&self.signature),
        });
        URL_SAFE_NO_PAD.encode(envelope.to_string())
    }

    /// Split a distributable key into its parts without interpreting the
    /// payload. Surrounding whitespace is ignored.
    pub fn decode(key: &str) -> Result<Self, VerificationError> {
        let raw = URL_SAFE_NO_PAD
            .decode(key.trim())
            .map_err(|e| VerificationError::InvalidFormat(format!("license key is not base64url: {e}")))?;
        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|e| VerificationError::InvalidFormat(format!("malformed license envelope: {e}")))?;
        if envelope.v != FORMAT_VERSION {
            return Err(VerificationError::InvalidFormat(format!(
                "unsupported license format version {}",
                envelope.v
            )));
        }
        let payload = STANDARD
            .decode(&envelope.payload)
            .map_err(|e| VerificationError::InvalidFormat(format!("license payload is not base64: {e}")))?;
        let signature = STANDARD
            .decode(&envelope.sig)
            .map_err(|_| VerificationError::InvalidSignature)?;
        Ok(Self { format_version: envelope.v, payload, signature })
    }
}
