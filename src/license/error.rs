use thiserror::Error;
use time::OffsetDateTime;

/// Why a distributable license key was rejected. Each kind is distinct so
/// callers can tell "expired" apart from "corrupt".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("invalid license format: {0}")]
    InvalidFormat(String),

    #[error("license signature is invalid")]
    InvalidSignature,

    #[error("license is not valid before {valid_from}")]
    NotYetValid { valid_from: OffsetDateTime },

    #[error("license expired at {expired_at}")]
    Expired { expired_at: OffsetDateTime },
}

impl VerificationError {
    /// Stable identifier used in events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::InvalidSignature => "invalid_signature",
            Self::NotYetValid { .. } => "not_yet_valid",
            Self::Expired { .. } => "expired",
        }
    }
}

/// Malformed Ed25519 key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("key must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid ed25519 public key: {0}")]
    Malformed(#[from] ed25519_dalek::SignatureError),
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("license expires ({expires_at}) before it is issued ({issued_at})")]
    InvalidWindow {
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    },

    #[error("limit {name} = {value} exceeds the encodable maximum {max}")]
    LimitOutOfRange { name: String, value: u64, max: u64 },

    #[error("encode license payload: {0}")]
    Encode(String),
}
