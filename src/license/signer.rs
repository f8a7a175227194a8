//! Issuance side. Runs in the vendor's issuance environment only; the
//! private key is loaded at issuance time and never built into the product.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;

use super::envelope::SignedLicense;
use super::error::{IssueError, KeyError};
use super::model::{LicenseClaims, Limits};

pub struct Signer {
    key: SigningKey,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Load a standard-base64 32-byte Ed25519 secret key.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let secret: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length { expected: SECRET_KEY_LENGTH, actual: bytes.len() })?;
        Ok(Self::new(SigningKey::from_bytes(&secret)))
    }

    pub fn secret_key_base64(&self) -> String {
        STANDARD.encode(self.key.to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.verifying_key().to_bytes())
    }

    /// Sign `claims` and return the distributable key string.
    pub fn sign(&self, claims: &LicenseClaims) -> Result<String, IssueError> {
        Ok(self.sign_envelope(claims)?.encode())
    }

    pub fn sign_envelope(&self, claims: &LicenseClaims) -> Result<SignedLicense, IssueError> {
        let payload = canonical_payload(claims)?;
        let signature = self.key.sign(&payload);
        Ok(SignedLicense::new(payload, signature.to_bytes().to_vec()))
    }
}

/// Canonical (RFC 8785) JSON of the claims: the exact bytes that get signed.
pub fn canonical_payload(claims: &LicenseClaims) -> Result<Vec<u8>, IssueError> {
    if !claims.has_valid_window() {
        return Err(IssueError::InvalidWindow {
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        });
    }
    if let Some((name, value)) = claims.limits.out_of_range() {
        return Err(IssueError::LimitOutOfRange {
            name: name.to_string(),
            value,
            max: Limits::MAX_VALUE,
        });
    }
    serde_json_canonicalizer::to_vec(claims).map_err(|e| IssueError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::model::{Feature, License, Tier};
    use time::Duration;

    fn claims() -> LicenseClaims {
        let mut claims = License::community().into_claims();
        claims.id = "lic-001".into();
        claims.tier = Tier::Pro;
        claims.expires_at = claims.issued_at + Duration::days(365);
        claims.features.insert(Feature::SAML);
        claims.metadata.insert("seats_note".into(), "renewal pending".into());
        claims
    }

    #[test]
    fn signatures_are_deterministic() {
        let signer = Signer::generate();
        let c = claims();
        assert_eq!(signer.sign(&c).unwrap(), signer.sign(&c).unwrap());
    }

    #[test]
    fn payload_is_canonical_and_ordered() {
        let c = claims();
        let payload = String::from_utf8(canonical_payload(&c).unwrap()).unwrap();
        assert!(!payload.contains('\n'));
        assert!(payload.starts_with("{\"customer_id\""));
        let customer = payload.find("\"customer_id\"").unwrap();
        let tier = payload.find("\"tier\"").unwrap();
        assert!(customer < tier);
    }

    #[test]
    fn rejects_inverted_window() {
        let mut c = claims();
        c.expires_at = c.issued_at - Duration::seconds(1);
        assert!(matches!(Signer::generate().sign(&c), Err(IssueError::InvalidWindow { .. })));
    }

    #[test]
    fn rejects_limits_beyond_exact_double_range() {
        let mut c = claims();
        c.limits.set(Limits::MAX_USERS, Limits::MAX_VALUE + 1);
        let err = Signer::generate().sign(&c).unwrap_err();
        assert!(matches!(
            err,
            IssueError::LimitOutOfRange { ref name, value, .. }
                if name == Limits::MAX_USERS && value == Limits::MAX_VALUE + 1
        ));

        c.limits.set(Limits::MAX_USERS, u64::MAX);
        assert!(matches!(Signer::generate().sign(&c), Err(IssueError::LimitOutOfRange { .. })));
    }

    #[test]
    fn secret_key_round_trips_through_base64() {
        let signer = Signer::generate();
        let restored = Signer::from_base64(&signer.secret_key_base64()).unwrap();
        assert_eq!(restored.public_key_base64(), signer.public_key_base64());
    }

    #[test]
    fn short_secret_key_is_rejected() {
        let err = Signer::from_base64(&STANDARD.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, KeyError::Length { expected: 32, actual: 16 }));
    }

    #[test]
    fn debug_does_not_print_secret() {
        let signer = Signer::generate();
        let debug = format!("{signer:?}");
        assert!(!debug.contains(&signer.secret_key_base64()));
    }
}
