//! Runtime verification of distributable license keys.
//!
//! Pure: no logging, no retries, no hidden clock. The caller supplies `now`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH};
use time::OffsetDateTime;

use super::envelope::{SignedLicense, SIGNATURE_LEN};
use super::error::{KeyError, VerificationError};
use super::model::{License, LicenseClaims};

/// Trusted public keys baked in at build time: comma-separated standard
/// base64. Empty when the build did not provide any.
pub const EMBEDDED_PUBLIC_KEYS: &str = match option_env!("DDUI_LICENSE_PUBKEYS") {
    Some(keys) => keys,
    None => "",
};

#[derive(Debug, Clone, Default)]
pub struct Verifier {
    keys: Vec<VerifyingKey>,
}

impl Verifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { keys: vec![key] }
    }

    /// Accept signatures from any of `keys` (overlap during key rotation).
    pub fn with_keys(keys: impl IntoIterator<Item = VerifyingKey>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }

    pub fn from_base64_list(list: &str) -> Result<Self, KeyError> {
        let keys = list
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(decode_public_key)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }

    pub fn embedded() -> Result<Self, KeyError> {
        Self::from_base64_list(EMBEDDED_PUBLIC_KEYS)
    }

    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Authenticate `key`, then check its validity window against `now`.
    ///
    /// The signature is checked over the raw payload bytes before any field of
    /// the payload is read.
    pub fn verify(&self, key: &str, now: OffsetDateTime) -> Result<License, VerificationError> {
        let signed = SignedLicense::decode(key)?;

        let signature: [u8; SIGNATURE_LEN] = signed
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| VerificationError::InvalidSignature)?;
        let signature = Signature::from_bytes(&signature);
        let authentic = self
            .keys
            .iter()
            .any(|vk| vk.verify_strict(&signed.payload, &signature).is_ok());
        if !authentic {
            return Err(VerificationError::InvalidSignature);
        }

        let claims: LicenseClaims = serde_json::from_slice(&signed.payload)
            .map_err(|e| VerificationError::InvalidFormat(format!("malformed license payload: {e}")))?;
        if !claims.has_valid_window() {
            return Err(VerificationError::InvalidFormat(
                "license expires before it is issued".into(),
            ));
        }

        if now < claims.issued_at {
            return Err(VerificationError::NotYetValid { valid_from: claims.issued_at });
        }
        if now >= claims.expires_at {
            return Err(VerificationError::Expired { expired_at: claims.expires_at });
        }
        Ok(License::verified(claims))
    }
}

/// Parse a standard-base64 32-byte Ed25519 public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Length { expected: PUBLIC_KEY_LENGTH, actual: bytes.len() })?;
    Ok(VerifyingKey::from_bytes(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::model::Tier;
    use crate::license::signer::Signer;
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand::rngs::OsRng;
    use time::macros::datetime;
    use time::Duration;

    fn claims() -> LicenseClaims {
        let mut claims = License::community().into_claims();
        claims.id = "lic-verify".into();
        claims.tier = Tier::Business;
        claims.issued_at = datetime!(2026-01-01 00:00 UTC);
        claims.expires_at = datetime!(2027-01-01 00:00 UTC);
        claims
    }

    #[test]
    fn empty_trust_set_rejects_everything() {
        let key = Signer::generate().sign(&claims()).unwrap();
        let err = Verifier::default().verify(&key, datetime!(2026-06-01 00:00 UTC)).unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[test]
    fn any_trusted_key_is_accepted() {
        let old = Signer::generate();
        let new = Signer::generate();
        let verifier = Verifier::with_keys([old.verifying_key(), new.verifying_key()]);
        let now = datetime!(2026-06-01 00:00 UTC);
        assert!(verifier.verify(&old.sign(&claims()).unwrap(), now).is_ok());
        assert!(verifier.verify(&new.sign(&claims()).unwrap(), now).is_ok());
    }

    #[test]
    fn truncated_signature_is_invalid_signature() {
        let signer = Signer::generate();
        let mut signed = signer.sign_envelope(&claims()).unwrap();
        signed.signature.truncate(40);
        let err = Verifier::new(signer.verifying_key())
            .verify(&signed.encode(), datetime!(2026-06-01 00:00 UTC))
            .unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[test]
    fn signed_garbage_payload_is_invalid_format() {
        let sk = SigningKey::generate(&mut OsRng);
        let payload = b"{\"tier\":\"enterprise\"}".to_vec();
        let signature = sk.sign(&payload).to_bytes().to_vec();
        let key = SignedLicense::new(payload, signature).encode();
        let err = Verifier::new(sk.verifying_key())
            .verify(&key, datetime!(2026-06-01 00:00 UTC))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_format");
    }

    #[test]
    fn signed_inverted_window_is_invalid_format() {
        let sk = SigningKey::generate(&mut OsRng);
        let mut c = claims();
        c.expires_at = c.issued_at - Duration::days(1);
        let payload = serde_json::to_vec(&c).unwrap();
        let signature = sk.sign(&payload).to_bytes().to_vec();
        let key = SignedLicense::new(payload, signature).encode();
        let err = Verifier::new(sk.verifying_key())
            .verify(&key, c.issued_at)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_format");
    }

    #[test]
    fn public_key_list_parsing() {
        let a = Signer::generate();
        let b = Signer::generate();
        let list = format!(" {} ,{},", a.public_key_base64(), b.public_key_base64());
        let verifier = Verifier::from_base64_list(&list).unwrap();
        assert_eq!(verifier.keys.len(), 2);
        assert!(!Verifier::from_base64_list("").unwrap().has_keys());
        assert!(Verifier::from_base64_list("AAAA").is_err());
    }
}
