use std::collections::BTreeSet;

use anyhow::Result;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use ddui_licensing::license::{
    Feature, License, LicenseClaims, LicenseType, Limits, SignedLicense, Signer, Tier,
    VerificationError, Verifier,
};

const ISSUED: OffsetDateTime = datetime!(2026-02-01 09:30:00.123456789 UTC);
const EXPIRES: OffsetDateTime = datetime!(2027-02-01 09:30 UTC);

fn claims() -> LicenseClaims {
    LicenseClaims {
        id: "lic-2026-0042".into(),
        customer_id: "cus-881".into(),
        customer_name: "Acme Corp".into(),
        email: "billing@acme.example".into(),
        license_type: LicenseType::Subscription,
        tier: Tier::Business,
        issued_at: ISSUED,
        expires_at: EXPIRES,
        features: BTreeSet::from([Feature::SCIM, Feature::new("beta_dashboards")]),
        limits: Limits::new()
            .with(Limits::MAX_USERS, 250)
            .with(Limits::MAX_HOSTS, 0),
        metadata: [("po_number".to_string(), "PO-77".to_string())].into(),
    }
}

fn issue() -> (Signer, Verifier, String) {
    let signer = Signer::generate();
    let verifier = Verifier::new(signer.verifying_key());
    let key = signer.sign(&claims()).expect("sign");
    (signer, verifier, key)
}

#[test]
fn round_trip_preserves_every_field() -> Result<()> {
    let (_, verifier, key) = issue();
    for now in [ISSUED, ISSUED + Duration::days(100), EXPIRES - Duration::nanoseconds(1)] {
        let license = verifier.verify(&key, now)?;
        assert_eq!(license.claims(), &claims());
        assert!(!license.is_community());
    }
    Ok(())
}

#[test]
fn round_trip_across_tiers_and_types() -> Result<()> {
    let signer = Signer::generate();
    let verifier = Verifier::new(signer.verifying_key());
    for tier in Tier::ALL {
        for license_type in [
            LicenseType::Trial,
            LicenseType::Subscription,
            LicenseType::Perpetual,
            LicenseType::EnterpriseCustom,
        ] {
            let c = LicenseClaims { tier, license_type, ..claims() };
            let license = verifier.verify(&signer.sign(&c)?, ISSUED)?;
            assert_eq!(license.into_claims(), c);
        }
    }
    Ok(())
}

#[test]
fn largest_encodable_limit_round_trips() -> Result<()> {
    let signer = Signer::generate();
    let verifier = Verifier::new(signer.verifying_key());
    let mut grant = claims();
    grant.limits.set(Limits::MAX_API_REQUESTS_PER_MINUTE, Limits::MAX_VALUE);

    let license = verifier.verify(&signer.sign(&grant)?, ISSUED)?;
    assert_eq!(license.claims(), &grant);
    assert_eq!(
        license.limits().get(Limits::MAX_API_REQUESTS_PER_MINUTE),
        Some(Limits::MAX_VALUE)
    );

    grant.limits.set(Limits::MAX_API_REQUESTS_PER_MINUTE, Limits::MAX_VALUE + 1);
    assert!(signer.sign(&grant).is_err());
    Ok(())
}

#[test]
fn flipping_any_payload_byte_is_invalid_signature() -> Result<()> {
    let (_, verifier, key) = issue();
    let signed = SignedLicense::decode(&key)?;
    for i in 0..signed.payload.len() {
        let mut tampered = signed.clone();
        tampered.payload[i] ^= 0x01;
        let err = verifier.verify(&tampered.encode(), ISSUED).unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature, "payload byte {i}");
    }
    Ok(())
}

#[test]
fn flipping_any_signature_byte_is_invalid_signature() -> Result<()> {
    let (_, verifier, key) = issue();
    let signed = SignedLicense::decode(&key)?;
    for i in 0..signed.signature.len() {
        for mask in [0x01, 0x80] {
            let mut tampered = signed.clone();
            tampered.signature[i] ^= mask;
            let err = verifier.verify(&tampered.encode(), ISSUED).unwrap_err();
            assert_eq!(err, VerificationError::InvalidSignature, "signature byte {i} mask {mask:#x}");
        }
    }
    Ok(())
}

#[test]
fn inflated_tier_is_rejected_before_use() -> Result<()> {
    let (_, verifier, key) = issue();
    let mut signed = SignedLicense::decode(&key)?;
    let payload = String::from_utf8(signed.payload.clone())?;
    signed.payload = payload.replace("\"business\"", "\"enterprise\"").into_bytes();
    assert_ne!(signed.payload, payload.as_bytes());
    let err = verifier.verify(&signed.encode(), ISSUED).unwrap_err();
    assert_eq!(err, VerificationError::InvalidSignature);
    Ok(())
}

#[test]
fn temporal_boundaries() -> Result<()> {
    let (_, verifier, key) = issue();

    assert!(verifier.verify(&key, ISSUED).is_ok());
    assert_eq!(
        verifier.verify(&key, ISSUED - Duration::nanoseconds(1)).unwrap_err(),
        VerificationError::NotYetValid { valid_from: ISSUED }
    );
    assert_eq!(
        verifier.verify(&key, EXPIRES).unwrap_err(),
        VerificationError::Expired { expired_at: EXPIRES }
    );
    assert!(matches!(
        verifier.verify(&key, EXPIRES + Duration::days(30)),
        Err(VerificationError::Expired { .. })
    ));
    Ok(())
}

#[test]
fn signature_is_checked_before_time() {
    let (_, _, key) = issue();
    let stranger = Verifier::new(Signer::generate().verifying_key());
    let err = stranger.verify(&key, EXPIRES + Duration::days(1)).unwrap_err();
    assert_eq!(err, VerificationError::InvalidSignature);
}

#[test]
fn corrupt_keys_are_invalid_format() {
    let (_, verifier, key) = issue();
    let truncated = &key[..key.len() / 2];
    for bad in ["", "   ", "hello world", truncated] {
        let err = verifier.verify(bad, ISSUED).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidFormat(_)), "{bad:?}: {err:?}");
    }
}

#[test]
fn newer_format_version_is_invalid_format() -> Result<()> {
    let (_, verifier, key) = issue();
    let mut signed = SignedLicense::decode(&key)?;
    signed.format_version = 2;
    let err = verifier.verify(&signed.encode(), ISSUED).unwrap_err();
    assert_eq!(err.kind(), "invalid_format");
    Ok(())
}

#[test]
fn error_kinds_are_distinct() {
    let kinds = [
        VerificationError::InvalidFormat(String::new()).kind(),
        VerificationError::InvalidSignature.kind(),
        VerificationError::NotYetValid { valid_from: ISSUED }.kind(),
        VerificationError::Expired { expired_at: EXPIRES }.kind(),
    ];
    let unique: BTreeSet<_> = kinds.iter().collect();
    assert_eq!(unique.len(), kinds.len());
}

#[test]
fn verified_pro_license_resolves_features() -> Result<()> {
    let signer = Signer::generate();
    let verifier = Verifier::new(signer.verifying_key());
    let c = LicenseClaims { tier: Tier::Pro, features: BTreeSet::new(), ..claims() };
    let license: License = verifier.verify(&signer.sign(&c)?, ISSUED)?;

    for (feature, min) in ddui_licensing::license::registry::entries() {
        assert_eq!(license.has_feature(feature), min <= Tier::Pro, "{feature}");
    }

    let mut granted = c.clone();
    granted.features.insert(Feature::DATA_RESIDENCY);
    let license = verifier.verify(&signer.sign(&granted)?, ISSUED)?;
    assert!(license.has_feature(&Feature::DATA_RESIDENCY));
    assert!(!license.has_feature(&Feature::SCIM));
    Ok(())
}
