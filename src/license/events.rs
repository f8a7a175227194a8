use serde::Serialize;

use super::model::{License, Tier};

/// Audit events emitted by the license manager. Identifiers and tier only:
/// customer name, email and metadata never leave the license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LicenseEvent {
    LicenseLoaded {
        license_id: String,
        tier: Tier,
    },
    CommunityEdition {
        tier: Tier,
    },
    /// `license_id` is the grant that was being checked, `tier` the tier in
    /// effect once the failure has been handled.
    RevalidationFailed {
        license_id: String,
        tier: Tier,
        reason: &'static str,
    },
    /// `license_id` is the grant that was dropped, `tier` the resulting tier.
    LicenseDemoted {
        license_id: String,
        tier: Tier,
    },
}

impl LicenseEvent {
    /// Event describing `license` as the state currently in effect.
    pub fn in_effect(license: &License) -> Self {
        if license.is_community() {
            Self::CommunityEdition { tier: license.tier() }
        } else {
            Self::LicenseLoaded {
                license_id: license.id().to_string(),
                tier: license.tier(),
            }
        }
    }
}
