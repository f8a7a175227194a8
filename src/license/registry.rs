//! Minimum tier for every tier-gated feature.
//!
//! Read-only after compilation. A feature absent from this table can only be
//! unlocked by an explicit grant on the license, so new gated capabilities
//! must be added here together with the code that gates them.

use super::model::{Feature, Tier};

static REGISTRY: [(Feature, Tier); 14] = [
    (Feature::CI_API, Tier::Free),
    (Feature::WIZARDS, Tier::Free),
    (Feature::ADVANCED_ANALYTICS, Tier::Pro),
    (Feature::CUSTOM_DOMAINS, Tier::Pro),
    (Feature::WEBHOOKS, Tier::Pro),
    (Feature::API_ACCESS, Tier::Pro),
    (Feature::AUDIT_LOGS, Tier::Business),
    (Feature::SAML, Tier::Business),
    (Feature::RBAC, Tier::Business),
    (Feature::SCHEDULED_REPORTS, Tier::Business),
    (Feature::SCIM, Tier::Enterprise),
    (Feature::WHITE_LABEL, Tier::Enterprise),
    (Feature::DATA_RESIDENCY, Tier::Enterprise),
    (Feature::PRIORITY_SUPPORT, Tier::Enterprise),
];

pub fn minimum_tier(feature: &Feature) -> Option<Tier> {
    REGISTRY
        .iter()
        .find(|(known, _)| known == feature)
        .map(|(_, tier)| *tier)
}

pub fn entries() -> impl Iterator<Item = (&'static Feature, Tier)> {
    REGISTRY.iter().map(|(feature, tier)| (feature, *tier))
}

/// Registry features whose minimum tier is covered by `tier`.
pub fn features_for(tier: Tier) -> impl Iterator<Item = &'static Feature> {
    REGISTRY
        .iter()
        .filter(move |(_, min)| tier.includes(*min))
        .map(|(feature, _)| feature)
}
