use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::datetime;
use time::OffsetDateTime;

use super::registry;

/// Ordered entitlement level. The discriminant is the tier's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free = 1,
    Pro = 2,
    Business = 3,
    Enterprise = 4,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Pro, Tier::Business, Tier::Enterprise];

    pub fn level(self) -> u8 {
        self as u8
    }

    /// `true` when this tier covers everything `other` covers.
    pub fn includes(self, other: Tier) -> bool {
        self.level() >= other.level()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Business => "business",
            Tier::Enterprise => "enterprise",
        }
    }

    /// Product edition name shown to operators.
    pub fn edition(self) -> &'static str {
        match self {
            Tier::Free => "Community",
            Tier::Pro => "Pro",
            Tier::Business => "Business",
            Tier::Enterprise => "Enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl FromStr for Tier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "community" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "business" => Ok(Tier::Business),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(ParseError { kind: "tier", value: s.to_string() }),
        }
    }
}

/// A named, individually gateable capability. Matched by exact name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(Cow<'static, str>);

impl Feature {
    pub const CI_API: Feature = Feature::from_static("ci_api");
    pub const WIZARDS: Feature = Feature::from_static("wizards");
    pub const ADVANCED_ANALYTICS: Feature = Feature::from_static("advanced_analytics");
    pub const CUSTOM_DOMAINS: Feature = Feature::from_static("custom_domains");
    pub const WEBHOOKS: Feature = Feature::from_static("webhooks");
    pub const API_ACCESS: Feature = Feature::from_static("api_access");
    pub const AUDIT_LOGS: Feature = Feature::from_static("audit_logs");
    pub const SAML: Feature = Feature::from_static("saml");
    pub const RBAC: Feature = Feature::from_static("rbac");
    pub const SCHEDULED_REPORTS: Feature = Feature::from_static("scheduled_reports");
    pub const SCIM: Feature = Feature::from_static("scim");
    pub const WHITE_LABEL: Feature = Feature::from_static("white_label");
    pub const DATA_RESIDENCY: Feature = Feature::from_static("data_residency");
    pub const PRIORITY_SUPPORT: Feature = Feature::from_static("priority_support");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Feature {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Named usage ceilings. A ceiling of `0` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Limits(BTreeMap<String, u64>);

impl Limits {
    pub const UNLIMITED: u64 = 0;
    /// Largest ceiling that survives the canonical payload encoding, which
    /// writes numbers as IEEE doubles.
    pub const MAX_VALUE: u64 = (1 << 53) - 1;

    pub const MAX_HOSTS: &'static str = "max_hosts";
    pub const MAX_USERS: &'static str = "max_users";
    pub const MAX_DOMAINS: &'static str = "max_domains";
    pub const MAX_LINKS_PER_MONTH: &'static str = "max_links_per_month";
    pub const MAX_API_REQUESTS_PER_MINUTE: &'static str = "max_api_requests_per_minute";
    pub const HISTORY_DAYS: &'static str = "history_days";

    pub fn new() -> Self {
        Self::default()
    }

    /// Ceilings granted to the Community edition.
    pub fn community() -> Self {
        Self::new()
            .with(Self::MAX_HOSTS, 15)
            .with(Self::MAX_USERS, 3)
            .with(Self::MAX_DOMAINS, 1)
            .with(Self::MAX_LINKS_PER_MONTH, 1_000)
            .with(Self::MAX_API_REQUESTS_PER_MINUTE, 60)
            .with(Self::HISTORY_DAYS, 30)
    }

    pub fn with(mut self, name: impl Into<String>, max: u64) -> Self {
        self.set(name, max);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, max: u64) {
        self.0.insert(name.into(), max);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    /// Unknown names fail closed.
    pub fn check(&self, name: &str, usage: u64) -> bool {
        match self.0.get(name) {
            Some(&Self::UNLIMITED) => true,
            Some(&max) => usage < max,
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, max)| (name.as_str(), *max))
    }

    /// First ceiling above [`Limits::MAX_VALUE`], if any.
    pub fn out_of_range(&self) -> Option<(&str, u64)> {
        self.iter().find(|&(_, max)| max > Self::MAX_VALUE)
    }
}

/// Commercial form of the grant. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Trial,
    Subscription,
    Perpetual,
    EnterpriseCustom,
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LicenseType::Trial => "trial",
            LicenseType::Subscription => "subscription",
            LicenseType::Perpetual => "perpetual",
            LicenseType::EnterpriseCustom => "enterprise_custom",
        })
    }
}

impl FromStr for LicenseType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "trial" => Ok(LicenseType::Trial),
            "subscription" => Ok(LicenseType::Subscription),
            "perpetual" => Ok(LicenseType::Perpetual),
            "enterprise_custom" => Ok(LicenseType::EnterpriseCustom),
            _ => Err(ParseError { kind: "license type", value: s.to_string() }),
        }
    }
}

/// The grant as issued. Plain data: nothing here has been authenticated, so
/// gating code never consumes this type directly. See [`License`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseClaims {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub email: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    pub tier: Tier,
    /// Inclusive start of the validity window.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    /// Exclusive end of the validity window.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LicenseClaims {
    pub fn has_valid_window(&self) -> bool {
        self.issued_at <= self.expires_at
    }
}

pub const COMMUNITY_LICENSE_ID: &str = "community";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Community,
    Verified,
}

/// A grant whose signature and validity window have been checked, or the
/// synthesized Community default. Only [`super::Verifier`] and
/// [`License::community`] can produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    claims: LicenseClaims,
    origin: Origin,
}

impl License {
    pub(crate) fn verified(claims: LicenseClaims) -> Self {
        Self { claims, origin: Origin::Verified }
    }

    /// Fixed free-tier entitlement used when no valid commercial key is held.
    pub fn community() -> Self {
        Self {
            claims: LicenseClaims {
                id: COMMUNITY_LICENSE_ID.to_string(),
                customer_id: String::new(),
                customer_name: String::new(),
                email: String::new(),
                license_type: LicenseType::Perpetual,
                tier: Tier::Free,
                issued_at: OffsetDateTime::UNIX_EPOCH,
                expires_at: datetime!(9999-12-31 23:59:59 UTC),
                features: BTreeSet::new(),
                limits: Limits::community(),
                metadata: BTreeMap::new(),
            },
            origin: Origin::Community,
        }
    }

    pub fn is_community(&self) -> bool {
        self.origin == Origin::Community
    }

    pub fn claims(&self) -> &LicenseClaims {
        &self.claims
    }

    pub fn into_claims(self) -> LicenseClaims {
        self.claims
    }

    pub fn id(&self) -> &str {
        &self.claims.id
    }

    pub fn tier(&self) -> Tier {
        self.claims.tier
    }

    pub fn license_type(&self) -> LicenseType {
        self.claims.license_type
    }

    pub fn issued_at(&self) -> OffsetDateTime {
        self.claims.issued_at
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.claims.expires_at
    }

    pub fn explicit_features(&self) -> &BTreeSet<Feature> {
        &self.claims.features
    }

    pub fn limits(&self) -> &Limits {
        &self.claims.limits
    }

    /// Explicit grant OR the tier covers the registry's minimum for `feature`.
    /// Features missing from the registry are only reachable by explicit grant.
    pub fn has_feature(&self, feature: &Feature) -> bool {
        self.claims.features.contains(feature)
            || registry::minimum_tier(feature).is_some_and(|min| self.tier().includes(min))
    }

    pub fn check_limit(&self, name: &str, usage: u64) -> bool {
        self.claims.limits.check(name, usage)
    }

    /// Every feature available under this license: the explicit grants plus
    /// all registry entries the tier covers.
    pub fn effective_features(&self) -> BTreeSet<Feature> {
        let mut features = self.claims.features.clone();
        features.extend(registry::features_for(self.tier()).cloned());
        features
    }
}
