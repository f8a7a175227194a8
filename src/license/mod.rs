//! Offline license verification and entitlement resolution.
//!
//! Issuance: [`Signer`] turns [`LicenseClaims`] into a distributable key.
//! Runtime: [`Verifier`] turns a key back into a trusted [`License`], and
//! [`LicenseManager`] holds the license every gated operation consults.

pub mod envelope;
pub mod error;
pub mod events;
pub mod manager;
pub mod model;
pub mod registry;
pub mod signer;
pub mod verifier;

pub use envelope::{SignedLicense, FORMAT_VERSION};
pub use error::{IssueError, KeyError, VerificationError};
pub use events::LicenseEvent;
pub use manager::{Clock, LicenseManager, ManualClock, Revalidation, RevalidationHandle, SystemClock};
pub use model::{Feature, License, LicenseClaims, LicenseType, Limits, Tier};
pub use signer::Signer;
pub use verifier::Verifier;
