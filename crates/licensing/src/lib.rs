//! # License Authority Engine
//!
//! This crate is the core of the licensing system. It uses Edwards-curve
//! Digital Signature Algorithm (Ed25519) signatures over a canonical byte
//! form, so licenses cannot be forged or tampered with, and authors are
//! authenticated against the verifying key they publish in DNS.
//!
//! ## Architecture
//!
//! 1. **Codec ([`codec`]):** deterministic canonical serialization - the
//!    byte form that is both signed and verified.
//! 2. **Verification ([`verifier`]):** recursive validation of a signed
//!    license against its author's DNS authority record, the host clock and
//!    machine identity, and the whole dependency tree beneath it.
//! 3. **Grants ([`grants`]):** the capability model and the deterministic
//!    merge producing the effective grant set an application receives.
//! 4. **Issuance ([`issuer`]):** construction and signing of new licenses.
//!    Gated behind the `issuance` feature so verification-only builds never
//!    link signing paths.
//!
//! Licenses chain: a license may embed other signed licenses as
//! dependencies, refining the grants they deliver. The embedded form makes
//! every license file a self-contained tree whose every byte is covered by
//! the root signature.

pub mod cancel;
pub mod codec;
pub mod grants;
#[cfg(feature = "issuance")]
pub mod issuer;
pub mod machine;
pub mod verifier;

mod error;

pub use crate::cancel::CancelToken;
pub use crate::error::LicenseError;
#[cfg(feature = "issuance")]
pub use crate::issuer::{Confirmation, IssueOptions, LicenseDraft, issue};
pub use crate::grants::{GrantValue, Grants, resolve_grants};
pub use crate::verifier::{RetryPolicy, VerifiedLicense, Verifier, VerifyOptions};

use chrono::{DateTime, Duration, Utc};
use clic_keystore::bytes_as_base64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The vendor identity a license is issued under.
///
/// `service` is the license's namespace within the grant map and the first
/// label of the author's DKIM selector; it defaults to a slug of `product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    /// Human-readable vendor name.
    pub name: String,
    /// DNS domain the author publishes their verifying key under.
    pub domain: String,
    /// Product this license covers.
    pub product: String,
    /// Service slug; the key of this license's own grant.
    pub service: String,
    /// The author's 32-byte Ed25519 verifying key.
    #[serde(with = "bytes_as_base64")]
    pub pubkey: Vec<u8>,
}

impl Author {
    /// Builds an author record, defaulting `service` to the product slug.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        product: impl Into<String>,
        pubkey: [u8; 32],
    ) -> Self {
        let product = product.into();
        let service = service_slug(&product);
        Self { name: name.into(), domain: domain.into(), product, service, pubkey: pubkey.to_vec() }
    }

    /// Overrides the derived service slug.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }
}

/// The agent a license is issued to. A license without a client is a
/// bearer license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Client {
    /// Human-readable recipient name.
    pub name: String,
    /// The recipient agent's 32-byte Ed25519 verifying key.
    #[serde(with = "bytes_as_base64")]
    pub pubkey: Vec<u8>,
}

impl Client {
    /// Builds a client record.
    #[must_use]
    pub fn new(name: impl Into<String>, pubkey: [u8; 32]) -> Self {
        Self { name: name.into(), pubkey: pubkey.to_vec() }
    }
}

/// A half-open validity window `[start, start + length)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timespan {
    /// RFC3339 start of validity.
    pub start: DateTime<Utc>,
    /// Window length in whole seconds.
    pub length: u64,
}

impl Timespan {
    /// Builds a window starting at `start` lasting `length` seconds.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, length: u64) -> Self {
        Self { start, length }
    }

    /// Exclusive end of the window. Saturates at the calendar horizon
    /// rather than wrapping.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        i64::try_from(self.length)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|length| self.start.checked_add_signed(length))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether `now` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now < self.end()
    }
}

/// The unsigned license record; [`codec::canonical_bytes`] of this value is
/// what the author signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    /// Issuing vendor.
    pub author: Author,
    /// Recipient agent; absent for bearer licenses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    /// Signed licenses whose grants this license refines, in declaration
    /// order. Embedded by value: tampering with any dependency byte breaks
    /// this license's signature.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<SignedLicense>,
    /// Capability map keyed by service. The `author.service` entry is this
    /// license's own grant; any other key refines a dependency's grant.
    pub grant: Grants,
    /// Host binding; absent means any machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Uuid>,
    /// Validity window; absent means perpetual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timespan: Option<Timespan>,
}

/// A license plus its author's Ed25519 signature over the canonical bytes.
///
/// This is the persisted artifact: `*.crypto-license` files hold the
/// canonical JSON of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedLicense {
    /// The signed payload.
    pub license: License,
    /// 64-byte signature of `license`'s canonical bytes.
    #[serde(with = "bytes_as_base64")]
    pub signature: Vec<u8>,
}

impl SignedLicense {
    /// Serializes to canonical bytes; see [`codec::encode_signed`].
    ///
    /// # Errors
    /// Returns [`LicenseError::CorruptRecord`] when serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LicenseError> {
        codec::encode_signed(self)
    }

    /// Parses a signed license from bytes; see [`codec::decode_signed`].
    ///
    /// # Errors
    /// Returns [`LicenseError::CorruptRecord`] for anything unparseable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LicenseError> {
        codec::decode_signed(bytes)
    }
}

/// Derives a service slug from a product name.
///
/// Lower-cases, collapses runs of non-alphanumerics into single dashes,
/// and breaks camel-case words, so `AwesomePyApp` becomes `awesome-py-app`.
#[must_use]
pub fn service_slug(product: &str) -> String {
    let mut slug = String::with_capacity(product.len() + 4);
    let mut prev_lower = false;
    for ch in product.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_lower {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
            prev_lower = false;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slug_breaks_camel_case_and_collapses_punctuation() {
        assert_eq!(service_slug("AwesomePyApp"), "awesome-py-app");
        assert_eq!(service_slug("Crypto Licensing Server"), "crypto-licensing-server");
        assert_eq!(service_slug("already-a-slug"), "already-a-slug");
        assert_eq!(service_slug("weird!!name??"), "weird-name");
        assert_eq!(service_slug("  padded  "), "padded");
    }

    #[test]
    fn author_defaults_service_to_slug() {
        let author = Author::new("Acme", "acme.example", "AwesomePyApp", [1u8; 32]);
        assert_eq!(author.service, "awesome-py-app");

        let author = author.with_service("custom");
        assert_eq!(author.service, "custom");
    }

    #[test]
    fn timespan_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ts = Timespan::new(start, 3600);

        assert!(!ts.contains(start - Duration::seconds(1)));
        assert!(ts.contains(start));
        assert!(ts.contains(start + Duration::seconds(3599)));
        assert!(!ts.contains(start + Duration::seconds(3600)));
    }

    #[test]
    fn huge_timespan_saturates() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ts = Timespan::new(start, u64::MAX);
        assert!(ts.contains(Utc.with_ymd_and_hms(9000, 1, 1, 0, 0, 0).unwrap()));
    }
}
