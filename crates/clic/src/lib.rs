//! Facade crate for the licensing engine.
//! Re-exports the engine's crates under one roof and names the operations
//! applications actually call. Keep this crate thin: it composes, it does
//! not implement.
//!
//! ## Usage
//! - Verification-only embedders depend on `clic` with default features.
//! - Vendor tooling adds the `issuance` feature to sign new licenses.

pub use clic_discovery as discovery;
pub use clic_keystore as keystore;
pub use clic_licensing as licensing;
pub use clic_resolver as resolver;

/// The operations exposed upward, one re-export per name the platform
/// promises.
pub mod ops {
    /// Creates an encrypted keypair record (optionally from a fixed seed).
    pub use clic_keystore::create as create_keypair;
    /// Loads and decrypts a keypair record with credential candidates.
    pub use clic_keystore::load as load_keypair;
    /// Walks the search path for valid (keypair, license) pairs.
    pub use clic_discovery::discover as enumerate_valid_licenses;
    /// Computes the effective grant set of a verified license tree.
    pub use clic_licensing::resolve_grants;
    #[cfg(feature = "issuance")]
    /// Builds, checks, and signs a new license.
    pub use clic_licensing::issue as issue_license;
}

/// Verifies a signed license; the `verify_license` operation.
///
/// Convenience over [`licensing::Verifier`] for one-shot callers; reuse a
/// `Verifier` instance instead when the stale-DNS fallback matters.
///
/// # Errors
/// Everything [`licensing::Verifier::verify`] can return.
pub fn verify_license<R: resolver::AuthorityResolver + ?Sized>(
    signed: &licensing::SignedLicense,
    resolver: &R,
    options: &licensing::VerifyOptions,
) -> Result<licensing::VerifiedLicense, licensing::LicenseError> {
    licensing::Verifier::new(resolver).verify(signed, options)
}
