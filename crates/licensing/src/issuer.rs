//! # License Issuance
//!
//! Construction and signing of new licenses. Compiled only with the
//! `issuance` cargo feature, so verification-only builds never link a
//! signing path - the same split the platform uses for its vendor tooling.
//!
//! Every precondition is checked before anything is signed:
//!
//! 1. The signing keypair's verifying key equals the author record's key.
//! 2. The grant map carries the author's own service key, and every other
//!    key names a service reachable through the dependency tree.
//! 3. Every dependency verifies in isolation, with the caller's machine
//!    and clock.
//! 4. A bearer license (no client) needs `no_confirm` or an approving
//!    [`Confirmation`] collaborator.

use crate::cancel::CancelToken;
use crate::codec;
use crate::error::LicenseError;
use crate::grants::Grants;
use crate::verifier::{Verifier, VerifyOptions};
use crate::{Author, Client, License, SignedLicense, Timespan};
use chrono::{DateTime, Utc};
use clic_keystore::PlaintextKeypair;
use clic_resolver::AuthorityResolver;
use ed25519_dalek::Signer as _;
use fxhash::FxHashSet;
use tracing::info;
use uuid::Uuid;

/// Out-of-scope UI collaborator asked to approve bearer issuance. The CLI
/// implements this with a TTY prompt; embedders bring their own.
pub trait Confirmation {
    /// Returns whether the operator approved issuing `license`.
    fn approve(&self, license: &License) -> bool;
}

/// Caller-supplied issuance context. `machine` and `now` feed the isolated
/// verification of each dependency.
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Host identity for dependency verification.
    pub machine: Option<Uuid>,
    /// Clock override for dependency verification.
    pub now: Option<DateTime<Utc>>,
    /// Skip confirmation for bearer licenses.
    pub no_confirm: bool,
    /// Cooperative cancellation flag.
    pub cancel: CancelToken,
}

/// Everything a license is made of, minus the signature.
#[derive(Debug, Clone)]
pub struct LicenseDraft {
    /// Issuing vendor; its `pubkey` must match the signing keypair.
    pub author: Author,
    /// Recipient agent, or `None` for a bearer license.
    pub client: Option<Client>,
    /// Capability map; must contain `author.service`.
    pub grants: Grants,
    /// Signed licenses this one refines, in declaration order.
    pub dependencies: Vec<SignedLicense>,
    /// Host binding for the issued license.
    pub machine: Option<Uuid>,
    /// Validity window for the issued license.
    pub timespan: Option<Timespan>,
}

impl LicenseDraft {
    /// Starts a minimal draft: author plus its own grant map.
    #[must_use]
    pub fn new(author: Author, grants: Grants) -> Self {
        Self { author, client: None, grants, dependencies: Vec::new(), machine: None, timespan: None }
    }
}

/// Builds, checks, and signs a license.
///
/// On success the returned [`SignedLicense`]'s canonical bytes and
/// signature together form the persisted artifact.
///
/// # Errors
/// * [`LicenseError::AuthorKeyMismatch`] - precondition 1.
/// * [`LicenseError::MissingOwnGrant`] / [`LicenseError::UnknownGrantService`]
///   - precondition 2.
/// * Any verification error from a dependency - precondition 3.
/// * [`LicenseError::ConfirmationRequired`] - precondition 4.
pub fn issue<R: AuthorityResolver + ?Sized>(
    author_keypair: &PlaintextKeypair,
    draft: LicenseDraft,
    verifier: &mut Verifier<'_, R>,
    options: &IssueOptions,
    confirmation: Option<&dyn Confirmation>,
) -> Result<SignedLicense, LicenseError> {
    if author_keypair.vk_bytes().as_slice() != draft.author.pubkey.as_slice() {
        return Err(LicenseError::AuthorKeyMismatch);
    }

    if !draft.grants.contains(&draft.author.service) {
        return Err(LicenseError::MissingOwnGrant { service: draft.author.service.clone() });
    }
    let reachable = reachable_services(&draft.dependencies);
    for service in draft.grants.services() {
        if service != draft.author.service && !reachable.contains(service) {
            return Err(LicenseError::UnknownGrantService { service: service.to_owned() });
        }
    }

    let verify_options = VerifyOptions {
        machine: options.machine,
        now: options.now,
        dependencies_ok_if_stale: false,
        cancel: options.cancel.clone(),
    };
    for dependency in &draft.dependencies {
        verifier.verify(dependency, &verify_options)?;
    }

    let license = License {
        author: draft.author,
        client: draft.client,
        dependencies: draft.dependencies,
        grant: draft.grants,
        machine: draft.machine,
        timespan: draft.timespan,
    };

    if license.client.is_none() && !options.no_confirm {
        let approved = confirmation.is_some_and(|c| c.approve(&license));
        if !approved {
            return Err(LicenseError::ConfirmationRequired);
        }
    }

    let canonical = codec::canonical_bytes(&license)?;
    let signature = author_keypair.sk.sign(&canonical).to_bytes().to_vec();
    info!(
        service = %license.author.service,
        domain = %license.author.domain,
        bearer = license.client.is_none(),
        dependencies = license.dependencies.len(),
        "license issued"
    );

    Ok(SignedLicense { license, signature })
}

/// Services granted anywhere in the dependency forest, transitively.
fn reachable_services(dependencies: &[SignedLicense]) -> FxHashSet<String> {
    let mut services = FxHashSet::default();
    let mut stack: Vec<&SignedLicense> = dependencies.iter().collect();
    while let Some(signed) = stack.pop() {
        services.insert(signed.license.author.service.clone());
        stack.extend(signed.license.dependencies.iter());
    }
    services
}
