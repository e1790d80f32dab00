//! # License Verification
//!
//! Recursive validation of a signed license. For a single node the state
//! machine runs: parse → signature → authority (the DNS-published key must
//! equal the embedded author key) → time window → machine binding →
//! dependencies (depth-first, left-to-right, same options) → grant
//! refinement. Only a tree that passes every step yields a
//! [`VerifiedLicense`].
//!
//! A bearer license (no `client`) verifies identically; binding a client
//! key to a local keypair is discovery's concern, not a signature property.
//!
//! ## Authority retries
//!
//! Transient DNS failures walk an exponential backoff ladder. When the
//! ladder is exhausted and the caller opted in via
//! [`VerifyOptions::dependencies_ok_if_stale`], a license whose canonical
//! bytes this `Verifier` instance has fully verified before is accepted on
//! the strength of that earlier pass. Terminal authority failures (no
//! record, malformed record, foreign key type) never retry.

use crate::cancel::CancelToken;
use crate::codec;
use crate::error::LicenseError;
use crate::grants::{Grants, override_paths, resolve_grants};
use crate::machine;
use crate::{License, SignedLicense};
use chrono::{DateTime, Utc};
use clic_resolver::{AuthorityResolver, PassCache};
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use fxhash::FxHashSet;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Defensive cap on dependency recursion. The signed-bytes construction
/// already rules out cycles; this bounds hostile deeply-nested input.
pub const MAX_DEPTH: usize = 16;

/// Backoff ladder for transient authority failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub initial: Duration,
    /// Multiplier between consecutive delays.
    pub factor: u32,
}

impl Default for RetryPolicy {
    /// 3 retries at 200 ms / 800 ms / 3.2 s.
    fn default() -> Self {
        Self { retries: 3, initial: Duration::from_millis(200), factor: 4 }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial.saturating_mul(self.factor.saturating_pow(attempt))
    }
}

/// Caller-supplied verification context.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Host identity override; when absent the host machine id is read
    /// lazily, only if some license in the tree is machine-bound.
    pub machine: Option<Uuid>,
    /// Clock override; defaults to the system clock.
    pub now: Option<DateTime<Utc>>,
    /// Accept previously-verified licenses when DNS stays unreachable.
    pub dependencies_ok_if_stale: bool,
    /// Cooperative cancellation flag.
    pub cancel: CancelToken,
}

/// A license tree that passed every verification step, in DFS order.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedLicense {
    /// The verified record.
    pub license: License,
    /// Verified dependencies, in declaration order.
    pub dependencies: Vec<VerifiedLicense>,
}

impl VerifiedLicense {
    /// The effective, deduplicated grant set this tree delivers.
    #[must_use]
    pub fn effective_grants(&self) -> Grants {
        resolve_grants(self)
    }
}

/// Verifies signed licenses against an authority resolver.
///
/// The verifier owns only two pieces of state: the retry policy and the
/// set of canonical-byte digests it has fully verified before (the stale
/// fallback). A fresh per-pass DNS cache is created for every top-level
/// [`verify`](Self::verify) call and dropped with it.
#[derive(Debug)]
pub struct Verifier<'r, R: AuthorityResolver + ?Sized> {
    resolver: &'r R,
    retry: RetryPolicy,
    previously_verified: FxHashSet<[u8; 32]>,
}

impl<'r, R: AuthorityResolver + ?Sized> Verifier<'r, R> {
    /// Creates a verifier over `resolver` with the default retry ladder.
    #[must_use]
    pub fn new(resolver: &'r R) -> Self {
        Self { resolver, retry: RetryPolicy::default(), previously_verified: FxHashSet::default() }
    }

    /// Replaces the retry ladder.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parses and verifies a license from its persisted bytes.
    ///
    /// # Errors
    /// [`LicenseError::CorruptRecord`] for unparseable bytes, then anything
    /// [`verify`](Self::verify) can return.
    pub fn verify_bytes(
        &mut self,
        bytes: &[u8],
        options: &VerifyOptions,
    ) -> Result<(SignedLicense, VerifiedLicense), LicenseError> {
        let signed = codec::decode_signed(bytes)?;
        let verified = self.verify(&signed, options)?;
        Ok((signed, verified))
    }

    /// Recursively verifies `signed` and returns the verified tree.
    ///
    /// # Errors
    /// One terminal error per spec step: `BadSignature`, the authority
    /// family, `Expired` / `NotYetValid`, `WrongMachine`,
    /// `UnauthorizedRefinement`, `DependencyTooDeep`, or `Cancelled`.
    pub fn verify(
        &mut self,
        signed: &SignedLicense,
        options: &VerifyOptions,
    ) -> Result<VerifiedLicense, LicenseError> {
        let cache = PassCache::new(self.resolver);
        let mut pass = Pass {
            now: options.now.unwrap_or_else(Utc::now),
            machine: options.machine,
            host_machine: None,
            stale_ok: options.dependencies_ok_if_stale,
            cancel: options.cancel.clone(),
        };
        self.verify_node(signed, &cache, &mut pass, 0)
    }

    fn verify_node(
        &mut self,
        signed: &SignedLicense,
        cache: &PassCache<'_, R>,
        pass: &mut Pass,
        depth: usize,
    ) -> Result<VerifiedLicense, LicenseError> {
        if depth >= MAX_DEPTH {
            return Err(LicenseError::DependencyTooDeep { max: MAX_DEPTH });
        }
        if pass.cancel.is_cancelled() {
            return Err(LicenseError::Cancelled);
        }

        let license = &signed.license;
        let canonical = codec::canonical_bytes(license)?;
        debug!(
            service = %license.author.service,
            domain = %license.author.domain,
            depth,
            "verifying license"
        );

        // Signature over the canonical bytes, under the embedded author key.
        let pubkey: [u8; 32] =
            license.author.pubkey.as_slice().try_into().map_err(|_| {
                LicenseError::CorruptRecord { reason: "author pubkey must be 32 bytes".to_owned() }
            })?;
        let vk = VerifyingKey::from_bytes(&pubkey).map_err(|_| LicenseError::CorruptRecord {
            reason: "author pubkey is not a valid ed25519 key".to_owned(),
        })?;
        let signature =
            Signature::from_slice(&signed.signature).map_err(|_| LicenseError::BadSignature)?;
        vk.verify(&canonical, &signature).map_err(|_| LicenseError::BadSignature)?;

        // Authority: the key the author publishes right now must match.
        let digest: [u8; 32] = Sha256::digest(&canonical).into();
        self.check_authority(license, cache, pass, &digest)?;

        // Time window.
        if let Some(timespan) = &license.timespan {
            if pass.now < timespan.start {
                return Err(LicenseError::NotYetValid { start: timespan.start });
            }
            if pass.now >= timespan.end() {
                return Err(LicenseError::Expired { end: timespan.end() });
            }
        }

        // Machine binding.
        if let Some(required) = license.machine {
            let host = pass.machine()?;
            if host != required {
                return Err(LicenseError::WrongMachine { required });
            }
        }

        // Dependencies, depth-first and left-to-right, same options.
        let mut dependencies = Vec::with_capacity(license.dependencies.len());
        for dependency in &license.dependencies {
            dependencies.push(self.verify_node(dependency, cache, pass, depth + 1)?);
        }

        // Grant refinement: non-own keys must refine something a dependency
        // actually delivers.
        check_refinement(license, &dependencies)?;

        self.previously_verified.insert(digest);
        Ok(VerifiedLicense { license: license.clone(), dependencies })
    }

    fn check_authority(
        &self,
        license: &License,
        cache: &PassCache<'_, R>,
        pass: &Pass,
        digest: &[u8; 32],
    ) -> Result<(), LicenseError> {
        let author = &license.author;
        let mut attempt = 0u32;
        loop {
            if pass.cancel.is_cancelled() {
                return Err(LicenseError::Cancelled);
            }
            match cache.resolve(&author.service, &author.domain) {
                Ok(published) => {
                    if published.as_slice() == author.pubkey.as_slice() {
                        return Ok(());
                    }
                    return Err(LicenseError::NotAuthoritative {
                        service: author.service.clone(),
                        domain: author.domain.clone(),
                    });
                },
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.retries {
                        if pass.stale_ok && self.previously_verified.contains(digest) {
                            warn!(
                                service = %author.service,
                                domain = %author.domain,
                                "DNS unreachable; accepting license verified earlier by this instance"
                            );
                            return Ok(());
                        }
                        return Err(LicenseError::AuthorityUnreachable {
                            service: author.service.clone(),
                            domain: author.domain.clone(),
                            attempts: attempt + 1,
                        });
                    }
                    let delay = self.retry.delay(attempt);
                    warn!(
                        service = %author.service,
                        domain = %author.domain,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient DNS failure, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                },
                Err(source) => return Err(LicenseError::Authority { source }),
            }
        }
    }
}

/// Internal per-pass state: clock, machine identity, stale opt-in.
#[derive(Debug)]
struct Pass {
    now: DateTime<Utc>,
    machine: Option<Uuid>,
    host_machine: Option<Uuid>,
    stale_ok: bool,
    cancel: CancelToken,
}

impl Pass {
    /// The host identity, read at most once per pass.
    fn machine(&mut self) -> Result<Uuid, LicenseError> {
        if let Some(machine) = self.machine {
            return Ok(machine);
        }
        if let Some(machine) = self.host_machine {
            return Ok(machine);
        }
        let machine = machine::host_machine_id()?;
        self.host_machine = Some(machine);
        Ok(machine)
    }
}

/// Every non-own grant key must name a service some verified dependency
/// delivers, and every leaf this license claims under an `override` wrapper
/// must exist in the inherited grant for that service.
fn check_refinement(
    license: &License,
    dependencies: &[VerifiedLicense],
) -> Result<(), LicenseError> {
    let own = license.author.service.as_str();
    let mut inherited = Grants::new();
    for dependency in dependencies {
        inherited.merge_from(&resolve_grants(dependency));
    }

    for (service, capability) in &license.grant.0 {
        if service.as_str() == own {
            continue;
        }
        if !inherited.contains(service) {
            return Err(LicenseError::UnauthorizedRefinement { service: service.clone() });
        }
        for path in override_paths(capability) {
            if !inherited.contains_path(service, &path) {
                return Err(LicenseError::UnauthorizedRefinement { service: service.clone() });
            }
        }
    }
    Ok(())
}
