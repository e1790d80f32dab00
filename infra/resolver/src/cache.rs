//! Per-pass memoization of authority lookups.

use crate::error::ResolveError;
use crate::{AuthorityResolver, VERIFYING_KEY_LEN};
use fxhash::FxHashMap;
use std::cell::RefCell;
use tracing::debug;

/// Caches lookup outcomes for the lifetime of one verification pass.
///
/// A license tree frequently names the same author many times; within one
/// top-level `verify` call the second and later lookups for a
/// `(service, domain)` pair must not touch the network. Both positive
/// results and terminal negatives (no record, malformed, wrong key type)
/// are memoized; transient failures are not, because the retry ladder owns
/// those. The cache is dropped with the pass - results never outlive it.
///
/// Single-threaded by design, like the rest of the engine: the interior
/// mutability is a `RefCell`, not a lock.
#[derive(Debug)]
pub struct PassCache<'r, R: AuthorityResolver + ?Sized> {
    inner: &'r R,
    entries: RefCell<FxHashMap<(String, String), Result<[u8; VERIFYING_KEY_LEN], ResolveError>>>,
}

impl<'r, R: AuthorityResolver + ?Sized> PassCache<'r, R> {
    /// Wraps `inner` for the duration of one verification pass.
    #[must_use]
    pub fn new(inner: &'r R) -> Self {
        Self { inner, entries: RefCell::new(FxHashMap::default()) }
    }

    /// Number of memoized outcomes so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl<R: AuthorityResolver + ?Sized> AuthorityResolver for PassCache<'_, R> {
    fn resolve(&self, service: &str, domain: &str) -> Result<[u8; VERIFYING_KEY_LEN], ResolveError> {
        let key = (service.to_owned(), domain.to_owned());
        if let Some(hit) = self.entries.borrow().get(&key) {
            debug!(service, domain, "authority lookup served from pass cache");
            return hit.clone();
        }

        let outcome = self.inner.resolve(service, domain);
        if !outcome.as_ref().is_err_and(ResolveError::is_transient) {
            self.entries.borrow_mut().insert(key, outcome.clone());
        }
        outcome
    }
}
