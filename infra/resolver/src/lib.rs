//! # Authority Resolver
//!
//! Authors publish their Ed25519 verifying key in DNS under a DKIM-style
//! selector, and every license verification must confirm that the key baked
//! into the license matches the key the author currently publishes. This
//! crate owns that lookup:
//!
//! 1. **Selector construction** - `{service}.crypto-licensing._domainkey.{domain}`.
//! 2. **Record grammar** - a TXT record of semicolon-separated `key=value`
//!    tokens: `v=DKIM1; k=ed25519; p=<base64 verifying key>`.
//! 3. **Transports** - [`DnsResolver`] performs live queries over the system
//!    resolver configuration; [`StaticResolver`] serves a fixed key table for
//!    tests and air-gapped embedders.
//! 4. **Per-pass memoization** - [`PassCache`] wraps any resolver and caches
//!    outcomes for the duration of a single verification pass. Nothing is
//!    ever cached across passes.
//!
//! The [`AuthorityResolver`] trait is the seam the verifier programs against,
//! so the hard recursion logic never needs a network to test.

mod cache;
mod dns;
mod error;

pub use crate::cache::PassCache;
pub use crate::dns::DnsResolver;
pub use crate::error::ResolveError;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fxhash::FxHashMap;

/// Fixed label between the service selector and the author domain.
const SELECTOR_LABEL: &str = "crypto-licensing._domainkey";

/// Length of an Ed25519 verifying key.
pub const VERIFYING_KEY_LEN: usize = 32;

/// Resolves the verifying key an author publishes for `(service, domain)`.
///
/// Implementations block in `resolve`; the engine treats the call as one of
/// its explicit I/O points and schedules it accordingly.
pub trait AuthorityResolver {
    /// Returns the 32-byte Ed25519 verifying key published for the pair.
    ///
    /// # Errors
    /// * [`ResolveError::NoRecord`] when the selector has no TXT record.
    /// * [`ResolveError::MalformedRecord`] when the record does not parse.
    /// * [`ResolveError::UnsupportedKeyType`] when `k=` is not `ed25519`.
    /// * [`ResolveError::TransientDns`] when the query itself failed.
    fn resolve(&self, service: &str, domain: &str) -> Result<[u8; VERIFYING_KEY_LEN], ResolveError>;
}

/// Builds the fully-qualified DKIM selector for `(service, domain)`.
#[must_use]
pub fn selector(service: &str, domain: &str) -> String {
    format!("{service}.{SELECTOR_LABEL}.{domain}")
}

/// Parses the TXT record payload published at `selector`.
///
/// The grammar is a semicolon-separated list of `key=value` tokens. Required
/// tokens: `v=DKIM1`, `k=ed25519`, and `p=<base64 verifying key>`. Unknown
/// tokens are ignored, matching how mail verifiers treat DKIM records.
///
/// # Errors
/// * [`ResolveError::MalformedRecord`] for grammar violations, a missing or
///   undecodable `p=` value, or a key of the wrong length.
/// * [`ResolveError::UnsupportedKeyType`] when `k=` names another algorithm.
pub fn parse_authority_record(
    selector: &str,
    record: &str,
) -> Result<[u8; VERIFYING_KEY_LEN], ResolveError> {
    let malformed = |reason: String| ResolveError::MalformedRecord {
        selector: selector.to_owned(),
        reason,
    };

    let mut tokens: FxHashMap<&str, &str> = FxHashMap::default();
    for part in record.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| malformed(format!("token `{part}` is not key=value")))?;
        if tokens.insert(key.trim(), value.trim()).is_some() {
            return Err(malformed(format!("duplicate token `{}`", key.trim())));
        }
    }

    match tokens.get("v") {
        Some(&"DKIM1") => {},
        Some(other) => return Err(malformed(format!("unsupported record version `{other}`"))),
        None => return Err(malformed("missing v= token".to_owned())),
    }

    match tokens.get("k") {
        Some(&"ed25519") => {},
        Some(other) => {
            return Err(ResolveError::UnsupportedKeyType {
                selector: selector.to_owned(),
                kind: (*other).to_owned(),
            });
        },
        None => return Err(malformed("missing k= token".to_owned())),
    }

    let encoded = tokens.get("p").ok_or_else(|| malformed("missing p= token".to_owned()))?;
    let decoded = STANDARD
        .decode(encoded.as_bytes())
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(encoded.as_bytes()))
        .map_err(|e| malformed(format!("p= is not valid base64: {e}")))?;

    <[u8; VERIFYING_KEY_LEN]>::try_from(decoded.as_slice())
        .map_err(|_| malformed(format!("p= decodes to {} bytes, expected 32", decoded.len())))
}

/// An in-memory resolver backed by a fixed `(service, domain) → key` table.
///
/// Used by the test suites and by embedders that pin author keys out of band
/// instead of trusting live DNS.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    keys: FxHashMap<(String, String), [u8; VERIFYING_KEY_LEN]>,
}

impl StaticResolver {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` as the published key for `(service, domain)`.
    pub fn publish(
        &mut self,
        service: impl Into<String>,
        domain: impl Into<String>,
        key: [u8; VERIFYING_KEY_LEN],
    ) {
        self.keys.insert((service.into(), domain.into()), key);
    }

    /// Removes the entry for `(service, domain)`, simulating record deletion.
    pub fn withdraw(&mut self, service: &str, domain: &str) {
        self.keys.remove(&(service.to_owned(), domain.to_owned()));
    }
}

impl AuthorityResolver for StaticResolver {
    fn resolve(&self, service: &str, domain: &str) -> Result<[u8; VERIFYING_KEY_LEN], ResolveError> {
        self.keys
            .get(&(service.to_owned(), domain.to_owned()))
            .copied()
            .ok_or_else(|| ResolveError::NoRecord { selector: selector(service, domain) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEL: &str = "app.crypto-licensing._domainkey.example.com";

    #[test]
    fn selector_shape() {
        assert_eq!(selector("awesome-app", "example.com"), "awesome-app.crypto-licensing._domainkey.example.com");
    }

    #[test]
    fn parses_canonical_record() {
        let key = [7u8; 32];
        let record = format!("v=DKIM1; k=ed25519; p={}", STANDARD.encode(key));
        assert_eq!(parse_authority_record(SEL, &record).unwrap(), key);
    }

    #[test]
    fn parses_unpadded_and_unknown_tokens() {
        let key = [9u8; 32];
        let p = base64::engine::general_purpose::STANDARD_NO_PAD.encode(key);
        let record = format!("v=DKIM1; h=sha256; k=ed25519; p={p}; t=y");
        assert_eq!(parse_authority_record(SEL, &record).unwrap(), key);
    }

    #[test]
    fn rejects_wrong_key_type() {
        let record = "v=DKIM1; k=rsa; p=AAAA";
        let err = parse_authority_record(SEL, record).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedKeyType { ref kind, .. } if kind == "rsa"));
        assert_eq!(err.code(), "unsupported-key-type");
    }

    #[test]
    fn rejects_missing_or_short_key() {
        let err = parse_authority_record(SEL, "v=DKIM1; k=ed25519").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedRecord { .. }));

        let record = format!("v=DKIM1; k=ed25519; p={}", STANDARD.encode([1u8; 16]));
        let err = parse_authority_record(SEL, &record).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedRecord { ref reason, .. } if reason.contains("16 bytes")));
    }

    #[test]
    fn rejects_version_mismatch_and_duplicates() {
        let err = parse_authority_record(SEL, "v=DKIM2; k=ed25519; p=AAAA").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedRecord { .. }));

        let err = parse_authority_record(SEL, "v=DKIM1; v=DKIM1; k=ed25519; p=AAAA").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedRecord { ref reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn static_resolver_round_trip() {
        let mut table = StaticResolver::new();
        table.publish("svc", "example.com", [3u8; 32]);
        assert_eq!(table.resolve("svc", "example.com").unwrap(), [3u8; 32]);

        table.withdraw("svc", "example.com");
        let err = table.resolve("svc", "example.com").unwrap_err();
        assert!(matches!(err, ResolveError::NoRecord { .. }));
    }
}
