//! Live DNS transport for authority lookups.
//!
//! Queries go through the blocking `hickory` resolver so the engine keeps its
//! cooperative, caller-scheduled I/O model; async hosts wrap the call in
//! their own blocking executor.

use crate::error::ResolveError;
use crate::{AuthorityResolver, VERIFYING_KEY_LEN, parse_authority_record, selector};
use hickory_resolver::Resolver;
use hickory_resolver::error::ResolveErrorKind;
use tracing::debug;

/// [`AuthorityResolver`] backed by real DNS TXT queries.
pub struct DnsResolver {
    resolver: Resolver,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver").finish_non_exhaustive()
    }
}

impl DnsResolver {
    /// Builds a resolver from the host's system configuration
    /// (`/etc/resolv.conf` or platform equivalent).
    ///
    /// # Errors
    /// Returns the underlying I/O error when the system configuration cannot
    /// be read.
    pub fn from_system_conf() -> std::io::Result<Self> {
        let resolver = Resolver::from_system_conf().map_err(std::io::Error::other)?;
        Ok(Self { resolver })
    }

    /// Wraps an already-configured `hickory` resolver.
    #[must_use]
    pub fn with_resolver(resolver: Resolver) -> Self {
        Self { resolver }
    }
}

impl AuthorityResolver for DnsResolver {
    fn resolve(&self, service: &str, domain: &str) -> Result<[u8; VERIFYING_KEY_LEN], ResolveError> {
        let name = selector(service, domain);
        debug!(selector = %name, "querying authority TXT record");

        let lookup = self.resolver.txt_lookup(name.as_str()).map_err(|e| match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => {
                ResolveError::NoRecord { selector: name.clone() }
            },
            other => ResolveError::TransientDns {
                selector: name.clone(),
                reason: other.to_string(),
            },
        })?;

        let mut records = lookup.iter();
        let Some(record) = records.next() else {
            return Err(ResolveError::NoRecord { selector: name });
        };
        if records.next().is_some() {
            // One selector, one key. Anything else is a publishing mistake.
            return Err(ResolveError::MalformedRecord {
                selector: name,
                reason: "multiple TXT records published".to_owned(),
            });
        }

        // TXT payloads arrive as a sequence of character-strings that
        // concatenate into the record text.
        let mut text = String::new();
        for chunk in record.txt_data() {
            let chunk = std::str::from_utf8(chunk).map_err(|_| ResolveError::MalformedRecord {
                selector: name.clone(),
                reason: "record is not UTF-8".to_owned(),
            })?;
            text.push_str(chunk);
        }

        parse_authority_record(&name, &text)
    }
}
