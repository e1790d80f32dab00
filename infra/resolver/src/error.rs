//! # Resolver Errors
//!
//! This module defines the [`ResolveError`] enum used to report authority
//! lookup failures. Every variant carries the DKIM selector it failed for so
//! operators can reproduce the query with standard DNS tooling.

use thiserror::Error;

/// Failures raised while resolving an author's verifying key over DNS.
///
/// Only [`ResolveError::TransientDns`] is retriable; every other variant is a
/// terminal authority failure for the license being verified.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The selector exists in no zone, or carries no TXT record.
    #[error("no authority record published at {selector}")]
    NoRecord { selector: String },

    /// A TXT record was found but could not be parsed as a key record.
    #[error("malformed authority record at {selector}: {reason}")]
    MalformedRecord { selector: String, reason: String },

    /// The record parsed, but advertises a key algorithm other than ed25519.
    #[error("authority record at {selector} has unsupported key type `{kind}`")]
    UnsupportedKeyType { selector: String, kind: String },

    /// The DNS query itself failed (timeout, network, upstream servfail).
    #[error("transient DNS failure for {selector}: {reason}")]
    TransientDns { selector: String, reason: String },
}

impl ResolveError {
    /// Stable short code for programmatic handling; never changes once shipped.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoRecord { .. } => "no-record",
            Self::MalformedRecord { .. } => "malformed-record",
            Self::UnsupportedKeyType { .. } => "unsupported-key-type",
            Self::TransientDns { .. } => "transient-dns",
        }
    }

    /// Whether the failure may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientDns { .. })
    }
}
