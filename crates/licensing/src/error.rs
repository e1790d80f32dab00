//! # Licensing Errors
//!
//! One enum for the whole license lifecycle: codec, issuance, verification.
//! Every variant carries a stable short [`code`](LicenseError::code) and a
//! human-readable message; neither exposes stack detail or file internals.

use clic_resolver::ResolveError;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised while encoding, issuing, or verifying licenses.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The bytes are not a well-formed license record.
    #[error("corrupt license record: {reason}")]
    CorruptRecord { reason: String },

    /// The signature does not verify over the license's canonical bytes.
    #[error("license signature is invalid or the record was tampered with")]
    BadSignature,

    /// DNS answered, but the published key differs from the license's author
    /// key.
    #[error("author key for `{service}` at {domain} is not the published authority key")]
    NotAuthoritative { service: String, domain: String },

    /// A terminal authority failure: no record, malformed record, or an
    /// unsupported key type.
    #[error(transparent)]
    Authority { source: ResolveError },

    /// DNS stayed unreachable through the whole retry ladder.
    #[error("authority lookup for `{service}` at {domain} unreachable after {attempts} attempts")]
    AuthorityUnreachable { service: String, domain: String, attempts: u32 },

    /// `now` is past the license time window.
    #[error("license expired at {end}")]
    Expired { end: chrono::DateTime<chrono::Utc> },

    /// `now` is before the license time window.
    #[error("license not valid before {start}")]
    NotYetValid { start: chrono::DateTime<chrono::Utc> },

    /// The license is bound to a different host.
    #[error("license is bound to machine {required}")]
    WrongMachine { required: Uuid },

    /// The host machine identity could not be determined.
    #[error("host machine id unavailable: {reason}")]
    MachineIdUnavailable { reason: String },

    /// A grant refines a service no verified dependency delivers.
    #[error("grant for `{service}` refines capabilities no dependency delivers")]
    UnauthorizedRefinement { service: String },

    /// Dependency recursion exceeded the defensive depth cap.
    #[error("dependency tree deeper than {max} levels")]
    DependencyTooDeep { max: usize },

    /// The caller cancelled the operation; no side effects took place.
    #[error("operation cancelled")]
    Cancelled,

    /// Issuance: the signing keypair does not match the author record's key.
    #[error("author keypair does not match the author record's public key")]
    AuthorKeyMismatch,

    /// Issuance: the grant map is missing the author's own service key.
    #[error("grant map has no entry for the author's own service `{service}`")]
    MissingOwnGrant { service: String },

    /// Issuance: a grant key names a service no dependency provides.
    #[error("grant key `{service}` matches no dependency service")]
    UnknownGrantService { service: String },

    /// Issuance: a bearer license needs explicit or interactive confirmation.
    #[error("issuing a license without a client requires confirmation")]
    ConfirmationRequired,

    /// Filesystem failure outside our control.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl LicenseError {
    /// Stable short code for programmatic handling; never changes once shipped.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CorruptRecord { .. } => "corrupt-record",
            Self::BadSignature => "bad-signature",
            Self::NotAuthoritative { .. } => "not-authoritative",
            Self::Authority { source } => source.code(),
            Self::AuthorityUnreachable { .. } => "authority-unreachable",
            Self::Expired { .. } => "expired",
            Self::NotYetValid { .. } => "not-yet-valid",
            Self::WrongMachine { .. } => "wrong-machine",
            Self::MachineIdUnavailable { .. } => "machine-id-unavailable",
            Self::UnauthorizedRefinement { .. } => "unauthorized-refinement",
            Self::DependencyTooDeep { .. } => "dependency-too-deep",
            Self::Cancelled => "cancelled",
            Self::AuthorKeyMismatch => "author-key-mismatch",
            Self::MissingOwnGrant { .. } => "missing-own-grant",
            Self::UnknownGrantService { .. } => "unknown-grant-service",
            Self::ConfirmationRequired => "confirmation-required",
            Self::Io { .. } => "io",
        }
    }
}
