//! # KeyStore Errors

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while creating, opening, or persisting keypairs.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// AEAD authentication failed, or the decrypted signing key does not
    /// re-derive the stored verifying key. Deliberately indistinguishable:
    /// both mean "these credentials do not open this keypair".
    #[error("credentials do not open this keypair")]
    BadCredentials,

    /// The record on disk is not a well-formed keypair record.
    #[error("corrupt keypair record: {reason}")]
    CorruptRecord { reason: String },

    /// `save` refuses to overwrite; existing files are never touched.
    #[error("refusing to overwrite existing file {}", path.display())]
    FileExists { path: PathBuf },

    /// No writable directory in the search path could take the file.
    #[error("no writable directory in the search path")]
    NoWritableDirectory,

    /// Filesystem failure outside our control.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Unexpected internal fault (entropy source, KDF parameters).
    #[error("internal keystore error: {message}")]
    Internal { message: String },
}

impl KeyStoreError {
    /// Stable short code for programmatic handling; never changes once shipped.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadCredentials => "bad-credentials",
            Self::CorruptRecord { .. } => "corrupt-record",
            Self::FileExists { .. } => "file-exists",
            Self::NoWritableDirectory => "no-writable-directory",
            Self::Io { .. } => "io",
            Self::Internal { .. } => "internal",
        }
    }
}
