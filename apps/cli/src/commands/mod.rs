//! Command handlers and the exit-code contract.
//!
//! Exit codes are part of the platform's interface: 0 success, 1 no valid
//! (keypair, license) pair, 2 bad credentials, 3 verification failed,
//! 4 I/O or DNS error.

pub mod grants;
pub mod issue;
pub mod keygen;
pub mod verify;

use clic::keystore::{Credential, KeyStoreError};
use clic::licensing::LicenseError;
use std::fmt;

pub type CmdResult = Result<(), Failure>;

/// Why a command failed, carrying its exit code.
#[derive(Debug)]
pub enum Failure {
    /// No valid (keypair, license) pair was found.
    NoLicense,
    /// No supplied credential opened anything.
    BadCredentials,
    /// A license failed verification.
    Verification(LicenseError),
    /// Disk or DNS trouble.
    Io(String),
}

impl Failure {
    /// The process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NoLicense => 1,
            Self::BadCredentials => 2,
            Self::Verification(_) => 3,
            Self::Io(_) => 4,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLicense => f.write_str("no valid (keypair, license) pair found"),
            Self::BadCredentials => f.write_str("credentials did not open any keypair"),
            Self::Verification(e) => write!(f, "verification failed ({}): {e}", e.code()),
            Self::Io(message) => f.write_str(message),
        }
    }
}

impl From<LicenseError> for Failure {
    fn from(e: LicenseError) -> Self {
        match e {
            LicenseError::Io { .. } | LicenseError::AuthorityUnreachable { .. } => {
                Self::Io(e.to_string())
            },
            other => Self::Verification(other),
        }
    }
}

impl From<KeyStoreError> for Failure {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::BadCredentials => Self::BadCredentials,
            other => Self::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Resolves a credential from flags, falling back to the
/// `CRYPTO_LIC_USERNAME` / `CRYPTO_LIC_PASSWORD` pair.
pub fn resolve_credential(
    username: Option<String>,
    password: Option<String>,
) -> Result<Credential, Failure> {
    if let (Some(username), Some(password)) = (username, password) {
        return Ok(Credential::new(username, password));
    }
    Credential::from_env().ok_or(Failure::BadCredentials)
}
