//! Persistence: loading keypair records with credential candidates, atomic
//! saves into a configured search path, and seed files.

use crate::engine::{SEED_LEN, open};
use crate::error::KeyStoreError;
use crate::types::{EncryptedKeypair, PlaintextKeypair};
use getrandom::fill;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Environment variables consulted for an implicit credential candidate.
pub const ENV_USERNAME: &str = "CRYPTO_LIC_USERNAME";
pub const ENV_PASSWORD: &str = "CRYPTO_LIC_PASSWORD";

/// A `(username, password)` pair tried against encrypted keypair records.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Passwords stay out of logs and panic messages.
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Builds a credential from explicit parts.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Reads the `CRYPTO_LIC_USERNAME` / `CRYPTO_LIC_PASSWORD` pair from the
    /// environment, if both are present.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(ENV_USERNAME).ok()?;
        let password = std::env::var(ENV_PASSWORD).ok()?;
        Some(Self { username, password })
    }
}

/// Loads and decrypts the keypair record at `path`.
///
/// Candidates are tried strictly in order; the first that opens wins. The
/// environment credential is *not* consulted implicitly here - callers that
/// want it append [`Credential::from_env`] themselves, keeping candidate
/// order visible at the call site.
///
/// # Errors
/// * [`KeyStoreError::Io`] when the file cannot be read.
/// * [`KeyStoreError::CorruptRecord`] when it is not a keypair record.
/// * [`KeyStoreError::BadCredentials`] when no candidate opens it.
pub fn load(path: &Path, candidates: &[Credential]) -> Result<PlaintextKeypair, KeyStoreError> {
    let bytes = fs::read(path)?;
    let record = EncryptedKeypair::from_bytes(&bytes)?;
    record.verify_binding()?;

    for candidate in candidates {
        match open(&record, &candidate.username, &candidate.password) {
            Ok(keypair) => {
                debug!(path = %path.display(), username = %candidate.username, "keypair opened");
                return Ok(keypair);
            },
            Err(KeyStoreError::BadCredentials) => {},
            Err(other) => return Err(other),
        }
    }

    warn!(path = %path.display(), tried = candidates.len(), "no credential candidate opened keypair");
    Err(KeyStoreError::BadCredentials)
}

/// Reads a `*.crypto-seed` file: 64 hex characters of seed material,
/// surrounding whitespace ignored.
///
/// # Errors
/// * [`KeyStoreError::Io`] when the file cannot be read.
/// * [`KeyStoreError::CorruptRecord`] when the content is not 32 bytes of hex.
pub fn load_seed(path: &Path) -> Result<[u8; SEED_LEN], KeyStoreError> {
    let text = fs::read_to_string(path)?;
    let mut decoded = hex::decode(text.trim())
        .map_err(|e| KeyStoreError::CorruptRecord { reason: format!("seed is not hex: {e}") })?;
    let seed: [u8; SEED_LEN] = decoded.as_slice().try_into().map_err(|_| {
        KeyStoreError::CorruptRecord {
            reason: format!("seed is {} bytes, expected 32", decoded.len()),
        }
    })?;
    decoded.zeroize();
    Ok(seed)
}

/// Saves an encrypted keypair record, never overwriting.
///
/// Relative paths are placed into the search path: the most *general*
/// writable directory by default (typically the user's config directory),
/// or the most *specific* one (typically the working directory) when
/// `reverse` is set. Absolute paths are taken as-is and `search_path` is
/// ignored. The write is a temp-file-plus-rename, so a crash never leaves a
/// half-written record behind.
///
/// # Errors
/// * [`KeyStoreError::FileExists`] when the target already exists.
/// * [`KeyStoreError::NoWritableDirectory`] when a relative path finds no
///   writable search-path entry.
/// * [`KeyStoreError::Io`] for filesystem failures.
pub fn save(
    record: &EncryptedKeypair,
    path: &Path,
    search_path: &[PathBuf],
    reverse: bool,
) -> Result<PathBuf, KeyStoreError> {
    let target = if path.is_absolute() {
        path.to_path_buf()
    } else {
        resolve_save_dir(search_path, reverse)?.join(path)
    };

    if target.exists() {
        return Err(KeyStoreError::FileExists { path: target });
    }

    let bytes = record.to_canonical_bytes()?;
    write_atomic(&target, &bytes)?;
    debug!(path = %target.display(), "keypair record saved");
    Ok(target)
}

/// Picks the directory a relative save lands in.
///
/// The search path is ordered most-general → most-specific; the default
/// save takes the first writable entry, a reverse save the last.
///
/// # Errors
/// Returns [`KeyStoreError::NoWritableDirectory`] when nothing is writable.
pub fn resolve_save_dir(search_path: &[PathBuf], reverse: bool) -> Result<PathBuf, KeyStoreError> {
    let mut candidates: Vec<&PathBuf> = search_path.iter().collect();
    if reverse {
        candidates.reverse();
    }
    candidates
        .into_iter()
        .find(|dir| is_writable(dir))
        .cloned()
        .ok_or(KeyStoreError::NoWritableDirectory)
}

/// Probes `dir` for writability by creating and removing a scratch file.
fn is_writable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let mut token = [0u8; 4];
    if fill(&mut token).is_err() {
        return false;
    }
    let probe = dir.join(format!(".clic-probe-{}", hex::encode(token)));
    match fs::OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(file) => {
            drop(file);
            let _ = fs::remove_file(&probe);
            true
        },
        Err(_) => false,
    }
}

/// Writes `bytes` to a sibling temp file, then renames over `target`.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), KeyStoreError> {
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }

    let mut token = [0u8; 4];
    fill(&mut token).map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;
    let file_name = target
        .file_name()
        .ok_or_else(|| KeyStoreError::Internal { message: "save path has no file name".to_owned() })?;
    let tmp = target.with_file_name(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        hex::encode(token)
    ));

    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
