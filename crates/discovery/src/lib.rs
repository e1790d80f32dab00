//! # Discovery
//!
//! Applications rarely know where their keypair and license landed: the
//! user's config directory, the service's state directory, or the working
//! directory during development. Discovery walks the configured search path
//! (most-general → most-specific, deterministic order), collects
//! `*.crypto-keypair*` and `*.crypto-license*` files, opens each keypair
//! with the supplied credential candidates, and verifies each license with
//! the caller's machine and clock.
//!
//! The result is a lazy, finite iterator of [`Candidate`]s. A keypair that
//! opens but matches no verifiable license still yields - with
//! `license: None` - so the caller can decide to request or issue one. A
//! keypair no candidate opens yields nothing (and bumps a counter the CLI
//! turns into its "bad credentials" exit).
//!
//! Discovery never writes; the search path is read-only here.

use clic_keystore::{Credential, PlaintextKeypair};
use clic_licensing::verifier::{VerifiedLicense, Verifier, VerifyOptions};
use clic_licensing::{SignedLicense, codec};
use clic_resolver::AuthorityResolver;
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filename fragment marking keypair records.
pub const KEYPAIR_MARKER: &str = ".crypto-keypair";

/// Filename fragment marking license records.
pub const LICENSE_MARKER: &str = ".crypto-license";

/// An ordered list of directories, most-general first.
///
/// The same list drives keystore saves: a default save lands in the first
/// writable entry, a reverse save in the last.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Builds a search path from explicit directories.
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// The conventional path for `app`: the user's config directory
    /// (`$XDG_CONFIG_HOME/{app}` or `~/.config/{app}`) followed by the
    /// process working directory.
    #[must_use]
    pub fn standard(app: &str) -> Self {
        let mut dirs = Vec::new();
        let config_base = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from).or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
        });
        if let Some(base) = config_base {
            dirs.push(base.join(app));
        }
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }
        Self { dirs }
    }

    /// Appends a more-specific directory.
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    /// The directories, most-general first.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// What discovery is allowed to try and how it verifies.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Explicit credential candidates, tried in order. The environment pair
    /// (`CRYPTO_LIC_USERNAME` / `CRYPTO_LIC_PASSWORD`) is appended after
    /// these, when set.
    pub credentials: Vec<Credential>,
    /// Verification context: machine, clock, staleness opt-in, cancellation.
    pub verify: VerifyOptions,
}

/// A license file that verified for some keypair.
#[derive(Debug, Clone)]
pub struct DiscoveredLicense {
    /// Where the license was found.
    pub path: PathBuf,
    /// The parsed signed record.
    pub signed: SignedLicense,
    /// The verified tree.
    pub verified: VerifiedLicense,
}

/// One opened keypair, with the first license that verified for it.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Where the keypair was found.
    pub keypair_path: PathBuf,
    /// The decrypted keypair.
    pub keypair: PlaintextKeypair,
    /// The matching verified license, if any file held one.
    pub license: Option<DiscoveredLicense>,
}

/// Starts a discovery walk over `search` with `resolver` as the authority
/// seam.
#[must_use]
pub fn discover<'r, R: AuthorityResolver + ?Sized>(
    search: &SearchPath,
    resolver: &'r R,
    options: DiscoveryOptions,
) -> Discovery<'r, R> {
    let mut credentials = options.credentials;
    if let Some(env) = Credential::from_env() {
        credentials.push(env);
    }

    let (keypair_files, license_files) = enumerate(search);
    debug!(
        keypairs = keypair_files.len(),
        licenses = license_files.len(),
        "search path enumerated"
    );

    Discovery {
        keypair_files: keypair_files.into_iter(),
        license_files,
        credentials,
        verifier: Verifier::new(resolver),
        verify: options.verify,
        keypairs_found: 0,
        keypairs_opened: 0,
    }
}

/// The lazy candidate iterator returned by [`discover`].
#[derive(Debug)]
pub struct Discovery<'r, R: AuthorityResolver + ?Sized> {
    keypair_files: std::vec::IntoIter<PathBuf>,
    license_files: Vec<PathBuf>,
    credentials: Vec<Credential>,
    verifier: Verifier<'r, R>,
    verify: VerifyOptions,
    keypairs_found: usize,
    keypairs_opened: usize,
}

impl<R: AuthorityResolver + ?Sized> Discovery<'_, R> {
    /// Keypair files encountered so far.
    #[must_use]
    pub const fn keypairs_found(&self) -> usize {
        self.keypairs_found
    }

    /// Keypair files some credential candidate opened so far.
    #[must_use]
    pub const fn keypairs_opened(&self) -> usize {
        self.keypairs_opened
    }

    fn first_matching_license(&mut self, keypair: &PlaintextKeypair) -> Option<DiscoveredLicense> {
        // Borrow dance: verification needs `&mut self.verifier` while we
        // iterate the file list, so clone the (small) path list up front.
        let files = self.license_files.clone();
        for path in files {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "license file unreadable, skipping");
                    continue;
                },
            };
            let signed = match codec::decode_signed(&bytes) {
                Ok(signed) => signed,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "license file unparseable, skipping");
                    continue;
                },
            };

            // A client-bound license only pairs with the keypair it names;
            // bearer licenses pair with anything.
            if let Some(client) = &signed.license.client {
                if client.pubkey.as_slice() != keypair.vk_bytes().as_slice() {
                    debug!(path = %path.display(), "license names a different client, skipping");
                    continue;
                }
            }

            match self.verifier.verify(&signed, &self.verify) {
                Ok(verified) => {
                    debug!(path = %path.display(), "license verified");
                    return Some(DiscoveredLicense { path, signed, verified });
                },
                Err(e) => {
                    warn!(path = %path.display(), code = e.code(), error = %e, "license rejected");
                },
            }
        }
        None
    }
}

impl<R: AuthorityResolver + ?Sized> Iterator for Discovery<'_, R> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.verify.cancel.is_cancelled() {
                return None;
            }
            let path = self.keypair_files.next()?;
            self.keypairs_found += 1;

            let keypair = match clic_keystore::load(&path, &self.credentials) {
                Ok(keypair) => keypair,
                Err(e) => {
                    warn!(path = %path.display(), code = e.code(), error = %e, "keypair not opened");
                    continue;
                },
            };
            self.keypairs_opened += 1;

            let license = self.first_matching_license(&keypair);
            return Some(Candidate { keypair_path: path, keypair, license });
        }
    }
}

/// Collects keypair and license files from the search path, in a
/// deterministic order: directories as configured, files sorted by name
/// within each walk.
fn enumerate(search: &SearchPath) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut keypairs = Vec::new();
    let mut licenses = Vec::new();
    for dir in search.dirs() {
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.contains(KEYPAIR_MARKER) {
                keypairs.push(entry.path().to_path_buf());
            } else if name.contains(LICENSE_MARKER) {
                licenses.push(entry.path().to_path_buf());
            }
        }
    }
    (keypairs, licenses)
}
