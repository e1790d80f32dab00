//! Command-line argument model.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sign, verify, and discover cryptographically licensed software grants.
#[derive(Debug, Parser)]
#[command(name = "clic", version, about)]
pub struct Cli {
    /// Configuration file (TOML); `CRYPTO_LIC__*` environment variables
    /// override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (repeat for debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new encrypted keypair record.
    Keygen {
        /// Target file; a relative path lands in the search path.
        #[arg(long, default_value = "agent.crypto-keypair")]
        out: PathBuf,
        /// Derive the signing key from a `*.crypto-seed` file instead of
        /// the system CSPRNG.
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Credential username; falls back to `CRYPTO_LIC_USERNAME`.
        #[arg(long)]
        username: Option<String>,
        /// Credential password; falls back to `CRYPTO_LIC_PASSWORD`.
        #[arg(long)]
        password: Option<String>,
        /// Write to the most specific writable search-path directory
        /// (e.g. the working directory) instead of the most general.
        #[arg(long)]
        reverse_save: bool,
    },

    /// Issue and sign a new license.
    Issue {
        /// Author keypair record to sign with.
        #[arg(long)]
        keypair: PathBuf,
        /// Credential username; falls back to `CRYPTO_LIC_USERNAME`.
        #[arg(long)]
        username: Option<String>,
        /// Credential password; falls back to `CRYPTO_LIC_PASSWORD`.
        #[arg(long)]
        password: Option<String>,
        /// Author (vendor) name.
        #[arg(long)]
        name: String,
        /// Author DNS domain publishing the authority record.
        #[arg(long)]
        domain: String,
        /// Product name; the service slug derives from it.
        #[arg(long)]
        product: String,
        /// Explicit service slug, overriding the product-derived one.
        #[arg(long)]
        service: Option<String>,
        /// Recipient agent name; omit for a bearer license.
        #[arg(long, requires = "client_pubkey")]
        client_name: Option<String>,
        /// Recipient agent verifying key (base64).
        #[arg(long, requires = "client_name")]
        client_pubkey: Option<String>,
        /// Grant map as JSON, e.g. '{"my-service":{"seats":5}}'.
        #[arg(long)]
        grants: String,
        /// Signed license files this license refines (repeatable, ordered).
        #[arg(long = "dependency")]
        dependencies: Vec<PathBuf>,
        /// Bind the license to a machine id.
        #[arg(long)]
        machine: Option<uuid::Uuid>,
        /// Validity window start (RFC3339); requires --valid-seconds.
        #[arg(long, requires = "valid_seconds")]
        valid_from: Option<chrono::DateTime<chrono::Utc>>,
        /// Validity window length in seconds.
        #[arg(long, requires = "valid_from")]
        valid_seconds: Option<u64>,
        /// Issue a bearer license without interactive confirmation.
        #[arg(long)]
        no_confirm: bool,
        /// Output file for the signed license.
        #[arg(long)]
        out: PathBuf,
    },

    /// Verify a signed license file and print its effective grants.
    Verify {
        /// The `*.crypto-license` file to verify.
        file: PathBuf,
        /// Host machine id override.
        #[arg(long)]
        machine: Option<uuid::Uuid>,
        /// Clock override (RFC3339).
        #[arg(long)]
        now: Option<chrono::DateTime<chrono::Utc>>,
        /// Accept previously verified dependencies when DNS is unreachable.
        #[arg(long)]
        stale_deps: bool,
    },

    /// Discover a valid (keypair, license) pair and print its grants.
    Grants {
        /// Credential username; falls back to `CRYPTO_LIC_USERNAME`.
        #[arg(long)]
        username: Option<String>,
        /// Credential password; falls back to `CRYPTO_LIC_PASSWORD`.
        #[arg(long)]
        password: Option<String>,
        /// Host machine id override.
        #[arg(long)]
        machine: Option<uuid::Uuid>,
    },
}
