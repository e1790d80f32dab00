//! `clic verify` - verify a license file and print its effective grants.

use crate::commands::{CmdResult, Failure};
use clic::licensing::{Verifier, VerifyOptions};
use clic::resolver::DnsResolver;
use std::path::PathBuf;

pub fn run(
    file: PathBuf,
    machine: Option<uuid::Uuid>,
    now: Option<chrono::DateTime<chrono::Utc>>,
    stale_deps: bool,
) -> CmdResult {
    let bytes = std::fs::read(&file)?;

    let resolver = DnsResolver::from_system_conf().map_err(|e| Failure::Io(e.to_string()))?;
    let mut verifier = Verifier::new(&resolver);
    let options = VerifyOptions {
        machine,
        now,
        dependencies_ok_if_stale: stale_deps,
        ..VerifyOptions::default()
    };

    let (_, verified) = verifier.verify_bytes(&bytes, &options)?;
    let grants = verified.effective_grants();
    let rendered = serde_json::to_string_pretty(&grants)
        .map_err(|e| Failure::Io(format!("rendering grants: {e}")))?;
    println!("{rendered}");
    Ok(())
}
