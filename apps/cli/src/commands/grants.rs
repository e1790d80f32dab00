//! `clic grants` - discover a valid (keypair, license) pair and print the
//! effective grants it delivers.

use crate::commands::{CmdResult, Failure};
use crate::config::CliConfig;
use clic::discovery::{DiscoveryOptions, discover};
use clic::keystore::Credential;
use clic::licensing::VerifyOptions;
use clic::resolver::DnsResolver;

pub fn run(
    cfg: &CliConfig,
    username: Option<String>,
    password: Option<String>,
    machine: Option<uuid::Uuid>,
) -> CmdResult {
    let mut credentials = Vec::new();
    if let (Some(username), Some(password)) = (username, password) {
        credentials.push(Credential::new(username, password));
    }

    let resolver = DnsResolver::from_system_conf().map_err(|e| Failure::Io(e.to_string()))?;
    let options = DiscoveryOptions {
        credentials,
        verify: VerifyOptions { machine, ..VerifyOptions::default() },
    };

    let search = cfg.search_path();
    let mut discovery = discover(&search, &resolver, options);
    let chosen = discovery.by_ref().find(|candidate| candidate.license.is_some());

    match chosen {
        Some(candidate) => {
            let license = candidate.license.expect("filtered on is_some");
            let grants = license.verified.effective_grants();
            let rendered = serde_json::to_string_pretty(&grants)
                .map_err(|e| Failure::Io(format!("rendering grants: {e}")))?;
            println!("{rendered}");
            Ok(())
        },
        None if discovery.keypairs_found() > 0 && discovery.keypairs_opened() == 0 => {
            Err(Failure::BadCredentials)
        },
        None => Err(Failure::NoLicense),
    }
}
