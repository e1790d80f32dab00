//! `clic issue` - build, check, and sign a license.

use crate::commands::{CmdResult, Failure, resolve_credential};
use clic::keystore::{self, bytes_as_base64};
use clic::licensing::issuer::{Confirmation, IssueOptions, LicenseDraft, issue};
use clic::licensing::{Author, Client, Grants, License, LicenseError, Timespan, Verifier, codec};
use clic::resolver::DnsResolver;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Interactive bearer-license confirmation on the controlling terminal.
struct TtyConfirmation;

impl Confirmation for TtyConfirmation {
    fn approve(&self, license: &License) -> bool {
        eprintln!(
            "About to issue a BEARER license for `{}` at {} - anyone holding the file may use it.",
            license.author.service, license.author.domain
        );
        eprint!("Proceed? [y/N] ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

#[derive(Debug)]
pub struct IssueArgs {
    pub keypair: PathBuf,
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: String,
    pub domain: String,
    pub product: String,
    pub service: Option<String>,
    pub client_name: Option<String>,
    pub client_pubkey: Option<String>,
    pub grants: String,
    pub dependencies: Vec<PathBuf>,
    pub machine: Option<uuid::Uuid>,
    pub valid_from: Option<chrono::DateTime<chrono::Utc>>,
    pub valid_seconds: Option<u64>,
    pub no_confirm: bool,
    pub out: PathBuf,
}

pub fn run(args: IssueArgs) -> CmdResult {
    let credential = resolve_credential(args.username, args.password)?;
    let keypair = keystore::load(&args.keypair, std::slice::from_ref(&credential))?;

    let mut author = Author::new(args.name, args.domain, args.product, keypair.vk_bytes());
    if let Some(service) = args.service {
        author = author.with_service(service);
    }

    let grants: Grants = serde_json::from_str(&args.grants).map_err(|e| {
        Failure::Verification(LicenseError::CorruptRecord { reason: format!("grant map: {e}") })
    })?;

    let client = match (args.client_name, args.client_pubkey) {
        (Some(name), Some(encoded)) => {
            let decoded = bytes_as_base64::decode(encoded).map_err(|e| {
                Failure::Verification(LicenseError::CorruptRecord {
                    reason: format!("client pubkey: {e}"),
                })
            })?;
            let pubkey: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
                Failure::Verification(LicenseError::CorruptRecord {
                    reason: "client pubkey must decode to 32 bytes".to_owned(),
                })
            })?;
            Some(Client::new(name, pubkey))
        },
        _ => None,
    };

    let mut dependencies = Vec::with_capacity(args.dependencies.len());
    for path in &args.dependencies {
        let bytes = std::fs::read(path)?;
        dependencies.push(codec::decode_signed(&bytes).map_err(Failure::from)?);
    }

    let timespan = args.valid_from.zip(args.valid_seconds).map(|(start, length)| Timespan::new(start, length));

    let resolver = DnsResolver::from_system_conf().map_err(|e| Failure::Io(e.to_string()))?;
    let mut verifier = Verifier::new(&resolver);

    let draft = LicenseDraft {
        author,
        client,
        grants,
        dependencies,
        machine: args.machine,
        timespan,
    };
    let options = IssueOptions { no_confirm: args.no_confirm, ..IssueOptions::default() };
    let signed = issue(&keypair, draft, &mut verifier, &options, Some(&TtyConfirmation))?;

    let mut file = OpenOptions::new().write(true).create_new(true).open(&args.out)?;
    file.write_all(&signed.to_bytes()?)?;

    println!("{}", args.out.display());
    Ok(())
}
