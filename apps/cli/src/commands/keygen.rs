//! `clic keygen` - create an encrypted keypair record.

use crate::commands::{CmdResult, resolve_credential};
use crate::config::CliConfig;
use clic::keystore;
use std::path::PathBuf;

pub fn run(
    cfg: &CliConfig,
    out: PathBuf,
    seed: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    reverse_save: bool,
) -> CmdResult {
    let credential = resolve_credential(username, password)?;
    let seed = seed.map(|path| keystore::load_seed(&path)).transpose()?;

    let record = keystore::create(seed, &credential.username, &credential.password)?;
    let written = keystore::save(&record, &out, cfg.search_path().dirs(), reverse_save)?;

    println!("{}", written.display());
    Ok(())
}
