#![allow(clippy::print_stdout, clippy::print_stderr)]

//! `clic` - command-line front end for the licensing engine.
//!
//! All engine logic lives in the library crates; this binary parses
//! arguments, wires configuration and logging, and maps failures onto the
//! published exit codes.

mod args;
mod commands;
mod config;

use crate::args::{Cli, Command};
use crate::commands::issue::IssueArgs;
use clap::Parser;
use clic_logger::{LevelFilter, Logger};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("clic: configuration: {e}");
            return ExitCode::from(4);
        },
    };

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let mut logger = Logger::builder().name("clic").level(level);
    if let Some(path) = &cfg.log_path {
        logger = logger.path(path);
    }
    // Keep the guard alive for the life of the process.
    let _logger = logger.init();

    let result = match cli.command {
        Command::Keygen { out, seed, username, password, reverse_save } => {
            commands::keygen::run(&cfg, out, seed, username, password, reverse_save)
        },
        Command::Issue {
            keypair,
            username,
            password,
            name,
            domain,
            product,
            service,
            client_name,
            client_pubkey,
            grants,
            dependencies,
            machine,
            valid_from,
            valid_seconds,
            no_confirm,
            out,
        } => commands::issue::run(IssueArgs {
            keypair,
            username,
            password,
            name,
            domain,
            product,
            service,
            client_name,
            client_pubkey,
            grants,
            dependencies,
            machine,
            valid_from,
            valid_seconds,
            no_confirm,
            out,
        }),
        Command::Verify { file, machine, now, stale_deps } => {
            commands::verify::run(file, machine, now, stale_deps)
        },
        Command::Grants { username, password, machine } => {
            commands::grants::run(&cfg, username, password, machine)
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("clic: {failure}");
            ExitCode::from(failure.exit_code())
        },
    }
}
