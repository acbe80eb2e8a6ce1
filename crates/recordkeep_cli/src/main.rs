//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `recordkeep_core` wiring end to end: settings, logging, one Unit
//!   of Work and one audit write.
//! - Print the resulting envelope as JSON on stdout.

use clap::Parser;
use log::info;
use recordkeep_core::{init_logging, AuditLogLogic, Settings, UnitOfWorkFactory};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "recordkeep", version, about = "Record one audit entry and print the envelope")]
struct Cli {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Request URI of the audited action
    #[arg(default_value = "/health")]
    request_uri: String,

    /// Response status code of the audited action
    #[arg(default_value_t = 200, allow_negative_numbers = true)]
    status: i32,

    /// HTTP method of the audited action
    #[arg(default_value = "GET")]
    method: String,

    /// Caller IP address
    ip_address: Option<String>,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(message) => {
            eprintln!("recordkeep_cli: {message}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool, String> {
    let settings = match cli.config.as_ref() {
        Some(path) => Settings::load(path).map_err(|err| err.to_string())?,
        None => Settings::default(),
    };
    init_logging(&settings.logging)?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        recordkeep_core::core_version()
    );

    let factory =
        UnitOfWorkFactory::from_settings(&settings.database).map_err(|err| err.to_string())?;
    let uow = factory.begin().map_err(|err| err.to_string())?;
    let result = AuditLogLogic::new(&uow)
        .with_policy(settings.audit.failure_policy)
        .add_action_audit_log_entry(
            &cli.request_uri,
            cli.status,
            &cli.method,
            cli.ip_address.as_deref(),
        );

    let json = serde_json::to_string(&result).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(result.is_success())
}
