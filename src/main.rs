//! WolfSync - HA File Replication
//!
//! Run without flags (typically from cron or a systemd timer) to mirror the
//! master's files to the standby. Run once with `--init` on the master to
//! set up the SSH trust that replication needs.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};

use wolfsync::config::{LoggingConfig, SyncConfig, DEFAULT_CONFIG_PATH};
use wolfsync::error::Error;
use wolfsync::logging::init_logging;
use wolfsync::orchestrator::{Outcome, SyncOrchestrator};
use wolfsync::role::HaRole;
use wolfsync::runner::{CommandRunner, SystemRunner};

/// WolfSync - one-way HA file replication from master to standby
#[derive(Parser, Debug)]
#[command(name = "wolfsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bootstrap SSH trust with the standby instead of replicating
    #[arg(long)]
    init: bool,

    /// Path to settings file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };

    let config = SyncConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config));
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            init_logging(log_level(&cli, "info"), &LoggingConfig::default().file);
            return ExitCode::from(report_failure(&cli, &e));
        }
    };

    init_logging(log_level(&cli, &config.logging.level), &config.logging.file);

    ExitCode::from(dispatch(&cli, config, SystemRunner))
}

/// Help and version exit 0; every other argument error exits 1
fn usage_exit_code(e: &clap::Error) -> u8 {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn log_level<'a>(cli: &Cli, configured: &'a str) -> &'a str {
    if cli.debug {
        "debug"
    } else {
        configured
    }
}

/// Run the selected operation, report the result and return the exit status
fn dispatch<R: CommandRunner>(cli: &Cli, config: SyncConfig, runner: R) -> u8 {
    match run(cli, config, runner) {
        Ok(outcome) => {
            info!("WolfSync finished: {}", outcome.describe());
            report_success(cli, outcome);
            0
        }
        Err(e) => report_failure(cli, &e),
    }
}

/// Resolve the role and run the selected operation
fn run<R: CommandRunner>(cli: &Cli, config: SyncConfig, runner: R) -> anyhow::Result<Outcome> {
    let role_file = config.ha.role_file.clone();
    let role = HaRole::resolve(&role_file)
        .with_context(|| format!("Failed to read HA role from {:?}", role_file))?;
    tracing::debug!(
        "HA role: {:?}, peer: {:?}",
        role.node_type(),
        role.remote_address()
    );

    let orchestrator = SyncOrchestrator::new(config, runner);
    let outcome = if cli.init {
        info!("Bootstrapping replication trust");
        orchestrator.init(&role)?
    } else {
        orchestrator.sync(&role)?
    };
    Ok(outcome)
}

/// Exit status for a failed run
fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1)
}

fn report_failure(cli: &Cli, e: &anyhow::Error) -> u8 {
    error!("{:#}", e);

    if cli.init {
        eprintln!("✗ {}", operator_message(e));
    }

    exit_code(e)
}

fn report_success(cli: &Cli, outcome: Outcome) {
    if cli.init {
        println!("✓ Trust bootstrap finished.");
        println!("  Check the ssh-keygen and ssh-copy-id output above; failures there are not detected.");
    } else if outcome == Outcome::NotBootstrapped && std::io::stdout().is_terminal() {
        println!("Nothing to do: {}. Run `wolfsync --init` on the master first.", outcome.describe());
    }
}

/// Short operator-facing text for init failures
fn operator_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<Error>() {
        Some(err) if err.is_precondition() => format!("{}. Nothing was changed.", err),
        _ => format!("{:#} (details in the log file)", e),
    }
}
