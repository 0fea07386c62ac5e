//! Command-line interface for reconciling open data with the current map.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod fs;
mod reconcile;

pub use error::CliError;

use reconcile::{ReconcileArgs, run_reconcile};

pub(crate) const ARG_OPEN_DATA: &str = "open-data";
pub(crate) const ARG_CURRENT: &str = "current";
pub(crate) const ARG_BOUNDARY: &str = "boundary";
pub(crate) const ARG_TOLERANCE: &str = "tolerance";
pub(crate) const ARG_MAX_FEATURES: &str = "max-features";
pub(crate) const ARG_OPEN_DATA_TYPE: &str = "open-data-type";
pub(crate) const ARG_CURRENT_TYPE: &str = "current-type";
pub(crate) const ARG_OPEN_DATA_REFERENCE: &str = "open-data-reference";
pub(crate) const ARG_CURRENT_REFERENCE: &str = "current-reference";
pub(crate) const ENV_OPEN_DATA: &str = "ODS_CMDS_RECONCILE_OPEN_DATA";
pub(crate) const ENV_CURRENT: &str = "ODS_CMDS_RECONCILE_CURRENT";
pub(crate) const ENV_BOUNDARY: &str = "ODS_CMDS_RECONCILE_BOUNDARY";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration, downloads or
/// matching fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Reconcile(args) => {
            let mut stdout = std::io::stdout().lock();
            run_reconcile(args, &mut stdout)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "ods",
    about = "Reconcile open-data buildings with the current map",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download two feature files, align the open data and match by reference id.
    Reconcile(ReconcileArgs),
}

#[cfg(test)]
mod tests;
