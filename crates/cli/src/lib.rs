//! Entry layer for `changemount <index> <from> <to>`.
//!
//! Argument parsing, credential and mount validation, and the hand-off to the
//! rename engine live here so they can be driven in-process. Only `main.rs`
//! turns a [`CliError`] into an exit status.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;
use core_types::Mount;
use core_types::config::{
    AppConfig, CONFIG_PATH_VAR, ClientConfig, ConfigError, Credentials, load_config,
};
use index_client::{AlgoliaIndex, IndexError, IndexService};
use mount_rename::{ChangeMount, RenameReport};
use thiserror::Error;
use tracing::{debug, info};

mod logging;

pub use logging::init_tracing;

pub const BIN_NAME: &str = "changemount";

pub const USAGE: &str = "usage: changemount <index> <from> <to>

  index - Algolia index name
  from  - Original mount name (e.g. '/ms/')
  to    - New mount name (e.g. '/')

  Your environment should contain values for ALGOLIA_APP_ID and ALGOLIA_API_KEY. They
  can be specified in an .env file in the working directory.
";

/// Rename a mount prefix across all records of an Algolia index.
#[derive(Parser, Debug, Clone)]
#[command(name = BIN_NAME, version, about, override_usage = "changemount [OPTIONS] <index> <from> <to>")]
pub struct Args {
    /// Algolia index name.
    pub index: String,
    /// Original mount name (e.g. '/ms/').
    pub from: String,
    /// New mount name (e.g. '/').
    pub to: String,
    /// Scan and rewrite every record but skip the write-back.
    #[arg(long)]
    pub dry_run: bool,
    /// TOML file with client and logging settings.
    #[arg(short, long, env = CONFIG_PATH_VAR)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("** error: {0}")]
    Failed(String),
}

impl CliError {
    /// Status reported for this error: 1 for usage, -1 otherwise.
    pub const fn code(&self) -> i32 {
        match self {
            Self::Usage(_) => 1,
            Self::Failed(_) => -1,
        }
    }

    fn usage() -> Self {
        Self::Usage(USAGE.to_string())
    }

    fn failed(msg: impl std::fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::failed(err)
    }
}

impl From<IndexError> for CliError {
    fn from(err: IndexError) -> Self {
        Self::failed(err)
    }
}

/// Result of argument parsing.
#[derive(Debug)]
pub enum Parsed {
    Run(Args),
    /// `--help` / `--version` text to print.
    Info(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Info(String),
    /// `from` and `to` are the same mount.
    Unchanged,
    Renamed(RenameReport),
}

/// A validated rename request.
#[derive(Debug, Clone)]
pub struct Plan {
    pub index: String,
    pub credentials: Credentials,
    pub from: Mount,
    pub to: Mount,
    pub dry_run: bool,
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I, T>(args: I) -> Result<Parsed, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv = std::iter::once(OsString::from(BIN_NAME)).chain(args.into_iter().map(Into::into));
    match Args::try_parse_from(argv) {
        Ok(args) => Ok(Parsed::Run(args)),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Ok(Parsed::Info(err.render().to_string()))
        }
        Err(err) => {
            debug!(error = %err, "argument parsing failed");
            Err(CliError::usage())
        }
    }
}

/// Check credentials and mounts; `None` means there is nothing to rename.
pub fn validate<L>(args: &Args, lookup: L) -> Result<Option<Plan>, CliError>
where
    L: Fn(&str) -> Option<String>,
{
    let credentials = Credentials::from_lookup(lookup)?;
    let from = Mount::parse(&args.from).map_err(|e| CliError::failed(format!("from {e}")))?;
    let to = Mount::parse(&args.to).map_err(|e| CliError::failed(format!("to {e}")))?;
    if from == to {
        return Ok(None);
    }
    Ok(Some(Plan {
        index: args.index.clone(),
        credentials,
        from,
        to,
        dry_run: args.dry_run,
    }))
}

/// Connect to the index and run the rename described by `plan`.
///
/// `connect` builds the index client; pass [`connect_algolia`] for the hosted
/// index.
pub async fn execute<C>(plan: Plan, config: &AppConfig, connect: C) -> Result<RenameReport, CliError>
where
    C: FnOnce(&Credentials, &str, &ClientConfig) -> Result<Box<dyn IndexService>, IndexError>,
{
    let index = connect(&plan.credentials, &plan.index, &config.client)?;
    info!(
        index = %plan.index,
        from = %plan.from,
        to = %plan.to,
        dry_run = plan.dry_run,
        "renaming mount"
    );
    let report = ChangeMount::new(&*index, plan.from, plan.to)
        .dry_run(plan.dry_run)
        .run()
        .await?;
    Ok(report)
}

/// Parse, validate, load configuration and execute in one call.
///
/// The configuration file is read only after credentials and mounts pass
/// validation, and not at all when there is nothing to rename.
pub async fn run<I, T, L, C>(args: I, lookup: L, connect: C) -> Result<Outcome, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    L: Fn(&str) -> Option<String>,
    C: FnOnce(&Credentials, &str, &ClientConfig) -> Result<Box<dyn IndexService>, IndexError>,
{
    let args = match parse_args(args)? {
        Parsed::Run(args) => args,
        Parsed::Info(text) => return Ok(Outcome::Info(text)),
    };
    let Some(plan) = validate(&args, lookup)? else {
        info!(mount = %args.from, "source and target mounts are identical; nothing to do");
        return Ok(Outcome::Unchanged);
    };
    let config = load_config(args.config.as_deref())?;
    let report = execute(plan, &config, connect).await?;
    Ok(Outcome::Renamed(report))
}

/// Connect to the hosted Algolia index.
pub fn connect_algolia(
    credentials: &Credentials,
    index: &str,
    config: &ClientConfig,
) -> Result<Box<dyn IndexService>, IndexError> {
    Ok(Box::new(AlgoliaIndex::new(credentials, index, config)?))
}

/// One-line summary printed after a run.
pub fn summary(outcome: &Outcome, args: &Args) -> Option<String> {
    match outcome {
        Outcome::Info(_) => None,
        Outcome::Unchanged => Some(format!(
            "{} and {} are the same mount; nothing to do",
            args.from, args.to
        )),
        Outcome::Renamed(report) => {
            let verb = if report.dry_run {
                "would update"
            } else {
                "updated"
            };
            Some(format!(
                "{}: {verb} {} records moving {} to {} ({} hits in {} pages)",
                args.index, report.updated, args.from, args.to, report.hits, report.pages
            ))
        }
    }
}
