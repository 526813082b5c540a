//! `changemount` binary: maps entry-layer results onto exit codes and stdout.

use anyhow::{Context, Result};
use cli::{
    Args, CliError, Outcome, Parsed, connect_algolia, execute, init_tracing, parse_args, summary,
    validate,
};
use console::style;
use core_types::config::load_config;

fn main() {
    dotenvy::dotenv().ok();
    let code = match try_main() {
        Ok(code) => code,
        Err(err) => {
            println!("{} {err:#}", style("** error:").red());
            -1
        }
    };
    std::process::exit(code);
}

fn try_main() -> Result<i32> {
    let args = match parse_args(std::env::args_os().skip(1)) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Info(text)) => {
            print!("{text}");
            return Ok(0);
        }
        Err(err) => return Ok(report_error(&err)),
    };

    let plan = match validate(&args, |name| std::env::var(name).ok()) {
        Ok(Some(plan)) => plan,
        Ok(None) => {
            print_summary(&Outcome::Unchanged, &args);
            return Ok(0);
        }
        Err(err) => return Ok(report_error(&err)),
    };

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return Ok(report_error(&CliError::from(err))),
    };
    init_tracing(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    match runtime.block_on(execute(plan, &config, connect_algolia)) {
        Ok(renamed) => {
            print_summary(&Outcome::Renamed(renamed), &args);
            Ok(0)
        }
        Err(err) => Ok(report_error(&err)),
    }
}

fn print_summary(outcome: &Outcome, args: &Args) {
    if let Some(line) = summary(outcome, args) {
        println!("{}", style(line).green());
    }
}

fn report_error(err: &CliError) -> i32 {
    match err {
        CliError::Usage(text) => print!("{text}"),
        CliError::Failed(_) => println!("{}", style(err).red()),
    }
    err.code()
}
