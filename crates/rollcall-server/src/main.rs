//! `rollcall-server` binary: `serve` and `check-config` subcommands

use anyhow::Context;
use clap::{Arg, Command};
use rollcall_core::observability::init_logging;
use rollcall_server::AppConfig;
use std::path::PathBuf;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .env("ROLLCALL_CONFIG")
        .default_value("rollcall.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the TOML configuration file")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("rollcall-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bulk attendee document generation service")
        .subcommand_required(true)
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP service")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and exit")
                .arg(config_arg()),
        );

    let matches = cli.get_matches();
    match matches.subcommand() {
        Some(("serve", args)) => {
            let path = args
                .get_one::<PathBuf>("config")
                .context("missing --config")?;
            let config = AppConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            init_logging(config.logging.format, &config.logging.filter);
            rollcall_server::serve(config).await?;
        }
        Some(("check-config", args)) => {
            let path = args
                .get_one::<PathBuf>("config")
                .context("missing --config")?;
            let config = AppConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            println!(
                "configuration OK: listening on {}, batch size {}, {} concurrent pages",
                config.server.bind, config.pipeline.batch_size, config.pipeline.concurrent_pages
            );
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}
