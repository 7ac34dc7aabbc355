//! liveread command-line tool

use std::sync::Arc;

use anyhow::{anyhow, Result};
use liveread_cli::{cli, config, logging, reader, runtime, writer};
use liveread_cli::{GlobalSettings, ReadSettings, WriteSettings};
use liveread_client::S3Endpoint;
use liveread_engine::ShutdownController;
use serde::Serialize;
use tracing::debug;

fn main() {
    let result = runtime::block_on(run()).map_err(anyhow::Error::from).and_then(|r| r);
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let matches = cli::command().get_matches();
    logging::init(matches.get_flag("debug"), matches.get_flag("debug-sdk"))?;
    debug!("Command-line arguments: {:?}", matches);

    config::load_env_vars();
    let global = GlobalSettings::from_matches(&matches)?;
    let endpoint = Arc::new(S3Endpoint::from_env().await);
    debug!("Created S3 client");

    match matches.subcommand() {
        Some(("read", sub)) => {
            let settings = ReadSettings::from_matches(sub)?;
            let summary = reader::run(endpoint, global.bucket, &settings).await?;
            if settings.summary {
                print_summary(&summary)?;
            }
        }
        Some(("write", sub)) => {
            let settings = WriteSettings::from_matches(sub)?;
            let shutdown = ShutdownController::new();
            shutdown.install_signal_handlers()?;

            let report = writer::run(endpoint, global.bucket, &settings, &shutdown).await?;
            if settings.summary {
                print_summary(&report)?;
            }
        }
        _ => return Err(anyhow!("unknown command")),
    }

    debug!("Exiting normally");
    Ok(())
}

fn print_summary<T: Serialize>(summary: &T) -> Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
