//! Settings resolved from the command line and environment

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use liveread_core::{validate_part_size, BucketId, Key};
use liveread_engine::StartMode;
use tracing::{debug, warn};

/// Load variables from a `.env` file in the working directory, if present.
pub fn load_env_vars() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment variables from {}", path.display()),
        Err(_) => warn!("No environment variables in .env"),
    }
}

/// Flags shared by every subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    pub bucket: BucketId,
    pub debug: bool,
    pub debug_sdk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSettings {
    pub key: Key,
    /// `None` writes to stdout
    pub output: Option<PathBuf>,
    pub chunk_size: usize,
    pub poll_interval: Duration,
    pub queue_depth: usize,
    pub mode: StartMode,
    pub progress: bool,
    pub summary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSettings {
    pub key: Key,
    /// `None` reads from stdin
    pub input: Option<PathBuf>,
    pub chunk_size: usize,
    pub queue_depth: usize,
    pub summary: bool,
}

/// Bucket from `--bucket`, falling back to the environment.
pub fn resolve_bucket(flag: Option<&str>) -> Result<BucketId> {
    match flag {
        Some(name) => Ok(BucketId::new(name)?),
        None => Ok(liveread_client::bucket_from_env()?),
    }
}

impl GlobalSettings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        Ok(GlobalSettings {
            bucket: resolve_bucket(matches.get_one::<String>("bucket").map(String::as_str))?,
            debug: matches.get_flag("debug"),
            debug_sdk: matches.get_flag("debug-sdk"),
        })
    }
}

impl ReadSettings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let chunk_size = required::<usize>(matches, "chunk-size")?;
        if chunk_size == 0 {
            return Err(anyhow!("--chunk-size must be at least 1 byte"));
        }
        let mode = if matches.get_flag("no-wait") {
            StartMode::Immediate
        } else {
            StartMode::WaitForUpload
        };

        Ok(ReadSettings {
            key: key(matches)?,
            output: matches.get_one::<String>("file").map(PathBuf::from),
            chunk_size,
            poll_interval: Duration::from_secs(required::<u64>(matches, "poll-interval")?),
            queue_depth: queue_depth(matches)?,
            mode,
            progress: matches.get_flag("progress"),
            summary: matches.get_flag("summary"),
        })
    }
}

impl WriteSettings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let chunk_size = validate_part_size(required::<usize>(matches, "chunk-size")?)
            .context("invalid --chunk-size")?;

        Ok(WriteSettings {
            key: key(matches)?,
            input: matches.get_one::<String>("file").map(PathBuf::from),
            chunk_size,
            queue_depth: queue_depth(matches)?,
            summary: matches.get_flag("summary"),
        })
    }
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| anyhow!("missing --{}", id))
}

fn key(matches: &ArgMatches) -> Result<Key> {
    let key = required::<String>(matches, "key")?;
    Ok(Key::new(&key)?)
}

fn queue_depth(matches: &ArgMatches) -> Result<usize> {
    let depth = required::<usize>(matches, "queue-depth")?;
    if depth == 0 {
        return Err(anyhow!("--queue-depth must be at least 1"));
    }
    Ok(depth)
}
