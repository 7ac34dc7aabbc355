//! Tracing subscriber setup

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

// Targets match by prefix, so this covers every crate in the workspace
const OWN_TARGET: &str = "liveread";
const SDK_TARGETS: [&str; 4] = ["aws_config", "aws_sdk_s3", "aws_smithy_runtime", "aws_smithy_runtime_api"];

/// Filter directives for the given flags. Everything else logs at `warn`.
pub fn directives(debug: bool, debug_sdk: bool) -> String {
    let mut directives = vec!["warn".to_string()];
    if debug {
        directives.push(format!("{}=debug", OWN_TARGET));
    }
    if debug_sdk {
        directives.extend(SDK_TARGETS.iter().map(|target| format!("{}=debug", target)));
    }
    directives.join(",")
}

/// Log to stderr so stdout stays free for object data. `RUST_LOG` overrides the flags.
pub fn init(debug: bool, debug_sdk: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(debug, debug_sdk)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}
