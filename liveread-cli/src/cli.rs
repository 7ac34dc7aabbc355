//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use liveread_client::BUCKET_ENV;

pub fn command() -> Command {
    Command::new("liveread")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Stream data into and out of multipart uploads while they are still in progress")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("bucket")
                .long("bucket")
                .value_name("NAME")
                .global(true)
                .help(format!("Bucket name [default: ${}]", BUCKET_ENV)),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("debug-sdk")
                .long("debug-sdk")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Debug logging for the AWS SDK"),
        )
        .subcommand(
            Command::new("read")
                .about("Copy a live object to a file or stdout, following it until the upload completes")
                .arg(Arg::new("key").required(true).help("Object key"))
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Output file [default: stdout]"),
                )
                .arg(chunk_size_arg())
                .arg(
                    Arg::new("poll-interval")
                        .long("poll-interval")
                        .value_name("SECS")
                        .value_parser(value_parser!(u64).range(1..))
                        .default_value("1")
                        .help("Seconds between polls for data that has not arrived yet"),
                )
                .arg(queue_depth_arg())
                .arg(
                    Arg::new("no-wait")
                        .long("no-wait")
                        .action(ArgAction::SetTrue)
                        .help("Do not wait for an upload to start; read what exists now"),
                )
                .arg(
                    Arg::new("progress")
                        .long("progress")
                        .action(ArgAction::SetTrue)
                        .help("Print a dot to stderr as each chunk is downloaded"),
                )
                .arg(summary_arg()),
        )
        .subcommand(
            Command::new("write")
                .about("Copy a file or stdin into a live multipart upload")
                .arg(Arg::new("key").required(true).help("Object key"))
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Input file [default: stdin]"),
                )
                .arg(chunk_size_arg())
                .arg(queue_depth_arg())
                .arg(summary_arg()),
        )
}

fn chunk_size_arg() -> Arg {
    Arg::new("chunk-size")
        .long("chunk-size")
        .value_name("BYTES")
        .value_parser(value_parser!(usize))
        .default_value("5242880")
        .help("Bytes per request or part")
}

fn queue_depth_arg() -> Arg {
    Arg::new("queue-depth")
        .long("queue-depth")
        .value_name("N")
        .value_parser(value_parser!(usize))
        .default_value("4")
        .help("Chunks buffered between the network task and file I/O")
}

fn summary_arg() -> Arg {
    Arg::new("summary")
        .long("summary")
        .action(ArgAction::SetTrue)
        .help("Print a JSON transfer report to stderr when done")
}
