mod cli;

use clap::Parser;
use cli::{commands, output, ux};


/// Entry point for the `flink-sql` CLI.
///
/// Runs one statement against a Flink SQL Gateway:
/// - `query`: run a statement and print its rows.
/// - `exec`: run a statement for its side effects, e.g. `INSERT INTO`.
/// - `info`: show the gateway version.
///
/// The session is opened from `--gateway` (plus `--property` overrides) and
/// closed before the program exits.
#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();

    ux::setup_logging(args.verbose, args.quiet, args.json);

    let command = args.command.to_string();
    let result = commands::run(&args).await;
    let out = output::CliOutput::new(command, result);

    if args.json {
        match serde_json::to_string_pretty(&out) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize output: {e}"),
        }
    } else {
        ux::render_human_output(&out);
    }

    if out.status == output::CliStatus::Error {
        std::process::exit(1);
    }
}
