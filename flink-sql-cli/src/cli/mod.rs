pub mod commands;
pub mod output;
pub mod ux;

pub use clap::{Parser, Subcommand};


#[derive(Parser)]
#[command(name = "flink-sql", version, about = "Run SQL statements against an Apache Flink SQL Gateway.")]
pub struct Cli {
    #[arg(
        long = "gateway",
        help = "SQL Gateway connection string, optionally carrying session properties, e.g.:
    http://localhost:8083?execution.runtime-mode=batch\n",
        env = "FLINK_SQL_GATEWAY",
        default_value = flink_sql_gateway::config::DEFAULT_GATEWAY_URL,
    )]
    pub gateway: String,

    #[arg(
        long,
        help = "SQL Gateway REST API version.",
        env = "FLINK_SQL_GATEWAY_API_VERSION",
        default_value = flink_sql_gateway::config::DEFAULT_API_VERSION,
    )]
    pub api_version: String,

    #[arg(
        short = 'p',
        long = "property",
        value_name = "KEY=VALUE",
        value_parser = parse_property,
        help = "Session property. Repeatable; overrides properties given in the connection string."
    )]
    pub properties: Vec<(String, String)>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Give up (and cancel the statement) after this many seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Set level of verbosity. [default: INFO]\n\t-v: DEBUG\n\t-vv: TRACE\n--quiet takes precedence over --verbose."
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        action = clap::ArgAction::SetTrue,
        help = "Disable all information logs (only ERROR level logs are shown).\n--quiet takes precedence over --verbose."
    )]
    pub quiet: bool,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Enable JSON output format. Human readable output is disabled when this flag is set."
    )]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a statement and print its rows.")]
    Query {
        statement: String,

        #[arg(long, help = "Stop after this many rows.")]
        limit: Option<usize>,
    },

    #[command(about = "Run a statement for its side effects and print the job it started, if any.")]
    Exec {
        statement: String,
    },

    #[command(about = "Show the gateway's product name and version.")]
    Info {},
}

impl std::fmt::Display for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Commands::Query { .. } => "query",
            Commands::Exec { .. } => "exec",
            Commands::Info { .. } => "info",
        };
        write!(f, "{name}")
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
