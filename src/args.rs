use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trafficfill",
    about = "Fill spreadsheets of URLs with traffic analytics looked up by domain",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to a config file (defaults to ./trafficfill.toml, then built-in defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write trafficfill.toml with the default settings
    InitConfig,

    /// Register a new user
    Register(RegisterArgs),

    /// Reset a password using the secret question
    ResetPassword(ResetPasswordArgs),

    /// Extract domains from the URL column of a CSV or XLSX file
    Extract(ExtractArgs),

    /// List the traffic columns available for enrichment
    Columns(AuthArgs),

    /// Query the traffic table
    Browse(BrowseArgs),

    /// Fill an uploaded CSV or XLSX file with traffic data for its domains
    Enrich(EnrichArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AuthArgs {
    /// Username to log in as
    #[arg(short, long)]
    pub user: String,

    /// Password (prefer the environment variable)
    #[arg(long, env = "TRAFFICFILL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(ClapArgs, Debug)]
pub struct RegisterArgs {
    #[arg(short, long)]
    pub user: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "TRAFFICFILL_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long)]
    pub secret_question: String,

    #[arg(long)]
    pub secret_answer: String,
}

#[derive(ClapArgs, Debug)]
pub struct ResetPasswordArgs {
    #[arg(short, long)]
    pub user: String,

    #[arg(long)]
    pub secret_question: String,

    #[arg(long)]
    pub secret_answer: String,

    #[arg(long, env = "TRAFFICFILL_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

#[derive(ClapArgs, Debug)]
pub struct ExtractArgs {
    /// CSV or XLSX file to read
    pub input: PathBuf,

    /// Column holding the URLs (defaults to the first column named like "url")
    #[arg(long)]
    pub url_column: Option<String>,

    /// Number of extracted domains to list
    #[arg(short, long)]
    pub show: Option<usize>,

    /// Write the table with its new key column to this file (.csv or .xlsx)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Only rows for this date (YYYY-MM-DD)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Case-insensitive substring of the domain
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Columns to show, comma separated (defaults from config)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Show every column
    #[arg(long, conflicts_with = "columns")]
    pub all_columns: bool,

    /// Maximum rows to print
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Write the result to a .csv or .xlsx file instead of printing CSV to stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct EnrichArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Uploaded CSV or XLSX file
    pub input: PathBuf,

    /// Column holding the URLs (defaults to the first column named like "url")
    #[arg(long)]
    pub url_column: Option<String>,

    /// Date to look up (YYYY-MM-DD, defaults to today)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Traffic columns to fill in, comma separated (defaults from config)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Copy a traffic column into a file column: attribute=destination (repeatable)
    #[arg(short, long = "map")]
    pub mappings: Vec<String>,

    /// Output file (.csv or .xlsx)
    #[arg(short, long)]
    pub output: PathBuf,
}
