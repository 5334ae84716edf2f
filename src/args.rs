use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rfp-watch")]
#[command(about = "Polls procurement pages and reports newly posted RFPs")]
#[command(version)]
pub struct Args {
    /// Source list (YAML)
    #[arg(short, long, default_value = "sources.yaml")]
    pub config: PathBuf,

    /// File holding URLs already reported
    #[arg(short, long, default_value = "seen.json")]
    pub seen: PathBuf,

    /// Ignore the seen cache and process all items
    #[arg(long)]
    pub force_refresh: bool,

    /// Do not send the email report even if configured
    #[arg(long)]
    pub no_email: bool,

    /// Override the number of sources fetched concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the per-fetch timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
