use clap::Parser;
use rfp_watch::config::process_env;
use rfp_watch::report::{self, ConsoleReporter, EmailReporter, Reporter};
use rfp_watch::{JsonFileStore, RfpMonitor, RunError};
use std::process::ExitCode;

mod args;
use args::Args;

/// Legacy verbosity variable, honoured when RUST_LOG is unset
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    // Parse command-line arguments
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("Run failed: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Initialize logging from RUST_LOG, falling back to LOG_LEVEL
fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .map(|raw| match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" => "error",
            "TRACE" => "trace",
            _ => "info",
        })
        .unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    ::log::debug!("Logging initialized at {}", level);
}

async fn run(args: Args) -> Result<(), RunError> {
    let mut monitor = RfpMonitor::from_config_file(&args.config)?.with_force_refresh(args.force_refresh);
    if let Some(concurrency) = args.concurrency {
        monitor = monitor.with_max_concurrency(concurrency);
    }
    if let Some(timeout) = args.timeout {
        monitor = monitor.with_timeout(timeout);
    }

    ::log::info!(
        "Starting run over {} sources",
        monitor.config().sources.len()
    );
    let start_time = std::time::Instant::now();

    let mut store = JsonFileStore::new(&args.seen);
    let result = monitor.run(&mut store).await?;

    ::log::info!(
        "Polling complete in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );

    let rendered = report::render(&result, chrono::Local::now());
    if let Err(e) = ConsoleReporter.deliver(&result, &rendered).await {
        ::log::error!("Error printing report: {}", e);
    }

    if args.no_email {
        ::log::info!("Email disabled by --no-email; skipping email send.");
        return Ok(());
    }
    match EmailReporter::from_config(&monitor.config().email, process_env) {
        Ok(Some(email)) => {
            if let Err(e) = email.deliver(&result, &rendered).await {
                ::log::error!("Error sending email: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => ::log::error!("Email misconfigured: {}", e),
    }

    Ok(())
}
