use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spec_scraper::chrome::{ChromePage, ChromeSession};
use spec_scraper::config::Config;
use spec_scraper::diagnostics::{Diagnostics, MemorySnapshot, ERROR_SCREENSHOT};
use spec_scraper::fixture::FixturePage;
use spec_scraper::output::print_json;
use spec_scraper::{runner, ScrapeError};

#[derive(Parser)]
#[command(
    name = "spec-scraper",
    about = "Scrape product specifications, variants and offers with headless Chrome",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the specifications modal of one product page and print it as JSON
    Specs {
        url: String,
        /// Read a saved page instead of launching Chrome
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,
    },
    /// Crawl every storage × color combination of a product page
    Variants { url: String },
    /// Read price and promotions for every color of a product page
    Offers { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => {
            info!("✨ Process completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if matches!(e.downcast_ref::<ScrapeError>(), Some(ScrapeError::MissingArgument)) {
                eprintln!("{}", Cli::command().render_usage());
            }
            error!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let config = &config;

    match cli.command {
        Command::Specs { url, html } => {
            let url = require_url(url)?;
            if let Some(path) = html {
                let page = FixturePage::from_file(&path)?.with_url(&url);
                if let Some(result) = runner::run_specs(&page, &url, config).await? {
                    print_json(&result)?;
                }
                return Ok(());
            }

            with_chrome(config, |page| async move {
                if let Some(result) = runner::run_specs(page.as_ref(), &url, config).await? {
                    print_json(&result)?;
                }
                Ok(())
            })
            .await
        }
        Command::Variants { url } => {
            let url = require_url(url)?;
            with_chrome(config, |page| async move {
                match runner::run_variants(Arc::clone(&page), &url, config).await {
                    Ok(report) => {
                        info!("Total combinations processed: {}", report.total_processed);
                        print_json(&report)?;
                        Ok(())
                    }
                    Err(e) => {
                        let memory = MemorySnapshot::take(page.as_ref()).await;
                        error!("💥 Memory at error: {}", memory.summary());
                        Err(e.into())
                    }
                }
            })
            .await
        }
        Command::Offers { url } => {
            let url = require_url(url)?;
            with_chrome(config, |page| async move {
                let offers = runner::run_offers(page.as_ref(), &url).await?;
                print_json(&offers)?;
                Ok(())
            })
            .await
        }
    }
}

fn require_url(url: String) -> Result<String, ScrapeError> {
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(ScrapeError::MissingArgument);
    }
    Ok(url)
}

/// Launches Chrome, runs `body` on its tab, and always closes the browser.
/// A failing body gets a best-effort error screenshot first.
async fn with_chrome<F, Fut>(config: &Config, body: F) -> Result<()>
where
    F: FnOnce(Arc<ChromePage>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let session = ChromeSession::launch(&config.chrome)?;
    let page = session.page();

    let outcome = body(Arc::clone(&page)).await;
    if let Err(ref e) = outcome {
        error!("Error: {:#}", e);
        Diagnostics::new(&config.debug_dir)
            .capture(page.as_ref(), ERROR_SCREENSHOT)
            .await;
    }

    drop(page);
    session.close();
    outcome
}
