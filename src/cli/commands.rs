//! CLI commands implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::mpsc;

use super::progress::spawn_listener;
use crate::config::{load_settings_with_options, Config, LoadOptions, Settings};
use crate::drivers::{self, Driver};
use crate::error::ScrapeError;
use crate::ledger::Ledger;
use crate::render::{PdfRenderer, WkhtmltopdfRenderer};
use crate::scrapers::{
    crawl, drive, ChromeSession, ConfiguredSite, HttpClient, RunContext, RunSummary, SiteConfig,
};
use crate::services::Downloader;
use crate::storage::Storage;

#[derive(Parser)]
#[command(name = "lexacquire")]
#[command(about = "Legal document acquisition from per-country law repositories")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (skips discovery)
    #[arg(short, long, global = true, env = "LEXACQUIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Download root; each country gets a directory below it
    #[arg(short = 't', long = "target", global = true)]
    download_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download every document a driver can reach
    Run {
        /// Drivers to run, in order
        drivers: Vec<String>,
        /// Run every built-in and configured driver
        #[arg(short, long)]
        all: bool,
        /// Only the first listing section, page and document
        #[arg(long)]
        test_run: bool,
        /// Documents processed concurrently per listing page
        #[arg(short, long)]
        workers: Option<usize>,
        /// Metadata file (single driver only)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Show a live progress display
        #[arg(short = 'P', long)]
        progress: bool,
        /// Write metadata after every listing section
        #[arg(long)]
        checkpoint: bool,
    },

    /// List available drivers
    List,

    /// Report renderer and browser availability and resolved settings
    Check,
}

/// Per-invocation options for `run`.
struct RunOptions {
    test_run: bool,
    workers: Option<usize>,
    metadata: Option<PathBuf>,
    progress: bool,
    checkpoint: bool,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        download_root: cli.download_root,
    })
    .await
    .context("Failed to load configuration")?;
    config
        .validate(drivers::BUILTIN)
        .context("Invalid driver configuration")?;

    match cli.command {
        Commands::Run {
            drivers,
            all,
            test_run,
            workers,
            metadata,
            progress,
            checkpoint,
        } => {
            let options = RunOptions {
                test_run,
                workers,
                metadata,
                progress,
                checkpoint,
            };
            cmd_run(&settings, &config, &drivers, all, options).await
        }
        Commands::List => cmd_list(&config),
        Commands::Check => cmd_check(&settings, &config).await,
    }
}

/// Every driver name: built-ins first, then configured ones sorted.
fn all_driver_names(config: &Config) -> Vec<String> {
    let mut configured: Vec<&String> = config.drivers.keys().collect();
    configured.sort();
    drivers::BUILTIN
        .iter()
        .map(|name| name.to_string())
        .chain(configured.into_iter().cloned())
        .collect()
}

/// Resolve a driver name against the built-ins and the config file.
fn resolve_driver(name: &str, configured: &HashMap<String, SiteConfig>) -> anyhow::Result<Driver> {
    if let Some(driver) = drivers::builtin(name) {
        return Ok(driver);
    }
    let site = configured
        .get(name)
        .with_context(|| format!("Unknown driver: {}", name))?;
    let site = ConfiguredSite::new(name, site.clone())
        .with_context(|| format!("Invalid link_pattern for driver {}", name))?;
    Ok(Driver::Listing(Box::new(site)))
}

async fn cmd_run(
    settings: &Settings,
    config: &Config,
    names: &[String],
    all: bool,
    options: RunOptions,
) -> anyhow::Result<()> {
    let names = if all {
        all_driver_names(config)
    } else if names.is_empty() {
        anyhow::bail!(
            "No drivers specified. Use --all or name drivers; available: {}",
            all_driver_names(config).join(", ")
        );
    } else {
        names.to_vec()
    };
    if options.metadata.is_some() && names.len() > 1 {
        anyhow::bail!("--metadata applies to a single driver");
    }

    // resolve every name before anything is fetched
    let resolved = names
        .iter()
        .map(|name| resolve_driver(name, &config.drivers))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let client = HttpClient::new(
        settings.timeout(),
        settings.request_delay(),
        settings.user_agent.as_deref(),
    )
    .context("Failed to build HTTP client")?
    .with_retry(settings.retry_policy());

    let renderer: Option<Arc<dyn PdfRenderer>> =
        match WkhtmltopdfRenderer::new(settings.renderer_path.clone()) {
            Ok(renderer) => Some(Arc::new(renderer)),
            Err(e) => {
                tracing::info!("HTML-to-PDF rendering disabled: {}", e);
                None
            }
        };

    let mut unreachable = Vec::new();
    for driver in &resolved {
        let info = driver.info();
        println!(
            "{} Running {} ({}, {})",
            style("→").cyan(),
            style(&info.name).bold(),
            info.country,
            driver.mode()
        );
        match run_driver(driver, settings, &client, renderer.clone(), &options).await {
            Ok((summary, metadata_path)) => print_summary(&summary, &metadata_path),
            Err(e) => {
                println!("  {} {}", style("✗").red(), e);
                unreachable.push(info.name);
            }
        }
    }

    if !unreachable.is_empty() {
        anyhow::bail!("Drivers did not complete: {}", unreachable.join(", "));
    }
    Ok(())
}

/// Run one driver with its own ledger; returns the summary and metadata path.
async fn run_driver(
    driver: &Driver,
    settings: &Settings,
    client: &HttpClient,
    renderer: Option<Arc<dyn PdfRenderer>>,
    options: &RunOptions,
) -> Result<(RunSummary, PathBuf), ScrapeError> {
    let info = driver.info();
    let mut run_settings = settings.run_settings(&info.country);
    run_settings.test_run = options.test_run;
    run_settings.checkpoint |= options.checkpoint;
    if let Some(workers) = options.workers {
        run_settings.workers = workers.max(1);
    }
    if let Some(ref path) = options.metadata {
        run_settings.metadata_path = path.clone();
    }
    let metadata_path = run_settings.metadata_path.clone();

    let storage = Storage::new(settings.country_dir(&info.country));
    let mut downloader = Downloader::new(client.clone(), storage, Ledger::new());
    if let Some(renderer) = renderer {
        downloader = downloader.with_renderer(renderer);
    }

    let (events_tx, events_rx) = mpsc::channel(256);
    let listener = spawn_listener(&info.name, options.progress, events_rx);
    let ctx = RunContext::new(downloader, run_settings).with_events(events_tx);

    let result = match driver {
        Driver::Listing(site) => crawl(site.as_ref(), &ctx).await,
        Driver::Browser(browser_driver) => {
            match ChromeSession::launch(settings.browser.clone()).await {
                Ok(mut session) => drive(browser_driver.as_ref(), &mut session, &ctx).await,
                Err(e) => Err(ScrapeError::start_unreachable(&info.start_url, e.into())),
            }
        }
    };

    drop(ctx);
    let _ = listener.await;
    result.map(|summary| (summary, metadata_path))
}

fn print_summary(summary: &RunSummary, metadata_path: &Path) {
    println!(
        "  {} {} new, {} already present ({} pages visited)",
        style("✓").green(),
        summary.downloaded,
        summary.already_present,
        summary.pages_visited
    );
    if summary.duplicates > 0 {
        println!(
            "  {} {} links led to a file saved earlier this run",
            style("→").dim(),
            summary.duplicates
        );
    }
    if let Some(ref reason) = summary.aborted {
        println!("  {} stopped early: {}", style("!").yellow(), reason);
    }
    if !summary.skipped.is_empty() {
        println!("  {} {} skipped:", style("!").yellow(), summary.skipped.len());
        for skip in &summary.skipped {
            let title = skip.title.as_deref().unwrap_or("-");
            println!(
                "    {} {} {} ({})",
                style(skip.kind).dim(),
                title,
                skip.url,
                skip.message
            );
        }
    }
    println!("  {} metadata: {}", style("→").dim(), metadata_path.display());
}

fn cmd_list(config: &Config) -> anyhow::Result<()> {
    println!("{}", style("Built-in drivers").bold());
    for name in drivers::BUILTIN {
        if let Some(driver) = drivers::builtin(name) {
            let info = driver.info();
            println!(
                "  {:<14} {:<14} {:<8} {}",
                info.name,
                info.country,
                driver.mode(),
                info.start_url
            );
        }
    }

    if config.drivers.is_empty() {
        return Ok(());
    }
    println!("\n{}", style("Configured drivers").bold());
    let mut names: Vec<&String> = config.drivers.keys().collect();
    names.sort();
    for name in names {
        let site = &config.drivers[name];
        println!(
            "  {:<14} {:<14} {:<8} {}",
            name, site.country, "http", site.start_url
        );
    }
    Ok(())
}

async fn cmd_check(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("{}", style("Settings").bold());
    match config.source_path {
        Some(ref path) => println!("  config:          {}", path.display()),
        None => println!("  config:          (none, defaults)"),
    }
    println!("  download root:   {}", settings.download_root.display());
    println!("  request timeout: {}s", settings.request_timeout);
    println!(
        "  retries:         {} attempts, {}ms apart",
        settings.max_attempts, settings.retry_delay_ms
    );
    println!("  request delay:   {}ms", settings.request_delay_ms);
    println!("  workers:         {}", settings.workers);
    println!("  checkpoint:      {}", settings.checkpoint);

    println!("\n{}", style("Tools").bold());
    match WkhtmltopdfRenderer::new(settings.renderer_path.clone()) {
        Ok(renderer) => println!(
            "  {} wkhtmltopdf: {}",
            style("✓").green(),
            renderer.binary().display()
        ),
        Err(e) => println!("  {} wkhtmltopdf: {}", style("✗").red(), e),
    }
    match ChromeSession::locate(&settings.browser) {
        Ok(browser) => println!("  {} browser: {}", style("✓").green(), browser),
        Err(e) => println!("  {} browser: {}", style("✗").red(), e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(name: &str) -> Config {
        let mut config = Config::default();
        config.drivers.insert(
            name.to_string(),
            toml::from_str(
                r#"
                start_url = "https://www.riigiteataja.ee/en/"
                country = "Estonia"
                "#,
            )
            .unwrap(),
        );
        config
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "lexacquire",
            "-t",
            "/tmp/laws",
            "run",
            "albania",
            "vietnam",
            "--test-run",
            "-w",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.download_root, Some(PathBuf::from("/tmp/laws")));
        match cli.command {
            Commands::Run {
                drivers,
                test_run,
                workers,
                ..
            } => {
                assert_eq!(drivers, vec!["albania", "vietnam"]);
                assert!(test_run);
                assert_eq!(workers, Some(4));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_all_names_builtin_then_configured() {
        let names = all_driver_names(&config_with("estonia"));
        assert_eq!(names.len(), drivers::BUILTIN.len() + 1);
        assert_eq!(names[0], "albania");
        assert_eq!(names.last().map(String::as_str), Some("estonia"));
    }

    #[test]
    fn test_resolve_driver() {
        let config = config_with("estonia");
        assert_eq!(resolve_driver("kosovo", &config.drivers).unwrap().mode(), "browser");
        let configured = resolve_driver("estonia", &config.drivers).unwrap();
        assert_eq!(configured.info().country, "Estonia");
        let err = resolve_driver("atlantis", &config.drivers).err().unwrap();
        assert!(err.to_string().contains("Unknown driver: atlantis"));
    }

    #[tokio::test]
    async fn test_unknown_driver_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            download_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let options = RunOptions {
            test_run: true,
            workers: None,
            metadata: None,
            progress: false,
            checkpoint: false,
        };
        let names = vec!["albania".to_string(), "atlantis".to_string()];
        let result = cmd_run(&settings, &Config::default(), &names, false, options).await;
        assert!(result.is_err());
        assert!(!dir.path().join("Albania").exists());
    }
}
