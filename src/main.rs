use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use hse_list_monitor::models::{Config, DataSourceMode, ExtractionReport, SheetLayout};
use hse_list_monitor::report::{export_csv, render_debug, render_summary, resolve_all};
use hse_list_monitor::scraper::{ListScraper, ListSource};
use hse_list_monitor::{telemetry, RefreshOutcome, ReportCache};
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

fn cli() -> Command {
    Command::new("hse-list-monitor")
        .version("1.0")
        .about("Counts contracted and paid candidates in an enrollment list and ranks candidates")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("Spreadsheet URL, overrides source_url"),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .value_name("PATH")
                .help("Read a local spreadsheet instead of downloading one"),
        )
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("ID")
                .action(ArgAction::Append)
                .help("Registration number to rank (repeatable), overrides target_identifiers"),
        )
        .arg(
            Arg::new("watch")
                .short('w')
                .long("watch")
                .action(ArgAction::SetTrue)
                .help("Keep running and refresh every refresh_interval_secs"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print the raw debug block after each summary"),
        )
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(url) = matches.get_one::<String>("url") {
        config.source_url = url.clone();
        config.data_source_mode = DataSourceMode::Internet;
    }
    if let Some(file) = matches.get_one::<String>("file") {
        config.data_file = Some(file.clone());
        config.data_source_mode = DataSourceMode::Local;
    }
    if let Some(queries) = matches.get_many::<String>("query") {
        config.target_identifiers = queries.cloned().collect();
    }
}

struct Monitor {
    config: Config,
    layout: SheetLayout,
    source: ListSource,
    scraper: ListScraper,
    cache: ReportCache,
    verbose: bool,
}

impl Monitor {
    /// Runs one refresh through the cache and prints the result. Returns
    /// false when no report could be shown.
    async fn cycle(&mut self) -> bool {
        let now = chrono::Utc::now().timestamp();
        let key = self.source.key();
        let scraper = &self.scraper;
        let source = &self.source;
        let layout = &self.layout;

        let outcome = self
            .cache
            .refresh(&key, now, move || scraper.load(source, layout))
            .await;
        self.present(&outcome, now)
    }

    fn present<E: Display>(&self, outcome: &RefreshOutcome<E>, now: i64) -> bool {
        let report = match outcome {
            RefreshOutcome::Fetched(report) => {
                println!("✅ Loaded enrollment list from {}", self.source);
                self.export(report);
                report
            }
            RefreshOutcome::Cached(report) => {
                println!("📋 Using cached results (refreshed hourly or when the source changes)");
                report
            }
            RefreshOutcome::Stale { report, error } => {
                println!("❌ Error: {}", error);
                println!(
                    "⚠️  Showing the last successful check, {} seconds old",
                    now - report.fetched_at_epoch_seconds
                );
                report
            }
            RefreshOutcome::Failed(error) => {
                println!("❌ Error: {}", error);
                return false;
            }
        };

        let ranks = resolve_all(report, &self.config.target_identifiers);
        println!();
        print!("{}", render_summary(report, &ranks));
        if self.verbose {
            println!("\n🔧 Raw debug");
            print!("{}", render_debug(report));
        }
        true
    }

    // A failed CSV write is reported and never stops the summary
    fn export(&self, report: &ExtractionReport) {
        let Some(dir) = &self.config.output_directory else {
            return;
        };
        match export_csv(report, Path::new(dir)) {
            Ok(()) => println!("📂 CSV files written to {}", dir),
            Err(err) => {
                warn!(directory = %dir, error = %err, "CSV export failed");
                println!("❌ Could not write CSV files to {}: {}", dir, err);
            }
        }
    }

    /// Refreshes on every tick until `shutdown` completes. A shutdown that
    /// arrives mid-refresh abandons the refresh.
    async fn watch<S: Future>(&mut self, shutdown: S) {
        let period = Duration::from_secs(self.config.refresh_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Pinned once; every select below polls the same shutdown future
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if unless_stopped(self.cycle(), shutdown.as_mut()).await.is_none() {
                        break;
                    }
                    println!(
                        "\n⏱️  Next refresh in {} seconds (Ctrl-C to stop)",
                        period.as_secs()
                    );
                }
                _ = shutdown.as_mut() => break,
            }
        }

        info!("stopping refresh loop");
        println!("\n👋 Stopped");
    }
}

/// Drives `work` to completion unless `shutdown` finishes first.
async fn unless_stopped<W, S>(work: W, shutdown: Pin<&mut S>) -> Option<W::Output>
where
    W: Future,
    S: Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = shutdown => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config_file = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| "config.toml".to_string());

    let mut config = if Path::new(&config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(&config_file)
            .with_context(|| format!("failed to load {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(&config_file)?;
        println!(
            "⚠️  Please review {} (source_url, target_identifiers) and run the program again.",
            config_file
        );
        return Ok(());
    };
    apply_overrides(&mut config, &matches);

    telemetry::init(&config.log_level)?;

    let layout = SheetLayout::try_from(&config.layout).context("invalid [layout] section")?;
    let source = ListSource::from_config(&config)?;
    info!(%source, "monitor configured");

    let mut monitor = Monitor {
        scraper: ListScraper::new(Duration::from_secs(config.request_timeout_secs)),
        cache: ReportCache::new(config.refresh_interval_secs),
        verbose: matches.get_flag("verbose"),
        layout,
        source,
        config,
    };

    if matches.get_flag("watch") {
        monitor.watch(tokio::signal::ctrl_c()).await;
        Ok(())
    } else if monitor.cycle().await {
        Ok(())
    } else {
        anyhow::bail!("no enrollment report available")
    }
}
