use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tender_scan::config::MonitorConfig;
use tender_scan::llm::LlmContextScorer;
use tender_scan::registry::{load_sites, CheckStateStore, SiteRegistry};
use tender_scan::relevance::{MatchMode, RelevanceScorer};
use tender_scan::report::generate_leads_report;
use tender_scan::scrapers::{BrowserFetcher, HttpFetcher, StrategyFetcher};
use tender_scan::storage::OpportunityStore;
use tender_scan::{Monitor, ScanOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tender_scan=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env().context("Failed to load configuration")?;

    let sites = match &config.sites_file {
        Some(path) => load_sites(path)?,
        None => tender_scan::registry::builtin_sites(),
    };
    let state = CheckStateStore::open(&config.state_db)
        .with_context(|| format!("Failed to open site state {:?}", config.state_db))?;
    let registry = SiteRegistry::new(sites)?.with_state_store(state)?;

    let http = HttpFetcher::new(config.http_timeout).context("Failed to build HTTP client")?;
    let browser = BrowserFetcher::new(config.webdriver_url.clone(), config.browser_settle);
    let fetcher = StrategyFetcher::new(Box::new(http), Box::new(browser));

    let scorer = LlmContextScorer::new(config.openai_api_key.clone())
        .with_base_url(config.openai_base_url.clone())
        .with_model(config.model.clone());

    let store = OpportunityStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?;

    let match_mode = if config.word_boundary { MatchMode::WordBoundary } else { MatchMode::Substring };

    let mut monitor = Monitor::new(registry, Box::new(fetcher), Box::new(scorer), store)
        .with_relevance(RelevanceScorer::new(match_mode))
        .with_options(ScanOptions { honor_check_frequency: config.honor_check_frequency });

    tracing::info!(sites = monitor.registry().active_sites().len(), "Starting tender scan");
    let (records, summary) = monitor.scan_with_summary().await?;

    let now = Utc::now();
    let recent = monitor.store().load_recent(config.report_days, now.date_naive());
    let report = generate_leads_report(&recent, config.report_days, now);
    let report_path = config
        .data_dir
        .join(format!("daily_leads_report_{}.md", now.format("%Y%m%d")));
    fs::write(&report_path, report)
        .with_context(|| format!("Failed to write report {:?}", report_path))?;

    println!("Sites scanned: {}", summary.sites_scanned);
    println!("Sites skipped: {}", summary.sites_skipped);
    for failure in &summary.failures {
        println!("Site failed: {} ({})", failure.site, failure.message);
    }
    println!("Qualifying opportunities: {}", records.len());
    println!(
        "Persisted: {} new, {} already stored, {} failed",
        summary.persisted, summary.duplicates, summary.persistence_failures
    );
    println!("Report: {}", report_path.display());

    Ok(())
}
