//! Integration tests for the tender scan pipeline
//! Runs full scans over fixture HTML pages with stubbed fetching and context scoring

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tender_scan::error::{ContextScoringError, FetchError};
use tender_scan::registry::{CheckStateStore, SiteRegistry};
use tender_scan::relevance::RelevanceScorer;
use tender_scan::report::generate_leads_report;
use tender_scan::scoring::{ContextScorer, ScoreBreakdown};
use tender_scan::scrapers::{FetchedPage, PageFetcher};
use tender_scan::storage::OpportunityStore;
use tender_scan::{Monitor, OpportunityScore, ServiceArea, SiteDescriptor, SiteKind, TenderStatus};

const GENERIC_PORTAL: &str = include_str!("fixtures/generic_portal.html");
const TED_NOTICES: &str = include_str!("fixtures/ted_notices.html");

/// Serves fixture pages by site name; unknown sites fail like an unreachable host.
struct FixtureFetcher {
    pages: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, site: &SiteDescriptor) -> Result<FetchedPage, FetchError> {
        match self.pages.get(site.name.as_str()) {
            Some(html) => Ok(FetchedPage { url: site.url.clone(), html: html.to_string() }),
            None => Err(FetchError::Browser {
                url: site.url.clone(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

struct StubScorer {
    context_score: Option<u8>,
    calls: Arc<AtomicUsize>,
}

impl StubScorer {
    fn fixed(context_score: u8) -> Self {
        Self { context_score: Some(context_score), calls: Arc::new(AtomicUsize::new(0)) }
    }

    fn offline() -> Self {
        Self { context_score: None, calls: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl ContextScorer for StubScorer {
    async fn score_context(&self, _text: &str) -> Result<u8, ContextScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.context_score
            .ok_or_else(|| ContextScoringError::Network("connection reset".to_string()))
    }

    async fn generate_analysis(
        &self,
        _text: &str,
        _title: &str,
        _service_areas: &BTreeSet<ServiceArea>,
    ) -> Result<String, ContextScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.context_score {
            Some(_) => Ok("Strong fit for the actuarial practice.".to_string()),
            None => Err(ContextScoringError::Network("connection reset".to_string())),
        }
    }
}

fn scan_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

fn sites() -> Vec<SiteDescriptor> {
    vec![
        SiteDescriptor::new("PPIP Kenya", "https://ppip.example.go.ke/tenders", SiteKind::Generic, "Kenya", "government"),
        SiteDescriptor::new("Africa Gateway", "https://gateway.example.org/", SiteKind::Generic, "Africa", "regional"),
        SiteDescriptor::new("TED Europa", "https://ted.europa.eu/udl", SiteKind::Ted, "EU", "government"),
    ]
}

/// Three sites; the second one has no page and fails to fetch.
fn build_monitor(data_dir: &std::path::Path, scorer: StubScorer) -> Monitor {
    let pages = HashMap::from([("PPIP Kenya", GENERIC_PORTAL), ("TED Europa", TED_NOTICES)]);
    let registry = SiteRegistry::new(sites())
        .unwrap()
        .with_state_store(CheckStateStore::in_memory().unwrap())
        .unwrap();
    Monitor::new(
        registry,
        Box::new(FixtureFetcher { pages }),
        Box::new(scorer),
        OpportunityStore::open(data_dir).unwrap(),
    )
}

#[tokio::test]
async fn test_failing_site_does_not_stop_the_scan() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::fixed(25));

    let (records, summary) = monitor.scan_at(scan_time()).await.unwrap();

    let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["IFRS 17 Implementation Partner", "RFP – Actuarial Services"]);
    assert_eq!(summary.sites_scanned, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].site, "Africa Gateway");
    assert!(summary.failures[0].message.contains("connection refused"));
}

#[tokio::test]
async fn test_last_checked_only_set_for_successful_sites() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::fixed(25));

    monitor.scan_at(scan_time()).await.unwrap();

    let registry = monitor.registry();
    assert_eq!(registry.get("PPIP Kenya").unwrap().last_checked, Some(scan_time()));
    assert_eq!(registry.get("TED Europa").unwrap().last_checked, Some(scan_time()));
    assert!(registry.get("Africa Gateway").unwrap().last_checked.is_none());

    let state = registry.state().unwrap();
    assert_eq!(state.check_count("PPIP Kenya").unwrap(), 1);
    assert_eq!(state.check_count("Africa Gateway").unwrap(), 0);
}

#[tokio::test]
async fn test_only_qualifying_records_persisted() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::fixed(25));

    let (records, summary) = monitor.scan_at(scan_time()).await.unwrap();

    // The stress testing listing scores 10 + 25 = 35, LOW
    assert_eq!(summary.scored, 3);
    assert_eq!(summary.qualifying, 2);
    assert_eq!(summary.persisted, 2);
    assert!(records.iter().all(|r| r.opportunity_score >= OpportunityScore::Medium));

    let mut files: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    files.sort();
    assert_eq!(files, vec!["20260302_KE_IRA_2026_014.json", "20260302_TED-2026-118842.json"]);
}

#[tokio::test]
async fn test_actuarial_rfp_scored_medium() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::fixed(25));

    let records = monitor.scan_at(scan_time()).await.unwrap().0;
    let rfp = records.iter().find(|r| r.tender_id == "TED-2026-118842").unwrap();

    let keywords: BTreeSet<String> = rfp.keywords_matched.iter().map(|k| k.to_lowercase()).collect();
    let expected: BTreeSet<String> = ["actuarial", "actuarial services", "actuarial valuation", "ifrs 17"]
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(keywords, expected);
    assert!(rfp.service_areas_matched.contains(&ServiceArea::ActuarialServices));
    assert!(rfp.service_areas_matched.contains(&ServiceArea::Ifrs17));
    assert_eq!(rfp.opportunity_score, OpportunityScore::Medium);
    assert_eq!(rfp.status, TenderStatus::Open);
    assert_eq!(rfp.location, "Lisbon, Portugal");
    assert_eq!(rfp.url, "https://ted.europa.eu/en/notice/118842-2026");
    assert_eq!(rfp.ai_analysis, "Strong fit for the actuarial practice.");
}

#[test]
fn test_actuarial_rfp_description_alone() {
    let relevance = RelevanceScorer::default();
    let matched = relevance.score("Request for Proposal: Actuarial valuation and IFRS 17 implementation support");

    let keywords: BTreeSet<String> = matched.keywords.iter().map(|k| k.to_lowercase()).collect();
    assert_eq!(
        keywords,
        BTreeSet::from(["actuarial".to_string(), "actuarial valuation".to_string(), "ifrs 17".to_string()])
    );
    assert!(matched.service_areas.contains(&ServiceArea::ActuarialServices));
    assert!(matched.service_areas.contains(&ServiceArea::Ifrs17));

    let breakdown = ScoreBreakdown::new(matched.keywords.len(), 25);
    assert_eq!(breakdown.keyword_score, 30);
    assert_eq!(breakdown.total, 55);
    assert_eq!(breakdown.score, OpportunityScore::Medium);
}

#[tokio::test]
async fn test_prefilter_skips_scorer_calls() {
    let tmp = tempfile::TempDir::new().unwrap();
    let scorer = StubScorer::fixed(25);
    let calls = scorer.calls.clone();
    let mut monitor = build_monitor(tmp.path(), scorer);

    let (_, summary) = monitor.scan_at(scan_time()).await.unwrap();

    // The printing notice never reaches the scorer
    assert_eq!(summary.prefiltered_out, 1);
    assert_eq!(calls.load(Ordering::SeqCst), summary.scored * 2);
}

#[tokio::test]
async fn test_scorer_outage_uses_fallbacks() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::offline());

    let records = monitor.scan_at(scan_time()).await.unwrap().0;

    // 5 keywords + default context 20 = 70
    let ifrs = records.iter().find(|r| r.tender_id == "KE/IRA/2026/014").unwrap();
    assert_eq!(ifrs.opportunity_score, OpportunityScore::Medium);
    assert!(ifrs.ai_analysis.contains("Manual review required"));
    assert!(ifrs.ai_analysis.contains("IFRS17"));
}

#[tokio::test]
async fn test_stored_records_feed_the_report() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut monitor = build_monitor(tmp.path(), StubScorer::fixed(25));
    let (records, _) = monitor.scan_at(scan_time()).await.unwrap();

    let recent = monitor.store().load_recent(7, scan_time().date_naive());
    assert_eq!(recent.len(), 2);
    for record in &records {
        assert!(recent.contains(record));
    }

    let ifrs = recent.iter().find(|r| r.tender_id == "KE/IRA/2026/014").unwrap();
    assert_eq!(ifrs.closing_date, NaiveDate::from_ymd_opt(2026, 4, 30));
    assert_eq!(ifrs.estimated_value.as_deref(), Some("KES 12,000,000"));
    assert_eq!(ifrs.url, "https://ppip.example.go.ke/tenders/ke-ira-2026-014");

    let report = generate_leads_report(&recent, 7, scan_time());
    assert!(report.contains("- **Total Opportunities Identified:** 2"));
    assert!(report.contains("- **Medium Priority:** 2"));
    assert!(report.contains("- **RFP – Actuarial Services** (TED Europa) - Lisbon, Portugal"));
    assert!(report.contains("- **IFRS 17 Implementation Partner** (PPIP Kenya) - Nairobi"));
}
