//! Scan orchestration.
//!
//! Walks the active sites in registry order and runs each one through
//! fetch, extraction, prefilter and classification. A site that fails to
//! fetch contributes nothing and the scan moves on. Qualifying records are
//! persisted before the site's check time is recorded.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::extract::extract_listings;
use crate::registry::SiteRegistry;
use crate::relevance::{Prefilter, RelevanceScorer};
use crate::scoring::{classify, ContextScorer};
use crate::scrapers::{strategy_for, PageFetcher};
use crate::storage::{load_record, OpportunityStore, SaveOutcome};
use crate::types::{OpportunityRecord, SiteDescriptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Skip sites whose `check_frequency` has not elapsed
    pub honor_check_frequency: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFailure {
    pub site: String,
    pub message: String,
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub sites_scanned: usize,
    pub sites_skipped: usize,
    pub failures: Vec<SiteFailure>,
    pub listings_extracted: usize,
    pub prefiltered_out: usize,
    pub scored: usize,
    pub qualifying: usize,
    pub persisted: usize,
    pub duplicates: usize,
    /// Duplicates whose stored copy came from a different site
    pub key_collisions: usize,
    pub persistence_failures: usize,
}

impl ScanSummary {
    pub fn sites_failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct Monitor {
    registry: SiteRegistry,
    fetcher: Box<dyn PageFetcher>,
    scorer: Box<dyn ContextScorer>,
    store: OpportunityStore,
    relevance: RelevanceScorer,
    prefilter: Option<Prefilter>,
    options: ScanOptions,
}

impl Monitor {
    pub fn new(
        registry: SiteRegistry,
        fetcher: Box<dyn PageFetcher>,
        scorer: Box<dyn ContextScorer>,
        store: OpportunityStore,
    ) -> Self {
        Self {
            registry,
            fetcher,
            scorer,
            store,
            relevance: RelevanceScorer::default(),
            prefilter: Some(Prefilter::monitor_default()),
            options: ScanOptions::default(),
        }
    }

    pub fn with_relevance(mut self, relevance: RelevanceScorer) -> Self {
        self.relevance = relevance;
        self
    }

    /// `None` sends every extracted listing to the scorers.
    pub fn with_prefilter(mut self, prefilter: Option<Prefilter>) -> Self {
        self.prefilter = prefilter;
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn store(&self) -> &OpportunityStore {
        &self.store
    }

    /// MEDIUM and HIGH records from every active site, in site then listing order.
    pub async fn scan(&mut self) -> Result<Vec<OpportunityRecord>, MonitorError> {
        let (records, _) = self.scan_with_summary().await?;
        Ok(records)
    }

    pub async fn scan_with_summary(&mut self) -> Result<(Vec<OpportunityRecord>, ScanSummary), MonitorError> {
        self.scan_at(Utc::now()).await
    }

    /// Scan with an explicit clock, used for every timestamp the scan writes.
    pub async fn scan_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<(Vec<OpportunityRecord>, ScanSummary), MonitorError> {
        let mut summary = ScanSummary::default();
        let mut qualifying = Vec::new();

        for site in self.registry.active_sites() {
            if self.options.honor_check_frequency && !site.is_due(now) {
                debug!(site = %site.name, last_checked = ?site.last_checked, "Site not due, skipping");
                summary.sites_skipped += 1;
                continue;
            }

            info!(site = %site.name, kind = %site.kind, "Scanning site");
            let records = match self.scan_site(&site, now, &mut summary).await {
                Ok(records) => records,
                Err(message) => {
                    warn!(site = %site.name, error = %message, "Site scan failed");
                    summary.failures.push(SiteFailure { site: site.name.clone(), message });
                    continue;
                }
            };

            self.persist(&records, &mut summary);
            self.registry.record_check(&site.name, now)?;
            summary.sites_scanned += 1;
            info!(site = %site.name, qualifying = records.len(), "Site complete");

            qualifying.extend(records);
        }

        info!(
            scanned = summary.sites_scanned,
            failed = summary.sites_failed(),
            qualifying = summary.qualifying,
            persisted = summary.persisted,
            "Scan finished"
        );
        Ok((qualifying, summary))
    }

    async fn scan_site(
        &self,
        site: &SiteDescriptor,
        now: DateTime<Utc>,
        summary: &mut ScanSummary,
    ) -> Result<Vec<OpportunityRecord>, String> {
        let page = self.fetcher.fetch(site).await.map_err(|e| e.to_string())?;

        let strategy = strategy_for(site.kind);
        let listings = extract_listings(&page.html, site, &strategy, now);
        debug!(site = %site.name, listings = listings.len(), "Extracted listings");
        summary.listings_extracted += listings.len();

        let mut qualifying = Vec::new();
        for mut record in listings {
            if let Some(prefilter) = &self.prefilter {
                if !prefilter.passes(&record.scoring_text()) {
                    debug!(title = %record.title, "Listing has no monitor keyword");
                    summary.prefiltered_out += 1;
                    continue;
                }
            }

            let breakdown = classify(&mut record, &self.relevance, self.scorer.as_ref(), now).await;
            summary.scored += 1;
            debug!(
                title = %record.title,
                keyword_score = breakdown.keyword_score,
                context_score = breakdown.context_score,
                score = %breakdown.score,
                "Scored listing"
            );

            if breakdown.score.is_qualifying() {
                summary.qualifying += 1;
                qualifying.push(record);
            }
        }

        Ok(qualifying)
    }

    fn persist(&self, records: &[OpportunityRecord], summary: &mut ScanSummary) {
        for record in records {
            match self.store.save(record) {
                Ok(SaveOutcome::Written(path)) => {
                    debug!(path = ?path, "Saved opportunity");
                    summary.persisted += 1;
                }
                Ok(SaveOutcome::AlreadyPresent(path)) => {
                    summary.duplicates += 1;
                    match load_record(&path) {
                        Ok(stored) if stored.source_site != record.source_site => {
                            warn!(
                                tender_id = %record.tender_id,
                                site = %record.source_site,
                                stored_site = %stored.source_site,
                                "Tender id already stored for another site, record not saved"
                            );
                            summary.key_collisions += 1;
                        }
                        _ => debug!(path = ?path, "Opportunity already stored"),
                    }
                }
                Err(e) => {
                    warn!(tender_id = %record.tender_id, error = %e, "Failed to persist opportunity");
                    summary.persistence_failures += 1;
                }
            }
        }
    }
}
