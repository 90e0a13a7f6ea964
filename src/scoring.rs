//! Opportunity scoring.
//!
//! Combines the deterministic keyword score with a bounded context adjustment
//! from an external scorer. Scorer failures never escape this module: the
//! context score falls back to [`DEFAULT_CONTEXT_SCORE`] and the narrative to a
//! fixed line naming the matched service areas.

use crate::error::ContextScoringError;
use crate::relevance::RelevanceScorer;
use crate::types::{join_areas, OpportunityRecord, OpportunityScore, ServiceArea, TenderStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::warn;

pub const POINTS_PER_KEYWORD: u32 = 10;
pub const MAX_KEYWORD_SCORE: u32 = 60;
pub const MAX_CONTEXT_SCORE: u8 = 40;
pub const DEFAULT_CONTEXT_SCORE: u8 = 20;

/// Prefix of the record text sent with the score request.
pub const CONTEXT_PROMPT_CHARS: usize = 1000;
/// Prefix of the record text sent with the analysis request.
pub const ANALYSIS_PROMPT_CHARS: usize = 2000;

/// External qualitative evaluation of a tender.
#[async_trait]
pub trait ContextScorer: Send + Sync {
    /// Additional context points in `0..=40`.
    async fn score_context(&self, text: &str) -> Result<u8, ContextScoringError>;

    /// Free-text business analysis of the tender.
    async fn generate_analysis(
        &self,
        text: &str,
        title: &str,
        service_areas: &BTreeSet<ServiceArea>,
    ) -> Result<String, ContextScoringError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub keyword_score: u32,
    pub context_score: u8,
    pub total: u32,
    pub score: OpportunityScore,
}

impl ScoreBreakdown {
    pub fn new(keyword_count: usize, context_score: u8) -> Self {
        let keyword_score = keyword_score(keyword_count);
        let context_score = context_score.min(MAX_CONTEXT_SCORE);
        let total = keyword_score + u32::from(context_score);
        Self {
            keyword_score,
            context_score,
            total,
            score: OpportunityScore::from_total(total),
        }
    }
}

pub fn keyword_score(keyword_count: usize) -> u32 {
    let count = u32::try_from(keyword_count).unwrap_or(u32::MAX);
    count.saturating_mul(POINTS_PER_KEYWORD).min(MAX_KEYWORD_SCORE)
}

pub fn fallback_analysis(service_areas: &BTreeSet<ServiceArea>) -> String {
    let areas = if service_areas.is_empty() {
        "none".to_string()
    } else {
        join_areas(service_areas)
    };
    format!("Analysis unavailable. Manual review required. Matched areas: {}", areas)
}

/// Context score with the default substituted on any failure.
pub async fn context_score_or_default(scorer: &dyn ContextScorer, text: &str) -> u8 {
    match scorer.score_context(text).await {
        Ok(score) => score.min(MAX_CONTEXT_SCORE),
        Err(e) => {
            warn!(error = %e, default = DEFAULT_CONTEXT_SCORE, "Context scoring failed, using default");
            DEFAULT_CONTEXT_SCORE
        }
    }
}

/// Narrative with the fixed fallback substituted on failure or empty output.
pub async fn analysis_or_fallback(
    scorer: &dyn ContextScorer,
    text: &str,
    title: &str,
    service_areas: &BTreeSet<ServiceArea>,
) -> String {
    match scorer.generate_analysis(text, title, service_areas).await {
        Ok(analysis) if !analysis.trim().is_empty() => analysis,
        Ok(_) => fallback_analysis(service_areas),
        Err(e) => {
            warn!(error = %e, "Analysis generation failed, using fallback");
            fallback_analysis(service_areas)
        }
    }
}

/// Runs both scoring passes over a freshly extracted record.
///
/// This is the only place classification fields are written.
pub async fn classify(
    record: &mut OpportunityRecord,
    relevance: &RelevanceScorer,
    scorer: &dyn ContextScorer,
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let text = record.scoring_text();
    let matched = relevance.score(&text);

    let context_score = context_score_or_default(scorer, &text).await;
    let breakdown = ScoreBreakdown::new(matched.keywords.len(), context_score);
    let analysis = analysis_or_fallback(scorer, &text, &record.title, &matched.service_areas).await;

    record.keywords_matched = matched.keywords;
    record.service_areas_matched = matched.service_areas;
    record.opportunity_score = breakdown.score;
    record.ai_analysis = analysis;
    if record.status != TenderStatus::Awarded {
        record.status = TenderStatus::derive(record.closing_date, now);
    }

    breakdown
}
