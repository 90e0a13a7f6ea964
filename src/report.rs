//! Markdown leads report over a loaded set of opportunities.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::extract::truncate_chars;
use crate::types::{join_areas, OpportunityRecord, OpportunityScore, ServiceArea, TenderStatus};

pub const EMPTY_REPORT: &str = "No tender opportunities found in the specified period.";

const HIGH_PRIORITY_LIMIT: usize = 10;
const MEDIUM_PRIORITY_LIMIT: usize = 5;
const ANALYSIS_CHARS: usize = 300;

/// Soonest closing date first (undated last), then most keywords matched.
fn rank(a: &OpportunityRecord, b: &OpportunityRecord) -> Ordering {
    let by_closing = match (a.closing_date, b.closing_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_closing.then_with(|| b.keywords_matched.len().cmp(&a.keywords_matched.len()))
}

fn ranked(records: &[OpportunityRecord], score: OpportunityScore) -> Vec<&OpportunityRecord> {
    let mut selected: Vec<_> = records.iter().filter(|r| r.opportunity_score == score).collect();
    selected.sort_by(|a, b| rank(a, b));
    selected
}

pub fn generate_leads_report(
    records: &[OpportunityRecord],
    days_back: u32,
    generated_at: DateTime<Utc>,
) -> String {
    if records.is_empty() {
        return EMPTY_REPORT.to_string();
    }

    let high = ranked(records, OpportunityScore::High);
    let medium = ranked(records, OpportunityScore::Medium);
    let mut locations: Vec<&str> = records.iter().map(|r| r.location.as_str()).collect();
    locations.sort_unstable();
    locations.dedup();

    let mut report = String::from("# Tender Opportunities Report\n\n");
    report.push_str(&format!("**Period:** Last {} days\n", days_back));
    report.push_str(&format!("**Generated:** {}\n\n", generated_at.format("%Y-%m-%d %H:%M")));

    report.push_str("## Executive Summary\n\n");
    report.push_str(&format!("- **Total Opportunities Identified:** {}\n", records.len()));
    report.push_str(&format!("- **High Priority:** {}\n", high.len()));
    report.push_str(&format!("- **Medium Priority:** {}\n", medium.len()));
    report.push_str(&format!("- **Geographic Coverage:** {} locations\n\n", locations.len()));

    report.push_str("## High Priority Opportunities\n");
    if high.is_empty() {
        report.push_str("\nNone this period.\n");
    }
    for (i, record) in high.iter().take(HIGH_PRIORITY_LIMIT).enumerate() {
        report.push_str(&high_priority_entry(i + 1, record, generated_at));
    }

    report.push_str("\n## Service Area Breakdown\n\n");
    for area in ServiceArea::ALL {
        let count = records
            .iter()
            .filter(|r| r.service_areas_matched.contains(&area))
            .count();
        if count > 0 {
            report.push_str(&format!("- **{}:** {} opportunities\n", area.label(), count));
        }
    }

    report.push_str("\n## Medium Priority Opportunities\n\n");
    for record in medium.iter().take(MEDIUM_PRIORITY_LIMIT) {
        report.push_str(&format!(
            "- **{}** ({}) - {}\n",
            record.title, record.client_organization, record.location
        ));
    }

    report
}

fn high_priority_entry(position: usize, record: &OpportunityRecord, now: DateTime<Utc>) -> String {
    let closing = match record.closing_date {
        Some(date) if record.status_at(now) == TenderStatus::ClosingSoon => {
            format!("Closes: {} (closing soon)", date.format("%Y-%m-%d"))
        }
        Some(date) => format!("Closes: {}", date.format("%Y-%m-%d")),
        None => "Closing date TBD".to_string(),
    };
    let value = record.estimated_value.as_deref().unwrap_or("Not specified");

    let analysis = truncate_chars(&record.ai_analysis, ANALYSIS_CHARS);
    let ellipsis = if analysis.len() < record.ai_analysis.len() { "..." } else { "" };

    let mut entry = format!("\n### {}. {}\n", position, record.title);
    entry.push_str(&format!("**Client:** {}  \n", record.client_organization));
    entry.push_str(&format!("**Location:** {}  \n", record.location));
    entry.push_str(&format!("**{}**  \n", closing));
    entry.push_str(&format!("**Value:** {}  \n", value));
    entry.push_str(&format!("**Service Areas:** {}\n\n", join_areas(&record.service_areas_matched)));
    entry.push_str(&format!("**Analysis:** {}{}\n\n", analysis, ellipsis));
    entry.push_str(&format!("**URL:** {}\n\n---\n", record.url));
    entry
}
