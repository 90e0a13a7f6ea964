//! Listing extraction.
//!
//! Turns the listing elements of a fetched page into placeholder-classified
//! [`OpportunityRecord`]s. Every field is read through an ordered list of
//! selector candidates; the first non-empty match wins. An element without a
//! title is not a listing and yields nothing.

use crate::scrapers::ListingStrategy;
use crate::types::{
    Likelihood, OpportunityRecord, OpportunityScore, SiteDescriptor, TenderStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
/// Longest reference kept as-is, in bytes, so the stored file name stays valid.
pub const MAX_TENDER_ID_BYTES: usize = 120;

const TITLE_SELECTORS: &[&str] = &["h1", "h2", "h3", ".title", ".notice-title"];
const DESCRIPTION_SELECTORS: &[&str] = &[".description", ".summary", "p"];
const ID_SELECTORS: &[&str] = &[".id", ".reference", ".number"];
const CLOSING_DATE_SELECTORS: &[&str] = &[".closing", ".deadline", ".date"];
const VALUE_SELECTORS: &[&str] = &[".value", ".amount", ".budget"];
const LOCATION_SELECTORS: &[&str] = &[".location", ".country", ".region"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d", "%B %d, %Y",
];

/// Extract every listing on the page, in document order, up to the strategy limit.
pub fn extract_listings(
    html: &str,
    site: &SiteDescriptor,
    strategy: &ListingStrategy,
    now: DateTime<Utc>,
) -> Vec<OpportunityRecord> {
    let document = Html::parse_document(html);

    for selector_str in strategy.listing_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let elements: Vec<ElementRef> = document.select(&selector).take(strategy.limit).collect();
        if elements.is_empty() {
            continue;
        }
        return elements
            .iter()
            .filter_map(|element| extract_record(element, site, now))
            .collect();
    }

    Vec::new()
}

/// Build a record from one listing element, or `None` when it has no title.
pub fn extract_record(
    element: &ElementRef,
    site: &SiteDescriptor,
    now: DateTime<Utc>,
) -> Option<OpportunityRecord> {
    let title = extract_text(element, TITLE_SELECTORS)?;
    let title = truncate_chars(&title, MAX_TITLE_CHARS).to_string();
    let description = extract_text(element, DESCRIPTION_SELECTORS)
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS).to_string())
        .unwrap_or_default();

    let tender_id = extract_text(element, ID_SELECTORS)
        .filter(|id| id.len() <= MAX_TENDER_ID_BYTES)
        .unwrap_or_else(|| fallback_tender_id(&title, &site.name, now.date_naive()));
    let closing_date = extract_date(element, CLOSING_DATE_SELECTORS);
    let estimated_value = extract_text(element, VALUE_SELECTORS);
    let location = extract_text(element, LOCATION_SELECTORS).unwrap_or_else(|| site.country.clone());
    let url = extract_url(element, &site.url);

    Some(OpportunityRecord {
        title,
        description,
        tender_id,
        source_site: site.name.clone(),
        url,
        client_organization: site.name.clone(),
        publication_date: now,
        closing_date,
        estimated_value,
        location,
        status: TenderStatus::Open,
        service_areas_matched: BTreeSet::new(),
        keywords_matched: Vec::new(),
        opportunity_score: OpportunityScore::Low,
        ai_analysis: String::new(),
        recommended_team: Vec::new(),
        competition_level: Likelihood::Medium,
        win_probability: Likelihood::Medium,
        submission_requirements: Vec::new(),
        contact_information: BTreeMap::new(),
        documents_available: Vec::new(),
        timestamp: now,
    })
}

/// First non-empty text among the selector candidates.
fn extract_text(element: &ElementRef, selectors: &[&str]) -> Option<String> {
    for sel_str in selectors {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        for found in element.select(&sel) {
            let text = element_text(&found);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_date(element: &ElementRef, selectors: &[&str]) -> Option<NaiveDate> {
    extract_text(element, selectors).and_then(|text| parse_date(&text))
}

/// Parse the first ten characters against each known format in turn.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = truncate_chars(text.trim(), 10);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

fn extract_url(element: &ElementRef, base_url: &str) -> String {
    let own_href = (element.value().name() == "a")
        .then(|| element.value().attr("href"))
        .flatten();

    let href = own_href.or_else(|| {
        Selector::parse("a[href]")
            .ok()
            .and_then(|sel| element.select(&sel).next())
            .and_then(|link| link.value().attr("href"))
    });

    match href.map(str::trim).filter(|h| !h.is_empty()) {
        Some(href) => resolve_url(base_url, href),
        None => base_url.to_string(),
    }
}

/// Resolve `href` against the site URL; unresolvable links fall back to the site URL.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base_url.to_string())
}

/// Stable identifier for listings that carry no reference number.
///
/// SHA-256 over the normalized title, source site and publication day, so the
/// same notice seen twice on one day keys to the same stored record.
pub fn fallback_tender_id(title: &str, source_site: &str, publication_date: NaiveDate) -> String {
    let normalized_title = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(normalized_title.as_bytes());
    hasher.update(b"\n");
    hasher.update(source_site.as_bytes());
    hasher.update(b"\n");
    hasher.update(publication_date.format("%Y-%m-%d").to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("AUTO_{}", &digest[..16])
}

/// Prefix of at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::strategy_for;
    use crate::types::SiteKind;
    use chrono::TimeZone;

    fn site() -> SiteDescriptor {
        SiteDescriptor::new(
            "UK Contracts Finder",
            "https://www.contractsfinder.service.gov.uk/Search/Results",
            SiteKind::Generic,
            "UK",
            "government",
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    fn first_record(html: &str) -> Option<OpportunityRecord> {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div.tender").unwrap();
        let element = doc.select(&sel).next().unwrap();
        extract_record(&element, &site(), now())
    }

    #[test]
    fn test_oversized_reference_replaced_by_fallback_id() {
        let reference = "REF-".repeat(80);
        let html = format!(
            r#"<div class="tender"><h3>Pension audit</h3><span class="reference">{}</span></div>"#,
            reference
        );
        let record = first_record(&html).unwrap();
        assert_eq!(
            record.tender_id,
            fallback_tender_id("Pension audit", "UK Contracts Finder", now().date_naive())
        );

        let html = r#"<div class="tender"><h3>Pension audit</h3><span class="reference">PA-7</span></div>"#;
        assert_eq!(first_record(html).unwrap().tender_id, "PA-7");
    }

    #[test]
    fn test_missing_title_yields_nothing() {
        let html = r#"<div class="tender"><p>Pension scheme review</p><span class="id">T-1</span></div>"#;
        assert!(first_record(html).is_none());
    }

    #[test]
    fn test_full_listing() {
        let html = r#"
            <div class="tender">
                <h3>  Actuarial valuation of staff pension fund </h3>
                <div class="summary">Triennial valuation and IFRS 17 advice.</div>
                <span class="reference">CF/2026/0042</span>
                <span class="deadline">2026-04-15 17:00</span>
                <span class="budget">GBP 120,000</span>
                <span class="region">London</span>
                <a href="/Notice/0042">Details</a>
            </div>"#;
        let record = first_record(html).unwrap();
        assert_eq!(record.title, "Actuarial valuation of staff pension fund");
        assert_eq!(record.description, "Triennial valuation and IFRS 17 advice.");
        assert_eq!(record.tender_id, "CF/2026/0042");
        assert_eq!(record.closing_date, NaiveDate::from_ymd_opt(2026, 4, 15));
        assert_eq!(record.estimated_value.as_deref(), Some("GBP 120,000"));
        assert_eq!(record.location, "London");
        assert_eq!(record.url, "https://www.contractsfinder.service.gov.uk/Notice/0042");
        assert_eq!(record.client_organization, "UK Contracts Finder");
        assert_eq!(record.status, TenderStatus::Open);
        assert_eq!(record.opportunity_score, OpportunityScore::Low);
        assert!(record.keywords_matched.is_empty());
        assert!(record.ai_analysis.is_empty());
        assert_eq!(record.timestamp, now());
    }

    #[test]
    fn test_defaults_when_fields_absent() {
        let html = r#"<div class="tender"><h2>Risk appetite framework</h2></div>"#;
        let record = first_record(html).unwrap();
        assert_eq!(record.location, "UK");
        assert_eq!(record.url, site().url);
        assert!(record.closing_date.is_none());
        assert!(record.estimated_value.is_none());
        assert!(record.description.is_empty());
        assert!(record.tender_id.starts_with("AUTO_"));
    }

    #[test]
    fn test_empty_candidate_falls_through() {
        let html = r#"<div class="tender"><h1> </h1><div class="title">Solvency II review</div></div>"#;
        let record = first_record(html).unwrap();
        assert_eq!(record.title, "Solvency II review");
    }

    #[test]
    fn test_truncation() {
        let long_title = "é".repeat(250);
        let long_desc = "x".repeat(1500);
        let html = format!(
            r#"<div class="tender"><h2>{}</h2><p>{}</p></div>"#,
            long_title, long_desc
        );
        let record = first_record(&html).unwrap();
        assert_eq!(record.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(record.description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2026-05-01"), NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(parse_date("15/04/2026 noon"), NaiveDate::from_ymd_opt(2026, 4, 15));
        // Day-first wins when both readings are valid
        assert_eq!(parse_date("03/04/2026"), NaiveDate::from_ymd_opt(2026, 4, 3));
        assert_eq!(parse_date("04/25/2026"), NaiveDate::from_ymd_opt(2026, 4, 25));
        assert_eq!(parse_date("2026/06/30"), NaiveDate::from_ymd_opt(2026, 6, 30));
        assert_eq!(parse_date("Closing soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_fallback_id_is_stable() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let a = fallback_tender_id("Pension  Audit Services", "TED Europa", day);
        let b = fallback_tender_id("pension audit services", "TED Europa", day);
        assert_eq!(a, b);
        assert_eq!(a.len(), "AUTO_".len() + 16);

        let other_site = fallback_tender_id("Pension Audit Services", "Merx Canada", day);
        let other_day = fallback_tender_id("Pension Audit Services", "TED Europa", day.succ_opt().unwrap());
        assert_ne!(a, other_site);
        assert_ne!(a, other_day);
    }

    #[test]
    fn test_resolve_url() {
        let base = "https://ted.europa.eu/udl?lang=en";
        assert_eq!(resolve_url(base, "/notice/123"), "https://ted.europa.eu/notice/123");
        assert_eq!(resolve_url(base, "notice/9"), "https://ted.europa.eu/notice/9");
        assert_eq!(resolve_url(base, "https://other.org/x"), "https://other.org/x");
    }

    #[test]
    fn test_extract_listings_uses_first_matching_selector() {
        let html = r#"
            <html><body>
              <div class="notice"><h3>Should not be used</h3></div>
              <div class="tender"><h3>Stress testing advisory</h3></div>
              <div class="tender"><p>No title here</p></div>
              <div class="tender"><h3>Pension risk review</h3></div>
            </body></html>"#;
        let records = extract_listings(html, &site(), &strategy_for(SiteKind::Generic), now());
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Stress testing advisory", "Pension risk review"]);
    }

    #[test]
    fn test_link_listing_uses_own_href() {
        let html = r#"<html><body>
            <a href="/procurement/notice/77"><h3>Actuarial review of social security fund</h3></a>
        </body></html>"#;
        let mut wb = site();
        wb.url = "https://projects.worldbank.org/en/projects-operations/procurement".to_string();
        let records = extract_listings(html, &wb, &strategy_for(SiteKind::WorldBank), now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://projects.worldbank.org/procurement/notice/77");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("日本語テキスト", 2), "日本");
    }
}
