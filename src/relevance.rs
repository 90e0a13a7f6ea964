//! Keyword taxonomy matching.
//!
//! Assigns matched keywords and service areas to a piece of tender text.
//! Matching is a case-insensitive substring test by default, which lets short
//! acronyms such as "ALM" or "ERM" fire inside unrelated words. The optional
//! word-boundary mode anchors each keyword with `\b` and leaves scoring unchanged.

use crate::types::ServiceArea;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

// ============================================
// Service Area Taxonomy
// ============================================

pub const TAXONOMY: &[(ServiceArea, &[&str])] = &[
    (
        ServiceArea::Ifrs17,
        &[
            "IFRS 17", "ifrs17", "insurance contracts", "financial reporting",
            "contract boundaries", "CSM", "risk adjustment", "onerous contracts",
            "premium allocation approach", "general measurement model",
        ],
    ),
    (
        ServiceArea::PensionConsulting,
        &[
            "pension", "retirement", "actuarial valuation", "pension scheme",
            "pension fund", "retirement solutions", "defined benefit", "defined contribution",
            "pension regulations", "pension audit", "pension risk", "retirement planning",
        ],
    ),
    (
        ServiceArea::EnterpriseRiskManagement,
        &[
            "enterprise risk management", "ERM", "risk framework", "risk appetite",
            "risk modelling", "risk assessment", "risk quantification", "stress testing",
            "scenario analysis", "risk governance", "risk based capital", "solvency",
        ],
    ),
    (
        ServiceArea::EsgConsulting,
        &[
            "ESG", "sustainability", "climate risk", "environmental risk",
            "social responsibility", "governance", "sustainable finance",
            "climate change", "carbon footprint", "green finance",
        ],
    ),
    (
        ServiceArea::RegulatoryCompliance,
        &[
            "regulatory compliance", "regulatory affairs", "compliance audit",
            "statutory reporting", "regulatory policy", "financial regulation",
            "prudential regulation", "capital requirements", "regulatory framework",
        ],
    ),
    (
        ServiceArea::ActuarialServices,
        &[
            "actuarial", "actuarial services", "actuarial analysis", "actuarial valuation",
            "actuarial consulting", "actuarial audit", "reserving", "pricing",
            "product development", "embedded value", "financial condition",
        ],
    ),
    (
        ServiceArea::InvestmentConsulting,
        &[
            "investment consulting", "asset liability matching", "investment policy",
            "portfolio management", "investment strategy", "asset allocation",
            "investment risk", "market risk", "ALM", "asset liability",
        ],
    ),
    (
        ServiceArea::GovernanceRisk,
        &[
            "governance", "corporate governance", "risk governance", "board advisory",
            "risk committee", "audit committee", "governance framework",
            "risk culture", "governance training", "risk oversight",
        ],
    ),
];

/// Broad monitor phrases a listing must mention before it is worth scoring.
const PRIMARY_MONITOR_KEYWORDS: &[&str] = &[
    "IFRS 17", "actuarial services", "risk management", "pension consulting",
    "asset liability matching", "enterprise risk management", "Insurance Advisory", "ESG Consulting",
];

const EXTENDED_MONITOR_KEYWORDS: &[&str] = &[
    "Financial and Regulatory Affairs", "Regulatory Policy and Strategy",
    "Regulatory Compliance", "Liaison with Regulators", "Mergers, Demergers and Acquisitions",
    "Entry into New Markets", "Corporate Governance and Training", "Market Surveys",
    "Enterprise Risk Management", "Enterprise Risk Management Framework Gap Analysis",
    "Quantification of Risk including Risk Modelling", "Risk Appetite",
    "Risk based Capital Management", "Actuarial Services", "Financial Condition Reports",
    "Product Development", "Embedded value calculation", "Capital Management Report",
    "Investment Policy Statement", "Pension Consulting", "Financial Reporting",
    "Insurance Regulation", "Actuarial Analysis", "Stress Testing",
    "Sustainability Consulting", "Governance, Risk & Compliance", "Data Protection and Privacy",
    "Pension Scheme Design", "Actuarial Valuation", "Claims Management",
    "Reinsurance Consulting", "Underwriting Solutions", "Insurance Product Design",
    "Reserving Methodology", "Risk Assessment Tools", "Healthcare Actuarial Consulting",
    "Investment Consulting", "Pension Fund Management", "Retirement Solutions",
    "Actuarial Audit", "Compliance Audit", "Statutory Reporting",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Substring,
    WordBoundary,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelevanceMatch {
    pub keywords: Vec<String>,
    pub service_areas: BTreeSet<ServiceArea>,
}

enum Matcher {
    Substring(String),
    Pattern(Regex),
}

impl Matcher {
    fn build(keyword: &str, mode: MatchMode) -> Self {
        if mode == MatchMode::WordBoundary {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
            if let Ok(re) = Regex::new(&pattern) {
                return Matcher::Pattern(re);
            }
        }
        Matcher::Substring(keyword.to_lowercase())
    }

    fn is_match(&self, text: &str, text_lower: &str) -> bool {
        match self {
            Matcher::Substring(needle) => text_lower.contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

/// Deterministic taxonomy matcher.
pub struct RelevanceScorer {
    matchers: Vec<(&'static str, Matcher)>,
}

impl RelevanceScorer {
    pub fn new(mode: MatchMode) -> Self {
        let mut seen = HashSet::new();
        let matchers = TAXONOMY
            .iter()
            .flat_map(|(_, keywords)| keywords.iter().copied())
            .filter(|k| seen.insert(k.to_lowercase()))
            .map(|k| (k, Matcher::build(k, mode)))
            .collect();
        Self { matchers }
    }

    /// Matched keywords in taxonomy order, each reported once.
    pub fn find_keywords(&self, text: &str) -> Vec<String> {
        let text_lower = text.to_lowercase();
        self.matchers
            .iter()
            .filter(|(_, m)| m.is_match(text, &text_lower))
            .map(|(k, _)| k.to_string())
            .collect()
    }

    pub fn score(&self, text: &str) -> RelevanceMatch {
        let keywords = self.find_keywords(text);
        let service_areas = identify_service_areas(&keywords);
        RelevanceMatch { keywords, service_areas }
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(MatchMode::default())
    }
}

/// Areas owning at least one of the matched keywords.
pub fn identify_service_areas(keywords: &[String]) -> BTreeSet<ServiceArea> {
    let mut areas = BTreeSet::new();
    for (area, area_keywords) in TAXONOMY {
        // First hit is enough for the area
        if keywords
            .iter()
            .any(|k| area_keywords.iter().any(|ak| ak.eq_ignore_ascii_case(k)))
        {
            areas.insert(*area);
        }
    }
    areas
}

/// Cheap gate applied before a listing is scored.
#[derive(Debug, Clone)]
pub struct Prefilter {
    keywords: Vec<String>,
}

impl Prefilter {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }

    /// The primary and extended monitor phrase lists.
    pub fn monitor_default() -> Self {
        Self::new(
            PRIMARY_MONITOR_KEYWORDS
                .iter()
                .chain(EXTENDED_MONITOR_KEYWORDS.iter())
                .copied(),
        )
    }

    pub fn passes(&self, text: &str) -> bool {
        let text_lower = text.to_lowercase();
        self.keywords.iter().any(|k| text_lower.contains(k.as_str()))
    }
}
