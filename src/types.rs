use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Days before the closing date at which an open tender becomes "closing soon".
pub const CLOSING_SOON_DAYS: i64 = 7;

/// Stable identity of a monitored site, used to pick its listing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    Ungm,
    WorldBank,
    Ted,
    #[default]
    #[serde(other)]
    Generic,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SiteKind::Ungm => "ungm",
            SiteKind::WorldBank => "world_bank",
            SiteKind::Ted => "ted",
            SiteKind::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: SiteKind,
    pub country: String,
    pub sector: String,
    #[serde(default)]
    pub search_params: BTreeMap<String, String>,
    #[serde(default)]
    pub requires_login: bool,
    /// Hours between checks
    #[serde(default = "default_check_frequency")]
    pub check_frequency: u32,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_check_frequency() -> u32 {
    24
}

fn default_active() -> bool {
    true
}

impl SiteDescriptor {
    pub fn new(name: &str, url: &str, kind: SiteKind, country: &str, sector: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind,
            country: country.to_string(),
            sector: sector.to_string(),
            search_params: BTreeMap::new(),
            requires_login: false,
            check_frequency: default_check_frequency(),
            last_checked: None,
            active: true,
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.search_params.insert(key.to_string(), value.to_string());
        self
    }

    /// Whether `check_frequency` hours have elapsed since the last check.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => now - last >= chrono::Duration::hours(i64::from(self.check_frequency)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Open,
    ClosingSoon,
    Closed,
    Awarded,
}

impl TenderStatus {
    /// Lifecycle state implied by the closing date. `Awarded` is never derived.
    pub fn derive(closing_date: Option<NaiveDate>, now: DateTime<Utc>) -> Self {
        let Some(closing) = closing_date else {
            return TenderStatus::Open;
        };
        let today = now.date_naive();
        if closing < today {
            TenderStatus::Closed
        } else if (closing - today).num_days() <= CLOSING_SOON_DAYS {
            TenderStatus::ClosingSoon
        } else {
            TenderStatus::Open
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TenderStatus::Closed | TenderStatus::Awarded)
    }
}

impl fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TenderStatus::Open => "open",
            TenderStatus::ClosingSoon => "closing_soon",
            TenderStatus::Closed => "closed",
            TenderStatus::Awarded => "awarded",
        };
        write!(f, "{}", s)
    }
}

/// Relevance tier. Variant order gives `Minimal < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityScore {
    Minimal,
    Low,
    Medium,
    High,
}

impl OpportunityScore {
    pub fn from_total(total: u32) -> Self {
        if total >= 80 {
            OpportunityScore::High
        } else if total >= 50 {
            OpportunityScore::Medium
        } else if total >= 20 {
            OpportunityScore::Low
        } else {
            OpportunityScore::Minimal
        }
    }

    pub fn is_qualifying(self) -> bool {
        self >= OpportunityScore::Medium
    }
}

impl fmt::Display for OpportunityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpportunityScore::Minimal => "minimal",
            OpportunityScore::Low => "low",
            OpportunityScore::Medium => "medium",
            OpportunityScore::High => "high",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum ServiceArea {
    #[serde(rename = "ifrs17")]
    Ifrs17,
    #[serde(rename = "pension_consulting")]
    PensionConsulting,
    #[serde(rename = "enterprise_risk_management")]
    EnterpriseRiskManagement,
    #[serde(rename = "esg_consulting")]
    EsgConsulting,
    #[serde(rename = "regulatory_compliance")]
    RegulatoryCompliance,
    #[serde(rename = "actuarial_services")]
    ActuarialServices,
    #[serde(rename = "investment_consulting")]
    InvestmentConsulting,
    #[serde(rename = "governance_risk")]
    GovernanceRisk,
}

impl ServiceArea {
    pub const ALL: [ServiceArea; 8] = [
        ServiceArea::Ifrs17,
        ServiceArea::PensionConsulting,
        ServiceArea::EnterpriseRiskManagement,
        ServiceArea::EsgConsulting,
        ServiceArea::RegulatoryCompliance,
        ServiceArea::ActuarialServices,
        ServiceArea::InvestmentConsulting,
        ServiceArea::GovernanceRisk,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ServiceArea::Ifrs17 => "IFRS17",
            ServiceArea::PensionConsulting => "Pension Consulting",
            ServiceArea::EnterpriseRiskManagement => "Enterprise Risk Management",
            ServiceArea::EsgConsulting => "ESG Consulting",
            ServiceArea::RegulatoryCompliance => "Regulatory Compliance",
            ServiceArea::ActuarialServices => "Actuarial Services",
            ServiceArea::InvestmentConsulting => "Investment Consulting",
            ServiceArea::GovernanceRisk => "Governance & Risk",
        }
    }
}

impl fmt::Display for ServiceArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Joins area labels for prompts and report lines.
pub fn join_areas<'a>(areas: impl IntoIterator<Item = &'a ServiceArea>) -> String {
    areas
        .into_iter()
        .map(|a| a.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Three-level qualitative rating used for competition and win probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Likelihood {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OpportunityRecord {
    pub title: String,
    pub description: String,
    pub tender_id: String,
    pub source_site: String,
    pub url: String,
    pub client_organization: String,
    pub publication_date: DateTime<Utc>,
    pub closing_date: Option<NaiveDate>,
    pub estimated_value: Option<String>,
    pub location: String,
    pub status: TenderStatus,
    pub service_areas_matched: BTreeSet<ServiceArea>,
    pub keywords_matched: Vec<String>,
    pub opportunity_score: OpportunityScore,
    pub ai_analysis: String,
    pub recommended_team: Vec<String>,
    pub competition_level: Likelihood,
    pub win_probability: Likelihood,
    pub submission_requirements: Vec<String>,
    pub contact_information: BTreeMap<String, String>,
    pub documents_available: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl OpportunityRecord {
    /// Text the relevance and context scorers look at.
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Status as of `now`; terminal states are kept as stored.
    pub fn status_at(&self, now: DateTime<Utc>) -> TenderStatus {
        if self.status.is_terminal() {
            self.status
        } else {
            TenderStatus::derive(self.closing_date, now)
        }
    }

    /// Calendar day that keys the record in the store.
    pub fn creation_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
