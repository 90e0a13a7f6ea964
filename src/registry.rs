//! Site registry.
//!
//! Holds the catalog of monitored sites and owns their `last_checked` state.
//! Check times are committed to SQLite before the in-memory descriptor is
//! touched, so a crash never leaves the two disagreeing in the unsafe direction.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use url::Url;

use crate::error::RegistryError;
use crate::types::{SiteDescriptor, SiteKind};

#[derive(Debug, Deserialize, Serialize)]
pub struct SitesFile {
    pub sites: Vec<SiteDescriptor>,
}

pub fn load_sites(path: &Path) -> Result<Vec<SiteDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sites from {:?}", path))?;
    parse_sites(&content).with_context(|| format!("Failed to parse sites YAML {:?}", path))
}

pub fn parse_sites(yaml: &str) -> Result<Vec<SiteDescriptor>> {
    let file: SitesFile = serde_yaml::from_str(yaml)?;
    Ok(file.sites)
}

/// Problems found in a site catalog before any scan runs.
#[derive(Debug, Default)]
pub struct CatalogIssues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

const KNOWN_KINDS: &[&str] = &["ungm", "world_bank", "ted", "generic"];

/// Check a site catalog for configuration mistakes.
///
/// Kinds are read from the raw YAML since unknown kinds parse as generic.
pub fn validate_catalog(yaml: &str) -> Result<CatalogIssues> {
    let sites = parse_sites(yaml)?;
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let raw_kinds: Vec<Option<String>> = raw
        .get("sites")
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .map(|site| site.get("kind").and_then(|k| k.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut issues = CatalogIssues::default();
    let mut seen = HashSet::new();

    for (i, site) in sites.iter().enumerate() {
        if site.name.trim().is_empty() {
            issues.errors.push(format!("Site #{} has an empty name", i + 1));
        } else if !seen.insert(site.name.as_str()) {
            issues.errors.push(format!("Duplicate site name: '{}'", site.name));
        }

        match Url::parse(&site.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => issues.errors.push(format!(
                "Site '{}' has unsupported URL scheme '{}': {}",
                site.name,
                url.scheme(),
                site.url
            )),
            Err(e) => issues
                .errors
                .push(format!("Site '{}' has an unparseable URL '{}': {}", site.name, site.url, e)),
        }

        if let Some(Some(kind)) = raw_kinds.get(i) {
            if !KNOWN_KINDS.contains(&kind.as_str()) {
                issues.warnings.push(format!(
                    "Site '{}' has unknown kind '{}' (will use generic)",
                    site.name, kind
                ));
            }
        }

        if site.check_frequency == 0 {
            issues.warnings.push(format!(
                "Site '{}' has check_frequency 0 (always due)",
                site.name
            ));
        }

        if site.requires_login {
            issues.warnings.push(format!(
                "Site '{}' requires login, which scans do not handle",
                site.name
            ));
        }
    }

    Ok(issues)
}

/// The default catalog of procurement portals.
pub fn builtin_sites() -> Vec<SiteDescriptor> {
    vec![
        // International organizations
        SiteDescriptor::new(
            "UN Global Marketplace",
            "https://www.ungm.org/Public/Notice",
            SiteKind::Ungm,
            "International",
            "international",
        )
        .with_param("category", "financial_services"),
        SiteDescriptor::new(
            "World Bank eProcurement",
            "https://projects.worldbank.org/en/projects-operations/procurement",
            SiteKind::WorldBank,
            "International",
            "development",
        )
        .with_param("sector", "financial"),
        SiteDescriptor::new("TED Europa", "https://ted.europa.eu/udl", SiteKind::Ted, "EU", "government")
            .with_param("cpv", "financial_services"),
        // Regional
        SiteDescriptor::new("Africa Gateway", "https://www.africagateway.org/", SiteKind::Generic, "Africa", "regional"),
        SiteDescriptor::new("PPIP Kenya", "https://www.ppip.go.ke/", SiteKind::Generic, "Kenya", "government"),
        // National portals
        SiteDescriptor::new(
            "UK Contracts Finder",
            "https://www.contractsfinder.service.gov.uk/",
            SiteKind::Generic,
            "UK",
            "government",
        )
        .with_param("category", "professional_services"),
        SiteDescriptor::new("Merx Canada", "https://www.merx.com/", SiteKind::Generic, "Canada", "mixed")
            .with_param("category", "consulting"),
    ]
}

/// SQLite table of per-site check times.
pub struct CheckStateStore {
    conn: Connection,
}

impl CheckStateStore {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            // Surfaces as an open error below if this fails
            let _ = fs::create_dir_all(parent);
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, RegistryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RegistryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS site_checks (
                name TEXT PRIMARY KEY,
                last_checked TEXT NOT NULL,
                check_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn load_all(&self) -> Result<HashMap<String, DateTime<Utc>>, RegistryError> {
        let mut stmt = self.conn.prepare("SELECT name, last_checked FROM site_checks")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut checks = HashMap::new();
        for row in rows {
            let (name, value) = row?;
            let at = DateTime::parse_from_rfc3339(&value)
                .map_err(|_| RegistryError::BadTimestamp { site: name.clone(), value: value.clone() })?
                .with_timezone(&Utc);
            checks.insert(name, at);
        }
        Ok(checks)
    }

    pub fn check_count(&self, name: &str) -> Result<u32, RegistryError> {
        let count = self
            .conn
            .query_row(
                "SELECT check_count FROM site_checks WHERE name = ?1",
                params![name],
                |row| row.get::<_, u32>(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(0),
                other => Err(other),
            })?;
        Ok(count)
    }

    fn record(&mut self, name: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO site_checks (name, last_checked, check_count) VALUES (?1, ?2, 1)
             ON CONFLICT(name) DO UPDATE SET
                last_checked = excluded.last_checked,
                check_count = check_count + 1",
            params![name, at.to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

pub struct SiteRegistry {
    sites: Vec<SiteDescriptor>,
    state: Option<CheckStateStore>,
}

impl SiteRegistry {
    /// Registry without durable check state. Site names must be unique.
    pub fn new(sites: Vec<SiteDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for site in &sites {
            if !seen.insert(site.name.as_str()) {
                return Err(RegistryError::DuplicateSite(site.name.clone()));
            }
        }
        Ok(Self { sites, state: None })
    }

    pub fn builtin() -> Self {
        Self { sites: builtin_sites(), state: None }
    }

    /// Attach durable check state and hydrate `last_checked` from it.
    pub fn with_state_store(mut self, state: CheckStateStore) -> Result<Self, RegistryError> {
        let checks = state.load_all()?;
        for site in &mut self.sites {
            if let Some(at) = checks.get(&site.name) {
                site.last_checked = Some(*at);
            }
        }
        self.state = Some(state);
        Ok(self)
    }

    pub fn sites(&self) -> &[SiteDescriptor] {
        &self.sites
    }

    pub fn get(&self, name: &str) -> Option<&SiteDescriptor> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// Snapshot of the active sites in catalog order.
    pub fn active_sites(&self) -> Vec<SiteDescriptor> {
        self.sites.iter().filter(|s| s.active).cloned().collect()
    }

    pub fn state(&self) -> Option<&CheckStateStore> {
        self.state.as_ref()
    }

    /// Record a completed scan of `name` at `at`.
    pub fn record_check(&mut self, name: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let idx = self
            .sites
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| RegistryError::UnknownSite(name.to_string()))?;

        if let Some(state) = self.state.as_mut() {
            state.record(name, at)?;
        }
        self.sites[idx].last_checked = Some(at);
        Ok(())
    }
}
