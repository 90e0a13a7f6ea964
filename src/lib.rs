//! Tender Scan Library
//!
//! Discovery, relevance scoring and storage of procurement notices
//! for actuarial and risk consulting services.

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod monitor;
pub mod registry;
pub mod relevance;
pub mod report;
pub mod scoring;
pub mod scrapers;
pub mod storage;
pub mod types;

pub use error::*;
pub use monitor::{Monitor, ScanOptions, ScanSummary};
pub use types::*;
