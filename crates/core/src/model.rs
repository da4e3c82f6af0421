use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diff::DiffResult;

/// How a target is located.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// The entry URL is the asset.
    Static,
    /// The entry URL is an HTML page that references the asset.
    SinglePage,
    /// Like `SinglePage`, then one more hop built from a value captured in the first asset.
    MultiStep,
}

impl TargetMode {
    /// Config spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetMode::Static => "static",
            TargetMode::SinglePage => "single_page",
            TargetMode::MultiStep => "multi_step",
        }
    }
}

/// Raw, unvalidated target entry as written in configuration.
///
/// Turned into a [`TargetDescriptor`] by [`crate::validation::build_descriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub title: String,
    pub mode: TargetMode,
    pub url: String,
    #[serde(default)]
    pub discovery_pattern: Option<String>,
    #[serde(default)]
    pub url_prefix: Option<String>,
    #[serde(default)]
    pub verify_pattern: Option<String>,
    #[serde(default)]
    pub chain: Option<ChainSpec>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Raw chain step of a multi-step target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /// URL with a single `{}` placeholder for the captured value.
    pub template: String,
    pub verify_pattern: String,
}

/// Validated configuration for one watched asset.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    /// Unique key; used for storage slots and report attribution.
    pub id: String,
    pub entry_url: String,
    /// Applied to every request made for this target.
    pub headers: BTreeMap<String, String>,
    pub mode: ResolveMode,
}

/// Mode-specific resolution parameters.
#[derive(Debug, Clone)]
pub enum ResolveMode {
    Static,
    SinglePage(PageDiscovery),
    MultiStep {
        page: PageDiscovery,
        chain: ChainStep,
    },
}

impl ResolveMode {
    pub fn kind(&self) -> TargetMode {
        match self {
            ResolveMode::Static => TargetMode::Static,
            ResolveMode::SinglePage(_) => TargetMode::SinglePage,
            ResolveMode::MultiStep { .. } => TargetMode::MultiStep,
        }
    }
}

/// Discovery of candidate assets on an HTML page.
#[derive(Debug, Clone)]
pub struct PageDiscovery {
    /// Extracts candidate paths; capture group 1 wins over the whole match.
    pub discovery: Regex,
    pub url_prefix: Option<String>,
    /// A candidate is accepted when its content matches this.
    pub verify: Regex,
}

impl PageDiscovery {
    /// Candidate paths in page order.
    pub fn candidates<'a>(&self, page: &'a str) -> Vec<&'a str> {
        self.discovery
            .captures_iter(page)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str())
            .collect()
    }
}

/// Second hop of a multi-step target.
#[derive(Debug, Clone)]
pub struct ChainStep {
    pub template: String,
    pub verify: Regex,
}

impl ChainStep {
    /// Substitutes the captured value into the template.
    pub fn url_for(&self, captured: &str) -> String {
        self.template.replacen("{}", captured, 1)
    }
}

/// Content located for a target, along with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub source_url: String,
    pub content: String,
}

/// Persisted knowledge about the last seen content of a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub target_id: String,
    /// Hex SHA-256 of the stored content.
    pub fingerprint: String,
    /// Blob file name under the storage directory; derived from the target id.
    pub content_ref: String,
    #[serde(default)]
    pub source_url: String,
    pub first_seen: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Outcome of checking one target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Initial,
    Changed,
    Unchanged,
}

impl EntryStatus {
    /// Human label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Initial => "Initial Download",
            EntryStatus::Changed => "Changed",
            EntryStatus::Unchanged => "Unchanged",
        }
    }

    /// Suffix of the HTML badge class.
    pub fn css_class(&self) -> &'static str {
        match self {
            EntryStatus::Initial => "initial",
            EntryStatus::Changed => "changed",
            EntryStatus::Unchanged => "unchanged",
        }
    }
}

/// One line of the change report.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub timestamp: DateTime<Utc>,
    pub target_id: String,
    pub source_url: String,
    pub status: EntryStatus,
    pub diff: Option<DiffResult>,
}
