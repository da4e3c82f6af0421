use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use jswatch_core::{ReportFormat, TargetMode, TargetSpec, DEFAULT_CONTEXT};

use crate::telegram::TelegramConfig;

/// Contents of `jswatch.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_interval_minutes")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also append plain-text logs here.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub report_format: ReportFormat,
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
    /// Keep per-target append-only change logs under `<storage_dir>/changes`.
    #[serde(default = "default_true")]
    pub changelog: bool,
    /// Reflow JavaScript before diffing.
    #[serde(default = "default_true")]
    pub normalize: bool,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetSpec>,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("js")
}

fn default_interval_minutes() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_report_file() -> PathBuf {
    PathBuf::from("output.md")
}

fn default_true() -> bool {
    true
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            check_interval_minutes: default_interval_minutes(),
            log_level: default_log_level(),
            log_file: None,
            report_format: ReportFormat::default(),
            report_file: default_report_file(),
            changelog: true,
            normalize: true,
            context_lines: DEFAULT_CONTEXT,
            request_timeout_seconds: default_timeout_seconds(),
            user_agent: None,
            telegram: None,
            targets: Vec::new(),
        }
    }
}

impl Config {
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse jswatch config")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("in {}", path.display()))
    }

    /// Scalar settings sanity; targets are validated separately.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_minutes == 0 {
            bail!("check_interval_minutes must be at least 1");
        }
        if self.request_timeout_seconds == 0 {
            bail!("request_timeout_seconds must be at least 1");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn changelog_dir(&self) -> PathBuf {
        self.storage_dir.join("changes")
    }
}

/// Target entry in the legacy JSON monitor layout.
#[derive(Debug, Deserialize)]
struct LegacyTarget {
    title: String,
    is_static: bool,
    url: String,
    #[serde(default)]
    regex_js: Option<String>,
    #[serde(default)]
    url_to_append: Option<String>,
    #[serde(default)]
    regex_attribute: Option<String>,
    #[serde(default)]
    custom_header: Option<BTreeMap<String, String>>,
}

impl From<LegacyTarget> for TargetSpec {
    fn from(t: LegacyTarget) -> Self {
        TargetSpec {
            title: t.title,
            mode: if t.is_static {
                TargetMode::Static
            } else {
                TargetMode::SinglePage
            },
            url: t.url,
            discovery_pattern: t.regex_js,
            url_prefix: t.url_to_append,
            verify_pattern: t.regex_attribute,
            chain: None,
            headers: t.custom_header.unwrap_or_default(),
        }
    }
}

/// Loads extra targets: legacy JSON for `*.json`, otherwise one URL per line.
pub fn load_targets_file(path: &Path) -> Result<Vec<TargetSpec>> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        parse_legacy_json(&s).with_context(|| format!("parse {}", path.display()))
    } else {
        Ok(parse_url_list(&s))
    }
}

pub fn parse_legacy_json(s: &str) -> Result<Vec<TargetSpec>> {
    let list: Vec<LegacyTarget> = serde_json::from_str(s)?;
    Ok(list.into_iter().map(TargetSpec::from).collect())
}

/// Each non-blank line becomes a static target keyed by its URL.
pub fn parse_url_list(s: &str) -> Vec<TargetSpec> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|url| TargetSpec {
            title: url.to_string(),
            mode: TargetMode::Static,
            url: url.to_string(),
            discovery_pattern: None,
            url_prefix: None,
            verify_pattern: None,
            chain: None,
            headers: BTreeMap::new(),
        })
        .collect()
}
