use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Point of the resolution walk at which something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The entry URL (the asset itself for static targets, the HTML page otherwise).
    Entry,
    /// A discovered candidate asset.
    Candidate,
    /// The chained second-step URL of a multi-step target.
    Chain,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Entry => "entry",
            Stage::Candidate => "candidate",
            Stage::Chain => "chain",
        })
    }
}

/// A single HTTP fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid header {name} for {url}")]
    InvalidHeader { url: String, name: String },
}

/// No content satisfying a descriptor could be located.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{stage} fetch failed: {source}")]
    Network {
        stage: Stage,
        #[source]
        source: FetchError,
    },
    #[error("discovery pattern matched nothing on {url}")]
    NoCandidates { url: String },
    #[error("none of {tried} candidates from {url} matched the verify pattern")]
    NoVerifiedCandidate { url: String, tried: usize },
    #[error("verify pattern has no capture group 1 match in {url}")]
    MissingCapture { url: String },
    #[error("chained asset {url} did not match its verify pattern")]
    ChainRejected { url: String },
}

impl ResolveError {
    /// Stage the failure belongs to, for log attribution.
    pub fn stage(&self) -> Stage {
        match self {
            ResolveError::Network { stage, .. } => *stage,
            ResolveError::NoCandidates { .. } => Stage::Entry,
            ResolveError::NoVerifiedCandidate { .. } | ResolveError::MissingCapture { .. } => {
                Stage::Candidate
            }
            ResolveError::ChainRejected { .. } => Stage::Chain,
        }
    }
}

/// Version store read or write failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("version index encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Target configuration is malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target #{index} has an empty title")]
    EmptyId { index: usize },
    #[error("duplicate target id: {0}")]
    DuplicateId(String),
    #[error("target {target}: missing field `{field}` required for mode {mode}")]
    MissingField {
        target: String,
        field: &'static str,
        mode: &'static str,
    },
    #[error("target {target}: field `{field}` is only valid for mode multi_step")]
    UnexpectedChain { target: String, field: &'static str },
    #[error("target {target}: invalid pattern in `{field}`: {source}")]
    InvalidPattern {
        target: String,
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("target {target}: chain template must contain exactly one `{{}}` placeholder")]
    InvalidTemplate { target: String },
    #[error("target {target}: verify pattern for mode multi_step needs a capture group")]
    MissingCaptureGroup { target: String },
    #[error("target {target}: invalid url {url}")]
    InvalidUrl { target: String, url: String },
}

/// Notification delivery failed.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("cannot read report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("delivery failed: {0}")]
    Delivery(String),
}
