#![forbid(unsafe_code)]

//! Remote JavaScript change detection: resolve targets, keep the last seen version,
//! diff new content against it and report what changed.

pub mod changelog;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod hashing;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod store;
pub mod validation;

mod util;

pub use changelog::ChangeLog;
pub use diff::{DiffLine, DiffResult, Differ, Hunk, LineTag, WindowLine, DEFAULT_CONTEXT};
pub use error::{ConfigError, FetchError, NotifyError, ResolveError, Stage, StoreError};
pub use fetch::{Fetcher, HttpFetcher, MemoryFetcher};
pub use hashing::{content_slot, fingerprint};
pub use model::{
    ChainSpec, ChainStep, EntryStatus, PageDiscovery, ReportEntry, ResolveMode, ResolvedAsset,
    TargetDescriptor, TargetMode, TargetSpec, VersionRecord,
};
pub use notify::Notifier;
pub use orchestrator::Orchestrator;
pub use report::{ReportFormat, Reporter};
pub use resolver::Resolver;
pub use store::{FsVersionStore, MemoryVersionStore, VersionStore};
pub use util::{file_safe, now};
pub use validation::{build_descriptor, build_descriptors};
