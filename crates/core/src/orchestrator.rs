//! Poll loop: resolve each target in order, compare against the store, report.
//!
//! Targets are processed strictly one after another. Cancellation is cooperative: it is
//! checked before every target and before sleeping, and both the in-flight resolution and
//! the inter-cycle sleep race against it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::changelog::ChangeLog;
use crate::diff::Differ;
use crate::fetch::Fetcher;
use crate::hashing::fingerprint;
use crate::model::{EntryStatus, ReportEntry, ResolvedAsset, TargetDescriptor};
use crate::notify::Notifier;
use crate::report::Reporter;
use crate::resolver::Resolver;
use crate::store::VersionStore;
use crate::util::now;

pub struct Orchestrator<F, S> {
    resolver: Resolver<F>,
    store: S,
    differ: Differ,
    reporter: Reporter,
    report_file: Option<PathBuf>,
    changelog: Option<ChangeLog>,
    notifier: Option<Box<dyn Notifier>>,
    interval: Duration,
    processed: HashSet<String>,
}

impl<F: Fetcher, S: VersionStore> Orchestrator<F, S> {
    pub fn new(resolver: Resolver<F>, store: S, differ: Differ, reporter: Reporter) -> Self {
        Self {
            resolver,
            store,
            differ,
            reporter,
            report_file: None,
            changelog: None,
            notifier: None,
            interval: Duration::from_secs(60),
            processed: HashSet::new(),
        }
    }

    /// File rewritten with the rendered report after each cycle that recorded something.
    pub fn with_report_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_file = Some(path.into());
        self
    }

    pub fn with_changelog(mut self, changelog: ChangeLog) -> Self {
        self.changelog = Some(changelog);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Ids of targets resolved at least once during this process.
    pub fn processed(&self) -> &HashSet<String> {
        &self.processed
    }

    /// Runs cycles until `cancel` fires.
    pub async fn run(&mut self, targets: &[TargetDescriptor], cancel: CancellationToken) {
        info!(
            targets = targets.len(),
            interval_secs = self.interval.as_secs(),
            "starting watch loop"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.run_once(targets, &cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            info!(minutes = self.interval.as_secs() / 60, "waiting until next check");
            let stopped = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.interval) => false,
            };
            if stopped {
                break;
            }
        }
        info!(processed = self.processed.len(), "watch loop stopped");
    }

    /// One cycle followed by report publication.
    pub async fn run_once(&mut self, targets: &[TargetDescriptor], cancel: &CancellationToken) -> Vec<ReportEntry> {
        let entries = self.run_cycle(targets, cancel).await;
        if !entries.is_empty() {
            self.publish(&entries).await;
        }
        entries
    }

    /// Checks every target once, in order. Failures are logged and skipped.
    pub async fn run_cycle(&mut self, targets: &[TargetDescriptor], cancel: &CancellationToken) -> Vec<ReportEntry> {
        let mut entries = Vec::new();
        for target in targets {
            if cancel.is_cancelled() {
                info!("shutdown requested; ending cycle early");
                break;
            }
            info!(target = %target.id, url = %target.entry_url, mode = target.mode.kind().as_str(), "checking");

            let resolved = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.resolver.resolve(target) => Some(r),
            };
            let Some(resolved) = resolved else {
                info!(target = %target.id, "shutdown requested during fetch");
                break;
            };

            let asset = match resolved {
                Ok(asset) => asset,
                Err(e) => {
                    warn!(
                        target = %target.id,
                        url = %target.entry_url,
                        stage = %e.stage(),
                        error = %e,
                        "resolution failed; skipping target"
                    );
                    continue;
                }
            };

            self.processed.insert(target.id.clone());
            if let Some(entry) = self.check(target, asset) {
                self.reporter.record(entry.clone());
                entries.push(entry);
            }
        }
        entries
    }

    fn check(&mut self, target: &TargetDescriptor, asset: ResolvedAsset) -> Option<ReportEntry> {
        let previous = match self.store.get(&target.id) {
            None => None,
            Some(record) if record.fingerprint == fingerprint(&asset.content) => {
                debug!(target = %target.id, "no changes");
                return None;
            }
            Some(record) => match self.store.read_content(&record) {
                Ok(Some(content)) => Some(content),
                Ok(None) => {
                    warn!(target = %target.id, slot = %record.content_ref, "stored content missing; re-initialising");
                    None
                }
                Err(e) => {
                    error!(target = %target.id, error = %e, "stored content unreadable; re-initialising");
                    None
                }
            },
        };

        let timestamp = now();
        let Some(old) = previous else {
            info!(target = %target.id, url = %asset.source_url, "initial download");
            self.persist(target, &asset);
            return Some(ReportEntry {
                timestamp,
                target_id: target.id.clone(),
                source_url: asset.source_url,
                status: EntryStatus::Initial,
                diff: None,
            });
        };

        let Some(diff) = self.differ.compare(&target.id, &old, &asset.content) else {
            info!(target = %target.id, "formatting-only change; version updated");
            self.persist(target, &asset);
            return None;
        };

        info!(
            target = %target.id,
            url = %asset.source_url,
            added = diff.added(),
            removed = diff.removed(),
            "changes detected"
        );
        if let Some(log) = &self.changelog {
            if let Err(e) = log.append(&asset.source_url, timestamp, &diff) {
                warn!(target = %target.id, error = %e, "change log append failed");
            }
        }
        self.persist(target, &asset);
        Some(ReportEntry {
            timestamp,
            target_id: target.id.clone(),
            source_url: asset.source_url,
            status: EntryStatus::Changed,
            diff: Some(diff),
        })
    }

    fn persist(&mut self, target: &TargetDescriptor, asset: &ResolvedAsset) {
        if let Err(e) = self.store.put(&target.id, &asset.source_url, &asset.content) {
            error!(target = %target.id, error = %e, "failed to persist version; history for this target is stale");
        }
    }

    async fn publish(&self, entries: &[ReportEntry]) {
        let Some(path) = &self.report_file else {
            return;
        };
        if let Err(e) = self.reporter.write(path, now()) {
            error!(path = %path.display(), error = %e, "report write failed");
            return;
        }
        info!(path = %path.display(), entries = self.reporter.entries().len(), "report written");

        let changes = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Changed)
            .count();
        if changes == 0 {
            return;
        }
        if let Some(notifier) = &self.notifier {
            let caption = format!("JSWatch: {changes} change(s) detected");
            match notifier.deliver(path, &caption).await {
                Ok(()) => info!(path = %path.display(), "report delivered"),
                Err(e) => warn!(error = %e, "report delivery failed"),
            }
        }
    }
}
