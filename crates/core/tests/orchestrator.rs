//! End-to-end cycles over in-memory fetchers and temp-dir stores.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jswatch_core::{
    build_descriptors, fingerprint, ChangeLog, Differ, EntryStatus, FsVersionStore, LineTag,
    MemoryFetcher, MemoryVersionStore, Notifier, NotifyError, Orchestrator, ReportFormat, Reporter,
    Resolver, StoreError, TargetDescriptor, TargetMode, TargetSpec, VersionRecord, VersionStore,
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const APP_URL: &str = "https://x.example.com/app.js";

fn static_spec(title: &str, url: &str) -> TargetSpec {
    TargetSpec {
        title: title.into(),
        mode: TargetMode::Static,
        url: url.into(),
        discovery_pattern: None,
        url_prefix: None,
        verify_pattern: None,
        chain: None,
        headers: BTreeMap::new(),
    }
}

fn targets(specs: &[TargetSpec]) -> Vec<TargetDescriptor> {
    build_descriptors(specs).unwrap()
}

fn orchestrator<S: VersionStore>(fetcher: Arc<MemoryFetcher>, store: S) -> Orchestrator<Arc<MemoryFetcher>, S> {
    Orchestrator::new(
        Resolver::new(fetcher),
        store,
        Differ::default(),
        Reporter::new(ReportFormat::Markdown),
    )
}

#[derive(Default, Clone)]
struct RecordingNotifier {
    captions: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, report: &Path, caption: &str) -> Result<(), NotifyError> {
        assert!(report.exists());
        self.captions.lock().unwrap().push(caption.to_string());
        if self.fail {
            Err(NotifyError::Delivery("boom".into()))
        } else {
            Ok(())
        }
    }
}

/// Memory store whose writes fail for one target id.
struct ReadOnlyFor {
    inner: MemoryVersionStore,
    broken: &'static str,
}

impl VersionStore for ReadOnlyFor {
    fn get(&self, target_id: &str) -> Option<VersionRecord> {
        self.inner.get(target_id)
    }

    fn read_content(&self, record: &VersionRecord) -> Result<Option<String>, StoreError> {
        self.inner.read_content(record)
    }

    fn put(&mut self, target_id: &str, source_url: &str, content: &str) -> Result<VersionRecord, StoreError> {
        if target_id == self.broken {
            return Err(StoreError::Io {
                path: PathBuf::from("/readonly/versions.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.put(target_id, source_url, content)
    }

    fn records(&self) -> Vec<VersionRecord> {
        self.inner.records()
    }
}

#[tokio::test]
async fn static_target_initial_then_changed() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var x=1;");
    let store = FsVersionStore::open(dir.path().join("js")).unwrap();
    let mut orch = orchestrator(fetcher.clone(), store);
    let targets = targets(&[static_spec("app", APP_URL)]);
    let cancel = CancellationToken::new();

    // First cycle: empty store.
    let entries = orch.run_cycle(&targets, &cancel).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, EntryStatus::Initial);
    assert!(entries[0].diff.is_none());
    assert_eq!(
        orch.store().get("app").unwrap().fingerprint,
        fingerprint("var x=1;")
    );

    // Second cycle: remote changed.
    fetcher.serve(APP_URL, "var x=2;");
    let entries = orch.run_cycle(&targets, &cancel).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, EntryStatus::Changed);
    let diff = entries[0].diff.as_ref().unwrap();
    let changed: Vec<_> = diff
        .changed_lines
        .iter()
        .map(|l| (l.tag, l.text.as_str()))
        .collect();
    assert_eq!(
        changed,
        vec![(LineTag::Removed, "var x=1;"), (LineTag::Added, "var x=2;")]
    );
    assert_eq!(
        orch.store().get("app").unwrap().fingerprint,
        fingerprint("var x=2;")
    );

    // Third cycle: nothing new, nothing reported, storage untouched.
    let before = orch.store().get("app").unwrap();
    assert!(orch.run_cycle(&targets, &cancel).await.is_empty());
    assert_eq!(orch.store().get("app").unwrap(), before);
    assert_eq!(orch.reporter().entries().len(), 2);
}

#[tokio::test]
async fn single_page_reports_only_verified_asset() {
    let page = "https://site.example.com/";
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher
        .serve(page, r#"<script src="a.js"></script><script src="b.js"></script>"#)
        .serve("https://cdn.example.com/a.js", "var a;")
        .serve("https://cdn.example.com/b.js", "var marker=1;");
    let spec = TargetSpec {
        title: "site".into(),
        mode: TargetMode::SinglePage,
        url: page.into(),
        discovery_pattern: Some(r#"src="([^"]+\.js)""#.into()),
        url_prefix: Some("https://cdn.example.com/".into()),
        verify_pattern: Some("marker".into()),
        chain: None,
        headers: BTreeMap::new(),
    };
    let mut orch = orchestrator(fetcher.clone(), MemoryVersionStore::new());
    let targets = targets(&[spec]);
    let cancel = CancellationToken::new();

    orch.run_cycle(&targets, &cancel).await;
    fetcher.serve("https://cdn.example.com/b.js", "var marker=2;");
    let entries = orch.run_cycle(&targets, &cancel).await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source_url, "https://cdn.example.com/b.js");
    let doc = orch.reporter().render(jswatch_core::now());
    assert!(doc.contains("b.js"));
    assert!(!doc.contains("a.js"));
}

#[tokio::test]
async fn failing_target_does_not_abort_cycle() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var ok;");
    let mut orch = orchestrator(fetcher, MemoryVersionStore::new());
    let targets = targets(&[
        static_spec("down", "https://down.example.com/app.js"),
        static_spec("app", APP_URL),
    ]);

    let entries = orch.run_cycle(&targets, &CancellationToken::new()).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].target_id, "app");
    assert_eq!(orch.reporter().entries().len(), 1);
    assert!(orch.store().get("down").is_none());
}

#[tokio::test]
async fn missing_blob_reinitialises() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "v1");
    let mut store = MemoryVersionStore::new();
    store.put("app", APP_URL, "v0").unwrap();
    store.forget_content("app");
    let mut orch = orchestrator(fetcher, store);

    let entries = orch
        .run_cycle(&targets(&[static_spec("app", APP_URL)]), &CancellationToken::new())
        .await;
    assert_eq!(entries[0].status, EntryStatus::Initial);
    assert_eq!(orch.store().get("app").unwrap().fingerprint, fingerprint("v1"));
}

#[tokio::test]
async fn formatting_only_change_updates_store_silently() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var a=1;var b=2;");
    let mut orch = Orchestrator::new(
        Resolver::new(fetcher.clone()),
        MemoryVersionStore::new(),
        Differ::new(3, true),
        Reporter::new(ReportFormat::Markdown),
    );
    let targets = targets(&[static_spec("app", APP_URL)]);
    let cancel = CancellationToken::new();
    orch.run_cycle(&targets, &cancel).await;

    fetcher.serve(APP_URL, "var a=1;\n    var b=2;");
    assert!(orch.run_cycle(&targets, &cancel).await.is_empty());
    assert_eq!(
        orch.store().get("app").unwrap().fingerprint,
        fingerprint("var a=1;\n    var b=2;")
    );
}

#[tokio::test]
async fn run_once_writes_report_changelog_and_notifies() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("output.md");
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var x=1;");
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let mut orch = orchestrator(fetcher.clone(), MemoryVersionStore::new())
        .with_report_file(&report)
        .with_changelog(ChangeLog::new(dir.path().join("changes")))
        .with_notifier(Box::new(notifier.clone()));
    let targets = targets(&[static_spec("app", APP_URL)]);
    let cancel = CancellationToken::new();

    orch.run_once(&targets, &cancel).await;
    assert!(std::fs::read_to_string(&report).unwrap().contains("Initial Download"));
    assert!(notifier.captions.lock().unwrap().is_empty());

    fetcher.serve(APP_URL, "var x=2;");
    orch.run_once(&targets, &cancel).await;
    let doc = std::fs::read_to_string(&report).unwrap();
    assert!(doc.contains("Status: Changed"));
    assert_eq!(
        notifier.captions.lock().unwrap().as_slice(),
        ["JSWatch: 1 change(s) detected"]
    );
    let log_path = ChangeLog::new(dir.path().join("changes")).path_for("app");
    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("- var x=1;\n+ var x=2;"));
}

#[tokio::test]
async fn cancelled_token_skips_remaining_targets() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var x;");
    let mut orch = orchestrator(fetcher.clone(), MemoryVersionStore::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let entries = orch
        .run_cycle(&targets(&[static_spec("app", APP_URL)]), &cancel)
        .await;
    assert!(entries.is_empty());
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn run_stops_during_sleep_when_cancelled() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.serve(APP_URL, "var x;");
    let mut orch = orchestrator(fetcher.clone(), MemoryVersionStore::new())
        .with_interval(Duration::from_secs(3600));
    let targets = targets(&[static_spec("app", APP_URL)]);
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), orch.run(&targets, cancel))
        .await
        .expect("run should return promptly after cancellation");
    assert_eq!(fetcher.requested().len(), 1);
    assert!(orch.processed().contains("app"));
}

#[tokio::test]
async fn store_write_failure_does_not_stop_other_targets() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher
        .serve("https://down.example.com/lib.js", "var v=1;")
        .serve(APP_URL, "var ok;");
    let mut inner = MemoryVersionStore::new();
    inner
        .put("lib", "https://down.example.com/lib.js", "var v=0;")
        .unwrap();
    let store = ReadOnlyFor {
        inner,
        broken: "lib",
    };
    let mut orch = orchestrator(fetcher, store);
    let targets = targets(&[
        static_spec("lib", "https://down.example.com/lib.js"),
        static_spec("app", APP_URL),
    ]);

    let entries = orch.run_cycle(&targets, &CancellationToken::new()).await;

    let ids: Vec<_> = entries.iter().map(|e| e.target_id.as_str()).collect();
    assert_eq!(ids, vec!["lib", "app"]);
    assert_eq!(entries[1].status, EntryStatus::Initial);
    assert_eq!(orch.store().get("app").unwrap().fingerprint, fingerprint("var ok;"));
    assert_eq!(orch.store().get("lib").unwrap().fingerprint, fingerprint("var v=0;"));
}
