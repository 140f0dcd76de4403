use std::fmt;
use std::path::PathBuf;

use chartsync_core::ClientError;
use thiserror::Error;

use super::scanner::{ScanError, scan_catalog};
use super::state::{FlushOnDrop, UploadStateStore};
use super::transfer::RemoteCatalog;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("failed to fetch server song list: {0}")]
    Fetch(#[source] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Upload,
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Scanning,
    Uploading,
    Diffing,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyUploaded,
    MissingChart,
    MissingAudio,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::AlreadyUploaded => "already uploaded",
            SkipReason::MissingChart => "no chart file found",
            SkipReason::MissingAudio => "no audio file found",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemReport {
    Uploaded { key: String },
    Skipped { key: String, reason: SkipReason },
    Failed { key: String, detail: String },
    Missing { key: String },
}

impl ItemReport {
    pub fn key(&self) -> &str {
        match self {
            ItemReport::Uploaded { key }
            | ItemReport::Skipped { key, .. }
            | ItemReport::Failed { key, .. }
            | ItemReport::Missing { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: RunMode,
    pub items: Vec<ItemReport>,
    pub server_total: Option<usize>,
    pub phases: Vec<RunPhase>,
}

impl RunReport {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
            server_total: None,
            phases: vec![RunPhase::Idle],
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(?phase, "entering phase");
        self.phases.push(phase);
    }

    pub fn uploaded(&self) -> Vec<&str> {
        self.keys_where(|item| matches!(item, ItemReport::Uploaded { .. }))
    }

    pub fn missing(&self) -> Vec<&str> {
        self.keys_where(|item| matches!(item, ItemReport::Missing { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count_where(|item| matches!(item, ItemReport::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count_where(|item| matches!(item, ItemReport::Failed { .. }))
    }

    fn keys_where(&self, pred: impl Fn(&ItemReport) -> bool) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| pred(item))
            .map(ItemReport::key)
            .collect()
    }

    fn count_where(&self, pred: impl Fn(&ItemReport) -> bool) -> usize {
        self.items.iter().filter(|item| pred(item)).count()
    }
}

pub struct SyncEngine<R> {
    remote: R,
    store: UploadStateStore,
    root: PathBuf,
}

impl<R: RemoteCatalog> SyncEngine<R> {
    pub fn new(remote: R, store: UploadStateStore, root: PathBuf) -> Self {
        Self {
            remote,
            store,
            root,
        }
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunReport, SyncError> {
        match mode {
            RunMode::Upload => self.run_upload().await,
            RunMode::Scan => self.run_scan().await,
        }
    }

    /// Uploads pending songs. The state file is rewritten once, when the
    /// run ends or its future is dropped.
    pub async fn run_upload(&self) -> Result<RunReport, SyncError> {
        let mut report = RunReport::new(RunMode::Upload);
        report.enter(RunPhase::Scanning);
        let candidates = scan_catalog(&self.root)?;

        let mut state = FlushOnDrop::load(&self.store);
        tracing::info!(
            candidates = candidates.len(),
            recorded = state.state().len(),
            "starting upload run"
        );
        report.enter(RunPhase::Uploading);

        for candidate in &candidates {
            let key = candidate.key();
            if state.state().contains(&key) {
                tracing::info!(key = %key, "already uploaded, skipping");
                report.items.push(ItemReport::Skipped {
                    key,
                    reason: SkipReason::AlreadyUploaded,
                });
                continue;
            }
            let (chart, audio) = match (&candidate.chart, &candidate.audio) {
                (None, _) => {
                    report.items.push(skip(key, SkipReason::MissingChart));
                    continue;
                }
                (Some(_), None) => {
                    report.items.push(skip(key, SkipReason::MissingAudio));
                    continue;
                }
                (Some(chart), Some(audio)) => (chart, audio),
            };

            let outcome = self
                .remote
                .upload(&candidate.category, chart, audio)
                .await;
            if outcome.success {
                state.state_mut().insert(key.clone());
                tracing::info!(key = %key, "upload complete");
                report.items.push(ItemReport::Uploaded { key });
            } else {
                tracing::warn!(key = %key, detail = %outcome.detail, "upload failed, skipping");
                report.items.push(ItemReport::Failed {
                    key,
                    detail: outcome.detail,
                });
            }
        }

        report.enter(RunPhase::Finalizing);
        drop(state);
        report.enter(RunPhase::Done);
        tracing::info!(
            uploaded = report.uploaded().len(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "upload run finished"
        );
        Ok(report)
    }

    pub async fn run_scan(&self) -> Result<RunReport, SyncError> {
        let mut report = RunReport::new(RunMode::Scan);
        report.enter(RunPhase::Scanning);
        let candidates = scan_catalog(&self.root)?;

        report.enter(RunPhase::Diffing);
        tracing::info!("fetching server song list");
        let server = self.remote.fetch_keys().await.map_err(SyncError::Fetch)?;
        tracing::info!(songs = server.len(), "server song list fetched");
        report.server_total = Some(server.len());

        for candidate in &candidates {
            let key = candidate.key();
            if !server.contains(&key) {
                tracing::info!(key = %key, "missing on server");
                report.items.push(ItemReport::Missing { key });
            }
        }

        report.enter(RunPhase::Finalizing);
        report.enter(RunPhase::Done);
        tracing::info!(missing = report.missing().len(), "scan finished");
        Ok(report)
    }
}

fn skip(key: String, reason: SkipReason) -> ItemReport {
    tracing::info!(key = %key, %reason, "skipping");
    ItemReport::Skipped { key, reason }
}
