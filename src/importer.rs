// 🚀 Import Coordinator
// Reader → Mapper → Differ → Writer, one synchronous pipeline per call.
//
// Any stage error aborts before the writer and is returned unchanged.
// On success the hierarchy view is refreshed exactly once.

use crate::config::ImportConfig;
use crate::db::Store;
use crate::differ::{diff, DeltaCounts};
use crate::error::{ImportError, ImportResult};
use crate::mapper::map_document;
use crate::reader::{RawDocument, Vendor, XmlReader};
use crate::writer::{ApplyContext, ControllerLocks, IdempotentWriter, RawBlob};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, field, info, info_span, Span};
use uuid::Uuid;

// ============================================================================
// COLLABORATORS
// ============================================================================

/// UI-side notification that a controller's tree changed
pub trait HierarchyRefresh: Send + Sync {
    fn refresh(&self, controller_name: &str);
}

impl<F> HierarchyRefresh for F
where
    F: Fn(&str) + Send + Sync,
{
    fn refresh(&self, controller_name: &str) {
        self(controller_name)
    }
}

/// For headless use
pub struct NoRefresh;

impl HierarchyRefresh for NoRefresh {
    fn refresh(&self, _controller_name: &str) {}
}

/// Progress and cancellation hooks. Cancellation is honoured up to the start of apply.
pub trait ImportObserver {
    fn on_phase(&self, _label: &str, _percent: u8) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

impl ImportObserver for () {}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub source: String,
    pub controller: String,
    pub vendor: Vendor,
    pub schema_revision: String,
    pub blob_hash: String,
    pub counts: DeltaCounts,
    /// `None` in validate-only mode
    pub snapshot_id: Option<String>,
    pub version: Option<i64>,
    pub blob_new: bool,
    pub replayed: bool,
    pub reused: bool,
    pub validate_only: bool,
    pub duration: Duration,
}

impl ImportReport {
    /// Created + updated + removed across all kinds
    pub fn changed(&self) -> usize {
        self.counts.total().changed()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}] {}{}",
            self.controller,
            self.snapshot_id.as_deref().map_or("dry-run", |s| &s[..s.len().min(12)]),
            self.counts.summary(),
            if self.reused { " (reused)" } else if self.replayed { " (replayed)" } else { "" }
        )
    }
}

// ============================================================================
// IMPORTER
// ============================================================================

pub struct Importer {
    store: Arc<Store>,
    config: ImportConfig,
    reader: XmlReader,
    refresh: Box<dyn HierarchyRefresh>,
    locks: ControllerLocks,
}

impl Importer {
    pub fn new(store: Arc<Store>, config: ImportConfig, refresh: Box<dyn HierarchyRefresh>) -> Self {
        Importer {
            store,
            reader: XmlReader::new(config.supported_schema_majors.clone()),
            config,
            refresh,
            locks: ControllerLocks::new(),
        }
    }

    /// Open the configured database and build an importer over it
    pub fn open(config: ImportConfig, refresh: Box<dyn HierarchyRefresh>) -> ImportResult<Self> {
        let store = Arc::new(Store::open_with_config(&config)?);
        Ok(Self::new(store, config, refresh))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn import_file(&self, path: &Path) -> ImportResult<ImportReport> {
        self.import_file_with_progress(path, &())
    }

    pub fn import_file_with_progress(
        &self,
        path: &Path,
        observer: &dyn ImportObserver,
    ) -> ImportResult<ImportReport> {
        self.execute(&path.display().to_string(), observer, || {
            if self.config.require_l5x_extension && !has_l5x_extension(path) {
                return Err(ImportError::UnsupportedFileType {
                    path: path.to_path_buf(),
                });
            }
            self.reader.read_file(path)
        })
    }

    pub fn import_bytes(&self, source_name: &str, bytes: &[u8]) -> ImportResult<ImportReport> {
        self.import_bytes_with_progress(source_name, bytes, &())
    }

    pub fn import_bytes_with_progress(
        &self,
        source_name: &str,
        bytes: &[u8],
        observer: &dyn ImportObserver,
    ) -> ImportResult<ImportReport> {
        self.execute(source_name, observer, || {
            let document = self.reader.read(bytes)?;
            Ok((document, bytes.to_vec()))
        })
    }

    /// Rolling backup of the database next to it
    pub fn backup(&self) -> anyhow::Result<PathBuf> {
        self.store.backup_rolling(self.config.max_backups)
    }

    fn execute(
        &self,
        source: &str,
        observer: &dyn ImportObserver,
        load: impl FnOnce() -> ImportResult<(RawDocument, Vec<u8>)>,
    ) -> ImportResult<ImportReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            target: "simec.import",
            "import",
            run_id = %run_id,
            source,
            controller = field::Empty
        );
        let _entered = span.enter();

        let mut controller = None;
        match self.run(run_id, source, observer, load, &span, &mut controller) {
            Ok(report) => {
                info!(
                    target: "simec.import",
                    stage = "coordinator",
                    controller = %report.controller,
                    counts = %report.counts.summary(),
                    validate_only = report.validate_only,
                    duration_ms = report.duration.as_millis() as u64,
                    "import finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    target: "simec.import",
                    controller = controller.as_deref().unwrap_or("<unknown>"),
                    stage = %e.stage(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "import failed"
                );
                Err(e)
            }
        }
    }

    fn run(
        &self,
        run_id: Uuid,
        source: &str,
        observer: &dyn ImportObserver,
        load: impl FnOnce() -> ImportResult<(RawDocument, Vec<u8>)>,
        span: &Span,
        mapped_controller: &mut Option<String>,
    ) -> ImportResult<ImportReport> {
        let started = Instant::now();

        checkpoint(observer, "Reading", 5)?;
        let (raw, bytes) = load()?;
        let blob = RawBlob::new(bytes);
        debug!(
            target: "simec.import",
            stage = "reader",
            vendor = raw.vendor.code(),
            schema_revision = %raw.schema_revision,
            bytes = blob.bytes.len(),
            "document read"
        );

        checkpoint(observer, "Mapping", 25)?;
        let document = map_document(&raw)?;
        let controller = document.controller.clone();
        span.record("controller", controller.as_str());
        *mapped_controller = Some(controller.clone());
        info!(
            target: "simec.schema",
            stage = "mapper",
            controller = %controller,
            entities = document.entities.len(),
            "document mapped"
        );

        // Held from the base snapshot read through commit
        let lock = self.locks.handle(&controller);
        let guard = lock.lock();

        checkpoint(observer, "Diffing", 50)?;
        let prior = self.store.latest_snapshot(&controller)?;
        let deltas = diff(&document, prior.as_ref());
        let counts = deltas.counts();
        info!(
            target: "simec.import",
            stage = "differ",
            controller = %controller,
            base = deltas.base_snapshot.as_deref().unwrap_or("<none>"),
            counts = %counts.summary(),
            "delta set computed"
        );

        let mut report = ImportReport {
            run_id,
            source: source.to_string(),
            controller: controller.clone(),
            vendor: document.vendor,
            schema_revision: document.schema_revision.clone(),
            blob_hash: blob.hash.clone(),
            counts,
            snapshot_id: None,
            version: None,
            blob_new: false,
            replayed: false,
            reused: false,
            validate_only: self.config.validate_only,
            duration: Duration::ZERO,
        };

        if self.config.validate_only {
            observer.on_phase("Done", 100);
            report.duration = started.elapsed();
            return Ok(report);
        }

        checkpoint(observer, "Applying", 75)?;
        let ctx = ApplyContext::for_document(&document, source)
            .with_placement(self.config.facility_id, self.config.unit_id)
            .with_schema_check(self.config.abort_on_schema_mismatch);
        let outcome = IdempotentWriter::new(&self.store).apply(&deltas, &blob, &ctx)?;
        drop(guard);

        report.counts = outcome.counts;
        report.snapshot_id = Some(outcome.snapshot_id);
        report.version = Some(outcome.version);
        report.blob_new = outcome.blob_new;
        report.replayed = outcome.replayed;
        report.reused = outcome.reused;

        info!(target: "simec.ui", stage = "coordinator", controller = %controller, "refreshing hierarchy view");
        self.refresh.refresh(&controller);

        observer.on_phase("Done", 100);
        report.duration = started.elapsed();
        Ok(report)
    }
}

fn checkpoint(observer: &dyn ImportObserver, label: &str, percent: u8) -> ImportResult<()> {
    observer.on_phase(label, percent);
    if observer.is_cancelled() {
        info!(target: "simec.import", stage = "coordinator", phase = label, "import cancelled");
        return Err(ImportError::Cancelled);
    }
    Ok(())
}

fn has_l5x_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("l5x"))
}
