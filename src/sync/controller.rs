use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::document::{DocumentSnapshot, DocumentState};
use crate::cache::{CachedRecord, PersistenceScheduler, SizeCache};
use crate::constants::DETECTED_LANGUAGES;
use crate::extract::ImportExtractor;
use crate::host::{annotation_text, Annotation, AnnotationSink, DocumentId};
use crate::measure::SizeMeasurer;
use crate::resolve::ModuleResolver;
use crate::types::{ImportDescriptor, Target};
use crate::utils::ImportCostError;

/// Everything a per-document run needs, shared across spawned tasks.
struct Pipeline {
    cache: Arc<SizeCache>,
    scheduler: Arc<PersistenceScheduler>,
    resolver: Arc<dyn ModuleResolver>,
    measurer: Arc<dyn SizeMeasurer>,
    extractor: Arc<dyn ImportExtractor>,
    sink: Arc<dyn AnnotationSink>,
    target: Target,
}

/// Annotations accumulated by one extraction run. Each push re-applies the
/// full set, so imports appear as their sizes arrive; a cancelled run stops
/// applying anything.
struct AnnotationRun {
    document: DocumentId,
    cancel: CancellationToken,
    sink: Arc<dyn AnnotationSink>,
    annotations: Mutex<Vec<Annotation>>,
}

impl AnnotationRun {
    fn push(&self, annotation: Annotation) {
        if self.cancel.is_cancelled() {
            return;
        }
        let snapshot = {
            let mut annotations = self.annotations.lock();
            annotations.push(annotation);
            annotations.clone()
        };
        self.sink.apply(&self.document, snapshot);
    }
}

/// Tracks the changing set of visible documents and drives the extract →
/// resolve → measure → render pipeline for each one, cancelling runs that
/// are superseded by an edit or by the document going invisible.
pub struct DocumentSyncController {
    pipeline: Arc<Pipeline>,
    documents: Mutex<HashMap<DocumentId, DocumentState>>,
}

impl DocumentSyncController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<SizeCache>,
        scheduler: Arc<PersistenceScheduler>,
        resolver: Arc<dyn ModuleResolver>,
        measurer: Arc<dyn SizeMeasurer>,
        extractor: Arc<dyn ImportExtractor>,
        sink: Arc<dyn AnnotationSink>,
        target: Target,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                cache,
                scheduler,
                resolver,
                measurer,
                extractor,
                sink,
                target,
            }),
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Reconciles tracked state with the host's set of visible documents.
    ///
    /// Documents that went invisible are cancelled and their annotations
    /// cleared. A visible document whose version was already processed is
    /// left untouched, so an unrelated document appearing or disappearing
    /// never triggers recomputation. A new document or a new version cancels
    /// the previous run and starts a fresh one.
    pub fn visible_documents_changed(&self, visible: Vec<DocumentSnapshot>) {
        let visible: Vec<DocumentSnapshot> = visible
            .into_iter()
            .filter(|doc| DETECTED_LANGUAGES.contains(&doc.language.as_str()))
            .collect();

        let mut hidden = Vec::new();
        {
            let mut documents = self.documents.lock();
            let visible_ids: HashSet<&DocumentId> = visible.iter().map(|doc| &doc.id).collect();
            documents.retain(|id, state| {
                if visible_ids.contains(id) {
                    return true;
                }
                state.cancel.cancel();
                hidden.push(id.clone());
                false
            });
        }
        for id in &hidden {
            self.pipeline.sink.apply(id, Vec::new());
        }

        for snapshot in visible {
            let superseded = {
                let mut documents = self.documents.lock();
                match documents.get_mut(&snapshot.id) {
                    Some(state) if state.version == snapshot.version => continue,
                    Some(state) => {
                        state.cancel.cancel();
                        true
                    }
                    None => false,
                }
            };
            if superseded {
                self.pipeline.sink.apply(&snapshot.id, Vec::new());
            }

            let cancel = CancellationToken::new();
            let id = snapshot.id.clone();
            let version = snapshot.version;
            let task = tokio::spawn(Pipeline::run(
                Arc::clone(&self.pipeline),
                snapshot,
                cancel.clone(),
            ));
            self.documents.lock().insert(
                id,
                DocumentState {
                    version,
                    cancel,
                    task: Some(task),
                },
            );
        }
    }

    /// Waits until every tracked pipeline task has finished. One-shot hosts
    /// (the CLI) and tests use this; editor hosts just keep feeding events.
    pub async fn wait_for_idle(&self) {
        loop {
            let tasks: Vec<_> = {
                let mut documents = self.documents.lock();
                documents
                    .values_mut()
                    .filter_map(|state| state.task.take())
                    .collect()
            };
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}

impl Pipeline {
    async fn run(self: Arc<Self>, doc: DocumentSnapshot, cancel: CancellationToken) {
        let extractor = Arc::clone(&self.extractor);
        let text = Arc::clone(&doc.text);
        let language = doc.language.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extractor.extract(&text, &language)).await;
        let imports = match extracted {
            Ok(Ok(imports)) => imports,
            Ok(Err(err)) => {
                if !cancel.is_cancelled() {
                    warn!("error extracting imports from {}: {err}", doc.id);
                }
                return;
            }
            Err(err) => {
                warn!("import extraction for {} panicked: {err}", doc.id);
                return;
            }
        };
        if cancel.is_cancelled() {
            return;
        }

        let from_dir = doc
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let run = Arc::new(AnnotationRun {
            document: doc.id.clone(),
            cancel: cancel.clone(),
            sink: Arc::clone(&self.sink),
            annotations: Mutex::new(Vec::new()),
        });

        let jobs = imports
            .into_iter()
            .filter(|import| !import.is_relative())
            .map(|import| {
                self.annotate_import(from_dir.clone(), import, cancel.clone(), Arc::clone(&run))
            });
        join_all(jobs).await;
    }

    /// One import's sub-pipeline. Failures are logged and never affect
    /// sibling imports.
    async fn annotate_import(
        &self,
        from_dir: PathBuf,
        import: ImportDescriptor,
        cancel: CancellationToken,
        run: Arc<AnnotationRun>,
    ) {
        match self.measure_import(&from_dir, &import, &cancel).await {
            Ok(Some(record)) => run.push(Annotation {
                range: import.range,
                text: annotation_text(&record),
            }),
            // Superseded mid-flight; dropped silently, not a failure
            Ok(None) => {}
            Err(err) => debug!("no annotation for '{}': {err}", import.name),
        }
    }

    /// Resolves and measures one import, observing cancellation after each
    /// suspension point. `Ok(None)` means the run was superseded; a
    /// computation already registered in the cache still finishes and
    /// benefits future lookups.
    async fn measure_import(
        &self,
        from_dir: &Path,
        import: &ImportDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<CachedRecord>, ImportCostError> {
        let resolved = self
            .resolver
            .resolve(self.target, &import.name, from_dir)
            .await?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        // Identity includes the version so a package upgrade remeasures
        let module_id = format!("{}@{}", resolved.entry_path.display(), resolved.version);

        let measurer = Arc::clone(&self.measurer);
        let scheduler = Arc::clone(&self.scheduler);
        let dir = from_dir.to_path_buf();
        let descriptor = import.clone();
        let target = self.target;
        let record = self
            .cache
            .get_or_insert(target, &module_id, &import.members, move || async move {
                let size = measurer.measure(&dir, &descriptor, target).await?;
                scheduler.schedule();
                Ok(CachedRecord::new(size.original, size.compressed))
            })
            .await
            .map_err(ImportCostError::Shared)?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        Ok(Some(record))
    }
}
