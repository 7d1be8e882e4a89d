use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::app::Config;
use crate::cache::{PersistenceScheduler, SizeCache};
use crate::extract::{ImportExtractor, TreeSitterExtractor};
use crate::host::AnnotationSink;
use crate::measure::{EsbuildInstaller, EsbuildMeasurer, SizeMeasurer};
use crate::resolve::{ModuleResolver, NodeResolver};
use crate::sync::DocumentSyncController;

/// Owns every long-lived component of one editing session: the size cache,
/// its persistence scheduler, and the resolver/measurer/extractor instances
/// handed to controllers. Nothing here is a process-wide static.
pub struct Session {
    config: Config,
    cache: Arc<SizeCache>,
    scheduler: Arc<PersistenceScheduler>,
    resolver: Arc<NodeResolver>,
    measurer: Arc<EsbuildMeasurer>,
    extractor: Arc<TreeSitterExtractor>,
}

impl Session {
    /// Builds a session, loading the persisted cache from disk.
    ///
    /// A missing or corrupt cache file always degrades to an empty cache;
    /// corruption is logged, never surfaced as a failure.
    pub async fn new(config: Config) -> Result<Self> {
        let cache_file = config.cache_file()?;
        if let Some(parent) = cache_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let cache = match tokio::fs::read(&cache_file).await {
            Ok(bytes) => match SizeCache::deserialize(&bytes) {
                Ok(cache) => {
                    debug!("loaded {} cached module sizes", cache.len());
                    cache
                }
                Err(err) => {
                    warn!("discarding corrupt size cache: {err}");
                    SizeCache::new()
                }
            },
            Err(_) => SizeCache::new(),
        };
        let cache = Arc::new(cache);

        let scheduler = Arc::new(PersistenceScheduler::new(
            Arc::clone(&cache),
            cache_file,
            config.debounce(),
            config.retention(),
        ));
        let installer = EsbuildInstaller::new(
            config.tool_dir()?,
            config.bundler.esbuild_path.clone(),
            config.bundler.auto_install,
        );

        Ok(Self {
            cache,
            scheduler,
            resolver: Arc::new(NodeResolver::new()),
            measurer: Arc::new(EsbuildMeasurer::new(installer)),
            extractor: Arc::new(TreeSitterExtractor),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SizeCache> {
        &self.cache
    }

    /// A controller wired to this session's components and the host's sink.
    pub fn controller(&self, sink: Arc<dyn AnnotationSink>) -> DocumentSyncController {
        DocumentSyncController::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.resolver) as Arc<dyn ModuleResolver>,
            Arc::clone(&self.measurer) as Arc<dyn SizeMeasurer>,
            Arc::clone(&self.extractor) as Arc<dyn ImportExtractor>,
            sink,
            self.config.target,
        )
    }

    /// Re-provision the bundler, e.g. after the user fixed their npm setup.
    pub async fn reinstall_bundler(&self) -> Result<()> {
        self.measurer.installer().forget().await;
        self.measurer.installer().ensure().await?;
        Ok(())
    }

    /// Flushes pending cache state. Hosts call this at shutdown so the
    /// final burst of updates is not lost to the debounce window.
    pub async fn shutdown(&self) {
        self.scheduler.flush().await;
    }
}
