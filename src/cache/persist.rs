use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::store::SizeCache;
use crate::utils::Debounce;

/// Debounced writer of the cache's serialized form.
///
/// Bursts of `schedule` calls during heavy editing collapse into a single
/// write once the calls go quiet for the delay. There is no upper bound on
/// deferral, so hosts must call `flush` at shutdown to persist the final
/// burst. Entries older than the retention window are dropped at each write.
pub struct PersistenceScheduler {
    debounce: Debounce,
}

impl PersistenceScheduler {
    pub fn new(
        cache: Arc<SizeCache>,
        path: PathBuf,
        delay: Duration,
        retention: Duration,
    ) -> Self {
        let debounce = Debounce::new(delay, move || {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            async move {
                let cutoff = SystemTime::now()
                    .checked_sub(retention)
                    .unwrap_or(UNIX_EPOCH);
                let bytes = cache.serialize(cutoff).await;
                match tokio::fs::write(&path, &bytes).await {
                    Ok(()) => debug!(
                        "persisted size cache ({} bytes) to {}",
                        bytes.len(),
                        path.display()
                    ),
                    Err(err) => warn!(
                        "failed to persist size cache to {}: {}",
                        path.display(),
                        err
                    ),
                }
            }
        });

        Self { debounce }
    }

    /// Arm (or re-arm) the delayed write.
    pub fn schedule(&self) {
        self.debounce.call();
    }

    /// Write immediately, cancelling any pending timer.
    pub async fn flush(&self) {
        self.debounce.flush().await;
    }
}
