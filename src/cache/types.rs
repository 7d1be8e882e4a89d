use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One measured module size, stamped with when it was computed.
///
/// Immutable once computed; a fresh computation for the same key replaces
/// the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    /// Whole-second resolution; the persisted format stores Unix seconds.
    pub last_used: SystemTime,
    /// Bundled size in bytes.
    pub original: u32,
    /// Gzip-compressed size in bytes.
    pub compressed: u32,
}

impl CachedRecord {
    /// Creates a record stamped with the current time, truncated to whole
    /// seconds so that it survives a serialize/deserialize round trip intact.
    pub fn new(original: u32, compressed: u32) -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self {
            last_used: UNIX_EPOCH + Duration::from_secs(seconds),
            original,
            compressed,
        }
    }

    pub(crate) fn from_parts(unix_seconds: u32, original: u32, compressed: u32) -> Self {
        Self {
            last_used: UNIX_EPOCH + Duration::from_secs(u64::from(unix_seconds)),
            original,
            compressed,
        }
    }

    /// Unix seconds of `last_used`. The persisted format cannot represent
    /// times before 1970 or past 2106; values are clamped into that window.
    pub(crate) fn unix_seconds(&self) -> u32 {
        self.last_used
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
            .min(u64::from(u32::MAX)) as u32
    }
}
