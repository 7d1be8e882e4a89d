use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::{Buf, BufMut, BytesMut};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::constants::{CACHE_RECORD_LEN, SERIALIZE_SETTLE_TIMEOUT_SECS};
use crate::types::{ImportMembers, Target};
use crate::utils::ImportCostError;

use super::key::{hash_import, CacheKey};
use super::types::CachedRecord;

type SharedOutcome = Result<CachedRecord, Arc<ImportCostError>>;
type PendingComputation = Shared<BoxFuture<'static, SharedOutcome>>;

/// A slot holds either a resolved record or the one in-flight computation
/// for its key. Concurrent requests for the same key share the pending
/// future instead of starting a second computation.
#[derive(Clone)]
enum Slot {
    Ready(CachedRecord),
    Pending(PendingComputation),
}

/// Map from hashed import key to measured (or in-flight) module size.
///
/// Entries are never explicitly deleted; retention happens by excluding
/// stale records during `serialize`, so they disappear at the next load.
pub struct SizeCache {
    slots: Arc<Mutex<HashMap<CacheKey, Slot>>>,
}

impl SizeCache {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of populated slots, pending computations included.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Returns the cached size for this import, or runs `compute` to fill it.
    ///
    /// The slot check and the pending-handle insert happen under one lock
    /// acquisition with no await in between, so at most one computation is
    /// ever in flight per key; a concurrent caller either sees the finished
    /// record or awaits the same shared future. A failed computation clears
    /// its slot so a later request retries, and every waiter of the failed
    /// attempt observes the same error.
    pub async fn get_or_insert<F, Fut>(
        &self,
        target: Target,
        name: &str,
        members: &ImportMembers,
        compute: F,
    ) -> Result<CachedRecord, Arc<ImportCostError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedRecord, ImportCostError>> + Send + 'static,
    {
        let key = hash_import(target, name, members);

        let pending = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(Slot::Ready(record)) => return Ok(record.clone()),
                Some(Slot::Pending(pending)) => pending.clone(),
                None => {
                    let computation = compute();
                    let slots_handle = Arc::clone(&self.slots);
                    let pending: PendingComputation = async move {
                        match computation.await {
                            Ok(record) => {
                                slots_handle.lock().insert(key, Slot::Ready(record.clone()));
                                Ok(record)
                            }
                            Err(err) => {
                                slots_handle.lock().remove(&key);
                                Err(Arc::new(err))
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    slots.insert(key, Slot::Pending(pending.clone()));
                    pending
                }
            }
        };

        pending.await
    }

    /// Serializes every record whose `last_used` is at or after `cutoff`
    /// into a flat concatenation of 20-byte tuples: key, last-used Unix
    /// seconds, original bytes, compressed bytes, all big-endian.
    ///
    /// In-flight computations are given a bounded window to settle; entries
    /// that fail or do not settle in time are skipped for this snapshot and
    /// picked up by a later write once resolved.
    pub async fn serialize(&self, cutoff: SystemTime) -> Vec<u8> {
        let snapshot: Vec<(CacheKey, Slot)> = {
            let slots = self.slots.lock();
            slots.iter().map(|(key, slot)| (*key, slot.clone())).collect()
        };

        let settle_timeout = Duration::from_secs(SERIALIZE_SETTLE_TIMEOUT_SECS);
        let mut buf = BytesMut::with_capacity(snapshot.len() * CACHE_RECORD_LEN);
        for (key, slot) in snapshot {
            let record = match slot {
                Slot::Ready(record) => record,
                Slot::Pending(pending) => {
                    match tokio::time::timeout(settle_timeout, pending).await {
                        Ok(Ok(record)) => record,
                        Ok(Err(_)) | Err(_) => continue,
                    }
                }
            };
            if record.last_used < cutoff {
                continue;
            }

            buf.put_u64(key);
            buf.put_u32(record.unix_seconds());
            buf.put_u32(record.original);
            buf.put_u32(record.compressed);
        }

        buf.to_vec()
    }

    /// Rebuilds a cache from `serialize` output.
    ///
    /// A length that is not a whole number of records means the data is
    /// corrupt; callers fall back to an empty cache rather than failing.
    pub fn deserialize(mut bytes: &[u8]) -> Result<Self, ImportCostError> {
        if bytes.len() % CACHE_RECORD_LEN != 0 {
            return Err(ImportCostError::MalformedCache { len: bytes.len() });
        }

        let mut slots = HashMap::with_capacity(bytes.len() / CACHE_RECORD_LEN);
        while bytes.has_remaining() {
            let key = bytes.get_u64();
            let last_used = bytes.get_u32();
            let original = bytes.get_u32();
            let compressed = bytes.get_u32();
            slots.insert(
                key,
                Slot::Ready(CachedRecord::from_parts(last_used, original, compressed)),
            );
        }

        Ok(Self {
            slots: Arc::new(Mutex::new(slots)),
        })
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> HashMap<CacheKey, CachedRecord> {
        self.slots
            .lock()
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(record) => Some((*key, record.clone())),
                Slot::Pending(_) => None,
            })
            .collect()
    }
}

impl Default for SizeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::UNIX_EPOCH;

    fn named(members: &[&str]) -> ImportMembers {
        ImportMembers::NamedList(members.iter().map(|m| m.to_string()).collect())
    }

    /// Walks the same request sequence as the scenario in the persisted-file
    /// round-trip test: each compute call stamps its ordinal into `original`.
    async fn populate(cache: &SizeCache, calls: &Arc<AtomicU32>) {
        let compute = |calls: &Arc<AtomicU32>| {
            let calls = Arc::clone(calls);
            move || async move {
                let ordinal = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(CachedRecord::new(ordinal, 1))
            }
        };

        let requests = [
            (Target::Node, "cockatiel", ImportMembers::AllNamespace, 1),
            (Target::Node, "cockatiel", ImportMembers::AllNamespace, 1),
            (Target::Node, "etcd3", ImportMembers::AllNamespace, 2),
            (Target::Node, "etcd3", named(&["foo", "bar"]), 3),
            (Target::Node, "etcd3", named(&["foo", "baz"]), 4),
            (Target::Node, "etcd3", ImportMembers::DefaultOnly, 5),
            (Target::Browser, "etcd3", ImportMembers::DefaultOnly, 6),
        ];
        for (target, name, members, expected) in requests {
            let record = cache
                .get_or_insert(target, name, &members, compute(calls))
                .await
                .unwrap();
            assert_eq!(record.original, expected);
        }
    }

    #[tokio::test]
    async fn compute_runs_once_per_key() {
        let cache = SizeCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        populate(&cache, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(cache.len(), 6);
    }

    #[tokio::test]
    async fn named_member_order_hits_the_same_slot() {
        let cache = SizeCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        populate(&cache, &calls).await;

        let record = cache
            .get_or_insert(Target::Node, "etcd3", &named(&["bar", "foo"]), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(CachedRecord::new(999, 999))
                }
            })
            .await
            .unwrap();

        assert_eq!(record.original, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6, "cached slot must not recompute");
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_computation() {
        let cache = SizeCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        let compute = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(CachedRecord::new(128, 42))
            }
        };

        let members = ImportMembers::AllNamespace;
        let (a, b) = tokio::join!(
            cache.get_or_insert(Target::Node, "cockatiel", &members, compute()),
            cache.get_or_insert(Target::Node, "cockatiel", &members, compute()),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn failed_compute_clears_the_slot_for_retry() {
        let cache = SizeCache::new();
        let members = ImportMembers::DefaultOnly;

        let failed = cache
            .get_or_insert(Target::Node, "ghost-module", &members, || async {
                Err(ImportCostError::Measurement {
                    name: "ghost-module".into(),
                    reason: "bundler exploded".into(),
                })
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.len(), 0);

        let retried = cache
            .get_or_insert(Target::Node, "ghost-module", &members, || async {
                Ok(CachedRecord::new(64, 32))
            })
            .await
            .unwrap();
        assert_eq!(retried.original, 64);
    }

    #[tokio::test]
    async fn serialize_round_trips() {
        let cache = SizeCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        populate(&cache, &calls).await;

        let bytes = cache.serialize(UNIX_EPOCH).await;
        assert_eq!(bytes.len(), 6 * CACHE_RECORD_LEN);

        let restored = SizeCache::deserialize(&bytes).unwrap();
        assert_eq!(restored.records(), cache.records());
    }

    #[tokio::test]
    async fn future_cutoff_yields_zero_bytes() {
        let cache = SizeCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        populate(&cache, &calls).await;

        let tomorrow = SystemTime::now() + Duration::from_secs(60 * 60 * 24);
        let bytes = cache.serialize(tomorrow).await;
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn serialize_awaits_pending_computations() {
        let cache = Arc::new(SizeCache::new());

        let worker = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_insert(
                        Target::Node,
                        "slowpoke",
                        &ImportMembers::AllNamespace,
                        || async {
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Ok(CachedRecord::new(100, 50))
                        },
                    )
                    .await
            })
        };

        // Give the worker a moment to register its pending slot
        tokio::time::sleep(Duration::from_millis(5)).await;
        let bytes = cache.serialize(UNIX_EPOCH).await;

        assert_eq!(bytes.len(), CACHE_RECORD_LEN);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wire_format_is_big_endian_fixed_width() {
        let cache = SizeCache::new();
        let members = named(&["parse"]);
        let record = cache
            .get_or_insert(Target::Browser, "acorn", &members, || async {
                Ok(CachedRecord::new(0x0102_0304, 0x0A0B_0C0D))
            })
            .await
            .unwrap();

        let bytes = cache.serialize(UNIX_EPOCH).await;
        assert_eq!(bytes.len(), CACHE_RECORD_LEN);

        let key = hash_import(Target::Browser, "acorn", &members);
        assert_eq!(bytes[0..8], key.to_be_bytes());
        assert_eq!(bytes[8..12], record.unix_seconds().to_be_bytes());
        assert_eq!(bytes[12..16], 0x0102_0304u32.to_be_bytes());
        assert_eq!(bytes[16..20], 0x0A0B_0C0Du32.to_be_bytes());
    }

    #[test]
    fn truncated_data_is_rejected_as_malformed() {
        match SizeCache::deserialize(&[0u8; 7]) {
            Err(ImportCostError::MalformedCache { len }) => assert_eq!(len, 7),
            Err(other) => panic!("expected MalformedCache, got {other:?}"),
            Ok(_) => panic!("expected MalformedCache, got a cache"),
        }
    }

    #[test]
    fn empty_data_is_an_empty_cache() {
        let cache = SizeCache::deserialize(&[]).unwrap();
        assert!(cache.is_empty());
    }
}
