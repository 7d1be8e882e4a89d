mod key;
mod persist;
mod store;
mod types;

pub use key::{hash_import, CacheKey};
pub use persist::PersistenceScheduler;
pub use store::SizeCache;
pub use types::CachedRecord;
