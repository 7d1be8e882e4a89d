pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod extract;
pub mod host;
pub mod measure;
pub mod resolve;
pub mod session;
pub mod sync;
pub mod types;
pub mod utils;

pub use app::{load_config, Config};
pub use cache::{CachedRecord, PersistenceScheduler, SizeCache};
pub use host::{Annotation, AnnotationSink, DocumentId};
pub use session::Session;
pub use sync::{DocumentSnapshot, DocumentSyncController};
pub use types::{ImportDescriptor, ImportMembers, Target};
pub use utils::ImportCostError;
