use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::host::DocumentId;

/// A host document as seen at one version.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    /// Filesystem path; its parent directory anchors module resolution
    /// and bundling.
    pub path: PathBuf,
    /// Host language identifier, e.g. "typescriptreact".
    pub language: String,
    pub version: i64,
    pub text: Arc<str>,
}

/// Tracking state for one visible document.
///
/// Replaced wholesale when the version advances; the previous state's
/// token is cancelled before being discarded.
pub(crate) struct DocumentState {
    pub version: i64,
    pub cancel: CancellationToken,
    pub task: Option<JoinHandle<()>>,
}
