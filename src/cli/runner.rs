use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::host::{Annotation, AnnotationSink, DocumentId};
use crate::session::Session;
use crate::sync::DocumentSnapshot;

/// Keeps the latest annotation set per document.
#[derive(Default)]
pub struct CollectSink {
    results: Mutex<HashMap<DocumentId, Vec<Annotation>>>,
}

impl AnnotationSink for CollectSink {
    fn apply(&self, document: &DocumentId, annotations: Vec<Annotation>) {
        self.results.lock().insert(document.clone(), annotations);
    }
}

impl CollectSink {
    pub fn take(&self, document: &str) -> Option<Vec<Annotation>> {
        self.results.lock().remove(document)
    }
}

/// One-shot runner: treats each file as a visible document at version 1,
/// drives the controller to quiescence, and prints the annotations.
pub struct AnnotateRunner {
    session: Session,
}

impl AnnotateRunner {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Annotates the given files and returns how many annotations printed.
    pub async fn run(&self, files: &[PathBuf]) -> Result<usize> {
        let sink = Arc::new(CollectSink::default());
        let controller = self
            .session
            .controller(Arc::clone(&sink) as Arc<dyn AnnotationSink>);

        let mut snapshots = Vec::new();
        for file in files {
            let Some(language) = language_for_path(file) else {
                eprintln!(
                    "skipping {}: not a JavaScript or TypeScript file",
                    file.display()
                );
                continue;
            };
            let text = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let path = tokio::fs::canonicalize(file)
                .await
                .unwrap_or_else(|_| file.clone());

            snapshots.push(DocumentSnapshot {
                id: file.display().to_string(),
                path,
                language: language.to_string(),
                version: 1,
                text: Arc::from(text.as_str()),
            });
        }

        controller.visible_documents_changed(snapshots);
        controller.wait_for_idle().await;
        self.session.shutdown().await;

        let mut total = 0;
        for file in files {
            let id = file.display().to_string();
            let Some(mut annotations) = sink.take(&id) else {
                continue;
            };
            annotations.sort_by_key(|annotation| annotation.range.start_line);
            for annotation in annotations {
                println!(
                    "{}:{}: {}",
                    file.display(),
                    annotation.range.start_line + 1,
                    annotation.text
                );
                total += 1;
            }
        }
        Ok(total)
    }
}

/// Maps a file extension to the host language identifier.
fn language_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "js" | "mjs" | "cjs" => Some("javascript"),
        "jsx" => Some("javascriptreact"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("typescriptreact"),
        _ => None,
    }
}
