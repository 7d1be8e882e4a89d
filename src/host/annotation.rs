use crate::cache::CachedRecord;
use crate::types::SourceRange;

/// Host-side handle for one open document, e.g. a URI string.
pub type DocumentId = String;

/// One rendered size label anchored to an import's source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub range: SourceRange,
    pub text: String,
}

/// Where rendered annotations go. Each call replaces the document's whole
/// set, so completed imports appear incrementally as their sizes arrive.
pub trait AnnotationSink: Send + Sync {
    fn apply(&self, document: &DocumentId, annotations: Vec<Annotation>);
}

/// Human-readable byte count, as shown in annotations.
pub fn format_size(bytes: u32) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let exact = f64::from(bytes);
    if exact < KB {
        format!("{bytes} B")
    } else if exact < MB {
        format!("{:.1} KB", exact / KB)
    } else {
        format!("{:.1} MB", exact / MB)
    }
}

/// Display text for one cached record: raw size plus gzipped size.
pub fn annotation_text(record: &CachedRecord) -> String {
    format!(
        "{} ({} gzip)",
        format_size(record.original),
        format_size(record.compressed)
    )
}
