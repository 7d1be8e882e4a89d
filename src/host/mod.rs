mod annotation;

pub use annotation::{annotation_text, format_size, Annotation, AnnotationSink, DocumentId};
