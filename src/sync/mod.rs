mod controller;
mod document;

pub use controller::DocumentSyncController;
pub use document::DocumentSnapshot;
