//! Document entity (the fields the ingestion pipeline reads or projects).

pub mod model;
pub mod status;

pub use model::Document;
pub use status::DocumentProcessingStatus;
