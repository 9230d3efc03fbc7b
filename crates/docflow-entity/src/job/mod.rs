//! Ingestion job domain entities.

pub mod model;
pub mod status;
pub mod summary;

pub use model::Job;
pub use status::JobStatus;
pub use summary::JobSummary;
