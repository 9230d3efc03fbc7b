//! Repository implementations for DocFlow entities.

pub mod document;
pub mod job;

pub use document::DocumentRepository;
pub use job::JobRepository;
