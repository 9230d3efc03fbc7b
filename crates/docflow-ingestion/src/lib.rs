//! Document ingestion pipeline for DocFlow.
//!
//! This crate provides:
//! - The ingestion orchestrator that creates jobs and drives them to a
//!   terminal state through submit, poll, retry, and backoff
//! - A pure retry policy and per-job locks
//! - A stale-job reconciler and the scheduler that runs it
//! - Analysis service clients (HTTP and simulated)
//! - Job and document store seams with in-memory and PostgreSQL adapters

pub mod analysis;
pub mod locks;
pub mod orchestrator;
pub mod policy;
pub mod projector;
pub mod reconciler;
pub mod scheduler;
pub mod store;

pub use orchestrator::IngestionOrchestrator;
pub use policy::RetryPolicy;
pub use projector::DocumentStatusProjector;
pub use reconciler::{RecoveryReport, StaleJobReconciler};
pub use scheduler::IngestionScheduler;
