//! # docflow-database
//!
//! PostgreSQL connection management, embedded migrations, and concrete
//! repositories for ingestion jobs and document status.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
