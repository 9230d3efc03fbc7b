//! Core type definitions used across the DocFlow workspace.

pub mod id;

pub use id::*;
