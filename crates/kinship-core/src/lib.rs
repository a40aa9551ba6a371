//! kinship-core: Shared types, configuration, and error handling for the kinship graph.
//!
//! This crate provides the foundational types used across all kinship components:
//! - Person, parent-child edge, and union records owned by a tenant ("tree")
//! - Derived analysis types (kinship paths, duplicate candidates, predictions)
//! - Event types published after graph mutations and scans
//! - Configuration management
//! - The graph integrity error taxonomy

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::KinshipConfig;
pub use error::GraphError;
pub use types::*;
