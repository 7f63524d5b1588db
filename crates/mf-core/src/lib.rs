//! mf-core: shared types, IDs, errors, configuration, and the job event protocol.
//!
//! This crate is the foundational dependency for the other mf-* crates,
//! providing the typed job identifier, a unified error type, application
//! configuration, the download event vocabulary with its emitter state
//! machine, and the format-normalization schemas served by `/api/extract`.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{DownloadError, Error, Result};
pub use ids::*;
