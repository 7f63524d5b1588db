//! Route handlers for the HTTP API.

pub mod download;
pub mod extract;
pub mod files;
pub mod health;
pub mod progress;
pub mod stream;
pub mod tools;

use serde::Deserialize;

/// Query parameters shared by the download, progress, and stream routes.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub url: String,
    pub format_id: String,
}
