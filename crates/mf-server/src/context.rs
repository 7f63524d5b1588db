//! Application context shared by every route handler through Axum state.

use std::sync::Arc;

use mf_av::{DownloadJob, JobPaths, JobRequest, PipelineOptions, ToolRegistry};
use mf_core::config::Config;

/// Immutable per-process state. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    /// Path derivation under the configured download directory.
    pub paths: JobPaths,
    pub pipeline: Arc<PipelineOptions>,
}

impl AppContext {
    /// Build a context, discovering tools from the config.
    pub fn new(config: Config) -> Self {
        let tools = ToolRegistry::discover(&config.tools);
        Self::with_tools(config, tools)
    }

    pub fn with_tools(config: Config, tools: ToolRegistry) -> Self {
        Self {
            paths: JobPaths::from_config(&config.downloads),
            pipeline: Arc::new(PipelineOptions::from(&config.downloads)),
            config: Arc::new(config),
            tools: Arc::new(tools),
        }
    }

    /// Mint a new download job for a validated request.
    pub fn new_job(&self, request: JobRequest) -> DownloadJob {
        DownloadJob::new(request, self.paths.clone(), (*self.pipeline).clone())
    }
}
