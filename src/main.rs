mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mf_av::{DownloadJob, JobPaths, JobRequest, PipelineOptions, ToolRegistry};
use mf_core::config::Config;
use tokio_util::sync::CancellationToken;

async fn serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    download_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = download_dir {
        config.downloads.dir = dir;
    }

    tracing::info!("Starting mediafetch server");
    mf_server::start(config, CancellationToken::new()).await?;
    Ok(())
}

async fn extract(config: &Config, url: &str) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let info = mf_av::extract::extract(&tools, url).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn download(
    mut config: Config,
    url: String,
    format: String,
    download_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(dir) = download_dir {
        config.downloads.dir = dir;
    }

    let tools = ToolRegistry::discover(&config.tools);
    let request = JobRequest::new(url, format)?;
    let paths = JobPaths::from_config(&config.downloads);
    let job = DownloadJob::new(
        request.clone(),
        paths.clone(),
        PipelineOptions::from(&config.downloads),
    );
    let id = job.id();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            on_ctrl_c.cancel();
        }
    });

    let (title, result) = tokio::join!(
        mf_av::extract::fetch_title(&tools, request.url()),
        mf_av::download_to_file(&tools, job, |event| println!("{}", event.to_wire()), Some(cancel)),
    );
    let path = result.context("download failed")?;

    if let Some(title) = title {
        if let Err(e) = paths.write_title(&id, &title).await {
            tracing::warn!(job_id = %id, "Failed to write title: {e}");
        }
    }

    println!("Saved {} as {}", path.display(), paths.download_filename(&id).await);
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. yt-dlp is required; ffmpeg enables merging and streaming.");
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Config {
    let config = Config::load_or_default(path);
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediafetch=trace,mf_av=trace,mf_server=trace,mf_core=debug,tower_http=debug".to_string()
        } else {
            "mediafetch=debug,mf_av=debug,mf_server=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            download_dir,
        } => {
            let config = load_config(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config, host, port, download_dir))
        }
        Commands::Extract { url } => {
            let config = load_config(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(extract(&config, &url))
        }
        Commands::Download {
            url,
            format,
            download_dir,
        } => {
            let config = load_config(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(download(config, url, format, download_dir))
        }
        Commands::CheckTools => check_tools(&load_config(cli.config.as_deref())),
        Commands::Version => {
            println!("mediafetch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
