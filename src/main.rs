//! clipfetch - web front-end for yt-dlp
//!
//! Accepts media URLs, downloads them through yt-dlp, caches results by
//! source URL, and returns a single file or a zip bundle.

mod cache;
mod config;
mod engine;
mod package;
mod server;
mod service;

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cache::{CacheStore, JsonFileStore};
use config::Config;
use engine::{Downloader, YtDlpEngine};
use server::{AppState, HttpServer};
use service::{BatchRequest, FetchService};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Resolve one batch from the command line
    Fetch {
        urls: Vec<String>,
        quality: String,
        audio_only: bool,
    },
    /// List cache entries
    Cache,
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"clipfetch - fetch media through yt-dlp with a URL cache

USAGE:
    clipfetch [serve] [OPTIONS]
    clipfetch fetch [OPTIONS] [--audio] [--quality <height>] <url>...
    clipfetch cache [OPTIONS]
    clipfetch help

COMMANDS:
    serve   Run the web server (default)
    fetch   Download URLs through the cache and print the resulting paths
    cache   List cached URLs; entries whose file is gone are marked stale
    help    Show this help message

OPTIONS:
    --bind <addr>       Listen address or bare port (default 127.0.0.1:8000)
    --data-dir <dir>    Holds cache.json, downloads/ and cookies.txt
    --yt-dlp <path>     yt-dlp executable (default: yt-dlp on PATH)
    --merge-format <c>  Container for merged video, e.g. mp4 or mkv

ENVIRONMENT:
    RUST_LOG    Log filter (trace, debug, info, warn, error)

NOTE:
    If <data-dir>/cookies.txt exists it is passed to yt-dlp for
    authenticated sources.
"#
    );
}

fn parse_args(args: &[String]) -> Result<(Command, Config)> {
    let mut config = Config::default();
    let mut rest = args.iter().skip(1).peekable();

    let command_name = match rest.peek() {
        Some(name) if !name.starts_with("--") => {
            let name = name.to_string();
            rest.next();
            name
        }
        _ => "serve".to_string(),
    };

    let mut urls = Vec::new();
    let mut quality = "1080".to_string();
    let mut audio_only = false;

    while let Some(arg) = rest.next() {
        let mut value = |flag: &str| {
            rest.next()
                .cloned()
                .ok_or_else(|| anyhow!("Missing value for {}", flag))
        };
        match arg.as_str() {
            "--bind" => config.bind = config::parse_bind(&value("--bind")?)?,
            "--data-dir" => config.data_dir = PathBuf::from(value("--data-dir")?),
            "--yt-dlp" => config.ytdlp_program = PathBuf::from(value("--yt-dlp")?),
            "--merge-format" => config.merge_output_format = Some(value("--merge-format")?),
            "--quality" => quality = value("--quality")?,
            "--audio" => audio_only = true,
            "--help" | "-h" => return Ok((Command::Help, config)),
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown option: {}", flag)),
            url => urls.push(url.to_string()),
        }
    }

    let command = match command_name.as_str() {
        "serve" => Command::Serve,
        "fetch" => {
            if urls.is_empty() {
                return Err(anyhow!("Usage: clipfetch fetch [--audio] [--quality <height>] <url>..."));
            }
            Command::Fetch {
                urls,
                quality,
                audio_only,
            }
        }
        "cache" => Command::Cache,
        "help" | "-h" => Command::Help,
        other => {
            eprintln!("Unknown command: {}", other);
            Command::Help
        }
    };

    Ok((command, config))
}

/// Wire the cache, engine and downloader for `config`
fn build_service(config: &Config) -> Result<FetchService> {
    config.prepare()?;

    let store = JsonFileStore::open(config.cache_file())
        .with_context(|| format!("Failed to open cache {:?}", config.cache_file()))?;
    let mut engine = YtDlpEngine::new(&config.ytdlp_program);
    if let Some(container) = &config.merge_output_format {
        engine = engine.with_merge_output_format(container.as_str());
    }
    let downloader = Downloader::new(Arc::new(engine), config.downloads_dir())
        .with_cookies_file(config.cookies_file());

    Ok(FetchService::new(Arc::new(store), downloader))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command
    let args: Vec<String> = env::args().collect();
    let (command, config) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::Serve => {
            info!(data_dir = %config.data_dir.display(), "Starting clipfetch server");

            let service = build_service(&config)?;
            let state = AppState {
                service,
                bundle_dir: config.downloads_dir(),
            };

            let mut server = HttpServer::new(state);
            if let Err(e) = server.start(config.bind).await {
                error!(error = %e, "Failed to start HTTP server");
                return Err(e);
            }

            // Wait for Ctrl+C
            server
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!(error = %e, "Failed to listen for shutdown signal");
                    }
                    info!("Received shutdown signal");
                })
                .await?;

            info!("Shutdown complete.");
        }
        Command::Fetch {
            urls,
            quality,
            audio_only,
        } => {
            let service = build_service(&config)?;
            let batch = BatchRequest {
                urls: urls.join("\n"),
                quality,
                audio_only,
            };

            let outcome = service.resolve_batch(&batch).await?;
            for path in &outcome.files {
                println!("{}", path.display());
            }
            eprintln!(
                "{} file(s): {} from cache, {} downloaded",
                outcome.files.len(),
                outcome.hits,
                outcome.downloads
            );
        }
        Command::Cache => {
            let store = JsonFileStore::open(config.cache_file())?;
            let snapshot = store.load()?;
            if snapshot.is_empty() {
                println!("Cache is empty.");
            } else {
                println!("Cached URLs ({}):", store.path().display());
                for (url, path) in snapshot.iter() {
                    let marker = if path.exists() { "" } else { " (stale)" };
                    println!("  {} -> {}{}", url, path.display(), marker);
                }
            }
        }
        Command::Help => {
            print_help();
        }
    }

    Ok(())
}
