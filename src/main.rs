//! rustgsprofile - Google Scholar profile extractor
//!
//! Extracts every record of a Scholar profile listing, resolves truncated
//! author lists from the detail pages and exports `scholar_papers.csv`.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! rustgsprofile extract --user XXXXXXXXXXXX --select 1-10
//! rustgsprofile extract --file saved_profile.html --strategy view
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! rustgsprofile serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use rustgsprofile::{
    coordinator::Strategy,
    export,
    extractor::SessionOptions,
    http::{build_profile_url, FetchOptions, DEFAULT_SCHOLAR_URL},
    pipeline::{self, ListingSource, PipelineOptions},
    presenter, Record,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar profile extractor
#[derive(Parser)]
#[command(name = "rustgsprofile")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one profile listing and export it as CSV
    Extract {
        /// Scholar user id (the `user=` parameter of a profile URL)
        #[arg(long, group = "source")]
        user: Option<String>,

        /// Full profile URL
        #[arg(long, group = "source")]
        url: Option<String>,

        /// Saved profile HTML file
        #[arg(long, group = "source")]
        file: Option<PathBuf>,

        /// Base URL for relative links in --file
        #[arg(long)]
        base_url: Option<String>,

        /// Records to export, 1-based (e.g., "1,3-5"); default all
        #[arg(long)]
        select: Option<String>,

        /// Output directory (default: the download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print records as JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Options shared by both modes
#[derive(Args, Clone)]
struct RunArgs {
    /// How to read full author lists from detail pages
    #[arg(long, value_enum, default_value_t = Strategy::Fetch)]
    strategy: Strategy,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Mirror site URL
    #[arg(long)]
    mirror: Option<String>,

    /// Interface language (hl parameter)
    #[arg(long, default_value = "en")]
    lang: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Give up on one detail page after this many seconds
    #[arg(long)]
    resolve_timeout_secs: Option<u64>,

    /// Fixed pause between records in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,
}

impl RunArgs {
    fn base_url(&self) -> String {
        self.mirror
            .as_deref()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string())
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            fetch: FetchOptions {
                proxy: self.proxy.clone(),
                timeout: Duration::from_secs(self.timeout_secs),
                lang: self.lang.clone(),
            },
            session: SessionOptions {
                pacing: self.pacing_ms.map(Duration::from_millis),
                resolve_timeout: self.resolve_timeout_secs.map(Duration::from_secs),
            },
            strategy: self.strategy,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Extract {
            user,
            url,
            file,
            base_url,
            select,
            output,
            json,
            run,
        } => {
            let source = listing_source(user, url, file, base_url, &run)?;
            run_extract(source, select, output, json, &run).await
        }
        Commands::Serve { port, host, run } => run_server(host, port, run).await,
    }
}

fn listing_source(
    user: Option<String>,
    url: Option<String>,
    file: Option<PathBuf>,
    base_url: Option<String>,
    run: &RunArgs,
) -> Result<ListingSource> {
    match (user, url, file) {
        (Some(user), _, _) => Ok(ListingSource::Url(build_profile_url(
            &run.base_url(),
            &user,
            &run.lang,
        )?)),
        (_, Some(url), _) => Ok(ListingSource::Url(
            Url::parse(&url).context("Invalid --url")?,
        )),
        (_, _, Some(path)) => {
            let base = base_url
                .map(|b| Url::parse(&b))
                .transpose()
                .context("Invalid --base-url")?;
            Ok(ListingSource::File { path, base })
        }
        _ => anyhow::bail!("One of --user, --url or --file is required"),
    }
}

// ============================================================================
// Extract Pipeline
// ============================================================================

async fn run_extract(
    source: ListingSource,
    select: Option<String>,
    output: Option<PathBuf>,
    json: bool,
    run: &RunArgs,
) -> Result<()> {
    let options = run.pipeline_options();

    println!("\n--- Extracting profile listing ---");
    let records = pipeline::run(source, &options, |line| {
        println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
    })
    .await
    .context("Extraction failed")?;

    if records.is_empty() {
        println!("未找到论文信息");
    } else if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", presenter::render(&records));
    }

    println!("\n--- Export ---");
    let indices = match select {
        Some(selection) => presenter::parse_selection(&selection, records.len())?,
        None => (0..records.len()).collect(),
    };
    let selected = presenter::select(&records, &indices)?;

    let dir = output.unwrap_or_else(export::default_export_dir);
    let path = export::export_to_dir(&selected, &dir).context("导出失败")?;

    println!("Saved {} of {} records: {}", selected.len(), records.len(), path.display());
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16, run: RunArgs) -> Result<()> {
    info!(host = %host, port = port, strategy = ?run.strategy, "Starting HTTP server");

    let app_state = Arc::new(AppState {
        options: run.pipeline_options(),
        base_url: run.base_url(),
        lang: run.lang.clone(),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/papers", post(papers_handler))
        .route("/export", post(export_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    options: PipelineOptions,
    base_url: String,
    lang: String,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Extraction request body
#[derive(Debug, Deserialize)]
struct PapersRequest {
    url: Option<String>,
    user: Option<String>,
    strategy: Option<Strategy>,
}

/// Extraction response
#[derive(Debug, Serialize)]
struct PapersResponse {
    status: String,
    count: usize,
    data: Vec<Record>,
}

impl PapersResponse {
    fn error(message: impl std::fmt::Display) -> Self {
        Self {
            status: format!("error: {}", message),
            count: 0,
            data: vec![],
        }
    }
}

/// Extraction endpoint handler
async fn papers_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PapersRequest>,
) -> Json<PapersResponse> {
    info!(url = ?req.url, user = ?req.user, "Papers request");

    let source = match (&req.user, &req.url) {
        (Some(user), _) => build_profile_url(&state.base_url, user, &state.lang).map(ListingSource::Url),
        (_, Some(url)) => Url::parse(url)
            .map(ListingSource::Url)
            .map_err(|e| rustgsprofile::ScholarError::Config(format!("Invalid url: {}", e))),
        _ => Err(rustgsprofile::ScholarError::Config(
            "one of url or user is required".to_string(),
        )),
    };
    let source = match source {
        Ok(source) => source,
        Err(e) => return Json(PapersResponse::error(e)),
    };

    let mut options = state.options.clone();
    if let Some(strategy) = req.strategy {
        options.strategy = strategy;
    }

    match pipeline::run(source, &options, |line| info!(progress = line)).await {
        Ok(data) => Json(PapersResponse {
            status: "success".to_string(),
            count: data.len(),
            data,
        }),
        Err(e) => {
            error!(error = %e, "Extraction failed");
            Json(PapersResponse::error(e))
        }
    }
}

/// Export request body; `selected` holds 0-based indices into `records`
#[derive(Debug, Deserialize)]
struct ExportRequest {
    records: Vec<Record>,
    #[serde(default)]
    selected: Vec<usize>,
}

/// CSV download endpoint handler
async fn export_handler(Json(req): Json<ExportRequest>) -> Response {
    let csv = presenter::select(&req.records, &req.selected).and_then(|rows| export::to_csv_bytes(&rows));

    match csv {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export::EXPORT_FILENAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
