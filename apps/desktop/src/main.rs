use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{BreachDataSource, BreachQueryEngine, HttpBreachSource, PagedSource, QueryState};
use futures::StreamExt;
use shared::domain::FilterMode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod controller;
mod render;
mod settings;

use controller::{dispatch_intent, parse_intent, Intent, HELP};
use render::{render_state, MAX_ROWS};
use settings::{load_settings, normalize_page_size, Settings};

#[derive(Parser, Debug)]
#[command(about = "Browse publicly disclosed data breaches")]
struct Args {
    /// Breach list endpoint (JSON array of breaches)
    #[arg(long)]
    endpoint: Option<String>,
    /// Load the list in pages of this size; 0 loads everything at once
    #[arg(long)]
    page_size: Option<usize>,
    /// Settings file (defaults to ./breaches.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Initial search text
    #[arg(long)]
    search: Option<String>,
    /// Initial filter: all, verified or unverified
    #[arg(long)]
    filter: Option<FilterMode>,
    /// Maximum rows printed per update
    #[arg(long, default_value_t = MAX_ROWS)]
    rows: usize,
}

fn build_source(settings: &Settings) -> Result<Arc<dyn BreachDataSource>> {
    let http = HttpBreachSource::with_user_agent(&settings.endpoint, &settings.user_agent)
        .context("failed to configure breach source")?;
    let source: Arc<dyn BreachDataSource> = match settings.page_size {
        Some(page_size) => Arc::new(
            PagedSource::new(http, page_size).context("failed to configure paging")?,
        ),
        None => Arc::new(http),
    };
    Ok(source)
}

async fn render_updates(rx: tokio::sync::watch::Receiver<QueryState>, rows: usize) {
    let mut updates = WatchStream::new(rx);
    while let Some(state) = updates.next().await {
        println!("{}", render_state(&state, rows));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = normalize_page_size(page_size);
    }
    info!(
        endpoint = %settings.endpoint,
        page_size = settings.page_size,
        "starting breach browser"
    );

    let engine = BreachQueryEngine::new(build_source(&settings)?);
    if let Some(search) = args.search {
        engine.set_search_query(search);
    }
    if let Some(filter) = args.filter {
        engine.set_filter_mode(filter);
    }

    let renderer = tokio::spawn(render_updates(engine.subscribe(), args.rows));
    let _ = engine.load();
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read command from stdin")?
    {
        match parse_intent(&line) {
            Ok(Intent::Quit) => break,
            Ok(intent) => {
                if let Some(message) = dispatch_intent(&engine, intent) {
                    println!("{message}");
                }
            }
            Err(message) => println!("{message}"),
        }
    }

    renderer.abort();
    Ok(())
}
