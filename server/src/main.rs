use anyhow::Result;
use axum::Router;
use clap::Parser;
use docsift_core::IndexHandle;
use fetcher::{FetchConfig, ReaderFetcher};
use indexer::{download_archive, load_documents, load_index_config, DocumentSource, LoadOptions};
use server::tools::{GatewayConfig, ToolGateway};
use server::{build_app, AppState, Reloader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Zip archive, directory, or .json/.jsonl file with the documents
    #[arg(long, env = "DOCSIFT_INPUT", default_value = "main.zip")]
    input: PathBuf,
    /// Download the archive from this URL first when --input does not exist
    #[arg(long, env = "DOCSIFT_DOWNLOAD_URL")]
    download_url: Option<String>,
    /// Prefix stripped from archive entry names
    #[arg(long)]
    root_prefix: Option<String>,
    /// File suffixes to keep from archives and directories
    #[arg(long = "ext", default_values_t = [".md".to_string(), ".mdx".to_string()])]
    extensions: Vec<String>,
    /// JSON file with the index configuration
    #[arg(long, env = "DOCSIFT_INDEX_CONFIG")]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Characters of content shown per search result
    #[arg(long, default_value_t = 500)]
    excerpt_chars: usize,
    /// Upper bound on results per search
    #[arg(long, default_value_t = 100)]
    max_limit: usize,
    /// Timeout for the fetch tool, in seconds
    #[arg(long, default_value_t = 30)]
    fetch_timeout_secs: u64,
    /// Fetch pages directly instead of through the reader service
    #[arg(long, default_value_t = false)]
    direct_fetch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    if let Some(url) = &args.download_url {
        download_archive(url, &args.input).await?;
    }

    let config = load_index_config(args.config.as_deref())?;
    let source = DocumentSource::detect(&args.input, args.root_prefix.clone())?;
    let opts = LoadOptions { extensions: args.extensions.clone() };
    let docs = load_documents(&source, &opts)?;
    let index = Arc::new(IndexHandle::new(&docs, config)?);
    tracing::info!(num_docs = docs.len(), "loaded documents into search index");
    drop(docs);

    let mut fetch_config = FetchConfig { timeout_secs: args.fetch_timeout_secs, ..Default::default() };
    if args.direct_fetch {
        fetch_config.reader_prefix = None;
    }
    let fetcher = Arc::new(ReaderFetcher::new(&fetch_config)?);
    let gateway_config = GatewayConfig { excerpt_chars: args.excerpt_chars, max_limit: args.max_limit, ..Default::default() };
    let gateway = Arc::new(ToolGateway::new(index.clone(), fetcher, gateway_config));
    let reload: Reloader = Arc::new(move || load_documents(&source, &opts));

    let app: Router = build_app(AppState { index, gateway, reload: Some(reload) });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
