use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docsift_core::{Index, Query};
use indexer::{download_archive, load_documents, load_index_config, DocumentSource, LoadOptions, FILENAME_FIELD};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_ARCHIVE_URL: &str = "https://github.com/jlowin/fastmcp/archive/refs/heads/main.zip";

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load documents and query an in-memory TF-IDF index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Zip archive, directory, or .json/.jsonl file to load
    #[arg(long)]
    input: PathBuf,
    /// Prefix stripped from archive entry names (defaults to the shared top-level directory)
    #[arg(long)]
    root_prefix: Option<String>,
    /// File suffixes to keep from archives and directories
    #[arg(long = "ext", default_values_t = [".md".to_string(), ".mdx".to_string()])]
    extensions: Vec<String>,
    /// JSON file with the index configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a source archive unless it already exists
    Download {
        #[arg(long, default_value = DEFAULT_ARCHIVE_URL)]
        url: String,
        #[arg(long, default_value = "main.zip")]
        output: PathBuf,
    },
    /// Build the index and print its statistics as JSON
    Stats {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Build the index and run one query against it
    Search {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = docsift_core::DEFAULT_LIMIT)]
        limit: usize,
        /// Keyword filter as field=value; may be repeated
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected field=value, got `{s}`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download { url, output } => {
            download_archive(&url, &output).await?;
            Ok(())
        }
        Commands::Stats { source } => {
            let index = build_from(&source)?;
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
            Ok(())
        }
        Commands::Search { source, query, limit, filters } => {
            let index = build_from(&source)?;
            println!("Loaded {} documents.", index.num_docs());
            let mut q = Query::new(query.clone()).limit(limit);
            for (field, value) in filters {
                q = q.filter(field, value);
            }
            println!("Search results for '{query}':");
            for hit in index.search(&q) {
                let name = index.document(hit.doc_id).and_then(|d| d.get(FILENAME_FIELD)).unwrap_or("?");
                println!("- {name} ({:.4})", hit.score);
            }
            Ok(())
        }
    }
}

fn build_from(args: &SourceArgs) -> Result<Index> {
    let config = load_index_config(args.config.as_deref())?;
    let source = DocumentSource::detect(&args.input, args.root_prefix.clone())?;
    let docs = load_documents(&source, &LoadOptions { extensions: args.extensions.clone() })?;
    Ok(Index::build(&docs, &config)?)
}
