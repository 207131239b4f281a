use anyhow::Result;
use clap::Parser;
use fetcher::{count_occurrences, ContentFetcher, FetchConfig, ReaderFetcher};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Fetch a web page as text and report on it")]
struct Cli {
    /// Page to fetch
    #[arg(long)]
    url: String,
    /// Words to count (case-insensitive); may be repeated
    #[arg(long = "count")]
    count: Vec<String>,
    /// Request the page directly instead of through the reader service
    #[arg(long, default_value_t = false)]
    direct: bool,
    /// Request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Number of leading characters to print
    #[arg(long, default_value_t = 500)]
    preview: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let mut config = FetchConfig { timeout_secs: args.timeout_secs, ..Default::default() };
    if args.direct {
        config.reader_prefix = None;
    }
    let fetcher = ReaderFetcher::new(&config)?;
    let content = fetcher.fetch(&args.url).await?;

    println!("Content length: {} characters", content.chars().count());
    println!("\nFirst {} characters:", args.preview);
    println!("{}", content.chars().take(args.preview).collect::<String>());
    for word in &args.count {
        println!("\nThe word '{}' appears {} times on {}", word, count_occurrences(&content, word), args.url);
    }
    Ok(())
}
