//! fanout command-line entry point.
//!
//! Runs one batch and prints the result as JSON on stdout.
//! Logging goes to stderr so the output stays machine-readable.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use fanout_client::BatchFetcher;
use fanout_core::FetcherConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fanout", version, about = "Fetch many resources concurrently")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every distinct URL and print a URL-keyed JSON object
    Get {
        /// URLs to fetch
        #[arg(required = true)]
        urls: Vec<String>,

        /// Re-interpret each payload as JSON
        #[arg(long)]
        json: bool,

        /// Keep entries whose payload is empty
        #[arg(long)]
        keep_empty: bool,

        /// Payload reported for failed fetches
        #[arg(long)]
        default_value: Option<String>,
    },

    /// Fetch one URL once per identity and print ordered [identity, payload] pairs
    Identities {
        url: String,

        /// Client identity (User-Agent), repeatable
        #[arg(long = "identity", short = 'i')]
        identities: Vec<String>,

        /// Render pages with headless Chrome/Chromium
        #[cfg(feature = "render")]
        #[arg(long)]
        headless: bool,
    },
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Args)]
struct Overrides {
    /// Per-target deadline in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Maximum concurrent fetches
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Extra request header as NAME:VALUE, repeatable
    #[arg(long = "header", short = 'H', global = true)]
    headers: Vec<String>,
}

impl Overrides {
    fn apply(self, config: &mut FetcherConfig) -> Result<()> {
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(pool_size) = self.pool_size {
            config.pool_size = pool_size;
        }
        for header in self.headers {
            let Some((name, value)) = header.split_once(':') else {
                bail!("header {header:?} is not NAME:VALUE");
            };
            config.headers.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = FetcherConfig::load().context("failed to load configuration")?;
    cli.overrides.apply(&mut config)?;

    let mut builder = BatchFetcher::builder();
    if let Some(cache) = config.open_cache().await.context("failed to open cache")? {
        builder = builder.cache(cache);
    }

    let output = match cli.command {
        Command::Get { urls, json, keep_empty, default_value } => {
            config.treat_results_as_json |= json;
            config.filter_out_empty_responses &= !keep_empty;
            if let Some(default_value) = default_value {
                config.default_value = default_value;
            }

            let fetcher = builder.config(config).build()?;
            tracing::info!("fetching {} targets", urls.len());
            serde_json::to_value(fetcher.fetch_all(urls.as_slice()).await)?
        }
        Command::Identities {
            url,
            identities,
            #[cfg(feature = "render")]
            headless,
        } => {
            #[cfg(feature = "render")]
            let builder = if headless {
                let renderer = fanout_client::HeadlessRenderer::new((1280, 720))
                    .await
                    .context("failed to launch headless browser")?;
                builder.renderer(std::sync::Arc::new(renderer))
            } else {
                builder
            };

            let fetcher = builder.config(config).build()?;
            tracing::info!("fetching {} under {} identities", url, identities.len().max(1));
            serde_json::to_value(fetcher.fetch_identities(&url, identities.as_slice()).await)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
