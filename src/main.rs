//! `embed-dl` CLI - resolve embed pages and download episodes

mod cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cmd::DownloadArgs;

#[derive(Parser)]
#[command(name = "embed-dl")]
#[command(about = "Resolve video-host embed pages to direct media streams")]
#[command(version)]
struct Cli {
    /// Log handler decisions and downloader progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one embed URL to a media descriptor
    Resolve {
        /// Embed page URL
        url: String,

        /// Episode page the embed was found on
        #[arg(short, long)]
        referer: Option<String>,

        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print embed URLs in handler priority order
    Rank {
        /// Candidate URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List supported hosts and mirror aliases in priority order
    Hosts,

    /// Download an episode from the first working source
    Download {
        /// Episode identifier used in messages
        #[arg(short, long)]
        episode: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Candidate embed URL (repeatable)
        #[arg(long = "site")]
        sites: Vec<String>,

        /// JSON array of {"name", "type", "url"} candidates
        #[arg(long)]
        sites_file: Option<PathBuf>,

        /// Episode page, sent to handlers that need a referer
        #[arg(short, long)]
        referer: Option<String>,

        /// Preferred source types, e.g. sub,dub
        #[arg(long, value_delimiter = ',')]
        type_order: Vec<String>,

        /// Media host to never download from (repeatable)
        #[arg(long = "forbid-cdn")]
        forbid_cdn: Vec<String>,

        /// Print the ranked candidate list as JSON and exit
        #[arg(long)]
        dump_download_sites: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Resolve { url, referer, json } => {
            cmd::cmd_resolve(&url, referer.as_deref(), json).await
        }
        Commands::Rank { urls } => {
            cmd::cmd_rank(urls)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Hosts => {
            cmd::cmd_hosts()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download {
            episode,
            output,
            sites,
            sites_file,
            referer,
            type_order,
            forbid_cdn,
            dump_download_sites,
        } => {
            cmd::cmd_download(DownloadArgs {
                episode,
                output,
                sites,
                sites_file,
                referer,
                type_order,
                forbid_cdn,
                dump_download_sites,
            })
            .await
        }
    }
}
