//! Hondana CLI - query the bundled manga sources from the command line.
//!
//! Every command prints JSON on stdout; logs go to stderr and follow
//! `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use hondana::net::ReqwestTransport;
use hondana::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hondana", version, about = "Search and browse manga across several sources")]
struct Cli {
    /// JSON source table replacing the builtin one
    #[arg(long, global = true, env = "HONDANA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every available source, or one with --source
    Search {
        query: String,
        #[arg(long)]
        source: Option<String>,
        /// Genre display name, repeatable
        #[arg(long = "genre")]
        genres: Vec<String>,
        #[arg(long)]
        status: Option<StatusArg>,
        #[arg(long)]
        sort: Option<SortArg>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Recently updated series
    Latest {
        #[arg(long)]
        source: Option<String>,
    },
    /// Series details and chapters for a `source:id` reference or URL
    Details { reference: String },
    /// Page image URLs of a chapter
    Images { reference: String },
    /// Health table of the configured sources
    Sources,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl From<StatusArg> for MangaStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Ongoing => MangaStatus::Ongoing,
            StatusArg::Completed => MangaStatus::Completed,
            StatusArg::Hiatus => MangaStatus::Hiatus,
            StatusArg::Cancelled => MangaStatus::Cancelled,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Relevance,
    Latest,
    Popular,
    Rating,
    Title,
    New,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Relevance => SortOrder::Relevance,
            SortArg::Latest => SortOrder::LatestUpdate,
            SortArg::Popular => SortOrder::Popular,
            SortArg::Rating => SortOrder::Rating,
            SortArg::Title => SortOrder::Title,
            SortArg::New => SortOrder::NewlyAdded,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> hondana::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> hondana::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::builtin(),
    };
    let transport = Arc::new(ReqwestTransport::new()?);
    let aggregator = Aggregator::from_config(&config, transport);

    match cli.command {
        Command::Search {
            query,
            source,
            genres,
            status,
            sort,
            page,
        } => {
            let filters = SearchFilters {
                genres,
                status: status.map(Into::into),
                sort: sort.map(Into::into),
                word: None,
                page,
            };
            let results = aggregator
                .search(&query, source.as_deref(), &filters)
                .await;
            print_json(&results)?;
        }
        Command::Latest { source } => {
            print_json(&aggregator.latest_releases(source.as_deref()).await)?;
        }
        Command::Details { reference } => match aggregator.manga_details(&reference).await {
            Some(details) => print_json(&details)?,
            None => {
                return Err(hondana::Error::not_found(format!("Manga: {}", reference)));
            }
        },
        Command::Images { reference } => {
            print_json(&aggregator.chapter_images(&reference).await)?;
        }
        Command::Sources => {
            print_json(&aggregator.health_report())?;
        }
    }

    Ok(())
}
