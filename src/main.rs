use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use petfeed::api::PostsApi;
use petfeed::config::Config;
use petfeed::feed::{FeedStore, Filters, LoadOutcome, Post};
use petfeed::util::Document;

/// Get the config directory path (~/.config/petfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("petfeed"))
}

#[derive(Parser, Debug)]
#[command(name = "petfeed", about = "Browse the pet-adoption community feed")]
struct Args {
    /// Config file (defaults to ~/.config/petfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the feed and page through it
    Feed {
        /// Maximum number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Extra query filter, e.g. --filter species=dog
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Check a CPF or CNPJ number
    Validate {
        /// Document number, with or without punctuation
        document: String,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn print_post(post: &Post) {
    let when = post
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let first_line = post.content.lines().next().unwrap_or_default();
    println!(
        "{when}  {id}  {likes:>3} likes  {comments:>3} comments  {first_line}",
        id = post.id,
        likes = post.like_count(),
        comments = post.comments.len(),
    );
}

async fn run_feed(config: &Config, pages: u32, filters: Filters) -> Result<()> {
    let api = PostsApi::from_config(config).context("Failed to create API client")?;
    let store = FeedStore::new(api, config.page_size());

    store
        .refresh(&filters)
        .await
        .context("Failed to load the first page")?;

    for _ in 1..pages {
        if !store.has_more() {
            break;
        }
        match store.load_more(&filters).await.context("Failed to load more posts")? {
            LoadOutcome::Loaded { returned, has_more } => {
                tracing::debug!(returned = returned, has_more = has_more, "Loaded page");
            }
            LoadOutcome::Skipped | LoadOutcome::Cancelled => break,
        }
    }

    let posts = store.posts();
    if posts.is_empty() {
        println!("No posts yet.");
        return Ok(());
    }
    for post in &posts {
        print_post(post);
    }
    println!(
        "{} posts{}",
        posts.len(),
        if store.has_more() { ", more available" } else { "" }
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Validate { document } => match Document::parse(&document) {
            Ok(doc) => {
                println!("{} {}: valid", doc.kind(), doc);
            }
            Err(e) => {
                eprintln!("{}: {}", document, e);
                std::process::exit(1);
            }
        },
        Command::Feed { pages, filters } => {
            let config_path = match args.config {
                Some(path) => path,
                None => get_config_dir()?.join("config.toml"),
            };
            let config = Config::load(&config_path).with_context(|| {
                format!("Failed to load config from {}", config_path.display())
            })?;
            let filters: Filters = filters.into_iter().collect();
            run_feed(&config, pages.max(1), filters).await?;
        }
    }

    Ok(())
}
