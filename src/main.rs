use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use curator::config::Config;
use curator::db::models::{
    ContentFilter, ContentItem, ContentKind, ContentStatus, Counter, GroupKey, OrderBy, PageQuery,
    VoteKind,
};
use curator::db::CounterStore;
use curator::engine::recompute::RecomputeJob;
use curator::engine::ContentEngine;
use curator::output::terminal;

/// Curator: content quality scoring and ranking.
///
/// Keeps engagement counters for posts, comments and replies, turns them
/// into a decayed quality score and ranks content by it.
#[derive(Parser)]
#[command(name = "curator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize (or migrate) the database
    Init,

    /// Create a content item with zero counters
    Create {
        /// post, comment or reply
        kind: ContentKind,
        id: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        group: Option<String>,

        /// Body length in characters
        #[arg(long, default_value = "0")]
        length: i64,

        #[arg(long)]
        featured: bool,

        /// Number of tags
        #[arg(long, default_value = "0")]
        tags: i64,

        /// Initial status (draft, published, hidden, deleted)
        #[arg(long, default_value = "published")]
        status: ContentStatus,
    },

    /// Apply a delta to one counter (yes-votes / no-votes also move votes)
    Bump {
        kind: ContentKind,
        id: String,
        /// views, likes, comments, bookmarks, shares, ratings, abuse-reports, yes-votes, no-votes
        counter: Counter,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Record a rating between 0 and 5
    Rate {
        kind: ContentKind,
        id: String,
        value: f64,
    },

    /// Show the per-signal breakdown and quality of one item
    Score {
        kind: ContentKind,
        id: String,

        /// Write the computed quality back to the store
        #[arg(long)]
        persist: bool,
    },

    /// Recompute and persist quality for every item of a kind
    Recompute {
        kind: ContentKind,

        #[arg(long, default_value = "200")]
        page_size: u32,

        /// Items recomputed in parallel (default: 8)
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },

    /// List items ordered by quality or a counter
    Rank {
        kind: ContentKind,

        /// quality, created, modified or a counter name
        #[arg(long, default_value = "quality")]
        order_by: OrderBy,

        /// Ascending order (default is descending)
        #[arg(long)]
        asc: bool,

        #[arg(long, default_value = "0")]
        skip: u32,

        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        status: Option<ContentStatus>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Count items grouped by parent, user or group
    Counts {
        kind: ContentKind,

        /// parent, user or group
        #[arg(long)]
        by: GroupKey,

        /// Keys to count; none means every key present
        keys: Vec<String>,

        #[arg(long)]
        status: Option<ContentStatus>,
    },

    /// Show system status (item counts, vote consistency, last recompute)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("curator=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Curator database...");
            init_database(&config).await?;
            if config.uses_postgres() {
                println!("PostgreSQL database migrated.");
            } else {
                println!("Database initialized at: {}", config.db_path);
            }
            println!("\nNext step: create content with `curator create post <id> --author <user>`");
        }

        Commands::Create {
            kind,
            id,
            author,
            parent,
            group,
            length,
            featured,
            tags,
            status,
        } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            let mut item = ContentItem::new(id, kind, author, Utc::now());
            item.parent_id = parent;
            item.group_id = group;
            item.content_length = length;
            item.featured = featured;
            item.tags_count = tags;
            item.status = status;
            engine.create(&item).await?;
            println!("Created {} {}", kind, item.id.bold());
        }

        Commands::Bump {
            kind,
            id,
            counter,
            delta,
        } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            engine.get(&id).await?;
            match counter {
                Counter::YesVotes | Counter::NoVotes => {
                    let vote = if counter == Counter::YesVotes {
                        VoteKind::Yes
                    } else {
                        VoteKind::No
                    };
                    let (votes, side) = engine.increment_votes_count(&id, vote, delta).await?;
                    println!("{id}: votes = {votes}, {counter} = {side}");
                }
                other => {
                    let value = engine.counters().increment_counter(&id, other, delta).await?;
                    println!("{id}: {other} = {value}");
                }
            }
        }

        Commands::Rate { kind, id, value } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            engine.get(&id).await?;
            let (count, average) = engine.add_rating(&id, value).await?;
            println!("{id}: {count} rating(s), average {average:.2}");
        }

        Commands::Score { kind, id, persist } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            let half_life = config.half_life_days(kind);
            let item = engine.get(&id).await?;
            let breakdown = engine.explain_content_quality(&item, &config.weights, half_life, Utc::now())?;
            terminal::display_breakdown(&item, &breakdown, half_life);

            if persist {
                let saved = engine.update_content_quality(&id, breakdown.quality).await?;
                println!(
                    "\n{} quality {:.4} (version {})",
                    "Saved".green().bold(),
                    saved.content_quality,
                    saved.version
                );
            }
        }

        Commands::Recompute {
            kind,
            page_size,
            concurrency,
        } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            let job = RecomputeJob {
                engine: &engine,
                weights: &config.weights,
                half_life_days: config.half_life_days(kind),
                page_size,
                concurrency,
            };
            let summary = job.run(Utc::now()).await?;
            terminal::display_recompute_summary(kind, &summary);
        }

        Commands::Rank {
            kind,
            order_by,
            asc,
            skip,
            limit,
            parent,
            author,
            group,
            status,
            json,
        } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            let query = PageQuery {
                filter: ContentFilter {
                    status,
                    parent_id: parent,
                    author_id: author,
                    group_id: group,
                    ..ContentFilter::for_kind(kind)
                },
                order_by,
                descending: !asc,
                skip,
                limit,
            };
            let items = engine.find_by_score(query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                terminal::display_ranking(kind, &items, skip);
            }
        }

        Commands::Counts {
            kind,
            by,
            keys,
            status,
        } => {
            let store = open_database(&config).await?;
            let engine = ContentEngine::new(kind, store);
            let counts = match by {
                _ if keys.is_empty() => {
                    let filter = ContentFilter {
                        status,
                        ..ContentFilter::for_kind(kind)
                    };
                    engine.counters().count_by_all(by, &filter).await?
                }
                GroupKey::Parent => engine.get_counts_by_parents(&keys, status).await?,
                GroupKey::User => engine.get_counts_by_users(&keys, status).await?,
                GroupKey::Group => engine.get_counts_by_groups(&keys, status).await?,
            };
            let label = match by {
                GroupKey::Parent => "parent",
                GroupKey::User => "user",
                GroupKey::Group => "group",
            };
            terminal::display_counts(label, &counts);
        }

        Commands::Status => {
            if config.uses_postgres() {
                let store = open_database(&config).await?;
                curator::status::show(&store, None).await?;
            } else if !std::path::Path::new(&config.db_path).exists() {
                println!("Database: not initialized");
                println!("\nRun `curator init` to set up the database.");
            } else {
                let store = open_database(&config).await?;
                curator::status::show(&store, Some(&config.db_path)).await?;
            }
        }
    }

    Ok(())
}

/// Create (or migrate) the configured database.
async fn init_database(config: &Config) -> Result<Arc<dyn CounterStore>> {
    if config.uses_postgres() {
        return connect_postgres(config).await;
    }
    #[cfg(feature = "sqlite")]
    {
        let conn = curator::db::initialize(&config.db_path)?;
        let store = curator::db::sqlite::SqliteStore::new(conn);
        info!(tables = store.table_count().await?, "SQLite schema ready");
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No DATABASE_URL set and the 'sqlite' feature is not compiled in.");
}

/// Open the configured database; SQLite must already exist.
async fn open_database(config: &Config) -> Result<Arc<dyn CounterStore>> {
    if config.uses_postgres() {
        return connect_postgres(config).await;
    }
    #[cfg(feature = "sqlite")]
    {
        let conn = curator::db::open(&config.db_path)?;
        return Ok(Arc::new(curator::db::sqlite::SqliteStore::new(conn)));
    }
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No DATABASE_URL set and the 'sqlite' feature is not compiled in.");
}

#[allow(unused_variables)]
async fn connect_postgres(config: &Config) -> Result<Arc<dyn CounterStore>> {
    #[cfg(feature = "postgres")]
    {
        let url = config.database_url.as_deref().unwrap_or_default();
        info!("Using PostgreSQL backend");
        let store = curator::db::postgres::PgStore::connect(url).await?;
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "postgres"))]
    anyhow::bail!(
        "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
         Rebuild with: cargo build --features postgres"
    );
}
