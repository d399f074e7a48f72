//! Curio CLI - save posts and explore the knowledge graph

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use curio_core::config::Config;
use curio_core::domain::collection::{Collection, CollectionRepository};
use curio_core::domain::knowledge::{
    EntityExtractor, ExtractionPipeline, GraphQueryService,
};
use curio_core::domain::post::{
    Post, PostFilters, PostRepository, bulk_import,
};
use curio_core::domain::search::SearchService;
use curio_core::infrastructure::collection::SqliteCollectionRepository;
use curio_core::infrastructure::knowledge::SqliteKnowledgeRepository;
use curio_core::infrastructure::post::SqlitePostRepository;
use curio_core::llm::LlmClient;
use curio_core::storage::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "curio")]
#[command(author, version, about = "Save posts and explore your knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User id owning the data (single-user installs keep the default)
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Database file path (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a post
    Add {
        /// Post text
        content: String,
        /// URL the post was saved from
        #[arg(long)]
        url: Option<String>,
        /// Author name
        #[arg(long)]
        author: Option<String>,
        /// Short summary
        #[arg(long)]
        summary: Option<String>,
        /// Source platform
        #[arg(long, default_value = "linkedin")]
        platform: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Skip entity extraction for this post
        #[arg(long)]
        no_analyze: bool,
    },

    /// Manage saved posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Import posts from a JSON export file
    Import {
        /// Path to a JSON array of posts
        file: PathBuf,
    },

    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Run entity extraction over posts not yet processed
    Analyze,

    /// Dump the knowledge graph as JSON
    Graph,

    /// Show one entity with its posts and neighbors
    Entity {
        /// Entity id
        id: String,
    },

    /// Show knowledge graph statistics
    Stats,

    /// Ask a question answered from your saved posts
    Ask {
        /// The question
        question: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum PostAction {
    /// List posts
    List {
        /// Substring match against content, summary, or author
        #[arg(short, long)]
        search: Option<String>,
        /// Only posts carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Maximum rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show post details
    Show { id: String },
    /// Delete a post
    Delete { id: String },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create a collection
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List collections with post counts
    List,
    /// Add a post to a collection
    AddPost {
        collection_id: String,
        post_id: String,
    },
    /// Remove a post from a collection
    RemovePost {
        collection_id: String,
        post_id: String,
    },
    /// List posts in a collection
    Posts { collection_id: String },
    /// Delete a collection
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("curio=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let open_db = || async {
        match &cli.db {
            Some(path) => Database::new(DatabaseConfig::with_path(path.clone())).await,
            None => Database::default().await,
        }
    };

    match &cli.command {
        Commands::Add {
            content,
            url,
            author,
            summary,
            platform,
            tags,
            no_analyze,
        } => {
            let db = open_db().await?;
            cmd_add(
                &db,
                &cli.user,
                content,
                url.as_deref(),
                author.as_deref(),
                summary.as_deref(),
                platform,
                tags.as_deref(),
                *no_analyze,
                cli.quiet,
            )
            .await
        }

        Commands::Post { action } => {
            let db = open_db().await?;
            cmd_post(&db, &cli.user, action, cli.quiet).await
        }

        Commands::Import { file } => {
            let db = open_db().await?;
            cmd_import(&db, &cli.user, file, cli.quiet).await
        }

        Commands::Collection { action } => {
            let db = open_db().await?;
            cmd_collection(&db, &cli.user, action, cli.quiet).await
        }

        Commands::Analyze => {
            let db = open_db().await?;
            cmd_analyze(&db, &cli.user, cli.quiet).await
        }

        Commands::Graph => {
            let db = open_db().await?;
            cmd_graph(&db, &cli.user).await
        }

        Commands::Entity { id } => {
            let db = open_db().await?;
            cmd_entity(&db, &cli.user, id).await
        }

        Commands::Stats => {
            let db = open_db().await?;
            cmd_stats(&db, &cli.user).await
        }

        Commands::Ask { question } => {
            let db = open_db().await?;
            cmd_ask(&db, &cli.user, question, cli.quiet).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor => {
            let db = open_db().await?;
            cmd_doctor(&db, cli.quiet).await
        }
    }
}

// ============================================================================
// Wiring helpers
// ============================================================================

fn post_repo(db: &Database) -> Arc<SqlitePostRepository> {
    Arc::new(SqlitePostRepository::new(db.pool().clone()))
}

fn knowledge_repo(db: &Database) -> Arc<SqliteKnowledgeRepository> {
    Arc::new(SqliteKnowledgeRepository::new(db.pool().clone()))
}

fn llm_client() -> anyhow::Result<Arc<LlmClient>> {
    let config = Config::load()?;
    let api_key = config.llm.resolved_api_key()?.ok_or_else(|| {
        anyhow::anyhow!(
            "No API key found. Set the CURIO_API_KEY or OPENAI_API_KEY environment variable."
        )
    })?;
    Ok(Arc::new(LlmClient::new(config.llm, api_key)?))
}

fn extraction_pipeline(
    db: &Database,
) -> anyhow::Result<ExtractionPipeline<SqliteKnowledgeRepository, SqlitePostRepository>> {
    let llm = llm_client()?;
    Ok(ExtractionPipeline::new(
        EntityExtractor::new(llm),
        knowledge_repo(db),
        post_repo(db),
    ))
}

fn graph_queries(
    db: &Database,
) -> GraphQueryService<SqliteKnowledgeRepository, SqlitePostRepository> {
    GraphQueryService::new(knowledge_repo(db), post_repo(db))
}

fn parse_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ============================================================================
// Command implementations
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn cmd_add(
    db: &Database,
    user: &str,
    content: &str,
    url: Option<&str>,
    author: Option<&str>,
    summary: Option<&str>,
    platform: &str,
    tags: Option<&str>,
    no_analyze: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let posts = post_repo(db);

    if let Some(url) = url
        && posts.find_by_url(user, url).await?.is_some()
    {
        return Err(
            curio_core::Error::InvalidInput(format!("a post with URL '{}' is already saved", url))
                .into(),
        );
    }

    let mut post = Post::new(user, content)
        .with_platform(platform)
        .with_tags(parse_tags(tags));
    if let Some(url) = url {
        post = post.with_original_url(url);
    }
    if let Some(author) = author {
        post = post.with_author_name(author);
    }
    if let Some(summary) = summary {
        post = post.with_summary(summary);
    }

    posts.save(&post).await?;

    if !quiet {
        println!("Post saved.");
        println!("  ID: {}", post.id);
    }

    if no_analyze {
        return Ok(());
    }

    match extraction_pipeline(db) {
        Ok(pipeline) => {
            pipeline.process_post(&post).await;
            if !quiet {
                println!("Entity extraction finished. Run `curio stats` to see the graph.");
            }
        }
        Err(e) => {
            if !quiet {
                println!("Skipping entity extraction: {}", e);
                println!("Run `curio analyze` later to process this post.");
            }
        }
    }

    Ok(())
}

async fn cmd_post(db: &Database, user: &str, action: &PostAction, quiet: bool) -> anyhow::Result<()> {
    let posts = post_repo(db);

    match action {
        PostAction::List { search, tag, limit } => {
            let filters = PostFilters {
                search: search.clone(),
                tag: tag.clone(),
                limit: *limit,
                offset: None,
            };
            let results = posts.list(user, &filters).await?;

            if results.is_empty() {
                if !quiet {
                    println!("No posts found.");
                    println!("\nSave one with: curio add \"<content>\"");
                }
            } else {
                for post in results {
                    let preview: String = post.content.chars().take(60).collect();
                    let author = post.author_name.as_deref().unwrap_or("unknown");
                    println!("  {} - {} ({})", &post.id[..8], preview, author);
                }
            }
        }
        PostAction::Show { id } => {
            let Some(post) = posts.get(id).await? else {
                return Err(curio_core::Error::PostNotFound(id.clone()).into());
            };

            println!("Post: {}", post.id);
            println!("  Platform: {}", post.platform);
            if let Some(author) = &post.author_name {
                println!("  Author: {}", author);
            }
            if let Some(url) = &post.original_url {
                println!("  URL: {}", url);
            }
            if !post.tags.is_empty() {
                println!("  Tags: {}", post.tags.join(", "));
            }
            println!("  Saved: {}", post.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("\n{}", post.content);
        }
        PostAction::Delete { id } => {
            if !posts.delete(id).await? {
                return Err(curio_core::Error::PostNotFound(id.clone()).into());
            }
            if !quiet {
                println!("Post '{}' deleted.", id);
            }
        }
    }

    Ok(())
}

async fn cmd_import(db: &Database, user: &str, file: &PathBuf, quiet: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let items = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", file.display(), e))?;

    let posts = post_repo(db);
    let report = bulk_import(posts.as_ref(), user, items).await?;

    if !quiet {
        println!(
            "Imported {} posts, skipped {} already saved.",
            report.imported, report.skipped
        );
        if report.imported > 0 {
            println!("\nRun `curio analyze` to extract entities from the new posts.");
        }
    }

    Ok(())
}

async fn cmd_collection(
    db: &Database,
    user: &str,
    action: &CollectionAction,
    quiet: bool,
) -> anyhow::Result<()> {
    let collections = SqliteCollectionRepository::new(db.pool().clone());
    let posts = post_repo(db);

    match action {
        CollectionAction::Create { name, description } => {
            let mut collection = Collection::new(user, name);
            if let Some(description) = description {
                collection = collection.with_description(description);
            }
            collections.save(&collection).await?;
            if !quiet {
                println!("Collection created.");
                println!("  ID: {}", collection.id);
            }
        }
        CollectionAction::List => {
            let summaries = collections.list_for_user(user).await?;
            if summaries.is_empty() {
                if !quiet {
                    println!("No collections found.");
                }
            } else {
                for summary in summaries {
                    println!(
                        "  {} - {} ({} posts)",
                        &summary.collection.id[..8],
                        summary.collection.name,
                        summary.post_count
                    );
                }
            }
        }
        CollectionAction::AddPost {
            collection_id,
            post_id,
        } => {
            ensure_owned_collection(&collections, user, collection_id).await?;
            if posts.get(post_id).await?.is_none() {
                return Err(curio_core::Error::PostNotFound(post_id.clone()).into());
            }
            collections.add_post(collection_id, post_id).await?;
            if !quiet {
                println!("Post added to collection.");
            }
        }
        CollectionAction::RemovePost {
            collection_id,
            post_id,
        } => {
            ensure_owned_collection(&collections, user, collection_id).await?;
            collections.remove_post(collection_id, post_id).await?;
            if !quiet {
                println!("Post removed from collection.");
            }
        }
        CollectionAction::Posts { collection_id } => {
            ensure_owned_collection(&collections, user, collection_id).await?;
            let ids = collections.post_ids_in(collection_id).await?;
            let rows = posts.get_many(&ids).await?;
            for post in rows {
                let preview: String = post.content.chars().take(60).collect();
                println!("  {} - {}", &post.id[..8], preview);
            }
        }
        CollectionAction::Delete { id } => {
            ensure_owned_collection(&collections, user, id).await?;
            collections.delete(id).await?;
            if !quiet {
                println!("Collection '{}' deleted.", id);
            }
        }
    }

    Ok(())
}

async fn ensure_owned_collection(
    collections: &SqliteCollectionRepository,
    user: &str,
    id: &str,
) -> anyhow::Result<()> {
    match collections.get(id).await? {
        Some(collection) if collection.user_id == user => Ok(()),
        _ => Err(curio_core::Error::CollectionNotFound(id.to_string()).into()),
    }
}

async fn cmd_analyze(db: &Database, user: &str, quiet: bool) -> anyhow::Result<()> {
    let pipeline = extraction_pipeline(db)?;

    if !quiet {
        println!("Analyzing posts without completed extraction...");
    }

    let report = pipeline.backfill(user).await?;

    if !quiet {
        println!(
            "Processed {} posts, skipped {} already completed.",
            report.processed, report.skipped
        );
    }

    Ok(())
}

async fn cmd_graph(db: &Database, user: &str) -> anyhow::Result<()> {
    let graph = graph_queries(db).get_graph(user).await?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

async fn cmd_entity(db: &Database, user: &str, id: &str) -> anyhow::Result<()> {
    let Some(detail) = graph_queries(db).get_entity_detail(user, id).await? else {
        return Err(curio_core::Error::EntityNotFound(id.to_string()).into());
    };

    println!("Entity: {} ({})", detail.entity.name, detail.entity.entity_type);
    if let Some(description) = &detail.entity.description {
        println!("  {}", description);
    }
    println!("  Mentions: {}", detail.entity.mention_count);

    if !detail.connected.is_empty() {
        println!("\nConnected entities:");
        for connected in &detail.connected {
            println!(
                "  {} ({}) - weight {}",
                connected.name, connected.entity_type, connected.weight
            );
        }
    }

    if !detail.posts.is_empty() {
        println!("\nMentioned in:");
        for post in &detail.posts {
            let preview: String = post.content.chars().take(60).collect();
            println!("  {} - {}", &post.id[..8], preview);
        }
    }

    Ok(())
}

async fn cmd_stats(db: &Database, user: &str) -> anyhow::Result<()> {
    let stats = graph_queries(db).get_stats(user).await?;

    println!("Knowledge graph:");
    println!("  Entities: {}", stats.total_entities);
    println!("  Edges: {}", stats.total_edges);
    println!("  Posts processed: {}", stats.total_posts_processed);
    println!("  Posts pending: {}", stats.total_posts_pending);

    if !stats.by_type.is_empty() {
        println!("\nEntities by type:");
        for (entity_type, count) in &stats.by_type {
            println!("  {}: {}", entity_type, count);
        }
    }

    Ok(())
}

async fn cmd_ask(db: &Database, user: &str, question: &str, quiet: bool) -> anyhow::Result<()> {
    let llm = llm_client()?;
    let service = SearchService::new(post_repo(db), llm);

    let result = service.answer(user, question).await?;

    println!("{}", result.answer);

    if !quiet && !result.sources.is_empty() {
        println!("\nSources:");
        for post in &result.sources {
            let preview: String = post.content.chars().take(60).collect();
            println!("  {} - {}", &post.id[..8], preview);
        }
    }

    Ok(())
}

fn cmd_config(action: &ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            if !quiet {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list() {
                println!("{} = {}", key, value);
            }
        }
    }
    Ok(())
}

async fn cmd_doctor(db: &Database, quiet: bool) -> anyhow::Result<()> {
    db.health_check().await?;
    let status = db.migration_status().await?;

    if !quiet {
        println!("Database: ok ({})", db.path().display());
        println!(
            "Schema version: {}/{}",
            status.current_version, status.target_version
        );

        let config = Config::load()?;
        match config.llm.redacted_api_key()? {
            Some(key) => println!("API key: {}", key),
            None => println!("API key: not set (CURIO_API_KEY or OPENAI_API_KEY)"),
        }
    }

    Ok(())
}
