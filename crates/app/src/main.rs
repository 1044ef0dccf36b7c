use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use legal_retrieval_core::config::{DEFAULT_ALTERNATE_COLLECTION, DEFAULT_PRIMARY_COLLECTION};
use legal_retrieval_core::embeddings::{
    DEFAULT_EMBEDDING_SERVICE_ENDPOINT, DEFAULT_VOYAGE_ENDPOINT, DEFAULT_VOYAGE_MODEL,
};
use legal_retrieval_core::expander::DOC_ID_FIELD;
use legal_retrieval_core::{
    Bm25ServiceEmbedder, CorpusCatalog, CorpusConfig, IndexAction, PipelineOutcome,
    PipelineResult, PipelineSettings, QdrantStore, RankingStrategy, SearchCoordinator,
    SearchRequest, SearchResponse, VectorStore, VoyageEmbedder, DEFAULT_RRF_K,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Characters of document text printed per hit in text output.
const PREVIEW_CHARS: usize = 400;

#[derive(Parser)]
#[command(name = "legal-retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Voyage AI base URL
    #[arg(long, default_value = DEFAULT_VOYAGE_ENDPOINT)]
    voyage_url: String,

    /// Voyage AI API key
    #[arg(long, env = "VOYAGE_API_KEY", hide_env_values = true, default_value = "")]
    voyage_api_key: String,

    /// Voyage embedding model
    #[arg(long, default_value = DEFAULT_VOYAGE_MODEL)]
    voyage_model: String,

    /// BM25 embedding service base URL
    #[arg(
        long,
        env = "EMBEDDING_SERVICE_URL",
        default_value = DEFAULT_EMBEDDING_SERVICE_ENDPOINT
    )]
    embedding_service_url: String,

    /// Collection searched by default and on the primary side of compare mode
    #[arg(long, default_value = DEFAULT_PRIMARY_COLLECTION)]
    primary_collection: String,

    /// Collection on the alternate side of compare mode
    #[arg(long, default_value = DEFAULT_ALTERNATE_COLLECTION)]
    alternate_collection: String,

    /// How dense and sparse rankings are fused
    #[arg(long, value_enum, default_value_t = Ranking::Delegated)]
    ranking: Ranking,

    /// RRF constant used with local fusion
    #[arg(long, default_value_t = DEFAULT_RRF_K)]
    rrf_k: u32,

    /// Per-request timeout for every remote call, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Deployment environment; development adds diagnostic detail to errors
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Production)]
    environment: Environment,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Ranking {
    Delegated,
    LocalRrf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Environment {
    Development,
    Production,
}

#[derive(Subcommand)]
enum Command {
    /// Hybrid search returning reconstructed documents.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Maximum number of documents per corpus.
        #[arg(long, default_value = "30")]
        limit: usize,
        /// Corpus label or collection name (defaults to the primary collection).
        #[arg(long)]
        corpus: Option<String>,
        /// Search primary and alternate collections side by side.
        #[arg(long, default_value_t = false)]
        compare: bool,
        /// Print the response as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Create the keyword payload index that document expansion filters on.
    EnsureIndex {
        /// Collection to index (defaults to the primary collection).
        #[arg(long)]
        collection: Option<String>,
        /// Payload field to index.
        #[arg(long, default_value = DOC_ID_FIELD)]
        field: String,
    },
    /// Report availability of the vector store and the BM25 service.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.request_timeout_secs);

    let store = QdrantStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone(), timeout)?;
    let sparse = Bm25ServiceEmbedder::new(&cli.embedding_service_url, timeout)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "legal-retrieval boot"
    );

    match cli.command {
        Command::Search {
            query,
            limit,
            corpus,
            compare,
            json,
        } => {
            if cli.voyage_api_key.is_empty() {
                anyhow::bail!("VOYAGE_API_KEY is not defined");
            }
            let dense = VoyageEmbedder::new(
                &cli.voyage_url,
                cli.voyage_api_key.as_str(),
                cli.voyage_model.as_str(),
                timeout,
            )?;

            let settings = PipelineSettings {
                ranking: match cli.ranking {
                    Ranking::Delegated => RankingStrategy::Delegated,
                    Ranking::LocalRrf => RankingStrategy::LocalRrf { k: cli.rrf_k },
                },
                expose_error_details: cli.environment == Environment::Development,
                ..PipelineSettings::default()
            };
            let catalog = CorpusCatalog {
                primary: CorpusConfig::new("primary", cli.primary_collection.as_str()),
                alternate: CorpusConfig::new("alternate", cli.alternate_collection.as_str()),
            };
            let coordinator = SearchCoordinator::new(store, dense, sparse)
                .with_catalog(catalog)
                .with_settings(settings);

            let request = SearchRequest {
                query,
                limit,
                corpus,
                compare_mode: compare,
            };

            let response = coordinator.search(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("query: {}", request.query);
                match response {
                    SearchResponse::Single(result) => print_result(&result),
                    SearchResponse::Comparison(comparison) => {
                        print_outcome("primary", &comparison.primary);
                        print_outcome("alternate", &comparison.alternate);
                    }
                }
            }
        }
        Command::EnsureIndex { collection, field } => {
            let collection = collection.unwrap_or(cli.primary_collection);
            let action = store.ensure_keyword_index(&collection, &field).await?;
            match action {
                IndexAction::NoActionNeeded => {
                    println!("index already exists on {field} in {collection} (no_action_needed)");
                }
                IndexAction::Created => {
                    println!("keyword index created on {field} in {collection} (created)");
                }
            }
        }
        Command::Health => {
            let bm25_online = sparse.health().await;
            let qdrant_online = match store.list_collections().await {
                Ok(collections) => {
                    info!(collections = collections.len(), "qdrant reachable");
                    true
                }
                Err(error) => {
                    warn!(%error, "qdrant unreachable");
                    false
                }
            };
            println!("bm25 service: {}", status_label(bm25_online));
            println!("qdrant: {}", status_label(qdrant_online));
            if !(bm25_online && qdrant_online) {
                anyhow::bail!("one or more services are offline");
            }
        }
    }

    Ok(())
}

fn status_label(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

fn print_outcome(side: &str, outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Succeeded(result) => {
            println!("== {side}");
            print_result(result);
        }
        PipelineOutcome::Failed(failure) => {
            println!(
                "== {side} ({}) failed after {}ms: {}",
                failure.corpus, failure.elapsed_ms, failure.message
            );
            if let Some(details) = &failure.details {
                println!("  details: {details}");
            }
        }
    }
}

fn print_result(result: &PipelineResult) {
    println!(
        "corpus={} collection={} documents={} ranked_chunks={} elapsed_ms={}",
        result.corpus,
        result.collection,
        result.documents.len(),
        result.ranked_chunks,
        result.elapsed_ms
    );

    if result.documents.is_empty() {
        println!("no results");
        return;
    }

    for (position, document) in result.documents.iter().enumerate() {
        println!(
            "[{}] score={:.4} doc_id={} chunks={}",
            position + 1,
            document.score,
            document.doc_id,
            document.chunks.len()
        );
        for (key, value) in &document.metadata {
            println!("  {key}={value}");
        }
        println!("  text: {}", preview(&document.full_text));
    }
}

fn preview(text: &str) -> String {
    let mut preview = text.chars().take(PREVIEW_CHARS).collect::<String>();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}
