use anyhow::{bail, Context, Result};
use repoqa_core::*;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

mod telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_telemetry()?;

    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = config::Config::load(&config_path).unwrap_or_else(|_| {
        tracing::warn!("Failed to load {config_path}, using defaults");
        config::Config::default()
    });

    // Credentials stay at this boundary; the core only sees plain values.
    let github_token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    if github_token.is_empty() {
        tracing::warn!("GITHUB_TOKEN not set; GitHub requests will be rate-limited");
    }
    let google_api_key = match std::env::var("GOOGLE_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => bail!("GOOGLE_API_KEY not set"),
    };

    let repository = if config.repository.is_empty() {
        read_line("Enter GitHub repository URL: ")?
    } else {
        config.repository.clone()
    };
    let (owner, repo) = source::parse_repo_url(&repository)?;

    let source = source::GithubSource::new(
        config.github.api_url.clone(),
        github_token,
        owner.clone(),
        repo.clone(),
    )?;
    let branch = match &config.branch {
        Some(branch) => branch.clone(),
        None => source.default_branch().await?,
    };

    tracing::info!("repoqa starting");
    tracing::info!("  Repository: {owner}/{repo}");
    tracing::info!("  Branch: {branch}");
    tracing::info!("  Index path: {}", config.index_path);
    tracing::info!("  Store path: {}", config.store_path);
    tracing::info!("  Extensions: {:?}", config.extensions);
    tracing::info!(
        "  Chunking: size={} overlap={} (tokens)",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  Top-k: {}", config.top_k);
    tracing::info!("  Embedding workers: {}", config.num_embedding_workers);
    tracing::info!("  Embedding cache: enabled={}", config.cache.enabled);

    // Initialize document store
    let store = store::DocumentStore::open(&config.store_path).await?;

    // Initialize embedder, with the cache sharing the store's database
    let mut gemini_embedder = embedder::GeminiEmbedder::new(
        config.gemini.api_url.clone(),
        google_api_key.clone(),
        config.gemini.embedding_model.clone(),
    )?;
    if config.cache.enabled {
        let cache = cache::EmbeddingCache::new(
            store.pool(),
            config.gemini.embedding_model.clone(),
            config.cache.memory_entries,
        )
        .await?;
        gemini_embedder = gemini_embedder.with_cache(Arc::new(cache));
        tracing::info!("✓ Embedding cache initialized");
    }
    let embedder: Arc<dyn embedder::Embedder> = Arc::new(gemini_embedder);
    tracing::info!("✓ Embedder initialized");

    // Build-or-load is decided here, once, on index-file existence.
    let index = if Path::new(&config.index_path).exists() {
        tracing::info!("Loading existing index from {}", config.index_path);
        index::VectorIndex::load(&config.index_path)?
    } else {
        // A store without an index file is stale; a failed build never
        // saves the index, so the pair stays consistent.
        store.clear().await?;

        tracing::info!("Fetching documents from {owner}/{repo}@{branch}");
        let documents = source.list_documents(&branch, &config.extensions).await?;
        if documents.is_empty() {
            println!("No documents found. Try a repository with matching files.");
            return Ok(());
        }

        let indexer = indexer::Indexer::new(
            Arc::new(chunking::TokenChunker::new()?),
            embedder.clone(),
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.num_embedding_workers,
        );
        let index = indexer
            .build(&documents, &store)
            .await
            .context("index build failed")?;
        index.save(&config.index_path)?;
        index
    };

    let generator: Arc<dyn generator::Generator> = Arc::new(generator::GeminiGenerator::new(
        config.gemini.api_url.clone(),
        google_api_key,
        config.gemini.generation_model.clone(),
    )?);

    let retriever = retriever::Retriever::new(embedder, Arc::new(index), Arc::new(store));
    let engine = query::QueryEngine::new(retriever, generator, config.top_k);

    tracing::info!("repoqa initialized successfully");

    // Interactive loop
    loop {
        let question = read_line("\nAsk a question (or 'exit'): ")?;
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            println!("Exiting.");
            break;
        }

        println!("{}", "=".repeat(60));
        match engine.answer(&question).await {
            Ok(answer) => println!("{answer}"),
            Err(err) => eprintln!("Failed to answer: {err}"),
        }
    }

    Ok(())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    if read == 0 {
        // EOF behaves like an explicit exit.
        return Ok("exit".to_string());
    }
    Ok(line.trim().to_string())
}
