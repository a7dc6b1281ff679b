//! Interactive scene-retrieval assistant.
//!
//! Run: `cargo run -p scene-rag` with `OPENROUTER_API_KEY` or `OPENAI_API_KEY`
//! set (a `.env` file works too). Set `QDRANT_URL` to persist collections.

use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use scene_rag::{
    ImsdbCatalog, InMemoryVectorStore, OpenAIChatModel, OpenAIEmbeddingProvider, RagConfig,
    RagPipeline, SceneAssistant, SceneRagError, Settings, VectorStore,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match &settings.qdrant_url {
        None => Ok(Arc::new(InMemoryVectorStore::new())),
        #[cfg(feature = "qdrant")]
        Some(url) => Ok(Arc::new(scene_rag::QdrantVectorStore::new(url)?)),
        #[cfg(not(feature = "qdrant"))]
        Some(_) => Err(SceneRagError::ConfigError(
            "QDRANT_URL is set but scene-rag was built without the `qdrant` feature".to_string(),
        )
        .into()),
    }
}

/// Read one line; `None` on EOF, Ctrl-C or an exit command.
fn prompt(editor: &mut DefaultEditor, label: &str) -> Result<Option<String>> {
    match editor.readline(label) {
        Ok(line) => {
            let line = line.trim().to_string();
            if line == "exit" || line == "quit" {
                return Ok(None);
            }
            if !line.is_empty() {
                editor
                    .add_history_entry(line.as_str())
                    .map_err(|e| tracing::debug!(error = %e, "failed to record history entry"))
                    .ok();
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scene_rag=info,warn"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let settings = Settings::from_env()?;
    tracing::debug!(?settings, "loaded settings");

    let pipeline = Arc::new(
        RagPipeline::builder()
            .config(RagConfig::builder().build()?)
            .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_settings(&settings)?))
            .vector_store(vector_store(&settings)?)
            .build()?,
    );
    let assistant = SceneAssistant::new(
        Arc::new(ImsdbCatalog::new(settings.catalog_url.clone())),
        pipeline,
        Arc::new(OpenAIChatModel::from_settings(&settings)?),
    );

    let titles = assistant.titles().await.context("could not load the script catalog")?;
    println!("{} scripts available.", titles.len());

    let mut editor = DefaultEditor::new()?;
    let session = loop {
        let Some(input) = prompt(&mut editor, "Title> ")? else {
            return Ok(());
        };
        match assistant.open(&titles, &input) {
            Ok(session) => break session,
            Err(SceneRagError::SelectionInvalid(title)) => {
                let needle = title.to_lowercase();
                let suggestions: Vec<&str> = titles
                    .iter()
                    .filter(|t| t.to_lowercase().contains(&needle))
                    .map(String::as_str)
                    .take(5)
                    .collect();
                println!("'{title}' is not in the catalog.");
                if !suggestions.is_empty() {
                    println!("Did you mean: {}", suggestions.join(", "));
                }
            }
            Err(e) => return Err(e.into()),
        }
    };

    let report = assistant.prepare(&session).await?;
    println!("'{}' ready: {} chunks in '{}'.", session.title, report.record_count, report.collection);
    println!("Ask about a scene (':reindex' to rebuild, 'exit' to quit).");

    while let Some(query) = prompt(&mut editor, "Query> ")? {
        if query.is_empty() {
            continue;
        }
        if query == ":reindex" {
            let report = assistant.reindex(&session).await?;
            println!("Re-indexed {} chunks.", report.ingested);
            continue;
        }

        // A failed query ends that query only.
        let answer = match assistant.ask(&session, &query).await {
            Ok(answer) => answer,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        if let Some(author) = &answer.author {
            println!("(filtered by author: {author})");
        }
        println!("(search: {}; {} excerpts)\n", answer.rewritten_query, answer.results.len());
        println!("{}\n", answer.text);
    }

    Ok(())
}
