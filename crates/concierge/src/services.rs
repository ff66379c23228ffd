// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of the production collaborators and the chat engine.

use std::sync::Arc;

use concierge_agent::{ChatEngine, EngineServices, WarmUpReport};
use concierge_config::ConciergeConfig;
use concierge_core::{
    ConciergeError, EmbeddingAdapter, Notifier, ProviderAdapter, StorageAdapter,
};
use concierge_openai::{OpenAiEmbedder, OpenAiProvider};
use concierge_storage::SqliteStorage;
use concierge_tools::SmtpNotifier;
use tracing::{info, warn};

/// Opens storage, connects the providers and warms up every index.
pub async fn build_engine(
    config: &ConciergeConfig,
) -> Result<(Arc<ChatEngine>, WarmUpReport), ConciergeError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let provider: Arc<dyn ProviderAdapter> = Arc::new(OpenAiProvider::new(&config.llm)?);
    let embedder: Arc<dyn EmbeddingAdapter> =
        Arc::new(OpenAiEmbedder::new(&config.embedding, &config.llm)?);

    let notifier: Option<Arc<dyn Notifier>> = match SmtpNotifier::from_config(&config.notify)? {
        Some(smtp) => Some(Arc::new(smtp)),
        None => {
            warn!("no SMTP host configured, inquiries will be recorded but not delivered");
            None
        }
    };

    let engine = Arc::new(ChatEngine::new(
        config,
        EngineServices {
            provider,
            embedder,
            storage,
            notifier,
        },
    ));

    let report = engine.warm_up().await;
    info!(
        products = report.products,
        chunks = report.chunks,
        intents = report.intents,
        "engine ready"
    );
    Ok((engine, report))
}
