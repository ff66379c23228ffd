// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: `ask`, `index` and `config check`.

use colored::Colorize;
use concierge_agent::ChatRequest;
use concierge_config::ConciergeConfig;
use concierge_core::{ChatTurn, ConciergeError};
use concierge_tools::ToolRegistry;

use crate::SessionArgs;
use crate::services::build_engine;

/// Builds the request the conversational subcommands send.
pub fn session_request(turns: Vec<ChatTurn>, session: &SessionArgs) -> ChatRequest {
    let request = ChatRequest::new(turns)
        .with_locale(session.locale.clone())
        .allow_actions(session.allow_actions);
    match &session.conversation {
        Some(id) => request.with_conversation(id.clone()),
        None => request,
    }
}

/// Runs `concierge ask`: answers one message without streaming.
pub async fn run_ask(
    config: &ConciergeConfig,
    message: String,
    session: SessionArgs,
) -> Result<(), ConciergeError> {
    let (engine, _) = build_engine(config).await?;
    let request = session_request(vec![ChatTurn::user(message)], &session);
    let response = engine.chat(request).await?;
    let rendered = serde_json::to_string_pretty(&response)
        .map_err(|e| ConciergeError::Internal(format!("failed to render response: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Runs `concierge index`: warms every index and prints the counts.
pub async fn run_index(config: &ConciergeConfig) -> Result<(), ConciergeError> {
    let (_, report) = build_engine(config).await?;
    println!("{}", "indices built".bold().green());
    println!("  products:  {}", report.products);
    println!("  kb chunks: {}", report.chunks);
    println!("  intents:   {}", report.intents);
    if report.products == 0 {
        println!(
            "{}",
            format!(
                "  no products loaded from {}; product search will return nothing",
                config.catalog.products_path
            )
            .yellow()
        );
    }
    Ok(())
}

/// Runs `concierge config check` on an already validated configuration.
pub fn print_config_summary(config: &ConciergeConfig) {
    println!("{}", "configuration OK".bold().green());
    for line in summary_lines(config) {
        println!("  {line}");
    }
}

fn summary_lines(config: &ConciergeConfig) -> Vec<String> {
    let registry = ToolRegistry::from_config(config);
    let mut tools: Vec<&str> = registry.specs().map(|spec| spec.name.as_str()).collect();
    tools.sort_unstable();

    vec![
        format!("engine:     {} (log level {})", config.engine.name, config.engine.log_level),
        format!("llm:        {} at {}", config.llm.model, config.llm.base_url),
        format!(
            "embedding:  {} (batch {})",
            config.embedding.model, config.embedding.batch_size
        ),
        format!("storage:    {}", config.storage.database_path),
        format!("catalog:    {}", config.catalog.products_path),
        format!("intents:    {}", config.routing.intents.len()),
        format!("tools:      {}", tools.join(", ")),
        format!(
            "delivery:   {}",
            config.notify.smtp_host.as_deref().unwrap_or("not configured")
        ),
    ]
}
