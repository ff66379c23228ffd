// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapters for Concierge.
//!
//! [`OpenAiProvider`] implements [`ProviderAdapter`] over the Chat
//! Completions API and [`OpenAiEmbedder`] implements [`EmbeddingAdapter`]
//! over the Embeddings API. Any server speaking the same protocol (a local
//! gateway, a hosted proxy) works by pointing `base_url` at it.

pub mod client;
pub mod sse;
pub mod stream;
pub mod types;

use async_trait::async_trait;
use concierge_config::model::{EmbeddingConfig, LlmConfig};
use concierge_core::{
    AdapterType, ConciergeError, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput, HealthStatus,
    PluginAdapter, ProviderAdapter, ProviderRequest, ProviderResponse, ProviderStream, TokenUsage,
    ToolCall,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ClientError, OpenAiClient};
use crate::stream::{normalize, parse_arguments};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, FunctionDefinition,
    FunctionTool, StreamOptions, WireMessage,
};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat Completions backed [`ProviderAdapter`].
pub struct OpenAiProvider {
    client: OpenAiClient,
    default_model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    /// Creates a provider from the `[llm]` section.
    ///
    /// The API key comes from the config or, when unset or empty, from
    /// `OPENAI_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self, ConciergeError> {
        let api_key = resolve_api_key(&[config.api_key.as_deref()])?;
        let client = OpenAiClient::new(&api_key, &config.base_url).map_err(provider_error)?;
        info!(model = %config.model, base_url = %client.base_url(), "OpenAI provider initialized");
        Ok(Self {
            client,
            default_model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn to_wire_request(&self, request: ProviderRequest, stream: bool) -> ChatCompletionRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };
        let tools = request
            .tools
            .map(|tools| tools.iter().filter_map(to_function_tool).collect::<Vec<_>>())
            .filter(|tools| !tools.is_empty());

        ChatCompletionRequest {
            model,
            messages: request
                .messages
                .into_iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            tools,
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
            temperature: request.temperature,
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        // No probe request: completions cost tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ConciergeError> {
        let wire = self.to_wire_request(request, false);
        let response = self.client.complete_chat(&wire).await.map_err(provider_error)?;
        Ok(to_provider_response(response))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ConciergeError> {
        let wire = self.to_wire_request(request, true);
        let events = self.client.stream_chat(&wire).await.map_err(provider_error)?;
        Ok(normalize(events))
    }
}

/// Embeddings API backed [`EmbeddingAdapter`].
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Creates an embedder from the `[embedding]` section. The key falls back
    /// to `llm.api_key`, then `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self, ConciergeError> {
        let api_key = resolve_api_key(&[config.api_key.as_deref(), llm.api_key.as_deref()])?;
        let client = OpenAiClient::new(&api_key, &config.base_url).map_err(embedding_error)?;
        info!(model = %config.model, batch_size = config.batch_size, "OpenAI embedder initialized");
        Ok(Self {
            client,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ConciergeError> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };
        let mut data = self
            .client
            .embeddings(&request)
            .await
            .map_err(embedding_error)?
            .data;
        if data.len() != texts.len() {
            return Err(ConciergeError::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embeddings"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ConciergeError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for batch in input.texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        debug!(count = embeddings.len(), model = %self.model, "texts embedded");
        let dimensions = embeddings.first().map_or(0, Vec::len);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}

/// Converts a flat `{type, name, description, parameters}` descriptor to the
/// nested function form. Already nested descriptors pass through.
pub fn to_function_tool(descriptor: &Value) -> Option<FunctionTool> {
    if let Some(function) = descriptor.get("function") {
        let function: FunctionDefinition = serde_json::from_value(function.clone()).ok()?;
        return Some(FunctionTool {
            type_: "function".into(),
            function,
        });
    }

    let name = descriptor.get("name")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    let description = descriptor
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parameters = descriptor
        .get("parameters")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

    Some(FunctionTool {
        type_: "function".into(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    })
}

fn to_provider_response(response: ChatCompletionResponse) -> ProviderResponse {
    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();
    let choice = response.choices.into_iter().next();
    let stop_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
    let message = choice.map(|c| c.message).unwrap_or_default();

    let tool_call = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|call| !call.function.name.is_empty())
        .map(|call| ToolCall {
            id: call.id,
            arguments: parse_arguments(&call.function.arguments),
            name: call.function.name,
        });

    ProviderResponse {
        id: response.id,
        content: message.content.unwrap_or_default(),
        model: response.model,
        tool_call,
        stop_reason,
        usage,
    }
}

/// Returns the first non-empty configured key, else `OPENAI_API_KEY`.
fn resolve_api_key(candidates: &[Option<&str>]) -> Result<String, ConciergeError> {
    if let Some(key) = candidates.iter().flatten().find(|k| !k.is_empty()) {
        return Ok((*key).to_string());
    }
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ConciergeError::Config(format!(
                "no API key configured: set llm.api_key or the {API_KEY_ENV} environment variable"
            ))
        })
}

fn provider_error(e: ClientError) -> ConciergeError {
    ConciergeError::Provider {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

fn embedding_error(e: ClientError) -> ConciergeError {
    ConciergeError::Embedding {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{ProviderMessage, StreamEventType};
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn llm_config(server: &MockServer) -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".into()),
            base_url: format!("{}/v1", server.uri()),
            ..LlmConfig::default()
        }
    }

    fn request(tools: Option<Vec<Value>>) -> ProviderRequest {
        ProviderRequest {
            model: String::new(),
            messages: vec![
                ProviderMessage::new("system", "You are a sales assistant."),
                ProviderMessage::new("user", "Any outdoor lights?"),
            ],
            tools,
            max_tokens: None,
            temperature: Some(0.2),
            stream: false,
        }
    }

    fn search_tool() -> Value {
        json!({
            "type": "function",
            "name": "product_search",
            "description": "Search the catalog",
            "parameters": {"type": "object", "properties": {"query": {"type": "string"}}}
        })
    }

    #[test]
    fn resolve_api_key_prefers_first_non_empty() {
        assert_eq!(
            resolve_api_key(&[Some(""), Some("sk-llm")]).unwrap(),
            "sk-llm"
        );
        assert_eq!(resolve_api_key(&[Some("sk-emb"), Some("sk-llm")]).unwrap(), "sk-emb");
    }

    #[test]
    fn flat_descriptor_becomes_nested_function() {
        let tool = to_function_tool(&search_tool()).unwrap();
        assert_eq!(
            serde_json::to_value(&tool).unwrap(),
            json!({
                "type": "function",
                "function": {
                    "name": "product_search",
                    "description": "Search the catalog",
                    "parameters": {"type": "object", "properties": {"query": {"type": "string"}}}
                }
            })
        );
    }

    #[test]
    fn nested_descriptor_passes_through_and_nameless_is_dropped() {
        let nested = json!({
            "type": "function",
            "function": {"name": "get_product_details", "parameters": {"type": "object"}}
        });
        assert_eq!(
            to_function_tool(&nested).unwrap().function.name,
            "get_product_details"
        );
        assert!(to_function_tool(&json!({"type": "function", "name": ""})).is_none());
        assert!(to_function_tool(&json!({"description": "no name"})).is_none());
    }

    #[tokio::test]
    async fn complete_maps_text_tool_call_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4.1-mini",
                "stream": false,
                "tools": [{"type": "function", "function": {"name": "product_search"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-7",
                "model": "gpt-4.1-mini",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "Let me look.",
                        "tool_calls": [{
                            "id": "call_a",
                            "type": "function",
                            "function": {"name": "product_search", "arguments": "{\"query\":\"outdoor\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 40, "completion_tokens": 12}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&llm_config(&server)).unwrap();
        let response = provider.complete(request(Some(vec![search_tool()]))).await.unwrap();

        assert_eq!(response.content, "Let me look.");
        assert_eq!(response.stop_reason.as_deref(), Some("tool_calls"));
        let call = response.tool_call.unwrap();
        assert_eq!(call.name, "product_search");
        assert_eq!(call.id.as_deref(), Some("call_a"));
        assert_eq!(call.arguments, json!({"query": "outdoor"}));
        assert_eq!(response.usage.input_tokens, 40);
    }

    #[tokio::test]
    async fn complete_without_choices_is_empty_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x", "choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&llm_config(&server)).unwrap();
        let response = provider.complete(request(None)).await.unwrap();
        assert!(response.content.is_empty());
        assert!(response.tool_call.is_none());
    }

    #[tokio::test]
    async fn stream_yields_deltas_then_tool_call_then_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Checking\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"product_search\",\"arguments\":\"{\\\"qu\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ery\\\":\\\"lamp\\\"}\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":30,\"completion_tokens\":8}}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "stream": true,
                "stream_options": {"include_usage": true}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&llm_config(&server)).unwrap();
        let chunks: Vec<_> = provider
            .stream(request(Some(vec![search_tool()])))
            .await
            .unwrap()
            .collect()
            .await;

        let kinds: Vec<StreamEventType> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                StreamEventType::Delta,
                StreamEventType::ToolCall,
                StreamEventType::Done
            ]
        );
        let call = chunks[1].as_ref().unwrap().tool_call.clone().unwrap();
        assert_eq!(call.arguments, json!({"query": "lamp"}));
        let usage = chunks[2].as_ref().unwrap().usage.unwrap();
        assert_eq!(usage.output_tokens, 8);
    }

    #[tokio::test]
    async fn stream_request_failure_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&llm_config(&server)).unwrap();
        let err = match provider.stream(request(None)).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, ConciergeError::Provider { .. }));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn embed_batches_and_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["c"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            api_key: None,
            base_url: format!("{}/v1", server.uri()),
            model: "text-embedding-3-small".into(),
            batch_size: 2,
        };
        let embedder = OpenAiEmbedder::new(&config, &llm_config(&server)).unwrap();
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec!["a".into(), "b".into(), "c".into()],
            })
            .await
            .unwrap();

        assert_eq!(output.dimensions, 2);
        assert_eq!(
            output.embeddings,
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
        );
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            base_url: format!("{}/v1", server.uri()),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config, &llm_config(&server)).unwrap();
        let err = embedder
            .embed(EmbeddingInput {
                texts: vec!["a".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::Embedding { .. }));
    }

    #[tokio::test]
    async fn embed_empty_input_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            base_url: format!("{}/v1", server.uri()),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config, &llm_config(&server)).unwrap();
        let output = embedder.embed(EmbeddingInput::default()).await.unwrap();
        assert!(output.embeddings.is_empty());
        assert_eq!(output.dimensions, 0);
    }
}
