//! Inference provider implementations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::types::*;

/// Trait for verifiable inference providers
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Get the provider kind
    fn kind(&self) -> ProviderKind;

    /// Check if the provider can serve real completions
    async fn is_available(&self) -> bool;

    /// Run a chat completion
    async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<ChatCompletion>;
}

// ============================================================================
// Verifiable HTTP Provider
// ============================================================================

pub const DEFAULT_INFERENCE_URL: &str = "https://determinal-api.eigenarcade.com";
pub const DEFAULT_INFERENCE_MODEL: &str = "gpt-oss-120b-f16";
pub const DEFAULT_SEED: u64 = 42;
const MOCK_SIGNATURE: &str = "0xmocksignature";

/// Configuration for the verifiable inference provider
#[derive(Debug, Clone)]
pub struct VerifiableInferenceConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub wallet_address: Option<String>,
    /// Unconfigured providers fail instead of answering with a mock
    pub production: bool,
}

impl Default for VerifiableInferenceConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GITSPLITS_INFERENCE_URL")
                .unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string()),
            model: std::env::var("GITSPLITS_INFERENCE_MODEL")
                .unwrap_or_else(|_| DEFAULT_INFERENCE_MODEL.to_string()),
            api_key: std::env::var("GITSPLITS_INFERENCE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty() && k != "placeholder"),
            wallet_address: std::env::var("GITSPLITS_INFERENCE_WALLET").ok(),
            production: std::env::var("AGENT_MODE").map(|m| m == "production").unwrap_or(false),
        }
    }
}

/// Chat-completions provider that returns a signature with every reply
pub struct VerifiableInferenceProvider {
    config: VerifiableInferenceConfig,
    client: reqwest::Client,
}

impl VerifiableInferenceProvider {
    pub fn new(config: VerifiableInferenceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::new(VerifiableInferenceConfig::default())
    }

    fn mock_completion(&self) -> ChatCompletion {
        ChatCompletion {
            content: "This is a mock inference response. Set GITSPLITS_INFERENCE_API_KEY to enable real inference.".to_string(),
            signature: Some(MOCK_SIGNATURE.to_string()),
            model: self.config.model.clone(),
            mock: true,
        }
    }
}

#[derive(Serialize)]
struct SignedChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "walletAddress", skip_serializing_if = "Option::is_none")]
    wallet_address: Option<&'a str>,
}

#[derive(Deserialize)]
struct SignedChatResponse {
    #[serde(default)]
    choices: Vec<SignedChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
struct SignedChatChoice {
    message: SignedChatMessage,
}

#[derive(Deserialize)]
struct SignedChatMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl InferenceProvider for VerifiableInferenceProvider {
    fn name(&self) -> &'static str {
        "Verifiable Inference"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Verifiable
    }

    async fn is_available(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<ChatCompletion> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            if self.config.production {
                return Err(InferenceError::NotConfigured {
                    message: "Missing GITSPLITS_INFERENCE_API_KEY in production mode".to_string(),
                });
            }
            tracing::info!("Inference provider unconfigured, returning mock completion");
            return Ok(self.mock_completion());
        };

        let body = SignedChatRequest {
            model: &self.config.model,
            messages: &messages,
            seed: options.seed.unwrap_or(DEFAULT_SEED),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            wallet_address: self.config.wallet_address.as_deref(),
        };

        let url = format!("{}/api/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(InferenceError::RequestFailed {
                message: format!("HTTP {}: {}", status, detail),
            });
        }

        let parsed: SignedChatResponse =
            response.json().await.map_err(|e| InferenceError::InvalidResponse {
                message: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InferenceError::InvalidResponse {
                message: "completion had no choices".to_string(),
            })?;

        tracing::debug!(
            signed = parsed.signature.is_some(),
            "Inference completion received"
        );

        Ok(ChatCompletion {
            content,
            signature: parsed.signature,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            mock: false,
        })
    }
}

// ============================================================================
// Mock Provider
// ============================================================================

/// Scripted provider for tests and offline runs
///
/// Replies are served from the script in order; once it is exhausted every
/// call gets the fallback reply.
pub struct MockInferenceProvider {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Result<String>,
    calls: AtomicUsize,
}

impl MockInferenceProvider {
    /// Always answer with `reply`
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with each scripted reply in turn
    pub fn scripted(replies: Vec<Result<String>>, fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: Ok(fallback.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(InferenceError::RequestFailed {
                message: message.into(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of chat calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for MockInferenceProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn chat(&self, _messages: Vec<Message>, _options: ChatOptions) -> Result<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        next.map(|content| ChatCompletion {
            content,
            signature: Some(MOCK_SIGNATURE.to_string()),
            model: "mock".to_string(),
            mock: true,
        })
    }
}
