//! HTTP payment rails
//!
//! Both rails answer with a mock receipt when unconfigured, unless running in
//! production, where a missing credential is an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn env_credential(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "placeholder")
}

fn production_from_env() -> bool {
    std::env::var("AGENT_MODE").map(|m| m == "production").unwrap_or(false)
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ============================================================================
// Cross-chain intents rail (engine A)
// ============================================================================

pub const DEFAULT_INTENTS_API_BASE: &str = "https://api.pingpay.io";
pub const DEFAULT_INTENTS_PATH: &str = "/v1/intents";

/// How the intents rail API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailAuthMode {
    Bearer,
    Publishable,
}

impl RailAuthMode {
    /// Explicit mode wins; otherwise `pk_` keys are publishable
    pub fn resolve(explicit: Option<&str>, api_key: &str) -> Self {
        match explicit.map(|m| m.trim().to_lowercase()).as_deref() {
            Some("publishable") => Self::Publishable,
            Some("bearer") => Self::Bearer,
            _ if api_key.starts_with("pk_") => Self::Publishable,
            _ => Self::Bearer,
        }
    }
}

/// Configuration for the cross-chain intents rail
#[derive(Debug, Clone)]
pub struct IntentsRailConfig {
    pub api_base: String,
    pub intents_path: String,
    pub api_key: Option<String>,
    pub auth_mode: Option<String>,
    pub production: bool,
}

impl Default for IntentsRailConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("INTENTS_RAIL_API_BASE")
                .unwrap_or_else(|_| DEFAULT_INTENTS_API_BASE.to_string()),
            intents_path: std::env::var("INTENTS_RAIL_PATH")
                .unwrap_or_else(|_| DEFAULT_INTENTS_PATH.to_string()),
            api_key: env_credential("INTENTS_RAIL_API_KEY"),
            auth_mode: std::env::var("INTENTS_RAIL_AUTH_MODE").ok(),
            production: production_from_env(),
        }
    }
}

impl IntentsRailConfig {
    /// Mock-mode configuration with no credentials
    pub fn unconfigured(production: bool) -> Self {
        Self {
            api_base: DEFAULT_INTENTS_API_BASE.to_string(),
            intents_path: DEFAULT_INTENTS_PATH.to_string(),
            api_key: None,
            auth_mode: None,
            production,
        }
    }
}

#[derive(Serialize)]
struct IntentRecipient<'a> {
    address: &'a str,
    amount: f64,
}

#[derive(Serialize)]
struct IntentRequest<'a> {
    action: &'static str,
    split_id: &'a str,
    token: &'a str,
    total_amount: f64,
    recipients: Vec<IntentRecipient<'a>>,
}

#[derive(Deserialize)]
struct IntentResponse {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    intent_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Cross-chain rail that settles payouts as NEAR intents
pub struct IntentsRailEngine {
    config: IntentsRailConfig,
    client: reqwest::Client,
}

impl IntentsRailEngine {
    pub fn new(config: IntentsRailConfig) -> Self {
        Self {
            config,
            client: http_client(),
        }
    }

    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::new(IntentsRailConfig::default())
    }
}

#[async_trait]
impl PaymentEngine for IntentsRailEngine {
    fn name(&self) -> &'static str {
        "intents-rail"
    }

    fn protocol(&self) -> &'static str {
        "NEAR Intents & Chain Signatures"
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn distribute(&self, request: &DistributionRequest) -> Result<EngineReceipt> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            if self.config.production {
                return Err(PaymentError::NotConfigured {
                    message: "Missing INTENTS_RAIL_API_KEY in production mode".to_string(),
                });
            }
            tracing::info!(
                split_id = %request.split_id,
                "Intents rail in mock mode, no API call made"
            );
            return Ok(EngineReceipt {
                tx_hash: mock_tx_hash(),
                intent_id: Some(format!("intent-{}", &mock_tx_hash()[2..10])),
                status: "completed".to_string(),
                payment_url: None,
                mock: true,
            });
        };

        let shares = request.shares();
        let body = IntentRequest {
            action: "distribute",
            split_id: &request.split_id,
            token: &request.token,
            total_amount: request.amount,
            recipients: shares
                .iter()
                .map(|(wallet, amount)| IntentRecipient {
                    address: wallet,
                    amount: *amount,
                })
                .collect(),
        };

        let url = format!(
            "{}{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.intents_path
        );
        let builder = self.client.post(&url).json(&body);
        let builder = match RailAuthMode::resolve(self.config.auth_mode.as_deref(), api_key) {
            RailAuthMode::Publishable => builder.header("x-publishable-key", api_key),
            RailAuthMode::Bearer => builder.bearer_auth(api_key),
        };

        let resp = builder.send().await.map_err(|e| PaymentError::Network {
            engine: self.name().to_string(),
            message: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(PaymentError::Rejected {
                engine: self.name().to_string(),
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let parsed: IntentResponse = resp.json().await.map_err(|e| PaymentError::InvalidResponse {
            engine: self.name().to_string(),
            message: e.to_string(),
        })?;

        Ok(EngineReceipt {
            tx_hash: parsed.transaction_hash.unwrap_or_else(|| "0x".to_string()),
            intent_id: parsed.intent_id.filter(|id| !id.is_empty()),
            status: parsed.status.unwrap_or_else(|| "pending".to_string()),
            payment_url: None,
            mock: false,
        })
    }
}

// ============================================================================
// Native rail (engine B)
// ============================================================================

pub const DEFAULT_NATIVE_API_BASE: &str = "https://api.hot-labs.org";
pub const DEFAULT_NATIVE_MERCHANT: &str = "gitsplits.near";
const NATIVE_PAYMENT_PAGE: &str = "https://pay.hot-labs.org/payment";

/// Configuration for the chain-native rail
#[derive(Debug, Clone)]
pub struct NativeRailConfig {
    pub api_base: String,
    pub jwt: Option<String>,
    pub merchant_id: String,
    pub webhook_url: String,
    pub production: bool,
}

impl Default for NativeRailConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("NATIVE_RAIL_API_BASE")
                .unwrap_or_else(|_| DEFAULT_NATIVE_API_BASE.to_string()),
            jwt: env_credential("NATIVE_RAIL_JWT"),
            merchant_id: std::env::var("NATIVE_RAIL_MERCHANT_ID")
                .unwrap_or_else(|_| DEFAULT_NATIVE_MERCHANT.to_string()),
            webhook_url: std::env::var("NATIVE_RAIL_WEBHOOK_URL").unwrap_or_default(),
            production: production_from_env(),
        }
    }
}

impl NativeRailConfig {
    pub fn unconfigured(production: bool) -> Self {
        Self {
            api_base: DEFAULT_NATIVE_API_BASE.to_string(),
            jwt: None,
            merchant_id: DEFAULT_NATIVE_MERCHANT.to_string(),
            webhook_url: String::new(),
            production,
        }
    }
}

#[derive(Serialize)]
struct MerchantItemRequest<'a> {
    merchant_id: &'a str,
    memo: String,
    header: String,
    description: String,
    token: &'a str,
    amount: f64,
    webhook_url: &'a str,
}

#[derive(Deserialize)]
struct MerchantItemResponse {
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Chain-native rail backed by a partner merchant API
pub struct NativeRailEngine {
    config: NativeRailConfig,
    client: reqwest::Client,
}

impl NativeRailEngine {
    pub fn new(config: NativeRailConfig) -> Self {
        Self {
            config,
            client: http_client(),
        }
    }

    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::new(NativeRailConfig::default())
    }
}

#[async_trait]
impl PaymentEngine for NativeRailEngine {
    fn name(&self) -> &'static str {
        "native-rail"
    }

    fn protocol(&self) -> &'static str {
        "HOT Partner API"
    }

    fn is_configured(&self) -> bool {
        self.config.jwt.is_some()
    }

    async fn distribute(&self, request: &DistributionRequest) -> Result<EngineReceipt> {
        let Some(jwt) = self.config.jwt.as_deref() else {
            if self.config.production {
                return Err(PaymentError::NotConfigured {
                    message: "Missing NATIVE_RAIL_JWT in production mode".to_string(),
                });
            }
            tracing::info!(
                split_id = %request.split_id,
                "Native rail in mock mode, no API call made"
            );
            return Ok(EngineReceipt {
                tx_hash: mock_tx_hash(),
                intent_id: None,
                status: "completed".to_string(),
                payment_url: None,
                mock: true,
            });
        };

        let body = MerchantItemRequest {
            merchant_id: &self.config.merchant_id,
            memo: format!(
                "gitsplits-{}-{}",
                request.split_id,
                chrono::Utc::now().timestamp_millis()
            ),
            header: format!("GitSplits payout {}", request.split_id),
            description: format!("Distribution for {} recipients", request.recipients.len()),
            token: &request.token,
            amount: request.amount,
            webhook_url: &self.config.webhook_url,
        };

        let url = format!("{}/partners/merchant_item", self.config.api_base.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("Authorization", jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Network {
                engine: self.name().to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(PaymentError::Rejected {
                engine: self.name().to_string(),
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let parsed: MerchantItemResponse =
            resp.json().await.map_err(|e| PaymentError::InvalidResponse {
                engine: self.name().to_string(),
                message: e.to_string(),
            })?;

        let item_id = parsed.item_id.or(parsed.id).filter(|id| !id.is_empty());
        Ok(EngineReceipt {
            tx_hash: item_id.clone().unwrap_or_else(|| "0x".to_string()),
            payment_url: item_id.as_ref().map(|id| {
                format!("{}?item_id={}&amount={}", NATIVE_PAYMENT_PAGE, id, request.amount)
            }),
            intent_id: item_id,
            status: parsed.status.unwrap_or_else(|| "created".to_string()),
            mock: false,
        })
    }
}
