//! Engine selection and single-fallback failover

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::engine::*;

/// Phrases in the user's text that ask for the native rail explicitly
pub const NATIVE_RAIL_HINTS: [&str; 2] = ["hotpay", "hot pay"];

/// Which engine settled a payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineTag {
    #[serde(rename = "engineA")]
    EngineA,
    #[serde(rename = "engineB")]
    EngineB,
    #[serde(rename = "engineB_fallback")]
    EngineBFallback,
}

impl EngineTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EngineA => "engineA",
            Self::EngineB => "engineB",
            Self::EngineBFallback => "engineB_fallback",
        }
    }
}

impl fmt::Display for EngineTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    pub status: String,
    pub recipients: usize,
    pub total_amount: f64,
    pub token: String,
    pub engine: EngineTag,
    /// Name of the engine that settled
    pub provider: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub mock: bool,
}

/// Routes payouts between the cross-chain rail (A) and the native rail (B)
#[derive(Clone)]
pub struct PaymentOrchestrator {
    intents: Arc<dyn PaymentEngine>,
    native: Arc<dyn PaymentEngine>,
    native_token: String,
}

impl PaymentOrchestrator {
    pub fn new(
        intents: Arc<dyn PaymentEngine>,
        native: Arc<dyn PaymentEngine>,
        native_token: impl Into<String>,
    ) -> Self {
        Self {
            intents,
            native,
            native_token: native_token.into().to_uppercase(),
        }
    }

    /// Both rails built from the environment
    pub fn from_env(native_token: impl Into<String>) -> Self {
        Self::new(
            Arc::new(crate::rails::IntentsRailEngine::from_env()),
            Arc::new(crate::rails::NativeRailEngine::from_env()),
            native_token,
        )
    }

    /// Native token or an explicit hint selects engine B first
    pub fn prefers_native(&self, token: &str, hint_text: &str) -> bool {
        if token.to_uppercase() == self.native_token {
            return true;
        }
        let lower = hint_text.to_lowercase();
        NATIVE_RAIL_HINTS.iter().any(|hint| lower.contains(hint))
    }

    /// Distribute a payout with at most one fallback attempt
    ///
    /// Returns the error of the last engine tried when the payout fails.
    pub async fn distribute(
        &self,
        request: &DistributionRequest,
        hint_text: &str,
    ) -> Result<DistributionResult> {
        if self.prefers_native(&request.token, hint_text) {
            let receipt = self.native.distribute(request).await?;
            return Ok(self.result(request, receipt, EngineTag::EngineB, self.native.as_ref()));
        }

        match self.intents.distribute(request).await {
            Ok(receipt) => Ok(self.result(
                request,
                receipt,
                EngineTag::EngineA,
                self.intents.as_ref(),
            )),
            Err(err) if self.native.is_configured() => {
                tracing::warn!(
                    split_id = %request.split_id,
                    error = %err,
                    "Intents rail failed, falling back to native rail"
                );
                let receipt = self.native.distribute(request).await?;
                Ok(self.result(
                    request,
                    receipt,
                    EngineTag::EngineBFallback,
                    self.native.as_ref(),
                ))
            }
            Err(err) => Err(err),
        }
    }

    fn result(
        &self,
        request: &DistributionRequest,
        receipt: EngineReceipt,
        engine: EngineTag,
        settled_by: &dyn PaymentEngine,
    ) -> DistributionResult {
        tracing::info!(
            split_id = %request.split_id,
            engine = %engine,
            mock = receipt.mock,
            "Payout distributed"
        );
        DistributionResult {
            tx_hash: receipt.tx_hash,
            intent_id: receipt.intent_id,
            status: receipt.status,
            recipients: request.recipients.len(),
            total_amount: request.amount,
            token: request.token.clone(),
            engine,
            provider: settled_by.name().to_string(),
            protocol: settled_by.protocol().to_string(),
            payment_url: receipt.payment_url,
            mock: receipt.mock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEngine {
        name: &'static str,
        configured: bool,
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn ok(name: &'static str, configured: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured,
                fail_with: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str, configured: bool, message: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured,
                fail_with: Some(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentEngine for StubEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        fn protocol(&self) -> &'static str {
            "stub"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn distribute(&self, _request: &DistributionRequest) -> Result<EngineReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(PaymentError::Network {
                    engine: self.name.to_string(),
                    message: message.clone(),
                }),
                None => Ok(EngineReceipt {
                    tx_hash: format!("0x{}", self.name),
                    intent_id: None,
                    status: "completed".to_string(),
                    payment_url: None,
                    mock: true,
                }),
            }
        }
    }

    fn request(token: &str) -> DistributionRequest {
        DistributionRequest {
            split_id: "split-1".to_string(),
            amount: 50.0,
            token: token.to_string(),
            recipients: vec![
                PayoutRecipient {
                    wallet: "alice.near".to_string(),
                    percentage: 60.0,
                },
                PayoutRecipient {
                    wallet: "bob.near".to_string(),
                    percentage: 40.0,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_non_native_token_uses_engine_a() {
        let a = StubEngine::ok("a", true);
        let b = StubEngine::ok("b", true);
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "NATIVE");
        let result = orchestrator.distribute(&request("USDC"), "pay 50 USDC").await.unwrap();
        assert_eq!(result.engine, EngineTag::EngineA);
        assert_eq!(result.tx_hash, "0xa");
        assert_eq!(result.recipients, 2);
        assert_eq!((a.calls(), b.calls()), (1, 0));
    }

    #[tokio::test]
    async fn test_native_token_and_hint_prefer_engine_b() {
        let a = StubEngine::ok("a", true);
        let b = StubEngine::ok("b", true);
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "native");

        let result = orchestrator.distribute(&request("NATIVE"), "").await.unwrap();
        assert_eq!(result.engine, EngineTag::EngineB);

        let result = orchestrator
            .distribute(&request("USDC"), "pay via HotPay please")
            .await
            .unwrap();
        assert_eq!(result.engine, EngineTag::EngineB);
        assert_eq!((a.calls(), b.calls()), (0, 2));
    }

    #[tokio::test]
    async fn test_engine_a_failure_falls_back_once() {
        let a = StubEngine::failing("a", true, "timeout");
        let b = StubEngine::ok("b", true);
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "NATIVE");
        let result = orchestrator.distribute(&request("USDC"), "").await.unwrap();
        assert_eq!(result.engine, EngineTag::EngineBFallback);
        assert_eq!(result.provider, "b");
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_no_fallback_without_engine_b_credentials() {
        let a = StubEngine::failing("a", true, "timeout");
        let b = StubEngine::ok("b", false);
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "NATIVE");
        let err = orchestrator.distribute(&request("USDC"), "").await.unwrap_err();
        assert_eq!(
            err,
            PaymentError::Network {
                engine: "a".to_string(),
                message: "timeout".to_string(),
            }
        );
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_both_engines_fail_surfaces_last_error() {
        let a = StubEngine::failing("a", true, "timeout");
        let b = StubEngine::failing("b", true, "rejected");
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "NATIVE");
        let err = orchestrator.distribute(&request("USDC"), "").await.unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_preferred_engine_b_failure_never_tries_a() {
        let a = StubEngine::ok("a", true);
        let b = StubEngine::failing("b", true, "down");
        let orchestrator = PaymentOrchestrator::new(a.clone(), b.clone(), "NATIVE");
        assert!(orchestrator.distribute(&request("NATIVE"), "").await.is_err());
        assert_eq!(a.calls(), 0);
    }

    #[test]
    fn test_engine_tag_serialization() {
        assert_eq!(
            serde_json::to_string(&EngineTag::EngineBFallback).unwrap(),
            "\"engineB_fallback\""
        );
    }
}
