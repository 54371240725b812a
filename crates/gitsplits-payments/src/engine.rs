//! Payment engine capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by payment engines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("{message}")]
    NotConfigured { message: String },

    #[error("{engine} error ({status}): {message}")]
    Rejected {
        engine: String,
        status: u16,
        message: String,
    },

    #[error("{engine} request failed: {message}")]
    Network { engine: String, message: String },

    #[error("{engine} returned an unreadable response: {message}")]
    InvalidResponse { engine: String, message: String },
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// A recipient wallet and its share of the payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecipient {
    pub wallet: String,
    pub percentage: f64,
}

/// Input to a single distribution call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub split_id: String,
    pub amount: f64,
    pub token: String,
    pub recipients: Vec<PayoutRecipient>,
}

impl DistributionRequest {
    /// Absolute amount for each recipient
    pub fn shares(&self) -> Vec<(String, f64)> {
        self.recipients
            .iter()
            .map(|r| (r.wallet.clone(), self.amount * r.percentage / 100.0))
            .collect()
    }
}

/// What an engine returns for an accepted distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReceipt {
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    /// No external call was made
    pub mock: bool,
}

/// A rail that can move funds to many recipients in one call
#[async_trait]
pub trait PaymentEngine: Send + Sync {
    /// Get the engine name
    fn name(&self) -> &'static str;

    /// Human-readable protocol shown to users
    fn protocol(&self) -> &'static str;

    /// Whether real credentials are present
    fn is_configured(&self) -> bool;

    /// Distribute funds; timeouts surface as errors like any other failure
    async fn distribute(&self, request: &DistributionRequest) -> Result<EngineReceipt>;
}

/// `0x` followed by 32 random hex chars, used for mock receipts
pub fn mock_tx_hash() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_follow_percentages() {
        let request = DistributionRequest {
            split_id: "split-1".to_string(),
            amount: 200.0,
            token: "USDC".to_string(),
            recipients: vec![
                PayoutRecipient {
                    wallet: "alice.near".to_string(),
                    percentage: 75.0,
                },
                PayoutRecipient {
                    wallet: "bob.near".to_string(),
                    percentage: 25.0,
                },
            ],
        };
        assert_eq!(
            request.shares(),
            vec![("alice.near".to_string(), 150.0), ("bob.near".to_string(), 50.0)]
        );
    }

    #[test]
    fn test_mock_tx_hash_shape() {
        let hash = mock_tx_hash();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 34);
        assert_ne!(hash, mock_tx_hash());
    }
}
