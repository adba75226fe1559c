use std::time::Duration;

use kit::futures::FutureExt;
use kit::reqwest::{self, header::CONTENT_TYPE};
use kit::serde_json;
use kit::services::{BroadcastService, ServiceFuture};
use kit::types::network::Network;
use kit::types::wallet::{BroadcastOutcome, SignedTransaction};

#[derive(Debug, Clone, Deserialize)]
struct NodeRejection {
    error: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Broadcasts through a Stacks node's `/v2/transactions` endpoint.
#[derive(Debug, Clone)]
pub struct StacksNodeBroadcaster {
    client: reqwest::Client,
    timeout: Duration,
}

impl StacksNodeBroadcaster {
    pub fn new(timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), timeout }
    }

    pub async fn post_transaction(
        &self,
        transaction: &SignedTransaction,
        network: &Network,
    ) -> Result<BroadcastOutcome, String> {
        let res = self
            .client
            .post(network.broadcast_endpoint())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(transaction.tx_bytes.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Failed to reach {}: {}", network.url, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| format!("Failed to read node response: {}", e))?;
        if status.is_success() {
            let tx_id = serde_json::from_str::<String>(&body)
                .unwrap_or_else(|_| body.trim().trim_matches('"').to_string());
            let tx_id = match tx_id.strip_prefix("0x") {
                Some(stripped) => format!("0x{}", stripped),
                None => format!("0x{}", tx_id),
            };
            return Ok(BroadcastOutcome::Accepted { tx_id });
        }

        let reason = match serde_json::from_str::<NodeRejection>(&body) {
            Ok(rejection) => rejection.reason.unwrap_or(rejection.error),
            Err(_) if body.trim().is_empty() => format!("node responded with status {}", status),
            Err(_) => body.trim().to_string(),
        };
        Ok(BroadcastOutcome::Rejected { reason })
    }
}

impl BroadcastService for StacksNodeBroadcaster {
    fn broadcast<'a>(
        &'a self,
        transaction: &'a SignedTransaction,
        network: &'a Network,
    ) -> ServiceFuture<'a, Result<BroadcastOutcome, String>> {
        self.post_transaction(transaction, network).boxed()
    }
}
