use alloy::primitives::Address;
use async_trait::async_trait;
use proofport_primitives::attestation::RpcTransactionFields;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::{AgentError, Result};

/// Source of a user's on-chain attestation transaction. Returns the decoded
/// RPC fields so the caller can reconstruct the byte-exact raw transaction.
#[async_trait]
pub trait AttestationSource: Send + Sync {
    async fn attestation_transaction(&self, recipient: Address) -> Result<RpcTransactionFields>;
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<AttestationsData>,
}

#[derive(Deserialize)]
struct AttestationsData {
    attestations: Vec<AttestationRow>,
}

#[derive(Deserialize)]
struct AttestationRow {
    txid: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<RpcTransactionFields>,
    error: Option<serde_json::Value>,
}

/// EAS-backed implementation: the indexer's GraphQL endpoint resolves the
/// recipient's latest attestation txid, then the chain RPC supplies the
/// decoded transaction fields.
pub struct EasClient {
    http: reqwest::Client,
    graphql_endpoint: Url,
    rpc_url: Url,
}

impl EasClient {
    pub fn new(graphql_endpoint: Url, rpc_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            graphql_endpoint,
            rpc_url,
        }
    }

    async fn latest_attestation_txid(&self, recipient: Address) -> Result<String> {
        let query = json!({
            "query": "query Attestations($recipient: String!) { \
                attestations(where: { recipient: { equals: $recipient } }, \
                orderBy: [{ time: desc }], take: 1) { txid } }",
            "variables": { "recipient": format!("{recipient:#x}") },
        });

        let response: GraphqlResponse = self
            .http
            .post(self.graphql_endpoint.clone())
            .json(&query)
            .send()
            .await
            .map_err(|e| AgentError::Rpc(format!("EAS indexer request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AgentError::Rpc(format!("EAS indexer response malformed: {e}")))?;

        response
            .data
            .and_then(|d| d.attestations.into_iter().next())
            .map(|row| row.txid)
            .ok_or_else(|| {
                AgentError::Validation(format!("No attestation found for {recipient:#x}"))
            })
    }

    async fn transaction_by_hash(&self, txid: &str) -> Result<RpcTransactionFields> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getTransactionByHash",
            "params": [txid],
        });

        let response: RpcResponse = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Rpc(format!("rpc request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AgentError::Rpc(format!("rpc response malformed: {e}")))?;

        if let Some(error) = response.error {
            return Err(AgentError::Rpc(format!("rpc error: {error}")));
        }
        response.result.ok_or_else(|| {
            AgentError::Validation(format!("Attestation transaction {txid} not found on chain"))
        })
    }
}

#[async_trait]
impl AttestationSource for EasClient {
    async fn attestation_transaction(&self, recipient: Address) -> Result<RpcTransactionFields> {
        let txid = self.latest_attestation_txid(recipient).await?;
        tracing::info!(recipient = %recipient, txid, "resolved attestation transaction");
        self.transaction_by_hash(&txid).await
    }
}
