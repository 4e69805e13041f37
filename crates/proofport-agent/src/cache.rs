use std::sync::Arc;

use alloy::primitives::keccak256;
use proofport_primitives::circuits::CircuitId;

use crate::error::{AgentError, Result};
use crate::store::KeyValueStore;
use crate::types::ProofResult;

/// Fingerprint of the request parameters that determine a proof. Country
/// fields participate only when present so the two circuits never collide.
pub fn request_fingerprint(
    circuit_id: CircuitId,
    address: &str,
    scope: &str,
    country_list: Option<&[String]>,
    is_included: Option<bool>,
) -> String {
    let mut preimage = format!(
        "{}|{}|{}",
        circuit_id.as_str(),
        address.to_lowercase(),
        scope
    );
    if let Some(countries) = country_list {
        preimage.push('|');
        preimage.push_str(&countries.join(","));
    }
    if let Some(included) = is_included {
        preimage.push('|');
        preimage.push_str(if included { "1" } else { "0" });
    }
    hex::encode(keccak256(preimage.as_bytes()))
}

/// Memoizes computed proofs keyed by request fingerprint.
#[derive(Clone)]
pub struct ProofCache<S> {
    store: Arc<S>,
    ttl_seconds: u64,
}

impl<S: KeyValueStore> ProofCache<S> {
    pub fn new(store: Arc<S>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<ProofResult>> {
        match self.store.get(&format!("proofcache:{fingerprint}")).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode(&raw)?)),
        }
    }

    pub async fn put(&self, fingerprint: &str, result: &ProofResult) -> Result<()> {
        let raw = encode(result)?;
        self.store
            .set(
                &format!("proofcache:{fingerprint}"),
                &raw,
                Some(self.ttl_seconds),
            )
            .await
    }
}

/// Durable storage of computed proofs keyed by proof id, for later
/// `verify_proof` retrieval. Written once, never rewritten.
#[derive(Clone)]
pub struct ProofResultStore<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> ProofResultStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn put(&self, result: &ProofResult) -> Result<()> {
        let raw = encode(result)?;
        self.store
            .set(&format!("proof:{}", result.proof_id), &raw, None)
            .await
    }

    pub async fn get(&self, proof_id: &str) -> Result<Option<ProofResult>> {
        match self.store.get(&format!("proof:{proof_id}")).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode(&raw)?)),
        }
    }
}

fn encode(result: &ProofResult) -> Result<String> {
    serde_json::to_string(result)
        .map_err(|e| AgentError::Store(format!("serialize proof result: {e}")))
}

fn decode(raw: &str) -> Result<ProofResult> {
    serde_json::from_str(raw).map_err(|e| AgentError::Store(format!("decode proof result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::fresh_id;

    fn sample_result() -> ProofResult {
        ProofResult {
            proof: "deadbeef".into(),
            public_inputs: "cafebabe".into(),
            nullifier: "0x11".into(),
            signal_hash: "0x22".into(),
            proof_id: fresh_id(),
            verify_url: "https://verify.example/proof/x".into(),
            payment_tx_hash: None,
            payment_receipt_url: None,
        }
    }

    #[test]
    fn fingerprint_binds_all_parameters() {
        let base = request_fingerprint(
            CircuitId::CoinbaseAttestation,
            "0xAbC",
            "myapp.com",
            None,
            None,
        );
        // address comparison is case-insensitive
        assert_eq!(
            base,
            request_fingerprint(
                CircuitId::CoinbaseAttestation,
                "0xabc",
                "myapp.com",
                None,
                None
            )
        );
        assert_ne!(
            base,
            request_fingerprint(
                CircuitId::CoinbaseAttestation,
                "0xabc",
                "other.com",
                None,
                None
            )
        );
        assert_ne!(
            base,
            request_fingerprint(
                CircuitId::CoinbaseCountryAttestation,
                "0xabc",
                "myapp.com",
                Some(&["US".to_string()]),
                Some(true)
            )
        );
    }

    #[tokio::test]
    async fn cache_round_trip() {
        let cache = ProofCache::new(MemoryStore::new(), 300);
        let result = sample_result();
        let fp = request_fingerprint(
            CircuitId::CoinbaseAttestation,
            "0xabc",
            "myapp.com",
            None,
            None,
        );
        assert!(cache.get(&fp).await.unwrap().is_none());
        cache.put(&fp, &result).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap(), Some(result));
    }

    #[tokio::test]
    async fn result_store_round_trip_by_proof_id() {
        let results = ProofResultStore::new(MemoryStore::new());
        let result = sample_result();
        results.put(&result).await.unwrap();
        assert_eq!(
            results.get(&result.proof_id).await.unwrap(),
            Some(result.clone())
        );
        assert!(results.get("unknown").await.unwrap().is_none());
    }
}
