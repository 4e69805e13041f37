use serde::{Deserialize, Serialize};

/// Raw output of a prover backend, hex-encoded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProverOutput {
    pub proof: String,
    pub public_inputs: String,
}

/// Final result handed back to the caller and stored under its proof id.
/// Written once, immutable thereafter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProofResult {
    pub proof: String,
    pub public_inputs: String,
    pub nullifier: String,
    pub signal_hash: String,
    pub proof_id: String,
    pub verify_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_receipt_url: Option<String>,
}

/// Outcome of on-chain verification. A verifier revert is an expected,
/// informative result rather than a fault, so it lands here instead of in an
/// error.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Generates an opaque 32-hex-char identifier for requests, flows and proofs.
pub fn fresh_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique_hex() {
        let a = fresh_id();
        let b = fresh_id();
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn proof_result_omits_absent_payment_fields() {
        let result = ProofResult {
            proof: "aa".into(),
            public_inputs: "bb".into(),
            nullifier: "0x11".into(),
            signal_hash: "0x22".into(),
            proof_id: fresh_id(),
            verify_url: "https://verify.example/proof/x".into(),
            payment_tx_hash: None,
            payment_receipt_url: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("paymentTxHash").is_none());
        assert_eq!(json["publicInputs"], "bb");
    }
}
