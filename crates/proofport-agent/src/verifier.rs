use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use async_trait::async_trait;
use url::Url;

use crate::error::{AgentError, Result};
use crate::types::VerifyOutcome;

sol! {
    #[sol(rpc)]
    interface IHonkVerifier {
        function verify(bytes calldata proof, bytes32[] calldata publicInputs)
            external
            view
            returns (bool);
    }
}

/// On-chain verification collaborator. A revert is an expected domain
/// outcome and comes back as `VerifyOutcome { valid: false, error }`; only
/// transport-level failures are errors.
#[async_trait]
pub trait OnchainVerifier: Send + Sync {
    async fn verify(
        &self,
        verifier: Address,
        proof: Bytes,
        public_inputs: Vec<B256>,
    ) -> Result<VerifyOutcome>;
}

/// Calls the deployed UltraHonk Solidity verifier over HTTP RPC.
#[derive(Clone, Debug)]
pub struct HonkVerifierClient {
    rpc_url: Url,
}

impl HonkVerifierClient {
    pub fn new(rpc_url: Url) -> Self {
        Self { rpc_url }
    }
}

#[async_trait]
impl OnchainVerifier for HonkVerifierClient {
    async fn verify(
        &self,
        verifier: Address,
        proof: Bytes,
        public_inputs: Vec<B256>,
    ) -> Result<VerifyOutcome> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IHonkVerifier::new(verifier, provider);

        match contract.verify(proof, public_inputs).call().await {
            Ok(result) => {
                if result._0 {
                    Ok(VerifyOutcome::valid())
                } else {
                    Ok(VerifyOutcome {
                        valid: false,
                        error: None,
                    })
                }
            }
            Err(alloy::contract::Error::TransportError(err))
                if err.as_error_resp().is_some() =>
            {
                // node reported an execution revert
                let message = err
                    .as_error_resp()
                    .map(|resp| resp.message.to_string())
                    .unwrap_or_else(|| err.to_string());
                Ok(VerifyOutcome::invalid(message))
            }
            Err(other) => Err(AgentError::Rpc(format!("verifier call failed: {other}"))),
        }
    }
}
