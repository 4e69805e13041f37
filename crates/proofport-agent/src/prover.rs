use std::path::PathBuf;

use async_trait::async_trait;
use proofport_primitives::circuits::CircuitId;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;

use crate::error::{AgentError, Result};
use crate::types::ProverOutput;

/// Opaque proof-generation collaborator. Implementations receive the
/// fully-assembled decimal-string witness vector and return hex-encoded
/// proof bytes plus public inputs.
#[async_trait]
pub trait ProverBackend: Send + Sync {
    async fn prove(&self, circuit_id: CircuitId, inputs: &[String]) -> Result<ProverOutput>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CliProverParams<'a> {
    circuit_id: &'a str,
    inputs: &'a [String],
    on_chain: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliProverOutputFile {
    proof: String,
    public_inputs: String,
}

/// Local prover: spawns the external proving binary with a JSON params file
/// and reads the proof back from an output file.
pub struct CliProver {
    binary: PathBuf,
}

impl CliProver {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

#[async_trait]
impl ProverBackend for CliProver {
    async fn prove(&self, circuit_id: CircuitId, inputs: &[String]) -> Result<ProverOutput> {
        let mut params_file =
            NamedTempFile::new().map_err(|e| AgentError::Prover(e.to_string()))?;
        let output_file = NamedTempFile::new().map_err(|e| AgentError::Prover(e.to_string()))?;

        serde_json::to_writer(
            &mut params_file,
            &CliProverParams {
                circuit_id: circuit_id.as_str(),
                inputs,
                on_chain: true,
            },
        )
        .map_err(|e| AgentError::Prover(e.to_string()))?;

        tracing::info!(
            circuit = circuit_id.as_str(),
            inputs = inputs.len(),
            "invoking local prover"
        );
        let output = tokio::process::Command::new(&self.binary)
            .arg("--params")
            .arg(params_file.path())
            .arg("--output")
            .arg(output_file.path())
            .output()
            .await
            .map_err(|e| AgentError::Prover(e.to_string()))?;

        if !output.status.success() {
            return Err(AgentError::Prover(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let raw = std::fs::read_to_string(output_file.path())
            .map_err(|e| AgentError::Prover(e.to_string()))?;
        let parsed: CliProverOutputFile = serde_json::from_str(&raw)
            .map_err(|e| AgentError::Prover(format!("malformed prover output: {e}")))?;
        Ok(ProverOutput {
            proof: parsed.proof,
            public_inputs: parsed.public_inputs,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnclaveProveRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    request_id: String,
    circuit_id: &'a str,
    inputs: &'a [String],
}

/// Enclave responses are tagged: `proof` on success, `error` when the
/// enclave reports a failure. Enclave errors are surfaced verbatim.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum EnclaveResponse {
    #[serde(rename = "proof")]
    Proof {
        proof: String,
        #[serde(rename = "publicInputs")]
        public_inputs: Vec<String>,
    },
    #[serde(rename = "error")]
    Error { error: String },
}

/// Remote TEE prover, reached through the host-side vsock bridge.
pub struct EnclaveProver {
    client: reqwest::Client,
    endpoint: Url,
}

impl EnclaveProver {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ProverBackend for EnclaveProver {
    async fn prove(&self, circuit_id: CircuitId, inputs: &[String]) -> Result<ProverOutput> {
        tracing::info!(
            circuit = circuit_id.as_str(),
            inputs = inputs.len(),
            "invoking enclave prover"
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EnclaveProveRequest {
                kind: "prove",
                request_id: crate::types::fresh_id(),
                circuit_id: circuit_id.as_str(),
                inputs,
            })
            .send()
            .await
            .map_err(|e| AgentError::Prover(format!("enclave unreachable: {e}")))?;

        let parsed: EnclaveResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Prover(format!("malformed enclave response: {e}")))?;

        match parsed {
            EnclaveResponse::Proof {
                proof,
                public_inputs,
            } => {
                let public_inputs = public_inputs
                    .iter()
                    .map(|chunk| chunk.strip_prefix("0x").unwrap_or(chunk))
                    .collect::<String>();
                Ok(ProverOutput {
                    proof: proof.strip_prefix("0x").unwrap_or(&proof).to_string(),
                    public_inputs,
                })
            }
            EnclaveResponse::Error { error } => Err(AgentError::Prover(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclave_proof_response_parses() {
        let json = r#"{"type":"proof","requestId":"r1","proof":"0xdead","publicInputs":["0x11","0x22"]}"#;
        let parsed: EnclaveResponse = serde_json::from_str(json).unwrap();
        match parsed {
            EnclaveResponse::Proof {
                proof,
                public_inputs,
            } => {
                assert_eq!(proof, "0xdead");
                assert_eq!(public_inputs, vec!["0x11", "0x22"]);
            }
            EnclaveResponse::Error { .. } => panic!("expected proof"),
        }
    }

    #[test]
    fn enclave_error_response_parses() {
        let json = r#"{"type":"error","requestId":"r1","error":"nargo execute failed (exit 1)"}"#;
        let parsed: EnclaveResponse = serde_json::from_str(json).unwrap();
        match parsed {
            EnclaveResponse::Error { error } => {
                assert_eq!(error, "nargo execute failed (exit 1)");
            }
            EnclaveResponse::Proof { .. } => panic!("expected error"),
        }
    }

    #[tokio::test]
    async fn cli_prover_surfaces_spawn_failure() {
        let prover = CliProver::new(PathBuf::from("/nonexistent/prover-binary"));
        let err = prover
            .prove(CircuitId::CoinbaseAttestation, &["1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Prover(_)));
    }
}
