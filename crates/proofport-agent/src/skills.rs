use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proofport_primitives::circuits::{explorer_base_url, CircuitId, CircuitInfo, CIRCUITS};
use serde::{Deserialize, Serialize};

use crate::cache::{request_fingerprint, ProofCache, ProofResultStore};
use crate::eas::AttestationSource;
use crate::error::{AgentError, Result};
use crate::flow::ProofGenerator;
use crate::params::{compute_circuit_params, validate_request_fields, ProofRequestInputs};
use crate::payment::{PaymentProvider, PaymentRequest};
use crate::prover::ProverBackend;
use crate::rate_limit::RateLimiter;
use crate::session::{PaymentStatus, SigningRecord, SigningSessionStore};
use crate::store::KeyValueStore;
use crate::types::{fresh_id, ProofResult, VerifyOutcome};
use crate::verifier::OnchainVerifier;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequestResponse {
    pub request_id: String,
    pub signing_url: String,
    pub expires_at: DateTime<Utc>,
    pub circuit_id: CircuitId,
    pub scope: String,
}

/// Phase a status poll reports, derived from the record rather than stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    Expired,
    Signing,
    Payment,
    Ready,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningStatusInfo {
    pub status: crate::session::SigningStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusInfo {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub request_id: String,
    pub phase: StatusPhase,
    pub circuit_id: CircuitId,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub signing: SigningStatusInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentStatusInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestResponse {
    pub request_id: String,
    #[serde(flatten)]
    pub payment: PaymentRequest,
}

/// The two ways a proof request arrives: by consuming a signed session, or
/// with the signature material supplied inline.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum GenerateProofRequest {
    Session {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Direct {
        #[serde(rename = "circuitId")]
        circuit_id: String,
        address: String,
        signature: String,
        scope: String,
        #[serde(rename = "countryList")]
        country_list: Option<Vec<String>>,
        #[serde(rename = "isIncluded")]
        is_included: Option<bool>,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateProofResponse {
    #[serde(flatten)]
    pub result: ProofResult,
    pub cached: bool,
}

/// Public inputs as accepted on the wire: either an already-chunked array or
/// one contiguous hex string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum PublicInputs {
    Chunks(Vec<String>),
    Hex(String),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedCircuit {
    #[serde(flatten)]
    pub info: CircuitInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedCircuits {
    pub chain_id: u64,
    pub circuits: Vec<SupportedCircuit>,
}

fn parse_circuit(circuit_id: &str) -> Result<CircuitId> {
    Ok(CircuitId::try_from(circuit_id)?)
}

fn decode_hex_field(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|e| AgentError::Validation(format!("Invalid hex in {name}: {e}")))
}

/// Splits the caller's public inputs into 32-byte field elements. Array items
/// are left-padded numerics; a contiguous hex string is chunked with the
/// final partial chunk zero-padded on the right.
pub fn normalize_public_inputs(inputs: &PublicInputs) -> Result<Vec<B256>> {
    match inputs {
        PublicInputs::Chunks(chunks) => {
            if chunks.is_empty() {
                return Err(AgentError::Validation(
                    "publicInputs must not be empty".to_string(),
                ));
            }
            chunks
                .iter()
                .map(|chunk| {
                    let bytes = decode_hex_field("publicInputs", chunk)?;
                    if bytes.len() > 32 {
                        return Err(AgentError::Validation(format!(
                            "public input chunk exceeds 32 bytes: {} bytes",
                            bytes.len()
                        )));
                    }
                    let mut word = [0u8; 32];
                    word[32 - bytes.len()..].copy_from_slice(&bytes);
                    Ok(B256::from(word))
                })
                .collect()
        }
        PublicInputs::Hex(hex_string) => {
            let bytes = decode_hex_field("publicInputs", hex_string)?;
            if bytes.is_empty() {
                return Err(AgentError::Validation(
                    "publicInputs must not be empty".to_string(),
                ));
            }
            Ok(bytes
                .chunks(32)
                .map(|chunk| {
                    let mut word = [0u8; 32];
                    word[..chunk.len()].copy_from_slice(chunk);
                    B256::from(word)
                })
                .collect())
        }
    }
}

/// The agent's operation surface. Each call runs to completion against the
/// shared store; nothing in-process is authoritative between calls, so any
/// operation can be retried against another instance.
pub struct SkillHandler<S> {
    sessions: SigningSessionStore<S>,
    results: ProofResultStore<S>,
    rate_limiter: Option<RateLimiter<S>>,
    cache: Option<ProofCache<S>>,
    prover: Arc<dyn ProverBackend>,
    attestations: Arc<dyn AttestationSource>,
    payment: Arc<dyn PaymentProvider>,
    verifier: Arc<dyn OnchainVerifier>,
    allowlist: Vec<Address>,
    chain_id: u64,
    signing_base_url: Option<String>,
}

impl<S: KeyValueStore> SkillHandler<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        signing_ttl_seconds: u64,
        prover: Arc<dyn ProverBackend>,
        attestations: Arc<dyn AttestationSource>,
        payment: Arc<dyn PaymentProvider>,
        verifier: Arc<dyn OnchainVerifier>,
        allowlist: Vec<Address>,
        chain_id: u64,
        signing_base_url: Option<String>,
    ) -> Self {
        Self {
            sessions: SigningSessionStore::new(store.clone(), signing_ttl_seconds),
            results: ProofResultStore::new(store),
            rate_limiter: None,
            cache: None,
            prover,
            attestations,
            payment,
            verifier,
            allowlist,
            chain_id,
            signing_base_url,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter<S>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_cache(mut self, cache: ProofCache<S>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sessions(&self) -> &SigningSessionStore<S> {
        &self.sessions
    }

    /// Opens a pending signing session and hands back the URL the wallet
    /// owner visits to sign.
    pub async fn request_signing(
        &self,
        circuit_id: &str,
        scope: &str,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
    ) -> Result<SigningRequestResponse> {
        let circuit = parse_circuit(circuit_id)?;
        validate_request_fields(circuit, scope, country_list.as_deref(), is_included)?;
        let base = self.signing_base_url.as_ref().ok_or_else(|| {
            AgentError::NotConfigured("no signing base URL configured".to_string())
        })?;

        let record = self
            .sessions
            .create(circuit, scope.trim().to_string(), country_list, is_included)
            .await?;
        tracing::info!(
            request_id = record.id,
            circuit = circuit.as_str(),
            "opened signing session"
        );
        Ok(SigningRequestResponse {
            signing_url: format!("{}/sign/{}", base.trim_end_matches('/'), record.id),
            request_id: record.id,
            expires_at: record.expires_at,
            circuit_id: circuit,
            scope: scope.trim().to_string(),
        })
    }

    /// Reports where a signing session stands. The phase is derived fresh on
    /// every call; the verifier address appears only once the session is
    /// ready to prove.
    pub async fn check_status(&self, request_id: &str) -> Result<StatusResponse> {
        let record = self.sessions.get(request_id).await?.ok_or_else(|| {
            AgentError::NotFoundOrExpired(format!("signing request {request_id}"))
        })?;

        let phase = if record.is_expired() {
            StatusPhase::Expired
        } else if !record.is_signed() {
            StatusPhase::Signing
        } else if self.payment_owed(&record) {
            StatusPhase::Payment
        } else {
            StatusPhase::Ready
        };

        let explorer = explorer_base_url(self.chain_id);
        let payment = record.payment_status.map(|status| PaymentStatusInfo {
            status,
            tx_hash: record.payment_tx_hash.clone(),
            receipt_url: record
                .payment_tx_hash
                .as_ref()
                .map(|hash| format!("{explorer}/tx/{hash}")),
        });
        let verifier_address = (phase == StatusPhase::Ready)
            .then(|| record.circuit_id.verifier_address(self.chain_id))
            .flatten();

        Ok(StatusResponse {
            request_id: record.id.clone(),
            phase,
            circuit_id: record.circuit_id,
            scope: record.scope.clone(),
            expires_at: record.expires_at,
            signing: SigningStatusInfo {
                status: record.status,
                address: record.address.clone(),
            },
            payment,
            verifier_address: verifier_address.map(|addr| format!("{addr:#x}")),
            verifier_url: verifier_address.map(|addr| format!("{explorer}/address/{addr:#x}")),
        })
    }

    /// Marks the session as awaiting payment and mints the payment URL.
    /// Preconditions are checked in order: the session must exist, be
    /// signed, payment must be enabled, and must not already be settled.
    /// Re-invocation while pending returns the same descriptor.
    pub async fn request_payment(&self, request_id: &str) -> Result<PaymentRequestResponse> {
        let mut record = self.sessions.get(request_id).await?.ok_or_else(|| {
            AgentError::NotFoundOrExpired(format!("signing request {request_id}"))
        })?;
        if !record.is_signed() {
            return Err(AgentError::Validation(
                "signing must be completed before payment".to_string(),
            ));
        }
        if !self.payment.enabled() {
            return Err(AgentError::NotConfigured(
                "payment mode is not enabled".to_string(),
            ));
        }
        if record.payment_status == Some(PaymentStatus::Completed) {
            return Err(AgentError::Validation(
                "payment already completed".to_string(),
            ));
        }

        if record.payment_status.is_none() {
            record.payment_status = Some(PaymentStatus::Pending);
            self.sessions.update(&record).await?;
        }
        Ok(PaymentRequestResponse {
            request_id: record.id,
            payment: self.payment.payment_request(request_id)?,
        })
    }

    /// Produces a proof, in either session or direct mode. Session mode
    /// validates against a live read first, so a premature call leaves the
    /// session intact, then consumes the record atomically; a repeated call
    /// with the same requestId cannot prove twice.
    pub async fn generate_proof(
        &self,
        request: GenerateProofRequest,
    ) -> Result<GenerateProofResponse> {
        match request {
            GenerateProofRequest::Session { request_id } => {
                let preview = self.sessions.get(&request_id).await?.ok_or_else(|| {
                    AgentError::NotFoundOrExpired(format!("signing request {request_id}"))
                })?;
                if preview.is_expired() {
                    return Err(AgentError::NotFoundOrExpired(format!(
                        "signing request {request_id}"
                    )));
                }
                if !preview.is_signed() {
                    return Err(AgentError::Validation(
                        "signing not completed".to_string(),
                    ));
                }
                if self.payment_owed(&preview) {
                    return Err(AgentError::Validation(
                        "payment required before proof generation".to_string(),
                    ));
                }

                // the request is provable; consume the record exactly once
                let record = self.sessions.take(&request_id).await?.ok_or_else(|| {
                    AgentError::NotFoundOrExpired(format!("signing request {request_id}"))
                })?;
                let (address, signature) = match (&record.address, &record.signature) {
                    (Some(address), Some(signature)) => {
                        (address.clone(), signature.clone())
                    }
                    _ => {
                        return Err(AgentError::Validation(
                            "signing not completed".to_string(),
                        ))
                    }
                };
                let inputs = ProofRequestInputs {
                    circuit_id: record.circuit_id,
                    address,
                    signature,
                    scope: record.scope.clone(),
                    country_list: record.country_list.clone(),
                    is_included: record.is_included,
                };
                self.run_pipeline(inputs, record.payment_tx_hash).await
            }
            GenerateProofRequest::Direct {
                circuit_id,
                address,
                signature,
                scope,
                country_list,
                is_included,
            } => {
                let circuit = parse_circuit(&circuit_id)?;
                validate_request_fields(circuit, &scope, country_list.as_deref(), is_included)?;
                // trimmed like the session path, so both modes derive the
                // same signal hash for the same scope
                let inputs = ProofRequestInputs {
                    circuit_id: circuit,
                    address,
                    signature,
                    scope: scope.trim().to_string(),
                    country_list,
                    is_included,
                };
                self.run_pipeline(inputs, None).await
            }
        }
    }

    async fn run_pipeline(
        &self,
        inputs: ProofRequestInputs,
        payment_tx_hash: Option<String>,
    ) -> Result<GenerateProofResponse> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.check(&inputs.address).await?;
        }

        let fingerprint = request_fingerprint(
            inputs.circuit_id,
            &inputs.address,
            &inputs.scope,
            inputs.country_list.as_deref(),
            inputs.is_included,
        );
        if let Some(cache) = &self.cache {
            if let Some(result) = cache.get(&fingerprint).await? {
                tracing::info!(proof_id = result.proof_id, "proof cache hit");
                return Ok(GenerateProofResponse {
                    result,
                    cached: true,
                });
            }
        }

        let assembled =
            compute_circuit_params(&inputs, self.attestations.as_ref(), &self.allowlist).await?;
        let output = self
            .prover
            .prove(inputs.circuit_id, &assembled.inputs)
            .await?;

        let proof_id = fresh_id();
        let explorer = explorer_base_url(self.chain_id);
        let result = ProofResult {
            proof: output.proof,
            public_inputs: output.public_inputs,
            nullifier: format!("{:#x}", assembled.nullifier),
            signal_hash: format!("{:#x}", assembled.signal_hash),
            verify_url: match &self.signing_base_url {
                Some(base) => format!("{}/verify/{proof_id}", base.trim_end_matches('/')),
                None => format!("/verify/{proof_id}"),
            },
            proof_id,
            payment_receipt_url: payment_tx_hash
                .as_ref()
                .map(|hash| format!("{explorer}/tx/{hash}")),
            payment_tx_hash,
        };

        self.results.put(&result).await?;
        if let Some(cache) = &self.cache {
            cache.put(&fingerprint, &result).await?;
        }
        tracing::info!(
            proof_id = result.proof_id,
            circuit = inputs.circuit_id.as_str(),
            "proof generated"
        );
        Ok(GenerateProofResponse {
            result,
            cached: false,
        })
    }

    /// Checks a proof against the deployed on-chain verifier. A verifier
    /// revert reports `{ valid: false, error }` rather than failing the call.
    pub async fn verify_proof(
        &self,
        circuit_id: &str,
        proof: &str,
        public_inputs: PublicInputs,
        chain_id: Option<u64>,
    ) -> Result<VerifyOutcome> {
        let circuit = parse_circuit(circuit_id)?;
        if proof.trim().is_empty() {
            return Err(AgentError::Validation("proof must not be empty".to_string()));
        }
        let chain_id = chain_id.unwrap_or(self.chain_id);
        let verifier_address = circuit.verifier_address(chain_id).ok_or_else(|| {
            AgentError::NoVerifierDeployed {
                circuit: circuit.as_str().to_string(),
                chain_id,
            }
        })?;

        let proof_bytes = Bytes::from(decode_hex_field("proof", proof)?);
        let words = normalize_public_inputs(&public_inputs)?;
        self.verifier
            .verify(verifier_address, proof_bytes, words)
            .await
    }

    /// Static circuit manifest, with the verifier deployment for the
    /// requested chain when one exists.
    pub fn get_supported_circuits(&self, chain_id: Option<u64>) -> SupportedCircuits {
        let chain_id = chain_id.unwrap_or(self.chain_id);
        let explorer = explorer_base_url(chain_id);
        SupportedCircuits {
            chain_id,
            circuits: CIRCUITS
                .iter()
                .map(|circuit| {
                    let verifier = circuit.verifier_address(chain_id);
                    SupportedCircuit {
                        info: circuit.metadata(),
                        verifier_address: verifier.map(|addr| format!("{addr:#x}")),
                        verifier_url: verifier
                            .map(|addr| format!("{explorer}/address/{addr:#x}")),
                    }
                })
                .collect(),
        }
    }

    fn payment_owed(&self, record: &SigningRecord) -> bool {
        self.payment.enabled() && record.payment_status != Some(PaymentStatus::Completed)
    }
}

#[async_trait]
impl<S: KeyValueStore> ProofGenerator for SkillHandler<S> {
    async fn generate(&self, request_id: &str) -> Result<ProofResult> {
        let response = self
            .generate_proof(GenerateProofRequest::Session {
                request_id: request_id.to_string(),
            })
            .await?;
        Ok(response.result)
    }
}
