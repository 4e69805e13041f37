use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proofport_primitives::circuits::CircuitId;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::params::validate_request_fields;
use crate::payment::PaymentProvider;
use crate::session::{PaymentStatus, SigningSessionStore};
use crate::store::KeyValueStore;
use crate::types::{fresh_id, ProofResult};

/// Proof generation behind the flow machine. Implemented by the skill
/// handler's session-mode `generate_proof`, which consumes the signing
/// record as part of generating.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    async fn generate(&self, request_id: &str) -> Result<ProofResult>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowPhase {
    Signing,
    Payment,
    Generating,
    Completed,
    Failed,
    Expired,
}

impl FlowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// Pollable wrapper around one signing session: the last phase the machine
/// observed plus whatever that phase produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofFlow {
    pub flow_id: String,
    pub request_id: String,
    pub circuit_id: CircuitId,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_included: Option<bool>,
    pub phase: FlowPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_result: Option<ProofResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn flow_key(flow_id: &str) -> String {
    format!("flow:{flow_id}")
}

fn flow_index_key(request_id: &str) -> String {
    format!("flowreq:{request_id}")
}

fn flow_channel(flow_id: &str) -> String {
    format!("flow:{flow_id}:events")
}

/// Drives a flow through `signing → payment → generating → completed |
/// failed` (`expired` on timeout). Transitions are observable twice over:
/// persisted for polling and published on `flow:{flowId}:events` for
/// streaming. Terminal phases are idempotent, with zero writes and zero
/// events on re-entry.
pub struct ProofFlowManager<S> {
    store: Arc<S>,
    sessions: SigningSessionStore<S>,
    payment: Arc<dyn PaymentProvider>,
    generator: Arc<dyn ProofGenerator>,
    signing_base_url: Option<String>,
}

impl<S: KeyValueStore> ProofFlowManager<S> {
    pub fn new(
        store: Arc<S>,
        sessions: SigningSessionStore<S>,
        payment: Arc<dyn PaymentProvider>,
        generator: Arc<dyn ProofGenerator>,
        signing_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            payment,
            generator,
            signing_base_url,
        }
    }

    /// Opens a signing session and wraps it in a flow at phase `signing`,
    /// persisting the flow and its requestId reverse index with the signing
    /// TTL.
    pub async fn create_flow(
        &self,
        circuit_id: CircuitId,
        scope: String,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
    ) -> Result<ProofFlow> {
        validate_request_fields(circuit_id, &scope, country_list.as_deref(), is_included)?;
        let scope = scope.trim().to_string();
        let record = self
            .sessions
            .create(circuit_id, scope.clone(), country_list.clone(), is_included)
            .await?;

        let now = Utc::now();
        let flow = ProofFlow {
            flow_id: fresh_id(),
            request_id: record.id.clone(),
            circuit_id,
            scope,
            country_list,
            is_included,
            phase: FlowPhase::Signing,
            signing_url: self
                .signing_base_url
                .as_ref()
                .map(|base| format!("{}/sign/{}", base.trim_end_matches('/'), record.id)),
            payment_url: None,
            proof_result: None,
            error: None,
            created_at: now,
            updated_at: now,
            expires_at: record.expires_at,
        };
        let ttl = self.sessions.ttl_seconds();
        self.persist(&flow, ttl).await?;
        self.store
            .set(&flow_index_key(&flow.request_id), &flow.flow_id, Some(ttl))
            .await?;
        tracing::info!(
            flow_id = flow.flow_id,
            request_id = flow.request_id,
            circuit = circuit_id.as_str(),
            "created proof flow"
        );
        Ok(flow)
    }

    /// Re-derives the flow's phase from its signing record and applies at
    /// most one transition. Unchanged and terminal phases return the flow
    /// untouched.
    pub async fn advance_flow(&self, flow_id: &str) -> Result<ProofFlow> {
        let mut flow = self
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| AgentError::NotFoundOrExpired(format!("flow {flow_id}")))?;
        if flow.phase.is_terminal() {
            return Ok(flow);
        }

        let record = self.sessions.get(&flow.request_id).await?;
        let record = match record {
            Some(record) if !record.is_expired() => record,
            // evicted or past its deadline
            _ => {
                flow.phase = FlowPhase::Expired;
                self.commit(&mut flow).await?;
                return Ok(flow);
            }
        };

        if !record.is_signed() {
            return Ok(flow);
        }

        let payment_owed =
            self.payment.enabled() && record.payment_status != Some(PaymentStatus::Completed);
        if payment_owed {
            if flow.phase == FlowPhase::Payment {
                return Ok(flow);
            }
            let request = self.payment.payment_request(&flow.request_id)?;
            flow.phase = FlowPhase::Payment;
            flow.payment_url = Some(request.url);
            self.commit(&mut flow).await?;
            return Ok(flow);
        }

        // signature collected, nothing owed: run the prover to a terminal phase
        flow.phase = FlowPhase::Generating;
        flow.updated_at = Utc::now();
        self.publish(&flow).await?;
        match self.generator.generate(&flow.request_id).await {
            Ok(result) => {
                flow.phase = FlowPhase::Completed;
                flow.proof_result = Some(result);
            }
            Err(err) => {
                tracing::warn!(flow_id = flow.flow_id, error = %err, "proof flow failed");
                flow.phase = FlowPhase::Failed;
                flow.error = Some(err.to_string());
            }
        }
        self.commit(&mut flow).await?;
        Ok(flow)
    }

    pub async fn get_flow(&self, flow_id: &str) -> Result<Option<ProofFlow>> {
        match self.store.get(&flow_key(flow_id)).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode(&raw)?)),
        }
    }

    /// Two-hop lookup through the reverse index. A dangling index entry
    /// (flow evicted, index not yet) reads as not found.
    pub async fn get_flow_by_request_id(&self, request_id: &str) -> Result<Option<ProofFlow>> {
        match self.store.get(&flow_index_key(request_id)).await? {
            None => Ok(None),
            Some(flow_id) => self.get_flow(&flow_id).await,
        }
    }

    /// Persist + publish one transition, reusing the signing key's remaining
    /// TTL so the flow never outlives its session by more than the window.
    async fn commit(&self, flow: &mut ProofFlow) -> Result<()> {
        flow.updated_at = Utc::now();
        let ttl = self.sessions.remaining_ttl(&flow.request_id).await?;
        self.persist(flow, ttl).await?;
        self.publish(flow).await?;
        tracing::info!(flow_id = flow.flow_id, phase = ?flow.phase, "flow transition");
        Ok(())
    }

    async fn persist(&self, flow: &ProofFlow, ttl_seconds: u64) -> Result<()> {
        let raw = serde_json::to_string(flow)
            .map_err(|e| AgentError::Store(format!("serialize flow: {e}")))?;
        self.store
            .set(&flow_key(&flow.flow_id), &raw, Some(ttl_seconds))
            .await
    }

    async fn publish(&self, flow: &ProofFlow) -> Result<()> {
        let event = serde_json::to_string(flow)
            .map_err(|e| AgentError::Store(format!("serialize flow event: {e}")))?;
        self.store
            .publish(&flow_channel(&flow.flow_id), &event)
            .await?;
        Ok(())
    }
}

fn decode(raw: &str) -> Result<ProofFlow> {
    serde_json::from_str(raw).map_err(|e| AgentError::Store(format!("decode flow: {e}")))
}
