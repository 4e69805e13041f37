use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proofport_primitives::circuits::CircuitId;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::store::KeyValueStore;
use crate::types::fresh_id;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningStatus {
    Pending,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/// One short-lived signing/payment/proof request. Created by
/// `request_signing`, signed by the external signing callback, consumed
/// exactly once by a successful session-mode `generate_proof`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRecord {
    pub id: String,
    pub scope: String,
    pub circuit_id: CircuitId,
    pub status: SigningStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_included: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SigningRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_signed(&self) -> bool {
        self.status == SigningStatus::Completed
    }
}

fn signing_key(request_id: &str) -> String {
    format!("signing:{request_id}")
}

/// TTL-bound persistence of [`SigningRecord`]s. Absence is always reported as
/// "not found or expired", never split into the two cases.
#[derive(Clone)]
pub struct SigningSessionStore<S> {
    store: Arc<S>,
    ttl_seconds: u64,
}

impl<S: KeyValueStore> SigningSessionStore<S> {
    pub fn new(store: Arc<S>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Opens a fresh pending record and persists it with the configured TTL.
    pub async fn create(
        &self,
        circuit_id: CircuitId,
        scope: String,
        country_list: Option<Vec<String>>,
        is_included: Option<bool>,
    ) -> Result<SigningRecord> {
        let now = Utc::now();
        let record = SigningRecord {
            id: fresh_id(),
            scope,
            circuit_id,
            status: SigningStatus::Pending,
            address: None,
            signature: None,
            country_list,
            is_included,
            payment_status: None,
            payment_tx_hash: None,
            created_at: now,
            expires_at: now + Duration::seconds(self.ttl_seconds as i64),
        };
        self.persist(&record, Some(self.ttl_seconds)).await?;
        Ok(record)
    }

    pub async fn get(&self, request_id: &str) -> Result<Option<SigningRecord>> {
        match self.store.get(&signing_key(request_id)).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode(&raw)?)),
        }
    }

    /// Atomically removes and returns the record: the at-most-once consumption
    /// step of session-mode proof generation.
    pub async fn take(&self, request_id: &str) -> Result<Option<SigningRecord>> {
        match self.store.take(&signing_key(request_id)).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode(&raw)?)),
        }
    }

    /// Rewrites a record, preserving its remaining TTL; falls back to the
    /// configured TTL when the key has none left to report.
    pub async fn update(&self, record: &SigningRecord) -> Result<()> {
        let remaining = self.remaining_ttl(&record.id).await?;
        self.persist(record, Some(remaining)).await
    }

    /// Remaining key TTL in seconds, or the configured TTL when the store
    /// reports none.
    pub async fn remaining_ttl(&self, request_id: &str) -> Result<u64> {
        let ttl = self.store.ttl(&signing_key(request_id)).await?;
        if ttl > 0 {
            Ok(ttl as u64)
        } else {
            Ok(self.ttl_seconds)
        }
    }

    /// Records the wallet signature collected by the signing callback and
    /// flips the record to completed.
    pub async fn mark_signed(
        &self,
        request_id: &str,
        address: String,
        signature: String,
    ) -> Result<SigningRecord> {
        let mut record = self.get(request_id).await?.ok_or_else(|| {
            AgentError::NotFoundOrExpired(format!("signing request {request_id}"))
        })?;
        record.status = SigningStatus::Completed;
        record.address = Some(address);
        record.signature = Some(signature);
        self.update(&record).await?;
        Ok(record)
    }

    async fn persist(&self, record: &SigningRecord, ttl: Option<u64>) -> Result<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| AgentError::Store(format!("serialize signing record: {e}")))?;
        self.store.set(&signing_key(&record.id), &raw, ttl).await
    }
}

fn decode(raw: &str) -> Result<SigningRecord> {
    serde_json::from_str(raw)
        .map_err(|e| AgentError::Store(format!("decode signing record: {e}")))
}
