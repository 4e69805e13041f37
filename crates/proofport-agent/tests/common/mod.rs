use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Address, Bytes, PrimitiveSignature, TxKind, B256, U256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use tokio::sync::Mutex;

use proofport_agent::eas::AttestationSource;
use proofport_agent::error::Result;
use proofport_agent::payment::X402PaymentProvider;
use proofport_agent::prover::ProverBackend;
use proofport_agent::skills::SkillHandler;
use proofport_agent::store::MemoryStore;
use proofport_agent::types::{ProverOutput, VerifyOutcome};
use proofport_agent::verifier::OnchainVerifier;
use proofport_primitives::attestation::RpcTransactionFields;
use proofport_primitives::circuits::{CircuitId, ATTEST_SELECTOR, BASE_SEPOLIA, EAS_CONTRACT};
use proofport_primitives::crypto;

pub const SCOPE: &str = "myapp.com";

pub fn user_key() -> SigningKey {
    SigningKey::from_slice(&[0x42u8; 32]).unwrap()
}

pub fn attester_key() -> SigningKey {
    SigningKey::from_slice(&[0x22u8; 32]).unwrap()
}

pub fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let mut pubkey = [0u8; 65];
    pubkey.copy_from_slice(point.as_bytes());
    crypto::address_from_pubkey(&pubkey)
}

/// 65-byte `r || s || v` wallet signature over the signal hash, hex-encoded.
pub fn user_signature(key: &SigningKey, circuit: CircuitId, scope: &str) -> String {
    let address = address_of(key);
    let hash = crypto::signal_hash(address, scope, circuit);
    let (sig, recid) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recid.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

fn attest_tx() -> TxEip1559 {
    let mut input = ATTEST_SELECTOR.to_vec();
    input.extend_from_slice(&[0u8; 96]);
    TxEip1559 {
        chain_id: BASE_SEPOLIA,
        nonce: 7,
        gas_limit: 210_000,
        max_fee_per_gas: 2_000_000_000,
        max_priority_fee_per_gas: 1_000_000,
        to: TxKind::Call(EAS_CONTRACT),
        value: U256::ZERO,
        access_list: AccessList::default(),
        input: Bytes::from(input),
    }
}

/// RPC-decoded fields of an attestation transaction signed by the fixture
/// attester, exactly as `eth_getTransactionByHash` would report them.
pub fn attestation_fields() -> RpcTransactionFields {
    let tx = attest_tx();
    let hash = tx.signature_hash();
    let (sig, recid) = attester_key()
        .sign_prehash_recoverable(hash.as_slice())
        .unwrap();
    let signature = PrimitiveSignature::new(
        U256::from_be_slice(&sig.r().to_bytes()),
        U256::from_be_slice(&sig.s().to_bytes()),
        recid.is_y_odd(),
    );
    // exercised once to keep the fixture honest
    let envelope = TxEnvelope::from(tx.clone().into_signed(signature));
    let mut raw = Vec::new();
    envelope.encode_2718(&mut raw);
    assert!(!raw.is_empty());

    RpcTransactionFields {
        to: format!("{EAS_CONTRACT:#x}"),
        nonce: format!("{:#x}", tx.nonce),
        gas: format!("{:#x}", tx.gas_limit),
        max_fee_per_gas: format!("{:#x}", tx.max_fee_per_gas),
        max_priority_fee_per_gas: format!("{:#x}", tx.max_priority_fee_per_gas),
        input: format!("0x{}", hex::encode(&tx.input)),
        value: format!("{:#x}", tx.value),
        chain_id: format!("{:#x}", tx.chain_id),
        v: if signature.v() { "0x1" } else { "0x0" }.to_string(),
        r: format!("{:#x}", signature.r()),
        s: format!("{:#x}", signature.s()),
    }
}

pub struct FixtureAttestations {
    fields: RpcTransactionFields,
}

impl FixtureAttestations {
    pub fn new() -> Self {
        Self {
            fields: attestation_fields(),
        }
    }
}

#[async_trait]
impl AttestationSource for FixtureAttestations {
    async fn attestation_transaction(&self, _recipient: Address) -> Result<RpcTransactionFields> {
        Ok(self.fields.clone())
    }
}

/// Counts invocations so tests can tell cache hits from recomputation.
pub struct FixtureProver {
    pub calls: Mutex<usize>,
}

impl FixtureProver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl ProverBackend for FixtureProver {
    async fn prove(&self, _circuit_id: CircuitId, inputs: &[String]) -> Result<ProverOutput> {
        *self.calls.lock().await += 1;
        Ok(ProverOutput {
            proof: "deadbeef".to_string(),
            public_inputs: format!("{:064x}", inputs.len()),
        })
    }
}

/// Records the word count of the last call and answers valid.
pub struct RecordingVerifier {
    pub last_word_count: Mutex<Option<usize>>,
}

impl RecordingVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            last_word_count: Mutex::new(None),
        })
    }
}

#[async_trait]
impl OnchainVerifier for RecordingVerifier {
    async fn verify(
        &self,
        _verifier: Address,
        _proof: Bytes,
        public_inputs: Vec<B256>,
    ) -> Result<VerifyOutcome> {
        *self.last_word_count.lock().await = Some(public_inputs.len());
        Ok(VerifyOutcome::valid())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub prover: Arc<FixtureProver>,
    pub verifier: Arc<RecordingVerifier>,
    pub handler: Arc<SkillHandler<MemoryStore>>,
}

/// Fresh handler sharing the fixture's store, prover and verifier, for
/// tests that want to bolt on a cache or rate limiter.
pub fn bare_handler(fx: &Fixture) -> SkillHandler<MemoryStore> {
    SkillHandler::new(
        fx.store.clone(),
        600,
        fx.prover.clone(),
        Arc::new(FixtureAttestations::new()),
        Arc::new(X402PaymentProvider::disabled()),
        fx.verifier.clone(),
        vec![address_of(&attester_key())],
        BASE_SEPOLIA,
        Some("https://agent.example".to_string()),
    )
}

/// Payment-disabled handler on Base Sepolia with the fixture attester as the
/// sole allowlisted signer.
pub fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let prover = FixtureProver::new();
    let verifier = RecordingVerifier::new();
    let handler = Arc::new(SkillHandler::new(
        store.clone(),
        600,
        prover.clone(),
        Arc::new(FixtureAttestations::new()),
        Arc::new(X402PaymentProvider::disabled()),
        verifier.clone(),
        vec![address_of(&attester_key())],
        BASE_SEPOLIA,
        Some("https://agent.example".to_string()),
    ));
    Fixture {
        store,
        prover,
        verifier,
        handler,
    }
}
