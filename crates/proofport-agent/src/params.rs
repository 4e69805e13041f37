use alloy::primitives::{Address, B256};
use proofport_primitives::attestation;
use proofport_primitives::circuits::CircuitId;
use proofport_primitives::crypto;
use proofport_primitives::inputs::{
    assemble_country, assemble_kyc, CircuitInputParams, CountryListParams,
};
use proofport_primitives::merkle::SignerMerkleTree;

use crate::eas::AttestationSource;
use crate::error::{AgentError, Result};

/// Fully-resolved proof request, independent of whether it arrived in
/// session or direct mode.
#[derive(Clone, Debug)]
pub struct ProofRequestInputs {
    pub circuit_id: CircuitId,
    pub address: String,
    pub signature: String,
    pub scope: String,
    pub country_list: Option<Vec<String>>,
    pub is_included: Option<bool>,
}

/// The assembled witness vector plus the public derivations callers echo back.
#[derive(Clone, Debug)]
pub struct AssembledCircuit {
    pub inputs: Vec<String>,
    pub signal_hash: B256,
    pub nullifier: B256,
}

/// Field-level checks shared by `request_signing`, `create_flow` and direct
/// mode proof generation: a usable scope and, for the country circuit, a
/// complete country parameter set.
pub fn validate_request_fields(
    circuit_id: CircuitId,
    scope: &str,
    country_list: Option<&[String]>,
    is_included: Option<bool>,
) -> Result<()> {
    if scope.trim().is_empty() {
        return Err(AgentError::Validation("scope must not be blank".to_string()));
    }
    if circuit_id == CircuitId::CoinbaseCountryAttestation {
        if country_list.map_or(true, |list| list.is_empty()) {
            return Err(AgentError::Validation(
                "countryList is required for the country circuit".to_string(),
            ));
        }
        if is_included.is_none() {
            return Err(AgentError::Validation(
                "isIncluded is required for the country circuit".to_string(),
            ));
        }
    }
    Ok(())
}

fn parse_signature(signature: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
        .map_err(|e| AgentError::Validation(format!("Invalid signature hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(AgentError::Validation(format!(
            "Signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Derives, fetches and validates everything one proof needs, then packages
/// it into the circuit's input vector. Fails with the first validation error
/// encountered.
pub async fn compute_circuit_params(
    request: &ProofRequestInputs,
    attestations: &dyn AttestationSource,
    allowlist: &[Address],
) -> Result<AssembledCircuit> {
    let user_address: Address = request
        .address
        .parse()
        .map_err(|e| AgentError::Validation(format!("Invalid address: {e}")))?;

    // public derivations binding the request to (address, scope, circuit)
    let signal_hash = crypto::signal_hash(user_address, &request.scope, request.circuit_id);
    let scope = crypto::scope_hash(&request.scope);
    let nullifier = crypto::nullifier(user_address, signal_hash, scope);

    // the wallet signed the signal hash; recover and split the user key
    let signature_bytes = parse_signature(&request.signature)?;
    let user_pubkey = crypto::recover_pubkey(signal_hash, &signature_bytes)?;
    if crypto::address_from_pubkey(&user_pubkey) != user_address {
        return Err(AgentError::Validation(
            "Signature was not produced by the supplied address".to_string(),
        ));
    }
    let (user_pubkey_x, user_pubkey_y) = crypto::extract_xy(&user_pubkey)?;
    let mut user_signature = [0u8; 64];
    user_signature.copy_from_slice(&signature_bytes[..64]);

    // fetch, reconstruct and validate the on-chain attestation
    let rpc_fields = attestations.attestation_transaction(user_address).await?;
    let raw_transaction = attestation::reconstruct_raw_transaction(&rpc_fields)?;
    attestation::validate(&raw_transaction, request.circuit_id)?;
    let attester_pubkey = attestation::recover_attester_pubkey(&raw_transaction)?;
    let attester_address = crypto::address_from_pubkey(&attester_pubkey);
    let (attester_pubkey_x, attester_pubkey_y) = crypto::extract_xy(&attester_pubkey)?;

    // allowlist membership of the recovered attester
    let tree = SignerMerkleTree::build(allowlist.to_vec())?;
    let leaf_index = tree.find_index(&attester_address.to_string())?;
    let merkle_proof = tree.proof(leaf_index)?;

    let params = CircuitInputParams {
        signal_hash,
        merkle_root: tree.root(),
        scope,
        nullifier,
        user_address,
        user_signature,
        user_pubkey_x,
        user_pubkey_y,
        raw_transaction,
        attester_pubkey_x,
        attester_pubkey_y,
        merkle_proof,
    };

    let inputs = match request.circuit_id {
        CircuitId::CoinbaseAttestation => assemble_kyc(&params)?,
        CircuitId::CoinbaseCountryAttestation => {
            let country = CountryListParams {
                country_list: request.country_list.clone().unwrap_or_default(),
                is_included: request.is_included.unwrap_or_default(),
            };
            assemble_country(&params, &country)?
        }
    };

    tracing::info!(
        circuit = request.circuit_id.as_str(),
        inputs = inputs.len(),
        leaf_index,
        "assembled circuit inputs"
    );
    Ok(AssembledCircuit {
        inputs,
        signal_hash,
        nullifier,
    })
}
