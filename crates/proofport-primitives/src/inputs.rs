use crate::circuits::CircuitId;
use crate::crypto::{bytes_to_decimal_strings, pad_bytes};
use crate::error::{PrimitivesError, Result};
use crate::merkle::MerkleProof;
use alloy::primitives::{Address, B256};

/// Fixed byte capacity reserved for the raw attestation transaction.
pub const RAW_TX_CAPACITY: usize = 300;
/// Fixed number of Merkle proof levels the circuit allocates.
pub const MERKLE_PROOF_LEVELS: usize = 8;
/// Maximum number of two-character country codes in the country circuit.
pub const COUNTRY_LIST_CAPACITY: usize = 10;

/// Everything both circuits need, already derived and validated.
#[derive(Clone, Debug)]
pub struct CircuitInputParams {
    pub signal_hash: B256,
    pub merkle_root: B256,
    pub scope: B256,
    pub nullifier: B256,
    pub user_address: Address,
    /// `r || s` only. The recovery id is dropped because the public key is
    /// supplied separately.
    pub user_signature: [u8; 64],
    pub user_pubkey_x: [u8; 32],
    pub user_pubkey_y: [u8; 32],
    pub raw_transaction: Vec<u8>,
    pub attester_pubkey_x: [u8; 32],
    pub attester_pubkey_y: [u8; 32],
    pub merkle_proof: MerkleProof,
}

/// Country-circuit extras inserted between the Merkle root and the scope.
#[derive(Clone, Debug)]
pub struct CountryListParams {
    pub country_list: Vec<String>,
    pub is_included: bool,
}

fn push_bytes(out: &mut Vec<String>, bytes: &[u8]) {
    out.extend(bytes_to_decimal_strings(bytes));
}

fn push_scalar(out: &mut Vec<String>, value: usize) {
    out.push(value.to_string());
}

fn push_raw_transaction(out: &mut Vec<String>, raw_tx: &[u8]) {
    let tx_length = raw_tx.len().min(RAW_TX_CAPACITY);
    push_bytes(out, &pad_bytes(&raw_tx[..tx_length], RAW_TX_CAPACITY));
    push_scalar(out, tx_length);
}

fn push_merkle_proof(out: &mut Vec<String>, proof: &MerkleProof) -> Result<()> {
    if proof.siblings.len() > MERKLE_PROOF_LEVELS {
        return Err(PrimitivesError::ValidationError(format!(
            "Merkle proof depth {} exceeds circuit capacity {}",
            proof.siblings.len(),
            MERKLE_PROOF_LEVELS
        )));
    }
    let mut levels = Vec::with_capacity(MERKLE_PROOF_LEVELS * 32);
    for sibling in &proof.siblings {
        levels.extend_from_slice(sibling.as_slice());
    }
    push_bytes(out, &pad_bytes(&levels, MERKLE_PROOF_LEVELS * 32));
    push_scalar(out, proof.leaf_index);
    push_scalar(out, proof.depth);
    Ok(())
}

fn push_country_list(out: &mut Vec<String>, country: &CountryListParams) -> Result<()> {
    if country.country_list.is_empty() {
        return Err(PrimitivesError::ValidationError(
            "Country list must not be empty".to_string(),
        ));
    }
    if country.country_list.len() > COUNTRY_LIST_CAPACITY {
        return Err(PrimitivesError::ValidationError(format!(
            "Country list holds at most {COUNTRY_LIST_CAPACITY} codes"
        )));
    }

    let mut codes = Vec::with_capacity(COUNTRY_LIST_CAPACITY * 2);
    for code in &country.country_list {
        if code.len() != 2 || !code.is_ascii() {
            return Err(PrimitivesError::ValidationError(format!(
                "Invalid country code: {code:?}, expected two ASCII characters"
            )));
        }
        codes.extend_from_slice(code.to_ascii_uppercase().as_bytes());
    }
    push_bytes(out, &pad_bytes(&codes, COUNTRY_LIST_CAPACITY * 2));
    push_scalar(out, country.country_list.len());
    push_scalar(out, usize::from(country.is_included));
    Ok(())
}

fn assemble(params: &CircuitInputParams, country: Option<&CountryListParams>) -> Result<Vec<String>> {
    let expected = match country {
        None => CircuitId::CoinbaseAttestation.input_count(),
        Some(_) => CircuitId::CoinbaseCountryAttestation.input_count(),
    };
    let mut out = Vec::with_capacity(expected);

    push_bytes(&mut out, params.signal_hash.as_slice());
    push_bytes(&mut out, params.merkle_root.as_slice());
    if let Some(country) = country {
        push_country_list(&mut out, country)?;
    }
    push_bytes(&mut out, params.scope.as_slice());
    push_bytes(&mut out, params.nullifier.as_slice());
    push_bytes(&mut out, params.user_address.as_slice());
    push_bytes(&mut out, &params.user_signature);
    push_bytes(&mut out, &params.user_pubkey_x);
    push_bytes(&mut out, &params.user_pubkey_y);
    push_raw_transaction(&mut out, &params.raw_transaction);
    push_bytes(&mut out, &params.attester_pubkey_x);
    push_bytes(&mut out, &params.attester_pubkey_y);
    push_merkle_proof(&mut out, &params.merkle_proof)?;

    debug_assert_eq!(out.len(), expected);
    Ok(out)
}

/// Assembles the 899-element KYC circuit input vector.
pub fn assemble_kyc(params: &CircuitInputParams) -> Result<Vec<String>> {
    assemble(params, None)
}

/// Assembles the 921-element country circuit input vector.
pub fn assemble_country(
    params: &CircuitInputParams,
    country: &CountryListParams,
) -> Result<Vec<String>> {
    assemble(params, Some(country))
}
