use crate::circuits::CircuitId;
use crate::crypto::{self, UNCOMPRESSED_PUBKEY_LEN};
use crate::error::{PrimitivesError, Result};
use alloy::consensus::{SignableTransaction, Signed, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::{Decodable2718, Encodable2718};
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Address, Bytes, FixedBytes, PrimitiveSignature, TxKind, U256};
use serde::{Deserialize, Serialize};

/// Decoded transaction fields as returned by `eth_getTransactionByHash`.
///
/// JSON-RPC nodes hand back decoded fields, not raw bytes, yet the circuit
/// commits to the exact raw transaction. [`reconstruct_raw_transaction`]
/// re-serializes these fields back into the byte-exact EIP-1559 payload that
/// was originally signed and broadcast.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionFields {
    pub to: String,
    pub nonce: String,
    pub gas: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub input: String,
    pub value: String,
    pub chain_id: String,
    pub v: String,
    pub r: String,
    pub s: String,
}

/// Decodes `raw_tx` as a signed EIP-1559 transaction.
fn decode_eip1559(raw_tx: &[u8]) -> Result<Signed<TxEip1559>> {
    let mut buf = raw_tx;
    let envelope = TxEnvelope::decode_2718(&mut buf).map_err(|e| {
        PrimitivesError::ValidationError(format!("Failed to decode transaction: {e}"))
    })?;
    match envelope {
        TxEnvelope::Eip1559(signed) => Ok(signed),
        other => Err(PrimitivesError::ValidationError(format!(
            "Expected EIP-1559 transaction, got type {:?}",
            other.tx_type()
        ))),
    }
}

/// Checks that a signed attestation transaction targets the circuit's
/// registered attester contract and invokes its expected function.
pub fn validate(raw_tx: &[u8], circuit_id: CircuitId) -> Result<()> {
    let signed = decode_eip1559(raw_tx)?;
    let tx = signed.tx();

    let to = match tx.to {
        TxKind::Call(address) => address,
        TxKind::Create => {
            return Err(PrimitivesError::ValidationError(
                "Attestation transaction must be a contract call".to_string(),
            ))
        }
    };
    let expected_contract = circuit_id.attester_contract();
    if to != expected_contract {
        return Err(PrimitivesError::WrongContract {
            expected: expected_contract,
            got: to,
        });
    }

    let expected_selector = circuit_id.attest_selector();
    if tx.input.len() < 4 {
        return Err(PrimitivesError::ValidationError(
            "Attestation call data shorter than a selector".to_string(),
        ));
    }
    let selector = FixedBytes::<4>::from_slice(&tx.input[..4]);
    if selector != expected_selector {
        return Err(PrimitivesError::WrongSelector {
            expected: expected_selector,
            got: selector,
        });
    }

    Ok(())
}

/// Recovers the attester's uncompressed public key from the transaction
/// signature and the hash of its unsigned serialization.
pub fn recover_attester_pubkey(raw_tx: &[u8]) -> Result<[u8; UNCOMPRESSED_PUBKEY_LEN]> {
    let signed = decode_eip1559(raw_tx)?;
    let unsigned_hash = signed.tx().signature_hash();
    let signature = signed.signature();

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    sig_bytes[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    sig_bytes[64] = signature.v() as u8;
    crypto::recover_pubkey(unsigned_hash, &sig_bytes)
}

fn strip_0x(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

fn parse_u64(field: &str, value: &str) -> Result<u64> {
    u64::from_str_radix(strip_0x(value), 16)
        .map_err(|e| PrimitivesError::MalformedRpcFields(format!("{field}: {e}")))
}

fn parse_u128(field: &str, value: &str) -> Result<u128> {
    u128::from_str_radix(strip_0x(value), 16)
        .map_err(|e| PrimitivesError::MalformedRpcFields(format!("{field}: {e}")))
}

fn parse_u256(field: &str, value: &str) -> Result<U256> {
    U256::from_str_radix(strip_0x(value), 16)
        .map_err(|e| PrimitivesError::MalformedRpcFields(format!("{field}: {e}")))
}

/// Re-serializes decoded RPC fields into the byte-exact raw EIP-1559
/// transaction. Attestation transactions carry no access list, so an empty
/// one is assumed.
pub fn reconstruct_raw_transaction(fields: &RpcTransactionFields) -> Result<Vec<u8>> {
    let to: Address = fields
        .to
        .parse()
        .map_err(|e| PrimitivesError::MalformedRpcFields(format!("to: {e}")))?;
    let input = hex::decode(strip_0x(&fields.input))
        .map_err(|e| PrimitivesError::MalformedRpcFields(format!("input: {e}")))?;

    let tx = TxEip1559 {
        chain_id: parse_u64("chainId", &fields.chain_id)?,
        nonce: parse_u64("nonce", &fields.nonce)?,
        gas_limit: parse_u64("gas", &fields.gas)?,
        max_fee_per_gas: parse_u128("maxFeePerGas", &fields.max_fee_per_gas)?,
        max_priority_fee_per_gas: parse_u128(
            "maxPriorityFeePerGas",
            &fields.max_priority_fee_per_gas,
        )?,
        to: TxKind::Call(to),
        value: parse_u256("value", &fields.value)?,
        access_list: AccessList::default(),
        input: Bytes::from(input),
    };

    let v = parse_u64("v", &fields.v)?;
    let parity = match v {
        0 | 27 => false,
        1 | 28 => true,
        other => {
            return Err(PrimitivesError::MalformedRpcFields(format!(
                "v: unexpected parity value {other}"
            )))
        }
    };
    let signature = PrimitiveSignature::new(
        parse_u256("r", &fields.r)?,
        parse_u256("s", &fields.s)?,
        parity,
    );

    let envelope = TxEnvelope::from(tx.into_signed(signature));
    let mut raw = Vec::with_capacity(envelope.encode_2718_len());
    envelope.encode_2718(&mut raw);
    Ok(raw)
}
