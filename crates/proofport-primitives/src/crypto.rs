use crate::circuits::CircuitId;
use crate::error::{PrimitivesError, Result};
use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256};
use k256::elliptic_curve::sec1::ToEncodedPoint;

/// Uncompressed SEC1 public key, `0x04 || X || Y`.
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// `keccak256(utf8(scope))`, the domain separator for one application.
pub fn scope_hash(scope: &str) -> B256 {
    keccak256(scope.as_bytes())
}

/// Commitment binding a proof request to one (address, scope, circuit)
/// context. Packed-encoding of all three inputs, so changing any one of
/// them changes the hash.
pub fn signal_hash(address: Address, scope: &str, circuit_id: CircuitId) -> B256 {
    let mut preimage =
        Vec::with_capacity(20 + scope.len() + circuit_id.as_str().len());
    preimage.extend_from_slice(address.as_slice());
    preimage.extend_from_slice(scope.as_bytes());
    preimage.extend_from_slice(circuit_id.as_str().as_bytes());
    keccak256(preimage)
}

/// Two-stage nullifier: the inner hash binds an identity-derived secret, the
/// outer hash binds the scope. Deterministic, so repeated requests for the
/// same (address, scope, circuit) yield the same nullifier.
pub fn nullifier(address: Address, signal_hash: B256, scope_bytes: B256) -> B256 {
    let mut inner = Vec::with_capacity(20 + 32);
    inner.extend_from_slice(address.as_slice());
    inner.extend_from_slice(signal_hash.as_slice());
    let inner_hash = keccak256(inner);

    let mut outer = [0u8; 64];
    outer[..32].copy_from_slice(inner_hash.as_slice());
    outer[32..].copy_from_slice(scope_bytes.as_slice());
    keccak256(outer)
}

/// Recovers the uncompressed public key that produced `signature` over the
/// prehashed `message_hash`. The 65-byte signature is `r || s || v` with v
/// accepted as 0/1 or 27/28.
pub fn recover_pubkey(
    message_hash: B256,
    signature: &[u8],
) -> Result<[u8; UNCOMPRESSED_PUBKEY_LEN]> {
    let signature = PrimitiveSignature::try_from(signature)
        .map_err(|e| PrimitivesError::SignatureRecoveryFailed(e.to_string()))?;
    let verifying_key = signature
        .recover_from_prehash(&message_hash)
        .map_err(|e| PrimitivesError::SignatureRecoveryFailed(e.to_string()))?;

    let point = verifying_key.to_encoded_point(false);
    let bytes = point.as_bytes();
    let mut pubkey = [0u8; UNCOMPRESSED_PUBKEY_LEN];
    pubkey.copy_from_slice(bytes);
    Ok(pubkey)
}

/// Splits an uncompressed public key into its 32-byte X and Y coordinates,
/// with or without the leading `0x04` byte.
pub fn extract_xy(pubkey: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let coords = match pubkey.len() {
        65 if pubkey[0] == 0x04 => &pubkey[1..],
        64 => pubkey,
        len => {
            return Err(PrimitivesError::SignatureRecoveryFailed(format!(
                "Invalid uncompressed public key length: {len}"
            )))
        }
    };

    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&coords[..32]);
    y.copy_from_slice(&coords[32..]);
    Ok((x, y))
}

/// Ethereum address of an uncompressed public key: last 20 bytes of
/// `keccak256(pubkey[1..])`.
pub fn address_from_pubkey(pubkey: &[u8; UNCOMPRESSED_PUBKEY_LEN]) -> Address {
    let hash = keccak256(&pubkey[1..]);
    Address::from_slice(&hash[12..])
}

/// One decimal string per byte, the only numeric format the circuit witness
/// accepts. Never hex.
pub fn bytes_to_decimal_strings(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| b.to_string()).collect()
}

/// Right-pads with zero bytes up to `len`. Longer input passes through
/// untouched, padding never truncates.
pub fn pad_bytes(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    if out.len() < len {
        out.resize(len, 0);
    }
    out
}
