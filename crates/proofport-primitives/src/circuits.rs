use crate::error::PrimitivesError;
use alloy::primitives::{address, fixed_bytes, Address, FixedBytes};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Base mainnet chain id.
pub const BASE_MAINNET: u64 = 8453;
/// Base Sepolia chain id.
pub const BASE_SEPOLIA: u64 = 84532;

/// EAS contract on Base, the `to` address of every attestation transaction.
pub const EAS_CONTRACT: Address = address!("4200000000000000000000000000000000000021");

/// Selector of `EAS.attest(AttestationRequest)`.
pub const ATTEST_SELECTOR: FixedBytes<4> = fixed_bytes!("f17325e7");

lazy_static! {
    /// Coinbase attester signer allowlist. An explicit configuration value:
    /// the Merkle tree is always rebuilt from the list passed in, never from
    /// hidden state.
    pub static ref DEFAULT_SIGNER_ALLOWLIST: Vec<Address> = vec![
        address!("357458739F90461b99789350868CD7CF330Dd7EE"),
        address!("2E40AB04a90A06d6C79D1e82bC2D2Be4143b6e5B"),
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitId {
    #[serde(rename = "coinbase_attestation")]
    CoinbaseAttestation,
    #[serde(rename = "coinbase_country_attestation")]
    CoinbaseCountryAttestation,
}

pub const CIRCUITS: [CircuitId; 2] = [
    CircuitId::CoinbaseAttestation,
    CircuitId::CoinbaseCountryAttestation,
];

impl CircuitId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoinbaseAttestation => "coinbase_attestation",
            Self::CoinbaseCountryAttestation => "coinbase_country_attestation",
        }
    }

    /// Total field-element count of the circuit's input vector.
    pub fn input_count(&self) -> usize {
        match self {
            Self::CoinbaseAttestation => 899,
            Self::CoinbaseCountryAttestation => 921,
        }
    }

    /// Attester contract the on-chain attestation transaction must call.
    pub fn attester_contract(&self) -> Address {
        EAS_CONTRACT
    }

    /// Expected 4-byte selector of the attestation call data.
    pub fn attest_selector(&self) -> FixedBytes<4> {
        ATTEST_SELECTOR
    }

    /// Deployed on-chain verifier for this circuit, if any.
    pub fn verifier_address(&self, chain_id: u64) -> Option<Address> {
        match (self, chain_id) {
            (Self::CoinbaseAttestation, BASE_SEPOLIA) => {
                Some(address!("c802BcFE9F746AD5a3F0d13e0f61E8DC2a1eD0A4"))
            }
            (Self::CoinbaseCountryAttestation, BASE_SEPOLIA) => {
                Some(address!("7D45bD2E259c9A4A72cF9c85B6A35bD86B40d3F1"))
            }
            _ => None,
        }
    }
}

// Verifier deployments are sparse on purpose: only circuits with an audited
// Solidity verifier get an entry, everything else resolves to None.
impl CircuitId {
    pub fn metadata(&self) -> CircuitInfo {
        match self {
            Self::CoinbaseAttestation => CircuitInfo {
                id: self.as_str(),
                display_name: "Coinbase KYC",
                description: "Prove Coinbase KYC attestation without revealing identity",
                required_inputs: vec![
                    "signal_hash",
                    "signer_list_merkle_root",
                    "scope",
                    "nullifier",
                    "user_address",
                    "user_signature",
                    "user_pubkey_x",
                    "user_pubkey_y",
                    "raw_transaction",
                    "tx_length",
                    "attester_pubkey_x",
                    "attester_pubkey_y",
                    "signer_merkle_proof",
                    "signer_leaf_index",
                    "merkle_proof_depth",
                ],
                input_count: self.input_count(),
            },
            Self::CoinbaseCountryAttestation => CircuitInfo {
                id: self.as_str(),
                display_name: "Coinbase Country",
                description: "Prove country attestation from Coinbase without revealing country",
                required_inputs: vec![
                    "signal_hash",
                    "signer_list_merkle_root",
                    "country_list",
                    "country_list_length",
                    "is_included",
                    "scope",
                    "nullifier",
                    "user_address",
                    "user_signature",
                    "user_pubkey_x",
                    "user_pubkey_y",
                    "raw_transaction",
                    "tx_length",
                    "attester_pubkey_x",
                    "attester_pubkey_y",
                    "signer_merkle_proof",
                    "signer_leaf_index",
                    "merkle_proof_depth",
                ],
                input_count: self.input_count(),
            },
        }
    }
}

impl TryFrom<&str> for CircuitId {
    type Error = PrimitivesError;

    fn try_from(s: &str) -> core::result::Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "coinbase_attestation" => Ok(Self::CoinbaseAttestation),
            "coinbase_country_attestation" => Ok(Self::CoinbaseCountryAttestation),
            _ => Err(PrimitivesError::ValidationError(format!(
                "Unknown circuit id: {s}"
            ))),
        }
    }
}

impl std::fmt::Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one supported circuit, served by
/// `get_supported_circuits`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub required_inputs: Vec<&'static str>,
    pub input_count: usize,
}

/// Block explorer base URL for receipt links, testnet vs mainnet.
pub fn explorer_base_url(chain_id: u64) -> &'static str {
    match chain_id {
        BASE_SEPOLIA => "https://sepolia.basescan.org",
        _ => "https://basescan.org",
    }
}
