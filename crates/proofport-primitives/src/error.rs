use alloy::primitives::{Address, FixedBytes};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrimitivesError {
    #[error("Signer allowlist is empty")]
    EmptyAllowlist,
    #[error("Leaf index {index} out of bounds for {len} leaves")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Signer not authorized: {0}")]
    SignerNotAuthorized(String),
    #[error("Signature recovery failed: {0}")]
    SignatureRecoveryFailed(String),
    #[error("Wrong attester contract: expected {expected}, got {got}")]
    WrongContract { expected: Address, got: Address },
    #[error("Wrong function selector: expected {expected}, got {got}")]
    WrongSelector {
        expected: FixedBytes<4>,
        got: FixedBytes<4>,
    },
    #[error("Malformed rpc transaction fields: {0}")]
    MalformedRpcFields(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = core::result::Result<T, PrimitivesError>;
