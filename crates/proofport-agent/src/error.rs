use proofport_primitives::PrimitivesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found or expired: {0}")]
    NotFoundOrExpired(String),
    #[error("Signer not authorized: {0}")]
    NotAuthorized(String),
    #[error("Crypto failure: {0}")]
    Crypto(String),
    #[error("Rate limited, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
    #[error("No verifier deployed for circuit {circuit} on chain {chain_id}")]
    NoVerifierDeployed { circuit: String, chain_id: u64 },
    #[error("Prover failure: {0}")]
    Prover(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Rpc error: {0}")]
    Rpc(String),
}

// Store lookups never distinguish "never existed" from "expired"; primitives
// failures keep their kind when the caller can act on it and collapse into
// Crypto otherwise.
impl From<PrimitivesError> for AgentError {
    fn from(err: PrimitivesError) -> Self {
        match err {
            PrimitivesError::SignerNotAuthorized(signer) => Self::NotAuthorized(signer),
            PrimitivesError::ValidationError(msg) => Self::Validation(msg),
            PrimitivesError::EmptyAllowlist => Self::NotConfigured(err.to_string()),
            other => Self::Crypto(other.to_string()),
        }
    }
}

pub type Result<T> = core::result::Result<T, AgentError>;
