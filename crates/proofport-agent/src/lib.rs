//! Agent-side orchestration for attestation proofs: signing sessions, the
//! proof flow state machine, prover and verifier collaborators, and the
//! skill operations transports expose.

pub mod cache;
pub mod config;
pub mod eas;
pub mod error;
pub mod flow;
pub mod params;
pub mod payment;
pub mod prover;
pub mod rate_limit;
pub mod session;
pub mod skills;
pub mod store;
pub mod types;
pub mod verifier;

pub use error::{AgentError, Result};
