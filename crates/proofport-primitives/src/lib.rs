//! Core primitives for the proofport prover agent.
//!
//! Everything needed to turn a wallet-signed attestation into the fixed-length
//! decimal-string input vectors consumed by the zero-knowledge circuits:
//! circuit registry, authorized-signer Merkle tree, hash/nullifier derivations,
//! on-chain attestation validation and raw-transaction reconstruction, and the
//! final input assembly.

pub mod attestation;
pub mod circuits;
pub mod crypto;
pub mod error;
pub mod inputs;
pub mod merkle;

pub use error::{PrimitivesError, Result};
