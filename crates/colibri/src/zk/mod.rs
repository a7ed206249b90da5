//! Recursive zk proving pipeline: the Groth16 verifier and the
//! checkpoint-driven prover orchestration.

pub mod groth16;
pub mod prover;

pub use groth16::{parse_vk, verify_proof, VerifyingKey, PROOF_LEN};
pub use prover::{ProverStats, ZkProver, ZkProverConfig};
