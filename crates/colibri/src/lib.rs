//! Colibri: a stateless Ethereum light-client proof service.
//!
//! For each supported RPC method the [`proofer`] assembles a self-contained,
//! SSZ-encoded proof bundle a thin verifier can check against the beacon
//! sync-committee trust anchor. The [`store`] keeps beacon block roots,
//! truncated headers and light-client artifacts in 8192-slot period
//! directories, and the [`zk`] pipeline maintains a recursive Groth16 proof
//! of the sync-committee chain on top of it.
//!
//! The host drives everything through the request model in [`types`]: a
//! proofer context returns `Pending` with open [`types::DataRequest`]s, the
//! [`client::NodePool`] (or the host's own plumbing) fills in responses, and
//! the context is re-entered until it succeeds or fails.

pub mod classify;
pub mod client;
pub mod mpt;
pub mod proofer;
pub mod schema;
pub mod shutdown;
pub mod ssz;
pub mod store;
pub mod types;
pub mod zk;

pub use classify::{classify_response, ResponseClass};
pub use client::{NodePool, NodePoolConfig};
pub use proofer::{method_support, MethodSupport, Proofer};
pub use store::{PeriodStore, PeriodStoreConfig};
pub use types::{ColibriError, ExecStatus, Result};
pub use zk::{ZkProver, ZkProverConfig};
