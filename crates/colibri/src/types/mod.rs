pub mod chain;
pub mod error;
pub mod request;
pub mod status;

pub use chain::{chain_family, chain_spec, ChainFamily, ChainSpec, Fork};
pub use error::{ColibriError, Result};
pub use request::{DataRequest, Encoding, Fetch, HttpMethod, RequestKind, RequestState, MAX_NODES};
pub use status::{ExecStatus, PendingRequest, StatusReport};
