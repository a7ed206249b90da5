use serde::Serialize;

/// Result of one `Proofer::execute` entry.
///
/// `Success` iff the proof has been populated, `Error` iff the state error is
/// set, `Pending` otherwise (at least one request awaits a response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    Error,
    Pending,
}

/// Wire form of the execute status, for hosts that drive the proofer over a
/// serialized boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusReport {
    Pending { requests: Vec<PendingRequest> },
    Error { message: String },
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub node_index: u16,
}
