use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColibriError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSZ error: {0}")]
    Ssz(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("period store error: {0}")]
    Store(String),

    #[error("prover error: {0}")]
    Prover(String),

    #[error("proof error: {0}")]
    Proof(String),
}

impl ColibriError {
    /// True for errors caused by the caller's input rather than upstream or
    /// local state. The HTTP layer maps these to 400 responses.
    pub fn is_user(&self) -> bool {
        matches!(
            self,
            ColibriError::InvalidParams(_)
                | ColibriError::UnsupportedMethod(_)
                | ColibriError::UnsupportedChain(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ColibriError>;
