//! Error type shared across the quern crates.

pub type Result<T, E = QuernError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum QuernError {
    /// A caller violated an API contract. Always indicates a bug in the
    /// calling code, not bad data.
    #[error("Logical error: {0}")]
    Logical(String),

    /// Argument types incompatible with a function signature at plan time.
    #[error("Type error: {0}")]
    Type(String),

    /// A block exceeded a configured limit.
    #[error("Limit exceeded: {0}")]
    Limit(String),

    /// A source stream failed while producing blocks.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The operation was cancelled before it completed.
    #[error("Cancelled")]
    Cancelled,
}

impl QuernError {
    pub fn logical(msg: impl Into<String>) -> Self {
        QuernError::Logical(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        QuernError::Type(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        QuernError::Limit(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        QuernError::Stream(msg.into())
    }
}
