use thiserror::Error;

/// Errors raised while decoding lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A line grew past the configured limit without a newline.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The line is not a valid JSON event.
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
}
