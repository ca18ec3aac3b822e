//! Unified error type.

/// The error type returned by ramal's fallible operations.
///
/// Routing misses (404) are not errors — they are control flow, resolved by
/// the router's fallback response. This type carries the failures that
/// propagate: infrastructure I/O (binding a port, accepting a connection) and
/// anything a handler or middleware raises. An error that reaches the
/// router's top level is logged and answered with a plain `500`; its detail
/// never leaves the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Ad-hoc failure raised by a handler or middleware.
    #[error("{0}")]
    Message(String),

    /// A failure wrapping its original cause.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// An error wrapping another error value.
    pub fn other(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_message() {
        assert_eq!(Error::msg("boom").to_string(), "boom");
    }

    #[test]
    fn wraps_io() {
        let err: Error = std::io::Error::other("refused").into();
        assert_eq!(err.to_string(), "io: refused");
    }
}
