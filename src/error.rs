use std::fmt;

/// Everything that can abort a conversion.
///
/// Only a missing image degrades gracefully (placeholder + warning); every
/// other failure surfaces here and the document has to be rebuilt from a
/// fresh [`crate::pdf::Document`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Writing outside the open/page-active window, or finishing with an
    /// unterminated section (flowing block, list, table).
    #[error("structural error: {0}")]
    Structural(String),

    /// Image or font data the writer cannot embed.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A font metrics resource that could not be found or parsed.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// A primitive was called with parameters that make no sense.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn structural(msg: impl fmt::Display) -> Self {
        Error::Structural(msg.to_string())
    }

    pub(crate) fn unsupported(msg: impl fmt::Display) -> Self {
        Error::UnsupportedFormat(msg.to_string())
    }

    pub(crate) fn invalid(msg: impl fmt::Display) -> Self {
        Error::InvalidArgument(msg.to_string())
    }
}
