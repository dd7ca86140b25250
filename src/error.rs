use std::fmt;
use std::io;

/// Errors surfaced by the document façade and the output driver.
#[derive(Debug)]
pub enum SvgError {
    /// An operation that needs a parsed document was called before `load`.
    NotLoaded,
    /// The destination (or scratch) buffer is too small for the request.
    BufferTooSmall { needed: usize, got: usize },
    /// The driver was configured in a way it cannot honor.
    InvalidConfiguration(String),
    Io(io::Error),
}

impl fmt::Display for SvgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgError::NotLoaded => write!(f, "document is not loaded"),
            SvgError::BufferTooSmall { needed, got } => {
                write!(f, "buffer too small: need {needed} bytes, got {got}")
            }
            SvgError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {msg}")
            }
            SvgError::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for SvgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SvgError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SvgError {
    fn from(err: io::Error) -> Self {
        SvgError::Io(err)
    }
}
