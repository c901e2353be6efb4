use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {format} content: {reason}")]
    Format { format: &'static str, reason: String },

    #[error("Import cancelled")]
    Cancelled,

    #[error("No parser for file: {}", .0.display())]
    UnsupportedFile(PathBuf),
}

impl ImportError {
    pub fn format(format: &'static str, reason: impl Into<String>) -> Self {
        ImportError::Format {
            format,
            reason: reason.into(),
        }
    }

    /// A user-requested abort, as opposed to a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::Cancelled)
    }

    /// Map an XML reader error onto the import taxonomy. Read failures of the
    /// underlying stream stay I/O errors; everything else is malformed content.
    pub(crate) fn from_xml(format: &'static str, err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => {
                ImportError::Io(std::io::Error::new(io.kind(), io.to_string()))
            }
            other => ImportError::format(format, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
