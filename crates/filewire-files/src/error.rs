/// Errors that can occur in file-bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The handle does not refer to an open file.
    #[error("invalid file handle {0}")]
    InvalidHandle(u32),

    /// The argument buffer is shorter than the method requires.
    #[error("truncated arguments ({actual} bytes, need at least {expected})")]
    TruncatedArguments { expected: usize, actual: usize },

    /// A string argument is not valid UTF-8.
    #[error("argument string is not valid UTF-8: {0}")]
    InvalidString(#[from] std::str::Utf8Error),

    /// No file picker is attached to this service.
    #[error("no file picker attached")]
    PickerUnavailable,

    /// The remote side answered with an error status.
    #[error("remote error: {0}")]
    Remote(String),

    /// A local file I/O error.
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FileError>;
