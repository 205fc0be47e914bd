use thiserror::Error;

/// The error-kind taxonomy: every fallible operation in this crate
/// family classifies its failure into one of these so that retry/fallback
/// logic can match on `kind()` instead of sniffing display strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transient,
    Auth,
    Unsupported,
    ChecksumMismatch,
    Cancelled,
    Invalid,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::Unsupported(_) => ErrorKind::Unsupported,
            SyncError::ChecksumMismatch(_) => ErrorKind::ChecksumMismatch,
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Invalid(_) => ErrorKind::Invalid,
            SyncError::Io(_) => ErrorKind::Transient,
        }
    }

    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        SyncError::Invalid(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
