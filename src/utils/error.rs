use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IneError {
    #[error("No text detected in OCR result")]
    NoTextDetected,
    #[error("Malformed MRZ: {0}")]
    MalformedMrz(String),
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),
    #[error("Ambiguous field: {0}")]
    AmbiguousField(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IneError {
    fn from(err: std::io::Error) -> Self {
        IneError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for IneError {
    fn from(err: serde_json::Error) -> Self {
        IneError::InvalidInput(err.to_string())
    }
}
