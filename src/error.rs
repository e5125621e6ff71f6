use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    FileNotFound,
    ParseError,
    IoError,
    InvalidRequest,
    ClassNotFound,
    InconsistentDendrogram,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound => write!(f, "FILE_NOT_FOUND"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::IoError => write!(f, "IO_ERROR"),
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::ClassNotFound => write!(f, "CLASS_NOT_FOUND"),
            Self::InconsistentDendrogram => write!(f, "INCONSISTENT_DENDROGRAM"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LensError {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for LensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for LensError {}

impl LensError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::new(ErrorCode::FileNotFound, format!("File not found: {path}"))
    }

    pub fn parse_error(path: &str) -> Self {
        Self::new(ErrorCode::ParseError, format!("Failed to parse: {path}"))
    }

    pub fn class_not_found(name: &str) -> Self {
        Self::new(ErrorCode::ClassNotFound, format!("Class not found: {name}"))
    }

    /// A merge step names a cluster that no earlier step produced.
    pub fn inconsistent_dendrogram(step: usize, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InconsistentDendrogram,
            format!("Invalid merge sequence at step {step}: {detail}"),
        )
    }
}
