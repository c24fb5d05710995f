use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Coarse category of a tool failure, reported alongside the message in
/// the failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Execution,
    Timeout,
    DependencyUnavailable,
}

/// Errors a tool handler (or the adapter underneath it) can produce.
///
/// Messages are meant to be read out to the user, so they stay short and
/// never include debug dumps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Execution(String),
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },
    #[error("{dependency} is not available. {hint}")]
    DependencyUnavailable {
        dependency: &'static str,
        hint: &'static str,
    },
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
        }
    }

    /// Maps an I/O error from touching `what` into the closest tool error.
    pub fn from_io(what: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(format!("{}: {}", what, err)),
            std::io::ErrorKind::PermissionDenied => {
                Self::Execution(format!("Permission denied: {}", what))
            }
            _ => Self::Execution(format!("{}: {}", what, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_operation() {
        let err = ToolError::Timeout {
            operation: "tesseract".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "tesseract timed out after 1.5s");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn dependency_message_includes_hint() {
        let err = ToolError::DependencyUnavailable {
            dependency: "tesseract",
            hint: "Install Tesseract OCR.",
        };
        assert_eq!(err.to_string(), "tesseract is not available. Install Tesseract OCR.");
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ToolError::from_io("/tmp/x", &io).kind(), ErrorKind::NotFound);
    }
}
