//! Host error types.

use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by a host document implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Feature no longer exists in the document.
    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    /// Dimension not found on a feature.
    #[error("Dimension not found: {feature}/{dimension}")]
    DimensionNotFound { feature: String, dimension: String },

    /// The host cannot perform this operation for this feature.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No document is open in the host.
    #[error("No active document")]
    NoDocument,

    /// The host call failed.
    #[error("Host call failed: {0}")]
    CallFailed(String),
}

impl HostError {
    /// Create a call failed error.
    pub fn call_failed(message: impl Into<String>) -> Self {
        Self::CallFailed(message.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Whether the error only means the host lacks the capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_formats() {
        assert_eq!(
            HostError::FeatureNotFound("Fillet1".into()).to_string(),
            "Feature not found: Fillet1"
        );
        assert_eq!(
            HostError::DimensionNotFound {
                feature: "Sketch1".into(),
                dimension: "D1".into()
            }
            .to_string(),
            "Dimension not found: Sketch1/D1"
        );
    }

    #[test]
    fn unsupported_is_recognised() {
        assert!(HostError::unsupported("set_feature_parameter").is_unsupported());
        assert!(!HostError::call_failed("COM exception").is_unsupported());
    }
}
