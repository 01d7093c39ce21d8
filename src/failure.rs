//! Failure classification: map service errors to remediation messages
//!
//! Applied only at the turn boundary. Recognized exception codes become a
//! [`ServiceError`] the user can act on; everything else is handed back
//! unchanged so it surfaces as an unhandled failure.

use crate::error::StreamError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Exception code raised when an upstream data dependency fails
pub const DEPENDENCY_FAILED_EXCEPTION: &str = "dependencyFailedException";

/// Exception code raised when the model is throttled
pub const THROTTLING_EXCEPTION: &str = "throttlingException";

const QUOTA_GUIDE_URL: &str =
    "https://aws.amazon.com/jp/blogs/news/generative-ai-amazon-bedrock-handling-quota-problems/";

/// Closed set of service failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    DependencyFailure,
    Throttling,
    Unknown,
}

impl ServiceErrorCode {
    /// Detect a recognized exception code anywhere in an error description
    pub fn detect(description: &str) -> Self {
        if description.contains(DEPENDENCY_FAILED_EXCEPTION) {
            ServiceErrorCode::DependencyFailure
        } else if description.contains(THROTTLING_EXCEPTION) {
            ServiceErrorCode::Throttling
        } else {
            ServiceErrorCode::Unknown
        }
    }

    /// User-facing remediation text, if the code is recognized
    pub fn remediation(&self) -> Option<String> {
        match self {
            ServiceErrorCode::DependencyFailure => Some(
                "[Error] The query to the upstream data source appears to have failed. \
                 Please reload the page and try again."
                    .to_string(),
            ),
            ServiceErrorCode::Throttling => Some(format!(
                "[Error] The model is under heavy load. Please wait about a minute, \
                 reload the page and try again. If this keeps happening, switch to a \
                 different model or request a service quota increase ({}).",
                QUOTA_GUIDE_URL
            )),
            ServiceErrorCode::Unknown => None,
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErrorCode::DependencyFailure => write!(f, "dependency_failure"),
            ServiceErrorCode::Throttling => write!(f, "throttling"),
            ServiceErrorCode::Unknown => write!(f, "unknown"),
        }
    }
}

/// A recognized service failure, ready to show to the user
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub code: ServiceErrorCode,

    /// Remediation message for the user
    pub message: String,

    /// The transport error this was derived from
    #[source]
    pub original: Arc<StreamError>,
}

/// Stateless classifier applied at the turn boundary
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an error
    ///
    /// Returns `Err(error)` untouched when the error carries no recognized
    /// code.
    pub fn classify(&self, error: StreamError) -> Result<ServiceError, StreamError> {
        let code = ServiceErrorCode::detect(&error.to_string());
        let Some(message) = code.remediation() else {
            return Err(error);
        };

        tracing::warn!(code = %code, error = %error, "Service failure classified");

        Ok(ServiceError {
            code,
            message,
            original: Arc::new(error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_from_service_exception() {
        let err = StreamError::Service {
            code: "throttlingException".to_string(),
            message: "Your request rate is too high".to_string(),
        };
        let classified = FailureClassifier::new().classify(err).unwrap();
        assert_eq!(classified.code, ServiceErrorCode::Throttling);
        assert!(classified.message.contains("service quota"));
        assert!(classified.original.to_string().contains("Your request rate"));
    }

    #[test]
    fn test_dependency_failure_from_any_variant() {
        let err = StreamError::Http {
            status: 424,
            body: r#"{"__type":"dependencyFailedException","message":"Lambda failed"}"#.to_string(),
        };
        let classified = FailureClassifier::new().classify(err).unwrap();
        assert_eq!(classified.code, ServiceErrorCode::DependencyFailure);
        assert!(classified.message.contains("reload"));
    }

    #[test]
    fn test_unrecognized_error_is_returned_unchanged() {
        let err = StreamError::Service {
            code: "validationException".to_string(),
            message: "bad input".to_string(),
        };
        let returned = FailureClassifier::new().classify(err).unwrap_err();
        match returned {
            StreamError::Service { code, message } => {
                assert_eq!(code, "validationException");
                assert_eq!(message, "bad input");
            }
            other => panic!("error was altered: {:?}", other),
        }
    }

    #[test]
    fn test_detect_is_case_sensitive() {
        assert_eq!(
            ServiceErrorCode::detect("ThrottlingException"),
            ServiceErrorCode::Unknown
        );
        assert_eq!(
            ServiceErrorCode::detect("x throttlingException y"),
            ServiceErrorCode::Throttling
        );
    }

    #[test]
    fn test_unknown_has_no_remediation() {
        assert!(ServiceErrorCode::Unknown.remediation().is_none());
    }

    #[test]
    fn test_service_error_display_is_message() {
        let classified = FailureClassifier::new()
            .classify(StreamError::Stream("dependencyFailedException".into()))
            .unwrap();
        assert_eq!(classified.to_string(), classified.message);
    }
}
