//! Error types for depcrawl

use thiserror::Error;

/// Result type alias using depcrawl's Error
pub type Result<T> = std::result::Result<T, Error>;

/// depcrawl error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Registry returned HTTP {status} for '{package}': {message}")]
    Registry {
        package: String,
        status: u16,
        message: String,
    },

    #[error("Package '{0}' not found in the registry.")]
    PackageNotFound(String),

    #[error("Malformed manifest for '{package}': {reason}")]
    ManifestMalformed { package: String, reason: String },

    #[error("Request for '{0}' timed out.")]
    Timeout(String),

    #[error("Rate limited by the registry. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Graph store errors (E200-E299)
    #[error("Failed to load the package identity map: {0}")]
    IdentityLoad(String),

    #[error("Graph store error: {0}")]
    GraphStore(String),

    #[error("Entity '{0}' is not registered in the identity map.")]
    UnknownEntity(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::Registry { .. } => "E101",
            Self::PackageNotFound(_) => "E102",
            Self::ManifestMalformed { .. } => "E103",
            Self::Timeout(_) => "E104",
            Self::RateLimited(_) => "E105",
            Self::IdentityLoad(_) => "E200",
            Self::GraphStore(_) => "E201",
            Self::UnknownEntity(_) => "E202",
            Self::InvalidInput(_) => "E800",
            Self::Json(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::Timeout(_) => Some("depcrawl config set registry.timeout_secs 60".to_string()),
            Self::IdentityLoad(_) => Some("depcrawl import --output <snapshot>".to_string()),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::Registry { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn malformed(package: &str, reason: impl Into<String>) -> Self {
        Self::ManifestMalformed {
            package: package.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::PackageNotFound("left-pad".into()).code(), "E102");
        assert_eq!(Error::IdentityLoad("boom".into()).code(), "E200");
        assert_eq!(Error::Io(std::io::Error::other("x")).code(), "E9999");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout("react".into()).is_transient());
        assert!(Error::RateLimited(5).is_transient());
        assert!(
            Error::Registry {
                package: "react".into(),
                status: 503,
                message: String::new(),
            }
            .is_transient()
        );
        assert!(
            !Error::Registry {
                package: "react".into(),
                status: 400,
                message: String::new(),
            }
            .is_transient()
        );
        assert!(!Error::malformed("react", "no versions").is_transient());
        assert!(!Error::PackageNotFound("react".into()).is_transient());
    }

    #[test]
    fn test_malformed_message_names_package() {
        let err = Error::malformed("lodash", "missing dist-tags.latest");
        assert_eq!(
            err.to_string(),
            "Malformed manifest for 'lodash': missing dist-tags.latest"
        );
    }

    #[test]
    fn test_suggestions() {
        assert!(Error::IdentityLoad("x".into()).suggestion().is_some());
        assert!(Error::Timeout("react".into()).suggestion().is_some());
        assert!(Error::GraphStore("x".into()).suggestion().is_none());
    }
}
