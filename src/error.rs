//! Error types for the planning render pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or rendering a planning
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed planning or missing/invalid style preferences.
    /// Detected before any resource is allocated.
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// Failed to write the temporary markup document
    #[error("Failed to write markup artifact: {0}")]
    ArtifactWriteError(String),

    /// Failed to create a render surface
    #[error("Surface initialization failed: {0}")]
    InitializationError(String),

    /// The surface could not load the markup document
    #[error("Failed to load document: {0}")]
    RenderLoadError(String),

    /// Frame capture failed after a successful load
    #[error("Frame capture failed: {0}")]
    CaptureError(String),

    /// Encoding or writing the final image failed
    #[error("Failed to write image: {0}")]
    WriteError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Settings file could not be read or written
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a configuration rejection (the only kind the
    /// job operation surfaces to its caller).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::ConfigurationError(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::WriteError("/nope/out.jpg: permission denied".into());
        assert_eq!(
            err.to_string(),
            "Failed to write image: /nope/out.jpg: permission denied"
        );
        assert_eq!(Error::Timeout(250).to_string(), "Operation timed out after 250ms");
    }

    #[test]
    fn only_configuration_errors_are_rejections() {
        assert!(Error::ConfigurationError("x".into()).is_configuration());
        assert!(!Error::CaptureError("x".into()).is_configuration());
    }
}
