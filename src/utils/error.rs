use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagenError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("API key missing: set GEMINI_API_KEY, pass --api-key or add api.key to the config file")]
    MissingApiKey,

    #[error("Imagen API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed ({status}): {message}")]
    AuthenticationError { status: u16, message: String },

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("No images returned: {reason}")]
    ContentFiltered { reason: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{failed} of {total} prompts failed; first error: {source}")]
    BatchError {
        failed: usize,
        total: usize,
        source: Box<ImagenError>,
    },

    #[error("Background task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Authentication,
    Content,
    Configuration,
    Io,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImagenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImagenError::HttpError(_) | ImagenError::RateLimited { .. } => ErrorCategory::Network,
            ImagenError::ApiError { .. } => ErrorCategory::Api,
            ImagenError::MissingApiKey | ImagenError::AuthenticationError { .. } => {
                ErrorCategory::Authentication
            }
            ImagenError::ContentFiltered { .. } => ErrorCategory::Content,
            ImagenError::ConfigError { .. }
            | ImagenError::ConfigValidationError { .. }
            | ImagenError::InvalidConfigValueError { .. }
            | ImagenError::MissingConfigError { .. }
            | ImagenError::ValidationError { .. } => ErrorCategory::Configuration,
            ImagenError::IoError(_) | ImagenError::TaskError { .. } => ErrorCategory::Io,
            ImagenError::BatchError { source, .. } => source.category(),
            ImagenError::SerializationError(_) | ImagenError::DecodeError(_) => ErrorCategory::Data,
        }
    }

    /// Medium marks failures worth retrying later; Critical marks local
    /// system failures.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImagenError::HttpError(_) | ImagenError::RateLimited { .. } => ErrorSeverity::Medium,
            ImagenError::ApiError { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            ImagenError::IoError(_) | ImagenError::TaskError { .. } => ErrorSeverity::Critical,
            ImagenError::BatchError { source, .. } => source.severity(),
            _ => ErrorSeverity::High,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ImagenError::MissingApiKey => {
                "Create a key at https://aistudio.google.com/apikey and export GEMINI_API_KEY"
            }
            ImagenError::AuthenticationError { .. } => {
                "Check that the API key is valid and has access to the Imagen models"
            }
            ImagenError::RateLimited { .. } => {
                "Wait a minute and retry, or lower the batch concurrency"
            }
            ImagenError::HttpError(_) => {
                "Check the network connection and the API endpoint, or raise --timeout"
            }
            ImagenError::ApiError { status, .. } if *status >= 500 => {
                "The service is having trouble; retry later"
            }
            ImagenError::ApiError { .. } => {
                "Check the model name and generation parameters (see `imagenation models`)"
            }
            ImagenError::ContentFiltered { .. } => {
                "Rephrase the prompt; it was blocked by the safety filter"
            }
            ImagenError::IoError(_) => "Check that the output directory is writable",
            ImagenError::SerializationError(_) | ImagenError::DecodeError(_) => {
                "The API returned an unexpected response; retry or run with --verbose"
            }
            ImagenError::ConfigError { .. }
            | ImagenError::ConfigValidationError { .. }
            | ImagenError::InvalidConfigValueError { .. }
            | ImagenError::MissingConfigError { .. } => {
                "Fix the configuration file or command line flags"
            }
            ImagenError::ValidationError { .. } => "Check the prompt and generation options",
            ImagenError::BatchError { source, .. } => source.recovery_suggestion(),
            ImagenError::TaskError { .. } => "Retry the batch; run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImagenError::HttpError(e) if e.is_timeout() => {
                "The request to the Imagen API timed out".to_string()
            }
            ImagenError::HttpError(e) if e.is_connect() => {
                "Could not connect to the Imagen API".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImagenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_message() {
        let err = ImagenError::MissingApiKey;
        assert!(err.to_string().starts_with("API key missing"));
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_retryable_errors_are_medium() {
        assert_eq!(
            ImagenError::RateLimited { attempts: 4 }.severity(),
            ErrorSeverity::Medium
        );
        let server_error = ImagenError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(server_error.severity(), ErrorSeverity::Medium);
        assert_eq!(server_error.exit_code(), 2);

        let bad_request = ImagenError::ApiError {
            status: 400,
            message: "bad".to_string(),
        };
        assert_eq!(bad_request.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_batch_error_follows_first_failure() {
        let err = ImagenError::BatchError {
            failed: 2,
            total: 5,
            source: Box::new(ImagenError::RateLimited { attempts: 3 }),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.to_string().starts_with("2 of 5 prompts failed"));
    }

    #[test]
    fn test_io_error_is_critical() {
        let err = ImagenError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
    }
}
