use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the create-summary library.
///
/// The first three variants are the validated preconditions of an
/// invocation. Everything else comes out of pipeline assembly or execution.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A required environment variable is unset or empty.
    #[error("OpenWebUI {label} missing in environment variables.")]
    MissingEnv {
        /// Name of the variable that was checked
        var: &'static str,
        /// Short label used in the diagnostic
        label: &'static str,
    },

    /// The text file does not exist or is not a regular file.
    #[error("Text file {} does not exist.", .path.display())]
    MissingTextFile {
        /// Path given on the command line
        path: PathBuf,
    },

    /// The pipeline config file does not exist.
    #[error("Config file {} does not exist.", .path.display())]
    MissingConfigFile {
        /// Path given on the command line
        path: PathBuf,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in the input file.
    #[error("Invalid UTF-8 encoding in file '{path}'")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Pipeline configuration error.
    #[error("Invalid pipeline configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Override key could not be applied to the config.
    #[error("Cannot apply override '{key}': {reason}")]
    Override {
        /// Dotted override key
        key: String,
        /// Reason it was rejected
        reason: String,
    },

    /// Prompt template error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message
        message: String,
    },

    /// The LLM service answered with a non-success status.
    #[error("LLM service returned {status}: {body}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The LLM service reply could not be interpreted.
    #[error("Malformed LLM response: {message}")]
    MalformedResponse {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates a missing environment variable error.
    #[must_use]
    pub const fn missing_env(var: &'static str, label: &'static str) -> Self {
        Self::MissingEnv { var, label }
    }

    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an override error.
    #[must_use]
    pub fn override_rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Override {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // tera keeps the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = source.source();
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Returns true for the validated preconditions of an invocation.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingEnv { .. } | Self::MissingTextFile { .. } | Self::MissingConfigFile { .. }
        )
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Override { .. })
    }

    /// Returns true if the error came from talking to the LLM service.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Service { .. } | Self::MalformedResponse { .. }
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config {
            message: e.to_string(),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", &e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
        }
    }
}
