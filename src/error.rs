//! Error types for the Sparkify ETL
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the ETL
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    #[error("Failed to extract records from '{path}': {message}")]
    Extract { path: String, message: String },

    // ============================================================================
    // Arrow/Parquet/Storage Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Row Store Errors
    // ============================================================================
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Max retries ({max_retries}) exceeded: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    // ============================================================================
    // Cluster Errors
    // ============================================================================
    #[error("Cluster provider error: {message}")]
    Cluster { message: String },

    #[error("Cluster '{cluster_id}' not available after {timeout_secs}s")]
    ProvisionTimeout { cluster_id: String, timeout_secs: u64 },

    #[error("Cluster '{cluster_id}' entered terminal status '{status}'")]
    ClusterFailed { cluster_id: String, status: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error for a single input file
    pub fn extract(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extract {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a cluster provider error
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Check if this error is transient and the failed operation may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection { .. } => true,
            Error::Io(e) => is_retryable_io(e.kind()),
            Error::ObjectStore(e) => matches!(e, object_store::Error::Generic { .. }),
            _ => false,
        }
    }
}

/// Check if an I/O error kind is worth retrying
fn is_retryable_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
    )
}

/// Result type alias for the ETL
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("sink.output");
        assert_eq!(err.to_string(), "Missing required config field: sink.output");

        let err = Error::extract("log_data/2018-11-05-events.json", "line 3: EOF");
        assert_eq!(
            err.to_string(),
            "Failed to extract records from 'log_data/2018-11-05-events.json': line 3: EOF"
        );

        let err = Error::ProvisionTimeout {
            cluster_id: "dwh".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(err.to_string(), "Cluster 'dwh' not available after 30s");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::connection("reset by peer").is_retryable());
        assert!(Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).is_retryable());
        assert!(Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_retryable());

        assert!(!Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::extract("a.json", "bad").is_retryable());
        assert!(!Error::MaxRetriesExceeded {
            max_retries: 3,
            last_error: "x".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
