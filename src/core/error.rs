//! Error types for the NeuralLog SDK
//!
//! None of these errors ever reaches application code from a logging call;
//! they are recovered where they occur and only surface through diagnostic
//! callbacks or from explicit setup calls.

pub type Result<T> = std::result::Result<T, NeuralLogError>;

#[derive(Debug, thiserror::Error)]
pub enum NeuralLogError {
    /// A configuration file exists but could not be read or parsed
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParse { path: String, message: String },

    /// An object could not be converted into a field mapping
    #[error("Failed to serialize {type_name}: {message}")]
    Serialization { type_name: String, message: String },

    /// The transport could not deliver a batch
    #[error("Failed to send {count} log entries to '{log_name}': {message}")]
    Dispatch {
        log_name: String,
        count: usize,
        message: String,
    },

    /// HTTP client error
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },
}

impl NeuralLogError {
    /// Create a configuration parse error for a candidate file
    pub fn config_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        NeuralLogError::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        NeuralLogError::Serialization {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a dispatch error for a failed batch
    pub fn dispatch(log_name: impl Into<String>, count: usize, message: impl Into<String>) -> Self {
        NeuralLogError::Dispatch {
            log_name: log_name.into(),
            count,
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        NeuralLogError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}
