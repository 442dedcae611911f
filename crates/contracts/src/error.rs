//! Layered error definitions
//!
//! Categorized by source: config / endpoint / frame / transport

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Endpoint Errors =====
    /// Malformed `[proto@]host:port` spec
    #[error("invalid endpoint '{spec}': {message}")]
    InvalidEndpoint { spec: String, message: String },

    /// Host name could not be resolved
    #[error("failed to resolve '{host}': {message}")]
    Resolve { host: String, message: String },

    // ===== Frame Errors =====
    /// Unit larger than the configured maximum
    #[error("frame of {len} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { len: u64, max: u64 },

    // ===== Transport Errors =====
    /// Destination connect error
    #[error("destination '{destination}' connection error: {message}")]
    TransportConnect {
        destination: String,
        message: String,
    },

    /// Destination write error
    #[error("destination '{destination}' write error: {message}")]
    TransportWrite {
        destination: String,
        message: String,
    },

    /// Send attempted without an open connection
    #[error("destination '{destination}' is not connected")]
    NotConnected { destination: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_endpoint(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            spec: spec.into(),
            message: message.into(),
        }
    }

    pub fn resolve(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create destination connect error
    pub fn transport_connect(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportConnect {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create destination write error
    pub fn transport_write(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportWrite {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn not_connected(destination: impl Into<String>) -> Self {
        Self::NotConnected {
            destination: destination.into(),
        }
    }
}
