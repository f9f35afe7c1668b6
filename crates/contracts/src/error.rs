//! Layered error definitions
//!
//! Categorized by source: config / process / output

use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration and general errors
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Configuration validation error (all violations collected)
    #[error("config validation error: {0}")]
    ConfigValidation(FieldErrors),

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

    /// Create configuration validation error with a single violation
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation(FieldErrors(vec![FieldError::new(field, message)]))
    }

    /// Validation violations, if this is a validation error
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::ConfigValidation(errors) => Some(&errors.0),
            _ => None,
        }
    }
}

/// One configuration violation, addressed by field path (e.g. `outputs[0].http.url`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered collection of [`FieldError`]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{error}")?;
        }
        write!(f, "]")
    }
}

/// Error returned by a [`Processor`](crate::Processor)
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Payload is not a decodable audit event list
    #[error("failed to decode audit event list: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Processed event list could not be encoded again
    #[error("failed to encode audit event list: {message}")]
    Encode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Request context was cancelled
    #[error("processing cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ProcessError {
    /// Create decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }
}

/// Error returned by an [`Output`](crate::Output)
#[derive(Debug, Error)]
pub enum OutputError {
    /// Payload compression failed
    #[error("failed to gzip payload: {0}")]
    Compression(#[source] std::io::Error),

    /// Network level failure (DNS, connect, TLS handshake, timeout)
    #[error("failed to send request: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Remote answered with a status outside 2xx
    #[error("output returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Request context was cancelled before delivery finished
    #[error("request cancelled")]
    Cancelled,
}

impl OutputError {
    /// Create transport error with source
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
