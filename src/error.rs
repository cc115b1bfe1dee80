use thiserror::Error;

use crate::config::ConfigError;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum AnyXmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a configured source is dropped from a run
///
/// Neither variant is fatal: the loader reports a warning and keeps going
/// with the remaining sources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source \"{url}\" could not be loaded: {reason}")]
    Load { url: String, reason: String },

    #[error("source \"{url}\" could not be parsed: {details}")]
    Parse { url: String, details: String },
}

impl SourceError {
    pub fn url(&self) -> &str {
        match self {
            SourceError::Load { url, .. } | SourceError::Parse { url, .. } => url,
        }
    }

    /// The short warning line reported for a dropped source
    pub fn warning(&self) -> String {
        match self {
            SourceError::Load { url, .. } => format!("source \"{}\" could not be loaded", url),
            SourceError::Parse { url, .. } => format!("source \"{}\" could not be parsed", url),
        }
    }
}

/// Cache-specific error types
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache write error: {key} - {details}")]
    WriteError { key: String, details: String },

    #[error("Cache read error: {key} - {details}")]
    ReadError { key: String, details: String },

    #[error("Cache corruption detected: {key} - {details}")]
    Corruption { key: String, details: String },

    #[error("Cache cleanup failed: {details}")]
    CleanupFailed { details: String },
}

/// Network-specific error types
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection timeout: {url} after {timeout_seconds}s")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("HTTP client setup failed: {details}")]
    ClientSetup { details: String },
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("Document parsing failed: {details}")]
    ParseFailed { details: String },

    #[error("Document has no root element")]
    NoRootElement,

    #[error("XPath context creation failed")]
    ContextCreationFailed,

    #[error("Invalid XPath expression: {expression}")]
    InvalidExpression { expression: String },

    #[error("XPath evaluation failed: {expression} - {details}")]
    EvaluationFailed { expression: String, details: String },

    #[error("Namespace registration failed: {prefix}")]
    NamespaceRegistration { prefix: String },

    #[error("Input contains an interior NUL byte")]
    InteriorNul,

    #[error("Input of {size} bytes exceeds the parser limit")]
    InputTooLarge { size: usize },
}

impl From<ConfigError> for AnyXmlError {
    fn from(err: ConfigError) -> Self {
        AnyXmlError::Config(err.to_string())
    }
}

impl From<CacheError> for AnyXmlError {
    fn from(err: CacheError) -> Self {
        AnyXmlError::Cache(err.to_string())
    }
}

impl From<NetworkError> for AnyXmlError {
    fn from(err: NetworkError) -> Self {
        AnyXmlError::Network(err.to_string())
    }
}

impl From<XmlError> for AnyXmlError {
    fn from(err: XmlError) -> Self {
        AnyXmlError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AnyXmlError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Network result type alias
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// LibXML2 result type alias
pub type XmlResult<T> = std::result::Result<T, XmlError>;
