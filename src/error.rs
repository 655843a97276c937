//! Error types and result handling for Hondana operations.
//!
//! Internal operations return a [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. The public [`Source`](crate::Source)
//! capability methods never surface these errors: adapters report them to the
//! [`FallbackManager`](crate::health::FallbackManager) and hand the caller an
//! empty list or `None` instead.
//!
//! # Error Categories
//!
//! - **Network Errors**: DNS, connection and TLS failures from the transport
//! - **Timeouts**: probes or requests that exceeded their bounded timeout
//! - **HTTP Errors**: an error status with no usable body
//! - **Parse Errors**: invalid HTML, JSON or identifier formats
//! - **Source Errors**: provider-specific errors with context
//! - **Not Found**: missing manga, chapters or sources
//! - **Config Errors**: invalid source tables
//!
//! # Examples
//!
//! ```rust
//! use hondana::Error;
//!
//! let error = Error::source("mangapark", "comic node missing");
//! assert!(error.to_string().contains("mangapark"));
//! ```

use thiserror::Error;

/// Type alias for Results with Hondana errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Hondana operations.
///
/// # Variants
///
/// * [`Network`](Error::Network) - HTTP client and connection errors
/// * [`Timeout`](Error::Timeout) - A request exceeded its timeout
/// * [`Http`](Error::Http) - Error status with an empty body
/// * [`Parse`](Error::Parse) - Data parsing and format errors
/// * [`Source`](Error::Source) - Source-specific errors with context
/// * [`NotFound`](Error::NotFound) - Missing resources
/// * [`Config`](Error::Config) - Invalid configuration
/// * [`Io`](Error::Io) - File system and IO errors
/// * [`Json`](Error::Json) - JSON serialization errors
/// * [`Other`](Error::Other) - Generic error messages
#[derive(Error, Debug)]
pub enum Error {
    /// Network-related errors from HTTP operations.
    ///
    /// Wraps errors from the underlying HTTP client (reqwest): DNS failures,
    /// refused connections, TLS errors and aborted transfers.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request did not complete within its bounded timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The provider answered with an error status and no body to parse.
    ///
    /// Error statuses that still carry a body are not reported through this
    /// variant; parsing is attempted on them instead.
    #[error("HTTP {status} from [{src}]")]
    Http { src: String, status: u16 },

    /// HTML/JSON parsing and data format errors.
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::parse("Missing comic node in response");
    /// ```
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source-specific errors with contextual information.
    ///
    /// # Fields
    ///
    /// * `src` - The identifier of the source that encountered the error
    /// * `message` - Descriptive error message explaining what went wrong
    #[error("Source error [{src}]: {message}")]
    Source { src: String, message: String },

    /// Resource not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid source table or genre map.
    #[error("Config error: {0}")]
    Config(String),

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a source-specific error with source ID and message.
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::source("mangadex", "at-home server returned no hash");
    /// ```
    pub fn source(src: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Source {
            src: src.into(),
            message: msg.into(),
        }
    }

    /// Creates a not found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Returns `true` when the error signals blocking or rate limiting
    /// (HTTP 403, 429 or 503).
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let blocked = Error::Http { src: "mangapark".into(), status: 503 };
    /// assert!(blocked.is_blocking());
    /// assert!(!Error::parse("bad json").is_blocking());
    /// ```
    pub fn is_blocking(&self) -> bool {
        match self {
            Error::Http { status, .. } => matches!(status, 403 | 429 | 503),
            Error::Network(e) => e
                .status()
                .is_some_and(|s| matches!(s.as_u16(), 403 | 429 | 503)),
            _ => false,
        }
    }
}
