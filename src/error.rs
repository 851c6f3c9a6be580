//! Centralized error handling for Modex.
//!
//! All failure conditions are represented as `Result` values; the library
//! enforces this through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! Errors are categorized by their domain:
//!
//! - **I/O Errors** ([`ModexError::Io`]): Low-level file system operations
//! - **Format Errors** ([`ModexError::Format`]): Malformed markup, bad
//!   radix-36 digits, truncated or corrupt payloads
//! - **Missing Fields** ([`ModexError::MissingField`]): A field declared
//!   required by the schema was absent
//! - **Unknown Tags** ([`ModexError::UnknownTag`]): A tag with no schema
//!   entry was encountered (never silently dropped)
//! - **Dependency Errors** ([`ModexError::Dependency`]): A record's
//!   prerequisite id is undeclared, or the reference graph contains a cycle
//! - **Count Mismatches** ([`ModexError::CountMismatch`]): The resolver
//!   submitted and completed counts disagree after a finished decode
//! - **Version Mismatches** ([`ModexError::Version`]): The file's producer
//!   version is incompatible with the consumer
//!
//! Every fatal condition aborts the entire encode or decode operation; no
//! partial model is ever returned. Cancellation is not an error and is
//! reported through [`crate::ImportOutcome::Cancelled`] instead.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use modex::{ModexError, Result};
//!
//! fn check(err: &ModexError) {
//!     match err {
//!         ModexError::Io(e) => eprintln!("I/O error: {e}"),
//!         ModexError::UnknownTag(msg) => eprintln!("unknown tag: {msg}"),
//!         other => eprintln!("import failed: {other}"),
//!     }
//! }
//!
//! fn parse_step() -> Result<u64> {
//!     Ok(42)
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Modex operations.
pub type Result<T> = std::result::Result<T, ModexError>;

/// The master error enum covering all failure domains in Modex.
///
/// This type is `Clone` so errors can be stored for later analysis or moved
/// across threads; I/O errors are wrapped in `Arc` to make cloning cheap.
#[derive(Debug, Clone)]
pub enum ModexError {
    /// Low-level I/O failure (disk full, permissions, truncated gzip, etc.).
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to keep the error
    /// `Clone`.
    Io(Arc<io::Error>),

    /// The payload text is malformed: broken markup, mismatched close tags,
    /// invalid radix-36 digits, or an unparseable timestamp.
    Format(String),

    /// A field marked required by the schema was not found where expected.
    ///
    /// The message names both the schema token and the semantic field name.
    MissingField(String),

    /// A tag with no corresponding schema entry was encountered.
    ///
    /// Unknown tags are fatal so that the absence of a field is always
    /// distinguishable from decode corruption.
    UnknownTag(String),

    /// The producer version recorded in the file is incompatible with the
    /// version expected by the importer.
    Version(String),

    /// A record's prerequisite id was never declared, or the id reference
    /// graph contains a cycle. The message carries the full dependency path.
    Dependency(String),

    /// The number of records submitted to the resolver does not match the
    /// number delivered after decoding finished.
    ///
    /// This indicates a resolver or producer bug rather than ordinary input
    /// corruption; the message includes one concrete stuck record.
    CountMismatch(String),
}

impl fmt::Display for ModexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::MissingField(s) => write!(f, "Required element missing: {s}"),
            Self::UnknownTag(s) => write!(f, "Unknown schema tag: {s}"),
            Self::Version(s) => write!(f, "Version Mismatch: {s}"),
            Self::Dependency(s) => write!(f, "Dependency Error: {s}"),
            Self::CountMismatch(s) => write!(f, "Callback Count Mismatch: {s}"),
        }
    }
}

impl std::error::Error for ModexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ModexError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
