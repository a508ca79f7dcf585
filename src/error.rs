//! Global error handling for dirdoc
//!
//! Only fatal conditions are represented here. Per-entry failures during a
//! walk are recorded as [`WalkWarning`](crate::types::WalkWarning)s and never
//! abort the traversal.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Global error type for dirdoc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Root path missing or unreadable
    #[error("Cannot access {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Root path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Configuration values out of range or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A glob pattern failed to compile
    #[error("Invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The ignore file could not be parsed
    #[error("Ignore file error: {0}")]
    Ignore(#[from] ignore::Error),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regular expression errors
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Writer errors
    #[error("Writer error: {0}")]
    Writer(String),
}

impl Error {
    /// Create an access error with path context.
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Access {
            path: path.into(),
            source,
        }
    }
}

/// Specialized Result type for dirdoc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Creates an Error with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::Error::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(value: u64) -> Result<u64> {
        crate::ensure!(value > 0, Config, "value must be greater than 0, got {}", value);
        Ok(value)
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(check_positive(3).unwrap(), 3);
        let err = check_positive(0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_access_error_keeps_path() {
        let err = Error::access(
            "/missing/root",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/missing/root"));
        assert!(matches!(err, Error::Access { .. }));
    }
}
