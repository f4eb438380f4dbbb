use crate::domain::model::{AccessMode, Format};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SzsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid {format} magic: 0x{found:08X}")]
    InvalidMagic { format: Format, found: u32 },

    #[error("Unknown SZS format: {magic}")]
    UnknownFormat { magic: String },

    #[error("Corrupt {format} data: {message}")]
    CorruptData { format: Format, message: String },

    #[error("Truncated {format} data: expected {expected} bytes, got {actual}")]
    Truncated {
        format: Format,
        expected: u64,
        actual: u64,
    },

    #[error("{path}: not found")]
    NotFound { path: String },

    #[error("{path} isn't a directory")]
    NotADirectory { path: String },

    #[error("{path}: is a directory")]
    IsADirectory { path: String },

    #[error("Archive closed")]
    Closed,

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Unsupported pattern syntax '{syntax}'")]
    UnsupportedSyntax { syntax: String },

    #[error("Invalid SZS URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    #[error("{path}: {mode} access denied, archives are read-only")]
    AccessDenied { path: String, mode: AccessMode },

    #[error("Path escapes the output directory: {path}")]
    UnsafePath { path: String },

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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Format,
    Lookup,
    Configuration,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SzsError {
    pub fn corrupt(format: Format, message: impl Into<String>) -> Self {
        SzsError::CorruptData {
            format,
            message: message.into(),
        }
    }

    pub fn not_found(path: impl ToString) -> Self {
        SzsError::NotFound {
            path: path.to_string(),
        }
    }

    /// Recovers [`SzsError::Closed`] from an I/O error raised by an archive
    /// reader; any other error is wrapped as [`SzsError::IoError`].
    pub fn from_io(error: std::io::Error) -> Self {
        let closed = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<SzsError>())
            .is_some_and(|inner| matches!(inner, SzsError::Closed));
        if closed {
            SzsError::Closed
        } else {
            SzsError::IoError(error)
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SzsError::IoError(_) => ErrorCategory::Io,
            SzsError::InvalidMagic { .. }
            | SzsError::UnknownFormat { .. }
            | SzsError::CorruptData { .. }
            | SzsError::Truncated { .. } => ErrorCategory::Format,
            SzsError::Closed
            | SzsError::NotFound { .. }
            | SzsError::NotADirectory { .. }
            | SzsError::IsADirectory { .. }
            | SzsError::InvalidPattern { .. }
            | SzsError::UnsupportedSyntax { .. }
            | SzsError::InvalidUri { .. }
            | SzsError::AccessDenied { .. } => ErrorCategory::Lookup,
            SzsError::ConfigError { .. }
            | SzsError::ConfigValidationError { .. }
            | SzsError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            SzsError::ZipError(_)
            | SzsError::CsvError(_)
            | SzsError::SerializationError(_)
            | SzsError::UnsafePath { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lookup => ErrorSeverity::Medium,
            ErrorCategory::Format | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SzsError::IoError(_) => "Check that the file exists and is readable",
            SzsError::Closed => "Reopen the archive before reading from it",
            SzsError::InvalidMagic { .. } | SzsError::UnknownFormat { .. } => {
                "Make sure the input is a Yaz0, U8 or SARC file"
            }
            SzsError::CorruptData { .. } | SzsError::Truncated { .. } => {
                "The file is damaged; try re-dumping it from the source"
            }
            SzsError::NotFound { .. } => "Run `szs list` to see the available entries",
            SzsError::NotADirectory { .. } | SzsError::IsADirectory { .. } => {
                "Check the entry type with `szs list`"
            }
            SzsError::InvalidPattern { .. } | SzsError::UnsupportedSyntax { .. } => {
                "Use a 'glob:' or 'regex:' pattern"
            }
            SzsError::InvalidUri { .. } => "Use a URI of the form szs:file://<archive>!/<path>",
            SzsError::AccessDenied { .. } => "Extract the entry before modifying or running it",
            SzsError::UnsafePath { .. } => "The archive contains unsafe entry names",
            SzsError::ZipError(_) | SzsError::CsvError(_) | SzsError::SerializationError(_) => {
                "Check free disk space and output permissions"
            }
            SzsError::ConfigError { .. }
            | SzsError::ConfigValidationError { .. }
            | SzsError::InvalidConfigValueError { .. } => "Fix the configuration file and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access the archive: {}", self),
            ErrorCategory::Format => format!("The archive could not be read: {}", self),
            ErrorCategory::Lookup => format!("Entry lookup failed: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Output => format!("Writing output failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SzsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        let err: SzsError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_format_error_messages() {
        let err = SzsError::UnknownFormat {
            magic: "PK\u{3}\u{4}".to_string(),
        };
        assert!(err.to_string().starts_with("Unknown SZS format"));
        assert_eq!(err.category(), ErrorCategory::Format);

        let err = SzsError::InvalidMagic {
            format: Format::U8,
            found: 0x1234,
        };
        assert_eq!(err.to_string(), "Invalid U8 magic: 0x00001234");
    }

    #[test]
    fn test_closed_survives_io_wrapping() {
        let wrapped = std::io::Error::new(std::io::ErrorKind::NotConnected, SzsError::Closed);
        let err = SzsError::from_io(wrapped);
        assert!(matches!(err, SzsError::Closed));
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let plain = std::io::Error::new(std::io::ErrorKind::NotConnected, "other");
        assert!(matches!(SzsError::from_io(plain), SzsError::IoError(_)));
    }

    #[test]
    fn test_lookup_errors_are_recoverable() {
        let err = SzsError::not_found("/missing");
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("/missing"));
    }
}
