use std::io;

use thiserror::Error;

/// Failure categories recorded in `processing_errors.error_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Permission,
    Corrupted,
    Io,
    Parse,
    Unsupported,
    ToolMissing,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Permission => "permission",
            ErrorCategory::Corrupted => "corrupted",
            ErrorCategory::Io => "io",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Unsupported => "unsupported",
            ErrorCategory::ToolMissing => "tool_missing",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// What kind of file the failure was observed on,
/// recorded in `processing_errors.error_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    MediaFile,
    JsonSidecar,
    AlbumMetadata,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::MediaFile => "media_file",
            ErrorType::JsonSidecar => "json_sidecar",
            ErrorType::AlbumMetadata => "album_metadata",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("corrupted file: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("required tool missing: {0}")]
    ToolMissing(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Fatal(String),
}

impl ScanError {
    /// Map an error onto the processing_errors taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScanError::Permission(_) => ErrorCategory::Permission,
            ScanError::Corrupted(_) => ErrorCategory::Corrupted,
            ScanError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ErrorCategory::Permission
            }
            ScanError::Io(_) => ErrorCategory::Io,
            ScanError::Parse(_) => ErrorCategory::Parse,
            ScanError::Unsupported(_) => ErrorCategory::Unsupported,
            ScanError::ToolMissing(_) => ErrorCategory::ToolMissing,
            ScanError::Database(_) | ScanError::Fatal(_) => ErrorCategory::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_strings_match_taxonomy() {
        assert_eq!(ErrorCategory::Permission.as_str(), "permission");
        assert_eq!(ErrorCategory::Corrupted.as_str(), "corrupted");
        assert_eq!(ErrorCategory::Io.as_str(), "io");
        assert_eq!(ErrorCategory::Parse.as_str(), "parse");
        assert_eq!(ErrorCategory::Unsupported.as_str(), "unsupported");
        assert_eq!(ErrorCategory::ToolMissing.as_str(), "tool_missing");
        assert_eq!(ErrorCategory::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_permission_denied_io_classifies_as_permission() {
        let err = ScanError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_other_io_classifies_as_io() {
        let err = ScanError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_tool_missing_category() {
        assert_eq!(
            ScanError::ToolMissing("ffprobe".into()).category(),
            ErrorCategory::ToolMissing
        );
    }
}
