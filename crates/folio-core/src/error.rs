//! Error types for Folio

use thiserror::Error;

/// Result type alias using Folio's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Folio error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Project '{0}' not found. Run `folio projects list` to see all projects.")]
    ProjectNotFound(String),

    #[error("Experience '{0}' not found. Run `folio experiences list` to see all experiences.")]
    ExperienceNotFound(String),

    #[error("No row with id '{id}' in table '{table}'")]
    RowNotFound { table: String, id: String },

    #[error("Unexpected row shape from '{table}': {message}")]
    UnexpectedRow { table: String, message: String },

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    // Storage errors (E200-E299)
    #[error("Invalid image URL: {0}")]
    InvalidImageUrl(String),

    #[error("Image upload failed: {0}")]
    UploadFailed(String),

    // Validation errors (E300-E399)
    #[error("Field '{0}' is required")]
    MissingField(String),

    #[error("File '{name}' is too large ({size} bytes). Maximum size is {max} bytes.")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("File '{0}' is not a supported image. Allowed: JPG, PNG, GIF, WEBP")]
    InvalidFileType(String),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Status lifecycle errors (E400-E499)
    #[error("Cannot {action} an experience that is '{from}'")]
    InvalidTransition { from: String, action: String },

    #[error("Another delete is in progress for '{0}'")]
    DeleteInProgress(String),

    // Auth errors (E500-E599)
    #[error("Not signed in. Run `folio login` first.")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // User errors (E700-E799)
    #[error("User cancelled operation")]
    UserCancelled,

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any network call
    Validation,
    /// Reported by the remote store, storage, auth, or transport
    Backend,
    /// Local I/O, serialization, or configuration problems
    Internal,
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound(_) => "E001",
            Self::ExperienceNotFound(_) => "E002",
            Self::RowNotFound { .. } => "E003",
            Self::UnexpectedRow { .. } => "E004",
            Self::NetworkError(_) => "E100",
            Self::Backend { .. } => "E101",
            Self::InvalidImageUrl(_) => "E200",
            Self::UploadFailed(_) => "E201",
            Self::MissingField(_) => "E300",
            Self::FileTooLarge { .. } => "E301",
            Self::InvalidFileType(_) => "E302",
            Self::InvalidRating(_) => "E303",
            Self::InvalidInput(_) => "E304",
            Self::InvalidTransition { .. } => "E400",
            Self::DeleteInProgress(_) => "E401",
            Self::NotAuthenticated => "E500",
            Self::AuthFailed(_) => "E501",
            Self::ConfigError(_) => "E600",
            Self::UserCancelled => "E700",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ProjectNotFound(_) => Some("folio projects list".to_string()),
            Self::ExperienceNotFound(_) => Some("folio experiences list".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::NotAuthenticated => Some("folio login --email <email>".to_string()),
            Self::AuthFailed(_) => Some("folio login --email <email>".to_string()),
            Self::ConfigError(_) => Some("folio config list".to_string()),
            Self::FileTooLarge { max, .. } => {
                Some(format!("Resize the image below {} KB", max / 1024))
            }
            _ => None,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_)
            | Self::FileTooLarge { .. }
            | Self::InvalidFileType(_)
            | Self::InvalidRating(_)
            | Self::InvalidInput(_)
            | Self::InvalidImageUrl(_)
            | Self::InvalidTransition { .. }
            | Self::DeleteInProgress(_)
            | Self::UserCancelled => ErrorKind::Validation,
            Self::ProjectNotFound(_)
            | Self::ExperienceNotFound(_)
            | Self::RowNotFound { .. }
            | Self::NetworkError(_)
            | Self::Backend { .. }
            | Self::UploadFailed(_)
            | Self::NotAuthenticated
            | Self::AuthFailed(_) => ErrorKind::Backend,
            Self::UnexpectedRow { .. }
            | Self::ConfigError(_)
            | Self::Serialization(_)
            | Self::Other(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// True for "row does not exist" style errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProjectNotFound(_) | Self::ExperienceNotFound(_) | Self::RowNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_grouped() {
        assert_eq!(Error::ProjectNotFound("x".into()).code(), "E001");
        assert_eq!(Error::InvalidImageUrl("x".into()).code(), "E200");
        assert_eq!(Error::MissingField("name".into()).code(), "E300");
        assert_eq!(Error::NotAuthenticated.code(), "E500");
        assert_eq!(Error::Other("x".into()).code(), "E9999");
    }

    #[test]
    fn test_error_kind_taxonomy() {
        let too_big = Error::FileTooLarge {
            name: "a.png".into(),
            size: 10,
            max: 5,
        };
        assert_eq!(too_big.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::Backend {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Backend
        );
        assert_eq!(Error::ConfigError("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(
            Error::ProjectNotFound("p".into()).suggestion(),
            Some("folio projects list".to_string())
        );
        assert!(Error::UserCancelled.suggestion().is_none());
    }

    #[test]
    fn test_not_found_detection() {
        let err = Error::RowNotFound {
            table: "projects".into(),
            id: "1".into(),
        };
        assert!(err.is_not_found());
        assert!(!Error::UserCancelled.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidTransition {
            from: "archived".into(),
            action: "archive".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot archive an experience that is 'archived'"
        );
    }
}
