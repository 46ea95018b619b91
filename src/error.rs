#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Catalog API error: {status} - {message}")]
    Catalog { status: u16, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Companion error: {0}")]
    Companion(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Audio(_) => "audio",
            AppError::Decode(_) => "decode",
            AppError::Stream(_) => "stream",
            AppError::Catalog { .. } => "catalog",
            AppError::Config(_) => "config",
            AppError::NotFound(_) => "not_found",
            AppError::Companion(_) => "companion",
            AppError::InvalidCommand(_) => "invalid_command",
            AppError::Io(_) => "io",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failure to attach a stream to the media element.
///
/// `fatal` mirrors the adaptive player's notion of a fatal error: the stream
/// cannot start at all and the caller should fall back. Non-fatal errors are
/// expected to be recovered by the element itself.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AttachError {
    pub fatal: bool,
    pub message: String,
}

impl AttachError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            message: message.into(),
        }
    }

    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            fatal: false,
            message: message.into(),
        }
    }
}

impl From<AppError> for AttachError {
    fn from(e: AppError) -> Self {
        AttachError::fatal(e.to_string())
    }
}
