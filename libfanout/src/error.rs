//! Error types for Fanout

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FanoutError>;

#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Platform account not found: {0}")]
    AccountNotFound(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("A publish run is already in progress for post {0}")]
    RunInProgress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FanoutError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FanoutError::InvalidInput(_)
            | FanoutError::PostNotFound(_)
            | FanoutError::AccountNotFound(_)
            | FanoutError::UnsupportedPlatform(_) => 3,
            FanoutError::Platform(PlatformError::Authentication(_)) => 2,
            FanoutError::Platform(_) => 1,
            FanoutError::Config(_) => 1,
            FanoutError::Database(_) => 1,
            FanoutError::RunInProgress(_) => 1,
        }
    }

    /// Whether the caller should re-run the whole operation later.
    ///
    /// Store failures leave durable state behind in-memory state, and a
    /// concurrent run will have finished by the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FanoutError::Database(_) | FanoutError::RunInProgress(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("No row in {table} with id {id}")]
    MissingRow { table: &'static str, id: String },
}

/// Failures reported by a platform adapter.
///
/// Adapters never surface these as `Err` from `publish`; the Display text
/// becomes the `reason` of a `PublishOutcome::Failure`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Identity lookup failed: {0}")]
    Lookup(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
