use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatusError { status: u16, url: String },

    #[error("XML parse error: {message}")]
    ParseError { message: String },

    #[error("XML serialization error: {message}")]
    SerializeError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// Which stage of the service an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Process refuses to start.
    Startup,
    /// Upstream feed could not be retrieved.
    Fetch,
    /// Fetched body is not well-formed XML.
    Parse,
    /// Output document could not be rendered.
    Serialize,
}

impl FeedError {
    pub fn parse(message: impl Into<String>) -> Self {
        FeedError::ParseError {
            message: message.into(),
        }
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        FeedError::SerializeError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FeedError::FetchError(_) | FeedError::UpstreamStatusError { .. } => {
                ErrorCategory::Fetch
            }
            FeedError::ParseError { .. } => ErrorCategory::Parse,
            FeedError::SerializeError { .. } => ErrorCategory::Serialize,
            FeedError::ConfigError { .. }
            | FeedError::MissingConfigError { .. }
            | FeedError::InvalidConfigValueError { .. } => ErrorCategory::Startup,
        }
    }

    /// Body text returned to HTTP clients.
    pub fn user_friendly_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Fetch => "Error fetching feed",
            ErrorCategory::Parse => "Error parsing feed XML",
            ErrorCategory::Serialize => "Error generating XML",
            ErrorCategory::Startup => "Invalid service configuration",
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FeedError::FetchError(_) => {
                "Check that FEED_URL is reachable from this host".to_string()
            }
            FeedError::UpstreamStatusError { status, .. } => {
                format!("The upstream feed answered {}; check FEED_URL", status)
            }
            FeedError::ParseError { .. } => {
                "Check that FEED_URL serves an RSS document and that FEED_ENCODING matches it"
                    .to_string()
            }
            FeedError::SerializeError { .. } => {
                "Retry the request; report the feed if the problem persists".to_string()
            }
            FeedError::ConfigError { .. } => "Review the service configuration".to_string(),
            FeedError::MissingConfigError { field } => {
                format!("Set {} in the environment or on the command line", field)
            }
            FeedError::InvalidConfigValueError { field, .. } => {
                format!("Provide a valid value for {}", field)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let message = self.user_friendly_message();
        tracing::error!("{}: {}", message, self);
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}
