use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("No tab with id {tab_id} in spreadsheet {spreadsheet_id}")]
    TabNotFound { spreadsheet_id: String, tab_id: i64 },

    #[error("Spreadsheet rejected the write: {0}")]
    WriteRejected(String),

    #[error("Could not read spreadsheet metadata: {0}")]
    Metadata(String),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payment processor error during {operation}: {message}")]
    Upstream {
        operation: String,
        message: String,
        /// HTTP status returned by the processor, when one was received
        status: Option<u16>,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[cfg(feature = "live")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReportError {
    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::Upstream {
            operation: operation.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn upstream_status(
        operation: impl Into<String>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        ReportError::Upstream {
            operation: operation.into(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// True only when the processor answered that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportError::Upstream { status: Some(404), .. })
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
