use crate::model::ResourceKind;

/// Shared error type used across all widget chat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or missing request input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No principal could be established for the caller.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The resource exists but belongs to someone else.
    #[error("access denied to {kind} {id}")]
    AccessDenied { kind: ResourceKind, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// Relational store or blob storage failure.
    #[error("storage: {0}")]
    Storage(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The run never reached a terminal status within the poll budget.
    #[error("provider run did not finish after {polls} polls")]
    ProviderTimeout { polls: u32 },

    /// The run reached a terminal status other than `completed`.
    #[error("provider run {status}: {message}")]
    RunFailed { status: String, message: String },

    /// The run completed but produced no assistant text.
    #[error("no assistant output: {0}")]
    NoAssistantOutput(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn access_denied(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::AccessDenied {
            kind,
            id: id.into(),
        }
    }

    /// True for errors caused by the caller's input or identity rather
    /// than by a backend failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::Unauthorized(_)
                | Self::AccessDenied { .. }
                | Self::NotFound { .. }
        )
    }
}

impl Error {
    /// Text safe to show an untrusted client. Backend failures collapse to
    /// a fixed message; the full error belongs in the logs.
    pub fn public_message(&self) -> String {
        match self {
            e if e.is_client_error() => e.to_string(),
            Self::ProviderTimeout { .. } => "the assistant took too long to respond".into(),
            Self::RunFailed { status, .. } => format!("assistant run {status}"),
            Self::NoAssistantOutput(_) => "the assistant returned no answer".into(),
            Self::Cancelled => "cancelled".into(),
            _ => "internal server error".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::InvalidArgument("x".into()).is_client_error());
        assert!(Error::Unauthorized("x".into()).is_client_error());
        assert!(Error::access_denied(ResourceKind::Thread, "t1").is_client_error());
        assert!(Error::not_found(ResourceKind::Attachment, "f1").is_client_error());
        assert!(!Error::Storage("disk".into()).is_client_error());
        assert!(!Error::ProviderTimeout { polls: 30 }.is_client_error());
        assert!(!Error::NoAssistantOutput("empty".into()).is_client_error());
    }

    #[test]
    fn backend_detail_is_not_public() {
        let storage = Error::Storage("failed to read blob 'alice/secret/x.csv': os error 2".into());
        assert_eq!(storage.public_message(), "internal server error");
        let provider = Error::Provider {
            provider: "openai".into(),
            message: "HTTP 500 - {\"error\": \"upstream detail\"}".into(),
        };
        assert_eq!(provider.public_message(), "internal server error");
        let failed = Error::RunFailed {
            status: "expired".into(),
            message: "server_error: quota detail".into(),
        };
        assert_eq!(failed.public_message(), "assistant run expired");
        assert_eq!(
            Error::not_found(ResourceKind::Thread, "abc").public_message(),
            "thread not found: abc"
        );
    }

    #[test]
    fn not_found_message_names_the_kind() {
        let err = Error::not_found(ResourceKind::Thread, "abc");
        assert_eq!(err.to_string(), "thread not found: abc");
    }
}
