use std::fmt::Display;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Failure taxonomy
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connect failures and timeouts.
    Transport,
    /// Non-2xx status, or a 2xx envelope with `success: false`.
    ProtocolError,
    /// Response body that is not the JSON we expected.
    ParseError,
    /// No usable credential.
    SessionInvalid,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::ProtocolError => "protocol_error",
            FailureKind::ParseError => "parse_error",
            FailureKind::SessionInvalid => "session_invalid",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only error type the gateway hands back. Callers show `message()` to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    status: Option<u16>,
}

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn protocol(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProtocolError,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ParseError, message)
    }

    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::new(FailureKind::SessionInvalid, message)
    }

    pub fn unexpected() -> Self {
        Self::new(FailureKind::Unknown, UNEXPECTED_ERROR_MESSAGE)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

//--------------------------------------------------------------------------------------------------
