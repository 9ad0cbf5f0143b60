use std::fmt;

/// Application-level error emitted back to the offending connection as an
/// `error` event. These are caught at the event-handler boundary: they are
/// never broadcast to other subscribers and never terminate the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Caller is not an active participant of the target conversation.
    AccessDenied(String),
    /// Declared sender identity does not match the connection's user.
    Unauthorized(String),
    /// Empty content or malformed payload shape.
    Validation(String),
    /// Referenced message or conversation does not exist.
    NotFound(String),
    /// Collaborator I/O failure.
    Persistence(String),
}

impl EventError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// The human-readable reason carried by the `error` event payload.
    pub fn message(&self) -> &str {
        match self {
            Self::AccessDenied(m)
            | Self::Unauthorized(m)
            | Self::Validation(m)
            | Self::NotFound(m)
            | Self::Persistence(m) => m,
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<diesel::result::Error> for EventError {
    fn from(err: diesel::result::Error) -> Self {
        tracing::error!(?err, "database error");
        Self::persistence("An internal error occurred")
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for EventError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        tracing::error!(?err, "pool error");
        Self::persistence("An internal error occurred")
    }
}
