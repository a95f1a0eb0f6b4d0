use std::fmt;

/// Boundary error taxonomy for everything the backend can do to us.
/// None of these are fatal; each maps to an inline or global notice in
/// the UI and leaves the graph untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected locally before any request went out (empty scenario text,
    /// missing session id).
    Validation(String),
    /// The backend answered with a non-success status.
    Remote { status: u16, message: String },
    /// The request never produced an answer (connection refused, timeout).
    Transport(String),
    /// The push channel failed to open or dropped. `unreachable`
    /// distinguishes "no server there" from an ordinary disconnect.
    Channel { unreachable: bool, message: String },
    /// A push frame arrived but could not be decoded; the frame is
    /// discarded and the channel stays open.
    Decode(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Validation(message) => write!(f, "{message}"),
            ClientError::Remote { status, message } => {
                write!(f, "server error {status}: {message}")
            }
            ClientError::Transport(message) => write!(
                f,
                "network error: could not reach the backend server ({message})"
            ),
            ClientError::Channel {
                unreachable: true, ..
            } => write!(
                f,
                "could not connect to the backend push channel; \
                 please ensure the server is running"
            ),
            ClientError::Channel { message, .. } => {
                write!(f, "push channel disconnected: {message}")
            }
            ClientError::Decode(message) => {
                write!(f, "failed to decode push message: {message}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ClientError::Remote {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_channel_message_names_the_server() {
        let err = ClientError::Channel {
            unreachable: true,
            message: "tcp refused".into(),
        };
        assert!(err.to_string().contains("ensure the server is running"));
    }

    #[test]
    fn remote_errors_carry_status_and_detail() {
        let err = ClientError::Remote {
            status: 500,
            message: "planner overloaded".into(),
        };
        assert_eq!(err.to_string(), "server error 500: planner overloaded");
    }
}
