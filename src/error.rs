use crate::comms::ToOverlordMessage;
use std::panic::Location;

/// Error kinds that can occur in murmur
#[derive(Debug)]
pub enum ErrorKind {
    ActionPending(String),
    EmptyPost,
    General(String),
    Image(image::error::ImageError),
    InvalidOrigin(String),
    InvalidPublicKey(String),
    Io(std::io::Error),
    JoinError(tokio::task::JoinError),
    MalformedResponse(&'static str, serde_json::Error),
    MpscSend(tokio::sync::mpsc::error::SendError<ToOverlordMessage>),
    Network(reqwest::Error),
    Qr(qrcode::types::QrError),
    SerdeJson(serde_json::Error),
    Service { status: u16, detail: String },
    ShuttingDown,
    Timeout(tokio::time::error::Elapsed),
    UnknownCommand(String),
    UrlParse(url::ParseError),
    Usage(String, String), // error, usage line
}

/// Errors that can occur in murmur, including the file and line number
/// where they were generated
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    location: &'static Location<'static>,
}

impl Error {
    /// The message a user should see for this error. Service errors are
    /// shown verbatim, without the source location.
    pub fn user_message(&self) -> String {
        match &self.kind {
            ErrorKind::Service { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the request never produced a usable response from the service
    pub fn is_network_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::Network(_) | ErrorKind::Timeout(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.kind, self.location)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            ActionPending(k) => write!(f, "An action is already pending for {k}"),
            EmptyPost => write!(f, "Cannot post empty text"),
            General(s) => write!(f, "{s}"),
            Image(e) => write!(f, "Image: {e}"),
            InvalidOrigin(s) => write!(f, "Invalid service origin: {s}"),
            InvalidPublicKey(s) => write!(f, "Invalid public key: {s}"),
            Io(e) => write!(f, "I/O Error: {e}"),
            JoinError(e) => write!(f, "Task join error: {e}"),
            MalformedResponse(endpoint, e) => {
                write!(f, "Malformed response from {endpoint}: {e}")
            }
            MpscSend(e) => write!(f, "Error sending mpsc: {e}"),
            Network(e) => write!(f, "HTTP (reqwest) error: {e}"),
            Qr(e) => write!(f, "QR: {e}"),
            SerdeJson(e) => write!(f, "SerdeJson Error: {e}"),
            Service { status, detail } => write!(f, "Service error ({status}): {detail}"),
            ShuttingDown => write!(f, "Shutting down"),
            Timeout(e) => write!(f, "Timeout: {e}"),
            UnknownCommand(s) => write!(f, "Unknown command: {s}"),
            UrlParse(e) => write!(f, "URL parse: {e}"),
            Usage(e, u) => write!(f, "{}\n\nUsage: {}", e, u),
        }
    }
}

// Note: we impl Into because our typical pattern is InnerError::Variant.into()
//       when we tried implementing From, the location was deep in rust code's
//       blanket into implementation, which wasn't the line number we wanted.
#[allow(clippy::from_over_into)]
impl Into<Error> for ErrorKind {
    #[track_caller]
    fn into(self) -> Error {
        Error {
            kind: self,
            location: Location::caller(),
        }
    }
}

impl From<String> for Error {
    #[track_caller]
    fn from(s: String) -> Error {
        Error {
            kind: ErrorKind::General(s),
            location: Location::caller(),
        }
    }
}

impl From<&str> for Error {
    #[track_caller]
    fn from(s: &str) -> Error {
        Error {
            kind: ErrorKind::General(s.to_string()),
            location: Location::caller(),
        }
    }
}

impl From<image::error::ImageError> for Error {
    #[track_caller]
    fn from(e: image::error::ImageError) -> Error {
        Error {
            kind: ErrorKind::Image(e),
            location: Location::caller(),
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Error {
        Error {
            kind: ErrorKind::Io(e),
            location: Location::caller(),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    #[track_caller]
    fn from(e: tokio::task::JoinError) -> Error {
        Error {
            kind: ErrorKind::JoinError(e),
            location: Location::caller(),
        }
    }
}

impl From<tokio::sync::mpsc::error::SendError<ToOverlordMessage>> for Error {
    #[track_caller]
    fn from(e: tokio::sync::mpsc::error::SendError<ToOverlordMessage>) -> Error {
        Error {
            kind: ErrorKind::MpscSend(e),
            location: Location::caller(),
        }
    }
}

impl From<reqwest::Error> for Error {
    #[track_caller]
    fn from(e: reqwest::Error) -> Error {
        Error {
            kind: ErrorKind::Network(e),
            location: Location::caller(),
        }
    }
}

impl From<qrcode::types::QrError> for Error {
    #[track_caller]
    fn from(e: qrcode::types::QrError) -> Error {
        Error {
            kind: ErrorKind::Qr(e),
            location: Location::caller(),
        }
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(e: serde_json::Error) -> Error {
        Error {
            kind: ErrorKind::SerdeJson(e),
            location: Location::caller(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    #[track_caller]
    fn from(e: tokio::time::error::Elapsed) -> Error {
        Error {
            kind: ErrorKind::Timeout(e),
            location: Location::caller(),
        }
    }
}

impl From<url::ParseError> for Error {
    #[track_caller]
    fn from(e: url::ParseError) -> Error {
        Error {
            kind: ErrorKind::UrlParse(e),
            location: Location::caller(),
        }
    }
}
