use std::fmt;

/// Failures of a single transport session. All of them are transient from
/// the gateway's point of view.
#[derive(Debug)]
pub enum TransportError {
    Connect(String),
    Send(String),
    Receive(String),
    Closed,
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "connect failed: {e}"),
            TransportError::Send(e) => write!(f, "send failed: {e}"),
            TransportError::Receive(e) => write!(f, "receive failed: {e}"),
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::Decode(e) => write!(f, "undecodable message: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Why a gateway connection was abandoned. Every variant routes into the
/// reconnect path.
#[derive(Debug)]
pub enum GatewayError {
    Transport(TransportError),
    Protocol(String),
    InvalidSession,
    HeartbeatFailed,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(e) => write!(f, "{e}"),
            GatewayError::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            GatewayError::InvalidSession => write!(f, "session invalidated by server"),
            GatewayError::HeartbeatFailed => write!(f, "heartbeat could not be sent"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        GatewayError::Transport(e)
    }
}

/// Failures talking to the REST API.
#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    Unauthorized { status: u16 },
    Server { status: u16, body: String },
    Decode(String),
}

impl ApiError {
    /// Transport errors, rate limiting and 5xx responses are worth another
    /// attempt. Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => !e.is_decode() && !e.is_builder(),
            ApiError::Server { status, .. } => *status == 429 || *status >= 500,
            ApiError::Unauthorized { .. } | ApiError::Decode(_) => false,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "HTTP error: {e}"),
            ApiError::Unauthorized { status } => {
                write!(f, "token rejected by server ({status})")
            }
            ApiError::Server { status, body } => write!(f, "server returned {status}: {body}"),
            ApiError::Decode(e) => write!(f, "unexpected response body: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Http(e)
    }
}
