use thiserror::Error;

/// User-facing reason strings attached to terminal `Failed` states.
pub mod msg {
    pub const PAYMENT_TIMED_OUT: &str =
        "Payment confirmation timed out. If you already transferred, the subscription will activate once the bank settles - contact support if it does not.";
    pub const CONNECTIVITY_FAILURE: &str =
        "Could not reach the payment service. Check your connection and try again.";
    pub const GENERIC_PAYMENT_FAILURE: &str = "The payment could not be completed.";
    pub const UNKNOWN_PAYMENT_STATUS: &str =
        "The payment service returned an unrecognized status.";
    pub const NOT_AUTHENTICATED: &str = "You are not signed in.";
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Application(String),

    #[error("unknown payment status: {0}")]
    UnknownStatus(String),

    #[error("payment status polling exhausted its attempt budget")]
    Timeout,

    #[error("missing or expired bearer token")]
    Unauthenticated,

    #[error("signaling transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Human-readable reason shown to the user when a payment fails.
    ///
    /// Every polling error collapses into a terminal `Failed` state; the
    /// variants only differ in the reason text surfaced here.
    pub fn failure_reason(&self) -> String {
        match self {
            ClientError::Network(_) => msg::CONNECTIVITY_FAILURE.to_string(),
            ClientError::Application(message) => message.clone(),
            ClientError::UnknownStatus(_) => msg::UNKNOWN_PAYMENT_STATUS.to_string(),
            ClientError::Timeout => msg::PAYMENT_TIMED_OUT.to_string(),
            ClientError::Unauthenticated => msg::NOT_AUTHENTICATED.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
