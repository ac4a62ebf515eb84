use thiserror::Error;

/// Why a connection attempt was turned away at the handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingToken,

    #[error("invalid credential: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Failures reported back to the sender as a `message-error` event.
///
/// The `Display` text is what the client sees, so storage details stay in
/// the source chain and only reach the logs.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidMessage(String),

    #[error("Failed to send message")]
    Persistence(#[from] anyhow::Error),

    #[error("Failed to mark message as read")]
    ReadReceipt(#[source] anyhow::Error),
}
