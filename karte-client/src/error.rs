use karte_core::KarteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Non-success HTTP status or an empty response body.
    #[error("Transport failure: status code {status}")]
    TransportFailure { status: u16 },

    /// The server answered with a well-formed OperationOutcome error payload.
    #[error("Remote operation error: {0}")]
    RemoteOperation(String),

    /// The request never produced a response (connect, timeout, ...).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Parse(#[from] KarteError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
