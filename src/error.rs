use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote sync is not configured")]
    NotConfigured,

    #[error("No edit in progress")]
    NoActiveEdit,
}
