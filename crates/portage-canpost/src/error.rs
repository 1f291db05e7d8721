//! Typed carrier errors.
//!
//! A `<messages>` envelope is a semantic rejection no matter which HTTP
//! status carried it; transport and decode failures are kept distinct so
//! callers can map them to their own error taxonomy.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrierError {
    /// Canada Post rejected the request with a message envelope.
    #[error("canada post error code={code}: {description}")]
    Api {
        status: u16,
        code: String,
        description: String,
    },
    /// Non-success HTTP status without a parseable message envelope.
    #[error("canada post api error {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never completed (connect, TLS, timeout, ...).
    #[error("canada post request failed: {0}")]
    Transport(String),
    /// The response body did not match the expected shape.
    #[error("unexpected canada post response payload: {0}")]
    Decode(String),
}

impl CarrierError {
    pub fn refund_not_found() -> Self {
        CarrierError::Api {
            status: 404,
            code: "404".to_string(),
            description: "invalid shipment id or refund link".to_string(),
        }
    }
}

impl From<reqwest::Error> for CarrierError {
    fn from(err: reqwest::Error) -> Self {
        CarrierError::Transport(err.to_string())
    }
}
