use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame carried no data")]
    Empty,
    #[error("frame is not a valid stream event: {0}")]
    Json(#[from] serde_json::Error),
}
