use thiserror::Error;

/// Failures raised while opening or reading a capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The camera or file could not be opened. Fatal to a switch attempt.
    #[error("capture source {source_id:?} unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// A single frame could not be read. The acquisition loop retries.
    #[error("transient read failure: {0}")]
    TransientRead(String),

    #[error("failed to release capture handle: {0}")]
    Release(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn unavailable(source_id: impl ToString, reason: impl ToString) -> Self {
        CaptureError::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A single actuator command failed. Recorded, never propagated past the sequence.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid actuator base url {0:?}")]
    BaseUrl(String),
}

/// Operator input that could not be applied as given.
#[derive(Debug, Error, PartialEq)]
pub enum SpecInputError {
    #[error("unknown shape {0:?}")]
    UnknownShape(String),

    #[error("{field} must be a finite number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}
