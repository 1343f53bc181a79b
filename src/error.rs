use std::time::Duration;

use thiserror::Error;

/// Failure surfaced by the reconciliation engine and its controller.
///
/// The variants map onto how a failure is treated: transient I/O is retried
/// or skipped per tile, a timeout counts as a failed cycle, malformed input
/// is fatal to the operation that hit it, and cancellation is a silent exit.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    TransientIo(String),

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Cancellation is a user-initiated stop, never a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    /// Whether running the same operation again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::TransientIo(_) | EngineError::Timeout { .. } | EngineError::Io(_)
        )
    }
}

impl From<TemplateError> for EngineError {
    fn from(e: TemplateError) -> Self {
        EngineError::MalformedInput(e.to_string())
    }
}

impl From<RasterError> for EngineError {
    fn from(e: RasterError) -> Self {
        EngineError::MalformedInput(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::TransientIo(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("PNG decode error: {0}")]
    Decode(String),

    #[error("PNG encode error: {0}")]
    Encode(String),

    #[error("Unsupported PNG layout: {0}")]
    Unsupported(String),

    #[error("Pixel buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template image is empty: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("Draw multiplier must be odd and positive, got {0}")]
    InvalidMultiplier(u32),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("Invalid chunk key: {0}")]
    InvalidChunkKey(String),

    #[error("Unsupported schema version {found} (expected {expected}.x)")]
    SchemaVersion { found: String, expected: u32 },

    #[error("Image error: {0}")]
    Raster(#[from] RasterError),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_timeout() {
        let error = EngineError::Timeout {
            what: "paint opportunity",
            waited: Duration::from_secs(60),
        };
        assert_eq!(
            error.to_string(),
            "Timed out after 60s waiting for paint opportunity"
        );
    }

    #[test]
    fn test_engine_error_cancelled() {
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::TransientIo("reset".into()).is_cancelled());
    }

    #[test]
    fn test_engine_error_retryable() {
        assert!(EngineError::TransientIo("reset".into()).is_retryable());
        assert!(EngineError::Timeout {
            what: "paint session",
            waited: Duration::from_secs(15),
        }
        .is_retryable());
        assert!(!EngineError::MalformedInput("bad chunk".into()).is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
    }

    #[test]
    fn test_template_error_empty_image() {
        let error = TemplateError::EmptyImage {
            width: 0,
            height: 12,
        };
        assert_eq!(error.to_string(), "Template image is empty: 0x12");
    }

    #[test]
    fn test_template_error_into_malformed_input() {
        let error: EngineError = TemplateError::InvalidMultiplier(2).into();
        match error {
            EngineError::MalformedInput(msg) => {
                assert_eq!(msg, "Draw multiplier must be odd and positive, got 2")
            }
            _ => panic!("Expected MalformedInput variant"),
        }
    }

    #[test]
    fn test_raster_error_into_malformed_input() {
        let error: EngineError = RasterError::Decode("bad crc".into()).into();
        assert!(matches!(error, EngineError::MalformedInput(_)));
        assert_eq!(error.to_string(), "Malformed input: PNG decode error: bad crc");
    }

    #[test]
    fn test_raster_error_buffer_size() {
        let error = RasterError::BufferSize {
            width: 2,
            height: 2,
            expected: 16,
            actual: 3,
        };
        assert_eq!(
            error.to_string(),
            "Pixel buffer is 3 bytes, expected 16 for 2x2"
        );
    }
}
