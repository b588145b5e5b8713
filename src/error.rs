// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the sign recognition library.

use std::fmt;

/// Result type alias for sign recognition operations.
pub type Result<T> = std::result::Result<T, SignError>;

/// Main error type for the sign recognition library.
#[derive(Debug)]
pub enum SignError {
    /// Weights checkpoint could not be read or does not match the network.
    ModelLoadError(String),
    /// Error during the forward pass.
    InferenceError(String),
    /// Gesture boundaries could not be established (empty or crossing interval).
    SegmentationError(String),
    /// Every pooled x (or y) coordinate is identical, so min-max scaling is undefined.
    DegenerateClipError(String),
    /// A frame failed validation at the capture/JSON boundary.
    InvalidFrame(String),
    /// The video source could not deliver a frame.
    CaptureError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Malformed keypoint payload or label file.
    ParseError(String),
    /// IO error (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::SegmentationError(msg) => write!(f, "Segmentation error: {msg}"),
            Self::DegenerateClipError(msg) => write!(f, "Degenerate clip: {msg}"),
            Self::InvalidFrame(msg) => write!(f, "Invalid frame: {msg}"),
            Self::CaptureError(msg) => write!(f, "Capture error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for SignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SignError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SignError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<candle_core::Error> for SignError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SignError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::InferenceError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SignError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = SignError::DegenerateClipError("flat x".to_string());
        assert_eq!(err.to_string(), "Degenerate clip: flat x");

        let err = SignError::SegmentationError("empty".to_string());
        assert_eq!(err.to_string(), "Segmentation error: empty");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = SignError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(SignError::CaptureError("x".into()).source().is_none());
    }

    #[test]
    fn test_tensor_error_maps_to_inference_error() {
        let err: SignError = candle_core::Error::Msg("bad shape".to_string()).into();
        assert!(matches!(err, SignError::InferenceError(ref msg) if msg.contains("bad shape")));
    }

    #[test]
    fn test_json_error_maps_to_parse_error() {
        let err: SignError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, SignError::ParseError(_)));
    }
}
