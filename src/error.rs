//! Error types for the drift compensator

use thiserror::Error;

/// Result type for dedrift operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected pipeline parameters, detected before any samples flow
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The radio (or whatever stands in for it) refused a command
    #[error("tuner error: {0}")]
    Tuner(String),
    /// The running pipeline cannot be resized to a new sample rate
    #[error("sample rate {requested} Hz requested, but the pipeline runs at {configured} Hz")]
    SampleRateMismatch { requested: u32, configured: u32 },
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn tuner<S: Into<String>>(msg: S) -> Self {
        Error::Tuner(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.cu8");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing.cu8"));
    }

    #[test]
    fn test_sample_rate_mismatch_display() {
        let err = Error::SampleRateMismatch {
            requested: 2_400_000,
            configured: 1_800_000,
        };
        assert_eq!(
            err.to_string(),
            "sample rate 2400000 Hz requested, but the pipeline runs at 1800000 Hz"
        );
    }
}
