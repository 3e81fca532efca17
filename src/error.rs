//! Error taxonomy shared by the decoders and their image primitives.
//!
//! Detection misses (wrong blob count, a collapsed envelope, a failed ROI
//! confirmation) are ordinary outcomes handled by the state machines and never
//! show up here.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Empty frame, mismatched frame size, zero filter size or period, or a
    /// decoder parameter outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested decoder variant has no implementation.
    #[error("Unknown decoder type: {0}")]
    UnknownDecoderType(String),

    /// A raw state code that does not name any decoder state.
    #[error("Unknown decoder state: {0}")]
    UnknownState(u8),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DecodeError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::invalid("empty frame");
        assert_eq!(err.to_string(), "Invalid argument: empty frame");

        let err = DecodeError::UnknownDecoderType("rolling_shutter".to_string());
        assert!(err.to_string().contains("rolling_shutter"));

        let err = DecodeError::UnknownState(7);
        assert!(err.to_string().contains('7'));
    }
}
