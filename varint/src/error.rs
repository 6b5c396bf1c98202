//! Error types for varint operations.

use std::fmt;

/// Result type for varint operations.
pub type VarintResult<T> = Result<T, VarintError>;

/// Errors that can occur while packing or unpacking variable-length integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// The output buffer cannot hold the encoded value.
    OutputTooSmall {
        /// Number of units required.
        needed: usize,
        /// Number of units available.
        available: usize,
    },

    /// The input ended inside an encoded value.
    UnexpectedEof {
        /// Number of bytes that were available.
        available: usize,
    },
}

impl fmt::Display for VarintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputTooSmall { needed, available } => {
                write!(f, "output too small: need {needed}, have {available}")
            }
            Self::UnexpectedEof { available } => {
                write!(f, "unexpected EOF inside varint: {available} bytes available")
            }
        }
    }
}

impl std::error::Error for VarintError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_output_too_small() {
        let err = VarintError::OutputTooSmall {
            needed: 5,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('5'), "should mention needed units");
        assert!(msg.contains('2'), "should mention available units");
    }

    #[test]
    fn error_display_unexpected_eof() {
        let err = VarintError::UnexpectedEof { available: 3 };
        let msg = err.to_string();
        assert!(msg.contains('3'), "should mention available bytes");
        assert!(msg.contains("EOF"), "should mention EOF");
    }

    #[test]
    fn error_equality() {
        let err1 = VarintError::UnexpectedEof { available: 1 };
        let err2 = VarintError::UnexpectedEof { available: 1 };
        let err3 = VarintError::UnexpectedEof { available: 2 };
        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<VarintError>();
    }
}
