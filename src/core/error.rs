//! Error types for the IAX2 core.
//!
//! None of these cross the public decode boundary as a panic: the frame
//! decoder logs them and reports an empty result, and the transaction layer
//! turns protocol problems into events.

use thiserror::Error;

use crate::ie::IeType;

/// Errors raised while decoding a datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than the header it claims to carry.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Required length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Meta frame with an unknown meta command.
    #[error("unknown meta command {0:#04x}")]
    InvalidMetaCommand(u8),

    /// Trunk record whose declared length runs past the datagram.
    #[error("trunk record at offset {offset} declares {declared} bytes, {available} available")]
    TrunkRecordOverrun {
        /// Record offset in the datagram.
        offset: usize,
        /// Declared payload length.
        declared: usize,
        /// Bytes left in the datagram.
        available: usize,
    },
}

impl FrameError {
    /// Malformed datagrams are dropped; nothing is reported to the peer.
    pub fn is_silent_drop(&self) -> bool {
        true
    }
}

/// Errors raised by the information-element codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IeError {
    /// Declared length does not match the type's length class.
    #[error("{ie} expects {expected} value bytes, got {actual}")]
    LengthMismatch {
        /// Element type.
        ie: IeType,
        /// Required length.
        expected: usize,
        /// Declared length.
        actual: usize,
    },

    /// List ends in the middle of an element.
    #[error("element list truncated at offset {offset}")]
    Truncated {
        /// Offset of the broken element.
        offset: usize,
    },

    /// Value does not fit the one-byte length field.
    #[error("{ie} value of {len} bytes exceeds 255")]
    ValueTooLong {
        /// Element type.
        ie: IeType,
        /// Value length.
        len: usize,
    },
}

/// Errors raised when constructing a transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Opening frame is not one of the supported exchange kinds.
    #[error("unsupported exchange kind (subclass {0:#x})")]
    UnsupportedKind(u32),

    /// Opening frame is not an IAX control frame.
    #[error("opening frame is not an IAX control frame")]
    NotIaxFrame,
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Information-element error.
    #[error("information element error: {0}")]
    Ie(#[from] IeError),

    /// Transaction construction error.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameError::TooShort {
            expected: 12,
            actual: 5,
        };
        assert_eq!(
            err.to_string(),
            "frame too short: expected at least 12 bytes, got 5"
        );
        assert!(err.is_silent_drop());

        let err = IeError::LengthMismatch {
            ie: IeType::Version,
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "VERSION expects 2 value bytes, got 3");
    }

    #[test]
    fn test_error_from() {
        let err: Error = TransactionError::UnsupportedKind(0x22).into();
        assert!(matches!(err, Error::Transaction(_)));
        assert_eq!(
            err.to_string(),
            "transaction error: unsupported exchange kind (subclass 0x22)"
        );
    }
}
