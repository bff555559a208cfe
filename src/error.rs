//! Blob upload error types.

use thiserror::Error;

/// Error codes raised by the upload streams or returned by the blob service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Argument errors
    InvalidInput,
    OutOfRangeInput,
    InvalidBlockId,
    InvalidPageRange,
    InvalidBlobType,
    RequestBodyTooLarge,

    // Service errors
    BlobNotFound,
    InvalidBlockList,
    InvalidOperation,
    Md5Mismatch,
    OperationTimedOut,
    ServerBusy,
    InternalError,

    // Client-side stream errors
    StreamClosed,
    TransportFailure,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::OutOfRangeInput => "OutOfRangeInput",
            ErrorCode::InvalidBlockId => "InvalidBlockId",
            ErrorCode::InvalidPageRange => "InvalidPageRange",
            ErrorCode::InvalidBlobType => "InvalidBlobType",
            ErrorCode::RequestBodyTooLarge => "RequestBodyTooLarge",
            ErrorCode::BlobNotFound => "BlobNotFound",
            ErrorCode::InvalidBlockList => "InvalidBlockList",
            ErrorCode::InvalidOperation => "InvalidOperation",
            ErrorCode::Md5Mismatch => "Md5Mismatch",
            ErrorCode::OperationTimedOut => "OperationTimedOut",
            ErrorCode::ServerBusy => "ServerBusy",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::StreamClosed => "StreamClosed",
            ErrorCode::TransportFailure => "TransportFailure",
        }
    }

    /// Returns true for errors caused by caller arguments. These are raised
    /// synchronously, before any transport call is made.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidInput
                | ErrorCode::OutOfRangeInput
                | ErrorCode::InvalidBlockId
                | ErrorCode::InvalidPageRange
                | ErrorCode::InvalidBlobType
                | ErrorCode::RequestBodyTooLarge
        )
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BlobNotFound => "The specified blob does not exist.",
            ErrorCode::InvalidBlockId => "The specified block ID is invalid.",
            ErrorCode::InvalidBlockList => "The specified block list is invalid.",
            ErrorCode::InvalidPageRange => "The page range specified is invalid.",
            ErrorCode::InvalidBlobType => {
                "The blob type is invalid for this operation."
            }
            ErrorCode::OutOfRangeInput => "One of the request inputs is out of range.",
            ErrorCode::RequestBodyTooLarge => "The request body is too large.",
            ErrorCode::Md5Mismatch => {
                "The MD5 value specified in the request did not match the MD5 value calculated by the server."
            }
            ErrorCode::StreamClosed => "The stream is already closed.",
            ErrorCode::TransportFailure => "The transport failed to deliver the request.",
            ErrorCode::InternalError => "The server encountered an internal error. Please retry the request.",
            _ => "An error occurred while processing the request.",
        }
    }
}

/// Storage error with code and message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", code.as_str())]
pub struct StorageError {
    pub code: ErrorCode,
    pub message: String,
}

impl StorageError {
    /// Creates a new storage error with the given code and default message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.default_message().to_string(),
            code,
        }
    }

    /// Creates a new storage error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::with_message(ErrorCode::TransportFailure, err.to_string())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
