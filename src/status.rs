//! Span status resolution for transport-level status codes.

use opentelemetry::trace::Status;

/// The canonical gRPC status codes, plus a catch-all for values outside
/// the canonical set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrpcStatusCode {
    /// The operation completed successfully.
    Ok,
    /// The operation was cancelled.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// The client specified an invalid argument.
    InvalidArgument,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded,
    /// A requested entity was not found.
    NotFound,
    /// The entity that a client attempted to create already exists.
    AlreadyExists,
    /// The caller does not have permission to execute the operation.
    PermissionDenied,
    /// A resource has been exhausted.
    ResourceExhausted,
    /// The system is not in a state required for the operation.
    FailedPrecondition,
    /// The operation was aborted.
    Aborted,
    /// The operation was attempted past the valid range.
    OutOfRange,
    /// The operation is not implemented or supported.
    Unimplemented,
    /// An internal error.
    Internal,
    /// The service is currently unavailable.
    Unavailable,
    /// Unrecoverable data loss or corruption.
    DataLoss,
    /// The request lacks valid authentication credentials.
    Unauthenticated,
    /// Any value that is not a member of the canonical code set.
    Unrecognized,
}

impl GrpcStatusCode {
    /// Classifies a wire-level status code. Total over all integers;
    /// anything outside the canonical range maps to [`Self::Unrecognized`].
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => GrpcStatusCode::Ok,
            1 => GrpcStatusCode::Cancelled,
            2 => GrpcStatusCode::Unknown,
            3 => GrpcStatusCode::InvalidArgument,
            4 => GrpcStatusCode::DeadlineExceeded,
            5 => GrpcStatusCode::NotFound,
            6 => GrpcStatusCode::AlreadyExists,
            7 => GrpcStatusCode::PermissionDenied,
            8 => GrpcStatusCode::ResourceExhausted,
            9 => GrpcStatusCode::FailedPrecondition,
            10 => GrpcStatusCode::Aborted,
            11 => GrpcStatusCode::OutOfRange,
            12 => GrpcStatusCode::Unimplemented,
            13 => GrpcStatusCode::Internal,
            14 => GrpcStatusCode::Unavailable,
            15 => GrpcStatusCode::DataLoss,
            16 => GrpcStatusCode::Unauthenticated,
            _ => GrpcStatusCode::Unrecognized,
        }
    }
}

/// Resolves the span status for an HTTP response status code.
///
/// Informational, success and redirect codes (`100..=399`) leave the
/// status unset; every other integer, including out-of-range and negative
/// values, resolves to an error.
pub fn span_status_for_http_status(code: i32) -> Status {
    if (100..=399).contains(&code) {
        Status::Unset
    } else {
        Status::error("")
    }
}

/// Resolves the span status for a gRPC status code.
///
/// Only the canonical `Ok` value leaves the status unset; every other
/// recognized code, and any unrecognized value, resolves to an error.
pub fn span_status_for_grpc_status(code: i32) -> Status {
    match GrpcStatusCode::from_i32(code) {
        GrpcStatusCode::Ok => Status::Unset,
        _ => Status::error(""),
    }
}
