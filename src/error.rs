//! Error types for the capture endpoint protocol.
//!
//! Every failure the host graph manager can observe maps to exactly one
//! variant here. Soft, non-error outcomes (a benign disconnect no-op, a
//! cursor reporting fewer items than requested) are expressed as plain
//! status enums next to the operations that return them, not as errors.

use crate::object::CapabilityId;
use thiserror::Error;

/// Result type alias using the endpoint's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol status taxonomy consumed by the host graph manager.
///
/// The component never retries on its own; the host drives retries (for
/// example, re-proposing a different format after [`Error::FormatRejected`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A negotiation call arrived while the endpoint was not stopped.
    #[error("endpoint is not stopped")]
    NotStopped,

    /// The connector already holds its single allowed connection.
    #[error("connector is already connected")]
    AlreadyConnected,

    /// The operation requires an established connection.
    #[error("connector is not connected")]
    NotConnected,

    /// A required argument was absent.
    #[error("required argument was not supplied")]
    NullArgument,

    /// A proposed format was rejected during an outbound probe.
    #[error("proposed media format was rejected")]
    FormatRejected,

    /// An inbound connection attempt carried an unacceptable media type.
    #[error("media type not accepted")]
    TypeNotAccepted,

    /// The endpoint does not supply its own sample allocator.
    #[error("endpoint provides no allocator")]
    NoAllocator,

    /// The operation is not supported by this endpoint.
    #[error("operation not supported")]
    NotSupported,

    /// The object does not expose the requested capability.
    #[error("capability not found: {0:?}")]
    CapabilityNotFound(CapabilityId),

    /// Allocation failed while creating a protocol object.
    #[error("out of memory")]
    OutOfMemory,
}
