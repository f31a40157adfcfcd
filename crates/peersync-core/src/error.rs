//! # PeerSync Error Handling
//!
//! Error types for peer-op lowering and batch submission.
//!
//! Error handling in PeerSync follows these principles:
//! - Every failure aborts the current call; nothing is retried internally
//! - Errors carry enough context to name the offending input
//! - Bookkeeping defects are distinguished from caller mistakes
//! - Errors are `no_std` compatible
//!
//! | Kind | Cause | Fatal |
//! |------|-------|-------|
//! | InvalidArgument | malformed input, illegal capability mix | only for inline-bound violations |
//! | CapacityExceeded | planner under-sized a buffer | yes |
//! | LookupFailure | handle not registered | no |
//! | SubmissionFailure | stream rejected the batch | no |

use core::fmt;

use crate::types::{DevAddr, RangeHandle};

// =============================================================================
// RESULT TYPE
// =============================================================================

/// PeerSync Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// PeerSync unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Caller input or capability combination cannot be lowered
    InvalidArgument(ArgError),
    /// A write would run past the planned buffer capacity
    CapacityExceeded {
        /// Capacity the buffer was planned with
        capacity: usize,
    },
    /// Handle does not name a registered range
    LookupFailure(RangeHandle),
    /// The execution stream rejected the batch
    SubmissionFailed(NativeError),
}

impl Error {
    /// Coarse classification of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::LookupFailure(_) => ErrorKind::LookupFailure,
            Self::SubmissionFailed(_) => ErrorKind::SubmissionFailure,
        }
    }

    /// Check if the error reports a broken contract rather than bad input
    ///
    /// Fatal errors must not be retried: the same inputs fail again.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::InvalidArgument(ArgError::InlinePayloadTooLarge { .. })
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            Self::CapacityExceeded { capacity } => {
                write!(f, "op buffer capacity {} exceeded", capacity)
            }
            Self::LookupFailure(handle) => write!(f, "no range registered for handle {}", handle),
            Self::SubmissionFailed(e) => write!(f, "batch submission failed: {}", e),
        }
    }
}

impl From<ArgError> for Error {
    fn from(e: ArgError) -> Self {
        Error::InvalidArgument(e)
    }
}

impl From<NativeError> for Error {
    fn from(e: NativeError) -> Self {
        Error::SubmissionFailed(e)
    }
}

// =============================================================================
// ERROR KIND
// =============================================================================

/// Four-way classification of PeerSync errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input
    InvalidArgument,
    /// Internal bookkeeping defect
    CapacityExceeded,
    /// Unknown range handle
    LookupFailure,
    /// Stream-level failure
    SubmissionFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// SUB-ERROR TYPES
// =============================================================================

/// Reasons an argument was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgError {
    /// Write fence not issued by the adapter
    ForeignFenceOrigin,
    /// Fence memory domain is neither peer nor system memory
    UnknownFenceDomain,
    /// Wait condition code not recognized
    UnknownWaitCondition(u32),
    /// NOR wait requested on a device without NOR support
    NorWaitUnsupported,
    /// Null target address
    NullAddress,
    /// Target address not dword aligned
    MisalignedAddress(DevAddr),
    /// Inline copy with no payload
    EmptyInlinePayload,
    /// Inline copy payload larger than the hardware bound
    InlinePayloadTooLarge {
        /// Requested payload length
        len: usize,
    },
    /// Simulated wide write requested without memory barriers
    SimulatedWideWriteWithoutBarrier,
    /// Native wide writes are never available
    NativeWideWriteUnsupported,
    /// Copy block requested but inline copy is disabled
    InlineCopyUnavailable,
    /// Barrier or flush requested but memory barriers are disabled
    MemoryBarrierUnavailable,
    /// Fence folding found no preceding inline copy to patch
    NoInlineCopyToPatch,
    /// Buffer saw a failed translation and cannot be submitted
    IncompleteBatch,
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignFenceOrigin => write!(f, "write fence not originating from the adapter"),
            Self::UnknownFenceDomain => write!(f, "unsupported fence memory domain"),
            Self::UnknownWaitCondition(c) => write!(f, "unknown wait condition {:#x}", c),
            Self::NorWaitUnsupported => write!(f, "device does not support NOR waits"),
            Self::NullAddress => write!(f, "null target address"),
            Self::MisalignedAddress(a) => write!(f, "address {} is not dword aligned", a),
            Self::EmptyInlinePayload => write!(f, "empty inline copy payload"),
            Self::InlinePayloadTooLarge { len } => {
                write!(f, "inline copy of {} bytes exceeds the hardware bound", len)
            }
            Self::SimulatedWideWriteWithoutBarrier => {
                write!(f, "invalid feature combination, simulated write64 needs memory barrier")
            }
            Self::NativeWideWriteUnsupported => write!(f, "native write64 is not supported"),
            Self::InlineCopyUnavailable => write!(f, "inline copy is not supported"),
            Self::MemoryBarrierUnavailable => write!(f, "memory barrier is not supported"),
            Self::NoInlineCopyToPatch => write!(f, "fence has no preceding inline copy to patch"),
            Self::IncompleteBatch => write!(f, "batch was left incomplete by a failed translation"),
        }
    }
}

/// Error code returned by the execution stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeError(pub i32);

impl NativeError {
    /// Raw stream error code
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream error {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::from(ArgError::UnknownFenceDomain).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::LookupFailure(RangeHandle::from_raw(3)).kind(),
            ErrorKind::LookupFailure
        );
        assert_eq!(
            Error::from(NativeError(700)).kind(),
            ErrorKind::SubmissionFailure
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::CapacityExceeded { capacity: 4 }.is_fatal());
        assert!(Error::from(ArgError::InlinePayloadTooLarge { len: 257 }).is_fatal());
        assert!(!Error::from(ArgError::NoInlineCopyToPatch).is_fatal());
        assert!(!Error::from(NativeError(1)).is_fatal());
    }
}
