//! # PeerSync Core
//!
//! Foundational types shared by every PeerSync crate.
//!
//! A network adapter describes the work it wants performed against
//! accelerator memory as a list of *peer operations* (store a dword, store a
//! qword, copy a small block, poll a dword, fence). The execution stream only
//! understands *stream memory operations* (write value, wait value, inline
//! copy, memory barrier, remote flush). This crate defines both vocabularies,
//! the capability set that decides how one is lowered into the other, and the
//! error taxonomy used across the stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      peersync-core                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Config    │  │   PeerOp    │  │    PrimitiveOp      │  │
//! │  │ (features,  │  │  (adapter   │  │  (stream records,   │  │
//! │  │  toggles)   │  │   requests) │  │   native layout)    │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Range     │  │   Types     │  │     Error           │  │
//! │  │ (resolver,  │  │ (DevAddr,   │  │   Handling          │  │
//! │  │  registry)  │  │  handles)   │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod config;
pub mod error;
pub mod memop;
pub mod peer;
pub mod range;
pub mod types;

// Re-exports for convenience
pub use config::{CapabilityConfig, ConfigSource, PeerCaps, StaticSource, StreamFeatures};
#[cfg(feature = "std")]
pub use config::EnvSource;
pub use error::{ArgError, Error, ErrorKind, NativeError, Result};
pub use memop::{
    BarrierScope, CopyFlags, InlineSource, OpKind, PrimitiveOp, RawMemOp, WaitCondition,
    WaitFlags, WriteFlags,
};
pub use peer::{FenceFlags, PeerOp};
pub use range::{AddressResolver, Range, RangeTable};
pub use types::{DevAddr, RangeHandle, Target};

/// Largest payload a single inline copy may carry, in bytes
pub const MAX_INLINE_SIZE: usize = 256;

/// API major version
pub const API_MAJOR_VERSION: u32 = 2;

/// API minor version
pub const API_MINOR_VERSION: u32 = 1;

/// Packed API version, `(major << 16) | minor`
pub const fn api_version() -> u32 {
    (API_MAJOR_VERSION << 16) | API_MINOR_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_packing() {
        assert_eq!(api_version(), 0x0002_0001);
        assert_eq!(api_version() >> 16, API_MAJOR_VERSION);
        assert_eq!(api_version() & 0xffff, API_MINOR_VERSION);
    }
}
