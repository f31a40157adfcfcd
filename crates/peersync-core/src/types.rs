//! # PeerSync Core Types
//!
//! Strongly typed addresses and handles.
//!
//! - [`DevAddr`]: a device-visible address, never dereferenced by the host
//! - [`RangeHandle`]: opaque id of a registered memory range
//! - [`Target`]: a handle plus byte offset, resolved lazily at lowering time

use core::fmt;

// =============================================================================
// DEVICE ADDRESS
// =============================================================================

/// Address in the execution stream's view of memory
///
/// Produced by resolving a [`Target`]; the host never reads through it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct DevAddr(u64);

impl DevAddr {
    /// Wrap a resolved address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Address as encoded into a record
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Zero is never a valid stream target
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `true` if the address is a multiple of `align`, a power of two
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 & (align - 1) == 0
    }

    /// Address `bytes` further on, wrapping at the top of the space
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::Debug for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevAddr(0x{:016x})", self.0)
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

// =============================================================================
// RANGE HANDLE
// =============================================================================

/// Opaque identifier of a registered memory range
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RangeHandle(u64);

impl RangeHandle {
    /// Wrap a raw registration id
    #[inline]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw registration id
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeHandle({:#x})", self.0)
    }
}

impl fmt::Display for RangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// A location inside a registered range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Range the location belongs to
    pub handle: RangeHandle,
    /// Byte offset from the range base
    pub offset: u64,
}

impl Target {
    /// Create a new target
    #[inline]
    pub const fn new(handle: RangeHandle, offset: u64) -> Self {
        Self { handle, offset }
    }
}
