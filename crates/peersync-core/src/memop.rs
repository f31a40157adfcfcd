//! # Stream Memory Operations
//!
//! The primitive records the execution stream's batch facility executes.
//!
//! ## Record Layout
//!
//! [`PrimitiveOp`] is the typed form used while a batch is built.
//! [`RawMemOp`] is this crate's own flat 48-byte `#[repr(C)]` encoding of
//! it, with one field per datum. It reuses the runtime's operation codes
//! and flag values but NOT the runtime's per-operation union layout, so a
//! stream backed by a real runtime builds its native records from
//! [`PrimitiveOp`] instead:
//!
//! ```text
//! offset  0: operation   u32   OP_* code
//! offset  4: flags       u32   per-operation flag bits
//! offset  8: address     u64   device address (0 for barrier/flush)
//! offset 16: value       u64   write/wait value
//! offset 24: src         u64   inline copy source pointer
//! offset 32: byte_count  u64   inline copy length
//! offset 40: alias       u64   reserved, always 0
//! ```

use core::fmt;
use core::mem::{align_of, size_of};

use static_assertions::const_assert_eq;

use crate::error::{ArgError, Result};
use crate::types::DevAddr;

// =============================================================================
// OPERATION CODES
// =============================================================================

/// Wait on a 32-bit value
pub const OP_WAIT_VALUE_32: u32 = 1;
/// Write a 32-bit value
pub const OP_WRITE_VALUE_32: u32 = 2;
/// Flush remote writes
pub const OP_FLUSH_REMOTE_WRITES: u32 = 3;
/// Memory barrier
pub const OP_MEMORY_BARRIER: u32 = 6;
/// Inline copy
pub const OP_INLINE_COPY: u32 = 7;

/// Raw wait condition: greater or equal
pub const WAIT_VALUE_GEQ: u32 = 0x0;
/// Raw wait condition: equal (not accepted by this stack)
pub const WAIT_VALUE_EQ: u32 = 0x1;
/// Raw wait condition: bitwise AND non-zero
pub const WAIT_VALUE_AND: u32 = 0x2;
/// Raw wait condition: bitwise NOR non-zero
pub const WAIT_VALUE_NOR: u32 = 0x3;

/// Raw barrier flag: system scope
pub const MEMORY_BARRIER_SYS: u32 = 0x0;
/// Raw barrier flag: device scope
pub const MEMORY_BARRIER_GPU: u32 = 0x1;

// =============================================================================
// FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Flags of a 32-bit write
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WriteFlags: u32 {
        /// Skip the implicit barrier before the write
        const NO_MEMORY_BARRIER = 0x1;
    }
}

bitflags::bitflags! {
    /// Flags of a 32-bit wait
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WaitFlags: u32 {
        /// Flush remote writes once the wait is satisfied
        const FLUSH = 1 << 30;
    }
}

bitflags::bitflags! {
    /// Flags of an inline copy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CopyFlags: u32 {
        /// Skip the implicit barrier after the copy
        const NO_MEMORY_BARRIER = 0x1;
    }
}

// =============================================================================
// WAIT CONDITION
// =============================================================================

/// Comparison applied by a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WaitCondition {
    /// `*addr >= value`
    Geq = WAIT_VALUE_GEQ,
    /// `(*addr & value) != 0`
    And = WAIT_VALUE_AND,
    /// `!(*addr | value) != 0`
    Nor = WAIT_VALUE_NOR,
}

impl WaitCondition {
    /// Decode a raw condition code
    pub fn from_raw(code: u32) -> Result<Self> {
        match code {
            WAIT_VALUE_GEQ => Ok(Self::Geq),
            WAIT_VALUE_AND => Ok(Self::And),
            WAIT_VALUE_NOR => Ok(Self::Nor),
            other => Err(ArgError::UnknownWaitCondition(other).into()),
        }
    }

    /// Raw condition code
    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Stream-level name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Geq => "GEQ",
            Self::And => "AND",
            Self::Nor => "NOR",
        }
    }
}

// =============================================================================
// BARRIER SCOPE
// =============================================================================

/// Reach of a memory barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierScope {
    /// Orders accesses to device memory only
    Light,
    /// Orders accesses to system memory as well
    Heavy,
}

impl BarrierScope {
    /// Raw barrier flag
    pub const fn raw(self) -> u32 {
        match self {
            Self::Light => MEMORY_BARRIER_GPU,
            Self::Heavy => MEMORY_BARRIER_SYS,
        }
    }
}

// =============================================================================
// INLINE SOURCE
// =============================================================================

/// Payload of an inline copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineSource<'a> {
    /// Caller-owned bytes, borrowed for the lifetime of the batch
    Borrowed(&'a [u8]),
    /// Up to eight bytes carried inside the op itself
    Immediate {
        /// Payload storage
        bytes: [u8; 8],
        /// Number of valid bytes
        len: u8,
    },
}

impl<'a> InlineSource<'a> {
    /// Immediate payload holding a dword in native byte order
    pub const fn dword(value: u32) -> Self {
        let b = value.to_ne_bytes();
        Self::Immediate {
            bytes: [b[0], b[1], b[2], b[3], 0, 0, 0, 0],
            len: 4,
        }
    }

    /// Immediate payload holding a qword in native byte order
    pub const fn qword(value: u64) -> Self {
        Self::Immediate {
            bytes: value.to_ne_bytes(),
            len: 8,
        }
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Borrowed(src) => src,
            Self::Immediate { bytes, len } => &bytes[..*len as usize],
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// PRIMITIVE OP
// =============================================================================

/// Kind tag of a [`PrimitiveOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// 32-bit write
    WriteValue32,
    /// 32-bit wait
    WaitValue32,
    /// Inline copy
    InlineCopy,
    /// Memory barrier
    MemoryBarrier,
    /// Remote write flush
    FlushRemote,
}

/// One record of a stream batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveOp<'a> {
    /// Write a 32-bit value
    WriteValue32 {
        /// Destination
        addr: DevAddr,
        /// Value written
        value: u32,
        /// Write flags
        flags: WriteFlags,
    },
    /// Block the stream until a 32-bit location satisfies a condition
    WaitValue32 {
        /// Location polled
        addr: DevAddr,
        /// Reference value
        value: u32,
        /// Comparison
        condition: WaitCondition,
        /// Wait flags
        flags: WaitFlags,
    },
    /// Copy a small payload carried with the op
    InlineCopy {
        /// Destination
        addr: DevAddr,
        /// Payload
        src: InlineSource<'a>,
        /// Copy flags
        flags: CopyFlags,
    },
    /// Order memory accesses
    MemoryBarrier {
        /// Barrier reach
        scope: BarrierScope,
    },
    /// Make remote writes visible to the stream
    FlushRemote,
}

impl<'a> PrimitiveOp<'a> {
    /// Kind tag
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::WriteValue32 { .. } => OpKind::WriteValue32,
            Self::WaitValue32 { .. } => OpKind::WaitValue32,
            Self::InlineCopy { .. } => OpKind::InlineCopy,
            Self::MemoryBarrier { .. } => OpKind::MemoryBarrier,
            Self::FlushRemote => OpKind::FlushRemote,
        }
    }

    /// Target address, if the op has one
    pub const fn addr(&self) -> Option<DevAddr> {
        match self {
            Self::WriteValue32 { addr, .. }
            | Self::WaitValue32 { addr, .. }
            | Self::InlineCopy { addr, .. } => Some(*addr),
            Self::MemoryBarrier { .. } | Self::FlushRemote => None,
        }
    }

    /// Encode into the flat record layout
    ///
    /// For inline copies the `src` field points into `self` or the borrowed
    /// payload, so the record is only valid while `self` stays in place.
    pub fn to_raw(&self) -> RawMemOp {
        match self {
            Self::WriteValue32 { addr, value, flags } => RawMemOp {
                operation: OP_WRITE_VALUE_32,
                flags: flags.bits(),
                address: addr.raw(),
                value: *value as u64,
                ..RawMemOp::default()
            },
            Self::WaitValue32 {
                addr,
                value,
                condition,
                flags,
            } => RawMemOp {
                operation: OP_WAIT_VALUE_32,
                flags: condition.raw() | flags.bits(),
                address: addr.raw(),
                value: *value as u64,
                ..RawMemOp::default()
            },
            Self::InlineCopy { addr, src, flags } => {
                let bytes = src.as_bytes();
                RawMemOp {
                    operation: OP_INLINE_COPY,
                    flags: flags.bits(),
                    address: addr.raw(),
                    src: bytes.as_ptr() as usize as u64,
                    byte_count: bytes.len() as u64,
                    ..RawMemOp::default()
                }
            }
            Self::MemoryBarrier { scope } => RawMemOp {
                operation: OP_MEMORY_BARRIER,
                flags: scope.raw(),
                ..RawMemOp::default()
            },
            Self::FlushRemote => RawMemOp {
                operation: OP_FLUSH_REMOTE_WRITES,
                ..RawMemOp::default()
            },
        }
    }
}

impl fmt::Display for PrimitiveOp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteValue32 { addr, value, flags } => write!(
                f,
                "WRITE32 addr:{} value:{:08x} flags:{:08x}",
                addr,
                value,
                flags.bits()
            ),
            Self::WaitValue32 {
                addr,
                value,
                condition,
                flags,
            } => write!(
                f,
                "WAIT32 addr:{} value:{:08x} cond:{} flags:{:08x}",
                addr,
                value,
                condition.name(),
                flags.bits()
            ),
            Self::InlineCopy { addr, src, flags } => write!(
                f,
                "INLINECOPY addr:{} src:{:p} len:{} flags:{:08x}",
                addr,
                src.as_bytes().as_ptr(),
                src.len(),
                flags.bits()
            ),
            Self::MemoryBarrier { scope } => {
                write!(f, "MEMORY_BARRIER flags:{:08x}", scope.raw())
            }
            Self::FlushRemote => write!(f, "FLUSH"),
        }
    }
}

// =============================================================================
// FLAT RECORD
// =============================================================================

/// Flat batch record, one field per datum
///
/// Not interchangeable with the runtime's own batch record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct RawMemOp {
    /// `OP_*` code
    pub operation: u32,
    /// Operation flags
    pub flags: u32,
    /// Device address
    pub address: u64,
    /// Write/wait value
    pub value: u64,
    /// Inline copy source pointer
    pub src: u64,
    /// Inline copy length
    pub byte_count: u64,
    /// Reserved
    pub alias: u64,
}

const_assert_eq!(size_of::<RawMemOp>(), 48);
const_assert_eq!(align_of::<RawMemOp>(), 8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_wait_condition_codes() {
        assert_eq!(WaitCondition::from_raw(WAIT_VALUE_GEQ), Ok(WaitCondition::Geq));
        assert_eq!(WaitCondition::from_raw(WAIT_VALUE_AND), Ok(WaitCondition::And));
        assert_eq!(WaitCondition::from_raw(WAIT_VALUE_NOR), Ok(WaitCondition::Nor));
        assert_eq!(
            WaitCondition::from_raw(WAIT_VALUE_EQ),
            Err(Error::InvalidArgument(ArgError::UnknownWaitCondition(1)))
        );
    }

    #[test]
    fn test_immediate_payloads() {
        let dw = InlineSource::dword(0xdead_beef);
        assert_eq!(dw.as_bytes(), &0xdead_beef_u32.to_ne_bytes());

        let qw = InlineSource::qword(0x0102_0304_0506_0708);
        assert_eq!(qw.len(), 8);
        assert_eq!(qw.as_bytes(), &0x0102_0304_0506_0708_u64.to_ne_bytes());
    }

    #[test]
    fn test_raw_encoding() {
        let wait = PrimitiveOp::WaitValue32 {
            addr: DevAddr::new(0x2000),
            value: 7,
            condition: WaitCondition::And,
            flags: WaitFlags::FLUSH,
        };
        let raw = wait.to_raw();
        assert_eq!(raw.operation, OP_WAIT_VALUE_32);
        assert_eq!(raw.flags, WAIT_VALUE_AND | (1 << 30));
        assert_eq!(raw.address, 0x2000);
        assert_eq!(raw.value, 7);

        let barrier = PrimitiveOp::MemoryBarrier {
            scope: BarrierScope::Heavy,
        };
        assert_eq!(barrier.to_raw().operation, OP_MEMORY_BARRIER);
        assert_eq!(barrier.to_raw().flags, MEMORY_BARRIER_SYS);

        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let copy = PrimitiveOp::InlineCopy {
            addr: DevAddr::new(0x3000),
            src: InlineSource::Borrowed(&payload),
            flags: CopyFlags::NO_MEMORY_BARRIER,
        };
        let raw = copy.to_raw();
        assert_eq!(raw.src, payload.as_ptr() as usize as u64);
        assert_eq!(raw.byte_count, 12);
        assert_eq!(raw.flags, 0x1);
    }

    #[test]
    fn test_flat_record_offsets() {
        let raw = PrimitiveOp::WriteValue32 {
            addr: DevAddr::new(0x4000),
            value: 1,
            flags: WriteFlags::NO_MEMORY_BARRIER,
        }
        .to_raw();
        let base = &raw as *const RawMemOp as usize;
        let at = |field: *const u8| field as usize - base;

        assert_eq!(at(&raw.operation as *const u32 as *const u8), 0);
        assert_eq!(at(&raw.flags as *const u32 as *const u8), 4);
        assert_eq!(at(&raw.address as *const u64 as *const u8), 8);
        assert_eq!(at(&raw.value as *const u64 as *const u8), 16);
        assert_eq!(at(&raw.src as *const u64 as *const u8), 24);
        assert_eq!(at(&raw.byte_count as *const u64 as *const u8), 32);
        assert_eq!(at(&raw.alias as *const u64 as *const u8), 40);
        assert_eq!(raw.flags, WriteFlags::NO_MEMORY_BARRIER.bits());
    }
}
