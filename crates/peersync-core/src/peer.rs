//! # Peer Operations
//!
//! The hardware-agnostic requests a network adapter hands over when it wants
//! memory work executed on its behalf (ringing a doorbell, updating a
//! doorbell record, polling a completion entry).
//!
//! Operations arrive as an ordered, externally owned slice; the lowering code
//! only borrows it for the duration of one call.

use crate::memop::WaitCondition;
use crate::types::Target;

bitflags::bitflags! {
    /// Fence attributes: direction, origin and memory domain
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FenceFlags: u32 {
        /// Orders reads
        const OP_READ = 1 << 0;
        /// Orders writes
        const OP_WRITE = 1 << 1;
        /// Issued by the host CPU
        const FROM_CPU = 1 << 2;
        /// Issued by the adapter
        const FROM_HCA = 1 << 3;
        /// Targets system memory
        const MEM_SYS = 1 << 4;
        /// Targets peer (device) memory
        const MEM_PEER = 1 << 5;
    }
}

impl FenceFlags {
    /// Direction bits
    pub const DIRECTION: Self = Self::OP_READ.union(Self::OP_WRITE);
    /// Origin bits
    pub const ORIGIN: Self = Self::FROM_CPU.union(Self::FROM_HCA);
    /// Memory domain bits
    pub const DOMAIN: Self = Self::MEM_SYS.union(Self::MEM_PEER);

    /// Check if this fence only orders reads
    #[inline]
    pub fn is_read_only(self) -> bool {
        self.intersection(Self::DIRECTION) == Self::OP_READ
    }

    /// Check if the adapter issued this fence
    #[inline]
    pub fn from_adapter(self) -> bool {
        self.intersection(Self::ORIGIN) == Self::FROM_HCA
    }

    /// Memory domain bits of this fence
    #[inline]
    pub fn domain(self) -> Self {
        self.intersection(Self::DOMAIN)
    }
}

/// A single peer memory operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOp<'a> {
    /// Ordering barrier between the adapter and the target memory
    Fence(FenceFlags),
    /// Store a 32-bit value
    StoreNarrow {
        /// Destination
        target: Target,
        /// Value to store
        value: u32,
    },
    /// Store a 64-bit value
    StoreWide {
        /// Destination
        target: Target,
        /// Value to store
        value: u64,
    },
    /// Copy a small block of bytes
    CopyBlock {
        /// Destination
        target: Target,
        /// Bytes to copy
        src: &'a [u8],
    },
    /// Wait until a 32-bit location satisfies a condition
    PollNarrow {
        /// Location to poll
        target: Target,
        /// Reference value
        value: u32,
        /// Comparison to apply
        condition: WaitCondition,
    },
}

impl<'a> PeerOp<'a> {
    /// Short name used in traces
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fence(_) => "FENCE",
            Self::StoreNarrow { .. } => "STORE_DWORD",
            Self::StoreWide { .. } => "STORE_QWORD",
            Self::CopyBlock { .. } => "COPY_BLOCK",
            Self::PollNarrow { .. } => "POLL_DWORD",
        }
    }
}
