//! Shared test support: a recording stream and canned capability sets.

#![allow(dead_code)]

use alloc::vec::Vec;
use core::cell::RefCell;

use peersync_core::{
    CapabilityConfig, DevAddr, NativeError, OpKind, PrimitiveOp, RangeHandle, RangeTable,
    RawMemOp, Target,
};

use crate::submit::{Consistency, ExecutionStream};

/// Base address of the range registered by [`ranges`]
pub const BASE: u64 = 0x1000;

/// One batch as seen by the stream
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    pub kinds: Vec<OpKind>,
    pub records: Vec<RawMemOp>,
    pub consistency: Consistency,
}

/// Stream fake that records every batch it is handed
#[derive(Debug, Default)]
pub struct RecordingStream {
    pub batches: RefCell<Vec<RecordedBatch>>,
    pub fail_with: Option<NativeError>,
}

impl RecordingStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(code: i32) -> Self {
        Self {
            batches: RefCell::new(Vec::new()),
            fail_with: Some(NativeError(code)),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.borrow().len()
    }

    pub fn last(&self) -> Option<RecordedBatch> {
        self.batches.borrow().last().cloned()
    }
}

impl ExecutionStream for RecordingStream {
    fn batch_mem_op(
        &self,
        ops: &[PrimitiveOp<'_>],
        consistency: Consistency,
    ) -> Result<(), NativeError> {
        if let Some(err) = self.fail_with {
            return Err(err);
        }
        self.batches.borrow_mut().push(RecordedBatch {
            kinds: ops.iter().map(PrimitiveOp::kind).collect(),
            records: ops.iter().map(PrimitiveOp::to_raw).collect(),
            consistency,
        });
        Ok(())
    }
}

/// A table with one range at [`BASE`]
pub fn ranges() -> (RangeTable, RangeHandle) {
    let mut table = RangeTable::new();
    let handle = table.register(DevAddr::new(BASE), 0x1000);
    (table, handle)
}

/// Target at `offset` inside the fixture range
pub fn at(handle: RangeHandle, offset: u64) -> Target {
    Target::new(handle, offset)
}

/// Nothing beyond plain 32-bit writes and waits
pub fn plain() -> CapabilityConfig {
    CapabilityConfig::default()
}

/// Inline copy without a memory barrier
pub fn copy_only() -> CapabilityConfig {
    CapabilityConfig {
        inline_copy: true,
        ..CapabilityConfig::default()
    }
}

/// Memory barrier without inline copy
pub fn membar() -> CapabilityConfig {
    CapabilityConfig {
        memory_barrier: true,
        ..CapabilityConfig::default()
    }
}

/// Inline copy with a memory barrier
pub fn copy_membar() -> CapabilityConfig {
    CapabilityConfig {
        inline_copy: true,
        memory_barrier: true,
        ..CapabilityConfig::default()
    }
}

/// Simulated 64-bit writes with a memory barrier
pub fn sim_membar() -> CapabilityConfig {
    CapabilityConfig {
        memory_barrier: true,
        simulate_wide_write: true,
        ..CapabilityConfig::default()
    }
}

/// Simulated 64-bit writes, no barriers
pub fn sim_only() -> CapabilityConfig {
    CapabilityConfig {
        simulate_wide_write: true,
        ..CapabilityConfig::default()
    }
}
