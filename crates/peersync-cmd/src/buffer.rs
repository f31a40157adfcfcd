//! # Op Buffer
//!
//! Pre-sized, append-only storage for one batch.
//!
//! The write cursor is the number of ops pushed so far. It is shared by
//! every peer-op list folded into the batch and only ever advances. Capacity
//! is fixed by the planner before the first push; running past it is a
//! bookkeeping defect, reported as [`Error::CapacityExceeded`].

use alloc::vec::Vec;

use peersync_core::{ArgError, CopyFlags, Error, PrimitiveOp, Result};

/// Batch under construction
#[derive(Debug)]
pub struct OpBuffer<'a> {
    /// Ops written so far
    ops: Vec<PrimitiveOp<'a>>,
    /// Planned capacity
    capacity: usize,
    /// Set once a translation into this buffer failed
    poisoned: bool,
}

impl<'a> OpBuffer<'a> {
    /// Create an empty buffer with a fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
            capacity,
            poisoned: false,
        }
    }

    /// Append one op at the cursor
    pub fn push(&mut self, op: PrimitiveOp<'a>) -> Result<()> {
        if self.ops.len() >= self.capacity {
            log::error!(
                "idx={} is past allocation ({}), dropping {}",
                self.ops.len(),
                self.capacity,
                op
            );
            self.poisoned = true;
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.ops.push(op);
        Ok(())
    }

    /// Clear the no-barrier flag of the last op, which must be an inline copy
    pub fn enable_copy_barrier(&mut self) -> Result<()> {
        match self.ops.last_mut() {
            Some(PrimitiveOp::InlineCopy { flags, .. }) => {
                flags.remove(CopyFlags::NO_MEMORY_BARRIER);
                Ok(())
            }
            _ => Err(ArgError::NoInlineCopyToPatch.into()),
        }
    }

    /// Write cursor: number of ops written
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing was written
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Planned capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots left before the capacity is reached
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.ops.len()
    }

    /// Mark the buffer as unusable
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    /// Check if a failed translation touched this buffer
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Ops written so far
    #[inline]
    pub fn as_slice(&self) -> &[PrimitiveOp<'a>] {
        &self.ops
    }
}
