//! # Range Resolution
//!
//! Peer operations name memory by [`RangeHandle`]; the lowering code turns
//! a handle into a device address through the [`AddressResolver`] contract
//! and never inspects the registry behind it.
//!
//! [`RangeTable`] is a simple arena-backed registry for embedders that do not
//! bring their own.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::types::{DevAddr, RangeHandle, Target};

// =============================================================================
// RESOLVER CONTRACT
// =============================================================================

/// Maps range handles to device addresses
pub trait AddressResolver {
    /// Base device address of the range behind `handle`
    fn resolve(&self, handle: RangeHandle) -> Result<DevAddr>;

    /// Device address of a target
    fn resolve_target(&self, target: Target) -> Result<DevAddr> {
        Ok(self.resolve(target.handle)?.offset(target.offset))
    }
}

impl<R: AddressResolver + ?Sized> AddressResolver for &R {
    fn resolve(&self, handle: RangeHandle) -> Result<DevAddr> {
        (**self).resolve(handle)
    }
}

// =============================================================================
// RANGE TABLE
// =============================================================================

/// A registered memory range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// Device-visible base address
    pub base: DevAddr,
    /// Length in bytes
    pub len: u64,
}

/// Arena of registered ranges keyed by slot index
///
/// Handles are `index + 1`, so a zero handle never resolves.
#[derive(Debug, Default)]
pub struct RangeTable {
    slots: Vec<Option<Range>>,
    free: Vec<usize>,
}

impl RangeTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Register a range, returning its handle
    pub fn register(&mut self, base: DevAddr, len: u64) -> RangeHandle {
        let range = Some(Range { base, len });
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = range;
                index
            }
            None => {
                self.slots.push(range);
                self.slots.len() - 1
            }
        };
        log::debug!("registered range {} len={} at slot {}", base, len, index);
        RangeHandle::from_raw(index as u64 + 1)
    }

    /// Drop a registration, returning the range it held
    pub fn unregister(&mut self, handle: RangeHandle) -> Result<Range> {
        let index = Self::index(handle).ok_or(Error::LookupFailure(handle))?;
        let range = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(Error::LookupFailure(handle))?;
        self.free.push(index);
        Ok(range)
    }

    /// Look up a registered range
    pub fn get(&self, handle: RangeHandle) -> Option<&Range> {
        Self::index(handle)
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Check if no range is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(handle: RangeHandle) -> Option<usize> {
        (handle.raw() as usize).checked_sub(1)
    }
}

impl AddressResolver for RangeTable {
    fn resolve(&self, handle: RangeHandle) -> Result<DevAddr> {
        match self.get(handle) {
            Some(range) => Ok(range.base),
            None => {
                log::error!("could not look up range {}", handle);
                Err(Error::LookupFailure(handle))
            }
        }
    }
}
