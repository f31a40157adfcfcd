//! # Capacity Planner
//!
//! Sizes a batch before anything is translated. The bounds are conservative:
//! over-allocating is harmless, running out of room mid-batch is a defect.

use peersync_core::PeerOp;

use crate::descriptor::Descriptor;

/// Slots reserved for one standalone value-level descriptor
pub const VALUE_OP_BOUND: usize = 2;

/// Slack added to each peer-op list
pub const SEQUENCE_SLACK: usize = 2;

/// Upper bound on the primitive ops one peer-op list lowers to
///
/// Every peer op lowers to at most one primitive op except a split 64-bit
/// store, which takes two. The slack covers up to [`SEQUENCE_SLACK`] split
/// stores; longer runs of them widen the bound accordingly.
pub fn sequence_bound(ops: &[PeerOp<'_>]) -> usize {
    let wide = ops
        .iter()
        .filter(|op| matches!(op, PeerOp::StoreWide { .. }))
        .count();
    ops.len() + wide.max(SEQUENCE_SLACK)
}

/// Total capacity for a descriptor list
pub fn plan_descriptors(descs: &[Descriptor<'_>]) -> usize {
    descs
        .iter()
        .map(|desc| match desc {
            Descriptor::Send(ops) | Descriptor::Wait { ops, .. } => sequence_bound(ops),
            Descriptor::WaitValue32(_) | Descriptor::WriteValue32(_) => VALUE_OP_BOUND,
        })
        .sum()
}
