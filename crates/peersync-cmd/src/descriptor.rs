//! # Descriptor Orchestrator
//!
//! Folds an ordered list of heterogeneous descriptors into one batch.
//!
//! ```text
//!   [Send] [Wait] [WaitValue32] [Wait] [WriteValue32]
//!     │      │         │          │          │
//!     ▼      ▼         ▼          ▼          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ OpBuffer (one cursor, sized by the planner)  │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! When no Send or Wait follows the last Wait, only that last Wait keeps its
//! remote flush: one flush at the end of the run makes all earlier remote
//! writes visible as well.

use peersync_core::{AddressResolver, CapabilityConfig, PeerOp, Result, Target, WaitCondition};

use crate::buffer::OpBuffer;
use crate::builder;
use crate::plan::plan_descriptors;
use crate::translate::{PostFlags, Translator};

/// Standalone 32-bit poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitValue32 {
    /// Location polled
    pub target: Target,
    /// Reference value
    pub value: u32,
    /// Comparison
    pub condition: WaitCondition,
    /// Request a remote flush before the poll completes
    pub flush: bool,
}

/// Standalone 32-bit write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteValue32 {
    /// Destination
    pub target: Target,
    /// Value written
    pub value: u32,
    /// Order the write after prior memory accesses
    pub pre_barrier: bool,
}

/// One part of a logical submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor<'a> {
    /// Peer ops committed by a send request
    Send(&'a [PeerOp<'a>]),
    /// Peer ops peeked from a completion queue
    Wait {
        /// Ops to lower
        ops: &'a [PeerOp<'a>],
        /// Drop the remote flush of every poll in this list
        suppress_flush: bool,
    },
    /// Standalone poll
    WaitValue32(WaitValue32),
    /// Standalone write
    WriteValue32(WriteValue32),
}

impl<'a> Descriptor<'a> {
    /// Send descriptor
    pub const fn send(ops: &'a [PeerOp<'a>]) -> Self {
        Self::Send(ops)
    }

    /// Wait descriptor with flushing left as requested by its ops
    pub const fn wait(ops: &'a [PeerOp<'a>]) -> Self {
        Self::Wait {
            ops,
            suppress_flush: false,
        }
    }

    const fn is_network(&self) -> bool {
        matches!(self, Self::Send(_) | Self::Wait { .. })
    }
}

/// Index of the only Wait that keeps its remote flush
///
/// `None` when flush elision does not apply: there is no Wait, or a Send or
/// Wait follows the last one.
pub fn last_flushing_wait(descs: &[Descriptor<'_>]) -> Option<usize> {
    let last = descs
        .iter()
        .rposition(|desc| matches!(desc, Descriptor::Wait { .. }))?;
    if descs[last + 1..].iter().any(Descriptor::is_network) {
        return None;
    }
    Some(last)
}

/// Build one batch out of `descs`
///
/// Nothing is returned on failure; a partial batch never leaves this call.
pub fn build_batch<'a>(
    caps: &CapabilityConfig,
    resolver: &dyn AddressResolver,
    descs: &[Descriptor<'a>],
) -> Result<OpBuffer<'a>> {
    let capacity = plan_descriptors(descs);
    let keep_flush = last_flushing_wait(descs);
    log::debug!("n_descs={} n_mem_ops={}", descs.len(), capacity);
    if let Some(last) = keep_flush {
        log::debug!("optimizing FLUSH to last wait i={}", last);
    }

    let translator = Translator::new(caps, resolver);
    let mut buf = OpBuffer::with_capacity(capacity);

    for (i, desc) in descs.iter().enumerate() {
        let res = match *desc {
            Descriptor::Send(ops) => translator.translate(ops, &mut buf, PostFlags::empty()),
            Descriptor::Wait {
                ops,
                suppress_flush,
            } => {
                let mut flags = PostFlags::empty();
                if suppress_flush || keep_flush.map_or(false, |last| last != i) {
                    flags |= PostFlags::DISCARD_WAIT_FLUSH;
                }
                translator.translate(ops, &mut buf, flags)
            }
            Descriptor::WaitValue32(wait) => resolver
                .resolve_target(wait.target)
                .and_then(|addr| builder::wait32(caps, addr, wait.value, wait.condition, wait.flush))
                .and_then(|op| buf.push(op)),
            Descriptor::WriteValue32(write) => resolver
                .resolve_target(write.target)
                .and_then(|addr| builder::write32(addr, write.value, write.pre_barrier))
                .and_then(|op| buf.push(op)),
        };

        if let Err(err) = res {
            log::error!("{} while posting descriptor {}", err, i);
            return Err(err);
        }
    }

    Ok(buf)
}
