//! # Batch Submitter
//!
//! Hands a filled [`OpBuffer`] to the execution stream in a single call.
//! The consistency mode applies to the whole batch.

use alloc::vec::Vec;

use peersync_core::{ArgError, CapabilityConfig, Error, NativeError, PrimitiveOp, RawMemOp, Result};

use crate::buffer::OpBuffer;

/// Batches above this size are logged but still submitted
pub const SOFT_BATCH_LIMIT: usize = 256;

/// Memory consistency requested for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Ops complete in stream order
    #[default]
    Strict,
    /// The stream may relax ordering between independent ops
    Weak,
}

impl Consistency {
    /// Mode implied by a capability set
    pub const fn from_caps(caps: &CapabilityConfig) -> Self {
        if caps.weak_consistency {
            Self::Weak
        } else {
            Self::Strict
        }
    }
}

/// Asynchronous execution stream accepting memory-op batches
///
/// Batches submitted to one stream execute in submission order.
pub trait ExecutionStream {
    /// Enqueue `ops` as one unit
    fn batch_mem_op(
        &self,
        ops: &[PrimitiveOp<'_>],
        consistency: Consistency,
    ) -> core::result::Result<(), NativeError>;
}

impl<S: ExecutionStream + ?Sized> ExecutionStream for &S {
    fn batch_mem_op(
        &self,
        ops: &[PrimitiveOp<'_>],
        consistency: Consistency,
    ) -> core::result::Result<(), NativeError> {
        (**self).batch_mem_op(ops, consistency)
    }
}

/// Submit a filled buffer
pub fn submit<S: ExecutionStream + ?Sized>(
    stream: &S,
    buf: &OpBuffer<'_>,
    caps: &CapabilityConfig,
) -> Result<()> {
    if buf.is_poisoned() {
        log::error!("refusing to submit an incomplete batch");
        return Err(ArgError::IncompleteBatch.into());
    }

    let ops = buf.as_slice();
    if ops.len() > SOFT_BATCH_LIMIT {
        log::warn!(
            "batch of {} ops exceeds the recommended {}",
            ops.len(),
            SOFT_BATCH_LIMIT
        );
    }

    let consistency = Consistency::from_caps(caps);
    if let Err(native) = stream.batch_mem_op(ops, consistency) {
        log::error!("error {} in batch mem ops ({} ops)", native.code(), ops.len());
        dump_ops(ops);
        return Err(Error::SubmissionFailed(native));
    }

    if caps.dump_enabled {
        dump_ops(ops);
    }
    Ok(())
}

/// Log every op of a batch
pub fn dump_ops(ops: &[PrimitiveOp<'_>]) {
    log::info!("dumping {} ops", ops.len());
    for (n, op) in ops.iter().enumerate() {
        log::info!("param[{}]: {}", n, op);
    }
}

/// Encode a batch into flat records
pub fn encode_batch(ops: &[PrimitiveOp<'_>]) -> Vec<RawMemOp> {
    ops.iter().map(PrimitiveOp::to_raw).collect()
}
