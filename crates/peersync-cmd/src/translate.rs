//! # Peer-Op Translator
//!
//! Lowers one ordered list of [`PeerOp`]s into primitive stream ops.
//!
//! ## Lowering Modes
//!
//! ```text
//! ┌────────────────────┬──────────────────────┬────────────────────────────┐
//! │ Capabilities       │ Stores lower to      │ A write fence becomes      │
//! ├────────────────────┼──────────────────────┼────────────────────────────┤
//! │ none               │ WRITE32              │ pre-barrier on next write  │
//! │ membar             │ WRITE32              │ MEMORY_BARRIER             │
//! │ sim64              │ 4B INLINECOPY (*)    │ post-barrier on prev copy  │
//! │ sim64 + membar     │ WRITE32 / 8B copy    │ MEMORY_BARRIER             │
//! │ inlcpy             │ 4B INLINECOPY        │ post-barrier on prev copy  │
//! │ inlcpy + membar    │ WRITE32              │ MEMORY_BARRIER             │
//! └────────────────────┴──────────────────────┴────────────────────────────┘
//! ```
//!
//! (*) 64-bit stores are rejected in that mode.
//!
//! Relative order of non-fence ops is preserved. Any failure aborts the
//! traversal and poisons the target buffer.

use peersync_core::{
    AddressResolver, ArgError, BarrierScope, CapabilityConfig, FenceFlags, InlineSource, OpKind,
    PeerOp, PrimitiveOp, Result, Target, WaitCondition, MAX_INLINE_SIZE,
};

use crate::buffer::OpBuffer;
use crate::builder;

bitflags::bitflags! {
    /// Per-call translation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PostFlags: u32 {
        /// Polls in this list do not request a remote flush
        const DISCARD_WAIT_FLUSH = 1 << 0;
    }
}

/// State of one list traversal
///
/// `last_emitted` starts from the last op already in the buffer, so a fence
/// heading a list can patch a copy left by the previous list.
struct TranslationState {
    emit_narrow_as_copy: bool,
    pending_fence: bool,
    last_emitted: Option<OpKind>,
}

impl TranslationState {
    fn new(caps: &CapabilityConfig, buf: &OpBuffer<'_>) -> Self {
        Self {
            emit_narrow_as_copy: caps.emit_narrow_as_copy(),
            pending_fence: false,
            last_emitted: buf.as_slice().last().map(PrimitiveOp::kind),
        }
    }

    fn emit<'a>(&mut self, buf: &mut OpBuffer<'a>, op: PrimitiveOp<'a>) -> Result<()> {
        let kind = op.kind();
        buf.push(op)?;
        self.last_emitted = Some(kind);
        Ok(())
    }
}

/// Peer-op list translator
pub struct Translator<'c> {
    caps: &'c CapabilityConfig,
    resolver: &'c dyn AddressResolver,
}

impl<'c> Translator<'c> {
    /// Create a translator over a resolved capability set
    pub fn new(caps: &'c CapabilityConfig, resolver: &'c dyn AddressResolver) -> Self {
        Self { caps, resolver }
    }

    /// Capability set in use
    pub fn caps(&self) -> &'c CapabilityConfig {
        self.caps
    }

    /// Append the lowering of `ops` to `buf`
    ///
    /// On error the buffer is left poisoned and must be dropped.
    pub fn translate<'a>(
        &self,
        ops: &[PeerOp<'a>],
        buf: &mut OpBuffer<'a>,
        flags: PostFlags,
    ) -> Result<()> {
        let mut state = TranslationState::new(self.caps, buf);

        for (n, op) in ops.iter().enumerate() {
            log::debug!("peer op[{}] {} idx={}", n, op.name(), buf.len());
            if let Err(err) = self.lower(&mut state, *op, buf, flags) {
                log::error!("{} in fill func at entry n={} (idx={})", err, n, buf.len());
                buf.poison();
                return Err(err);
            }
        }
        Ok(())
    }

    fn lower<'a>(
        &self,
        state: &mut TranslationState,
        op: PeerOp<'a>,
        buf: &mut OpBuffer<'a>,
        flags: PostFlags,
    ) -> Result<()> {
        match op {
            PeerOp::Fence(fence) => self.fence(state, buf, fence),
            PeerOp::StoreNarrow { target, value } => self.store_narrow(state, buf, target, value),
            PeerOp::StoreWide { target, value } => self.store_wide(state, buf, target, value),
            PeerOp::CopyBlock { target, src } => self.copy_block(state, buf, target, src),
            PeerOp::PollNarrow {
                target,
                value,
                condition,
            } => {
                let flush = !flags.contains(PostFlags::DISCARD_WAIT_FLUSH);
                self.poll_narrow(state, buf, target, value, condition, flush)
            }
        }
    }

    fn fence(
        &self,
        state: &mut TranslationState,
        buf: &mut OpBuffer<'_>,
        fence: FenceFlags,
    ) -> Result<()> {
        if fence.is_read_only() {
            log::debug!("nothing to do for read fences");
            return Ok(());
        }
        if !fence.from_adapter() {
            log::error!("unexpected fence origin {:?}", fence.intersection(FenceFlags::ORIGIN));
            return Err(ArgError::ForeignFenceOrigin.into());
        }

        if self.caps.memory_barrier {
            let domain = fence.domain();
            let scope = if domain == FenceFlags::MEM_PEER {
                BarrierScope::Light
            } else if domain == FenceFlags::MEM_SYS {
                BarrierScope::Heavy
            } else {
                log::error!("unexpected fence domain {:?}", domain);
                return Err(ArgError::UnknownFenceDomain.into());
            };
            state.emit(buf, builder::memory_barrier(self.caps, scope)?)
        } else if state.emit_narrow_as_copy {
            if state.last_emitted != Some(OpKind::InlineCopy) {
                log::error!("fence with no preceding inline copy");
                return Err(ArgError::NoInlineCopyToPatch.into());
            }
            buf.enable_copy_barrier()
        } else {
            state.pending_fence = true;
            Ok(())
        }
    }

    fn store_narrow<'a>(
        &self,
        state: &mut TranslationState,
        buf: &mut OpBuffer<'a>,
        target: Target,
        value: u32,
    ) -> Result<()> {
        if state.emit_narrow_as_copy {
            debug_assert!(!self.caps.memory_barrier);
            let addr = self.resolver.resolve_target(target)?;
            let op = builder::inline_copy(addr, InlineSource::dword(value), false)?;
            state.emit(buf, op)
        } else {
            debug_assert!(!self.caps.inline_copy || self.caps.memory_barrier);
            let addr = self.resolver.resolve_target(target)?;
            let pre_barrier = core::mem::take(&mut state.pending_fence);
            state.emit(buf, builder::write32(addr, value, pre_barrier)?)
        }
    }

    fn store_wide<'a>(
        &self,
        state: &mut TranslationState,
        buf: &mut OpBuffer<'a>,
        target: Target,
        value: u64,
    ) -> Result<()> {
        if self.caps.native_wide_write {
            log::error!("native 64-bit writes are not supported");
            return Err(ArgError::NativeWideWriteUnsupported.into());
        }

        if self.caps.simulate_wide_write {
            if !self.caps.memory_barrier {
                log::error!("simulated 64-bit writes need a memory barrier");
                return Err(ArgError::SimulatedWideWriteWithoutBarrier.into());
            }
            let addr = self.resolver.resolve_target(target)?;
            let op = builder::inline_copy(addr, InlineSource::qword(value), false)?;
            return state.emit(buf, op);
        }

        let addr = self.resolver.resolve_target(target)?;
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        let pre_barrier = core::mem::take(&mut state.pending_fence);
        let lo_op = builder::write32(addr, lo, pre_barrier)?;
        let hi_op = builder::write32(addr.offset(4), hi, false)?;
        state.emit(buf, lo_op)?;
        state.emit(buf, hi_op)
    }

    fn copy_block<'a>(
        &self,
        state: &mut TranslationState,
        buf: &mut OpBuffer<'a>,
        target: Target,
        src: &'a [u8],
    ) -> Result<()> {
        if !self.caps.inline_copy {
            log::error!("block copy needs inline copy support");
            return Err(ArgError::InlineCopyUnavailable.into());
        }
        if src.len() > MAX_INLINE_SIZE {
            log::error!("block copy of {} bytes exceeds {}", src.len(), MAX_INLINE_SIZE);
            return Err(ArgError::InlinePayloadTooLarge { len: src.len() }.into());
        }
        let addr = self.resolver.resolve_target(target)?;
        let op = builder::inline_copy(addr, InlineSource::Borrowed(src), false)?;
        state.emit(buf, op)
    }

    fn poll_narrow<'a>(
        &self,
        state: &mut TranslationState,
        buf: &mut OpBuffer<'a>,
        target: Target,
        value: u32,
        condition: WaitCondition,
        flush: bool,
    ) -> Result<()> {
        let addr = self.resolver.resolve_target(target)?;
        state.emit(buf, builder::wait32(self.caps, addr, value, condition, flush)?)
    }
}
