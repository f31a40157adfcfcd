//! # Primitive Op Builders
//!
//! One constructor per stream op. Each validates its own preconditions and
//! returns a filled [`PrimitiveOp`]; the caller decides where it lands.

use peersync_core::{
    ArgError, BarrierScope, CapabilityConfig, CopyFlags, DevAddr, InlineSource, PrimitiveOp,
    Result, WaitCondition, WaitFlags, WriteFlags, MAX_INLINE_SIZE,
};

fn check_dword_addr(addr: DevAddr) -> Result<()> {
    if addr.is_null() {
        return Err(ArgError::NullAddress.into());
    }
    if !addr.is_aligned(4) {
        return Err(ArgError::MisalignedAddress(addr).into());
    }
    Ok(())
}

/// 32-bit write
///
/// Writes skip the implicit barrier unless `pre_barrier` is set.
pub fn write32<'a>(addr: DevAddr, value: u32, pre_barrier: bool) -> Result<PrimitiveOp<'a>> {
    check_dword_addr(addr)?;

    let mut flags = WriteFlags::NO_MEMORY_BARRIER;
    if pre_barrier {
        flags = WriteFlags::empty();
    }
    log::debug!("WRITE32 addr={} value={:08x} flags={:08x}", addr, value, flags.bits());

    Ok(PrimitiveOp::WriteValue32 { addr, value, flags })
}

/// 32-bit wait
pub fn wait32<'a>(
    caps: &CapabilityConfig,
    addr: DevAddr,
    value: u32,
    condition: WaitCondition,
    flush: bool,
) -> Result<PrimitiveOp<'a>> {
    check_dword_addr(addr)?;

    if condition == WaitCondition::Nor && !caps.nor_wait_supported() {
        log::error!("NOR wait is not supported by the device");
        return Err(ArgError::NorWaitUnsupported.into());
    }

    let mut flags = WaitFlags::empty();
    if flush {
        flags |= WaitFlags::FLUSH;
    }
    log::debug!(
        "WAIT32 addr={} value={:08x} cond={} flags={:08x}",
        addr,
        value,
        condition.name(),
        flags.bits()
    );

    Ok(PrimitiveOp::WaitValue32 {
        addr,
        value,
        condition,
        flags,
    })
}

/// 32-bit wait from a raw condition code
pub fn wait32_raw<'a>(
    caps: &CapabilityConfig,
    addr: DevAddr,
    value: u32,
    condition: u32,
    flush: bool,
) -> Result<PrimitiveOp<'a>> {
    wait32(caps, addr, value, WaitCondition::from_raw(condition)?, flush)
}

/// Inline copy of at most [`MAX_INLINE_SIZE`] bytes
///
/// Copies skip the trailing barrier unless `post_barrier` is set.
pub fn inline_copy<'a>(
    addr: DevAddr,
    src: InlineSource<'a>,
    post_barrier: bool,
) -> Result<PrimitiveOp<'a>> {
    if addr.is_null() {
        return Err(ArgError::NullAddress.into());
    }
    let len = src.len();
    if len == 0 {
        return Err(ArgError::EmptyInlinePayload.into());
    }
    if len > MAX_INLINE_SIZE {
        log::error!("inline copy of {} bytes exceeds {}", len, MAX_INLINE_SIZE);
        return Err(ArgError::InlinePayloadTooLarge { len }.into());
    }

    let mut flags = CopyFlags::NO_MEMORY_BARRIER;
    if post_barrier {
        flags = CopyFlags::empty();
    }
    log::debug!("INLINECOPY addr={} len={} flags={:08x}", addr, len, flags.bits());

    Ok(PrimitiveOp::InlineCopy { addr, src, flags })
}

/// Standalone memory barrier
pub fn memory_barrier<'a>(caps: &CapabilityConfig, scope: BarrierScope) -> Result<PrimitiveOp<'a>> {
    if !caps.memory_barrier {
        log::error!("memory barrier is not supported");
        return Err(ArgError::MemoryBarrierUnavailable.into());
    }
    log::debug!("MEMORY_BARRIER scope={:?}", scope);
    Ok(PrimitiveOp::MemoryBarrier { scope })
}

/// Remote write flush
pub fn flush_remote<'a>(caps: &CapabilityConfig) -> Result<PrimitiveOp<'a>> {
    if !caps.memory_barrier {
        log::error!("remote flush is not supported");
        return Err(ArgError::MemoryBarrierUnavailable.into());
    }
    log::debug!("FLUSH_REMOTE");
    Ok(PrimitiveOp::FlushRemote)
}
