//! # Posting Entry Points
//!
//! Convenience front door: every call builds exactly one batch and submits
//! it once to the wrapped stream.

use alloc::vec::Vec;

use peersync_core::{
    AddressResolver, ArgError, CapabilityConfig, InlineSource, PeerOp, Result, Target,
    WaitCondition,
};

use crate::buffer::OpBuffer;
use crate::builder;
use crate::descriptor::{build_batch, Descriptor, WaitValue32, WriteValue32};
use crate::plan::VALUE_OP_BOUND;
use crate::submit::{submit, ExecutionStream};

/// Standalone inline copy request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRequest<'a> {
    /// Destination
    pub target: Target,
    /// Payload
    pub src: &'a [u8],
    /// Order later accesses after the copy
    pub post_barrier: bool,
}

/// Execution stream bound to a capability set and a range resolver
pub struct PeerStream<'c, S: ExecutionStream> {
    caps: &'c CapabilityConfig,
    resolver: &'c dyn AddressResolver,
    stream: S,
}

impl<'c, S: ExecutionStream> PeerStream<'c, S> {
    /// Wrap `stream`
    pub fn new(caps: &'c CapabilityConfig, resolver: &'c dyn AddressResolver, stream: S) -> Self {
        Self {
            caps,
            resolver,
            stream,
        }
    }

    /// Capability set in use
    pub fn caps(&self) -> &'c CapabilityConfig {
        self.caps
    }

    /// Underlying stream
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Build and submit one batch out of `descs`
    pub fn post_descriptors(&self, descs: &[Descriptor<'_>]) -> Result<()> {
        let buf = build_batch(self.caps, self.resolver, descs)?;
        submit(&self.stream, &buf, self.caps)
    }

    /// Post several send lists, then an optional tracking write
    pub fn post_sends<'a>(
        &self,
        sends: &[&'a [PeerOp<'a>]],
        tracking: Option<WriteValue32>,
    ) -> Result<()> {
        let descs: Vec<Descriptor<'a>> = sends
            .iter()
            .copied()
            .map(Descriptor::send)
            .chain(tracking.map(Descriptor::WriteValue32))
            .collect();
        self.post_descriptors(&descs)
    }

    /// Post several wait lists, then an optional tracking write
    ///
    /// Only the last list keeps its remote flush.
    pub fn post_waits<'a>(
        &self,
        waits: &[&'a [PeerOp<'a>]],
        tracking: Option<WriteValue32>,
    ) -> Result<()> {
        let descs: Vec<Descriptor<'a>> = waits
            .iter()
            .copied()
            .map(Descriptor::wait)
            .chain(tracking.map(Descriptor::WriteValue32))
            .collect();
        self.post_descriptors(&descs)
    }

    /// Block the stream on a 32-bit location
    pub fn post_poll_dword(
        &self,
        target: Target,
        value: u32,
        condition: WaitCondition,
        flush: bool,
    ) -> Result<()> {
        self.post_descriptors(&[Descriptor::WaitValue32(WaitValue32 {
            target,
            value,
            condition,
            flush,
        })])
    }

    /// Write a 32-bit value from the stream
    pub fn post_poke_dword(&self, target: Target, value: u32, pre_barrier: bool) -> Result<()> {
        self.post_descriptors(&[Descriptor::WriteValue32(WriteValue32 {
            target,
            value,
            pre_barrier,
        })])
    }

    /// Copy a small payload from the stream
    pub fn post_inline_copy(&self, copy: CopyRequest<'_>) -> Result<()> {
        self.post_polls_and_copies(&[], &[copy])
    }

    /// Post polls followed by pokes, as one batch
    pub fn post_polls_and_pokes(&self, polls: &[WaitValue32], pokes: &[WriteValue32]) -> Result<()> {
        let descs: Vec<Descriptor<'_>> = polls
            .iter()
            .copied()
            .map(Descriptor::WaitValue32)
            .chain(pokes.iter().copied().map(Descriptor::WriteValue32))
            .collect();
        self.post_descriptors(&descs)
    }

    /// Post polls followed by inline copies, as one batch
    pub fn post_polls_and_copies(
        &self,
        polls: &[WaitValue32],
        copies: &[CopyRequest<'_>],
    ) -> Result<()> {
        if !copies.is_empty() && !self.caps.inline_copy {
            log::error!("inline copy is not supported");
            return Err(ArgError::InlineCopyUnavailable.into());
        }

        let mut buf = OpBuffer::with_capacity(VALUE_OP_BOUND * (polls.len() + copies.len()));
        for poll in polls {
            let addr = self.resolver.resolve_target(poll.target)?;
            buf.push(builder::wait32(
                self.caps,
                addr,
                poll.value,
                poll.condition,
                poll.flush,
            )?)?;
        }
        for copy in copies {
            let addr = self.resolver.resolve_target(copy.target)?;
            buf.push(builder::inline_copy(
                addr,
                InlineSource::Borrowed(copy.src),
                copy.post_barrier,
            )?)?;
        }

        submit(&self.stream, &buf, self.caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, at, RecordingStream, BASE};
    use crate::submit::Consistency;
    use peersync_core::{memop, Error, FenceFlags, NativeError, OpKind, WaitFlags, WriteFlags};

    #[test]
    fn test_post_poll_and_poke() {
        let (table, h) = fixtures::ranges();
        let caps = fixtures::plain();
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);

        stream
            .post_poll_dword(at(h, 0), 5, WaitCondition::Geq, true)
            .unwrap();
        stream.post_poke_dword(at(h, 4), 6, false).unwrap();
        assert_eq!(rec.batch_count(), 2);

        let poke = rec.last().unwrap();
        assert_eq!(poke.kinds, [OpKind::WriteValue32]);
        assert_eq!(poke.records[0].address, BASE + 4);
        assert_eq!(poke.records[0].value, 6);
        assert_eq!(poke.records[0].flags, WriteFlags::NO_MEMORY_BARRIER.bits());

        let poll = rec.batches.borrow()[0].records[0];
        assert_eq!(poll.operation, memop::OP_WAIT_VALUE_32);
        assert_eq!(poll.flags, memop::WAIT_VALUE_GEQ | WaitFlags::FLUSH.bits());
    }

    #[test]
    fn test_post_inline_copy() {
        let (table, h) = fixtures::ranges();
        let payload = [9u8; 12];
        let copy = CopyRequest {
            target: at(h, 0x30),
            src: &payload,
            post_barrier: true,
        };

        let plain = fixtures::plain();
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&plain, &table, &rec);
        assert_eq!(
            stream.post_inline_copy(copy),
            Err(Error::InvalidArgument(ArgError::InlineCopyUnavailable))
        );
        assert_eq!(rec.batch_count(), 0);

        let caps = fixtures::copy_membar();
        let stream = PeerStream::new(&caps, &table, &rec);
        stream.post_inline_copy(copy).unwrap();
        let batch = rec.last().unwrap();
        assert_eq!(batch.kinds, [OpKind::InlineCopy]);
        assert_eq!(batch.records[0].byte_count, 12);
        assert_eq!(batch.records[0].flags, 0);
    }

    #[test]
    fn test_post_sends_with_tracking() {
        let (table, h) = fixtures::ranges();
        let caps = fixtures::membar();
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);

        let first = [
            PeerOp::StoreNarrow {
                target: at(h, 0),
                value: 1,
            },
            PeerOp::Fence(FenceFlags::OP_WRITE | FenceFlags::FROM_HCA | FenceFlags::MEM_SYS),
        ];
        let second = [PeerOp::StoreWide {
            target: at(h, 8),
            value: 2,
        }];
        let tracking = WriteValue32 {
            target: at(h, 0x100),
            value: 3,
            pre_barrier: true,
        };
        stream.post_sends(&[&first[..], &second[..]], Some(tracking)).unwrap();

        assert_eq!(rec.batch_count(), 1);
        assert_eq!(
            rec.last().unwrap().kinds,
            [
                OpKind::WriteValue32,
                OpKind::MemoryBarrier,
                OpKind::WriteValue32,
                OpKind::WriteValue32,
                OpKind::WriteValue32
            ]
        );
    }

    #[test]
    fn test_post_waits_keeps_last_flush() {
        let (table, h) = fixtures::ranges();
        let caps = fixtures::plain();
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);

        let poll = [PeerOp::PollNarrow {
            target: at(h, 0),
            value: 1,
            condition: WaitCondition::Geq,
        }];
        stream.post_waits(&[&poll[..], &poll[..], &poll[..]], None).unwrap();

        let flush = WaitFlags::FLUSH.bits();
        let flags: Vec<u32> = rec
            .last()
            .unwrap()
            .records
            .iter()
            .map(|raw| raw.flags & flush)
            .collect();
        assert_eq!(flags, [0, 0, flush]);
    }

    #[test]
    fn test_post_polls_and_pokes_order() {
        let (table, h) = fixtures::ranges();
        let caps = CapabilityConfig {
            weak_consistency: true,
            ..fixtures::membar()
        };
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);

        let polls = [WaitValue32 {
            target: at(h, 0),
            value: 1,
            condition: WaitCondition::And,
            flush: false,
        }];
        let pokes = [
            WriteValue32 {
                target: at(h, 4),
                value: 2,
                pre_barrier: false,
            },
            WriteValue32 {
                target: at(h, 8),
                value: 3,
                pre_barrier: true,
            },
        ];
        stream.post_polls_and_pokes(&polls, &pokes).unwrap();

        let batch = rec.last().unwrap();
        assert_eq!(batch.consistency, Consistency::Weak);
        let addrs: Vec<u64> = batch.records.iter().map(|raw| raw.address).collect();
        assert_eq!(addrs, [BASE, BASE + 4, BASE + 8]);
    }

    #[test]
    fn test_post_polls_and_copies() {
        let (table, h) = fixtures::ranges();
        let caps = fixtures::copy_membar();
        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);

        let polls = [WaitValue32 {
            target: at(h, 0),
            value: 1,
            condition: WaitCondition::Geq,
            flush: true,
        }];
        let data = 0xdead_beefu32.to_ne_bytes();
        let copies = [CopyRequest {
            target: at(h, 0x40),
            src: &data,
            post_barrier: false,
        }];
        stream.post_polls_and_copies(&polls, &copies).unwrap();
        assert_eq!(rec.last().unwrap().kinds, [OpKind::WaitValue32, OpKind::InlineCopy]);
    }

    #[test]
    fn test_failures_reach_caller() {
        let (table, h) = fixtures::ranges();
        let caps = fixtures::plain();

        let rec = RecordingStream::failing(-5);
        let stream = PeerStream::new(&caps, &table, &rec);
        assert_eq!(
            stream.post_poke_dword(at(h, 0), 1, false),
            Err(Error::SubmissionFailed(NativeError(-5)))
        );

        let rec = RecordingStream::new();
        let stream = PeerStream::new(&caps, &table, &rec);
        let bad = [PeerOp::StoreNarrow {
            target: at(h, 2),
            value: 1,
        }];
        assert!(stream.post_sends(&[&bad[..]], None).is_err());
        assert_eq!(rec.batch_count(), 0);
    }
}
