//! # PeerSync Command System
//!
//! Lowering of peer operations into stream memory-op batches, and their
//! submission.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Batch Construction Pipeline                    │
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐     │
//! │  │ Descriptors  │    │   Capacity   │    │    OpBuffer      │     │
//! │  │ (send/wait/  │───▶│   Planner    │───▶│  (pre-sized,     │     │
//! │  │  value ops)  │    │              │    │   append-only)   │     │
//! │  └──────┬───────┘    └──────────────┘    └────────▲─────────┘     │
//! │         │                                         │               │
//! │         │  peer-op lists   ┌──────────────┐       │               │
//! │         ├─────────────────▶│  Translator  │───────┤               │
//! │         │                  └──────┬───────┘       │               │
//! │         │  value ops       ┌──────▼───────┐       │               │
//! │         └─────────────────▶│   Builders   │───────┘               │
//! │                            └──────────────┘                       │
//! │                                                   │               │
//! │                                          ┌────────▼─────────┐     │
//! │                                          │    Submitter     │     │
//! │                                          │ (one stream call)│     │
//! │                                          └──────────────────┘     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submission Flow
//!
//! 1. The planner sizes one buffer for the whole logical submission
//! 2. Each descriptor is folded into the buffer through one shared cursor
//! 3. Any failure drops the buffer; nothing partial reaches the stream
//! 4. The filled buffer is handed to the stream in a single call

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod buffer;
pub mod builder;
pub mod descriptor;
pub mod plan;
pub mod post;
pub mod submit;
pub mod translate;

#[cfg(test)]
mod fixtures;

// Re-exports
pub use buffer::OpBuffer;
pub use descriptor::{build_batch, Descriptor, WaitValue32, WriteValue32};
pub use plan::{plan_descriptors, sequence_bound};
pub use post::{CopyRequest, PeerStream};
pub use submit::{dump_ops, encode_batch, submit, Consistency, ExecutionStream};
pub use translate::{PostFlags, Translator};

pub use peersync_core::api_version;
