//! Streaming Reply Reconstruction
//!
//! The reply endpoint answers with a long-lived body of `data: `-prefixed
//! JSON lines. Read boundaries never line up with line boundaries, so the
//! pipeline is split in two:
//!
//! ```text
//!   body bytes ──► LineDecoder ──► StreamAccumulator ──► StreamEvent
//!   (any split)    (whole lines)   (content/analysis/complete)
//! ```
//!
//! [`consume`] wraps both as a lazy `futures::Stream`.

mod accumulator;
mod decoder;

pub use accumulator::{
    consume, FinishReason, StreamAccumulator, StreamEvent, StreamSession, CURSOR, DATA_PREFIX,
};
pub use decoder::{LineDecoder, MAX_LINE_SIZE};
