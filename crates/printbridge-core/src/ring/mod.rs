//! Ring buffer storage for transmit-ready frames

pub mod frame_ring;

pub use frame_ring::{FrameRing, MAX_FRAME_PAYLOAD, MIN_APPEND_HEADROOM};
