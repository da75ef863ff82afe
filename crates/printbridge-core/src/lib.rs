//! # PrintBridge Core
//!
//! Core types shared by every PrintBridge crate:
//! - The layered error types and the crate-wide [`Result`]
//! - [`FrameRing`], the fixed-capacity queue of length-prefixed frames that
//!   sits between the G-code rewrite pipeline and the transmit driver

pub mod error;
pub mod ring;

pub use error::{
    ConnectionError, ControllerError, Error, GcodeError, LinkError, Result, RingError,
};

pub use ring::{FrameRing, MAX_FRAME_PAYLOAD, MIN_APPEND_HEADROOM};

/// Ring capacity used when a session does not choose one
pub const DEFAULT_RING_CAPACITY: usize = 1024;
