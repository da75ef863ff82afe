//! # PrintBridge G-Code
//!
//! Byte-stream rewriting of G-code for the line-checksum protocol.
//! Each source byte flows through three stages:
//! - [`Minifier`] strips whitespace, comments and blank lines
//! - [`NumericTrimmer`] drops redundant fractional zeros
//! - [`LineNumberer`] frames each line as `N<seq>...*<xor>`
//!
//! [`RewritePipeline`] chains them in that order.

pub mod pipeline;

pub use pipeline::{
    line_checksum, process_all, ByteProcessor, LineNumberer, Minifier, NumberingConfig,
    NumericTrimmer, RewritePipeline, RESET_COMMAND,
};
