//! Marlin firmware support
//!
//! Reply parsing, single-command completion tracking and the commands used
//! by the upload lifecycle.

pub mod commands;
pub mod link;
pub mod response_parser;

pub use commands::MarlinCommand;
pub use link::{Completion, ControllerLink, LinkConfig, LinkEvent};
pub use response_parser::{MarlinResponse, MarlinResponseParser};
