//! # PrintBridge
//!
//! Streams G-code to Marlin-style printer controllers over a serial link.
//!
//! ## Architecture
//!
//! PrintBridge is organized as a workspace with multiple crates:
//!
//! 1. **printbridge-core** - Frame ring and error types
//! 2. **printbridge-gcode** - Byte-at-a-time rewrite pipeline (minify, trim, number)
//! 3. **printbridge-communication** - Transports, Marlin replies, transmit driver, upload sessions
//! 4. **printbridge-settings** - Configuration files
//! 5. **printbridge** - Command-line front end
//!
//! Source bytes are minified, trimmed and numbered one byte at a time,
//! framed into a fixed-capacity ring and sent one line at a time. A line the
//! controller refuses is resent, followed by every line after it, until the
//! controller acknowledges it.

pub mod upload;

pub use printbridge_communication::{
    list_ports, FlowControl, MarlinResponse, SerialParams, SerialPortInfo, SerialTransport,
    SimulatedPrinter, StreamConfig, TransmitStats, Transport, UploadSession, UploadState,
};
pub use printbridge_core::{Error, FrameRing, Result};
pub use printbridge_gcode::{NumberingConfig, RewritePipeline};
pub use printbridge_settings::{Config, SettingsError};
pub use upload::{target_name, upload_reader, UploadReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("PRINTBRIDGE_BUILD_DATE");

/// Version string shown by `--version`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("PRINTBRIDGE_BUILD_DATE"),
    ")"
);

/// Initialize logging
///
/// Sets up structured logging on stderr with RUST_LOG support. `verbose`
/// raises the default level from `info` to `debug`.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
