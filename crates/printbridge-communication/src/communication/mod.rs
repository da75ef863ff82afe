//! Byte transports and the streaming machinery built on them

pub mod assembler;
pub mod flow_control;
pub mod serial;
pub mod simulated;
pub mod transmit;

use printbridge_core::Result;

/// Byte-level link to a controller
///
/// Reads never block: `read_byte` returns `Ok(None)` when no byte is
/// available yet, and callers poll again.
pub trait Transport: Send {
    /// Short human-readable name of the transport
    fn name(&self) -> String;

    /// Write one byte
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Read one byte if one is available
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Push any buffered output to the device
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
