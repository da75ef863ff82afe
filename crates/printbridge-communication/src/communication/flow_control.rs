//! Software flow control symbols

use printbridge_core::{ConnectionError, Result};
use serde::{Deserialize, Serialize};

/// Default pause symbol (DC3)
pub const XOFF: u8 = 0x13;

/// Default resume symbol (DC1)
pub const XON: u8 = 0x11;

/// Pause/resume handshake configuration
///
/// When enabled, a `pause` byte from the controller stops transmission until
/// a `resume` byte arrives. Neither byte is ever passed on as reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControl {
    /// Whether pause/resume bytes are honored
    pub enabled: bool,
    /// Byte that pauses transmission
    pub pause: u8,
    /// Byte that resumes transmission
    pub resume: u8,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self {
            enabled: true,
            pause: XOFF,
            resume: XON,
        }
    }
}

impl FlowControl {
    /// Flow control that never pauses
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Check that the symbols cannot collide with reply text or line framing
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        for (role, byte) in [("pause", self.pause), ("resume", self.resume)] {
            if byte.is_ascii_graphic() || matches!(byte, b' ' | b'\n' | b'\r' | b'\t') {
                return Err(ConnectionError::InvalidParameters {
                    reason: format!(
                        "{} symbol 0x{:02x} could appear in controller replies",
                        role, byte
                    ),
                }
                .into());
            }
        }

        if self.pause == self.resume {
            return Err(ConnectionError::InvalidParameters {
                reason: "pause and resume symbols must differ".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Whether `byte` pauses transmission
    pub fn is_pause(&self, byte: u8) -> bool {
        self.enabled && byte == self.pause
    }

    /// Whether `byte` resumes transmission
    pub fn is_resume(&self, byte: u8) -> bool {
        self.enabled && byte == self.resume
    }
}
