//! Redundant decimal digit removal

use super::ByteProcessor;
use printbridge_core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrimState {
    Outside,
    /// After a decimal point; the point and a run of zeros are held back
    Mantissa { point_pending: bool, zeros: u32 },
}

/// Removes trailing zeros after a decimal point, and the point itself when
/// no significant fractional digit follows it
///
/// `X10.500` becomes `X10.5`, `X3.000` becomes `X3`, `X0.010` becomes
/// `X0.01`. Digits before the point are never touched.
#[derive(Debug, Clone)]
pub struct NumericTrimmer {
    state: TrimState,
}

impl NumericTrimmer {
    /// Create a new numeric trimmer
    pub fn new() -> Self {
        Self {
            state: TrimState::Outside,
        }
    }
}

impl Default for NumericTrimmer {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteProcessor for NumericTrimmer {
    fn name(&self) -> &str {
        "numeric_trim"
    }

    fn description(&self) -> &str {
        "Drops trailing fractional zeros and bare decimal points"
    }

    fn process(&mut self, byte: u8, out: &mut dyn FnMut(u8) -> Result<()>) -> Result<()> {
        if let TrimState::Mantissa {
            point_pending,
            zeros,
        } = self.state
        {
            match byte {
                b'0' => {
                    self.state = TrimState::Mantissa {
                        point_pending,
                        zeros: zeros + 1,
                    };
                    return Ok(());
                }
                b'1'..=b'9' => {
                    if point_pending {
                        out(b'.')?;
                    }
                    for _ in 0..zeros {
                        out(b'0')?;
                    }
                    self.state = TrimState::Mantissa {
                        point_pending: false,
                        zeros: 0,
                    };
                    return out(byte);
                }
                // Held-back point and zeros are insignificant; drop them
                _ => self.state = TrimState::Outside,
            }
        }

        if byte == b'.' {
            self.state = TrimState::Mantissa {
                point_pending: true,
                zeros: 0,
            };
            return Ok(());
        }
        out(byte)
    }

    fn reset(&mut self) {
        self.state = TrimState::Outside;
    }
}
