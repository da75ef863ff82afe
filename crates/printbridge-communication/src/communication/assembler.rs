//! Line assembly into the frame ring

use printbridge_core::{FrameRing, GcodeError, Result, RingError, MAX_FRAME_PAYLOAD};

/// Frames a rewritten byte stream into [`FrameRing`] entries, one per line
///
/// Each byte is appended to the open frame. A full ring runs the caller's
/// drain hook and retries the same byte, so the producer blocks until the
/// transmitter frees space. A newline seals the frame and drains again.
///
/// A line that cannot fit in one frame is dropped: the open frame is
/// discarded, the remaining bytes up to the next newline are skipped and
/// [`GcodeError::LineTooLong`] is returned.
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    skipping: bool,
    lines: u32,
}

impl LineAssembler {
    /// Create a new line assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines seen since the last reset, including dropped ones
    pub fn lines(&self) -> u32 {
        self.lines
    }

    /// Whether the rest of an oversized line is being skipped
    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Forget line counts and any line being skipped
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Push one byte into the ring
    pub fn push<const N: usize, D>(
        &mut self,
        ring: &mut FrameRing<N>,
        byte: u8,
        drain: &mut D,
    ) -> Result<()>
    where
        D: FnMut(&mut FrameRing<N>) -> Result<()>,
    {
        if self.skipping {
            if byte == b'\n' {
                self.skipping = false;
            }
            return Ok(());
        }

        loop {
            match ring.append(byte) {
                Ok(()) => break,
                Err(RingError::Full) => drain(ring)?,
                Err(RingError::FrameTooLong { .. } | RingError::FrameExceedsCapacity { .. }) => {
                    ring.discard_open()?;
                    self.lines += 1;
                    self.skipping = byte != b'\n';
                    let limit = MAX_FRAME_PAYLOAD.min(N.saturating_sub(1));
                    tracing::warn!("Line {} exceeds {} bytes, dropping it", self.lines, limit);
                    return Err(GcodeError::LineTooLong {
                        line_number: self.lines,
                        limit,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if byte == b'\n' {
            ring.finish()?;
            self.lines += 1;
            tracing::trace!("Committed line {} ({} frames queued)", self.lines, ring.len());
            drain(ring)?;
        }
        Ok(())
    }
}
