//! Framed ring buffer
//!
//! A fixed-capacity circular byte store holding a FIFO of variable-length
//! frames. Each frame is stored as one length byte followed by its payload,
//! so the whole queue lives in a single `[u8; N]` with no allocation.
//!
//! Four cursors move over the storage:
//! - `head`: length byte of the oldest frame not yet acknowledged
//! - `read`: length byte of the next frame to hand to the transport
//! - `write`: length byte of the frame being appended, if one is open
//! - `tail`: next free byte
//!
//! In circular order `head <= read <= write-or-tail <= tail` always holds.
//! Frames between `head` and `read` have been sent and await an
//! acknowledgment; frames between `read` and the open frame are committed
//! but unsent. All cursor arithmetic lives in this module.

use crate::error::RingError;
use std::fmt;

/// Largest payload one frame can carry (its length is stored in one byte)
pub const MAX_FRAME_PAYLOAD: usize = u8::MAX as usize;

/// Free bytes an append requires: a length byte plus one payload byte
pub const MIN_APPEND_HEADROOM: usize = 2;

/// Fixed-capacity queue of length-prefixed frames
#[derive(Clone)]
pub struct FrameRing<const N: usize> {
    storage: [u8; N],
    head: usize,
    tail: usize,
    read: usize,
    write: Option<usize>,
    used: usize,
    count: usize,
    unsent: usize,
}

impl<const N: usize> FrameRing<N> {
    const VALID_CAPACITY: () = assert!(
        N >= MIN_APPEND_HEADROOM,
        "FrameRing needs room for a length byte and one payload byte"
    );

    /// Create an empty ring
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
            read: 0,
            write: None,
            used: 0,
            count: 0,
            unsent: 0,
        }
    }

    /// Total storage in bytes, including length bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of committed frames not yet removed by [`pop`](Self::pop)
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the ring holds no committed and no open frame
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.write.is_none()
    }

    /// Bytes occupied by frames, length bytes included
    pub fn bytes_used(&self) -> usize {
        self.used
    }

    /// Bytes still available for appends
    pub fn free(&self) -> usize {
        N - self.used
    }

    /// Committed frames at or after the read cursor
    pub fn unsent(&self) -> usize {
        self.unsent
    }

    /// Frames that were handed to the transport and wait for an acknowledgment
    pub fn awaiting_ack(&self) -> usize {
        self.count - self.unsent
    }

    /// Whether a frame is currently being appended
    pub fn has_open_frame(&self) -> bool {
        self.write.is_some()
    }

    /// Append one byte to the open frame, opening a new frame if needed
    ///
    /// On error nothing changes. [`RingError::Full`] is backpressure: drain
    /// the ring and retry the same byte.
    pub fn append(&mut self, byte: u8) -> Result<(), RingError> {
        if let Some(start) = self.write {
            if usize::from(self.storage[start]) >= MAX_FRAME_PAYLOAD {
                return Err(RingError::FrameTooLong {
                    limit: MAX_FRAME_PAYLOAD,
                });
            }
        }

        if self.free() < MIN_APPEND_HEADROOM {
            // Nothing committed means nothing a drain could ever free
            if self.count == 0 {
                return Err(RingError::FrameExceedsCapacity { capacity: N });
            }
            return Err(RingError::Full);
        }

        let start = match self.write {
            Some(start) => start,
            None => {
                let start = self.tail;
                self.push_byte(0);
                self.write = Some(start);
                start
            }
        };

        self.storage[start] += 1;
        self.push_byte(byte);
        Ok(())
    }

    /// Seal the open frame and queue it for transmission
    pub fn finish(&mut self) -> Result<(), RingError> {
        if self.write.take().is_none() {
            return Err(RingError::NoOpenFrame);
        }
        self.count += 1;
        self.unsent += 1;
        Ok(())
    }

    /// Drop the open frame and release its bytes
    pub fn discard_open(&mut self) -> Result<(), RingError> {
        let start = self.write.take().ok_or(RingError::NoOpenFrame)?;
        self.used -= 1 + usize::from(self.storage[start]);
        self.tail = start;
        Ok(())
    }

    /// Stream the frame at the read cursor to `emit` without moving the cursor
    ///
    /// Returns the payload length of the frame.
    pub fn read_next<F>(&self, mut emit: F) -> Result<usize, RingError>
    where
        F: FnMut(u8),
    {
        if self.unsent == 0 {
            return Err(RingError::NothingToSend);
        }

        let length = self.frame_len(self.read);
        for offset in 1..=length {
            emit(self.peek(self.read + offset));
        }
        Ok(length)
    }

    /// Mark the frame at the read cursor as sent
    pub fn advance_read(&mut self) -> Result<(), RingError> {
        if self.unsent == 0 {
            return Err(RingError::NothingToSend);
        }
        self.read = self.skip_frame(self.read);
        self.unsent -= 1;
        Ok(())
    }

    /// Move the read cursor back to the oldest unacknowledged frame
    ///
    /// Every frame still in the ring will be sent again, in order.
    pub fn rewind_read(&mut self) {
        self.read = self.head;
        self.unsent = self.count;
    }

    /// Remove the oldest frame, freeing its bytes
    pub fn pop(&mut self) -> Result<(), RingError> {
        if self.count == 0 {
            return Err(RingError::Empty);
        }

        let next = self.skip_frame(self.head);
        if self.awaiting_ack() == 0 {
            // The read cursor sits on the frame being removed
            self.read = next;
            self.unsent -= 1;
        }

        self.used -= 1 + self.frame_len(self.head);
        self.head = next;
        self.count -= 1;
        Ok(())
    }

    fn frame_len(&self, pos: usize) -> usize {
        usize::from(self.peek(pos))
    }

    fn skip_frame(&self, pos: usize) -> usize {
        (pos + 1 + self.frame_len(pos)) % N
    }

    fn peek(&self, pos: usize) -> u8 {
        self.storage[pos % N]
    }

    fn push_byte(&mut self, byte: u8) {
        self.storage[self.tail] = byte;
        self.tail = (self.tail + 1) % N;
        self.used += 1;
    }
}

impl<const N: usize> Default for FrameRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FrameRing<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRing")
            .field("capacity", &N)
            .field("head", &self.head)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("tail", &self.tail)
            .field("used", &self.used)
            .field("count", &self.count)
            .field("unsent", &self.unsent)
            .finish()
    }
}
