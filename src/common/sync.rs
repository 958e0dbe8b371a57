// src/common/sync.rs

use heapless::Vec;
use log::debug;

/// Capacity of the accumulation/staging buffers: the longest data frame of
/// any supported sensor family (the ToF module's 16-byte UART frame).
pub const MAX_DATA_FRAME_LEN: usize = 16;

/// Completed-frame buffer handed out by the synchronizer.
pub type RawFrame = Vec<u8, MAX_DATA_FRAME_LEN>;

/// Byte-stream frame synchronizer.
///
/// Consumes one byte at a time (delivered by the serial receive interrupt),
/// accumulates into a fixed-length buffer, and re-derives frame alignment
/// from the position of the header byte: a non-header byte arriving while
/// the buffer is empty is discarded, so the machine locks onto the next true
/// frame boundary after line noise. A header-valued byte *inside* a frame is
/// deliberately not treated as a boundary: payload bytes may legitimately
/// equal the header sentinel, and rescanning would change the framing
/// semantics.
///
/// State is fully described by the buffer fill level: empty (awaiting
/// header), partially filled (accumulating), full (frame complete, handed
/// out by [`push`](Self::push), buffer cleared for the next frame).
///
/// This type runs in the producer/interrupt context: `push` never blocks
/// and never takes a lock.
#[derive(Debug)]
pub struct FrameSynchronizer {
    header: u8,
    frame_len: usize,
    buf: RawFrame,
}

impl FrameSynchronizer {
    /// Creates a synchronizer for frames starting with `header` and exactly
    /// `frame_len` bytes long.
    ///
    /// # Panics
    ///
    /// Panics if `frame_len` is zero or exceeds [`MAX_DATA_FRAME_LEN`].
    /// Frame lengths are per-family compile-time constants, so this is a
    /// construction-time programming error, not a runtime condition.
    pub fn new(header: u8, frame_len: usize) -> Self {
        assert!(frame_len > 0 && frame_len <= MAX_DATA_FRAME_LEN);
        FrameSynchronizer { header, frame_len, buf: Vec::new() }
    }

    /// Number of bytes accumulated towards the current frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feeds one received byte; returns the completed frame when `byte` was
    /// its final byte.
    pub fn push(&mut self, byte: u8) -> Option<RawFrame> {
        // Capacity is frame_len <= MAX_DATA_FRAME_LEN by construction.
        let _ = self.buf.push(byte);

        if self.buf.len() == 1 && byte != self.header {
            debug!(
                "discarding stray byte {:#04x} while awaiting header {:#04x}",
                byte, self.header
            );
            self.buf.clear();
            return None;
        }

        if self.buf.len() == self.frame_len {
            let frame = self.buf.clone();
            self.buf.clear();
            debug!("frame complete: {:02x?}", frame.as_slice());
            return Some(frame);
        }

        None
    }

    /// Drops any partially accumulated frame and returns to awaiting a
    /// header byte.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
