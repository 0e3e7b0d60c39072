//! Reassembly buffer for fragmented messages.
//!
//! Grounded on `websocket_service.c`'s `struct cache` and
//! `app_websocket_recive_data`'s growth logic: a single growable buffer
//! bounded by `cache_size_max`, growing in 1 KiB blocks using spec.md
//! §4.G's stated ceiling-division formula
//! `blocks = ceil((remain_len - free_space) / 1024)` rather than the
//! original's off-by-one growth check.

use crate::error::Error;
use crate::frame::OpCode;

const GROWTH_BLOCK: usize = 1024;

#[derive(Debug)]
pub struct ReassemblyBuffer {
    data: Vec<u8>,
    max_size: usize,
    in_progress: bool,
    message_type: Option<OpCode>,
}

impl ReassemblyBuffer {
    pub fn new(initial_capacity: usize, max_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(initial_capacity),
            max_size,
            in_progress: false,
            message_type: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Begins a new fragmented message, remembering its data opcode
    /// (Text/Binary) so `finish` can hand back a frame of the right kind.
    pub fn begin(&mut self, opcode: OpCode) -> Result<(), Error> {
        if self.in_progress {
            return Err(Error::FragmentedInProgress);
        }
        self.in_progress = true;
        self.message_type = Some(opcode);
        self.data.clear();
        Ok(())
    }

    /// Appends `chunk`, growing the backing buffer in [`GROWTH_BLOCK`]-sized
    /// increments when the current free space can't hold it, per spec.md
    /// §4.G's formula. Fails once `max_size` would be exceeded.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), Error> {
        if !self.in_progress {
            return Err(Error::InvalidContinuationFrame);
        }

        let remain_len = self.data.len() + chunk.len();
        if remain_len > self.max_size {
            return Err(Error::MaxMessageSize(remain_len, self.max_size));
        }

        let free_space = self.data.capacity() - self.data.len();
        if chunk.len() > free_space {
            let blocks = ((chunk.len() - free_space) as f64 / GROWTH_BLOCK as f64).ceil() as usize;
            self.data.reserve(blocks * GROWTH_BLOCK);
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Finalizes the in-progress message and hands back its opcode and
    /// bytes, resetting the buffer for the next fragmented message.
    pub fn finish(&mut self) -> Result<(OpCode, Vec<u8>), Error> {
        if !self.in_progress {
            return Err(Error::InvalidContinuationFrame);
        }
        self.in_progress = false;
        let opcode = self.message_type.take().unwrap_or(OpCode::Binary);
        Ok((opcode, std::mem::take(&mut self.data)))
    }
}
