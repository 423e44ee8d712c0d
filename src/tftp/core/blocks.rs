use std::sync::Arc;

use super::packet::{BLOCK_SIZE, Packet};

/// One numbered slice of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub num: u16,
    pub data: Vec<u8>,
}

impl Block {
    pub fn is_last(&self) -> bool {
        self.data.len() < BLOCK_SIZE
    }

    pub fn to_packet(&self) -> Packet {
        Packet::Data {
            block_num: self.num,
            data: self.data.clone(),
        }
    }
}

/// Walks a shared payload and yields the blocks that carry it.
///
/// Blocks are numbered from 1 and wrap within `u16`. The last block is the
/// first one shorter than [`BLOCK_SIZE`]; a payload whose length is an exact
/// multiple of the block size therefore ends with an empty block.
pub struct Blocks {
    payload: Arc<[u8]>,
    offset: usize,
    block_num: u16,
    finished: bool,
}

impl Blocks {
    pub fn new(payload: Arc<[u8]>) -> Self {
        Self {
            payload,
            offset: 0,
            block_num: 1,
            finished: false,
        }
    }

    /// Number of DATA packets needed for a payload of `len` bytes.
    pub fn count_for(len: usize) -> u64 {
        (len / BLOCK_SIZE) as u64 + 1
    }
}

impl Iterator for Blocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.finished {
            return None;
        }

        let end = (self.offset + BLOCK_SIZE).min(self.payload.len());
        let data = self.payload[self.offset..end].to_vec();
        self.offset = end;

        let block = Block {
            num: self.block_num,
            data,
        };
        self.finished = block.is_last();
        self.block_num = self.block_num.wrapping_add(1);

        Some(block)
    }
}
