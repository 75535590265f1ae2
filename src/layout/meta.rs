// @author:    olinex
// @time:      2023/12/04

// self mods

// use other mods
use alloc::vec::Vec;

// use self mods
use super::{BlockState, EntryFlags, InodeEntry};
use crate::configs::FsConfig;
use crate::{LFSError, Result};

const TERMINATOR: i32 = -1;
const FREE_MARKER: i32 = -1;
const DESCRIPTOR_BYTE_SIZE: usize = 2 * core::mem::size_of::<i32>();
/// flags + name length + size + first block, the name bytes come on top of it
const INODE_FIXED_BYTE_SIZE: usize = 2 + 2 * core::mem::size_of::<u32>();

/// The layout of the metadata region at the head of the backing store.
/// The region occupies the leading blocks of the device and is never handed out to files:
/// ```text
///   offset 0
///   +-----------------------------------------------+
///   | inode slot 0 | inode slot 1 | ... | slot n-1  |  max_files * inode slot size
///   +-----------------------------------------------+
///   | descriptor 0 | descriptor 1 | ... | desc m-1  |  capacity_blocks * 8
///   +-----------------------------------------------+
///   | zero padding up to the end of the last block  |
///   +-----------------------------------------------+
///
///   inode slot: | flags: u8 | name len: u8 | name: [u8; max_filename_length] | size: u32 | first block: u32 |
///   descriptor: | marker: i32 (self index or -1 when free) | next: i32 (-1 terminates) |
/// ```
/// All integers are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaLayout {
    inode_slot_size: usize,
    inode_table_size: usize,
    descriptor_table_size: usize,
    block_size: usize,
    max_files: usize,
    capacity_blocks: usize,
    max_filename_length: usize,
}
impl MetaLayout {
    pub fn new(config: &FsConfig) -> Self {
        let inode_slot_size = INODE_FIXED_BYTE_SIZE + config.max_filename_length;
        Self {
            inode_slot_size,
            inode_table_size: inode_slot_size * config.max_files,
            descriptor_table_size: DESCRIPTOR_BYTE_SIZE * config.capacity_blocks,
            block_size: config.block_size,
            max_files: config.max_files,
            capacity_blocks: config.capacity_blocks,
            max_filename_length: config.max_filename_length,
        }
    }

    /// The byte size of the serialized tables
    #[inline(always)]
    pub fn byte_size(&self) -> usize {
        self.inode_table_size + self.descriptor_table_size
    }

    /// The count of the leading blocks reserved for the metadata
    #[inline(always)]
    pub fn blocks(&self) -> usize {
        (self.byte_size() + self.block_size - 1) / self.block_size
    }

    fn encode_inode(&self, slot: &Option<InodeEntry>, buffer: &mut Vec<u8>) {
        let start = buffer.len();
        buffer.resize(start + self.inode_slot_size, 0);
        let bytes = &mut buffer[start..];
        if let Some(entry) = slot {
            let name = entry.name().as_bytes();
            let name_end = 2 + self.max_filename_length;
            bytes[0] = EntryFlags::VALID.bits();
            bytes[1] = name.len() as u8;
            bytes[2..2 + name.len()].copy_from_slice(name);
            bytes[name_end..name_end + 4].copy_from_slice(&(entry.size() as u32).to_le_bytes());
            bytes[name_end + 4..name_end + 8]
                .copy_from_slice(&(entry.first_block() as u32).to_le_bytes());
        }
    }

    fn decode_inode(&self, bytes: &[u8]) -> Result<Option<InodeEntry>> {
        let flags = EntryFlags::from_bits_truncate(bytes[0]);
        if !flags.is_valid() {
            return Ok(None);
        }
        let name_len = bytes[1] as usize;
        if name_len > self.max_filename_length {
            return Err(LFSError::NotValidStoreData);
        }
        let name = core::str::from_utf8(&bytes[2..2 + name_len])
            .map_err(|_| LFSError::NotValidStoreData)?;
        let name_end = 2 + self.max_filename_length;
        let size = read_u32(&bytes[name_end..name_end + 4]) as usize;
        let first_block = read_u32(&bytes[name_end + 4..name_end + 8]) as usize;
        if first_block >= self.capacity_blocks
            || size > self.capacity_blocks * self.block_size
        {
            return Err(LFSError::NotValidStoreData);
        }
        Ok(Some(InodeEntry::new(name, size, first_block)))
    }

    fn encode_descriptor(index: usize, state: &BlockState, buffer: &mut Vec<u8>) {
        let (marker, next) = match state {
            BlockState::Free => (FREE_MARKER, TERMINATOR),
            BlockState::Allocated { next } => (
                index as i32,
                next.map_or(TERMINATOR, |next| next as i32),
            ),
        };
        buffer.extend_from_slice(&marker.to_le_bytes());
        buffer.extend_from_slice(&next.to_le_bytes());
    }

    fn decode_descriptor(&self, index: usize, bytes: &[u8]) -> Result<BlockState> {
        let marker = read_u32(&bytes[0..4]) as i32;
        let next = read_u32(&bytes[4..8]) as i32;
        match (marker, next) {
            (FREE_MARKER, TERMINATOR) => Ok(BlockState::Free),
            (marker, TERMINATOR) if marker as usize == index => {
                Ok(BlockState::Allocated { next: None })
            }
            (marker, next)
                if marker as usize == index
                    && next >= 0
                    && (next as usize) < self.capacity_blocks =>
            {
                Ok(BlockState::Allocated {
                    next: Some(next as usize),
                })
            }
            _ => Err(LFSError::NotValidStoreData),
        }
    }

    /// Serialize the inode slots followed by the block descriptors
    ///
    /// # Returns
    /// * Vec<u8>: exactly [`MetaLayout::byte_size`] bytes
    pub fn encode(&self, slots: &[Option<InodeEntry>], states: &[BlockState]) -> Vec<u8> {
        assert_eq!(self.max_files, slots.len());
        assert_eq!(self.capacity_blocks, states.len());
        let mut buffer = Vec::with_capacity(self.byte_size());
        for slot in slots {
            self.encode_inode(slot, &mut buffer);
        }
        for (index, state) in states.iter().enumerate() {
            Self::encode_descriptor(index, state, &mut buffer);
        }
        buffer
    }

    /// Deserialize the metadata region
    ///
    /// # Arguments
    /// * bytes: the leading [`MetaLayout::byte_size`] bytes of the backing store
    ///
    /// # Returns
    /// * Ok((inode slots, block states))
    /// * Err(NotValidStoreData)
    pub fn decode(&self, bytes: &[u8]) -> Result<(Vec<Option<InodeEntry>>, Vec<BlockState>)> {
        if bytes.len() < self.byte_size() {
            return Err(LFSError::NotValidStoreData);
        }
        let (inode_bytes, descriptor_bytes) = bytes.split_at(self.inode_table_size);
        let slots = inode_bytes
            .chunks_exact(self.inode_slot_size)
            .map(|chunk| self.decode_inode(chunk))
            .collect::<Result<Vec<_>>>()?;
        let states = descriptor_bytes
            .chunks_exact(DESCRIPTOR_BYTE_SIZE)
            .take(self.capacity_blocks)
            .enumerate()
            .map(|(index, chunk)| self.decode_descriptor(index, chunk))
            .collect::<Result<Vec<_>>>()?;
        Ok((slots, states))
    }
}

#[inline(always)]
fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_layout_sizes() {
        let layout = MetaLayout::new(&FsConfig::default());
        assert_eq!(21, layout.inode_slot_size);
        assert_eq!(105, layout.inode_table_size);
        assert_eq!(80, layout.descriptor_table_size);
        assert_eq!(185, layout.byte_size());
        assert_eq!(2, layout.blocks());

        let layout = MetaLayout::new(&FsConfig::new(4096, 100, 10, 11));
        assert_eq!(1, layout.blocks());
    }

    #[test]
    fn test_meta_layout_encode_bytes() {
        let config = FsConfig::new(128, 4, 2, 3);
        let layout = MetaLayout::new(&config);
        let slots = vec![None, Some(InodeEntry::new("ab", 300, 2))];
        let states = vec![
            BlockState::Allocated { next: None },
            BlockState::Free,
            BlockState::Allocated { next: Some(3) },
            BlockState::Allocated { next: None },
        ];
        let bytes = layout.encode(&slots, &states);
        assert_eq!(layout.byte_size(), bytes.len());
        // empty slot
        assert_eq!([0u8; 13], bytes[0..13]);
        // file slot
        assert_eq!(
            [1, 2, b'a', b'b', 0, 44, 1, 0, 0, 2, 0, 0, 0],
            bytes[13..26]
        );
        // descriptors
        assert_eq!([0, 0, 0, 0, 255, 255, 255, 255], bytes[26..34]);
        assert_eq!([255, 255, 255, 255, 255, 255, 255, 255], bytes[34..42]);
        assert_eq!([2, 0, 0, 0, 3, 0, 0, 0], bytes[42..50]);
        assert_eq!([3, 0, 0, 0, 255, 255, 255, 255], bytes[50..58]);

        assert!(layout.decode(&bytes).is_ok_and(|(decoded_slots, decoded_states)| {
            decoded_slots == slots && decoded_states == states
        }));
    }

    #[test]
    fn test_meta_layout_decode_rejects_garbage() {
        let config = FsConfig::new(128, 2, 1, 3);
        let layout = MetaLayout::new(&config);
        let states = vec![BlockState::Allocated { next: None }, BlockState::Free];
        let bytes = layout.encode(&[None], &states);
        assert!(layout.decode(&bytes[..bytes.len() - 1]).is_err_and(|e| e.is_notvalidstoredata()));

        // descriptor 1 claims to be block 0
        let mut broken = bytes.clone();
        broken[layout.inode_table_size + 8..layout.inode_table_size + 12]
            .copy_from_slice(&0i32.to_le_bytes());
        assert!(layout.decode(&broken).is_err_and(|e| e.is_notvalidstoredata()));

        // name longer than the limit
        let mut broken = bytes.clone();
        broken[0] = EntryFlags::VALID.bits();
        broken[1] = 4;
        assert!(layout.decode(&broken).is_err_and(|e| e.is_notvalidstoredata()));

        // first block out of the device
        let mut broken = bytes;
        broken[0] = EntryFlags::VALID.bits();
        broken[1] = 1;
        broken[2] = b'a';
        broken[9..13].copy_from_slice(&7u32.to_le_bytes());
        assert!(layout.decode(&broken).is_err_and(|e| e.is_notvalidstoredata()));
    }
}
