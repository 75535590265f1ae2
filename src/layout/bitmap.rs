// @author:    olinex
// @time:      2023/11/06

// self mods

// use other mods
use alloc::vec::Vec;
use bit_field::BitField;

// use self mods

/// The bit size of the bitmap unit which is related with the architecture
const BITMAP_UNIT_BIT_SIZE: usize = core::mem::size_of::<usize>() * 8;

/// The registry of the free blocks.
/// Each block owns one bit and a set bit means the block is free.
/// Bits are grouped into machine words so that scanning skips fully allocated regions quickly.
/// The registry is never persisted, it is rebuilt from the descriptor table when the file system is opened.
#[derive(Clone)]
pub struct FreeRegistry {
    units: Vec<usize>,
    used_bits: usize,
}
impl FreeRegistry {
    /// Decompress the bitmap index to:
    /// * unit index
    /// * bit offset
    fn decompress(bitmap_index: usize) -> (usize, usize) {
        (
            bitmap_index / BITMAP_UNIT_BIT_SIZE,
            bitmap_index % BITMAP_UNIT_BIT_SIZE,
        )
    }

    /// Create a new registry which all the blocks are free
    ///
    /// # Arguments
    /// * used_bits: the count of the blocks managed by the registry
    pub fn new(used_bits: usize) -> Self {
        let unit_count = (used_bits + BITMAP_UNIT_BIT_SIZE - 1) / BITMAP_UNIT_BIT_SIZE;
        let mut units = vec![0usize; unit_count];
        for bitmap_index in 0..used_bits {
            let (unit_index, bit_offset) = Self::decompress(bitmap_index);
            units[unit_index].set_bit(bit_offset, true);
        }
        Self { units, used_bits }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.used_bits
    }

    /// Check if the block is free, blocks out of the registry are never free
    pub fn is_free(&self, bitmap_index: usize) -> bool {
        if bitmap_index >= self.used_bits {
            return false;
        }
        let (unit_index, bit_offset) = Self::decompress(bitmap_index);
        self.units[unit_index].get_bit(bit_offset)
    }

    /// Set the free bit of the block
    ///
    /// # Arguments
    /// * bitmap_index: the index of the block
    /// * free: true if the block become free
    pub fn set_free(&mut self, bitmap_index: usize, free: bool) {
        assert!(bitmap_index < self.used_bits);
        let (unit_index, bit_offset) = Self::decompress(bitmap_index);
        self.units[unit_index].set_bit(bit_offset, free);
    }

    /// Find the lowest free block index
    ///
    /// # Returns
    /// * Some(bitmap index)
    /// * None: all blocks are allocated
    pub fn first_free(&self) -> Option<usize> {
        self.units
            .iter()
            .enumerate()
            .find(|(_, bits)| **bits != 0)
            .map(|(unit_index, bits)| {
                unit_index * BITMAP_UNIT_BIT_SIZE + bits.trailing_zeros() as usize
            })
    }

    /// Count the free blocks
    pub fn free_count(&self) -> usize {
        self.units
            .iter()
            .map(|bits| bits.count_ones() as usize)
            .sum()
    }
}
