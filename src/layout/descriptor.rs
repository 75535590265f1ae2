// @author:    olinex
// @time:      2023/12/02

// self mods

// use other mods
use alloc::vec::Vec;

// use self mods
use super::FreeRegistry;
use crate::{LFSError, Result};

/// The state of a single block.
/// Allocated blocks belong to exactly one chain, `next` is the following block of the chain
/// or `None` if the block is the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Allocated { next: Option<usize> },
}
impl BlockState {
    #[inline(always)]
    pub fn is_free(&self) -> bool {
        matches!(self, BlockState::Free)
    }

    #[inline(always)]
    pub fn next(&self) -> Option<usize> {
        match self {
            BlockState::Free => None,
            BlockState::Allocated { next } => *next,
        }
    }
}

/// The block descriptor table, one descriptor for each block of the device.
/// The free registry is kept next to the descriptors and every state change goes through this table,
/// so the two views can never disagree.
///
/// ```text
///   index:     0      1      2      3      4      5
///           +------+------+------+------+------+------+
///   state:  | A(1) | A(-) | A(4) | Free | A(-) | Free |
///           +------+------+------+------+------+------+
///            \____meta___/ \___file chain 2->4__/
/// ```
pub struct DescriptorTable {
    states: Vec<BlockState>,
    registry: FreeRegistry,
}
impl DescriptorTable {
    /// Create a new descriptor table,
    /// the leading reserved blocks are linked as one chain and all others are free.
    ///
    /// # Arguments
    /// * capacity_blocks: the count of the blocks
    /// * reserved_blocks: the count of the leading blocks used by the metadata region
    pub fn new(capacity_blocks: usize, reserved_blocks: usize) -> Self {
        assert!(reserved_blocks <= capacity_blocks);
        let mut states = vec![BlockState::Free; capacity_blocks];
        let mut registry = FreeRegistry::new(capacity_blocks);
        for index in 0..reserved_blocks {
            let next = if index + 1 < reserved_blocks {
                Some(index + 1)
            } else {
                None
            };
            states[index] = BlockState::Allocated { next };
            registry.set_free(index, false);
        }
        Self { states, registry }
    }

    /// Rebuild the descriptor table from the states loaded from the backing store.
    /// The free registry is derived from the states.
    ///
    /// # Returns
    /// * Ok(DescriptorTable)
    /// * Err(NotValidStoreData): some block points out of the table or to a free block
    pub fn from_states(states: Vec<BlockState>) -> Result<Self> {
        let mut registry = FreeRegistry::new(states.len());
        for (index, state) in states.iter().enumerate() {
            match state {
                BlockState::Free => {}
                BlockState::Allocated { next } => {
                    if let Some(next) = next {
                        if states.get(*next).map_or(true, |s| s.is_free()) {
                            return Err(LFSError::NotValidStoreData);
                        }
                    }
                    registry.set_free(index, false);
                }
            }
        }
        Ok(Self { states, registry })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline(always)]
    pub fn states(&self) -> &[BlockState] {
        &self.states
    }

    /// Get the state of the block
    ///
    /// # Returns
    /// * Ok(BlockState)
    /// * Err(OutOfRange(block index))
    pub fn state(&self, block_index: usize) -> Result<BlockState> {
        self.states
            .get(block_index)
            .copied()
            .ok_or(LFSError::OutOfRange(block_index))
    }

    pub fn is_allocated(&self, block_index: usize) -> bool {
        self.states
            .get(block_index)
            .is_some_and(|state| !state.is_free())
    }

    /// Count the free blocks
    pub fn free_count(&self) -> usize {
        self.registry.free_count()
    }

    /// Allocate the free block with the lowest index, the new block is the end of a chain.
    ///
    /// # Returns
    /// * Ok(block index)
    /// * Err(DeviceFull)
    pub fn allocate_block(&mut self) -> Result<usize> {
        let block_index = self.registry.first_free().ok_or(LFSError::DeviceFull)?;
        if !self.states[block_index].is_free() {
            error!("block {} is registered free but allocated", block_index);
            return Err(LFSError::InvariantViolation(
                "free registry drifted from descriptors",
                block_index,
            ));
        }
        self.states[block_index] = BlockState::Allocated { next: None };
        self.registry.set_free(block_index, false);
        debug!("allocate block {}", block_index);
        Ok(block_index)
    }

    /// Deallocate a block.
    /// Freeing a block which is already free means the chains are broken.
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(OutOfRange(block index) | InvariantViolation)
    pub fn free_block(&mut self, block_index: usize) -> Result<()> {
        if self.state(block_index)?.is_free() {
            error!("block {} was freed twice", block_index);
            return Err(LFSError::InvariantViolation("double free", block_index));
        }
        self.states[block_index] = BlockState::Free;
        self.registry.set_free(block_index, true);
        debug!("free block {}", block_index);
        Ok(())
    }

    /// Link the `to` block after the `from` block
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(OutOfRange(block index) | InvariantViolation)
    pub fn link_next(&mut self, from: usize, to: usize) -> Result<()> {
        if self.state(from)?.is_free() {
            return Err(LFSError::InvariantViolation("link from free block", from));
        }
        if self.state(to)?.is_free() {
            return Err(LFSError::InvariantViolation("link to free block", to));
        }
        self.states[from] = BlockState::Allocated { next: Some(to) };
        Ok(())
    }

    /// Iterate over the chain which starts at the block
    ///
    /// # Arguments
    /// * first: the first block of the chain
    pub fn chain_of(&self, first: usize) -> ChainIter<'_> {
        ChainIter {
            table: self,
            current: Some(first),
            visited: 0,
        }
    }

    /// Collect the whole chain which starts at the block
    ///
    /// # Returns
    /// * Ok(Vec<block index>)
    /// * Err(OutOfRange(block index) | InvariantViolation)
    pub fn collect_chain(&self, first: usize) -> Result<Vec<usize>> {
        self.chain_of(first).collect()
    }

    /// Check every block is free in the registry if and only if its descriptor is free
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(InvariantViolation)
    pub fn check_registry(&self) -> Result<()> {
        for (block_index, state) in self.states.iter().enumerate() {
            if state.is_free() != self.registry.is_free(block_index) {
                return Err(LFSError::InvariantViolation(
                    "free registry drifted from descriptors",
                    block_index,
                ));
            }
        }
        Ok(())
    }
}

/// The lazy iterator over a chain of blocks.
/// The iteration stops with an error when the chain reaches a free block or contains a cycle.
pub struct ChainIter<'a> {
    table: &'a DescriptorTable,
    current: Option<usize>,
    visited: usize,
}
impl<'a> Iterator for ChainIter<'a> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let block_index = self.current.take()?;
        self.visited += 1;
        if self.visited > self.table.len() {
            return Some(Err(LFSError::InvariantViolation("cyclic chain", block_index)));
        }
        match self.table.state(block_index) {
            Ok(BlockState::Allocated { next }) => {
                self.current = next;
                Some(Ok(block_index))
            }
            Ok(BlockState::Free) => Some(Err(LFSError::InvariantViolation(
                "chain reaches free block",
                block_index,
            ))),
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_new() {
        let table = DescriptorTable::new(10, 2);
        assert_eq!(10, table.len());
        assert_eq!(8, table.free_count());
        assert!(table
            .state(0)
            .is_ok_and(|s| s == BlockState::Allocated { next: Some(1) }));
        assert!(table
            .state(1)
            .is_ok_and(|s| s == BlockState::Allocated { next: None }));
        assert!(table.state(2).is_ok_and(|s| s.is_free()));
        assert!(table.state(10).is_err_and(|e| e.is_outofrange()));
        assert!(table.collect_chain(0).is_ok_and(|chain| chain == vec![0, 1]));
        assert!(table.check_registry().is_ok());
    }

    #[test]
    fn test_descriptor_table_allocate_lowest_first() {
        let mut table = DescriptorTable::new(6, 2);
        assert!(table.allocate_block().is_ok_and(|i| i == 2));
        assert!(table.allocate_block().is_ok_and(|i| i == 3));
        assert!(table.allocate_block().is_ok_and(|i| i == 4));
        assert!(table.free_block(3).is_ok());
        assert!(table.allocate_block().is_ok_and(|i| i == 3));
        assert!(table.allocate_block().is_ok_and(|i| i == 5));
        assert!(table.allocate_block().is_err_and(|e| e.is_devicefull()));
        assert_eq!(0, table.free_count());
        assert!(table.check_registry().is_ok());
    }

    #[test]
    fn test_descriptor_table_free_block() {
        let mut table = DescriptorTable::new(6, 2);
        let block_index = table.allocate_block().unwrap();
        assert!(table.free_block(block_index).is_ok());
        assert!(table
            .free_block(block_index)
            .is_err_and(|e| e.is_invariantviolation()));
        assert!(table.free_block(6).is_err_and(|e| e.is_outofrange()));
        assert_eq!(4, table.free_count());
    }

    #[test]
    fn test_descriptor_table_link_and_chain() {
        let mut table = DescriptorTable::new(8, 1);
        let a = table.allocate_block().unwrap();
        let b = table.allocate_block().unwrap();
        let c = table.allocate_block().unwrap();
        assert!(table.link_next(a, c).is_ok());
        assert!(table.link_next(c, b).is_ok());
        assert!(table
            .collect_chain(a)
            .is_ok_and(|chain| chain == vec![1, 3, 2]));
        assert_eq!(3, table.chain_of(a).count());
        assert!(table.link_next(a, 7).is_err_and(|e| e.is_invariantviolation()));
        assert!(table.link_next(6, a).is_err_and(|e| e.is_invariantviolation()));
        assert!(table.link_next(a, 8).is_err_and(|e| e.is_outofrange()));
    }

    #[test]
    fn test_descriptor_table_chain_detects_corruption() {
        let mut table = DescriptorTable::new(8, 1);
        let a = table.allocate_block().unwrap();
        let b = table.allocate_block().unwrap();
        assert!(table.link_next(a, b).is_ok());
        assert!(table.link_next(b, a).is_ok());
        assert!(table
            .collect_chain(a)
            .is_err_and(|e| e.is_invariantviolation()));
        assert!(table
            .collect_chain(5)
            .is_err_and(|e| e.is_invariantviolation()));
    }

    #[test]
    fn test_descriptor_table_from_states() {
        let states = vec![
            BlockState::Allocated { next: None },
            BlockState::Allocated { next: Some(3) },
            BlockState::Free,
            BlockState::Allocated { next: None },
        ];
        let table = DescriptorTable::from_states(states).unwrap();
        assert_eq!(1, table.free_count());
        assert!(table.check_registry().is_ok());
        assert!(table.collect_chain(1).is_ok_and(|chain| chain == vec![1, 3]));

        let states = vec![
            BlockState::Allocated { next: Some(1) },
            BlockState::Free,
        ];
        assert!(DescriptorTable::from_states(states).is_err_and(|e| e.is_notvalidstoredata()));
        let states = vec![BlockState::Allocated { next: Some(9) }];
        assert!(DescriptorTable::from_states(states).is_err_and(|e| e.is_notvalidstoredata()));
    }
}
