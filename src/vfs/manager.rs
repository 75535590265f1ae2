// @author:    olinex
// @time:      2023/12/05

// self mods

// use other mods
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

// use self mods
use crate::block::{BlockDevice, BlockStore};
use crate::configs::FsConfig;
use crate::layout::{DescriptorTable, InodeTable, MetaLayout};
use crate::{LFSError, Result};

/// The main struct of the file system.
/// It owns the block store and all the tables describing it, and is not synchronized by itself:
/// callers must serialize mutating calls, see [`super::SharedFileSystem`].
///
/// Each file owns a chain of blocks linked by the descriptor table.
/// The content of a file is always replaced as a whole, and the chain is rebuilt on every write.
pub struct FileSystemManager {
    config: FsConfig,
    layout: MetaLayout,
    store: BlockStore,
    descriptors: DescriptorTable,
    inodes: InodeTable,
}
impl FileSystemManager {
    /// Initialize a new file system on the device.
    /// * First: check the geometry and compute the metadata region
    /// * Second: clear all blocks of the device
    /// * Third: write the empty tables into the metadata region
    ///
    /// # Arguments
    /// * device: the backing device
    /// * config: the geometry of the file system
    ///
    /// # Returns
    /// * Ok(FileSystemManager)
    /// * Err(InvalidConfig | IoFailure(code))
    pub fn format(device: &Arc<dyn BlockDevice>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        let layout = MetaLayout::new(&config);
        let store = BlockStore::new(device, config.block_size, config.capacity_blocks)?;
        for block_index in 0..config.capacity_blocks {
            store.clear_block(block_index)?;
        }
        let manager = Self {
            config,
            layout,
            store,
            descriptors: DescriptorTable::new(config.capacity_blocks, layout.blocks()),
            inodes: InodeTable::new(config.max_files, config.max_filename_length),
        };
        manager.sync_meta()?;
        info!(
            "format file system: {} blocks of {} bytes, {} metadata blocks, {} inode slots",
            config.capacity_blocks,
            config.block_size,
            layout.blocks(),
            config.max_files
        );
        Ok(manager)
    }

    /// Open a formatted device by the metadata region stored in its leading blocks.
    /// The free registry is rebuilt from the descriptors and every chain is verified.
    ///
    /// # Arguments
    /// * device: the backing device
    /// * config: the geometry the device was formatted with
    ///
    /// # Returns
    /// * Ok(FileSystemManager)
    /// * Err(InvalidConfig | NotValidStoreData | IoFailure(code))
    pub fn open(device: &Arc<dyn BlockDevice>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        let layout = MetaLayout::new(&config);
        let store = BlockStore::new(device, config.block_size, config.capacity_blocks)?;
        let mut bytes = vec![0u8; layout.byte_size()];
        store.read_raw(&mut bytes)?;
        let (slots, states) = layout.decode(&bytes)?;
        let manager = Self {
            config,
            layout,
            store,
            descriptors: DescriptorTable::from_states(states)?,
            inodes: InodeTable::from_slots(slots, config.max_filename_length)?,
        };
        manager.check_consistency().map_err(|err| {
            warn!("reject backing store: {}", err);
            LFSError::NotValidStoreData
        })?;
        info!(
            "open file system: {} files, {} free blocks",
            manager.inodes.entries().count(),
            manager.free_count()
        );
        Ok(manager)
    }

    /// Open the device, or format it if it does not hold a file system yet
    ///
    /// # Returns
    /// * Ok(FileSystemManager)
    /// * Err(InvalidConfig | IoFailure(code))
    pub fn open_or_format(device: &Arc<dyn BlockDevice>, config: FsConfig) -> Result<Self> {
        match Self::open(device, config) {
            Err(LFSError::NotValidStoreData) => {
                warn!("no valid file system found in backing store, formatting");
                Self::format(device, config)
            }
            other => other,
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The count of the leading blocks reserved for the metadata region
    #[inline(always)]
    pub fn metadata_blocks(&self) -> usize {
        self.layout.blocks()
    }

    /// Count the free blocks
    #[inline(always)]
    pub fn free_count(&self) -> usize {
        self.descriptors.free_count()
    }

    /// Calculate the count of blocks needed to hold the bytes,
    /// an empty file still needs one block
    fn blocks_needed(&self, byte_size: usize) -> usize {
        let block_size = self.config.block_size;
        core::cmp::max(1, (byte_size + block_size - 1) / block_size)
    }

    /// Write the inode table and the descriptor table back to the metadata region
    fn sync_meta(&self) -> Result<()> {
        let bytes = self
            .layout
            .encode(self.inodes.slots(), self.descriptors.states());
        self.store.write_raw(&bytes)?;
        self.store.flush()
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.len() > self.config.max_filename_length {
            Err(LFSError::FilenameTooLong(
                name.to_string(),
                self.config.max_filename_length,
            ))
        } else {
            Ok(())
        }
    }

    /// Find the inode slot of the file
    ///
    /// # Returns
    /// * Ok(slot index)
    /// * Err(FilenameTooLong | NotFound)
    fn slot_of(&self, name: &str) -> Result<usize> {
        self.check_name(name)?;
        self.inodes
            .find(name)
            .ok_or_else(|| LFSError::NotFound(name.to_string()))
    }

    /// Release every block of the file and clear the released blocks,
    /// the size of the file becomes zero and its head block is dangling until the caller rewrites or removes it.
    ///
    /// # Returns
    /// * Ok(released block count)
    /// * Err(InvariantViolation | OutOfRange(block index) | IoFailure(code))
    fn free_all(&mut self, slot_index: usize) -> Result<usize> {
        let entry = self
            .inodes
            .get_mut(slot_index)
            .ok_or(LFSError::InvariantViolation("free empty inode slot", slot_index))?;
        let first_block = entry.first_block();
        let chain = self.descriptors.collect_chain(first_block)?;
        entry.set_content(0, first_block);
        for block_index in chain.iter() {
            self.descriptors.free_block(*block_index)?;
            self.store.clear_block(*block_index)?;
        }
        Ok(chain.len())
    }

    /// Create a new empty file, which takes the lowest free block as its head block.
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(FilenameTooLong | AlreadyExists | TableFull | DeviceFull | IoFailure(code))
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        self.inodes.check_insert(name)?;
        let block_index = self.descriptors.allocate_block()?;
        self.inodes.insert(name, 0, block_index)?;
        self.sync_meta()?;
        info!("create file '{}' at block {}", name, block_index);
        Ok(())
    }

    /// Delete the file and release all of its blocks
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(FilenameTooLong | NotFound | InvariantViolation | IoFailure(code))
    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let slot_index = self.slot_of(name)?;
        let released = self.free_all(slot_index)?;
        self.inodes.remove(slot_index);
        self.sync_meta()?;
        info!("delete file '{}', {} blocks released", name, released);
        Ok(())
    }

    /// Replace the whole content of the file.
    /// The write is admitted only if the blocks of the file plus the free blocks can hold the content,
    /// otherwise nothing is changed.
    /// The new chain is built from the lowest free blocks in content order.
    ///
    /// If the device fails in the middle of the write, some blocks may already be rewritten.
    ///
    /// # Arguments
    /// * name: the name of the file
    /// * contents: the new content of the file
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(FilenameTooLong | NotFound | FileTooLarge(needed, available) | InvariantViolation | IoFailure(code))
    pub fn write_file(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        let slot_index = self.slot_of(name)?;
        let first_block = self
            .inodes
            .get(slot_index)
            .map(|entry| entry.first_block())
            .ok_or(LFSError::InvariantViolation("empty inode slot", slot_index))?;
        let current_blocks = self.descriptors.collect_chain(first_block)?.len();
        let needed_blocks = self.blocks_needed(contents.len());
        let available_blocks = self.free_count() + current_blocks;
        if needed_blocks > available_blocks {
            warn!(
                "refuse to write {} bytes into '{}': {} blocks needed, {} available",
                contents.len(),
                name,
                needed_blocks,
                available_blocks
            );
            return Err(LFSError::FileTooLarge(needed_blocks, available_blocks));
        }

        self.free_all(slot_index)?;
        let mut chain = Vec::with_capacity(needed_blocks);
        for _ in 0..needed_blocks {
            chain.push(self.descriptors.allocate_block()?);
        }
        for pair in chain.windows(2) {
            self.descriptors.link_next(pair[0], pair[1])?;
        }
        for (block_index, slice) in chain
            .iter()
            .zip(contents.chunks(self.config.block_size))
        {
            self.store.write_block(*block_index, slice)?;
        }
        self.inodes
            .get_mut(slot_index)
            .ok_or(LFSError::InvariantViolation("empty inode slot", slot_index))?
            .set_content(contents.len(), chain[0]);
        self.sync_meta()?;
        info!(
            "write {} bytes into '{}' across blocks {:?}",
            contents.len(),
            name,
            chain
        );
        Ok(())
    }

    /// Read the whole content of the file
    ///
    /// # Returns
    /// * Ok(content): exactly the size of the file
    /// * Err(FilenameTooLong | NotFound | InvariantViolation | IoFailure(code))
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let slot_index = self.slot_of(name)?;
        let entry = self
            .inodes
            .get(slot_index)
            .ok_or(LFSError::InvariantViolation("empty inode slot", slot_index))?;
        let size = entry.size();
        let chain = self.descriptors.collect_chain(entry.first_block())?;
        if chain.len() != self.blocks_needed(size) {
            error!(
                "file '{}' of {} bytes owns {} blocks",
                name,
                size,
                chain.len()
            );
            return Err(LFSError::InvariantViolation(
                "chain length mismatches file size",
                entry.first_block(),
            ));
        }
        let mut buffer = vec![0u8; size];
        for (block_index, slice) in chain
            .iter()
            .zip(buffer.chunks_mut(self.config.block_size))
        {
            self.store.read_block_into(*block_index, slice)?;
        }
        Ok(buffer)
    }

    /// List the names of all files in ascending inode slot order
    pub fn list_files(&self) -> Vec<String> {
        self.inodes.list_names()
    }

    /// Get the byte size of the file
    ///
    /// # Returns
    /// * Ok(byte size)
    /// * Err(FilenameTooLong | NotFound)
    pub fn file_size(&self, name: &str) -> Result<usize> {
        let slot_index = self.slot_of(name)?;
        Ok(self.inodes.get(slot_index).map_or(0, |entry| entry.size()))
    }

    /// Get the block chain of the file
    ///
    /// # Returns
    /// * Ok(Vec<block index>)
    /// * Err(FilenameTooLong | NotFound | InvariantViolation)
    pub fn file_blocks(&self, name: &str) -> Result<Vec<usize>> {
        let slot_index = self.slot_of(name)?;
        let first_block = self
            .inodes
            .get(slot_index)
            .map(|entry| entry.first_block())
            .ok_or(LFSError::InvariantViolation("empty inode slot", slot_index))?;
        self.descriptors.collect_chain(first_block)
    }

    /// Verify the invariants between all tables:
    /// * the free registry agrees with the descriptors
    /// * the metadata chain covers exactly the leading reserved blocks
    /// * each file chain matches the file size and no block is shared by two chains
    /// * free blocks + file blocks + metadata blocks == capacity blocks
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(InvariantViolation | OutOfRange(block index))
    pub fn check_consistency(&self) -> Result<()> {
        self.descriptors.check_registry()?;
        let mut owned = vec![false; self.config.capacity_blocks];
        let meta_chain = self.descriptors.collect_chain(0)?;
        if meta_chain.len() != self.metadata_blocks()
            || meta_chain.iter().enumerate().any(|(i, b)| i != *b)
        {
            return Err(LFSError::InvariantViolation("broken metadata chain", 0));
        }
        let mut owned_count = meta_chain.len();
        meta_chain.iter().for_each(|b| owned[*b] = true);
        for entry in self.inodes.entries() {
            let chain = self.descriptors.collect_chain(entry.first_block())?;
            if chain.len() != self.blocks_needed(entry.size()) {
                return Err(LFSError::InvariantViolation(
                    "chain length mismatches file size",
                    entry.first_block(),
                ));
            }
            for block_index in chain {
                if owned[block_index] {
                    return Err(LFSError::InvariantViolation("block shared by chains", block_index));
                }
                owned[block_index] = true;
                owned_count += 1;
            }
        }
        if owned_count + self.free_count() != self.config.capacity_blocks {
            return Err(LFSError::InvariantViolation(
                "allocated block owned by no file",
                (0..self.config.capacity_blocks)
                    .find(|b| self.descriptors.is_allocated(*b) && !owned[*b])
                    .unwrap_or(0),
            ));
        }
        Ok(())
    }
}
