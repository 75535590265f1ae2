// @author:    olinex
// @time:      2023/12/03

// self mods

// use other mods
use alloc::string::{String, ToString};
use alloc::vec::Vec;

// use self mods
use crate::{LFSError, Result};

bitflags! {
    /// Flags of an inode slot stored in the metadata region
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        const VALID = 1 << 0;
    }
}
impl EntryFlags {
    /// Check if the slot holds a file
    pub fn is_valid(&self) -> bool {
        self.contains(EntryFlags::VALID)
    }
}

/// The meta information of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeEntry {
    name: String,
    /// The byte size of the file raw data
    size: usize,
    /// The head of the block chain, even an empty file owns this block
    first_block: usize,
}
impl InodeEntry {
    pub fn new(name: &str, size: usize, first_block: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
            first_block,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn first_block(&self) -> usize {
        self.first_block
    }

    pub fn set_content(&mut self, size: usize, first_block: usize) {
        self.size = size;
        self.first_block = first_block;
    }
}

/// The fixed size inode table, a slot is either empty or holds one file
pub struct InodeTable {
    slots: Vec<Option<InodeEntry>>,
    max_filename_length: usize,
}
impl InodeTable {
    /// Create a new inode table which all slots are empty
    ///
    /// # Arguments
    /// * max_files: the count of the slots
    /// * max_filename_length: the max byte length of the file name
    pub fn new(max_files: usize, max_filename_length: usize) -> Self {
        Self {
            slots: vec![None; max_files],
            max_filename_length,
        }
    }

    /// Rebuild the inode table from the slots loaded from the backing store
    ///
    /// # Returns
    /// * Ok(InodeTable)
    /// * Err(NotValidStoreData): two slots hold the same name or the name is too long
    pub fn from_slots(slots: Vec<Option<InodeEntry>>, max_filename_length: usize) -> Result<Self> {
        let mut table = Self::new(0, max_filename_length);
        for slot in slots.iter() {
            if let Some(entry) = slot {
                if entry.name.len() > max_filename_length || table.find(&entry.name).is_some() {
                    return Err(LFSError::NotValidStoreData);
                }
            }
            table.slots.push(slot.clone());
        }
        Ok(table)
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn slots(&self) -> &[Option<InodeEntry>] {
        &self.slots
    }

    /// Iterate over the files in ascending slot order
    pub fn entries(&self) -> impl Iterator<Item = &InodeEntry> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Find the slot of the file by name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|entry| entry.name == name))
    }

    pub fn get(&self, slot_index: usize) -> Option<&InodeEntry> {
        self.slots.get(slot_index).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, slot_index: usize) -> Option<&mut InodeEntry> {
        self.slots.get_mut(slot_index).and_then(|slot| slot.as_mut())
    }

    /// Check the name can be inserted into the table without changing anything.
    ///
    /// # Returns
    /// * Ok(free slot index)
    /// * Err(FilenameTooLong | AlreadyExists | TableFull)
    pub fn check_insert(&self, name: &str) -> Result<usize> {
        if name.len() > self.max_filename_length {
            return Err(LFSError::FilenameTooLong(
                name.to_string(),
                self.max_filename_length,
            ));
        }
        if self.find(name).is_some() {
            return Err(LFSError::AlreadyExists(name.to_string()));
        }
        self.slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(LFSError::TableFull)
    }

    /// Insert a new file into the first empty slot
    ///
    /// # Returns
    /// * Ok(slot index)
    /// * Err(FilenameTooLong | AlreadyExists | TableFull)
    pub fn insert(&mut self, name: &str, size: usize, first_block: usize) -> Result<usize> {
        let slot_index = self.check_insert(name)?;
        self.slots[slot_index] = Some(InodeEntry::new(name, size, first_block));
        Ok(slot_index)
    }

    /// Clear the slot and return the file which was stored in it
    pub fn remove(&mut self, slot_index: usize) -> Option<InodeEntry> {
        self.slots.get_mut(slot_index).and_then(|slot| slot.take())
    }

    /// List the file names in ascending slot order
    pub fn list_names(&self) -> Vec<String> {
        self.entries().map(|entry| entry.name.clone()).collect()
    }
}
