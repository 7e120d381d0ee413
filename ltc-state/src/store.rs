//! Pluggable persistence of [`StoredBlock`] keyed by header hash, plus the
//! chain head pointer. Two implementations satisfy the same contract: an
//! in-memory map for tests and light clients, and a fixed-record append file
//! for durable storage. The chain engine works against either through the
//! [`BlockStore`] trait.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::RwLock;

use ltc_chain::block::{Hash, StoredBlock};

use crate::error::StateError;

/// Contract every backing store must satisfy (§4.2).
pub trait BlockStore: Send + Sync {
    /// Inserts `block` keyed by its header hash. Idempotent for a byte-equal
    /// rewrite of an existing entry; fails `Conflict` if a different block is
    /// already stored under the same hash.
    fn put(&self, block: StoredBlock) -> Result<(), StateError>;

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StateError>;

    /// The current chain head. Callers must seed the store with a genesis
    /// block before calling this.
    fn chain_head(&self) -> Result<StoredBlock, StateError>;

    /// Atomically repoints the chain head. `block` must already be stored.
    fn set_chain_head(&self, block: StoredBlock) -> Result<(), StateError>;

    fn close(&self) -> Result<(), StateError>;
}

/// An in-memory `BlockStore`, used by tests and by light clients that don't
/// need the chain to outlive the process.
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Hash, StoredBlock>>,
    head: RwLock<Option<StoredBlock>>,
}

impl MemoryBlockStore {
    pub fn new(genesis: StoredBlock) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash(), genesis);
        MemoryBlockStore {
            blocks: RwLock::new(blocks),
            head: RwLock::new(Some(genesis)),
        }
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: StoredBlock) -> Result<(), StateError> {
        let mut blocks = self.blocks.write().expect("lock not poisoned");
        match blocks.get(&block.hash()) {
            Some(existing) if *existing == block => Ok(()),
            Some(_) => Err(StateError::Conflict),
            None => {
                blocks.insert(block.hash(), block);
                Ok(())
            }
        }
    }

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StateError> {
        Ok(self.blocks.read().expect("lock not poisoned").get(hash).copied())
    }

    fn chain_head(&self) -> Result<StoredBlock, StateError> {
        self.head
            .read()
            .expect("lock not poisoned")
            .ok_or(StateError::NotFound)
    }

    fn set_chain_head(&self, block: StoredBlock) -> Result<(), StateError> {
        if self.get(&block.hash())?.is_none() {
            return Err(StateError::NotFound);
        }
        *self.head.write().expect("lock not poisoned") = Some(block);
        Ok(())
    }

    fn close(&self) -> Result<(), StateError> {
        Ok(())
    }
}

/// An append-only file of fixed 96-byte [`StoredBlock`] compact records, plus
/// a small in-memory index for lookup. The head pointer is the hash of the
/// last record written; `set_chain_head` requires that hash to already be
/// present in the file (reorgs append the new branch's blocks first).
pub struct FileBlockStore {
    file: RwLock<File>,
    index: RwLock<HashMap<Hash, u64>>,
    head: RwLock<Hash>,
}

impl FileBlockStore {
    pub fn open(path: &Path, genesis: StoredBlock) -> Result<Self, StateError> {
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let mut index = HashMap::new();
        let mut head = genesis.hash();

        if existed {
            let mut offset = 0u64;
            let mut buf = [0u8; StoredBlock::COMPACT_LEN];
            loop {
                match file.read_exact(&mut buf) {
                    Ok(()) => {
                        let stored = StoredBlock::from_compact_bytes(&buf)
                            .map_err(|_| StateError::Corrupt("bad compact record"))?;
                        head = stored.hash();
                        index.insert(head, offset);
                        offset += StoredBlock::COMPACT_LEN as u64;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(StateError::Io(e)),
                }
            }
        } else {
            let offset = Self::append_record(&mut file, &genesis)?;
            index.insert(genesis.hash(), offset);
        }

        Ok(FileBlockStore {
            file: RwLock::new(file),
            index: RwLock::new(index),
            head: RwLock::new(head),
        })
    }

    fn append_record(file: &mut File, block: &StoredBlock) -> Result<u64, StateError> {
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&block.to_compact_bytes())?;
        file.flush()?;
        Ok(offset)
    }
}

impl BlockStore for FileBlockStore {
    fn put(&self, block: StoredBlock) -> Result<(), StateError> {
        if let Some(existing) = self.get(&block.hash())? {
            return if existing == block {
                Ok(())
            } else {
                Err(StateError::Conflict)
            };
        }
        let mut file = self.file.write().expect("lock not poisoned");
        let offset = Self::append_record(&mut file, &block)?;
        self.index
            .write()
            .expect("lock not poisoned")
            .insert(block.hash(), offset);
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StateError> {
        let offset = match self.index.read().expect("lock not poisoned").get(hash).copied() {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let mut file = self.file.write().expect("lock not poisoned");
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; StoredBlock::COMPACT_LEN];
        file.read_exact(&mut buf)?;
        StoredBlock::from_compact_bytes(&buf)
            .map(Some)
            .map_err(|_| StateError::Corrupt("bad compact record"))
    }

    fn chain_head(&self) -> Result<StoredBlock, StateError> {
        let head = *self.head.read().expect("lock not poisoned");
        self.get(&head)?.ok_or(StateError::NotFound)
    }

    fn set_chain_head(&self, block: StoredBlock) -> Result<(), StateError> {
        if self.get(&block.hash())?.is_none() {
            return Err(StateError::NotFound);
        }
        *self.head.write().expect("lock not poisoned") = block.hash();
        Ok(())
    }

    fn close(&self) -> Result<(), StateError> {
        self.file.write().expect("lock not poisoned").flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ltc_chain::block::{merkle, Header, Height};
    use ltc_chain::work::difficulty::CompactDifficulty;

    fn genesis() -> StoredBlock {
        let header = Header::new(
            1,
            Hash([0; 32]),
            merkle::Root([0; 32]),
            Utc.timestamp(1_317_972_665, 0),
            CompactDifficulty(0x1e0ffff0),
            2_084_524_493,
        );
        StoredBlock {
            header,
            chain_work: CompactDifficulty(0x1e0ffff0).to_expanded().unwrap().to_work(),
            height: Height(0),
        }
    }

    #[test]
    fn memory_store_roundtrips_genesis() {
        let store = MemoryBlockStore::new(genesis());
        assert_eq!(store.chain_head().unwrap(), genesis());
        assert_eq!(store.get(&genesis().hash()).unwrap(), Some(genesis()));
    }

    #[test]
    fn memory_store_rejects_conflicting_rewrite() {
        let store = MemoryBlockStore::new(genesis());
        let mut other = genesis();
        other.height = Height(1);
        let result = store.put(StoredBlock {
            header: other.header,
            chain_work: other.chain_work,
            height: other.height,
        });
        // Same hash (height isn't part of the header), different StoredBlock -> Conflict.
        assert!(matches!(result, Err(StateError::Conflict)));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempdir::TempDir::new("ltc-state-test").unwrap();
        let path = dir.path().join("blocks.dat");

        {
            let store = FileBlockStore::open(&path, genesis()).unwrap();
            store.close().unwrap();
        }
        let reopened = FileBlockStore::open(&path, genesis()).unwrap();
        assert_eq!(reopened.chain_head().unwrap(), genesis());
    }
}
