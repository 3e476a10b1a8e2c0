//! Filesystem Type Registry
//!
//! This module manages registration and lookup of filesystem types. Types
//! are registered once under a numeric id and never unregistered.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use super::superblock::{FsType, FsTypeId, SuperBlock};
use super::{FsError, FsResult};
use crate::drivers::DevId;

/// Fixed-size table of filesystem types
pub struct FsRegistry {
    types: Mutex<Vec<Option<Arc<dyn FsType>>>>,
}

impl FsRegistry {
    pub fn new(slots: usize) -> Self {
        let mut types = Vec::with_capacity(slots);
        types.resize_with(slots, || None);
        Self {
            types: Mutex::new(types),
        }
    }

    /// Register a filesystem type under `id`
    pub fn register(&self, id: FsTypeId, fs: Arc<dyn FsType>) -> FsResult<()> {
        let mut types = self.types.lock();
        let slot = types.get_mut(id).ok_or(FsError::InvalidArgument)?;

        if let Some(existing) = slot {
            log_warn!("VFS", "filesystem slot {} already holds '{}'", id, existing.name());
            return Err(FsError::Busy);
        }

        log_info!("VFS", "registered filesystem type '{}' as {}", fs.name(), id);
        *slot = Some(fs);
        Ok(())
    }

    /// Lookup a filesystem type by id
    pub fn get(&self, id: FsTypeId) -> Option<Arc<dyn FsType>> {
        self.types.lock().get(id).and_then(|slot| slot.clone())
    }

    /// Lookup a filesystem type by name
    pub fn lookup(&self, name: &str) -> Option<(FsTypeId, Arc<dyn FsType>)> {
        self.registered().into_iter().find(|(_, fs)| fs.name() == name)
    }

    /// Every registered type, in id order
    pub fn registered(&self) -> Vec<(FsTypeId, Arc<dyn FsType>)> {
        self.types
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.clone().map(|fs| (id, fs)))
            .collect()
    }

    /// Ask each type in turn whether it recognizes `dev`
    ///
    /// The first type whose probe succeeds wins; its id is stamped into the
    /// returned superblock.
    pub fn probe(&self, dev: DevId) -> FsResult<SuperBlock> {
        for (id, fs) in self.registered() {
            match fs.probe(dev) {
                Ok(mut sb) => {
                    sb.fs_type = id;
                    return Ok(sb);
                }
                Err(e) => log_debug!("VFS", "'{}' rejected device {}: {}", fs.name(), dev, e),
            }
        }
        Err(FsError::NotSupported)
    }
}
