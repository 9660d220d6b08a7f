//! Cache of remote memory registrations, one map per region.
//!
//! Locking is two level. The directory lock maps a region to its map, each map has its own
//! lock. The directory lock is always taken first and is let go as soon as the region map
//! lock is held, so the transport is only ever called under the region map lock. Nothing
//! ever waits on the directory lock while holding a region map lock.
//!
//! A registration is created the first time someone asks for remote access to a data item
//! and lives until the item, or its whole region, is torn down.
use crate::constants::{DATAITEMID_MASK, DATAITEMID_SHIFT, REGIONID_MASK, REGIONID_SHIFT, RW_FLAG};
use crate::fabric::{FabricTransport, MemoryRange, RegistrationHandle, TransportError};
use crate::objects::{DataitemId, RegionId};
use crate::permission::AccessMode;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Builds the cache key for one access flavour of one data item.
pub fn access_key(region_id: RegionId, dataitem_id: DataitemId, access: AccessMode) -> u64 {
    let mut key = (region_id.get_u64() & REGIONID_MASK) << REGIONID_SHIFT;
    key |= (dataitem_id.get_u64() & DATAITEMID_MASK) << DATAITEMID_SHIFT;
    if access.is_writable() {
        key |= RW_FLAG;
    }
    key
}

#[derive(Debug)]
pub struct RegionMemoryMap {
    region_id: RegionId,
    entries: HashMap<u64, RegistrationHandle>,
}

impl RegionMemoryMap {
    fn new(region_id: RegionId) -> RegionMemoryMap {
        RegionMemoryMap {
            region_id,
            entries: HashMap::new(),
        }
    }
}

type SharedRegionMap = Arc<RwLock<RegionMemoryMap>>;

/// Outcome of removing registrations. Entries are always removed, transport failures are
/// only reported.
#[derive(Debug, Default)]
pub struct Deregistration {
    pub removed: usize,
    pub failures: Vec<TransportError>,
}

impl Deregistration {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: Deregistration) {
        self.removed += other.removed;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug)]
pub struct MemoryRegistrationCache<T: FabricTransport> {
    transport: T,
    directory: RwLock<HashMap<RegionId, SharedRegionMap>>,
}

impl<T: FabricTransport> MemoryRegistrationCache<T> {
    pub fn new(transport: T) -> MemoryRegistrationCache<T> {
        MemoryRegistrationCache {
            transport,
            directory: RwLock::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Write locks the region's map, creating it if this is the region's first
    /// registration.
    async fn lock_region_map(&self, region_id: RegionId) -> OwnedRwLockWriteGuard<RegionMemoryMap> {
        let directory = self.directory.read().await;
        if let Some(map) = directory.get(&region_id) {
            let guard = map.clone().write_owned().await;
            drop(directory);
            return guard;
        }
        drop(directory);

        let mut directory = self.directory.write().await;
        //Someone may have beaten us here between the two locks
        let map = directory
            .entry(region_id)
            .or_insert_with(|| {
                debug!("Creating memory map for region {0}", region_id);
                Arc::new(RwLock::new(RegionMemoryMap::new(region_id)))
            })
            .clone();
        let guard = map.write_owned().await;
        drop(directory);
        guard
    }

    /// Write locks the region's map only if it already exists.
    async fn lock_existing_region_map(
        &self,
        region_id: RegionId,
    ) -> Option<OwnedRwLockWriteGuard<RegionMemoryMap>> {
        let directory = self.directory.read().await;
        let map = directory.get(&region_id)?.clone();
        let guard = map.write_owned().await;
        drop(directory);
        Some(guard)
    }

    /// Returns the cached handle for this item and access flavour, registering the range
    /// with the transport on first use.
    pub async fn get_or_register(
        &self,
        region_id: RegionId,
        dataitem_id: DataitemId,
        access: AccessMode,
        range: MemoryRange,
    ) -> Result<RegistrationHandle, TransportError> {
        let key = access_key(region_id, dataitem_id, access);
        let mut map = self.lock_region_map(region_id).await;

        if let Some(handle) = map.entries.get(&key) {
            return Ok(*handle);
        }

        let handle = self.transport.register(key, range, access).await?;
        trace!("Registered {0} for item {1} in region {2}", handle, dataitem_id, region_id);
        map.entries.insert(key, handle);
        Ok(handle)
    }

    pub async fn lookup(
        &self,
        region_id: RegionId,
        dataitem_id: DataitemId,
        access: AccessMode,
    ) -> Option<RegistrationHandle> {
        let key = access_key(region_id, dataitem_id, access);
        let directory = self.directory.read().await;
        let map = directory.get(&region_id)?.clone();
        let guard = map.read_owned().await;
        drop(directory);
        guard.entries.get(&key).copied()
    }

    pub async fn registered_count(&self, region_id: RegionId) -> usize {
        let directory = self.directory.read().await;
        let map = match directory.get(&region_id) {
            Some(m) => m.clone(),
            None => return 0,
        };
        let guard = map.read_owned().await;
        drop(directory);
        guard.entries.len()
    }

    pub async fn region_count(&self) -> usize {
        self.directory.read().await.len()
    }

    async fn deregister_handles(
        &self,
        region_id: RegionId,
        handles: Vec<RegistrationHandle>,
    ) -> Deregistration {
        let mut result = Deregistration::default();
        for handle in handles {
            result.removed += 1;
            if let Err(e) = self.transport.deregister(handle).await {
                warn!(
                    "Deregistration of {0} in region {1} failed, dropping it anyway: {2}",
                    handle, region_id, e
                );
                result.failures.push(e);
            }
        }
        result
    }

    /// Drops both access flavours of a data item.
    pub async fn deregister_item(
        &self,
        region_id: RegionId,
        dataitem_id: DataitemId,
    ) -> Deregistration {
        let mut map = match self.lock_existing_region_map(region_id).await {
            Some(m) => m,
            None => return Deregistration::default(),
        };

        let handles: Vec<RegistrationHandle> = [AccessMode::Read, AccessMode::ReadWrite]
            .iter()
            .filter_map(|a| map.entries.remove(&access_key(region_id, dataitem_id, *a)))
            .collect();
        let result = self.deregister_handles(region_id, handles).await;
        let now_empty = map.entries.is_empty();
        drop(map);

        if now_empty {
            self.prune_region_map(region_id).await;
        }
        result
    }

    /// Removes an empty map from the directory. Coarse lock first, so this must not be
    /// called with any region map lock held.
    async fn prune_region_map(&self, region_id: RegionId) {
        let mut directory = self.directory.write().await;
        let map = match directory.get(&region_id) {
            Some(m) => m.clone(),
            None => return,
        };
        let guard = map.read().await;
        if guard.entries.is_empty() {
            drop(guard);
            directory.remove(&region_id);
        }
    }

    /// Tears down every registration of a region.
    pub async fn deregister_region(&self, region_id: RegionId) -> Deregistration {
        let mut directory = self.directory.write().await;
        let map = match directory.remove(&region_id) {
            Some(m) => m,
            None => return Deregistration::default(),
        };
        let mut guard = map.write_owned().await;
        drop(directory);

        self.drain(&mut guard).await
    }

    /// Tears down every registration of every region, used at shutdown.
    pub async fn deregister_all(&self) -> Deregistration {
        let maps: Vec<SharedRegionMap> = {
            let mut directory = self.directory.write().await;
            directory.drain().map(|(_, m)| m).collect()
        };

        let mut result = Deregistration::default();
        let drained = join_all(maps.into_iter().map(|map| async move {
            let mut guard = map.write_owned().await;
            self.drain(&mut guard).await
        }))
        .await;
        for d in drained {
            result.merge(d);
        }
        result
    }

    async fn drain(&self, map: &mut RegionMemoryMap) -> Deregistration {
        let region_id = map.region_id;
        let handles: Vec<RegistrationHandle> = map.entries.drain().map(|(_, h)| h).collect();
        debug!(
            "Tearing down {0} registrations for region {1}",
            handles.len(),
            region_id
        );
        self.deregister_handles(region_id, handles).await
    }
}
