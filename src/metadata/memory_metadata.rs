//! In-process metadata directory. Everything sits behind a single lock, which also makes
//! every individual call atomic.
use super::{MetadataError, MetadataManager};
use crate::constants::DEFAULT_MAX_KEY_LEN;
use crate::objects::{DataitemId, DataitemMetadata, RegionId, RegionMetadata};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct ItemDirectory {
    items: HashMap<DataitemId, DataitemMetadata>,
    names: HashMap<String, DataitemId>,
}

#[derive(Debug, Default)]
struct Directory {
    regions: HashMap<RegionId, RegionMetadata>,
    region_names: HashMap<String, RegionId>,
    dataitems: HashMap<RegionId, ItemDirectory>,
}

#[derive(Debug)]
pub struct MemoryMetadataManager {
    max_key_len: usize,
    directory: RwLock<Directory>,
}

impl MemoryMetadataManager {
    pub fn new() -> MemoryMetadataManager {
        MemoryMetadataManager {
            max_key_len: DEFAULT_MAX_KEY_LEN,
            directory: RwLock::new(Directory::default()),
        }
    }

    pub fn with_max_key_len(mut self, max_key_len: usize) -> MemoryMetadataManager {
        self.max_key_len = max_key_len;
        self
    }

    fn check_key(&self, key: &str) -> Result<(), MetadataError> {
        if key.len() > self.max_key_len {
            return Err(MetadataError::KeyTooLong(key.to_string(), self.max_key_len));
        }
        Ok(())
    }

    pub async fn region_count(&self) -> usize {
        self.directory.read().await.regions.len()
    }

    pub async fn dataitem_count(&self, region_id: RegionId) -> usize {
        self.directory
            .read()
            .await
            .dataitems
            .get(&region_id)
            .map(|d| d.items.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryMetadataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataManager for MemoryMetadataManager {
    async fn find_region(&self, region_id: RegionId) -> Result<RegionMetadata, MetadataError> {
        self.directory
            .read()
            .await
            .regions
            .get(&region_id)
            .cloned()
            .ok_or(MetadataError::RegionNotFound(region_id))
    }

    async fn find_region_by_name(&self, name: &str) -> Result<RegionMetadata, MetadataError> {
        let dir = self.directory.read().await;
        dir.region_names
            .get(name)
            .and_then(|id| dir.regions.get(id))
            .cloned()
            .ok_or_else(|| MetadataError::RegionNameNotFound(name.to_string()))
    }

    async fn insert_region(&self, region: RegionMetadata) -> Result<(), MetadataError> {
        self.check_key(&region.name)?;

        let mut dir = self.directory.write().await;
        if dir.regions.contains_key(&region.region_id) {
            return Err(MetadataError::RegionExists(region.region_id));
        }
        if dir.region_names.contains_key(&region.name) {
            return Err(MetadataError::RegionNameInUse(region.name));
        }

        dir.region_names.insert(region.name.clone(), region.region_id);
        dir.dataitems.insert(region.region_id, ItemDirectory::default());
        dir.regions.insert(region.region_id, region);
        Ok(())
    }

    async fn modify_region(&self, region: RegionMetadata) -> Result<(), MetadataError> {
        self.check_key(&region.name)?;

        let mut dir = self.directory.write().await;
        let old_name = match dir.regions.get(&region.region_id) {
            Some(s) => s.name.clone(),
            None => return Err(MetadataError::RegionNotFound(region.region_id)),
        };

        if old_name != region.name {
            if dir.region_names.contains_key(&region.name) {
                return Err(MetadataError::RegionNameInUse(region.name));
            }
            dir.region_names.remove(&old_name);
            dir.region_names.insert(region.name.clone(), region.region_id);
        }
        dir.regions.insert(region.region_id, region);
        Ok(())
    }

    async fn delete_region(&self, region_id: RegionId) -> Result<(), MetadataError> {
        let mut dir = self.directory.write().await;
        let region = dir
            .regions
            .remove(&region_id)
            .ok_or(MetadataError::RegionNotFound(region_id))?;
        dir.region_names.remove(&region.name);
        dir.dataitems.remove(&region_id);
        Ok(())
    }

    async fn find_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> Result<DataitemMetadata, MetadataError> {
        self.directory
            .read()
            .await
            .dataitems
            .get(&region_id)
            .and_then(|d| d.items.get(&dataitem_id))
            .cloned()
            .ok_or(MetadataError::DataitemNotFound(dataitem_id, region_id))
    }

    async fn find_dataitem_by_name(
        &self,
        name: &str,
        region_id: RegionId,
    ) -> Result<DataitemMetadata, MetadataError> {
        self.directory
            .read()
            .await
            .dataitems
            .get(&region_id)
            .and_then(|d| d.names.get(name).and_then(|id| d.items.get(id)))
            .cloned()
            .ok_or_else(|| MetadataError::DataitemNameNotFound(name.to_string(), region_id))
    }

    async fn insert_dataitem(&self, dataitem: DataitemMetadata) -> Result<(), MetadataError> {
        if let Some(name) = &dataitem.name {
            self.check_key(name)?;
        }

        let mut dir = self.directory.write().await;
        let region_id = dataitem.region_id;
        let items = dir
            .dataitems
            .get_mut(&region_id)
            .ok_or(MetadataError::RegionNotFound(region_id))?;

        if items.items.contains_key(&dataitem.dataitem_id) {
            return Err(MetadataError::DataitemExists(
                dataitem.dataitem_id,
                region_id,
            ));
        }
        if let Some(name) = &dataitem.name {
            if items.names.contains_key(name) {
                return Err(MetadataError::DataitemNameInUse(name.clone(), region_id));
            }
            items.names.insert(name.clone(), dataitem.dataitem_id);
        }
        items.items.insert(dataitem.dataitem_id, dataitem);
        Ok(())
    }

    async fn modify_dataitem(&self, dataitem: DataitemMetadata) -> Result<(), MetadataError> {
        let mut dir = self.directory.write().await;
        let region_id = dataitem.region_id;
        let items = dir
            .dataitems
            .get_mut(&region_id)
            .ok_or(MetadataError::RegionNotFound(region_id))?;

        let existing = items
            .items
            .get_mut(&dataitem.dataitem_id)
            .ok_or(MetadataError::DataitemNotFound(dataitem.dataitem_id, region_id))?;

        //Names are fixed at allocation time
        if existing.name != dataitem.name {
            return Err(MetadataError::DataitemNameInUse(
                dataitem.name.unwrap_or_default(),
                region_id,
            ));
        }
        *existing = dataitem;
        Ok(())
    }

    async fn delete_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> Result<(), MetadataError> {
        let mut dir = self.directory.write().await;
        let items = dir
            .dataitems
            .get_mut(&region_id)
            .ok_or(MetadataError::DataitemNotFound(dataitem_id, region_id))?;
        let removed = items
            .items
            .remove(&dataitem_id)
            .ok_or(MetadataError::DataitemNotFound(dataitem_id, region_id))?;
        if let Some(name) = removed.name {
            items.names.remove(&name);
        }
        Ok(())
    }

    fn max_key_len(&self) -> usize {
        self.max_key_len
    }
}
