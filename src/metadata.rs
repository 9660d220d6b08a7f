//! The authoritative directory of regions and data items.
//!
//! Regions are found by id or by name. Data items are found by (id, region id) or by
//! (name, region id), names are unique per region and optional.
use crate::objects::{DataitemId, DataitemMetadata, RegionId, RegionMetadata};
use crate::permission::{self, AccessMode, Permissioned};
use std::future::Future;
use thiserror::Error;

mod memory_metadata;
pub use memory_metadata::MemoryMetadataManager;

pub trait MetadataManager: Send + Sync {
    fn find_region(
        &self,
        region_id: RegionId,
    ) -> impl Future<Output = Result<RegionMetadata, MetadataError>> + Send;

    fn find_region_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<RegionMetadata, MetadataError>> + Send;

    fn insert_region(
        &self,
        region: RegionMetadata,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    fn modify_region(
        &self,
        region: RegionMetadata,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    /// Removes the region along with every data item it still holds.
    fn delete_region(
        &self,
        region_id: RegionId,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    fn find_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> impl Future<Output = Result<DataitemMetadata, MetadataError>> + Send;

    fn find_dataitem_by_name(
        &self,
        name: &str,
        region_id: RegionId,
    ) -> impl Future<Output = Result<DataitemMetadata, MetadataError>> + Send;

    fn insert_dataitem(
        &self,
        dataitem: DataitemMetadata,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    fn modify_dataitem(
        &self,
        dataitem: DataitemMetadata,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    fn delete_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> impl Future<Output = Result<(), MetadataError>> + Send;

    fn max_key_len(&self) -> usize;

    fn check_permissions(
        &self,
        record: &impl Permissioned,
        mode: AccessMode,
        uid: u32,
        gid: u32,
    ) -> bool {
        permission::permitted(record, mode, uid, gid)
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Region {0} does not exist")]
    RegionNotFound(RegionId),
    #[error("Region named {0} does not exist")]
    RegionNameNotFound(String),
    #[error("Region {0} already exists")]
    RegionExists(RegionId),
    #[error("Region name {0} is already in use")]
    RegionNameInUse(String),
    #[error("Data item {0} does not exist in region {1}")]
    DataitemNotFound(DataitemId, RegionId),
    #[error("Data item named {0} does not exist in region {1}")]
    DataitemNameNotFound(String, RegionId),
    #[error("Data item {0} already exists in region {1}")]
    DataitemExists(DataitemId, RegionId),
    #[error("Data item name {0} is already in use in region {1}")]
    DataitemNameInUse(String, RegionId),
    #[error("Key {0} is longer than the limit of {1}")]
    KeyTooLong(String, usize),
}
