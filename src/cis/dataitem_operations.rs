//! Data item allocation, lookup and permission changes.
//!
//! Items are addressed by (region, offset) and their id is always derived from the offset,
//! so every offset based call here resolves through `dataitem_id`.
use super::{Cis, CisError};
use crate::allocator::Allocator;
use crate::fabric::FabricTransport;
use crate::metadata::MetadataManager;
use crate::objects::{DataitemId, DataitemMetadata, LocalPointer, RegionId};
use crate::permission::{AccessMode, Permissioned, Permissions};

/// What a successful `allocate` hands back to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllocatedItem {
    pub offset: u64,
    pub dataitem: DataitemMetadata,
    pub local_pointer: LocalPointer,
}

impl<A: Allocator, M: MetadataManager, T: FabricTransport> Cis<A, M, T> {
    /// An empty name allocates an anonymous item.
    pub async fn allocate(
        &self,
        name: &str,
        region_id: RegionId,
        size: u64,
        perm: Permissions,
        uid: u32,
        gid: u32,
    ) -> Result<AllocatedItem, CisError> {
        let max_key_len = self.metadata.max_key_len();
        if name.len() > max_key_len {
            return Err(CisError::DataitemNameTooLong(name.len(), max_key_len));
        }

        let region = self
            .metadata
            .find_region(region_id)
            .await
            .map_err(|_| CisError::RegionNotFound(region_id.to_string()))?;

        if !region.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&region, AccessMode::Write, uid, gid)
        {
            return Err(CisError::DataitemAllocNotPermitted(region_id));
        }

        if !name.is_empty()
            && self
                .metadata
                .find_dataitem_by_name(name, region_id)
                .await
                .is_ok()
        {
            return Err(CisError::DataitemExist(name.to_string(), region_id));
        }

        let allocation = self.allocator.allocate(region_id, size).await?;

        let dataitem_id = self.dataitem_id(allocation.offset);
        let dataitem = DataitemMetadata {
            dataitem_id,
            region_id,
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            },
            offset: allocation.offset,
            size,
            perm,
            uid,
            gid,
        };

        if let Err(e) = self.metadata.insert_dataitem(dataitem.clone()).await {
            error!(
                "Data item at offset {0} in region {1} is allocated but missing from metadata: {2}",
                allocation.offset, region_id, e
            );
            return Err(CisError::DataitemNotInserted(dataitem_id, region_id, e));
        }

        debug!(
            "Allocated data item {0} in region {1} at offset {2} size {3}",
            dataitem_id, region_id, allocation.offset, size
        );
        Ok(AllocatedItem {
            offset: allocation.offset,
            dataitem,
            local_pointer: allocation.local_pointer,
        })
    }

    pub async fn deallocate(
        &self,
        region_id: RegionId,
        offset: u64,
        uid: u32,
        gid: u32,
    ) -> Result<(), CisError> {
        let dataitem = self.find_dataitem_or_not_found(region_id, offset).await?;
        let dataitem_id = dataitem.dataitem_id;

        if !dataitem.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&dataitem, AccessMode::Write, uid, gid)
        {
            return Err(CisError::DataitemDeallocNotPermitted(dataitem_id, region_id));
        }

        self.metadata
            .delete_dataitem(dataitem_id, region_id)
            .await
            .map_err(|e| CisError::DataitemNotRemoved(dataitem_id, region_id, e))?;

        let deregistered = self.registrations.deregister_item(region_id, dataitem_id).await;
        if !deregistered.is_clean() {
            warn!(
                "Data item {0} of region {1} deallocated with {2} registrations that failed to deregister",
                dataitem_id,
                region_id,
                deregistered.failures.len()
            );
        }

        if let Err(e) = self.allocator.deallocate(region_id, dataitem.offset).await {
            error!(
                "Data item {0} of region {1} removed from metadata but still allocated: {2}",
                dataitem_id, region_id, e
            );
            return Err(e.into());
        }

        debug!("Deallocated data item {0} of region {1}", dataitem_id, region_id);
        Ok(())
    }

    /// Only the owner may change permissions, whatever the permission bits say.
    pub async fn change_dataitem_permission(
        &self,
        region_id: RegionId,
        offset: u64,
        perm: Permissions,
        uid: u32,
        _gid: u32,
    ) -> Result<(), CisError> {
        let mut dataitem = self.find_dataitem_or_not_found(region_id, offset).await?;
        let dataitem_id = dataitem.dataitem_id;

        if !dataitem.is_owner(uid) {
            return Err(CisError::ItemPermModifyNotPermitted(dataitem_id, region_id));
        }

        dataitem.perm = perm;
        self.metadata
            .modify_dataitem(dataitem)
            .await
            .map_err(|e| CisError::DataitemNotModified(dataitem_id, region_id, e))?;

        debug!(
            "Data item {0} of region {1} permission now {2}",
            dataitem_id, region_id, perm
        );
        Ok(())
    }

    /// Absent and forbidden look the same to the caller.
    pub async fn lookup(
        &self,
        item_name: &str,
        region_name: &str,
        uid: u32,
        gid: u32,
    ) -> Result<DataitemMetadata, CisError> {
        let dataitem = self.get_dataitem(item_name, region_name).await?;

        if !dataitem.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&dataitem, AccessMode::Read, uid, gid)
        {
            return Err(CisError::DataitemNotFound(format!(
                "{0} in region {1}",
                item_name, region_name
            )));
        }

        Ok(dataitem)
    }

    /// No permission check, the caller has already been authorized.
    pub async fn get_dataitem(
        &self,
        item_name: &str,
        region_name: &str,
    ) -> Result<DataitemMetadata, CisError> {
        let not_found = || {
            CisError::DataitemNotFound(format!("{0} in region {1}", item_name, region_name))
        };

        let region = self
            .metadata
            .find_region_by_name(region_name)
            .await
            .map_err(|_| not_found())?;
        self.metadata
            .find_dataitem_by_name(item_name, region.region_id)
            .await
            .map_err(|_| not_found())
    }

    /// No permission check, the caller has already been authorized.
    pub async fn get_dataitem_by_offset(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Result<DataitemMetadata, CisError> {
        self.find_dataitem_or_not_found(region_id, offset).await
    }

    /// READ is required even from the owner.
    pub async fn check_permission_get_item_info(
        &self,
        region_id: RegionId,
        offset: u64,
        uid: u32,
        gid: u32,
    ) -> Result<DataitemMetadata, CisError> {
        let dataitem = self.find_dataitem_or_not_found(region_id, offset).await?;

        if !self
            .metadata
            .check_permissions(&dataitem, AccessMode::Read, uid, gid)
        {
            return Err(Self::item_not_found(dataitem.dataitem_id, region_id));
        }

        Ok(dataitem)
    }

    pub(super) async fn find_dataitem_or_not_found(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Result<DataitemMetadata, CisError> {
        let dataitem_id = self.dataitem_id(offset);
        self.metadata
            .find_dataitem(dataitem_id, region_id)
            .await
            .map_err(|_| Self::item_not_found(dataitem_id, region_id))
    }

    pub(super) fn item_not_found(dataitem_id: DataitemId, region_id: RegionId) -> CisError {
        CisError::DataitemNotFound(format!("{0} in region {1}", dataitem_id, region_id))
    }
}
