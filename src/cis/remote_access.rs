//! Exposing data items for direct remote access.
use super::{Cis, CisError};
use crate::allocator::Allocator;
use crate::fabric::{FabricTransport, MemoryRange, RegistrationHandle};
use crate::memory_registration::Deregistration;
use crate::metadata::MetadataManager;
use crate::objects::RegionId;
use crate::permission::{AccessMode, Permissioned};

impl<A: Allocator, M: MetadataManager, T: FabricTransport> Cis<A, M, T> {
    /// Returns the registration for this item and access mode, registering the item's
    /// memory on first use. The owner is always allowed, anyone else needs `access`.
    pub async fn register_dataitem_memory(
        &self,
        region_id: RegionId,
        offset: u64,
        access: AccessMode,
        uid: u32,
        gid: u32,
    ) -> Result<RegistrationHandle, CisError> {
        let dataitem = self.find_dataitem_or_not_found(region_id, offset).await?;
        let dataitem_id = dataitem.dataitem_id;

        if !dataitem.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&dataitem, access, uid, gid)
        {
            return Err(CisError::ItemAccessNotPermitted(
                dataitem_id,
                region_id,
                access,
            ));
        }

        let local_pointer = self
            .allocator
            .get_local_pointer(region_id, dataitem.offset)
            .await?;
        let range = MemoryRange {
            local_pointer,
            len: dataitem.size,
        };

        let handle = self
            .registrations
            .get_or_register(region_id, dataitem_id, access, range)
            .await
            .map_err(|e| CisError::ItemRegistrationFailed(dataitem_id, region_id, e))?;

        //Teardown may have swept the cache between the lookup above and the registration
        let still_there = match self.metadata.find_dataitem(dataitem_id, region_id).await {
            Ok(current) => current.offset == dataitem.offset && current.size == dataitem.size,
            Err(_) => false,
        };
        if !still_there {
            debug!(
                "Data item {0} of region {1} went away during registration",
                dataitem_id, region_id
            );
            self.registrations.deregister_item(region_id, dataitem_id).await;
            return Err(Self::item_not_found(dataitem_id, region_id));
        }

        Ok(handle)
    }

    pub async fn lookup_dataitem_memory(
        &self,
        region_id: RegionId,
        offset: u64,
        access: AccessMode,
    ) -> Option<RegistrationHandle> {
        self.registrations
            .lookup(region_id, self.dataitem_id(offset), access)
            .await
    }

    /// Drops the item's registrations, the item itself stays allocated.
    pub async fn deregister_dataitem_memory(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Deregistration {
        self.registrations
            .deregister_item(region_id, self.dataitem_id(offset))
            .await
    }
}
