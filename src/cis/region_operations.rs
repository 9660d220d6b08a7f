//! Region lifecycle, lookup and permission changes.
use super::{Cis, CisError};
use crate::allocator::Allocator;
use crate::fabric::FabricTransport;
use crate::metadata::MetadataManager;
use crate::objects::{RegionId, RegionMetadata};
use crate::permission::{AccessMode, Permissioned, Permissions};

impl<A: Allocator, M: MetadataManager, T: FabricTransport> Cis<A, M, T> {
    pub async fn create_region(
        &self,
        name: &str,
        size: u64,
        perm: Permissions,
        uid: u32,
        gid: u32,
    ) -> Result<RegionId, CisError> {
        let max_key_len = self.metadata.max_key_len();
        if name.len() > max_key_len {
            return Err(CisError::RegionNameTooLong(name.len(), max_key_len));
        }

        if self.metadata.find_region_by_name(name).await.is_ok() {
            return Err(CisError::RegionExist(name.to_string()));
        }

        let region_id = self.allocator.create_region(name, size).await?;

        let region = RegionMetadata::new(region_id, name.to_string(), size, perm, uid, gid);
        if let Err(e) = self.metadata.insert_region(region).await {
            error!(
                "Region {0} ({1}) is reserved in the allocator but missing from metadata: {2}",
                region_id, name, e
            );
            return Err(CisError::RegionNotInserted(region_id, e));
        }

        debug!(
            "Created region {0} ({1}) size {2} perm {3} for {4}:{5}",
            region_id, name, size, perm, uid, gid
        );
        Ok(region_id)
    }

    pub async fn destroy_region(
        &self,
        region_id: RegionId,
        uid: u32,
        gid: u32,
    ) -> Result<(), CisError> {
        let region = self.find_region_or_not_found(region_id).await?;

        if !region.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&region, AccessMode::Write, uid, gid)
        {
            return Err(CisError::DestroyRegionNotPermitted(region_id));
        }

        //The directory entry goes first, nothing may find the region once its memory is
        //being released
        self.metadata
            .delete_region(region_id)
            .await
            .map_err(|e| CisError::RegionNotRemoved(region_id, e))?;

        let deregistered = self.registrations.deregister_region(region_id).await;
        if !deregistered.is_clean() {
            warn!(
                "Region {0} destroyed with {1} registrations that failed to deregister",
                region_id,
                deregistered.failures.len()
            );
        }

        if let Err(e) = self.allocator.destroy_region(region_id).await {
            error!(
                "Region {0} removed from metadata but the allocator kept it: {1}",
                region_id, e
            );
            return Err(e.into());
        }

        debug!("Destroyed region {0} ({1})", region_id, region.name);
        Ok(())
    }

    /// Unlike destroy, the owner gets no shortcut here, the permission bits decide.
    pub async fn resize_region(
        &self,
        region_id: RegionId,
        uid: u32,
        gid: u32,
        size: u64,
    ) -> Result<(), CisError> {
        let mut region = self.find_region_or_not_found(region_id).await?;

        if !self
            .metadata
            .check_permissions(&region, AccessMode::Write, uid, gid)
        {
            return Err(CisError::RegionResizeNotPermitted(region_id));
        }

        self.allocator.resize_region(region_id, size).await?;

        region.size = size;
        if let Err(e) = self.metadata.modify_region(region).await {
            error!(
                "Region {0} resized to {1} in the allocator but metadata kept the old size: {2}",
                region_id, size, e
            );
            return Err(CisError::RegionNotModified(region_id, e));
        }

        debug!("Resized region {0} to {1}", region_id, size);
        Ok(())
    }

    /// Only the owner may change permissions, whatever the permission bits say.
    pub async fn change_region_permission(
        &self,
        region_id: RegionId,
        perm: Permissions,
        uid: u32,
        _gid: u32,
    ) -> Result<(), CisError> {
        let mut region = self.find_region_or_not_found(region_id).await?;

        if !region.is_owner(uid) {
            return Err(CisError::RegionPermModifyNotPermitted(region_id));
        }

        region.perm = perm;
        self.metadata
            .modify_region(region)
            .await
            .map_err(|e| CisError::RegionNotModified(region_id, e))?;

        debug!("Region {0} permission now {1}", region_id, perm);
        Ok(())
    }

    /// Absent and forbidden look the same to the caller.
    pub async fn lookup_region(
        &self,
        name: &str,
        uid: u32,
        gid: u32,
    ) -> Result<RegionMetadata, CisError> {
        let region = self
            .metadata
            .find_region_by_name(name)
            .await
            .map_err(|_| CisError::RegionNotFound(name.to_string()))?;

        if !region.is_owner(uid)
            && !self
                .metadata
                .check_permissions(&region, AccessMode::Read, uid, gid)
        {
            return Err(CisError::RegionNotFound(name.to_string()));
        }

        Ok(region)
    }

    /// No permission check, the caller has already been authorized.
    pub async fn get_region(&self, name: &str) -> Result<RegionMetadata, CisError> {
        self.metadata
            .find_region_by_name(name)
            .await
            .map_err(|_| CisError::RegionNotFound(name.to_string()))
    }

    /// No permission check, the caller has already been authorized.
    pub async fn get_region_by_id(&self, region_id: RegionId) -> Result<RegionMetadata, CisError> {
        self.find_region_or_not_found(region_id).await
    }

    /// READ is required even from the owner.
    pub async fn check_permission_get_region_info(
        &self,
        region_id: RegionId,
        uid: u32,
        gid: u32,
    ) -> Result<RegionMetadata, CisError> {
        let region = self.find_region_or_not_found(region_id).await?;

        if !self
            .metadata
            .check_permissions(&region, AccessMode::Read, uid, gid)
        {
            return Err(CisError::RegionNotFound(region_id.to_string()));
        }

        Ok(region)
    }

    async fn find_region_or_not_found(
        &self,
        region_id: RegionId,
    ) -> Result<RegionMetadata, CisError> {
        self.metadata
            .find_region(region_id)
            .await
            .map_err(|_| CisError::RegionNotFound(region_id.to_string()))
    }
}
