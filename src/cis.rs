//! The client interface service core.
//!
//! Requests are checked here, then applied to the allocator and the metadata directory in
//! a fixed order. Creation goes allocator first so the directory never points at memory
//! that was not reserved. Destruction goes metadata first so nothing can find memory that
//! is about to be released. If the second step fails the first is NOT undone, the error
//! is returned and logged and the two stores disagree until someone reconciles them.
//!
//! The core owns its collaborators. Nothing here locks across unrelated requests, the
//! only cross request locks are the registration cache and the CAS lock table.
use crate::allocator::{Allocator, AllocatorError};
use crate::cas_lock::{CasLockError, CasLockGuard, CasLockTable};
use crate::config::{CisConfig, CisConfigError};
use crate::fabric::{FabricTransport, TransportError};
use crate::memory_registration::{Deregistration, MemoryRegistrationCache};
use crate::metadata::{MetadataError, MetadataManager};
use crate::objects::{DataitemId, DataitemMetadata, LocalPointer, RegionId, RegionMetadata};
use crate::permission::AccessMode;
use thiserror::Error;

mod dataitem_operations;
pub use dataitem_operations::AllocatedItem;

mod region_operations;

mod remote_access;

pub struct Cis<A: Allocator, M: MetadataManager, T: FabricTransport> {
    config: CisConfig,
    allocator: A,
    metadata: M,
    registrations: MemoryRegistrationCache<T>,
    cas_locks: CasLockTable,
}

impl<A: Allocator, M: MetadataManager, T: FabricTransport> Cis<A, M, T> {
    pub fn new(
        config: CisConfig,
        allocator: A,
        metadata: M,
        transport: T,
    ) -> Result<Cis<A, M, T>, CisError> {
        config.validate()?;
        //Data item ids are offsets in units of min_obj_size, so both sides must agree
        if allocator.min_obj_size() != config.min_obj_size {
            return Err(CisConfigError::GranuleMismatch(
                config.min_obj_size,
                allocator.min_obj_size(),
            )
            .into());
        }
        let cas_locks = CasLockTable::new(config.cas_lock_count)?;
        info!(
            "Client interface service up, min object size {0}, {1} CAS locks",
            config.min_obj_size, config.cas_lock_count
        );

        Ok(Cis {
            config,
            allocator,
            metadata,
            registrations: MemoryRegistrationCache::new(transport),
            cas_locks,
        })
    }

    pub fn config(&self) -> &CisConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn registrations(&self) -> &MemoryRegistrationCache<T> {
        &self.registrations
    }

    pub fn dataitem_id(&self, offset: u64) -> DataitemId {
        DataitemId::from_offset(offset, self.config.min_obj_size)
    }

    /// Evaluates RW when `write` is set, READ otherwise. Ownership is not special here.
    pub fn check_region_permission(
        &self,
        region: &RegionMetadata,
        write: bool,
        uid: u32,
        gid: u32,
    ) -> bool {
        self.metadata
            .check_permissions(region, Self::read_or_rw(write), uid, gid)
    }

    pub fn check_dataitem_permission(
        &self,
        dataitem: &DataitemMetadata,
        write: bool,
        uid: u32,
        gid: u32,
    ) -> bool {
        self.metadata
            .check_permissions(dataitem, Self::read_or_rw(write), uid, gid)
    }

    fn read_or_rw(write: bool) -> AccessMode {
        if write {
            AccessMode::ReadWrite
        } else {
            AccessMode::Read
        }
    }

    pub async fn get_local_pointer(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Result<LocalPointer, CisError> {
        Ok(self.allocator.get_local_pointer(region_id, offset).await?)
    }

    /// Must be held across the entire remote atomic sequence on `offset`.
    pub async fn acquire_cas_lock(&self, offset: u64) -> CasLockGuard {
        self.cas_locks.acquire_cas_lock(offset).await
    }

    pub fn release_cas_lock(&self, guard: CasLockGuard) {
        self.cas_locks.release_cas_lock(guard)
    }

    /// Shuts the service down. Every registration is dropped before the allocator is
    /// finalized, then the collaborators go away with `self`.
    pub async fn finalize(self) -> Result<Deregistration, CisError> {
        let deregistered = self.registrations.deregister_all().await;
        if !deregistered.is_clean() {
            warn!(
                "{0} registrations failed to deregister cleanly at shutdown",
                deregistered.failures.len()
            );
        }
        self.allocator.finalize().await?;
        info!(
            "Client interface service finalized, dropped {0} registrations",
            deregistered.removed
        );
        Ok(deregistered)
    }
}

#[derive(Debug, Error)]
pub enum CisError {
    #[error(transparent)]
    AllocatorError(#[from] AllocatorError),
    #[error(transparent)]
    CasLockError(#[from] CasLockError),
    #[error(transparent)]
    CisConfigError(#[from] CisConfigError),
    #[error("Region name too long, {0} bytes exceeds the limit of {1}")]
    RegionNameTooLong(usize, usize),
    #[error("Region {0} already exist")]
    RegionExist(String),
    #[error("Could not find the region {0}")]
    RegionNotFound(String),
    #[error("Destroying region {0} is not permitted")]
    DestroyRegionNotPermitted(RegionId),
    #[error("Can not remove region {0} from metadata service: {1}")]
    RegionNotRemoved(RegionId, MetadataError),
    #[error("Region {0} resize not permitted")]
    RegionResizeNotPermitted(RegionId),
    #[error("Can not modify region {0} in metadata service: {1}")]
    RegionNotModified(RegionId, MetadataError),
    #[error("Can not insert region {0} into metadata service: {1}")]
    RegionNotInserted(RegionId, MetadataError),
    #[error("Region {0} permission modify not permitted")]
    RegionPermModifyNotPermitted(RegionId),
    #[error("Data item name too long, {0} bytes exceeds the limit of {1}")]
    DataitemNameTooLong(usize, usize),
    #[error("Data item {0} already exist in region {1}")]
    DataitemExist(String, RegionId),
    #[error("Could not find the data item {0}")]
    DataitemNotFound(String),
    #[error("Allocation of data item in region {0} is not permitted")]
    DataitemAllocNotPermitted(RegionId),
    #[error("Deallocation of data item {0} in region {1} is not permitted")]
    DataitemDeallocNotPermitted(DataitemId, RegionId),
    #[error("Can not insert data item {0} of region {1} into metadata service: {2}")]
    DataitemNotInserted(DataitemId, RegionId, MetadataError),
    #[error("Can not remove data item {0} of region {1} from metadata service: {2}")]
    DataitemNotRemoved(DataitemId, RegionId, MetadataError),
    #[error("Can not modify data item {0} of region {1} in metadata service: {2}")]
    DataitemNotModified(DataitemId, RegionId, MetadataError),
    #[error("Data item {0} of region {1} permission modify not permitted")]
    ItemPermModifyNotPermitted(DataitemId, RegionId),
    #[error("{2} access to data item {0} of region {1} not permitted")]
    ItemAccessNotPermitted(DataitemId, RegionId, AccessMode),
    #[error("Registration of data item {0} of region {1} failed: {2}")]
    ItemRegistrationFailed(DataitemId, RegionId, TransportError),
}
