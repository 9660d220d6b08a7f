//! Physical placement of regions and data items.
//!
//! The core only relies on the contract below. The placement policy is the allocator's
//! business, `MemoryAllocator` is a simple in-process one.
use crate::objects::{Allocation, LocalPointer, RegionId};
use std::future::Future;
use thiserror::Error;

mod memory_allocator;
pub use memory_allocator::MemoryAllocator;
pub use memory_allocator::REGION_ADDRESS_SPAN;

pub trait Allocator: Send + Sync {
    /// Placement granularity. Every offset handed out is a multiple of this.
    fn min_obj_size(&self) -> u64;

    /// Reserves backing memory for a new region and picks its id.
    fn create_region(
        &self,
        name: &str,
        size: u64,
    ) -> impl Future<Output = Result<RegionId, AllocatorError>> + Send;

    /// Releases a region and everything allocated inside it.
    fn destroy_region(
        &self,
        region_id: RegionId,
    ) -> impl Future<Output = Result<(), AllocatorError>> + Send;

    fn resize_region(
        &self,
        region_id: RegionId,
        size: u64,
    ) -> impl Future<Output = Result<(), AllocatorError>> + Send;

    /// Places `size` bytes inside the region.
    fn allocate(
        &self,
        region_id: RegionId,
        size: u64,
    ) -> impl Future<Output = Result<Allocation, AllocatorError>> + Send;

    fn deallocate(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> impl Future<Output = Result<(), AllocatorError>> + Send;

    fn get_local_pointer(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> impl Future<Output = Result<LocalPointer, AllocatorError>> + Send;

    /// Called once at shutdown, no other call is valid afterwards.
    fn finalize(&self) -> impl Future<Output = Result<(), AllocatorError>> + Send;
}

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("Allocator has been finalized")]
    Finalized(),
    #[error("Minimum object size must be a non zero power of two, got {0}")]
    InvalidGranule(u64),
    #[error("Invalid allocation size {0}")]
    InvalidSize(u64),
    #[error("Region {0} not found in allocator")]
    RegionNotFound(RegionId),
    #[error("Region size {0} exceeds the per region address span")]
    RegionTooLarge(u64),
    #[error("Out of region ids, the address space is exhausted")]
    AddressSpaceExhausted(),
    #[error("Region {0} has no room for {1} bytes")]
    NoSpace(RegionId, u64),
    #[error("Region {0} cannot shrink to {1} bytes, {2} bytes are in use")]
    ResizeBelowUsage(RegionId, u64, u64),
    #[error("Nothing allocated at offset {1} in region {0}")]
    NotAllocated(RegionId, u64),
    #[error("Offset {1} is outside of region {0}")]
    OutOfRange(RegionId, u64),
}
