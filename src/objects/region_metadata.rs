use super::RegionId;
use crate::{constants::INVALID_OFFSET, permission::Permissions};

/// Directory entry describing a region.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionMetadata {
    pub region_id: RegionId,
    pub name: String,
    /// Allocator placement, INVALID_OFFSET when the region is not memory backed itself.
    pub offset: u64,
    pub size: u64,
    pub perm: Permissions,
    pub uid: u32,
    pub gid: u32,
}

impl RegionMetadata {
    pub fn new(
        region_id: RegionId,
        name: String,
        size: u64,
        perm: Permissions,
        uid: u32,
        gid: u32,
    ) -> RegionMetadata {
        RegionMetadata {
            region_id,
            name,
            offset: INVALID_OFFSET,
            size,
            perm,
            uid,
            gid,
        }
    }

    pub fn is_memory_backed(&self) -> bool {
        self.offset != INVALID_OFFSET
    }
}
