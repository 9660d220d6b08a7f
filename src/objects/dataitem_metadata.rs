use super::{DataitemId, RegionId};
use crate::permission::Permissions;

/// Directory entry describing a data item. Only meaningful as the pair
/// (dataitem_id, region_id).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataitemMetadata {
    pub dataitem_id: DataitemId,
    pub region_id: RegionId,
    pub name: Option<String>,
    pub offset: u64,
    pub size: u64,
    pub perm: Permissions,
    pub uid: u32,
    pub gid: u32,
}
