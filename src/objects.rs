mod dataitem_id;
pub use dataitem_id::DataitemId;

mod dataitem_metadata;
pub use dataitem_metadata::DataitemMetadata;

mod local_pointer;
pub use local_pointer::Allocation;
pub use local_pointer::LocalPointer;

mod region_id;
pub use region_id::RegionId;

mod region_metadata;
pub use region_metadata::RegionMetadata;
