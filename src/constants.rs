mod access_key;
pub use access_key::DATAITEMID_MASK;
pub use access_key::DATAITEMID_SHIFT;
pub use access_key::REGIONID_MASK;
pub use access_key::REGIONID_SHIFT;
pub use access_key::RW_FLAG;

mod memory_settings;
pub use memory_settings::CAS_LOCK_COUNT;
pub use memory_settings::CAS_LOCK_SHIFT;
pub use memory_settings::DEFAULT_MAX_KEY_LEN;
pub use memory_settings::INVALID_OFFSET;
pub use memory_settings::MIN_OBJ_SIZE;
