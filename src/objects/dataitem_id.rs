//! A data item is never assigned an id of its own, the id is its offset inside the region
//! expressed in units of the minimum object size.
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataitemId(pub u64);

impl DataitemId {
    pub fn from_offset(offset: u64, min_obj_size: u64) -> DataitemId {
        DataitemId(offset / min_obj_size)
    }

    pub fn get_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataitemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
