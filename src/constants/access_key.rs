//! Bit layout of the key used to find a cached memory registration.
//!
//! | region id (14 bits) | data item id (33 bits) | rw flag (1 bit) |
//! |        63..34       |         33..1          |       0         |

pub const REGIONID_SHIFT: u32 = 34;
pub const REGIONID_MASK: u64 = (1 << 14) - 1;

pub const DATAITEMID_SHIFT: u32 = 1;
pub const DATAITEMID_MASK: u64 = (1 << 33) - 1;

pub const RW_FLAG: u64 = 1;
