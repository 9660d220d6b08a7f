//! Server wide memory layout settings. Changing these on a live server invalidates every
//! data item id already handed out, since ids are derived from offsets.

/// Allocation granularity inside a region. A data item id is its offset divided by this.
pub const MIN_OBJ_SIZE: u64 = 128;

/// Placement value stored on a region that has no backing memory of its own.
pub const INVALID_OFFSET: u64 = u64::MAX;

/// Longest region or data item name the metadata directory accepts by default.
pub const DEFAULT_MAX_KEY_LEN: usize = 40;

/// Number of mutexes guarding remote atomic operations. More shards means less false
/// contention at the cost of a little memory.
pub const CAS_LOCK_COUNT: usize = 128;

/// Offsets within the same 8 byte word always land on the same shard.
pub const CAS_LOCK_SHIFT: u32 = 3;
