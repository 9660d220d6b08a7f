use std::fmt;

/// Server local address of allocated memory. Kept as a plain address so the core never
/// dereferences memory it does not own.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LocalPointer(pub usize);

impl LocalPointer {
    pub fn checked_add(self, offset: u64) -> Option<LocalPointer> {
        let offset = usize::try_from(offset).ok()?;
        self.0.checked_add(offset).map(LocalPointer)
    }
}

impl fmt::Display for LocalPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Placement the allocator chose for a new data item.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Allocation {
    pub offset: u64,
    pub local_pointer: LocalPointer,
}
