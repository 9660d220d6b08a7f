//! Owner / group / other access checks against POSIX style mode bits.
//!
//! The predicate itself knows nothing about ownership shortcuts. Whether the owner gets
//! to skip the check is decided by each caller, see the lifecycle operations in `cis`.
use crate::objects::{DataitemMetadata, RegionMetadata};
use std::fmt;

bitflags! {
    pub struct Permissions: u32 {
        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl Permissions {
    /// Bits outside of the nine permission bits (setuid, file type, ...) are dropped.
    pub const fn from_mode(mode: u32) -> Permissions {
        Permissions::from_bits_truncate(mode)
    }

    pub fn mode(&self) -> u32 {
        self.bits()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.bits())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Remote access either can write or it can't, plain writes are registered as RW.
    pub fn is_writable(&self) -> bool {
        !matches!(self, AccessMode::Read)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "READ"),
            AccessMode::Write => write!(f, "WRITE"),
            AccessMode::ReadWrite => write!(f, "RW"),
        }
    }
}

/// Anything that carries an owner and a permission pattern.
pub trait Permissioned {
    fn perm(&self) -> Permissions;
    fn owner_uid(&self) -> u32;
    fn owner_gid(&self) -> u32;

    fn is_owner(&self, uid: u32) -> bool {
        self.owner_uid() == uid
    }
}

impl Permissioned for RegionMetadata {
    fn perm(&self) -> Permissions {
        self.perm
    }
    fn owner_uid(&self) -> u32 {
        self.uid
    }
    fn owner_gid(&self) -> u32 {
        self.gid
    }
}

impl Permissioned for DataitemMetadata {
    fn perm(&self) -> Permissions {
        self.perm
    }
    fn owner_uid(&self) -> u32 {
        self.uid
    }
    fn owner_gid(&self) -> u32 {
        self.gid
    }
}

/// Picks the owner, group or other triad (first match wins) and tests it against `mode`.
pub fn permitted(record: &impl Permissioned, mode: AccessMode, uid: u32, gid: u32) -> bool {
    let perm = record.perm();
    let (read, write) = if uid == record.owner_uid() {
        (Permissions::OWNER_READ, Permissions::OWNER_WRITE)
    } else if gid == record.owner_gid() {
        (Permissions::GROUP_READ, Permissions::GROUP_WRITE)
    } else {
        (Permissions::OTHER_READ, Permissions::OTHER_WRITE)
    };

    match mode {
        AccessMode::Read => perm.contains(read),
        AccessMode::Write => perm.contains(write),
        AccessMode::ReadWrite => perm.contains(read | write),
    }
}
