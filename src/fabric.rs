//! Memory registration with the RDMA provider. Only registration lives here, connection
//! setup and progress belong to the transport adapter.
use crate::objects::LocalPointer;
use crate::permission::AccessMode;
use std::fmt;
use std::future::Future;
use thiserror::Error;

mod loopback;
pub use loopback::LoopbackTransport;

/// Local span of memory to expose for remote access.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MemoryRange {
    pub local_pointer: LocalPointer,
    pub len: u64,
}

/// What the provider hands back for a registration. `rkey` is the value remote peers
/// present, `key` is the requested access key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RegistrationHandle {
    pub key: u64,
    pub rkey: u64,
    pub access: AccessMode,
    pub range: MemoryRange,
}

impl fmt::Display for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {:#x} rkey {:#x} {} {}+{}",
            self.key, self.rkey, self.access, self.range.local_pointer, self.range.len
        )
    }
}

pub trait FabricTransport: Send + Sync {
    fn register(
        &self,
        key: u64,
        range: MemoryRange,
        access: AccessMode,
    ) -> impl Future<Output = Result<RegistrationHandle, TransportError>> + Send;

    fn deregister(
        &self,
        handle: RegistrationHandle,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Clone, Debug, Error)]
pub enum TransportError {
    #[error("Registration of {0} bytes at {1} refused: {2}")]
    RegisterFailed(u64, LocalPointer, String),
    #[error("Deregistration of key {0:#x} failed: {1}")]
    DeregisterFailed(u64, String),
    #[error("Registration with rkey {0:#x} is unknown to the provider")]
    UnknownRegistration(u64),
}
