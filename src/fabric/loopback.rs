//! Transport that registers nothing with real hardware. It hands out increasing rkeys and
//! keeps track of what is live, which is all the core can observe anyway.
use super::{FabricTransport, MemoryRange, RegistrationHandle, TransportError};
use crate::permission::AccessMode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct LoopbackTransport {
    next_rkey: AtomicU64,
    live: RwLock<HashMap<u64, RegistrationHandle>>,
    fail_next_register: AtomicBool,
    fail_next_deregister: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> LoopbackTransport {
        LoopbackTransport {
            next_rkey: AtomicU64::new(1),
            live: RwLock::new(HashMap::new()),
            fail_next_register: AtomicBool::new(false),
            fail_next_deregister: AtomicBool::new(false),
        }
    }

    /// The next register call is refused.
    pub fn fail_next_register(&self) {
        self.fail_next_register.store(true, Ordering::SeqCst);
    }

    /// The next deregister call reports an error but, like a real provider that lost the
    /// handle, the registration is gone afterwards.
    pub fn fail_next_deregister(&self) {
        self.fail_next_deregister.store(true, Ordering::SeqCst);
    }

    pub async fn live_count(&self) -> usize {
        self.live.read().await.len()
    }

    pub async fn is_live(&self, rkey: u64) -> bool {
        self.live.read().await.contains_key(&rkey)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FabricTransport for LoopbackTransport {
    async fn register(
        &self,
        key: u64,
        range: MemoryRange,
        access: AccessMode,
    ) -> Result<RegistrationHandle, TransportError> {
        if self.fail_next_register.swap(false, Ordering::SeqCst) {
            return Err(TransportError::RegisterFailed(
                range.len,
                range.local_pointer,
                "injected failure".to_string(),
            ));
        }

        let handle = RegistrationHandle {
            key,
            rkey: self.next_rkey.fetch_add(1, Ordering::SeqCst),
            access,
            range,
        };
        self.live.write().await.insert(handle.rkey, handle);
        Ok(handle)
    }

    async fn deregister(&self, handle: RegistrationHandle) -> Result<(), TransportError> {
        let removed = self.live.write().await.remove(&handle.rkey);
        if self.fail_next_deregister.swap(false, Ordering::SeqCst) {
            return Err(TransportError::DeregisterFailed(
                handle.key,
                "injected failure".to_string(),
            ));
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(TransportError::UnknownRegistration(handle.rkey)),
        }
    }
}
