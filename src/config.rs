//! Startup settings for the client interface service. Fixed for the life of the service.
use crate::constants::{CAS_LOCK_COUNT, MIN_OBJ_SIZE};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CisConfig {
    pub min_obj_size: u64,
    pub cas_lock_count: usize,
}

impl CisConfig {
    pub fn new() -> CisConfig {
        CisConfig {
            min_obj_size: MIN_OBJ_SIZE,
            cas_lock_count: CAS_LOCK_COUNT,
        }
    }

    pub fn with_min_obj_size(mut self, min_obj_size: u64) -> CisConfig {
        self.min_obj_size = min_obj_size;
        self
    }

    pub fn with_cas_lock_count(mut self, cas_lock_count: usize) -> CisConfig {
        self.cas_lock_count = cas_lock_count;
        self
    }

    pub fn validate(&self) -> Result<(), CisConfigError> {
        if self.min_obj_size == 0 || !self.min_obj_size.is_power_of_two() {
            return Err(CisConfigError::BadMinObjSize(self.min_obj_size));
        }
        if self.cas_lock_count == 0 {
            return Err(CisConfigError::NoCasLocks());
        }
        Ok(())
    }
}

impl Default for CisConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum CisConfigError {
    #[error("Minimum object size must be a non zero power of two, got {0}")]
    BadMinObjSize(u64),
    #[error("At least one CAS lock is required")]
    NoCasLocks(),
    #[error("Configured minimum object size {0} differs from the allocator's {1}")]
    GranuleMismatch(u64, u64),
}
