#![allow(dead_code)]
use famcislib::allocator::{Allocator, AllocatorError, MemoryAllocator};
use famcislib::cis::{Cis, CisError};
use famcislib::config::CisConfig;
use famcislib::constants::MIN_OBJ_SIZE;
use famcislib::fabric::LoopbackTransport;
use famcislib::metadata::{MemoryMetadataManager, MetadataError, MetadataManager};
use famcislib::objects::{
    Allocation, DataitemId, DataitemMetadata, LocalPointer, RegionId, RegionMetadata,
};
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tokio::sync::Notify;

pub type TestCis = Cis<MemoryAllocator, MemoryMetadataManager, LoopbackTransport>;
pub type FlakyCis = Cis<FlakyAllocator, FlakyMetadata, LoopbackTransport>;

static LOGGER: Once = Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = CombinedLogger::init(vec![TermLogger::new(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )]);
    });
}

pub fn create_cis() -> Result<TestCis, CisError> {
    init_logging();
    Cis::new(
        CisConfig::default(),
        MemoryAllocator::new(MIN_OBJ_SIZE)?,
        MemoryMetadataManager::new(),
        LoopbackTransport::new(),
    )
}

pub fn create_flaky_cis() -> Result<FlakyCis, CisError> {
    init_logging();
    Cis::new(
        CisConfig::default(),
        FlakyAllocator::new(MIN_OBJ_SIZE)?,
        FlakyMetadata::new(),
        LoopbackTransport::new(),
    )
}

/// Metadata directory that can be told to refuse its next insert, modify or delete, for
/// walking the paths where one store has committed and the other has not.
pub struct FlakyMetadata {
    inner: MemoryMetadataManager,
    fail_next_insert: AtomicBool,
    fail_next_modify: AtomicBool,
    fail_next_delete: AtomicBool,
}

impl FlakyMetadata {
    pub fn new() -> FlakyMetadata {
        FlakyMetadata {
            inner: MemoryMetadataManager::new(),
            fail_next_insert: AtomicBool::new(false),
            fail_next_modify: AtomicBool::new(false),
            fail_next_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_modify(&self) {
        self.fail_next_modify.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    pub async fn region_count(&self) -> usize {
        self.inner.region_count().await
    }

    pub async fn dataitem_count(&self, region_id: RegionId) -> usize {
        self.inner.dataitem_count(region_id).await
    }
}

/// Allocator that can be told to refuse its next release, or to park the next local
/// pointer lookup until `resume` is called.
pub struct FlakyAllocator {
    inner: MemoryAllocator,
    fail_next_release: AtomicBool,
    hold_next_local_pointer: AtomicBool,
    held: Notify,
    resumed: Notify,
}

impl FlakyAllocator {
    pub fn new(min_obj_size: u64) -> Result<FlakyAllocator, AllocatorError> {
        Ok(FlakyAllocator {
            inner: MemoryAllocator::new(min_obj_size)?,
            fail_next_release: AtomicBool::new(false),
            hold_next_local_pointer: AtomicBool::new(false),
            held: Notify::new(),
            resumed: Notify::new(),
        })
    }

    pub fn fail_next_release(&self) {
        self.fail_next_release.store(true, Ordering::SeqCst);
    }

    pub fn hold_next_local_pointer(&self) {
        self.hold_next_local_pointer.store(true, Ordering::SeqCst);
    }

    /// Returns once a local pointer lookup is parked.
    pub async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub fn resume(&self) {
        self.resumed.notify_one();
    }

    pub async fn region_count(&self) -> usize {
        self.inner.region_count().await
    }

    pub async fn allocation_count(&self, region_id: RegionId) -> Result<usize, AllocatorError> {
        self.inner.allocation_count(region_id).await
    }

    fn release_refused(&self, region_id: RegionId) -> Result<(), AllocatorError> {
        if self.fail_next_release.swap(false, Ordering::SeqCst) {
            return Err(AllocatorError::RegionNotFound(region_id));
        }
        Ok(())
    }
}

impl Allocator for FlakyAllocator {
    fn min_obj_size(&self) -> u64 {
        self.inner.min_obj_size()
    }

    async fn create_region(&self, name: &str, size: u64) -> Result<RegionId, AllocatorError> {
        self.inner.create_region(name, size).await
    }

    async fn destroy_region(&self, region_id: RegionId) -> Result<(), AllocatorError> {
        self.release_refused(region_id)?;
        self.inner.destroy_region(region_id).await
    }

    async fn resize_region(&self, region_id: RegionId, size: u64) -> Result<(), AllocatorError> {
        self.inner.resize_region(region_id, size).await
    }

    async fn allocate(&self, region_id: RegionId, size: u64) -> Result<Allocation, AllocatorError> {
        self.inner.allocate(region_id, size).await
    }

    async fn deallocate(&self, region_id: RegionId, offset: u64) -> Result<(), AllocatorError> {
        self.release_refused(region_id)?;
        self.inner.deallocate(region_id, offset).await
    }

    async fn get_local_pointer(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Result<LocalPointer, AllocatorError> {
        if self.hold_next_local_pointer.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.resumed.notified().await;
        }
        self.inner.get_local_pointer(region_id, offset).await
    }

    async fn finalize(&self) -> Result<(), AllocatorError> {
        self.inner.finalize().await
    }
}

impl MetadataManager for FlakyMetadata {
    async fn find_region(&self, region_id: RegionId) -> Result<RegionMetadata, MetadataError> {
        self.inner.find_region(region_id).await
    }

    async fn find_region_by_name(&self, name: &str) -> Result<RegionMetadata, MetadataError> {
        self.inner.find_region_by_name(name).await
    }

    async fn insert_region(&self, region: RegionMetadata) -> Result<(), MetadataError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(MetadataError::RegionExists(region.region_id));
        }
        self.inner.insert_region(region).await
    }

    async fn modify_region(&self, region: RegionMetadata) -> Result<(), MetadataError> {
        if self.fail_next_modify.swap(false, Ordering::SeqCst) {
            return Err(MetadataError::RegionNotFound(region.region_id));
        }
        self.inner.modify_region(region).await
    }

    async fn delete_region(&self, region_id: RegionId) -> Result<(), MetadataError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(MetadataError::RegionNotFound(region_id));
        }
        self.inner.delete_region(region_id).await
    }

    async fn find_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> Result<DataitemMetadata, MetadataError> {
        self.inner.find_dataitem(dataitem_id, region_id).await
    }

    async fn find_dataitem_by_name(
        &self,
        name: &str,
        region_id: RegionId,
    ) -> Result<DataitemMetadata, MetadataError> {
        self.inner.find_dataitem_by_name(name, region_id).await
    }

    async fn insert_dataitem(&self, dataitem: DataitemMetadata) -> Result<(), MetadataError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(MetadataError::DataitemExists(
                dataitem.dataitem_id,
                dataitem.region_id,
            ));
        }
        self.inner.insert_dataitem(dataitem).await
    }

    async fn modify_dataitem(&self, dataitem: DataitemMetadata) -> Result<(), MetadataError> {
        self.inner.modify_dataitem(dataitem).await
    }

    async fn delete_dataitem(
        &self,
        dataitem_id: DataitemId,
        region_id: RegionId,
    ) -> Result<(), MetadataError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(MetadataError::DataitemNotFound(dataitem_id, region_id));
        }
        self.inner.delete_dataitem(dataitem_id, region_id).await
    }

    fn max_key_len(&self) -> usize {
        self.inner.max_key_len()
    }
}
