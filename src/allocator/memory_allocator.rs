//! In-process allocator, a hashmap of heaps behind one lock.
//!
//! Every region gets its own slice of a simulated address space so local pointers never
//! overlap between regions. Inside a region placement is first fit over a free list,
//! falling back to bumping the high water mark.
use super::{Allocator, AllocatorError};
use crate::objects::{Allocation, LocalPointer, RegionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Address space reserved per region, also the largest size a region can grow to.
pub const REGION_ADDRESS_SPAN: u64 = 1 << 32;

#[derive(Debug)]
struct RegionHeap {
    base: LocalPointer,
    size: u64,
    high_water: u64,
    free: BTreeMap<u64, u64>,
    live: HashMap<u64, u64>,
}

impl RegionHeap {
    fn place(&mut self, len: u64) -> Option<u64> {
        let found = self
            .free
            .iter()
            .find(|(_, free_len)| **free_len >= len)
            .map(|(offset, free_len)| (*offset, *free_len));

        if let Some((offset, free_len)) = found {
            self.free.remove(&offset);
            if free_len > len {
                self.free.insert(offset + len, free_len - len);
            }
            self.live.insert(offset, len);
            return Some(offset);
        }

        let end = self.high_water.checked_add(len)?;
        if end > self.size {
            return None;
        }
        let offset = self.high_water;
        self.high_water = end;
        self.live.insert(offset, len);
        Some(offset)
    }

    fn release(&mut self, offset: u64) -> Option<()> {
        let mut len = self.live.remove(&offset)?;
        let mut start = offset;

        //Merge with the following block
        if let Some(next_len) = self.free.remove(&(start + len)) {
            len += next_len;
        }

        //Merge with the preceding block
        let prev = self.free.range(..start).next_back().map(|(o, l)| (*o, *l));
        if let Some((prev_offset, prev_len)) = prev {
            if prev_offset + prev_len == start {
                self.free.remove(&prev_offset);
                start = prev_offset;
                len += prev_len;
            }
        }

        if start + len == self.high_water {
            self.high_water = start;
        } else {
            self.free.insert(start, len);
        }
        Some(())
    }
}

#[derive(Debug)]
pub struct MemoryAllocator {
    min_obj_size: u64,
    next_region_id: AtomicU64,
    finalized: AtomicBool,
    heaps: RwLock<HashMap<RegionId, RegionHeap>>,
}

impl MemoryAllocator {
    pub fn new(min_obj_size: u64) -> Result<MemoryAllocator, AllocatorError> {
        if !min_obj_size.is_power_of_two() {
            return Err(AllocatorError::InvalidGranule(min_obj_size));
        }
        Ok(MemoryAllocator {
            min_obj_size,
            next_region_id: AtomicU64::new(1),
            finalized: AtomicBool::new(false),
            heaps: RwLock::new(HashMap::new()),
        })
    }

    fn check_live(&self) -> Result<(), AllocatorError> {
        if self.finalized.load(Ordering::SeqCst) {
            return Err(AllocatorError::Finalized());
        }
        Ok(())
    }

    fn round_up(&self, size: u64) -> Option<u64> {
        let granules = size.checked_add(self.min_obj_size - 1)? / self.min_obj_size;
        granules.checked_mul(self.min_obj_size)
    }

    pub async fn region_count(&self) -> usize {
        self.heaps.read().await.len()
    }

    /// Number of live allocations inside a region.
    pub async fn allocation_count(&self, region_id: RegionId) -> Result<usize, AllocatorError> {
        let heaps = self.heaps.read().await;
        let heap = heaps
            .get(&region_id)
            .ok_or(AllocatorError::RegionNotFound(region_id))?;
        Ok(heap.live.len())
    }
}

impl Allocator for MemoryAllocator {
    fn min_obj_size(&self) -> u64 {
        self.min_obj_size
    }

    async fn create_region(&self, name: &str, size: u64) -> Result<RegionId, AllocatorError> {
        self.check_live()?;
        if size == 0 {
            return Err(AllocatorError::InvalidSize(size));
        }
        if size > REGION_ADDRESS_SPAN {
            return Err(AllocatorError::RegionTooLarge(size));
        }

        let region_id = RegionId(self.next_region_id.fetch_add(1, Ordering::SeqCst));
        let base = region_id
            .get_u64()
            .checked_mul(REGION_ADDRESS_SPAN)
            .and_then(|b| usize::try_from(b).ok())
            .ok_or(AllocatorError::AddressSpaceExhausted())?;

        let heap = RegionHeap {
            base: LocalPointer(base),
            size,
            high_water: 0,
            free: BTreeMap::new(),
            live: HashMap::new(),
        };
        self.heaps.write().await.insert(region_id, heap);
        debug!("Allocator created region {0} ({1}) of {2} bytes", region_id, name, size);
        Ok(region_id)
    }

    async fn destroy_region(&self, region_id: RegionId) -> Result<(), AllocatorError> {
        self.check_live()?;
        match self.heaps.write().await.remove(&region_id) {
            Some(_) => Ok(()),
            None => Err(AllocatorError::RegionNotFound(region_id)),
        }
    }

    async fn resize_region(&self, region_id: RegionId, size: u64) -> Result<(), AllocatorError> {
        self.check_live()?;
        if size == 0 {
            return Err(AllocatorError::InvalidSize(size));
        }
        if size > REGION_ADDRESS_SPAN {
            return Err(AllocatorError::RegionTooLarge(size));
        }

        let mut heaps = self.heaps.write().await;
        let heap = heaps
            .get_mut(&region_id)
            .ok_or(AllocatorError::RegionNotFound(region_id))?;
        if size < heap.high_water {
            return Err(AllocatorError::ResizeBelowUsage(
                region_id,
                size,
                heap.high_water,
            ));
        }
        heap.size = size;
        Ok(())
    }

    async fn allocate(&self, region_id: RegionId, size: u64) -> Result<Allocation, AllocatorError> {
        self.check_live()?;
        let len = match self.round_up(size) {
            Some(l) if l != 0 => l,
            _ => return Err(AllocatorError::InvalidSize(size)),
        };

        let mut heaps = self.heaps.write().await;
        let heap = heaps
            .get_mut(&region_id)
            .ok_or(AllocatorError::RegionNotFound(region_id))?;
        let offset = heap.place(len).ok_or(AllocatorError::NoSpace(region_id, size))?;
        let local_pointer = heap
            .base
            .checked_add(offset)
            .ok_or(AllocatorError::OutOfRange(region_id, offset))?;

        Ok(Allocation {
            offset,
            local_pointer,
        })
    }

    async fn deallocate(&self, region_id: RegionId, offset: u64) -> Result<(), AllocatorError> {
        self.check_live()?;
        let mut heaps = self.heaps.write().await;
        let heap = heaps
            .get_mut(&region_id)
            .ok_or(AllocatorError::RegionNotFound(region_id))?;
        heap.release(offset)
            .ok_or(AllocatorError::NotAllocated(region_id, offset))
    }

    async fn get_local_pointer(
        &self,
        region_id: RegionId,
        offset: u64,
    ) -> Result<LocalPointer, AllocatorError> {
        self.check_live()?;
        let heaps = self.heaps.read().await;
        let heap = heaps
            .get(&region_id)
            .ok_or(AllocatorError::RegionNotFound(region_id))?;
        if offset >= heap.size {
            return Err(AllocatorError::OutOfRange(region_id, offset));
        }
        heap.base
            .checked_add(offset)
            .ok_or(AllocatorError::OutOfRange(region_id, offset))
    }

    async fn finalize(&self) -> Result<(), AllocatorError> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(AllocatorError::Finalized());
        }
        let mut heaps = self.heaps.write().await;
        info!("Allocator finalized with {0} regions still present", heaps.len());
        heaps.clear();
        Ok(())
    }
}
