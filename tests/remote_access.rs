mod common;

use common::{create_cis, create_flaky_cis};
use famcislib::cis::CisError;
use famcislib::permission::{AccessMode, Permissions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::{sleep, timeout};

const OWNER: (u32, u32) = (1000, 100);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_in_one_region() -> Result<(), Box<dyn std::error::Error>> {
    let cis = Arc::new(create_cis()?);
    let perm = Permissions::from_mode(0o600);
    let region = cis
        .create_region("rdma", 1 << 16, perm, OWNER.0, OWNER.1)
        .await?;
    let first = cis
        .allocate("first", region, 256, perm, OWNER.0, OWNER.1)
        .await?;
    let second = cis
        .allocate("second", region, 256, perm, OWNER.0, OWNER.1)
        .await?;

    let mut tasks = vec![];
    for offset in [first.offset, second.offset] {
        let cis = cis.clone();
        tasks.push(tokio::spawn(async move {
            cis.register_dataitem_memory(region, offset, AccessMode::ReadWrite, OWNER.0, OWNER.1)
                .await
        }));
    }
    let first_handle = tasks.remove(0).await??;
    let second_handle = tasks.remove(0).await??;
    assert_ne!(first_handle.rkey, second_handle.rkey);
    assert_eq!(first_handle.range.local_pointer, first.local_pointer);
    assert_eq!(second_handle.range.local_pointer, second.local_pointer);

    assert_eq!(
        cis.lookup_dataitem_memory(region, first.offset, AccessMode::ReadWrite)
            .await,
        Some(first_handle)
    );
    assert_eq!(
        cis.lookup_dataitem_memory(region, second.offset, AccessMode::ReadWrite)
            .await,
        Some(second_handle)
    );

    //Deallocating the first takes its registration with it, the second is untouched
    cis.deallocate(region, first.offset, OWNER.0, OWNER.1).await?;
    assert!(cis
        .lookup_dataitem_memory(region, first.offset, AccessMode::ReadWrite)
        .await
        .is_none());
    assert_eq!(
        cis.lookup_dataitem_memory(region, second.offset, AccessMode::ReadWrite)
            .await,
        Some(second_handle)
    );
    let transport = cis.registrations().transport();
    assert!(!transport.is_live(first_handle.rkey).await);
    assert!(transport.is_live(second_handle.rkey).await);
    Ok(())
}

#[tokio::test]
async fn destroy_region_tears_down_registrations() -> Result<(), Box<dyn std::error::Error>> {
    let cis = create_cis()?;
    let perm = Permissions::from_mode(0o600);
    let region = cis
        .create_region("teardown", 4096, perm, OWNER.0, OWNER.1)
        .await?;
    for name in ["a", "b", "c"] {
        let item = cis.allocate(name, region, 10, perm, OWNER.0, OWNER.1).await?;
        cis.register_dataitem_memory(region, item.offset, AccessMode::Read, OWNER.0, OWNER.1)
            .await?;
    }
    assert_eq!(cis.registrations().registered_count(region).await, 3);

    //A failing deregistration does not keep the region alive
    cis.registrations().transport().fail_next_deregister();
    cis.destroy_region(region, OWNER.0, OWNER.1).await?;

    assert_eq!(cis.registrations().registered_count(region).await, 0);
    assert_eq!(cis.registrations().region_count().await, 0);
    assert_eq!(cis.registrations().transport().live_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn explicit_deregistration_keeps_item() -> Result<(), Box<dyn std::error::Error>> {
    let cis = create_cis()?;
    let perm = Permissions::from_mode(0o600);
    let region = cis
        .create_region("explicit", 4096, perm, OWNER.0, OWNER.1)
        .await?;
    let item = cis.allocate("item", region, 10, perm, OWNER.0, OWNER.1).await?;
    let handle = cis
        .register_dataitem_memory(region, item.offset, AccessMode::Read, OWNER.0, OWNER.1)
        .await?;

    let result = cis.deregister_dataitem_memory(region, item.offset).await;
    assert_eq!(result.removed, 1);
    assert!(result.is_clean());
    cis.get_dataitem_by_offset(region, item.offset).await?;

    let again = cis
        .register_dataitem_memory(region, item.offset, AccessMode::Read, OWNER.0, OWNER.1)
        .await?;
    assert_ne!(handle.rkey, again.rkey);
    Ok(())
}

#[tokio::test]
async fn registration_needs_existing_item() -> Result<(), Box<dyn std::error::Error>> {
    let cis = create_cis()?;
    let perm = Permissions::from_mode(0o600);
    let region = cis
        .create_region("missing", 4096, perm, OWNER.0, OWNER.1)
        .await?;
    assert!(matches!(
        cis.register_dataitem_memory(region, 0, AccessMode::Read, OWNER.0, OWNER.1)
            .await,
        Err(CisError::DataitemNotFound(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cas_lock_same_shard_serializes() -> Result<(), Box<dyn std::error::Error>> {
    let cis = Arc::new(create_cis()?);
    let shards = cis.config().cas_lock_count as u64;

    //Different offsets, same shard
    let offsets: Vec<u64> = (0..8).map(|i| 64 + i * shards * 8).collect();
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let mut tasks = vec![];
    for offset in offsets {
        let cis = cis.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        tasks.push(tokio::spawn(async move {
            let guard = cis.acquire_cas_lock(offset).await;
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            max_inside.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(5)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            cis.release_cas_lock(guard);
        }));
    }
    for t in tasks {
        t.await?;
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cas_lock_distinct_shards_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let cis = Arc::new(create_cis()?);
    let barrier = Arc::new(Barrier::new(2));

    //Both tasks must be inside their critical sections at once to pass the barrier
    let mut tasks = vec![];
    for offset in [0u64, 8] {
        let cis = cis.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            let guard = cis.acquire_cas_lock(offset).await;
            barrier.wait().await;
            cis.release_cas_lock(guard);
        }));
    }
    for t in tasks {
        timeout(Duration::from_secs(5), t).await??;
    }
    Ok(())
}

#[tokio::test]
async fn finalize_drops_everything() -> Result<(), Box<dyn std::error::Error>> {
    let cis = create_cis()?;
    let perm = Permissions::from_mode(0o600);
    for r in 0..3 {
        let region = cis
            .create_region(&format!("fin_{0}", r), 4096, perm, OWNER.0, OWNER.1)
            .await?;
        let item = cis.allocate("item", region, 10, perm, OWNER.0, OWNER.1).await?;
        cis.register_dataitem_memory(region, item.offset, AccessMode::ReadWrite, OWNER.0, OWNER.1)
            .await?;
    }

    let result = cis.finalize().await?;
    assert_eq!(result.removed, 3);
    assert!(result.is_clean());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deallocate_during_registration_leaves_nothing() -> Result<(), Box<dyn std::error::Error>>
{
    let cis = Arc::new(create_flaky_cis()?);
    let perm = Permissions::from_mode(0o600);
    let region = cis.create_region("racy", 4096, perm, OWNER.0, OWNER.1).await?;
    let item = cis.allocate("racy", region, 10, perm, OWNER.0, OWNER.1).await?;

    //Park the registration after its existence check, then free the item underneath it
    cis.allocator().hold_next_local_pointer();
    let registering = {
        let cis = cis.clone();
        tokio::spawn(async move {
            cis.register_dataitem_memory(
                region,
                item.offset,
                AccessMode::ReadWrite,
                OWNER.0,
                OWNER.1,
            )
            .await
        })
    };
    cis.allocator().wait_held().await;
    cis.deallocate(region, item.offset, OWNER.0, OWNER.1).await?;
    cis.allocator().resume();

    assert!(matches!(
        registering.await?,
        Err(CisError::DataitemNotFound(_))
    ));
    assert!(cis
        .lookup_dataitem_memory(region, item.offset, AccessMode::ReadWrite)
        .await
        .is_none());
    assert_eq!(cis.registrations().region_count().await, 0);
    assert_eq!(cis.registrations().transport().live_count().await, 0);
    Ok(())
}
