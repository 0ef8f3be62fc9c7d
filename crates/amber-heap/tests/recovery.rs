//! Integration test: crash-atomicity of the transaction substrate.
//!
//! Simulates a crash after every possible prefix of a transaction's
//! tracked writes, reopens the pool file, and verifies that recovery
//! restores the exact pre-transaction state — then verifies that a
//! committed transaction is fully durable across reopen.

use amber_core::HeapError;
use amber_heap::{Pool, PoolConfig, PPtr, RootSlot};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> PoolConfig {
    PoolConfig::new(dir.path().join("pool"), "RECOVERY")
        .with_size(1 << 20)
        .with_log_size(64 * 1024)
}

/// A multi-word mutation: allocate a block, store into it, repoint a
/// root slot, and free the previously rooted block.
fn swap_rooted_value(pool: &mut Pool, value: i64) -> Result<(), HeapError> {
    pool.run(|tx| {
        let old: PPtr<i64> = tx.root_ptr(RootSlot::List);
        let fresh = tx.alloc_value(&value)?;
        tx.set_root_ptr(RootSlot::List, fresh)?;
        if !old.is_null() {
            tx.free(old)?;
        }
        Ok(())
    })
}

fn rooted_value(pool: &Pool) -> Option<i64> {
    let ptr: PPtr<i64> = pool.root_ptr(RootSlot::List);
    if ptr.is_null() {
        None
    } else {
        Some(pool.load(ptr))
    }
}

#[test]
fn crash_at_every_write_prefix_rolls_back_to_old_state() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut pool = Pool::create(&config).unwrap();
    swap_rooted_value(&mut pool, 1).unwrap();
    let before_stats = pool.stats();

    let mut crashes = 0;
    loop {
        pool.fail_after_tracked_writes(Some(crashes));
        match swap_rooted_value(&mut pool, 2) {
            Err(HeapError::CrashPoint { .. }) => {
                crashes += 1;
                drop(pool);
                pool = Pool::open(&config).unwrap();
                assert!(
                    pool.recovery_report().rolled_back,
                    "reopen after a torn transaction must roll back"
                );
                assert_eq!(
                    rooted_value(&pool),
                    Some(1),
                    "crash after {crashes} writes must leave the old value"
                );
                assert_eq!(
                    pool.stats(),
                    before_stats,
                    "allocator bookkeeping must also roll back"
                );
            }
            Ok(()) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(crashes > 0, "the mutation must perform tracked writes");
    assert_eq!(rooted_value(&pool), Some(2));
}

#[test]
fn committed_transaction_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    {
        let mut pool = Pool::create(&config).unwrap();
        swap_rooted_value(&mut pool, 41).unwrap();
        swap_rooted_value(&mut pool, 42).unwrap();
    }
    let pool = Pool::open(&config).unwrap();
    assert!(!pool.recovery_report().rolled_back);
    assert_eq!(rooted_value(&pool), Some(42));
}

#[test]
fn recovery_reports_replayed_entry_count() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut pool = Pool::create(&config).unwrap();
    swap_rooted_value(&mut pool, 7).unwrap();

    // Crash deep into the next mutation so several entries exist.
    pool.fail_after_tracked_writes(Some(3));
    let result = swap_rooted_value(&mut pool, 8);
    assert!(matches!(result, Err(HeapError::CrashPoint { .. })));
    drop(pool);

    let pool = Pool::open(&config).unwrap();
    let report = pool.recovery_report();
    assert!(report.rolled_back);
    assert!(report.entries_replayed > 0);
    assert_eq!(rooted_value(&pool), Some(7));
}

#[test]
fn log_overflow_rolls_back_cleanly() {
    let dir = TempDir::new().unwrap();
    // 64 KiB of log cannot hold two 40 KiB undo images.
    let config = test_config(&dir);
    let mut pool = Pool::create(&config).unwrap();

    // Two large committed blocks, then freed: the next transaction
    // recycles them, so overwriting them must be undo-logged in full.
    let (a, b) = pool
        .run::<_, HeapError>(|tx| {
            let a = tx.alloc_bytes(40 * 1024)?;
            let b = tx.alloc_bytes(40 * 1024)?;
            Ok((a, b))
        })
        .unwrap();
    pool.run::<_, HeapError>(|tx| {
        tx.free(a)?;
        tx.free(b)
    })
    .unwrap();
    let before = pool.stats();

    let result: Result<(), HeapError> = pool.run(|tx| {
        tx.alloc_zeroed(40 * 1024)?;
        tx.alloc_zeroed(40 * 1024)?;
        Ok(())
    });
    assert!(matches!(result, Err(HeapError::LogOverflow { .. })));
    assert_eq!(pool.stats(), before, "overflow must roll back in full");

    // The pool stays usable for transactions that fit the log.
    pool.run::<_, HeapError>(|tx| {
        tx.alloc_zeroed(1024).map(|_| ())
    })
    .unwrap();
}

#[test]
fn poisoned_pool_refuses_further_transactions() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut pool = Pool::create(&config).unwrap();
    pool.fail_after_tracked_writes(Some(0));
    assert!(swap_rooted_value(&mut pool, 1).is_err());
    assert!(pool.is_poisoned());
    assert!(matches!(
        swap_rooted_value(&mut pool, 1),
        Err(HeapError::Poisoned)
    ));
}

#[test]
fn repeated_crash_reopen_cycles_preserve_state() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let mut pool = Pool::create(&config).unwrap();
    swap_rooted_value(&mut pool, 100).unwrap();

    for k in 0..4 {
        pool.fail_after_tracked_writes(Some(k));
        let _ = swap_rooted_value(&mut pool, 200 + k as i64);
        drop(pool);
        pool = Pool::open(&config).unwrap();
        assert_eq!(rooted_value(&pool), Some(100));
    }

    swap_rooted_value(&mut pool, 300).unwrap();
    drop(pool);
    let pool = Pool::open(&config).unwrap();
    assert_eq!(rooted_value(&pool), Some(300));
}
