//! Integration test: pool lifecycle and open-time validation.

use std::fs;

use amber_core::HeapError;
use amber_heap::{Pool, PoolConfig, RootSlot};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> PoolConfig {
    PoolConfig::new(dir.path().join("pool"), "LIFECYCLE")
        .with_size(1 << 20)
        .with_log_size(64 * 1024)
}

#[test]
fn open_or_create_dispatches_on_file_presence() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let (pool, created) = Pool::open_or_create(&config).unwrap();
    assert!(created);
    assert_eq!(pool.layout(), "LIFECYCLE");
    drop(pool);

    let (pool, created) = Pool::open_or_create(&config).unwrap();
    assert!(!created);
    assert_eq!(pool.size(), 1 << 20);
}

#[test]
fn corrupt_magic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    drop(Pool::create(&config).unwrap());

    let mut bytes = fs::read(&config.path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&config.path, &bytes).unwrap();

    assert!(matches!(
        Pool::open(&config),
        Err(HeapError::Corrupt { .. })
    ));
}

#[test]
fn corrupt_format_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    drop(Pool::create(&config).unwrap());

    let mut bytes = fs::read(&config.path).unwrap();
    bytes[8] = 0xEE; // format version word
    fs::write(&config.path, &bytes).unwrap();

    match Pool::open(&config) {
        Err(HeapError::Corrupt { detail }) => {
            assert!(detail.contains("format version"), "wrong detail: {detail}");
        }
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[test]
fn truncated_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    drop(Pool::create(&config).unwrap());

    let bytes = fs::read(&config.path).unwrap();
    fs::write(&config.path, &bytes[..2048]).unwrap();

    assert!(matches!(
        Pool::open(&config),
        Err(HeapError::Corrupt { .. })
    ));
}

#[test]
fn shrunk_file_fails_geometry_check() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    drop(Pool::create(&config).unwrap());

    // Keep the header intact but cut the file short of its recorded size.
    let bytes = fs::read(&config.path).unwrap();
    fs::write(&config.path, &bytes[..(1 << 19)]).unwrap();

    assert!(matches!(
        Pool::open(&config),
        Err(HeapError::Corrupt { .. })
    ));
}

#[test]
fn root_slots_default_to_null() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let pool = Pool::create(&config).unwrap();
    for slot in [
        RootSlot::List,
        RootSlot::Vector,
        RootSlot::Text,
        RootSlot::Table,
    ] {
        assert!(pool.root_ptr::<u64>(slot).is_null());
    }
}

#[test]
fn root_slots_are_independent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    {
        let mut pool = Pool::create(&config).unwrap();
        pool.run::<_, HeapError>(|tx| {
            let a = tx.alloc_value(&1i64)?;
            let b = tx.alloc_value(&2i64)?;
            tx.set_root_ptr(RootSlot::List, a)?;
            tx.set_root_ptr(RootSlot::Table, b)
        })
        .unwrap();
    }
    let pool = Pool::open(&config).unwrap();
    let a = pool.root_ptr::<i64>(RootSlot::List);
    let b = pool.root_ptr::<i64>(RootSlot::Table);
    assert_eq!(pool.load(a), 1);
    assert_eq!(pool.load(b), 2);
    assert!(pool.root_ptr::<i64>(RootSlot::Vector).is_null());
    assert!(pool.root_ptr::<i64>(RootSlot::Text).is_null());
}

#[test]
fn stats_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let before = {
        let mut pool = Pool::create(&config).unwrap();
        pool.run::<_, HeapError>(|tx| {
            let p = tx.alloc_bytes(256)?;
            let q = tx.alloc_bytes(64)?;
            tx.free(q)?;
            tx.set_root_ptr(RootSlot::List, p)
        })
        .unwrap();
        pool.stats()
    };
    let pool = Pool::open(&config).unwrap();
    assert_eq!(pool.stats(), before);
}
