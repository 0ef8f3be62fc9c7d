//! Test fixtures for Amber development.
//!
//! Provides [`TestPool`], a pool formatted in a fresh temporary
//! directory with test-friendly sizes, plus reopen helpers for
//! round-trip and crash-recovery tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use amber_heap::{Pool, PoolConfig, RecoveryReport};
use tempfile::TempDir;

/// A pool backed by a fresh temporary directory.
///
/// The directory lives as long as the fixture, so the backing file can
/// be closed and reopened any number of times within one test.
pub struct TestPool {
    _dir: TempDir,
    config: PoolConfig,
    pool: Option<Pool>,
}

impl TestPool {
    /// Layout tag every fixture pool is formatted with.
    pub const LAYOUT: &'static str = "AMBERTEST";

    /// Default fixture pool size: 1 MiB.
    pub const POOL_SIZE: u64 = 1 << 20;

    /// Default fixture log size: 64 KiB.
    pub const LOG_SIZE: u64 = 64 * 1024;

    /// Format a fresh pool with the default fixture sizes.
    pub fn create() -> Self {
        Self::with_sizes(Self::POOL_SIZE, Self::LOG_SIZE)
    }

    /// Format a fresh pool with explicit sizes.
    pub fn with_sizes(pool_size: u64, log_size: u64) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = PoolConfig::new(dir.path().join("pool"), Self::LAYOUT)
            .with_size(pool_size)
            .with_log_size(log_size);
        let pool = Pool::create(&config).expect("create test pool");
        Self {
            _dir: dir,
            config,
            pool: Some(pool),
        }
    }

    /// The live pool.
    pub fn pool(&self) -> &Pool {
        self.pool.as_ref().expect("pool is open")
    }

    /// The live pool, mutably.
    pub fn pool_mut(&mut self) -> &mut Pool {
        self.pool.as_mut().expect("pool is open")
    }

    /// The config the fixture pool was formatted with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Drop the mapping and open the file again, running recovery —
    /// exactly what a process restart does. Works equally after a
    /// clean run or a simulated crash.
    pub fn reopen(&mut self) {
        self.pool = None;
        self.pool = Some(Pool::open(&self.config).expect("reopen test pool"));
    }

    /// What recovery did at the most recent open.
    pub fn recovery(&self) -> RecoveryReport {
        self.pool().recovery_report()
    }
}
