//! Pool configuration parameters.

use std::path::PathBuf;

use amber_core::HeapError;

use crate::layout::{self, HEADER_PAGE, HEAP_META_SIZE};

/// Configuration for creating or opening a [`Pool`](crate::Pool).
///
/// Validated at create time; all values are immutable once the pool
/// file is formatted. Opening an existing pool validates the stored
/// layout tag against `layout` and ignores the size fields.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Path of the backing file.
    pub path: PathBuf,

    /// Total pool size in bytes, header and log included.
    ///
    /// Default: 256 MiB, matching the fixed size the demo driver
    /// formats on first run.
    pub size: u64,

    /// Layout identifier stored in the header and validated on every
    /// open. At most 32 bytes of UTF-8.
    pub layout: String,

    /// Size of the undo-log region in bytes.
    ///
    /// Bounds the number of bytes a single transaction may overwrite;
    /// a transaction that outgrows it fails with `LogOverflow`.
    pub log_size: u64,
}

impl PoolConfig {
    /// Default total pool size: 256 MiB.
    pub const DEFAULT_POOL_SIZE: u64 = 256 * 1024 * 1024;

    /// Default undo-log region size: 256 KiB.
    pub const DEFAULT_LOG_SIZE: u64 = 256 * 1024;

    /// Smallest pool this implementation will format.
    pub const MIN_POOL_SIZE: u64 = 64 * 1024;

    /// Smallest undo-log region this implementation will format.
    pub const MIN_LOG_SIZE: u64 = 4096;

    /// Create a config for the given path and layout tag with default
    /// sizes.
    pub fn new(path: impl Into<PathBuf>, layout: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: Self::DEFAULT_POOL_SIZE,
            layout: layout.into(),
            log_size: Self::DEFAULT_LOG_SIZE,
        }
    }

    /// Replace the total pool size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Replace the undo-log region size.
    pub fn with_log_size(mut self, log_size: u64) -> Self {
        self.log_size = log_size;
        self
    }

    /// Check the config is formattable: tag fits its header field and
    /// the geometry leaves a non-empty heap.
    pub(crate) fn validate(&self) -> Result<(), HeapError> {
        layout::encode_layout_tag(&self.layout)?;
        if self.size < Self::MIN_POOL_SIZE {
            return Err(HeapError::Corrupt {
                detail: format!(
                    "pool size {} below minimum {}",
                    self.size,
                    Self::MIN_POOL_SIZE
                ),
            });
        }
        if self.log_size < Self::MIN_LOG_SIZE {
            return Err(HeapError::Corrupt {
                detail: format!(
                    "log size {} below minimum {}",
                    self.log_size,
                    Self::MIN_LOG_SIZE
                ),
            });
        }
        let heap_offset = HEADER_PAGE + self.log_size;
        if heap_offset + HEAP_META_SIZE >= self.size {
            return Err(HeapError::Corrupt {
                detail: format!(
                    "log size {} leaves no heap in a {}-byte pool",
                    self.log_size, self.size
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LAYOUT_TAG_LEN;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::new("/tmp/pool", "LISTPOOL");
        assert!(config.validate().is_ok());
        assert_eq!(config.size, 256 * 1024 * 1024);
    }

    #[test]
    fn oversized_layout_tag_rejected() {
        let config = PoolConfig::new("/tmp/pool", "x".repeat(LAYOUT_TAG_LEN + 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_bigger_than_pool_rejected() {
        let config = PoolConfig::new("/tmp/pool", "L")
            .with_size(PoolConfig::MIN_POOL_SIZE)
            .with_log_size(PoolConfig::MIN_POOL_SIZE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = PoolConfig::new("/tmp/pool", "L")
            .with_size(1 << 20)
            .with_log_size(8192);
        assert_eq!(config.size, 1 << 20);
        assert_eq!(config.log_size, 8192);
    }
}
