//! On-disk period store: beacon block roots and truncated headers organized
//! in 8192-slot period directories, plus light-client artifacts and zk
//! proofs per period.

pub mod backfill;
pub mod index;
pub mod lcu;
pub mod metrics;
pub mod period_data;
pub mod sync;
pub mod verify;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::NodePool;
use crate::types::chain::{chain_spec, ChainSpec};
use crate::types::error::{ColibriError, Result};

pub const FILE_BLOCKS: &str = "blocks.ssz";
pub const FILE_HEADERS: &str = "headers.ssz";
pub const FILE_LCU: &str = "lcu.ssz";
pub const FILE_LCB: &str = "lcb.ssz";
pub const FILE_HISTORICAL: &str = "historical_root.json";
pub const FILE_BLOCKS_ROOT: &str = "blocks_root.bin";
pub const FILE_SYNC_INPUT: &str = "sync.ssz";
pub const FILE_ZK_PROOF_G16: &str = "zk_proof_g16.bin";
pub const FILE_ZK_PUB: &str = "zk_pub.bin";
pub const FILE_ZK_VK: &str = "zk_vk.bin";
pub const FILE_ZK_PROOF: &str = "zk_proof.bin";
pub const FILE_ZK_VK_RAW: &str = "zk_vk_raw.bin";
pub const FILE_ZK_PROOF_SSZ: &str = "zk_proof.ssz";

/// Fixed artifact names a period directory may contain; everything else is
/// ignored during scans.
pub const PERIOD_FILES: &[&str] = &[
    FILE_BLOCKS,
    FILE_HEADERS,
    FILE_LCU,
    FILE_LCB,
    FILE_HISTORICAL,
    FILE_BLOCKS_ROOT,
    FILE_SYNC_INPUT,
    FILE_ZK_PROOF_G16,
    FILE_ZK_PUB,
    FILE_ZK_VK,
    FILE_ZK_PROOF,
    FILE_ZK_VK_RAW,
    FILE_ZK_PROOF_SSZ,
];

#[derive(Debug, Clone)]
pub struct PeriodStoreConfig {
    pub base_dir: PathBuf,
    pub chain_id: u64,
    /// Backfill window in periods behind the head; 0 disables backfill.
    pub backfill_max_periods: u32,
    /// Pacing between backfill header fetches, for rate-limited APIs.
    pub backfill_delay_ms: u64,
    /// Slave mode: mirror this master instead of proving locally.
    pub master_url: Option<String>,
}

impl PeriodStoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>, chain_id: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            chain_id,
            backfill_max_periods: 2,
            backfill_delay_ms: 0,
            master_url: None,
        }
    }
}

pub(crate) struct StoreInner {
    pub cfg: PeriodStoreConfig,
    pub spec: &'static ChainSpec,
    pub pool: Arc<NodePool>,
    pub queue: Mutex<writer::WriteQueue>,
    pub slabs: Mutex<period_data::SlabCache>,
    pub index: Mutex<index::PeriodIndex>,
    pub stats: metrics::SyncStats,
    pub backfill: Mutex<backfill::BackfillState>,
    pub full_sync_busy: AtomicBool,
    pub last_checked_period: AtomicU64,
    pub head_period: AtomicU64,
    pub latest_head_slot: AtomicU64,
}

#[derive(Clone)]
pub struct PeriodStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl PeriodStore {
    pub fn new(cfg: PeriodStoreConfig, pool: Arc<NodePool>) -> Result<Self> {
        let spec = chain_spec(cfg.chain_id).ok_or(ColibriError::UnsupportedChain(cfg.chain_id))?;
        std::fs::create_dir_all(&cfg.base_dir)?;
        let index = index::PeriodIndex::scan(&cfg.base_dir);
        Ok(Self {
            inner: Arc::new(StoreInner {
                spec,
                pool,
                queue: Mutex::new(writer::WriteQueue::default()),
                slabs: Mutex::new(period_data::SlabCache::default()),
                index: Mutex::new(index),
                stats: metrics::SyncStats::default(),
                backfill: Mutex::new(backfill::BackfillState::default()),
                full_sync_busy: AtomicBool::new(false),
                last_checked_period: AtomicU64::new(u64::MAX),
                head_period: AtomicU64::new(0),
                latest_head_slot: AtomicU64::new(0),
                cfg,
            }),
        })
    }

    pub fn config(&self) -> &PeriodStoreConfig {
        &self.inner.cfg
    }

    pub fn spec(&self) -> &'static ChainSpec {
        self.inner.spec
    }

    pub fn stats(&self) -> &metrics::SyncStats {
        &self.inner.stats
    }

    pub fn base_dir(&self) -> &Path {
        &self.inner.cfg.base_dir
    }

    pub fn period_dir(&self, period: u64) -> PathBuf {
        self.inner.cfg.base_dir.join(period.to_string())
    }

    pub fn file_path(&self, period: u64, name: &str) -> PathBuf {
        self.period_dir(period).join(name)
    }

    pub fn file_exists(&self, period: u64, name: &str) -> bool {
        self.file_path(period, name).is_file()
    }

    pub fn has_gaps(&self) -> bool {
        self.inner.index.lock().unwrap().has_gaps()
    }

    /// Create the period directory when first touched; the last-created
    /// period is cached to keep the head path cheap.
    pub(crate) async fn ensure_period_dir(&self, period: u64) -> Result<()> {
        if self.inner.last_checked_period.load(Ordering::Relaxed) == period {
            return Ok(());
        }
        tokio::fs::create_dir_all(self.period_dir(period)).await?;
        self.inner.last_checked_period.store(period, Ordering::Relaxed);
        self.inner.index.lock().unwrap().insert(period);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NodePoolConfig;

    fn test_store() -> (tempfile::TempDir, PeriodStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let cfg = PeriodStoreConfig::new(dir.path(), 1);
        let store = PeriodStore::new(cfg, pool).unwrap();
        (dir, store)
    }

    #[test]
    fn test_period_paths() {
        let (_dir, store) = test_store();
        assert!(store.period_dir(42).ends_with("42"));
        assert!(store.file_path(42, FILE_LCU).ends_with("42/lcu.ssz"));
        assert!(!store.file_exists(42, FILE_LCU));
    }

    #[tokio::test]
    async fn test_ensure_period_dir_registers_index() {
        let (_dir, store) = test_store();
        store.ensure_period_dir(7).await.unwrap();
        assert!(store.period_dir(7).is_dir());
        assert!(store.inner.index.lock().unwrap().contains(7));
        // Second call takes the cached path.
        store.ensure_period_dir(7).await.unwrap();
    }
}
