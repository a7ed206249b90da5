//! Blocks-root verification against the beacon chain's historical
//! summaries. A period is marked (`blocks_root.bin`) only after the SSZ
//! root of its on-disk `blocks.ssz` matches the corresponding
//! `block_summary_root`.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::ssz::tree::{merkleize, pack_chunks};
use crate::types::chain::Fork;
use crate::types::error::{ColibriError, Result};

use super::period_data::{ROOT_LEN, SLOTS};
use super::PeriodStore;

#[derive(Debug, Deserialize)]
pub struct HistoricalSummariesResponse {
    pub data: HistoricalSummariesData,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalSummariesData {
    pub historical_summaries: Vec<HistoricalSummary>,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalSummary {
    pub block_summary_root: String,
    #[allow(dead_code)]
    pub state_summary_root: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub verified: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// SSZ root of a period's block roots: `Vector[bytes32, 8192]` over the
/// file content, zero-padded when short.
pub fn blocks_root(file_bytes: &[u8]) -> [u8; 32] {
    let mut padded;
    let bytes = if file_bytes.len() < SLOTS * ROOT_LEN {
        padded = file_bytes.to_vec();
        padded.resize(SLOTS * ROOT_LEN, 0);
        &padded[..]
    } else {
        &file_bytes[..SLOTS * ROOT_LEN]
    };
    merkleize(&pack_chunks(bytes), SLOTS)
}

impl PeriodStore {
    /// Verify every completed, unmarked period covered by the historical
    /// summaries stored for `head_period`. Reads run one at a time.
    pub async fn verify_blocks_roots(&self, head_period: u64) -> Result<VerifyStats> {
        let summaries_raw =
            tokio::fs::read(self.file_path(head_period, super::FILE_HISTORICAL)).await?;
        let summaries: HistoricalSummariesResponse = serde_json::from_slice(&summaries_raw)?;

        let bellatrix_epoch = self
            .inner
            .spec
            .fork_epoch(Fork::Bellatrix)
            .ok_or_else(|| ColibriError::Store("chain has no bellatrix epoch".into()))?;
        let offset_period = bellatrix_epoch >> self.inner.spec.epochs_per_period_bits;

        let periods: Vec<u64> = self.inner.index.lock().unwrap().periods().to_vec();
        let mut stats = VerifyStats::default();

        for period in periods {
            if period >= head_period {
                continue;
            }
            if self.file_exists(period, super::FILE_BLOCKS_ROOT) {
                stats.skipped += 1;
                continue;
            }
            let blocks_path = self.file_path(period, super::FILE_BLOCKS);
            let Ok(bytes) = tokio::fs::read(&blocks_path).await else {
                stats.skipped += 1;
                continue;
            };
            let computed = blocks_root(&bytes);

            let Some(entry) = period
                .checked_sub(offset_period)
                .and_then(|i| summaries.data.historical_summaries.get(i as usize))
            else {
                debug!(period, "no historical summary covers this period yet");
                stats.skipped += 1;
                continue;
            };
            let expected = parse_root(&entry.block_summary_root)?;

            if computed == expected {
                self.write_period_file(period, super::FILE_BLOCKS_ROOT, &computed).await?;
                stats.verified += 1;
            } else {
                warn!(
                    period,
                    computed = %hex::encode(computed),
                    expected = %hex::encode(expected),
                    "blocks root mismatch"
                );
                stats.failed += 1;
            }
        }

        self.inner.stats.periods_verified.fetch_add(stats.verified, std::sync::atomic::Ordering::Relaxed);
        self.inner.stats.periods_skipped.fetch_add(stats.skipped, std::sync::atomic::Ordering::Relaxed);
        self.inner.stats.periods_failed.fetch_add(stats.failed, std::sync::atomic::Ordering::Relaxed);
        info!(
            verified = stats.verified,
            skipped = stats.skipped,
            failed = stats.failed,
            "blocks-root verification pass complete"
        );
        Ok(stats)
    }
}

fn parse_root(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ColibriError::Upstream(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ColibriError::Upstream("summary root must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NodePool, NodePoolConfig};
    use crate::store::PeriodStoreConfig;
    use crate::types::chain::chain_spec;
    use std::sync::Arc;

    #[test]
    fn test_blocks_root_pads_short_files() {
        // A short file hashes identically to its zero-padded form.
        let mut content = vec![0u8; 64];
        content[..32].copy_from_slice(&[0xa5; 32]);
        let mut full = content.clone();
        full.resize(8192 * 32, 0);
        assert_eq!(blocks_root(&content), blocks_root(&full));
    }

    #[test]
    fn test_blocks_root_is_vector_root() {
        use crate::ssz::{catalog, hash_tree_root};
        let mut content = vec![0u8; 8192 * 32];
        content[123 * 32..124 * 32].copy_from_slice(&[0x42; 32]);
        assert_eq!(
            blocks_root(&content),
            hash_tree_root(&catalog::BLOCK_ROOTS, &content).unwrap()
        );
    }

    #[tokio::test]
    async fn test_verification_marks_matching_period() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let store = PeriodStore::new(PeriodStoreConfig::new(dir.path(), 1), pool).unwrap();

        let spec = chain_spec(1).unwrap();
        let offset = spec.fork_epoch(Fork::Bellatrix).unwrap() >> spec.epochs_per_period_bits;
        let good = offset; // summary index 0
        let bad = offset + 1; // summary index 1

        let mut good_blocks = vec![0u8; 8192 * 32];
        good_blocks[..32].copy_from_slice(&[0x11; 32]);
        store.write_period_file(good, crate::store::FILE_BLOCKS, &good_blocks).await.unwrap();
        store
            .write_period_file(bad, crate::store::FILE_BLOCKS, &vec![0x22u8; 8192 * 32])
            .await
            .unwrap();

        let head_period = bad + 1;
        let summaries = serde_json::json!({
            "data": {
                "historical_summaries": [
                    {
                        "block_summary_root": format!("0x{}", hex::encode(blocks_root(&good_blocks))),
                        "state_summary_root": format!("0x{}", "00".repeat(32)),
                    },
                    {
                        "block_summary_root": format!("0x{}", "ff".repeat(32)),
                        "state_summary_root": format!("0x{}", "00".repeat(32)),
                    },
                ]
            }
        });
        store
            .write_period_file(
                head_period,
                crate::store::FILE_HISTORICAL,
                summaries.to_string().as_bytes(),
            )
            .await
            .unwrap();

        let stats = store.verify_blocks_roots(head_period).await.unwrap();
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.failed, 1);
        // The marker holds the computed root.
        let marker =
            std::fs::read(store.file_path(good, crate::store::FILE_BLOCKS_ROOT)).unwrap();
        assert_eq!(marker, blocks_root(&good_blocks));
        assert!(!store.file_exists(bad, crate::store::FILE_BLOCKS_ROOT));

        // A second pass skips the marked period and re-fails the bad one.
        let stats = store.verify_blocks_roots(head_period).await.unwrap();
        assert_eq!(stats.verified, 0);
        assert!(stats.skipped >= 1);
        assert_eq!(stats.failed, 1);
    }
}
