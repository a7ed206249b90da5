//! Master/slave full sync.
//!
//! The master serves an SSZ manifest of `{period, filename, length}`
//! entries; a slave walks it sequentially, appending ranged downloads to
//! its local copies. Verified data (`blocks.ssz`/`headers.ssz` under a
//! present `blocks_root.bin`) is never appended to, only replaced whole.

use std::sync::atomic::Ordering;

use tracing::{info, warn};

use crate::shutdown;
use crate::ssz::{self, catalog, Ssz};
use crate::types::error::{ColibriError, Result};

use super::PeriodStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub period: u64,
    pub filename: String,
    pub length: u32,
}

pub fn encode_manifest(entries: &[ManifestEntry]) -> Result<Vec<u8>> {
    let items = entries
        .iter()
        .take(catalog::MANIFEST_MAX_ENTRIES)
        .map(|e| {
            ssz::Value::Items(vec![
                ssz::Value::Uint(e.period),
                ssz::Value::Bytes(e.filename.as_bytes().to_vec()),
                ssz::Value::Uint(e.length as u64),
            ])
        })
        .collect();
    ssz::encode(&catalog::MANIFEST, &ssz::Value::Items(items))
}

pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ManifestEntry>> {
    let view = Ssz::new(&catalog::MANIFEST, bytes);
    view.validate()?;
    let mut entries = Vec::with_capacity(view.len()?);
    for i in 0..view.len()? {
        let entry = view.at(i)?;
        let filename = String::from_utf8(entry.field("filename")?.bytes.to_vec())
            .map_err(|_| ColibriError::Ssz("manifest filename is not utf-8".into()))?;
        entries.push(ManifestEntry {
            period: entry.field("period")?.as_u64()?,
            filename,
            length: entry.field("length")?.as_u64()? as u32,
        });
    }
    Ok(entries)
}

impl PeriodStore {
    /// Manifest of all period artifacts from `start` on, capped at 10000
    /// entries. Only the fixed artifact names are listed.
    pub async fn build_manifest(&self, start: u64) -> Result<Vec<u8>> {
        let periods: Vec<u64> = self.inner.index.lock().unwrap().periods().to_vec();
        let mut entries = Vec::new();
        'outer: for period in periods.into_iter().filter(|p| *p >= start) {
            for name in super::PERIOD_FILES {
                if let Ok(meta) = tokio::fs::metadata(self.file_path(period, name)).await {
                    entries.push(ManifestEntry {
                        period,
                        filename: (*name).to_string(),
                        length: meta.len() as u32,
                    });
                    if entries.len() >= catalog::MANIFEST_MAX_ENTRIES {
                        break 'outer;
                    }
                }
            }
        }
        encode_manifest(&entries)
    }

    /// Highest period for which both completion markers exist, walking
    /// backwards from the newest local directory.
    pub fn last_full_period(&self) -> Option<u64> {
        let periods: Vec<u64> = self.inner.index.lock().unwrap().periods().to_vec();
        periods
            .into_iter()
            .rev()
            .find(|p| {
                self.file_exists(*p, super::FILE_BLOCKS_ROOT)
                    && self.file_exists(*p, super::FILE_ZK_PROOF_G16)
            })
    }

    /// Slave pass: mirror the master's store from the first incomplete
    /// period. Guarded by an in-progress latch; a failed write drops the
    /// period's `blocks_root.bin` so the next pass re-verifies it.
    pub async fn full_sync_from_master(&self) -> Result<()> {
        let Some(master) = self.inner.cfg.master_url.clone() else {
            return Err(ColibriError::Store("no master url configured".into()));
        };
        if self
            .inner
            .full_sync_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let result = self.full_sync_inner(&master).await;
        self.inner.full_sync_busy.store(false, Ordering::SeqCst);
        result
    }

    async fn full_sync_inner(&self, master: &str) -> Result<()> {
        let start = self.last_full_period().map(|p| p + 1).unwrap_or(0);
        let url = format!(
            "{}/period_store?manifest=1&start={}",
            master.trim_end_matches('/'),
            start
        );
        let response = self.inner.pool.http().get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ColibriError::Store(format!(
                "manifest fetch failed: HTTP {}",
                response.status().as_u16()
            )));
        }
        let manifest = parse_manifest(&response.bytes().await?)?;
        info!(start, entries = manifest.len(), "full sync pass starting");

        for entry in &manifest {
            if shutdown::in_progress() {
                break;
            }
            if !super::PERIOD_FILES.contains(&entry.filename.as_str()) {
                warn!(file = %entry.filename, "skipping unknown manifest entry");
                continue;
            }
            if let Err(e) = self.sync_entry(master, entry).await {
                warn!(
                    period = entry.period,
                    file = %entry.filename,
                    "full sync entry failed: {}",
                    e
                );
                self.inner.stats.record_error();
                // Force re-verification of the period on the next pass.
                let marker = self.file_path(entry.period, super::FILE_BLOCKS_ROOT);
                let _ = tokio::fs::remove_file(marker).await;
            }
        }

        if let Some(last) = self.last_full_period() {
            info!(last_full_period = last, "full sync pass complete");
        }
        Ok(())
    }

    async fn sync_entry(&self, master: &str, entry: &ManifestEntry) -> Result<()> {
        let path = self.file_path(entry.period, &entry.filename);
        let local_len = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if local_len == entry.length as u64 {
            return Ok(());
        }

        // Verified slot data must stay byte-exact: replace, never append.
        let verified_slot_data = (entry.filename == super::FILE_BLOCKS
            || entry.filename == super::FILE_HEADERS)
            && self.file_exists(entry.period, super::FILE_BLOCKS_ROOT);
        let offset = if verified_slot_data || local_len > entry.length as u64 {
            0
        } else {
            local_len
        };

        let url = format!(
            "{}/period_store/{}/{}?offset={}",
            master.trim_end_matches('/'),
            entry.period,
            entry.filename,
            offset
        );
        let response = self.inner.pool.http().get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ColibriError::Store(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }
        let bytes = response.bytes().await?;

        self.ensure_period_dir(entry.period).await?;
        if offset == 0 {
            tokio::fs::write(&path, &bytes).await?;
        } else {
            use tokio::io::AsyncWriteExt;
            let mut file =
                tokio::fs::OpenOptions::new().append(true).create(true).open(&path).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NodePool, NodePoolConfig};
    use crate::store::PeriodStoreConfig;
    use std::sync::Arc;

    #[test]
    fn test_manifest_roundtrip() {
        let entries = vec![
            ManifestEntry { period: 700, filename: "blocks.ssz".into(), length: 262144 },
            ManifestEntry { period: 700, filename: "lcu.ssz".into(), length: 31337 },
            ManifestEntry { period: 701, filename: "headers.ssz".into(), length: 917504 },
        ];
        let bytes = encode_manifest(&entries).unwrap();
        assert_eq!(parse_manifest(&bytes).unwrap(), entries);
    }

    #[test]
    fn test_empty_manifest() {
        let bytes = encode_manifest(&[]).unwrap();
        assert!(parse_manifest(&bytes).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_manifest_lists_known_files() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let store = PeriodStore::new(PeriodStoreConfig::new(dir.path(), 1), pool).unwrap();

        store.write_period_file(700, crate::store::FILE_LCU, b"abc").await.unwrap();
        store.write_period_file(701, crate::store::FILE_BLOCKS, &[0u8; 64]).await.unwrap();
        // Unknown sibling files are ignored.
        std::fs::write(store.period_dir(700).join("notes.txt"), b"x").unwrap();

        let manifest = parse_manifest(&store.build_manifest(0).await.unwrap()).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].period, 700);
        assert_eq!(manifest[0].filename, "lcu.ssz");
        assert_eq!(manifest[0].length, 3);
        assert_eq!(manifest[1].period, 701);

        // Start filter.
        let manifest = parse_manifest(&store.build_manifest(701).await.unwrap()).unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_last_full_period() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let store = PeriodStore::new(PeriodStoreConfig::new(dir.path(), 1), pool).unwrap();
        assert_eq!(store.last_full_period(), None);

        for period in [700u64, 701] {
            std::fs::create_dir_all(store.period_dir(period)).unwrap();
            std::fs::write(store.file_path(period, crate::store::FILE_BLOCKS_ROOT), [0u8; 32])
                .unwrap();
            std::fs::write(store.file_path(period, crate::store::FILE_ZK_PROOF_G16), b"proof")
                .unwrap();
        }
        // Re-scan picks up the directories created behind the index's back.
        let store2 = PeriodStore::new(
            PeriodStoreConfig::new(dir.path(), 1),
            Arc::new(NodePool::new(NodePoolConfig::new(1))),
        )
        .unwrap();
        assert_eq!(store2.last_full_period(), Some(701));
    }
}
