//! Head-path writer: a single FIFO queue of slot writes.
//!
//! Every task writes exactly two ranges: 32 bytes at `idx*32` in
//! `blocks.ssz` and 112 bytes at `idx*112` in `headers.ssz`. Files are
//! opened read-write-create and never truncated; re-writes of a slot (reorg)
//! are last-write-wins. A single drain task owns the queue at any time, so
//! writes stay strictly ordered across periods.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::atomic::Ordering;

use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::shutdown;
use crate::types::error::Result;

use super::period_data::{HEADER_LEN, ROOT_LEN};
use super::PeriodStore;

#[derive(Debug, Clone)]
pub struct WriteTask {
    pub slot: u64,
    pub root: [u8; 32],
    pub header: [u8; 112],
    /// Tagged by the backfill; head tasks drive the backfill window.
    pub backfill: bool,
}

#[derive(Debug, Default)]
pub struct WriteQueue {
    pub(crate) tasks: VecDeque<WriteTask>,
    pub(crate) draining: bool,
}

impl PeriodStore {
    /// Head callback: `(slot, block_root, header112)` from the beacon
    /// events stream.
    pub async fn on_head(&self, slot: u64, root: [u8; 32], header: [u8; 112]) {
        if shutdown::in_progress() {
            return;
        }
        self.inner.latest_head_slot.fetch_max(slot, Ordering::Relaxed);

        // Crossing into a new period refreshes the previous period's LCU.
        let period = self.inner.spec.period_of_slot(slot);
        let last = self.inner.head_period.swap(period, Ordering::Relaxed);
        if last != 0 && period > last {
            let store = self.clone();
            tokio::spawn(async move {
                if let Err(e) = store.fetch_lcu_to_disk(last).await {
                    warn!(period = last, "lcu refresh after period crossing failed: {}", e);
                }
            });
        }

        self.enqueue(WriteTask { slot, root, header, backfill: false }).await;
    }

    /// Append a task; start the drain task if the queue was idle.
    pub(crate) async fn enqueue(&self, task: WriteTask) {
        let start_drain = {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.tasks.push_back(task);
            if queue.draining {
                false
            } else {
                queue.draining = true;
                true
            }
        };
        if start_drain {
            let store = self.clone();
            tokio::spawn(async move { store.drain().await });
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().unwrap().tasks.len()
    }

    async fn drain(&self) {
        loop {
            let (task, more_backfill_queued) = {
                let mut queue = self.inner.queue.lock().unwrap();
                match queue.tasks.pop_front() {
                    Some(task) => {
                        let more = queue.tasks.iter().any(|t| t.backfill);
                        (task, more)
                    }
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };

            match self.write_task(&task).await {
                Ok(()) => {
                    self.apply_to_slabs(&task);
                    let head = self.inner.latest_head_slot.load(Ordering::Relaxed);
                    self.inner.stats.record_write(task.slot, task.backfill, head);
                }
                Err(e) => {
                    warn!(slot = task.slot, "period write failed: {}", e);
                    self.inner.stats.record_error();
                }
            }

            // A completed head write (re)arms the backfill window; a
            // completed backfill task only does when it is the last one in
            // flight, otherwise the queue tail will get there.
            if !task.backfill {
                self.backfill_on_head(&task);
            } else if !more_backfill_queued {
                self.backfill_resume();
            }
        }
    }

    async fn write_task(&self, task: &WriteTask) -> Result<()> {
        let spec = self.inner.spec;
        let period = spec.period_of_slot(task.slot);
        let idx = (task.slot % spec.slots_per_period()) as usize;
        self.ensure_period_dir(period).await?;
        let dir = self.period_dir(period);
        write_at(&dir.join(super::FILE_BLOCKS), (idx * ROOT_LEN) as u64, &task.root).await?;
        write_at(&dir.join(super::FILE_HEADERS), (idx * HEADER_LEN) as u64, &task.header).await?;
        debug!(slot = task.slot, period, idx, backfill = task.backfill, "slot written");
        Ok(())
    }

    /// Keep resident slabs in sync with the disk; only the drain task calls
    /// this, so slab state follows write order.
    fn apply_to_slabs(&self, task: &WriteTask) {
        let spec = self.inner.spec;
        let period = spec.period_of_slot(task.slot);
        let idx = (task.slot % spec.slots_per_period()) as usize;
        let mut slabs = self.inner.slabs.lock().unwrap();
        if let Some(data) = slabs.get_mut(period) {
            data.set(idx, &task.root, &task.header);
        }
    }
}

async fn write_at(path: &Path, offset: u64, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .await?;
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NodePool, NodePoolConfig};
    use crate::store::PeriodStoreConfig;
    use std::sync::Arc;

    fn test_store(dir: &Path) -> PeriodStore {
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let mut cfg = PeriodStoreConfig::new(dir, 1);
        cfg.backfill_max_periods = 0;
        PeriodStore::new(cfg, pool).unwrap()
    }

    async fn drain_queue(store: &PeriodStore) {
        for _ in 0..200 {
            if store.queue_depth() == 0 && !store.inner.queue.lock().unwrap().draining {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("write queue did not drain");
    }

    #[tokio::test]
    async fn test_single_head_write() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let root = [0xa5u8; 32];
        let mut header = [0u8; 112];
        header[..8].copy_from_slice(&16507u64.to_le_bytes());
        header[16..48].copy_from_slice(&[0x5a; 32]);

        store.on_head(16507, root, header).await;
        drain_queue(&store).await;

        // Slot 16507 is period 2, index 123.
        let blocks = std::fs::read(dir.path().join("2").join(super::super::FILE_BLOCKS)).unwrap();
        assert_eq!(&blocks[123 * 32..124 * 32], &root);
        let headers =
            std::fs::read(dir.path().join("2").join(super::super::FILE_HEADERS)).unwrap();
        assert_eq!(&headers[123 * 112..124 * 112], &header[..]);
    }

    #[tokio::test]
    async fn test_rewrite_same_slot_last_wins() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let header = [1u8; 112];
        store.on_head(8192, [0x11; 32], header).await;
        store.on_head(8192, [0x22; 32], header).await;
        drain_queue(&store).await;

        let blocks = std::fs::read(dir.path().join("1").join(super::super::FILE_BLOCKS)).unwrap();
        assert_eq!(&blocks[..32], &[0x22; 32]);
    }

    #[tokio::test]
    async fn test_writes_do_not_truncate() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.on_head(10, [0xaa; 32], [0u8; 112]).await;
        drain_queue(&store).await;
        store.on_head(3, [0xbb; 32], [0u8; 112]).await;
        drain_queue(&store).await;

        let blocks = std::fs::read(dir.path().join("0").join(super::super::FILE_BLOCKS)).unwrap();
        assert_eq!(&blocks[10 * 32..11 * 32], &[0xaa; 32]);
        assert_eq!(&blocks[3 * 32..4 * 32], &[0xbb; 32]);
        assert!(blocks.len() >= 11 * 32);
    }

    #[tokio::test]
    async fn test_slab_updated_in_place() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        {
            let mut slabs = store.inner.slabs.lock().unwrap();
            slabs.install(crate::store::period_data::PeriodData::empty(0));
        }
        store.on_head(5, [0x77; 32], [3u8; 112]).await;
        drain_queue(&store).await;
        let slabs = store.inner.slabs.lock().unwrap();
        assert_eq!(slabs.get(0).unwrap().root_at(5), &[0x77; 32]);
    }
}
