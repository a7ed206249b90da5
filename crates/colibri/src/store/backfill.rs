//! Backfill: a sliding-window walker that descends from the head towards
//! `head - window` slots, repairing holes and reorgs on the way.
//!
//! At each scanned slot the on-disk state decides: parent found (descend),
//! phantom/empty slot (skip), or mismatch (fetch the exact parent header
//! and enqueue phantom entries for the gap). Missing periods are loaded
//! into the two-slab cache; the walker yields to the runtime every 100
//! scanned slots.

use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{info, warn};

use crate::shutdown;
use crate::types::error::{ColibriError, Result};
use crate::types::request::{DataRequest, Encoding, RequestKind};

use super::period_data::{PeriodData, SlabCache};
use super::writer::WriteTask;
use super::PeriodStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPoint {
    pub slot: u64,
    pub root: [u8; 32],
    pub parent_root: [u8; 32],
}

#[derive(Debug, Clone)]
pub struct BackfillCtx {
    pub current: ChainPoint,
    /// Next slot to inspect, moving downwards.
    pub scan_slot: u64,
    pub start_slot: u64,
    pub end_slot: u64,
    pub started: Instant,
    pub done: bool,
}

#[derive(Debug, Default)]
pub struct BackfillState {
    pub ctx: Option<BackfillCtx>,
    pub running: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
    /// The scanned slot holds the parent; descend to it.
    FoundParent(ChainPoint),
    /// Phantom or empty slot with the expected committing root.
    Skip,
    /// Root mismatch: never written, or a reorg to repair. Fetch the exact
    /// parent header by root.
    NeedHeader([u8; 32]),
    /// The scanned slot's period is not resident.
    NeedPeriod(u64),
    Done,
}

/// One scan decision, pure over the slab cache.
pub(crate) fn scan_step(
    current: &ChainPoint,
    scan_slot: u64,
    end_slot: u64,
    slabs: &SlabCache,
) -> ScanOutcome {
    if scan_slot <= end_slot {
        return ScanOutcome::Done;
    }
    let period = scan_slot >> 13;
    let Some(data) = slabs.get(period) else {
        return ScanOutcome::NeedPeriod(period);
    };
    let idx = (scan_slot & 8191) as usize;
    let root_matches = data.root_at(idx) == &current.parent_root[..];
    let header_zero = data.header_is_zero(idx);
    if root_matches && !header_zero {
        let mut root = [0u8; 32];
        root.copy_from_slice(data.root_at(idx));
        ScanOutcome::FoundParent(ChainPoint {
            slot: scan_slot,
            root,
            parent_root: data.parent_root_at(idx),
        })
    } else if root_matches {
        ScanOutcome::Skip
    } else {
        ScanOutcome::NeedHeader(current.parent_root)
    }
}

fn window_end(spec: &crate::types::chain::ChainSpec, head_slot: u64, max_periods: u32) -> u64 {
    let period_start = head_slot - head_slot % spec.slots_per_period();
    period_start.saturating_sub(spec.slots_per_period() * max_periods as u64)
}

impl PeriodStore {
    /// Called for every completed head write. Starts the walker, and resets
    /// the window once the head has run more than 100 slots ahead of it.
    pub(crate) fn backfill_on_head(&self, task: &WriteTask) {
        if self.inner.cfg.backfill_max_periods == 0 || shutdown::in_progress() {
            return;
        }
        let mut parent_root = [0u8; 32];
        parent_root.copy_from_slice(&task.header[16..48]);
        let point = ChainPoint { slot: task.slot, root: task.root, parent_root };

        {
            let mut state = self.inner.backfill.lock().unwrap();
            match &mut state.ctx {
                None => {
                    state.ctx = Some(BackfillCtx {
                        current: point,
                        scan_slot: point.slot.saturating_sub(1),
                        start_slot: point.slot,
                        end_slot: window_end(
                            self.inner.spec,
                            point.slot,
                            self.inner.cfg.backfill_max_periods,
                        ),
                        started: Instant::now(),
                        done: false,
                    });
                }
                Some(ctx) if point.slot > ctx.start_slot + 100 => {
                    // Sliding window: restart from the new head, stop where
                    // the previous pass began.
                    let old_start = ctx.start_slot;
                    *ctx = BackfillCtx {
                        current: point,
                        scan_slot: point.slot.saturating_sub(1),
                        start_slot: point.slot,
                        end_slot: old_start,
                        started: Instant::now(),
                        done: false,
                    };
                }
                _ => {}
            }
        }
        self.backfill_resume();
    }

    /// Kick the walker if it has work and is not already running.
    pub(crate) fn backfill_resume(&self) {
        {
            let mut state = self.inner.backfill.lock().unwrap();
            if state.running {
                return;
            }
            match &state.ctx {
                Some(ctx) if !ctx.done => state.running = true,
                _ => return,
            }
        }
        let store = self.clone();
        tokio::spawn(async move { store.backfill_run().await });
    }

    async fn backfill_run(&self) {
        let mut scanned: u64 = 0;
        loop {
            if shutdown::in_progress() {
                break;
            }
            let Some((current, scan_slot, end_slot)) = ({
                let state = self.inner.backfill.lock().unwrap();
                state.ctx.as_ref().filter(|c| !c.done).map(|c| {
                    (c.current, c.scan_slot, c.end_slot)
                })
            }) else {
                break;
            };

            let outcome = {
                let slabs = self.inner.slabs.lock().unwrap();
                scan_step(&current, scan_slot, end_slot, &slabs)
            };

            match outcome {
                ScanOutcome::Done => {
                    let mut start_slot = 0;
                    {
                        let mut state = self.inner.backfill.lock().unwrap();
                        if let Some(ctx) = state.ctx.as_mut() {
                            ctx.done = true;
                            start_slot = ctx.start_slot;
                            info!(
                                start_slot,
                                end_slot,
                                elapsed_ms = ctx.started.elapsed().as_millis() as u64,
                                scanned,
                                "backfill window complete"
                            );
                        }
                    }
                    let head_period = self.inner.spec.period_of_slot(start_slot);
                    if self.file_exists(head_period, super::FILE_HISTORICAL) {
                        let store = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = store.verify_blocks_roots(head_period).await {
                                warn!("blocks-root verification failed: {}", e);
                            }
                        });
                    }
                    break;
                }
                ScanOutcome::FoundParent(parent) => {
                    let mut state = self.inner.backfill.lock().unwrap();
                    if let Some(ctx) = state.ctx.as_mut() {
                        ctx.current = parent;
                        ctx.scan_slot = parent.slot.saturating_sub(1);
                    }
                }
                ScanOutcome::Skip => {
                    let mut state = self.inner.backfill.lock().unwrap();
                    if let Some(ctx) = state.ctx.as_mut() {
                        ctx.scan_slot = ctx.scan_slot.saturating_sub(1);
                    }
                }
                ScanOutcome::NeedPeriod(period) => {
                    if let Err(e) = self.load_period_slab(period).await {
                        warn!(period, "period load failed: {}", e);
                        self.inner.stats.record_error();
                        break;
                    }
                }
                ScanOutcome::NeedHeader(parent_root) => {
                    if self.inner.cfg.backfill_delay_ms > 0 {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            self.inner.cfg.backfill_delay_ms,
                        ))
                        .await;
                    }
                    match self.fetch_header_by_root(&parent_root).await {
                        Ok((parent, header)) => {
                            match self.backfill_apply_parent(&current, parent, header).await {
                                Ok(()) => {
                                    let mut state = self.inner.backfill.lock().unwrap();
                                    if let Some(ctx) = state.ctx.as_mut() {
                                        ctx.current = parent;
                                        ctx.scan_slot = parent.slot.saturating_sub(1);
                                    }
                                }
                                Err(e) => {
                                    warn!("backfill parent repair failed: {}", e);
                                    self.inner.stats.record_error();
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(
                                root = %hex::encode(parent_root),
                                "backfill header fetch failed: {}",
                                e
                            );
                            self.inner.stats.record_error();
                            break;
                        }
                    }
                }
            }

            scanned += 1;
            if scanned % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }
        self.inner.backfill.lock().unwrap().running = false;
    }

    /// Write the fetched parent and phantom entries for every slot between
    /// it and the descending block. Phantoms carry the committing root and a
    /// zero header, recording that no block exists there.
    pub(crate) async fn backfill_apply_parent(
        &self,
        current: &ChainPoint,
        parent: ChainPoint,
        parent_header: [u8; 112],
    ) -> Result<()> {
        if parent.slot >= current.slot {
            return Err(ColibriError::Store(format!(
                "parent slot {} not below block slot {}",
                parent.slot, current.slot
            )));
        }
        if current.slot - parent.slot > self.inner.spec.slots_per_period() {
            return Err(ColibriError::Store(format!(
                "implausible gap: {} slots between {} and {}",
                current.slot - parent.slot,
                parent.slot,
                current.slot
            )));
        }
        self.enqueue(WriteTask {
            slot: parent.slot,
            root: parent.root,
            header: parent_header,
            backfill: true,
        })
        .await;
        for slot in parent.slot + 1..current.slot {
            self.enqueue(WriteTask {
                slot,
                root: parent.root,
                header: [0u8; 112],
                backfill: true,
            })
            .await;
        }
        Ok(())
    }

    async fn load_period_slab(&self, period: u64) -> Result<()> {
        let data = PeriodData::load(&self.period_dir(period), period).await?;
        self.inner.slabs.lock().unwrap().install(data);

        // Side effects of touching a period: make sure its light-client
        // artifacts are around.
        let lcu_len = tokio::fs::metadata(self.file_path(period, super::FILE_LCU))
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if lcu_len == 0 && !shutdown::in_progress() {
            let store = self.clone();
            tokio::spawn(async move {
                if let Err(e) = store.fetch_lcu_to_disk(period).await {
                    warn!(period, "lcu fetch failed: {}", e);
                }
            });
        }
        let lcb_missing = !self.file_exists(period, super::FILE_LCB);
        let anchored = period > 0 && self.file_exists(period - 1, super::FILE_ZK_PROOF_G16);
        if lcb_missing && anchored && !shutdown::in_progress() {
            let store = self.clone();
            tokio::spawn(async move {
                if let Err(e) = store.fetch_bootstrap_for_period(period).await {
                    warn!(period, "bootstrap fetch failed: {}", e);
                }
            });
        }
        Ok(())
    }

    async fn fetch_header_by_root(&self, root: &[u8; 32]) -> Result<(ChainPoint, [u8; 112])> {
        let mut req = DataRequest::get(
            self.inner.cfg.chain_id,
            RequestKind::BeaconApi,
            Encoding::Json,
            format!("/eth/v1/beacon/headers/0x{}", hex::encode(root)),
        );
        self.inner.pool.fetch(&mut req).await;
        if let Some(err) = req.error {
            return Err(ColibriError::Upstream(err));
        }
        let body = req.response.ok_or_else(|| ColibriError::Upstream("empty response".into()))?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        let message = &json["data"]["header"]["message"];
        let slot = parse_str_u64(&message["slot"])?;
        let proposer = parse_str_u64(&message["proposer_index"])?;
        let parent_root = parse_root(&message["parent_root"])?;
        let state_root = parse_root(&message["state_root"])?;
        let body_root = parse_root(&message["body_root"])?;

        let mut header = [0u8; 112];
        header[..8].copy_from_slice(&slot.to_le_bytes());
        header[8..16].copy_from_slice(&proposer.to_le_bytes());
        header[16..48].copy_from_slice(&parent_root);
        header[48..80].copy_from_slice(&state_root);
        header[80..112].copy_from_slice(&body_root);

        Ok((ChainPoint { slot, root: *root, parent_root }, header))
    }
}

fn parse_str_u64(value: &serde_json::Value) -> Result<u64> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ColibriError::Upstream("bad beacon number".into()))
}

fn parse_root(value: &serde_json::Value) -> Result<[u8; 32]> {
    let s = value.as_str().ok_or_else(|| ColibriError::Upstream("missing root".into()))?;
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ColibriError::Upstream(e.to_string()))?;
    bytes.try_into().map_err(|_| ColibriError::Upstream("root must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NodePool, NodePoolConfig};
    use crate::store::period_data::PeriodData;
    use crate::store::PeriodStoreConfig;
    use std::sync::Arc;

    fn point(slot: u64, root: u8, parent: u8) -> ChainPoint {
        ChainPoint { slot, root: [root; 32], parent_root: [parent; 32] }
    }

    fn slab_with(period: u64, entries: &[(usize, [u8; 32], [u8; 112])]) -> SlabCache {
        let mut data = PeriodData::empty(period);
        for (idx, root, header) in entries {
            data.set(*idx, root, header);
        }
        let mut cache = SlabCache::default();
        cache.install(data);
        cache
    }

    fn header_with_parent(slot: u64, parent: u8) -> [u8; 112] {
        let mut h = [0u8; 112];
        h[..8].copy_from_slice(&slot.to_le_bytes());
        h[16..48].copy_from_slice(&[parent; 32]);
        h
    }

    #[test]
    fn test_scan_finds_parent() {
        let current = point(100, 0xaa, 0xbb);
        let slabs = slab_with(0, &[(99, [0xbb; 32], header_with_parent(99, 0xcc))]);
        match scan_step(&current, 99, 0, &slabs) {
            ScanOutcome::FoundParent(p) => {
                assert_eq!(p.slot, 99);
                assert_eq!(p.root, [0xbb; 32]);
                assert_eq!(p.parent_root, [0xcc; 32]);
            }
            other => panic!("expected FoundParent, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_skips_phantom() {
        let current = point(100, 0xaa, 0xbb);
        // Phantom: committing root, zero header.
        let slabs = slab_with(0, &[(99, [0xbb; 32], [0u8; 112])]);
        assert_eq!(scan_step(&current, 99, 0, &slabs), ScanOutcome::Skip);
    }

    #[test]
    fn test_scan_requests_header_on_mismatch() {
        let current = point(100, 0xaa, 0xbb);
        let slabs = slab_with(0, &[]);
        assert_eq!(
            scan_step(&current, 99, 0, &slabs),
            ScanOutcome::NeedHeader([0xbb; 32])
        );
    }

    #[test]
    fn test_scan_needs_period_and_finishes() {
        let current = point(9000, 0xaa, 0xbb);
        let slabs = SlabCache::default();
        assert_eq!(scan_step(&current, 8999, 0, &slabs), ScanOutcome::NeedPeriod(1));
        assert_eq!(scan_step(&current, 100, 100, &slabs), ScanOutcome::Done);
    }

    #[tokio::test]
    async fn test_parent_fixup_writes_phantoms() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let mut cfg = PeriodStoreConfig::new(dir.path(), 1);
        cfg.backfill_max_periods = 0;
        let store = PeriodStore::new(cfg, pool).unwrap();

        // Head block at slot 40 whose parent actually lives at slot 35.
        let current = point(40, 0xaa, 0xbb);
        let parent = point(35, 0xbb, 0xcc);
        let header = header_with_parent(35, 0xcc);
        store.backfill_apply_parent(&current, parent, header).await.unwrap();

        for _ in 0..200 {
            if store.queue_depth() == 0 && !store.inner.queue.lock().unwrap().draining {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let blocks = std::fs::read(dir.path().join("0").join(crate::store::FILE_BLOCKS)).unwrap();
        let headers =
            std::fs::read(dir.path().join("0").join(crate::store::FILE_HEADERS)).unwrap();
        // The real parent at slot 35 has its header bytes.
        assert_eq!(&blocks[35 * 32..36 * 32], &[0xbb; 32]);
        assert_eq!(&headers[35 * 112..36 * 112], &header[..]);
        // Slots 36..39 are phantoms: committing root, zero header.
        for slot in 36..40usize {
            assert_eq!(&blocks[slot * 32..(slot + 1) * 32], &[0xbb; 32], "slot {}", slot);
            assert!(headers[slot * 112..(slot + 1) * 112].iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn test_apply_parent_rejects_bad_slots() {
        let current = point(40, 0xaa, 0xbb);
        let parent = point(41, 0xbb, 0xcc);
        // Pure argument check happens before any I/O.
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let store = PeriodStore::new(PeriodStoreConfig::new(dir.path(), 1), pool).unwrap();
        let err = rt
            .block_on(store.backfill_apply_parent(&current, parent, [0u8; 112]))
            .unwrap_err();
        assert!(err.to_string().contains("not below"));
    }
}
