//! Light-client update and bootstrap handling.
//!
//! On the wire every update is framed `u32le length || fork_digest(4) ||
//! SSZ(LightClientUpdate)` with one update per period; the length covers
//! the digest and payload. `lcu.ssz` stores the framed bytes unchanged, so
//! cached files concatenate directly into responses.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::client::CLIENT_TYPE_LODESTAR;
use crate::ssz::{catalog, Ssz};
use crate::types::chain::{ChainSpec, Fork};
use crate::types::error::{ColibriError, Result};
use crate::types::request::{DataRequest, Encoding, RequestKind};

use super::PeriodStore;

#[derive(Debug)]
pub struct LcuFrame<'a> {
    pub fork: Fork,
    pub digest: [u8; 4],
    pub payload: &'a [u8],
}

/// Split concatenated framed updates and resolve each fork digest.
pub fn parse_frames<'a>(spec: &ChainSpec, bytes: &'a [u8]) -> Result<Vec<LcuFrame<'a>>> {
    let mut frames = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let len_bytes = bytes
            .get(pos..pos + 4)
            .ok_or_else(|| ColibriError::Ssz("truncated update frame length".into()))?;
        let frame_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        if frame_len < 4 {
            return Err(ColibriError::Ssz(format!("frame too short: {}", frame_len)));
        }
        let frame = bytes
            .get(pos + 4..pos + 4 + frame_len)
            .ok_or_else(|| ColibriError::Ssz("truncated update frame".into()))?;
        let digest: [u8; 4] = frame[..4].try_into().unwrap();
        let fork = spec
            .fork_for_digest(digest)
            .ok_or_else(|| ColibriError::Ssz(format!("unknown fork digest {}", hex::encode(digest))))?;
        frames.push(LcuFrame { fork, digest, payload: &frame[4..] });
        pos += 4 + frame_len;
    }
    Ok(frames)
}

/// Frame one update for storage or serving.
pub fn frame_update(spec: &ChainSpec, fork: Fork, update: &[u8]) -> Vec<u8> {
    let version = spec.forks.iter().find(|f| f.fork == fork).map(|f| f.version).unwrap_or_default();
    let digest = spec.fork_digest(version);
    let mut out = Vec::with_capacity(update.len() + 8);
    out.extend_from_slice(&((update.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(&digest);
    out.extend_from_slice(update);
    out
}

impl PeriodStore {
    /// Concatenated framed updates for `count` consecutive periods: cached
    /// `lcu.ssz` bytes where present, fetched (and written back) where not.
    /// Each period contributes exactly one source, in order.
    pub async fn get_light_client_updates(&self, start: u64, count: u64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for period in start..start + count {
            let path = self.file_path(period, super::FILE_LCU);
            match tokio::fs::read(&path).await {
                Ok(cached) if !cached.is_empty() => {
                    debug!(period, "lcu cache hit");
                    out.extend_from_slice(&cached);
                }
                _ => {
                    let fetched = self.fetch_lcu(period).await?;
                    out.extend_from_slice(&fetched);
                    let store = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = store.write_period_file(period, super::FILE_LCU, &fetched).await
                        {
                            warn!(period, "lcu write-back failed: {}", e);
                        }
                    });
                }
            }
        }
        Ok(out)
    }

    /// Fetch one period's update and persist it.
    pub(crate) async fn fetch_lcu_to_disk(&self, period: u64) -> Result<()> {
        let bytes = self.fetch_lcu(period).await?;
        self.write_period_file(period, super::FILE_LCU, &bytes).await
    }

    async fn fetch_lcu(&self, period: u64) -> Result<Bytes> {
        let mut req = DataRequest::get(
            self.inner.cfg.chain_id,
            RequestKind::BeaconApi,
            Encoding::Ssz,
            format!(
                "/eth/v1/beacon/light_client/updates?start_period={}&count=1",
                period
            ),
        );
        self.inner.pool.fetch(&mut req).await;
        if let Some(err) = req.error {
            return Err(ColibriError::Upstream(err));
        }
        let bytes =
            req.response.ok_or_else(|| ColibriError::Upstream("empty lcu response".into()))?;

        // Protocol check before anything touches the disk.
        let frames = parse_frames(self.inner.spec, &bytes)?;
        if frames.len() != 1 {
            return Err(ColibriError::Ssz(format!(
                "expected one update per period, got {}",
                frames.len()
            )));
        }
        for frame in &frames {
            Ssz::new(catalog::light_client_update(frame.fork), frame.payload)
                .validate()
                .map_err(|e| {
                    warn!(period, "rejecting malformed light client update: {}", e);
                    e
                })?;
        }
        Ok(bytes)
    }

    /// Bootstrap from a known finalized checkpoint root.
    pub async fn fetch_bootstrap_by_root(&self, root: &[u8; 32]) -> Result<Bytes> {
        let mut req = DataRequest::get(
            self.inner.cfg.chain_id,
            RequestKind::BeaconApi,
            Encoding::Ssz,
            format!("/eth/v1/beacon/light_client/bootstrap/0x{}", hex::encode(root)),
        );
        self.inner.pool.fetch(&mut req).await;
        if let Some(err) = req.error {
            return Err(ColibriError::Upstream(err));
        }
        req.response.ok_or_else(|| ColibriError::Upstream("empty bootstrap response".into()))
    }

    /// Bootstrap for a period: derive the finalized header root from the
    /// period's own update, then fetch by root.
    pub(crate) async fn fetch_bootstrap_for_period(&self, period: u64) -> Result<()> {
        let lcu_bytes = match tokio::fs::read(self.file_path(period, super::FILE_LCU)).await {
            Ok(bytes) if !bytes.is_empty() => Bytes::from(bytes),
            _ => self.fetch_lcu(period).await?,
        };
        let frames = parse_frames(self.inner.spec, &lcu_bytes)?;
        let frame = frames
            .first()
            .ok_or_else(|| ColibriError::Ssz("no update for bootstrap derivation".into()))?;
        let update = Ssz::new(catalog::light_client_update(frame.fork), frame.payload);
        let finalized = update.field("finalized_header")?.field("beacon")?;
        let slot = finalized.field("slot")?.as_u64()?;
        if slot >> 13 != period {
            return Err(ColibriError::Ssz(format!(
                "finalized header slot {} is outside period {}",
                slot, period
            )));
        }
        let root = finalized.hash_tree_root()?;
        let bootstrap = self.fetch_bootstrap_by_root(&root).await?;
        Ssz::new(catalog::light_client_bootstrap(frame.fork), &bootstrap).validate()?;
        self.write_period_file(period, super::FILE_LCB, &bootstrap).await
    }

    /// Historical summaries, preferring a Lodestar-flavoured node for the
    /// vendor endpoint. The response lands in the head period directory and
    /// feeds blocks-root verification.
    pub async fn fetch_historical_summaries(&self, head_period: u64) -> Result<()> {
        let mut req = DataRequest::get(
            self.inner.cfg.chain_id,
            RequestKind::BeaconApi,
            Encoding::Json,
            "/eth/v1/lodestar/states/head/historical_summaries",
        )
        .with_preferred_client(CLIENT_TYPE_LODESTAR);
        self.inner.pool.fetch(&mut req).await;
        if let Some(err) = req.error {
            return Err(ColibriError::Upstream(err));
        }
        let body = req
            .response
            .ok_or_else(|| ColibriError::Upstream("empty summaries response".into()))?;
        // Must at least parse as the expected JSON shape.
        let _: super::verify::HistoricalSummariesResponse = serde_json::from_slice(&body)?;
        self.write_period_file(head_period, super::FILE_HISTORICAL, &body).await
    }

    pub(crate) async fn write_period_file(
        &self,
        period: u64,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.ensure_period_dir(period).await?;
        tokio::fs::write(self.file_path(period, name), bytes).await?;
        Ok(())
    }
}
