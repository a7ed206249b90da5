//! In-memory period slabs: the raw contents of `blocks.ssz` and
//! `headers.ssz` for one period. At most two slabs are resident (current and
//! previous), swapped when the backfill or writer crosses a boundary.

use std::path::Path;

use crate::types::error::Result;

pub const ROOT_LEN: usize = 32;
pub const HEADER_LEN: usize = 112;
pub const SLOTS: usize = 8192;

#[derive(Debug)]
pub struct PeriodData {
    pub period: u64,
    pub blocks: Vec<u8>,
    pub headers: Vec<u8>,
}

impl PeriodData {
    pub fn empty(period: u64) -> Self {
        Self {
            period,
            blocks: vec![0u8; SLOTS * ROOT_LEN],
            headers: vec![0u8; SLOTS * HEADER_LEN],
        }
    }

    /// Load a period from disk, zero-padding short or missing files.
    pub async fn load(dir: &Path, period: u64) -> Result<Self> {
        let mut data = Self::empty(period);
        if let Ok(bytes) = tokio::fs::read(dir.join(super::FILE_BLOCKS)).await {
            let n = bytes.len().min(data.blocks.len());
            data.blocks[..n].copy_from_slice(&bytes[..n]);
        }
        if let Ok(bytes) = tokio::fs::read(dir.join(super::FILE_HEADERS)).await {
            let n = bytes.len().min(data.headers.len());
            data.headers[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(data)
    }

    pub fn root_at(&self, idx: usize) -> &[u8] {
        &self.blocks[idx * ROOT_LEN..(idx + 1) * ROOT_LEN]
    }

    pub fn header_at(&self, idx: usize) -> &[u8] {
        &self.headers[idx * HEADER_LEN..(idx + 1) * HEADER_LEN]
    }

    pub fn set(&mut self, idx: usize, root: &[u8; 32], header: &[u8; 112]) {
        self.blocks[idx * ROOT_LEN..(idx + 1) * ROOT_LEN].copy_from_slice(root);
        self.headers[idx * HEADER_LEN..(idx + 1) * HEADER_LEN].copy_from_slice(header);
    }

    /// Parent root recorded inside the flat header at this slot.
    pub fn parent_root_at(&self, idx: usize) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.header_at(idx)[16..48]);
        out
    }

    pub fn header_is_zero(&self, idx: usize) -> bool {
        self.header_at(idx).iter().all(|b| *b == 0)
    }
}

/// Two-slab LRU: loading a new period demotes `current` to `previous`.
#[derive(Debug, Default)]
pub struct SlabCache {
    pub current: Option<PeriodData>,
    pub previous: Option<PeriodData>,
}

impl SlabCache {
    pub fn get(&self, period: u64) -> Option<&PeriodData> {
        match (&self.current, &self.previous) {
            (Some(c), _) if c.period == period => self.current.as_ref(),
            (_, Some(p)) if p.period == period => self.previous.as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, period: u64) -> Option<&mut PeriodData> {
        if self.current.as_ref().is_some_and(|c| c.period == period) {
            return self.current.as_mut();
        }
        if self.previous.as_ref().is_some_and(|p| p.period == period) {
            return self.previous.as_mut();
        }
        None
    }

    pub fn install(&mut self, data: PeriodData) {
        if self.current.as_ref().is_some_and(|c| c.period == data.period) {
            self.current = Some(data);
            return;
        }
        self.previous = self.current.take();
        self.current = Some(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_offsets() {
        let mut data = PeriodData::empty(2);
        let root = [0xa5u8; 32];
        let mut header = [0u8; 112];
        header[..8].copy_from_slice(&16507u64.to_le_bytes());
        header[16..48].copy_from_slice(&[0x5a; 32]);
        data.set(123, &root, &header);
        assert_eq!(data.root_at(123), &root);
        assert_eq!(data.header_at(123), &header);
        assert_eq!(data.parent_root_at(123), [0x5a; 32]);
        assert!(!data.header_is_zero(123));
        assert!(data.header_is_zero(124));
    }

    #[test]
    fn test_two_slab_swap() {
        let mut cache = SlabCache::default();
        cache.install(PeriodData::empty(10));
        cache.install(PeriodData::empty(11));
        assert!(cache.get(10).is_some());
        assert!(cache.get(11).is_some());
        cache.install(PeriodData::empty(12));
        assert!(cache.get(10).is_none());
        assert!(cache.get(11).is_some());
        assert!(cache.get(12).is_some());
    }

    #[tokio::test]
    async fn test_load_pads_short_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(super::super::FILE_BLOCKS), [0xaa; 64])
            .await
            .unwrap();
        let data = PeriodData::load(dir.path(), 7).await.unwrap();
        assert_eq!(data.root_at(0), &[0xaa; 32]);
        assert_eq!(data.root_at(1), &[0xaa; 32]);
        assert_eq!(data.root_at(2), &[0u8; 32]);
        assert!(data.header_is_zero(0));
    }
}
