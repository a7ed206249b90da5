//! Index of known period directories: a sorted, deduplicated list with a
//! gap flag. A non-contiguous sequence is a fatal integrity signal for the
//! prover chain, surfaced via metrics and the log.

use std::path::Path;

use tracing::error;

#[derive(Debug, Default)]
pub struct PeriodIndex {
    periods: Vec<u64>,
    has_gaps: bool,
}

impl PeriodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a base directory for numeric period subdirectories. Unknown
    /// entries are ignored.
    pub fn scan(base: &Path) -> Self {
        let mut index = Self::new();
        if let Ok(entries) = std::fs::read_dir(base) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                if let Some(period) =
                    entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok())
                {
                    index.insert(period);
                }
            }
        }
        index
    }

    pub fn insert(&mut self, period: u64) {
        match self.periods.binary_search(&period) {
            Ok(_) => return,
            Err(pos) => self.periods.insert(pos, period),
        }
        let gaps = self
            .periods
            .windows(2)
            .any(|w| w[1] > w[0] + 1);
        if gaps && !self.has_gaps {
            error!(period, "period index is no longer contiguous");
        }
        self.has_gaps = gaps;
    }

    pub fn has_gaps(&self) -> bool {
        self.has_gaps
    }

    pub fn contains(&self, period: u64) -> bool {
        self.periods.binary_search(&period).is_ok()
    }

    pub fn min(&self) -> Option<u64> {
        self.periods.first().copied()
    }

    pub fn max(&self) -> Option<u64> {
        self.periods.last().copied()
    }

    pub fn periods(&self) -> &[u64] {
        &self.periods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_has_no_gaps() {
        let mut index = PeriodIndex::new();
        for p in [5, 6, 7, 8] {
            index.insert(p);
        }
        assert!(!index.has_gaps());
        assert_eq!(index.min(), Some(5));
        assert_eq!(index.max(), Some(8));
    }

    #[test]
    fn test_gap_detection_and_fill() {
        let mut index = PeriodIndex::new();
        index.insert(5);
        index.insert(7);
        assert!(index.has_gaps());
        index.insert(6);
        assert!(!index.has_gaps());
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut index = PeriodIndex::new();
        index.insert(3);
        index.insert(3);
        assert_eq!(index.periods(), &[3]);
    }

    #[test]
    fn test_out_of_order_inserts_stay_sorted() {
        let mut index = PeriodIndex::new();
        for p in [9, 3, 7, 5, 4, 6, 8] {
            index.insert(p);
        }
        assert_eq!(index.periods(), &[3, 4, 5, 6, 7, 8, 9]);
        assert!(!index.has_gaps());
    }

    #[test]
    fn test_scan_ignores_unknown_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("700")).unwrap();
        std::fs::create_dir(dir.path().join("701")).unwrap();
        std::fs::create_dir(dir.path().join("not-a-period")).unwrap();
        std::fs::write(dir.path().join("702"), b"a file, not a dir").unwrap();
        let index = PeriodIndex::scan(dir.path());
        assert_eq!(index.periods(), &[700, 701]);
    }
}
