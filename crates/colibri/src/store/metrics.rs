//! Period-sync counters, exposed through the host's metrics endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct SyncStats {
    pub last_slot: AtomicU64,
    pub last_slot_ts: AtomicU64,
    pub written_slots_total: AtomicU64,
    pub backfilled_slots_total: AtomicU64,
    pub lag_slots: AtomicU64,
    pub errors_total: AtomicU64,
    pub periods_verified: AtomicU64,
    pub periods_skipped: AtomicU64,
    pub periods_failed: AtomicU64,
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl SyncStats {
    pub fn record_write(&self, slot: u64, backfill: bool, latest_head_slot: u64) {
        if backfill {
            self.backfilled_slots_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.written_slots_total.fetch_add(1, Ordering::Relaxed);
            self.last_slot.store(slot, Ordering::Relaxed);
            self.last_slot_ts.store(now_secs(), Ordering::Relaxed);
        }
        let lag = latest_head_slot.saturating_sub(self.last_slot.load(Ordering::Relaxed));
        self.lag_slots.store(lag, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Prometheus text exposition of the period-sync gauges and counters.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut gauge = |name: &str, value: u64| {
            out.push_str(&format!("# TYPE {} gauge\n{} {}\n", name, name, value));
        };
        gauge("period_sync_last_slot", self.last_slot.load(Ordering::Relaxed));
        gauge("period_sync_last_slot_ts", self.last_slot_ts.load(Ordering::Relaxed));
        gauge("period_sync_lag_slots", self.lag_slots.load(Ordering::Relaxed));
        gauge("period_sync_written_slots_total", self.written_slots_total.load(Ordering::Relaxed));
        gauge(
            "period_sync_backfilled_slots_total",
            self.backfilled_slots_total.load(Ordering::Relaxed),
        );
        gauge("period_sync_errors_total", self.errors_total.load(Ordering::Relaxed));
        gauge("period_sync_periods_verified", self.periods_verified.load(Ordering::Relaxed));
        gauge("period_sync_periods_skipped", self.periods_skipped.load(Ordering::Relaxed));
        gauge("period_sync_periods_failed", self.periods_failed.load(Ordering::Relaxed));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_write_updates_lag() {
        let stats = SyncStats::default();
        stats.record_write(100, false, 110);
        assert_eq!(stats.last_slot.load(Ordering::Relaxed), 100);
        assert_eq!(stats.lag_slots.load(Ordering::Relaxed), 10);
        assert_eq!(stats.written_slots_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_backfill_write_keeps_last_slot() {
        let stats = SyncStats::default();
        stats.record_write(100, false, 100);
        stats.record_write(50, true, 100);
        assert_eq!(stats.last_slot.load(Ordering::Relaxed), 100);
        assert_eq!(stats.backfilled_slots_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_render_contains_all_series() {
        let stats = SyncStats::default();
        let text = stats.render();
        assert!(text.contains("period_sync_last_slot"));
        assert!(text.contains("period_sync_lag_slots"));
        assert!(text.contains("period_sync_errors_total"));
    }
}
