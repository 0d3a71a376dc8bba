use serde::Serialize;
use tracing::info;

use super::promise::PromiseStats;
use super::queue::QueueStats;

/// Point-in-time view of a pipeline's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Generate calls answered from the store without new work
    pub store_hits: u64,
    /// Payloads generated and written to the store
    pub generated: u64,
    /// Generation attempts that failed
    pub failed: u64,
    /// Single-flight activity
    pub requests: PromiseStats,
    /// Admission queue occupancy
    pub queue: QueueStats,
}

impl PipelineStats {
    /// Logs the snapshot at info level.
    pub fn log(&self) {
        info!(
            store_hits = self.store_hits,
            generated = self.generated,
            failed = self.failed,
            total_requests = self.requests.total_requests,
            coalesced = self.requests.coalesced_requests,
            coalescing_ratio = format!("{:.1}%", self.requests.coalescing_ratio() * 100.0),
            pending = self.queue.pending,
            in_flight = self.queue.in_flight,
            peak_in_flight = self.queue.peak_in_flight,
            rejected = self.queue.rejected,
            "Pipeline statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_nested_sections() {
        let stats = PipelineStats {
            store_hits: 2,
            generated: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["store_hits"], 2);
        assert_eq!(value["requests"]["coalesced_requests"], 0);
        assert_eq!(value["queue"]["rejected"], 0);
    }
}
