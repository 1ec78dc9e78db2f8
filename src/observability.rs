//! Process-wide counters for assignment and notification activity

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by the engine, the quota ledger and the dispatcher
#[derive(Debug, Default)]
pub struct Metrics {
    leads_assigned: AtomicU64,
    assignment_failures: AtomicU64,
    quota_conflicts: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lead_assigned(&self) {
        self.leads_assigned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "leads_assigned", "Metric incremented");
    }

    pub fn assignment_failed(&self) {
        self.assignment_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "assignment_failures", "Metric incremented");
    }

    pub fn quota_conflict(&self) {
        self.quota_conflicts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "quota_conflicts", "Metric incremented");
    }

    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "notifications_sent", "Metric incremented");
    }

    pub fn notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "notifications_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            leads_assigned: self.leads_assigned.load(Ordering::Relaxed),
            assignment_failures: self.assignment_failures.load(Ordering::Relaxed),
            quota_conflicts: self.quota_conflicts.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub leads_assigned: u64,
    pub assignment_failures: u64,
    pub quota_conflicts: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_snapshot() {
        let metrics = Metrics::new();
        metrics.lead_assigned();
        metrics.lead_assigned();
        metrics.quota_conflict();
        metrics.notification_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.leads_assigned, 2);
        assert_eq!(snapshot.quota_conflicts, 1);
        assert_eq!(snapshot.notifications_failed, 1);
        assert_eq!(snapshot.assignment_failures, 0);
    }
}
