use metrics::{counter, histogram};
use std::time::Instant;

use ctx_core::TargetKind;

/// Metric recording for the engine. Disabled instances record nothing.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    enabled: bool
}

impl Telemetry {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_resolve(&self, kind: TargetKind, documents: usize) {
        if !self.enabled {
            return;
        }
        counter!("context_resolve_total", "kind" => kind.to_string()).increment(1);
        histogram!("context_resolve_documents", "kind" => kind.to_string())
            .record(documents as f64);
    }

    pub fn record_batch(&self, targets: usize) {
        if !self.enabled {
            return;
        }
        histogram!("context_batch_targets").record(targets as f64);
    }

    pub fn record_rejected_write(&self, operation: &str, reason: &str) {
        if !self.enabled {
            return;
        }
        counter!(
            "context_write_rejected_total",
            "operation" => operation.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn record_reconcile_deleted(&self, owner_kind: &str, deleted: usize) {
        if !self.enabled || deleted == 0 {
            return;
        }
        counter!("context_reconcile_deleted_total", "owner_kind" => owner_kind.to_string())
            .increment(deleted as u64);
    }

    fn record_latency(&self, operation: &str, duration_ms: f64) {
        if !self.enabled {
            return;
        }
        histogram!("context_resolve_duration_ms", "operation" => operation.to_string())
            .record(duration_ms);
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(true)
    }
}

pub struct ResolveTimer {
    start: Instant,
    operation: &'static str,
    telemetry: Telemetry
}

impl ResolveTimer {
    pub fn new(telemetry: Telemetry, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
            telemetry
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        self.telemetry.record_latency(self.operation, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let telemetry = Telemetry::default();
        assert!(telemetry.is_enabled());
        telemetry.record_resolve(TargetKind::Device, 3);
        telemetry.record_batch(10);
        telemetry.record_rejected_write("create_document", "duplicate_identity");
        telemetry.record_reconcile_deleted("job", 2);
        ResolveTimer::new(telemetry, "resolve").finish();
    }

    #[test]
    fn test_disabled_telemetry() {
        let telemetry = Telemetry::disabled();
        assert!(!telemetry.is_enabled());
        telemetry.record_resolve(TargetKind::VirtualMachine, 1);
    }
}
