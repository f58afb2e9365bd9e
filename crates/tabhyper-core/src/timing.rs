use std::time::Instant;

use tracing::info;

/// Logs when a named unit of work starts and, on drop, how long it took.
#[derive(Debug)]
pub struct LogDuration {
    label: &'static str,
    started: Instant,
}

impl LogDuration {
    pub fn start(label: &'static str) -> Self {
        info!(label, "started");
        Self {
            label,
            started: Instant::now(),
        }
    }
}

impl Drop for LogDuration {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        info!(
            label = self.label,
            elapsed_ms = elapsed.as_millis() as u64,
            "finished"
        );
    }
}
