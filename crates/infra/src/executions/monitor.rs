//! Background timeout monitor.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info};

use super::orchestrator::Orchestrator;

/// Monitor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MonitorStats {
    pub sweeps: u64,
    pub executions_timed_out: u64,
    pub sweep_errors: u64,
    pub uptime_secs: u64,
}

/// Handle to a running monitor. Dropping it stops the thread.
#[derive(Debug)]
pub struct TimeoutMonitorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<MonitorStats>>,
}

impl TimeoutMonitorHandle {
    /// Request shutdown and wait for the thread to exit.
    pub fn shutdown(self) {
        drop(self);
    }

    /// Get current monitor statistics.
    pub fn stats(&self) -> MonitorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Drop for TimeoutMonitorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawn a thread that times out overdue executions every `interval`.
///
/// Timing out never touches the worker; it only invalidates the token.
pub fn spawn_timeout_monitor(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
) -> std::io::Result<TimeoutMonitorHandle> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let stats = Arc::new(Mutex::new(MonitorStats::default()));
    let stats_clone = stats.clone();

    let join = thread::Builder::new()
        .name("timeout-monitor".to_string())
        .spawn(move || monitor_loop(orchestrator, interval, shutdown_rx, stats_clone))?;

    Ok(TimeoutMonitorHandle {
        shutdown: shutdown_tx,
        join: Some(join),
        stats,
    })
}

fn monitor_loop(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<MonitorStats>>,
) {
    info!(interval_ms = interval.as_millis() as u64, "timeout monitor started");
    let start_time = Instant::now();

    loop {
        match shutdown_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let result = orchestrator.expire_overdue(Utc::now());

        let Ok(mut s) = stats.lock() else { break };
        s.sweeps += 1;
        s.uptime_secs = start_time.elapsed().as_secs();
        match result {
            Ok(expired) if !expired.is_empty() => {
                s.executions_timed_out += expired.len() as u64;
                debug!(count = expired.len(), "sweep timed out executions");
            }
            Ok(_) => {}
            Err(e) => {
                s.sweep_errors += 1;
                error!(error = %e, "timeout sweep failed");
            }
        }
    }

    info!("timeout monitor stopped");
}
