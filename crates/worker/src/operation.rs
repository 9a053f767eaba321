//! The backup procedure: an existing shell script run as a child process.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::resolve::BackupSettings;

/// Output lines kept as the failure cause when the script writes nothing to
/// stderr.
const OUTPUT_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("failed to start backup script: {0}")]
    Spawn(String),
    #[error("backup script failed ({status}): {cause}")]
    Failed { status: String, cause: String },
}

/// Runs a backup to completion.
///
/// `heartbeat` is invoked periodically while the operation is in progress.
pub trait BackupOperation {
    fn run(
        &self,
        settings: &BackupSettings,
        heartbeat: &mut dyn FnMut(),
    ) -> Result<(), OperationError>;
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// `bash <script> host port user pass name bucket path`
#[derive(Debug, Clone)]
pub struct ScriptBackup {
    script: PathBuf,
    heartbeat_interval: Option<Duration>,
}

impl ScriptBackup {
    pub fn new(script: impl Into<PathBuf>, heartbeat_interval: Option<Duration>) -> Self {
        Self {
            script: script.into(),
            heartbeat_interval,
        }
    }
}

impl BackupOperation for ScriptBackup {
    fn run(
        &self,
        settings: &BackupSettings,
        heartbeat: &mut dyn FnMut(),
    ) -> Result<(), OperationError> {
        let mut child = Command::new("bash")
            .arg(&self.script)
            .args(settings.script_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OperationError::Spawn(e.to_string()))?;

        info!(
            script = %self.script.display(),
            db_name = %settings.db_name,
            host = %settings.host,
            pid = child.id(),
            "backup script started"
        );

        let (line_tx, line_rx) = mpsc::channel::<(StreamKind, String)>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(StreamKind::Stdout, stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(StreamKind::Stderr, stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut errors: Vec<String> = Vec::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let mut last_beat = Instant::now();

        loop {
            let wait = match self.heartbeat_interval {
                Some(interval) => interval.saturating_sub(last_beat.elapsed()),
                None => Duration::from_secs(3600),
            };

            match line_rx.recv_timeout(wait) {
                Ok((StreamKind::Stdout, line)) => {
                    info!(stream = "stdout", "{line}");
                    if tail.len() == OUTPUT_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok((StreamKind::Stderr, line)) => {
                    warn!(stream = "stderr", "{line}");
                    errors.push(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(interval) = self.heartbeat_interval {
                if last_beat.elapsed() >= interval {
                    heartbeat();
                    last_beat = Instant::now();
                }
            }
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = child
            .wait()
            .map_err(|e| OperationError::Spawn(format!("failed to wait for backup script: {e}")))?;

        if status.success() {
            info!(db_name = %settings.db_name, "backup script finished");
            return Ok(());
        }

        let cause = if !errors.is_empty() {
            errors.join("\n")
        } else if !tail.is_empty() {
            tail.into_iter().collect::<Vec<_>>().join("\n")
        } else {
            "db_backup script encountered errors".to_string()
        };

        Err(OperationError::Failed {
            status: status.to_string(),
            cause,
        })
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    stream: StreamKind,
    reader: R,
    sender: Sender<(StreamKind, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(reader);
        for line in reader.split(b'\n') {
            let Ok(bytes) = line else { break };
            let line = String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string();
            if line.is_empty() {
                continue;
            }
            if sender.send((stream, line)).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "opsflow-op-{}-{name}.sh",
            std::process::id()
        ));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn settings() -> BackupSettings {
        BackupSettings {
            db_name: "orders".into(),
            host: "db.internal".into(),
            port: "3306".into(),
            user: "backup".into(),
            pass: "hunter2".into(),
            s3_bucket: "backups".into(),
            s3_path: "orders/".into(),
        }
    }

    #[test]
    fn zero_exit_is_success() {
        let path = script("ok", "echo dumping \"$5\"\nexit 0\n");
        let result = ScriptBackup::new(&path, None).run(&settings(), &mut || {});
        assert_eq!(result, Ok(()));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn stderr_becomes_failure_cause() {
        let path = script(
            "stderr",
            "echo progress\necho \"cannot reach $1:$2\" >&2\necho \"upload to $6 failed\" >&2\nexit 3\n",
        );
        let err = ScriptBackup::new(&path, None)
            .run(&settings(), &mut || {})
            .unwrap_err();
        match err {
            OperationError::Failed { cause, .. } => {
                assert_eq!(cause, "cannot reach db.internal:3306\nupload to backups failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn output_tail_is_cause_without_stderr() {
        let path = script("stdout", "echo step one\necho step two\nexit 1\n");
        let err = ScriptBackup::new(&path, None)
            .run(&settings(), &mut || {})
            .unwrap_err();
        match err {
            OperationError::Failed { cause, .. } => assert_eq!(cause, "step one\nstep two"),
            other => panic!("unexpected error: {other:?}"),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn heartbeats_while_running() {
        let path = script("slow", "sleep 0.5\nexit 0\n");
        let mut beats = 0;
        ScriptBackup::new(&path, Some(Duration::from_millis(50)))
            .run(&settings(), &mut || beats += 1)
            .unwrap();
        assert!(beats >= 2, "expected heartbeats, got {beats}");
        let _ = std::fs::remove_file(path);
    }
}
