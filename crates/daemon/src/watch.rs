//! Restart-on-configuration-change signal.
//!
//! The dispatch core never watches configuration; the supervising layer is
//! expected to restart the process when it changes. This module models
//! that seam: a background thread polls the config file's mtime and sends
//! one notification when it moves, which the entry point feeds into the
//! same graceful-shutdown path as an interrupt.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

/// How often the config file's mtime is checked.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

fn mtime(path: &PathBuf) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watch `path` and send one unit on `tx` when it changes, then exit.
///
/// The sender side of a tokio channel is used so the async entry point can
/// `select!` on it next to the interrupt signal.
pub fn spawn_config_watcher(path: PathBuf, tx: tokio::sync::mpsc::Sender<()>) {
    std::thread::Builder::new()
        .name("config-watcher".to_string())
        .spawn(move || {
            let mut last = mtime(&path);
            if last.is_none() {
                warn!(path = %path.display(), "config file not readable, watching for it to appear");
            }

            loop {
                std::thread::sleep(POLL_INTERVAL);
                let current = mtime(&path);
                if current != last {
                    info!(path = %path.display(), "configuration changed");
                    // Receiver gone means the process is already exiting.
                    let _ = tx.blocking_send(());
                    return;
                }
                last = current;
            }
        })
        .expect("failed to spawn config watcher thread");
}
