//! Periodic sweep of the export output root: per-job directories are
//! disposable and get deleted once they outlive the retention window.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub fn spawn_retention_sweeper(output_dir: PathBuf, max_age: Duration) {
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
      tick.tick().await;
      match sweep_once(&output_dir, max_age) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "swept expired exports"),
        Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
      }
    }
  });
}

/// Delete entries under `dir` whose mtime is older than `max_age`.
/// Returns how many entries were removed.
pub fn sweep_once(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
  let now = SystemTime::now();
  let mut removed = 0usize;

  for entry in std::fs::read_dir(dir)? {
    let entry = entry?;
    let meta = entry.metadata()?;
    let expired = meta
      .modified()
      .ok()
      .and_then(|mtime| now.duration_since(mtime).ok())
      .map(|age| age > max_age)
      .unwrap_or(false);
    if !expired {
      continue;
    }

    let path = entry.path();
    let result = if meta.is_dir() {
      std::fs::remove_dir_all(&path)
    } else {
      std::fs::remove_file(&path)
    };
    match result {
      Ok(()) => {
        tracing::debug!(path = %path.display(), "removed expired export");
        removed += 1;
      }
      Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove export"),
    }
  }

  Ok(removed)
}
