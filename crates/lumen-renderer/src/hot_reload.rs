//! Modification-time polling for shader hot reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::constants::hot_reload;

struct WatchEntry {
    tag: String,
    modified: Option<SystemTime>,
}

/// Watches files by polling their modification times.
///
/// Polls closer together than the interval return nothing, so calling
/// [`poll`](Self::poll) every frame stats the files at most once per interval.
pub struct AssetWatcher {
    interval: Duration,
    last_poll: Option<Instant>,
    files: HashMap<PathBuf, WatchEntry>,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl AssetWatcher {
    /// Intervals below one second are raised to one second.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(hot_reload::MIN_INTERVAL),
            last_poll: None,
            files: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts watching `path`; `tag` is reported when it changes.
    ///
    /// A file that does not exist yet is reported once it appears.
    pub fn watch(&mut self, path: impl Into<PathBuf>, tag: impl Into<String>) {
        let path = path.into();
        let modified = modified_time(&path);
        tracing::debug!("Watching {:?}", path);
        self.files.insert(
            path,
            WatchEntry {
                tag: tag.into(),
                modified,
            },
        );
    }

    pub fn unwatch(&mut self, path: &Path) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the tags of files modified since the last poll, sorted.
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        if let Some(last) = self.last_poll
            && now.saturating_duration_since(last) < self.interval
        {
            return Vec::new();
        }
        self.last_poll = Some(now);

        let mut changed = Vec::new();
        for (path, entry) in &mut self.files {
            let current = modified_time(path);
            if current.is_some() && current != entry.modified {
                tracing::info!("Detected change in {:?}", path);
                entry.modified = current;
                changed.push(entry.tag.clone());
            }
        }
        changed.sort();
        changed.dedup();
        changed
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumen-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, "// v1").unwrap();
        path
    }

    fn touch(path: &Path, offset_secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .unwrap();
    }

    #[test]
    fn test_interval_floor() {
        assert_eq!(
            AssetWatcher::new(Duration::from_millis(16)).interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_reports_modified_file_once_per_interval() {
        let path = temp_file("lighting.wgsl");
        let mut watcher = AssetWatcher::new(Duration::from_secs(1));
        watcher.watch(&path, "lighting");

        let start = Instant::now();
        assert!(watcher.poll(start).is_empty());

        touch(&path, 10);
        // throttled
        assert!(watcher.poll(start + Duration::from_millis(500)).is_empty());
        assert_eq!(watcher.poll(start + Duration::from_secs(1)), vec!["lighting"]);
        assert!(watcher.poll(start + Duration::from_secs(2)).is_empty());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_reported_when_created() {
        let path = std::env::temp_dir().join(format!("lumen-watch-missing-{}.wgsl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut watcher = AssetWatcher::new(Duration::from_secs(1));
        watcher.watch(&path, "ssao");
        let start = Instant::now();
        assert!(watcher.poll(start).is_empty());

        std::fs::write(&path, "// new").unwrap();
        assert_eq!(watcher.poll(start + Duration::from_secs(1)), vec!["ssao"]);

        assert!(watcher.unwatch(&path));
        assert!(watcher.is_empty());
        std::fs::remove_file(&path).unwrap();
    }
}
