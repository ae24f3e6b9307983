use crate::{ledger::Ledger, Result};

use indexmap::IndexSet;
use tracing::{debug, info};

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// A ledger file plus the exact, ordered arguments of one query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file: PathBuf,
    pub args: Vec<String>,
}

impl CacheKey {
    pub fn new(file: &Path, args: &[String]) -> Self {
        Self {
            file: file.to_path_buf(),
            args: args.to_vec(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        for arg in &self.args {
            write!(f, "\u{241f}{}", arg)?;
        }
        Ok(())
    }
}

/// Change notifications for ledger files.
pub trait FileWatch {
    /// Start reporting changes to `path`.
    fn watch(&mut self, path: &Path) -> Result<()>;

    /// Watched paths that changed since the previous call.
    fn take_changes(&mut self) -> Vec<PathBuf>;

    fn unwatch(&mut self, path: &Path);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

fn fingerprint(path: &Path) -> Result<Option<Fingerprint>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(Fingerprint {
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Polls modification time and length of every watched file. A file that
/// disappears or reappears counts as changed.
#[derive(Debug, Default)]
pub struct MtimeWatch {
    seen: HashMap<PathBuf, Option<Fingerprint>>,
}

impl FileWatch for MtimeWatch {
    fn watch(&mut self, path: &Path) -> Result<()> {
        let current = fingerprint(path)?;
        self.seen.insert(path.to_path_buf(), current);
        Ok(())
    }

    fn take_changes(&mut self) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for (path, last) in self.seen.iter_mut() {
            let current = fingerprint(path).ok().flatten();
            if current != *last {
                *last = current;
                changed.push(path.clone());
            }
        }
        changed
    }

    fn unwatch(&mut self, path: &Path) {
        self.seen.remove(path);
    }
}

/// Folded ledgers keyed by query. Entries are only ever dropped per file:
/// when a watched ledger file changes, every query made against it goes.
pub struct QueryCache<W: FileWatch = MtimeWatch> {
    entries: HashMap<CacheKey, Arc<Ledger>>,
    groups: HashMap<PathBuf, IndexSet<CacheKey>>,
    watcher: W,
}

impl QueryCache<MtimeWatch> {
    pub fn new() -> Self {
        Self::with_watcher(MtimeWatch::default())
    }
}

impl Default for QueryCache<MtimeWatch> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: FileWatch> QueryCache<W> {
    pub fn with_watcher(watcher: W) -> Self {
        Self {
            entries: HashMap::new(),
            groups: HashMap::new(),
            watcher,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_watching(&self, file: &Path) -> bool {
        self.groups.contains_key(file)
    }

    /// Apply pending change notifications.
    pub fn refresh(&mut self) {
        for path in self.watcher.take_changes() {
            self.invalidate(&path);
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Ledger>> {
        self.refresh();
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: CacheKey, ledger: Arc<Ledger>) -> Result<()> {
        self.track(&key.file)?;
        if let Some(group) = self.groups.get_mut(&key.file) {
            group.insert(key.clone());
        }
        self.entries.insert(key, ledger);
        Ok(())
    }

    /// Drop every entry made against `file`. The file stays watched.
    /// Returns how many entries went.
    pub fn invalidate(&mut self, file: &Path) -> usize {
        let dropped = self.drop_group(file);
        if dropped > 0 {
            info!(file = %file.display(), dropped, "ledger file changed, cache dropped");
        }
        dropped
    }

    /// Drop every entry made against `file` and stop watching it.
    pub fn unwatch(&mut self, file: &Path) {
        let dropped = self.drop_group(file);
        if self.groups.remove(file).is_some() {
            self.watcher.unwatch(file);
            debug!(file = %file.display(), dropped, "stopped watching ledger file");
        }
    }

    fn drop_group(&mut self, file: &Path) -> usize {
        let Some(group) = self.groups.get_mut(file) else {
            return 0;
        };

        let dropped = group.len();
        for key in group.drain(..) {
            self.entries.remove(&key);
        }
        dropped
    }

    /// Return the cached ledger for `key`, or run the query and remember its
    /// result. The file is watched before the query runs, so a change made
    /// while it runs still invalidates the stored result.
    pub fn get_or_run<F>(&mut self, key: CacheKey, run: F) -> Result<Arc<Ledger>>
    where
        F: FnOnce(&CacheKey) -> Result<Ledger>,
    {
        self.refresh();
        self.track(&key.file)?;

        if let Some(ledger) = self.entries.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(ledger.clone());
        }

        debug!(key = %key, "cache miss");
        let ledger = Arc::new(run(&key)?);
        self.put(key, ledger.clone())?;
        Ok(ledger)
    }

    fn track(&mut self, file: &Path) -> Result<()> {
        if !self.groups.contains_key(file) {
            self.watcher.watch(file)?;
            self.groups.insert(file.to_path_buf(), IndexSet::new());
        }
        Ok(())
    }
}
