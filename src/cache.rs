use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::OptionChainSnapshot;

/// Where the cache lives by default.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".max-pain")
        .join("cache")
}

/// Cache identity. A hit needs all three components to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

impl CacheKey {
    pub fn new(ticker: &str, as_of_date: NaiveDate, expiration_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            as_of_date,
            expiration_date,
        }
    }

    /// `NVDA_20260210_20260220`. Ticker bytes outside `[A-Za-z0-9-]` are
    /// written as `%XX`, so `BRK.B` and `BRK_B` get different files.
    pub fn file_stem(&self) -> String {
        let mut ticker = String::with_capacity(self.ticker.len());
        for b in self.ticker.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' {
                ticker.push(char::from(b));
            } else {
                ticker.push_str(&format!("%{b:02X}"));
            }
        }
        format!(
            "{}_{}_{}",
            ticker,
            self.as_of_date.format("%Y%m%d"),
            self.expiration_date.format("%Y%m%d")
        )
    }
}

/// Keyed store of normalized snapshots.
pub trait SnapshotStore {
    fn load(&self, key: &CacheKey) -> Result<Option<OptionChainSnapshot>>;

    fn save(&mut self, key: &CacheKey, snapshot: &OptionChainSnapshot) -> Result<()>;

    /// Keep a payload the normalizer rejected, for offline debugging.
    fn preserve_raw(&mut self, key: &CacheKey, payload: &str) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct CacheRecord {
    key: CacheKey,
    snapshot: OptionChainSnapshot,
}

// ── Disk ─────────────────────────────────────────────────────────────

/// One JSON file per key. Files are published by rename, so a file that
/// exists under its final name is always complete.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn rejected_path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join("rejected").join(format!("{}.raw", key.file_stem()))
    }
}

impl SnapshotStore for DiskCache {
    fn load(&self, key: &CacheKey) -> Result<Option<OptionChainSnapshot>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading cache entry {}", path.display()))?;
        let record: CacheRecord = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                return Ok(None);
            }
        };
        if record.key != *key {
            warn!(path = %path.display(), "cache entry key mismatch, ignoring");
            return Ok(None);
        }
        Ok(Some(record.snapshot))
    }

    fn save(&mut self, key: &CacheKey, snapshot: &OptionChainSnapshot) -> Result<()> {
        let path = self.path_for(key);
        let record = CacheRecord {
            key: key.clone(),
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        write_atomic(&path, &json)
    }

    fn preserve_raw(&mut self, key: &CacheKey, payload: &str) -> Result<()> {
        let path = self.rejected_path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        write_atomic(&path, payload)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    std::fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

// ── Memory ───────────────────────────────────────────────────────────

/// In-process store, for runs that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    snapshots: HashMap<CacheKey, OptionChainSnapshot>,
    rejected: HashMap<CacheKey, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn rejected(&self, key: &CacheKey) -> Option<&str> {
        self.rejected.get(key).map(String::as_str)
    }
}

impl SnapshotStore for MemoryCache {
    fn load(&self, key: &CacheKey) -> Result<Option<OptionChainSnapshot>> {
        Ok(self.snapshots.get(key).cloned())
    }

    fn save(&mut self, key: &CacheKey, snapshot: &OptionChainSnapshot) -> Result<()> {
        self.snapshots.insert(key.clone(), snapshot.clone());
        Ok(())
    }

    fn preserve_raw(&mut self, key: &CacheKey, payload: &str) -> Result<()> {
        self.rejected.insert(key.clone(), payload.to_string());
        Ok(())
    }
}
