//! Response cache keyed by a request fingerprint.
//!
//! The file backend stores one `<fingerprint>.cache` file per entry holding
//! the JSON-serialized response. The file's mtime is the entry's creation
//! time. Expired, missing or unreadable entries are cache misses.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::params::VOLATILE_KEYS;

const CACHE_EXT: &str = "cache";

// ── Fingerprint ─────────────────────────────────────────────────────

/// Stable cache key for a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the pairs, ignoring order and the nonce/signature/timestamp keys.
    pub fn of<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let sorted: BTreeMap<String, String> = pairs
            .into_iter()
            .filter(|(k, _)| !VOLATILE_KEYS.contains(&k.as_ref()))
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let mut hasher = blake3::Hasher::new();
        for (k, v) in &sorted {
            // length prefixes keep ("ab","c") and ("a","bc") apart
            hasher.update(&(k.len() as u64).to_le_bytes());
            hasher.update(k.as_bytes());
            hasher.update(&(v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, CACHE_EXT)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Backend selection ───────────────────────────────────────────────

/// Which cache implementation a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// No caching: every call goes to the network.
    #[default]
    None,
    /// One file per entry under a root directory.
    File,
}

// ── Store capability ────────────────────────────────────────────────

/// Storage for decoded responses.
pub trait CacheStore: Send + Sync {
    /// Cached value, if present and not expired.
    fn get(&self, key: &Fingerprint) -> Option<serde_json::Value>;

    /// Store a value, replacing any previous entry.
    fn put(&self, key: &Fingerprint, value: &serde_json::Value) -> Result<(), ApiError>;

    /// Whether an unexpired entry exists.
    fn is_valid(&self, key: &Fingerprint) -> bool;

    /// Remove every entry.
    fn clear(&self) -> Result<(), ApiError>;

    /// Delete expired entries. Returns how many were removed.
    fn sweep(&self) -> Result<usize, ApiError>;
}

// ── File backend ────────────────────────────────────────────────────

/// Directory-backed cache.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    expiry: Duration,
}

impl FileCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>, expiry: Duration) -> Result<Self, ApiError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            ApiError::CacheUnavailable(format!("cannot create {}: {e}", root.display()))
        })?;
        Ok(Self { root, expiry })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Validity as of `now`: the entry exists and `mtime + expiry >= now`.
    pub fn is_valid_at(&self, key: &Fingerprint, now: SystemTime) -> bool {
        match modified(&self.entry_path(key)) {
            Some(mtime) => mtime + self.expiry >= now,
            None => false,
        }
    }

    /// Whether files can be created in the root.
    pub fn is_writable(&self) -> bool {
        is_writable_dir(&self.root)
    }

    /// Empty `root` recursively and recreate it.
    pub fn clear_dir(root: &Path) -> Result<(), ApiError> {
        let removed = if root.is_dir() {
            fs::remove_dir_all(root)
        } else if root.exists() {
            fs::remove_file(root)
        } else {
            Ok(())
        };
        removed.map_err(|e| {
            ApiError::CacheUnavailable(format!("cannot remove {}: {e}", root.display()))
        })?;
        fs::create_dir_all(root).map_err(|e| {
            ApiError::CacheUnavailable(format!("cannot create {}: {e}", root.display()))
        })
    }

    /// Delete entries whose age exceeds the expiry as of `now`.
    pub fn sweep_at(&self, now: SystemTime) -> Result<usize, ApiError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            ApiError::CacheUnavailable(format!("cannot read {}: {e}", self.root.display()))
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_EXT) {
                continue;
            }
            let Some(mtime) = modified(&path) else { continue };
            if mtime + self.expiry < now {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("cannot remove expired cache entry {}: {e}", path.display()),
                }
            }
        }
        Ok(removed)
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &Fingerprint) -> Option<serde_json::Value> {
        if !self.is_valid(key) {
            return None;
        }
        let path = self.entry_path(key);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("ignoring unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    fn put(&self, key: &Fingerprint, value: &serde_json::Value) -> Result<(), ApiError> {
        let contents = serde_json::to_string(value)
            .map_err(|e| ApiError::CacheUnavailable(e.to_string()))?;
        let path = self.entry_path(key);
        // write-then-rename so a concurrent reader never sees half an entry
        let tmp = path.with_extension(format!("{CACHE_EXT}.tmp"));
        fs::write(&tmp, contents)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                ApiError::CacheUnavailable(format!("cannot write {}: {e}", path.display()))
            })
    }

    fn is_valid(&self, key: &Fingerprint) -> bool {
        self.is_valid_at(key, SystemTime::now())
    }

    fn clear(&self) -> Result<(), ApiError> {
        Self::clear_dir(&self.root)
    }

    fn sweep(&self) -> Result<usize, ApiError> {
        self.sweep_at(SystemTime::now())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether a file can be created in `dir`.
pub fn is_writable_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    tempfile::Builder::new()
        .prefix(".probe")
        .tempfile_in(dir)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const WEEK: Duration = Duration::from_secs(604_800);

    fn key(id: &str) -> Fingerprint {
        Fingerprint::of([("method", "vimeo.videos.getInfo"), ("video_id", id)])
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), WEEK).unwrap();
        let value = json!({"stat": "ok", "video": [{"id": "1"}]});

        cache.put(&key("1"), &value).unwrap();

        assert!(cache.is_valid(&key("1")));
        assert_eq!(cache.get(&key("1")), Some(value));
        assert_eq!(cache.get(&key("2")), None);
        assert!(cache.entry_path(&key("1")).to_string_lossy().ends_with(".cache"));
    }

    #[test]
    fn test_expiry_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let expiry = Duration::from_secs(600);
        let cache = FileCache::open(dir.path(), expiry).unwrap();
        cache.put(&key("1"), &json!({"stat": "ok"})).unwrap();

        let written = modified(&cache.entry_path(&key("1"))).unwrap();
        let one = Duration::from_secs(1);
        assert!(cache.is_valid_at(&key("1"), written + expiry - one));
        assert!(cache.is_valid_at(&key("1"), written + expiry));
        assert!(!cache.is_valid_at(&key("1"), written + expiry + one));
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), WEEK).unwrap();
        fs::write(cache.entry_path(&key("1")), "not json {").unwrap();
        assert_eq!(cache.get(&key("1")), None);
    }

    #[test]
    fn test_sweep_removes_only_expired_cache_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), Duration::from_secs(60)).unwrap();
        cache.put(&key("1"), &json!(1)).unwrap();
        cache.put(&key("2"), &json!(2)).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let later = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(cache.sweep_at(later).unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(cache.sweep().unwrap(), 0);
    }

    #[test]
    fn test_clear_leaves_empty_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let cache = FileCache::open(&root, WEEK).unwrap();
        for i in 0..5 {
            cache.put(&key(&i.to_string()), &json!(i)).unwrap();
        }
        fs::create_dir(root.join("nested")).unwrap();

        cache.clear().unwrap();

        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
        assert!(cache.is_writable());
        cache.put(&key("again"), &json!("ok")).unwrap();
    }

    #[test]
    fn test_clear_dir_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("fresh");
        FileCache::clear_dir(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = Fingerprint::of([("a", "1"), ("b", "2")]);
        let b = Fingerprint::of([("b", "2"), ("a", "1")]);
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::of([("a", "1"), ("b", "3")]));
        assert_ne!(Fingerprint::of([("ab", "c")]), Fingerprint::of([("a", "bc")]));
    }

    proptest! {
        #[test]
        fn prop_fingerprint_ignores_volatile_fields(
            nonce_a in "[0-9a-f]{32}",
            nonce_b in "[0-9a-f]{32}",
            ts_a in any::<u32>(),
            ts_b in any::<u32>(),
            sig_a in "[A-Za-z0-9+/=]{28}",
            sig_b in "[A-Za-z0-9+/=]{28}",
            video in "[0-9]{1,10}",
        ) {
            let base = |nonce: &str, ts: u32, sig: &str| {
                Fingerprint::of(vec![
                    ("oauth_consumer_key".to_string(), "key".to_string()),
                    ("oauth_nonce".to_string(), nonce.to_string()),
                    ("oauth_timestamp".to_string(), ts.to_string()),
                    ("oauth_signature".to_string(), sig.to_string()),
                    ("video_id".to_string(), video.clone()),
                ])
            };
            prop_assert_eq!(base(&nonce_a, ts_a, &sig_a), base(&nonce_b, ts_b, &sig_b));
        }
    }
}
