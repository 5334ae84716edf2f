use crate::error::StoreError;
use crate::results::CandidateLink;
use crate::utils::normalize_url;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// First-seen metadata kept for every reported URL. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub first_seen: DateTime<Utc>,
    pub source: String,
}

/// The set of URLs already reported, keyed by normalized URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    records: BTreeMap<String, SeenRecord>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership test against normalized keys
    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    /// Insert every URL not already present; existing records are left untouched.
    /// Returns how many were actually added.
    pub fn add_all<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, SeenRecord)>,
    {
        let mut added = 0;
        for (url, record) in entries {
            if !self.records.contains_key(&url) {
                self.records.insert(url, record);
                added += 1;
            }
        }
        added
    }

    /// Record a batch of newly reported candidates as seen now
    pub fn add_candidates(&mut self, items: &[CandidateLink], now: DateTime<Utc>) -> usize {
        self.add_all(items.iter().map(|item| {
            (
                item.url.clone(),
                SeenRecord {
                    first_seen: now,
                    source: item.source_name.clone(),
                },
            )
        }))
    }

    pub fn get(&self, url: &str) -> Option<&SeenRecord> {
        self.records.get(url)
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Backing storage for the seen set.
///
/// `load` acquires the store for one run and `persist` writes the whole set
/// back; `release` ends the acquisition. Use [`SeenSession`] rather than
/// calling these directly so the all-or-nothing commit holds.
pub trait SeenStore: Send {
    /// Take the store for this run without reading its contents
    fn acquire(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Acquire and read the stored set
    fn load(&mut self) -> Result<SeenSet, StoreError>;

    fn persist(&mut self, set: &SeenSet) -> Result<(), StoreError>;

    fn release(&mut self) {}
}

/// One run's exclusive hold on a seen store.
///
/// The snapshot taken at open is the only thing the pipeline reads. Nothing is
/// written until [`SeenSession::commit`]; dropping the session without
/// committing leaves the backing store exactly as it was.
pub struct SeenSession<'a> {
    store: &'a mut dyn SeenStore,
    snapshot: SeenSet,
}

impl<'a> SeenSession<'a> {
    /// Acquire the store and load the current set
    pub fn open(store: &'a mut dyn SeenStore) -> Result<Self, StoreError> {
        let snapshot = store.load()?;
        ::log::info!("Loaded {} previously seen URLs", snapshot.len());
        Ok(Self { store, snapshot })
    }

    /// Acquire the store but start from an empty set; the commit replaces the stored set.
    /// The stored set is never read, so a corrupted store does not block a refresh.
    pub fn open_fresh(store: &'a mut dyn SeenStore) -> Result<Self, StoreError> {
        store.acquire()?;
        ::log::info!("Force refresh: ignoring previously seen URLs");
        Ok(Self {
            store,
            snapshot: SeenSet::new(),
        })
    }

    /// The seen set as of the start of the run
    pub fn snapshot(&self) -> &SeenSet {
        &self.snapshot
    }

    /// Write the snapshot plus every newly reported item in one persist
    pub fn commit(mut self, new_items: &[CandidateLink]) -> Result<usize, StoreError> {
        let mut updated = self.snapshot.clone();
        let added = updated.add_candidates(new_items, Utc::now());
        self.store.persist(&updated)?;
        ::log::info!(
            "Committed {} new URLs to seen store ({} total)",
            added,
            updated.len()
        );
        Ok(added)
    }
}

impl Drop for SeenSession<'_> {
    fn drop(&mut self) {
        self.store.release();
    }
}

/// Layout written by earlier versions: source name -> list of URLs
type LegacyLayout = BTreeMap<String, Vec<String>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum OnDisk {
    Current(SeenSet),
    Legacy(LegacyLayout),
}

/// JSON file store with a sibling lock file for the duration of a run
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    locked: bool,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            locked: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn acquire_lock(&mut self) -> Result<(), StoreError> {
        if self.locked {
            return Ok(());
        }
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }
        match self.create_lock_file() {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => match self.lock_holder() {
                Some(pid) if !process_alive(pid) => {
                    ::log::warn!(
                        "Removing stale lock {} left by pid {}",
                        self.lock_path.display(),
                        pid
                    );
                    fs::remove_file(&self.lock_path)
                        .map_err(|e| self.io_error(&self.lock_path, e))?;
                    self.create_lock_file().map_err(|e| self.lock_error(e))?;
                }
                holder => {
                    return Err(StoreError::Locked {
                        path: self.lock_path.clone(),
                        holder: holder.map_or_else(
                            || "an unknown process".to_string(),
                            |pid| format!("pid {pid}"),
                        ),
                    });
                }
            },
            Err(e) => return Err(self.io_error(&self.lock_path, e)),
            Ok(()) => {}
        }
        self.locked = true;
        Ok(())
    }

    /// Create the lock file exclusively and record our pid in it
    fn create_lock_file(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            ::log::warn!("Failed to record pid in {}: {}", self.lock_path.display(), e);
        }
        Ok(())
    }

    fn lock_error(&self, error: std::io::Error) -> StoreError {
        if error.kind() == std::io::ErrorKind::AlreadyExists {
            StoreError::Locked {
                path: self.lock_path.clone(),
                holder: "another run".to_string(),
            }
        } else {
            self.io_error(&self.lock_path, error)
        }
    }

    /// Pid recorded in an existing lock file, if readable
    fn lock_holder(&self) -> Option<u32> {
        fs::read_to_string(&self.lock_path)
            .ok()
            .and_then(|contents| contents.trim().parse().ok())
    }

    fn read(&self) -> Result<SeenSet, StoreError> {
        if !self.path.exists() {
            ::log::info!("No seen store at {}; starting empty", self.path.display());
            return Ok(SeenSet::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(&self.path, e))?;
        let decoded: OnDisk =
            serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(match decoded {
            OnDisk::Current(set) => set,
            OnDisk::Legacy(legacy) => migrate_legacy(legacy),
        })
    }
}

impl SeenStore for JsonFileStore {
    fn acquire(&mut self) -> Result<(), StoreError> {
        self.acquire_lock()
    }

    fn load(&mut self) -> Result<SeenSet, StoreError> {
        self.acquire()?;
        match self.read() {
            Ok(set) => Ok(set),
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }

    /// Write to a temporary sibling and rename over the original
    fn persist(&mut self, set: &SeenSet) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(set)?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| self.io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(&self.path, e))?;
        Ok(())
    }

    fn release(&mut self) {
        if self.locked {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                ::log::warn!("Failed to remove lock {}: {}", self.lock_path.display(), e);
            }
            self.locked = false;
        }
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether a process with this pid still exists. Without `/proc` every
/// holder is assumed alive and the lock has to be removed by hand.
fn process_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    !proc_root.is_dir() || proc_root.join(pid.to_string()).exists()
}

/// Flatten the per-source URL lists into normalized records
fn migrate_legacy(legacy: LegacyLayout) -> SeenSet {
    let now = Utc::now();
    let mut set = SeenSet::new();
    for (source, urls) in legacy {
        set.add_all(urls.into_iter().map(|raw| {
            let key = Url::parse(&raw)
                .map(|u| normalize_url(&u))
                .unwrap_or(raw);
            (
                key,
                SeenRecord {
                    first_seen: now,
                    source: source.clone(),
                },
            )
        }));
    }
    ::log::info!("Migrated {} URLs from legacy seen layout", set.len());
    set
}

/// In-memory store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub set: SeenSet,
    /// Simulate a corrupted backing store on load
    pub corrupted: bool,
    /// Number of successful persists
    pub persists: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(urls: &[&str]) -> Self {
        let mut set = SeenSet::new();
        set.add_all(urls.iter().map(|u| {
            (
                u.to_string(),
                SeenRecord {
                    first_seen: Utc::now(),
                    source: "seed".to_string(),
                },
            )
        }));
        Self {
            set,
            ..Self::default()
        }
    }
}

impl SeenStore for MemoryStore {
    fn load(&mut self) -> Result<SeenSet, StoreError> {
        if self.corrupted {
            return Err(StoreError::Corrupt {
                path: PathBuf::from("<memory>"),
                reason: "simulated corruption".to_string(),
            });
        }
        Ok(self.set.clone())
    }

    fn persist(&mut self, set: &SeenSet) -> Result<(), StoreError> {
        self.set = set.clone();
        self.persists += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn item(url: &str) -> CandidateLink {
        CandidateLink::new(url.to_string(), "t".to_string(), "c".to_string(), "S")
    }

    fn keys(set: &SeenSet) -> BTreeSet<String> {
        set.urls().map(str::to_string).collect()
    }

    #[test]
    fn test_add_all_is_idempotent() {
        let mut set = SeenSet::new();
        assert_eq!(set.add_candidates(&[item("https://a.org/1")], Utc::now()), 1);
        let first = set.get("https://a.org/1").cloned();
        assert_eq!(
            set.add_candidates(&[item("https://a.org/1"), item("https://a.org/1")], Utc::now()),
            0
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("https://a.org/1").cloned(), first);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("seen.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");

        for urls in [vec![], vec!["https://a.org/1", "https://b.org/x?y=1"]] {
            let mut set = SeenSet::new();
            let items: Vec<_> = urls.iter().map(|u| item(u)).collect();
            set.add_candidates(&items, Utc::now());

            let mut store = JsonFileStore::new(&path);
            store.persist(&set).unwrap();
            let loaded = store.load().unwrap();
            store.release();
            assert_eq!(keys(&loaded), keys(&set));
        }
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "{ not json").unwrap();
        let mut store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));

        fs::write(&path, r#"{"https://a.org": 42}"#).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_legacy_layout_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(
            &path,
            r#"{"City": ["https://City.gov/rfp/1/", "https://city.gov/rfp/2"]}"#,
        )
        .unwrap();
        let mut store = JsonFileStore::new(&path);
        let set = store.load().unwrap();
        assert!(set.contains("https://city.gov/rfp/1"));
        assert!(set.contains("https://city.gov/rfp/2"));
        assert_eq!(set.get("https://city.gov/rfp/2").unwrap().source, "City");
    }

    #[test]
    fn test_second_acquisition_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut first = JsonFileStore::new(&path);
        let mut second = JsonFileStore::new(&path);

        let session = SeenSession::open(&mut first).unwrap();
        assert!(matches!(second.load(), Err(StoreError::Locked { .. })));
        drop(session);
        assert!(second.load().is_ok());
    }

    #[test]
    fn test_locked_error_names_holder_and_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut first = JsonFileStore::new(&path);
        first.acquire().unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&format!("pid {}", std::process::id())));
        assert!(message.contains("seen.json.lock"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let lock_path = dir.path().join("seen.json.lock");
        fs::write(&lock_path, "4000000000\n").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(&lock_path).unwrap().trim(),
            std::process::id().to_string()
        );
        store.release();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_fresh_session_recovers_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "[[[").unwrap();

        let mut store = JsonFileStore::new(&path);
        let session = SeenSession::open_fresh(&mut store).unwrap();
        session.commit(&[item("https://a.org/new")]).unwrap();

        let set = store.load().unwrap();
        assert_eq!(keys(&set), BTreeSet::from(["https://a.org/new".to_string()]));
    }

    #[test]
    fn test_session_without_commit_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut store = JsonFileStore::new(&path);
        {
            let _session = SeenSession::open(&mut store).unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_commit_writes_snapshot_plus_new() {
        let mut store = MemoryStore::with_urls(&["https://a.org/old"]);
        let session = SeenSession::open(&mut store).unwrap();
        assert!(session.snapshot().contains("https://a.org/old"));
        let added = session.commit(&[item("https://a.org/new")]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.persists, 1);
        assert!(store.set.contains("https://a.org/old"));
        assert!(store.set.contains("https://a.org/new"));
    }

    #[test]
    fn test_fresh_session_replaces_store() {
        let mut store = MemoryStore::with_urls(&["https://a.org/old"]);
        let session = SeenSession::open_fresh(&mut store).unwrap();
        assert!(session.snapshot().is_empty());
        session.commit(&[item("https://a.org/new")]).unwrap();
        assert!(!store.set.contains("https://a.org/old"));
        assert!(store.set.contains("https://a.org/new"));
    }
}
