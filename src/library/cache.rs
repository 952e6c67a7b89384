//! Persistent, deduplicated index of downloaded tracks.
//!
//! Records are addressed by content id first and by sanitized title second.
//! The whole container is rewritten after every mutation; write failures
//! switch the cache to memory-only for the rest of the run.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{codec, track::Track};
use crate::{common::errors::CacheError, configs::LibraryConfig};

pub const INDEX_VERSION: u32 = 1;

/// On-disk layout of the index file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheContainer {
    pub version: u32,
    pub tracks: Vec<Track>,
}

impl Default for CacheContainer {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            tracks: Vec::new(),
        }
    }
}

impl CacheContainer {
    /// Reads the container at `path`. Missing or corrupt files yield an
    /// empty container; corruption is logged.
    pub fn read(path: &Path) -> Self {
        match Self::try_read(path) {
            Ok(Some(container)) => container,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(
                    "Could not read {}, it will be recreated: {e}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    fn try_read(path: &Path) -> Result<Option<Self>, CacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Records plus the two lookup indices. Always mutated as a unit.
#[derive(Default)]
struct CacheState {
    container: CacheContainer,
    by_id: HashMap<String, usize>,
    by_title_san: HashMap<String, usize>,
}

impl CacheState {
    fn new(container: CacheContainer) -> Self {
        let mut state = Self {
            container,
            ..Default::default()
        };
        state.reindex();
        state
    }

    /// First record wins for duplicate keys, matching lookup order.
    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_title_san.clear();
        for (i, track) in self.container.tracks.iter().enumerate() {
            if let Some(id) = &track.id {
                self.by_id.entry(id.clone()).or_insert(i);
            }
            self.by_title_san.entry(track.title_san.clone()).or_insert(i);
        }
    }

    fn lookup(&self, id: Option<&str>, title_san: Option<&str>) -> Option<&Track> {
        let by_id = id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.by_id.get(id));
        let by_title = || {
            title_san
                .filter(|t| !t.is_empty())
                .and_then(|t| self.by_title_san.get(t))
        };

        by_id
            .or_else(by_title)
            .map(|&i| &self.container.tracks[i])
    }

    /// Slot an incoming track merges into: id, then file path, then title.
    fn merge_slot(&self, track: &Track) -> Option<usize> {
        track
            .id
            .as_deref()
            .and_then(|id| self.by_id.get(id).copied())
            .or_else(|| {
                self.container
                    .tracks
                    .iter()
                    .position(|t| t.file_path == track.file_path)
            })
            .or_else(|| self.by_title_san.get(&track.title_san).copied())
    }

    fn represents(&self, file_path: &Path, id: Option<&str>, title_san: &str) -> bool {
        self.container.tracks.iter().any(|t| t.file_path == file_path)
            || id.is_some_and(|id| self.by_id.contains_key(id))
            || self.by_title_san.contains_key(title_san)
    }
}

pub struct TrackCache {
    dir: PathBuf,
    index_path: PathBuf,
    extension: String,
    state: RwLock<CacheState>,
    persistent: AtomicBool,
}

impl TrackCache {
    /// Opens the cache described by `config`, creating the directory if needed.
    pub fn load(config: &LibraryConfig) -> Self {
        Self::open(
            PathBuf::from(&config.cache_dir),
            config.index_path(),
            &config.audio_format,
        )
    }

    /// Reads the index, then indexes any media file in `dir` it does not
    /// already represent. Existing records are never overwritten.
    pub fn open(dir: PathBuf, index_path: PathBuf, extension: &str) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Could not create cache directory {}: {e}", dir.display());
        }

        let cache = Self {
            state: RwLock::new(CacheState::new(CacheContainer::read(&index_path))),
            dir,
            index_path,
            extension: extension.trim_start_matches('.').to_string(),
            persistent: AtomicBool::new(true),
        };

        let added = cache.index_directory();
        if added > 0 {
            debug!("Indexed {added} untracked file(s) from {}", cache.dir.display());
        }
        cache.persist(&cache.state.read().container);

        info!("Indexed downloads: {} file(s)", cache.list_all_unique().len());
        cache
    }

    fn index_directory(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not scan {}: {e}", self.dir.display());
                return 0;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
            })
            .collect();
        files.sort();

        let mut state = self.state.write();
        let mut added = 0;
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let parsed = codec::parse_filename(name);
            if state.represents(&path, parsed.id.as_deref(), &parsed.title_san) {
                continue;
            }

            state.container.tracks.push(Track {
                id: parsed.id,
                title: parsed.title,
                title_san: parsed.title_san,
                file_path: path,
                url: None,
            });
            state.reindex();
            added += 1;
        }
        added
    }

    /// Where a freshly downloaded track with this key pair is stored.
    pub fn canonical_path(&self, id: &str, title_san: &str) -> PathBuf {
        self.dir
            .join(codec::cache_file_name(id, title_san, &self.extension))
    }

    /// Id match wins over a title match; `None` when neither key is known.
    pub fn lookup(&self, id: Option<&str>, title_san: Option<&str>) -> Option<Track> {
        self.state.read().lookup(id, title_san).cloned()
    }

    /// Merges `track` into its existing record or appends it, then rewrites
    /// the index file.
    pub fn upsert(&self, track: Track) {
        let mut state = self.state.write();
        match state.merge_slot(&track) {
            Some(slot) => state.container.tracks[slot].merge_from(track),
            None => state.container.tracks.push(track),
        }
        state.reindex();
        self.persist(&state.container);
    }

    /// Every record, deduplicated by file path, in index order.
    pub fn list_all_unique(&self) -> Vec<Track> {
        let state = self.state.read();
        let mut seen = HashSet::new();
        state
            .container
            .tracks
            .iter()
            .filter(|t| seen.insert(t.file_path.clone()))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> CacheContainer {
        self.state.read().container.clone()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Acquire)
    }

    fn persist(&self, container: &CacheContainer) {
        if !self.is_persistent() {
            return;
        }
        if let Err(e) = container.write(&self.index_path) {
            warn!(
                "Could not write {}, continuing with an in-memory cache: {e}",
                self.index_path.display()
            );
            self.persistent.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: Option<&str>, title: &str, dir: &Path) -> Track {
        let title_san = codec::sanitize(title);
        let name = match id {
            Some(id) => codec::cache_file_name(id, &title_san, "mp3"),
            None => format!("{title_san}.mp3"),
        };
        Track {
            id: id.map(str::to_string),
            title: title.to_string(),
            title_san,
            file_path: dir.join(name),
            url: id.map(|id| format!("https://www.youtube.com/watch?v={id}")),
        }
    }

    fn open(dir: &Path) -> TrackCache {
        TrackCache::open(dir.to_path_buf(), dir.join("index.json"), "mp3")
    }

    #[test]
    fn id_match_wins_over_title_match() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let by_id = track(Some("aaaaaaaaaaa"), "First", dir.path());
        let by_title = track(Some("bbbbbbbbbbb"), "Second", dir.path());
        cache.upsert(by_id.clone());
        cache.upsert(by_title.clone());

        let hit = cache.lookup(Some("aaaaaaaaaaa"), Some(&by_title.title_san));
        assert_eq!(hit, Some(by_id));

        let hit = cache.lookup(Some("zzzzzzzzzzz"), Some(&by_title.title_san));
        assert_eq!(hit, Some(by_title));

        assert_eq!(cache.lookup(Some("zzzzzzzzzzz"), Some("Nope")), None);
        assert_eq!(cache.lookup(None, None), None);
    }

    #[test]
    fn upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let t = track(Some("aaaaaaaaaaa"), "Song", dir.path());

        cache.upsert(t.clone());
        let before = cache.list_all_unique().len();
        cache.upsert(t.clone());

        assert_eq!(cache.list_all_unique().len(), before);
        assert_eq!(cache.snapshot().tracks.len(), 1);
    }

    #[test]
    fn upsert_merges_into_path_match_and_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let legacy = track(None, "Old Name", dir.path());
        cache.upsert(legacy.clone());

        let mut upgraded = legacy.clone();
        upgraded.id = Some("ccccccccccc".into());
        upgraded.title_san = "New_Name".into();
        cache.upsert(upgraded);

        assert_eq!(cache.snapshot().tracks.len(), 1);
        let hit = cache.lookup(Some("ccccccccccc"), None).unwrap();
        assert_eq!(hit.file_path, legacy.file_path);
        assert!(cache.lookup(None, Some("Old_Name")).is_none());
        assert!(cache.lookup(None, Some("New_Name")).is_some());
    }

    #[test]
    fn upsert_persists_versioned_container() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        cache.upsert(track(Some("aaaaaaaaaaa"), "Song", dir.path()));

        let on_disk = CacheContainer::read(&dir.path().join("index.json"));
        assert_eq!(on_disk.version, INDEX_VERSION);
        assert_eq!(on_disk.tracks.len(), 1);

        let reopened = open(dir.path());
        assert!(reopened.lookup(Some("aaaaaaaaaaa"), None).is_some());
    }

    #[test]
    fn corrupt_index_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.json"), "{ not json").unwrap();

        let cache = open(dir.path());
        assert!(cache.list_all_unique().is_empty());
        assert!(cache.is_persistent());
    }

    #[test]
    fn load_indexes_untracked_files_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let known = track(Some("aaaaaaaaaaa"), "Known Song", dir.path());
        let container = CacheContainer {
            version: INDEX_VERSION,
            tracks: vec![known.clone()],
        };
        container.write(&dir.path().join("index.json")).unwrap();

        fs::write(&known.file_path, b"").unwrap();
        fs::write(dir.path().join("bbbbbbbbbbb_Fresh_Song.mp3"), b"").unwrap();
        fs::write(dir.path().join("Legacy Song.MP3"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let cache = open(dir.path());
        let all = cache.list_all_unique();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], known);

        let fresh = cache.lookup(Some("bbbbbbbbbbb"), None).unwrap();
        assert_eq!(fresh.title, "Fresh Song");
        assert_eq!(fresh.url, None);

        let legacy = cache.lookup(None, Some("Legacy Song")).unwrap();
        assert_eq!(legacy.id, None);
    }

    #[test]
    fn list_all_unique_dedupes_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = track(Some("aaaaaaaaaaa"), "Song", dir.path());
        let mut dup = a.clone();
        dup.id = Some("ddddddddddd".into());
        dup.title_san = "Other".into();
        let container = CacheContainer {
            version: INDEX_VERSION,
            tracks: vec![a, dup],
        };
        container.write(&dir.path().join("index.json")).unwrap();

        let cache = open(dir.path());
        assert_eq!(cache.snapshot().tracks.len(), 2);
        assert_eq!(cache.list_all_unique().len(), 1);
    }

    #[test]
    fn write_failure_degrades_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // index path is a directory, so every write fails
        let index = dir.path().join("index.json");
        fs::create_dir_all(&index).unwrap();
        let cache = TrackCache::open(dir.path().to_path_buf(), index, "mp3");

        cache.upsert(track(Some("aaaaaaaaaaa"), "Song", dir.path()));
        assert!(!cache.is_persistent());
        assert!(cache.lookup(Some("aaaaaaaaaaa"), None).is_some());
    }

    #[test]
    fn lookups_never_see_partial_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let tracks: Vec<Track> = (0..150)
            .map(|i| track(Some(&format!("{i:011}")), &format!("Song {i}"), dir.path()))
            .collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for t in &tracks {
                    cache.upsert(t.clone());
                }
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    for round in 0..20 {
                        for (i, t) in tracks.iter().enumerate().skip(round % 3) {
                            let id = t.id.as_deref();
                            if let Some(hit) = cache.lookup(id, None) {
                                assert_eq!(hit.id.as_deref(), id, "id hit {i}");
                                assert_eq!(hit.title_san, t.title_san, "id hit {i}");
                            }
                            if let Some(hit) = cache.lookup(None, Some(&t.title_san)) {
                                assert_eq!(hit.title_san, t.title_san, "title hit {i}");
                                assert_eq!(hit.file_path, t.file_path, "title hit {i}");
                            }
                        }
                    }
                });
            }
        });

        assert_eq!(cache.list_all_unique().len(), tracks.len());
    }

    #[test]
    fn canonical_path_uses_key_pair() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        assert_eq!(
            cache.canonical_path("aaaaaaaaaaa", "Song"),
            dir.path().join("aaaaaaaaaaa_Song.mp3")
        );
    }
}
