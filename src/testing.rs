//! In-crate fakes for the external collaborators.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    common::{ConnectError, GuildId, ReplyChannel, ReplyError, ReplySink, ToolError, VoiceTarget},
    feeder::PlaylistEntry,
    library::Track,
    tools::{Downloader, Metadata, MetadataResolver, PlaylistResolver, watch_url},
    voice::{EngineEvent, EngineFactory, PlaybackEngine, VoiceConnection, VoiceConnector},
};

/// Track `name` with id `id_<name>` and a fixed file path.
pub fn track(name: &str) -> Track {
    let id = format!("id_{name}");
    Track {
        url: Some(watch_url(&id)),
        file_path: PathBuf::from(format!("/music/{id}_{name}.mp3")),
        id: Some(id),
        title: name.to_string(),
        title_san: name.to_string(),
    }
}

/// Lets spawned tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn channel(self: &Arc<Self>) -> ReplyChannel {
        ReplyChannel::new(self.clone())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }
}

impl ReplySink for RecordingSink {
    fn send(&self, text: String) -> Result<(), ReplyError> {
        self.messages.lock().push(text);
        Ok(())
    }
}

/// Records calls; `stop` and `finish` raise `Finished` when wired.
#[derive(Default)]
pub struct FakeEngine {
    events: Option<flume::Sender<EngineEvent>>,
    played: Mutex<Vec<PathBuf>>,
    playing: AtomicBool,
    paused: AtomicBool,
    stops: AtomicUsize,
}

impl FakeEngine {
    /// Not connected to any listener.
    pub fn detached() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Simulates the natural end of the current track.
    pub fn finish(&self) -> bool {
        if !self.playing.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::Finished { error: None });
        }
        true
    }
}

impl PlaybackEngine for FakeEngine {
    fn play(&self, path: &Path) {
        self.played.lock().push(path.to_path_buf());
        self.playing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn pause(&self) -> bool {
        self.playing.load(Ordering::SeqCst) && !self.paused.swap(true, Ordering::SeqCst)
    }

    fn resume(&self) -> bool {
        self.playing.load(Ordering::SeqCst) && self.paused.swap(false, Ordering::SeqCst)
    }

    fn stop(&self) -> bool {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.finish()
    }
}

#[derive(Default)]
pub struct FakeEngineFactory {
    engines: Mutex<HashMap<GuildId, Arc<FakeEngine>>>,
}

impl FakeEngineFactory {
    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn engine(&self, guild_id: &GuildId) -> Option<Arc<FakeEngine>> {
        self.engines.lock().get(guild_id).cloned()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(
        &self,
        guild_id: &GuildId,
        events: flume::Sender<EngineEvent>,
    ) -> Arc<dyn PlaybackEngine> {
        let engine = Arc::new(FakeEngine {
            events: Some(events),
            ..FakeEngine::default()
        });
        self.engines.lock().insert(guild_id.clone(), engine.clone());
        engine
    }
}

pub struct FakeConnection {
    target: VoiceTarget,
    destroyed: Arc<AtomicBool>,
    log: Option<Arc<Mutex<Vec<VoiceTarget>>>>,
}

impl FakeConnection {
    pub fn new(target: VoiceTarget) -> Self {
        Self {
            target,
            destroyed: Arc::new(AtomicBool::new(false)),
            log: None,
        }
    }

    pub fn destroyed_flag(&self) -> Arc<AtomicBool> {
        self.destroyed.clone()
    }
}

impl VoiceConnection for FakeConnection {
    fn target(&self) -> &VoiceTarget {
        &self.target
    }

    fn subscribe(&self, _engine: Arc<dyn PlaybackEngine>) {}

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().push(self.target.clone());
        }
    }
}

#[derive(Default)]
pub struct FakeConnector {
    connects: Mutex<Vec<VoiceTarget>>,
    destroyed: Arc<Mutex<Vec<VoiceTarget>>>,
    fail_next: AtomicBool,
    /// When set, only these channels are known.
    known: Mutex<Option<HashSet<VoiceTarget>>>,
}

impl FakeConnector {
    pub fn connects(&self) -> Vec<VoiceTarget> {
        self.connects.lock().clone()
    }

    pub fn destroyed(&self) -> Vec<VoiceTarget> {
        self.destroyed.lock().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn allow(&self, target: VoiceTarget) {
        self.known.lock().get_or_insert_with(HashSet::new).insert(target);
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(&self, target: &VoiceTarget) -> Result<Box<dyn VoiceConnection>, ConnectError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ConnectError::Failed {
                target: target.clone(),
                reason: "scripted failure".into(),
            });
        }
        self.connects.lock().push(target.clone());
        Ok(Box::new(FakeConnection {
            log: Some(self.destroyed.clone()),
            ..FakeConnection::new(target.clone())
        }))
    }

    fn knows_channel(&self, target: &VoiceTarget) -> bool {
        self.known
            .lock()
            .as_ref()
            .is_none_or(|known| known.contains(target))
    }
}

/// Resolves `...v=<id>` URLs to `Song <id>`, downloads by writing a small
/// file, and serves registered playlists.
#[derive(Default)]
pub struct ScriptedTools {
    downloads: AtomicUsize,
    fail_downloads: AtomicBool,
    playlists: Mutex<HashMap<String, Vec<PlaylistEntry>>>,
}

impl ScriptedTools {
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn add_playlist(&self, url: &str, entries: Vec<PlaylistEntry>) {
        self.playlists.lock().insert(url.to_string(), entries);
    }

    fn exit(stderr: &str) -> ToolError {
        ToolError::Exit {
            program: "yt-dlp".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl MetadataResolver for ScriptedTools {
    async fn resolve(&self, input: &str) -> Result<Metadata, ToolError> {
        let (_, id) = input
            .split_once("v=")
            .ok_or_else(|| Self::exit("ERROR: no results"))?;
        Ok(Metadata {
            id: id.to_string(),
            title: format!("Song {id}"),
            url: watch_url(id),
        })
    }
}

#[async_trait]
impl Downloader for ScriptedTools {
    async fn download(&self, _source: &str, dest: &Path) -> Result<(), ToolError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(Self::exit("ERROR: Video unavailable"));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::exit(&e.to_string()))?;
        }
        std::fs::write(dest, b"ID3").map_err(|e| Self::exit(&e.to_string()))
    }
}

#[async_trait]
impl PlaylistResolver for ScriptedTools {
    async fn entries(&self, url: &str) -> Result<Vec<PlaylistEntry>, ToolError> {
        self.playlists
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| Self::exit("ERROR: not a playlist"))
    }

    async fn is_playlist(&self, url: &str) -> Result<bool, ToolError> {
        Ok(self.playlists.lock().get(url).is_some_and(|l| l.len() > 1))
    }
}
