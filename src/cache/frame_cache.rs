use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    foundation::core::Fps,
    foundation::time::{frame_index, frame_to_secs},
    media::element::lock,
    render::surface::Bitmap,
};

/// Snapshot handed to cache listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStatus {
    /// Bumped on every insert and invalidation.
    pub version: u64,
    /// Cached frame count.
    pub frames: usize,
    /// Contiguous inclusive runs of cached frame indices.
    pub ranges: Vec<(i64, i64)>,
}

/// Handle returned by [`FrameCache::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&CacheStatus) + Send + Sync>;

#[derive(Default)]
struct Frames {
    map: BTreeMap<i64, Bitmap>,
    version: u64,
}

/// Composited frames keyed by `round(time * fps)`, with the generation counter that cancels
/// stale pre-render passes.
///
/// Entries are never overwritten; the only way to drop them is [`FrameCache::invalidate`].
/// Listeners run synchronously and must not call back into the cache's subscribe API.
pub struct FrameCache {
    fps: Fps,
    generation: AtomicU64,
    frames: Mutex<Frames>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl std::fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCache")
            .field("fps", &self.fps)
            .field("generation", &self.generation())
            .field("frames", &self.len())
            .finish_non_exhaustive()
    }
}

fn runs(map: &BTreeMap<i64, Bitmap>) -> Vec<(i64, i64)> {
    let mut out: Vec<(i64, i64)> = Vec::new();
    for &idx in map.keys() {
        match out.last_mut() {
            Some((_, end)) if *end + 1 == idx => *end = idx,
            _ => out.push((idx, idx)),
        }
    }
    out
}

impl FrameCache {
    /// Empty cache at generation 0.
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            generation: AtomicU64::new(0),
            frames: Mutex::new(Frames::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Frame rate used for keying.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `true` while `generation` is still the current one.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Invalidate every in-flight pass and return the new generation.
    ///
    /// Serialized with [`Self::insert_if_current`], so no stale commit can land after this
    /// returns.
    pub fn bump_generation(&self) -> u64 {
        let _frames = lock(&self.frames);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cached frame holding `time`.
    pub fn get(&self, time: f64) -> Option<Bitmap> {
        self.get_index(frame_index(time, self.fps))
    }

    /// Cached frame at `index`.
    pub fn get_index(&self, index: i64) -> Option<Bitmap> {
        lock(&self.frames).map.get(&index).cloned()
    }

    /// `true` when `index` is cached.
    pub fn contains(&self, index: i64) -> bool {
        lock(&self.frames).map.contains_key(&index)
    }

    /// Number of cached frames.
    pub fn len(&self) -> usize {
        lock(&self.frames).map.len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current content version.
    pub fn version(&self) -> u64 {
        lock(&self.frames).version
    }

    /// Commit `bitmap` at `index` if `generation` is still current and the slot is empty.
    pub fn insert_if_current(&self, generation: u64, index: i64, bitmap: Bitmap) -> bool {
        let status = {
            let mut frames = lock(&self.frames);
            if self.generation.load(Ordering::SeqCst) != generation
                || frames.map.contains_key(&index)
            {
                return false;
            }
            frames.map.insert(index, bitmap);
            frames.version += 1;
            Self::status_of(&frames)
        };
        self.notify(&status);
        true
    }

    /// Drop every frame, bump the version and notify listeners.
    pub fn invalidate(&self) {
        let status = {
            let mut frames = lock(&self.frames);
            frames.map.clear();
            frames.version += 1;
            Self::status_of(&frames)
        };
        tracing::debug!(version = status.version, "frame cache invalidated");
        self.notify(&status);
    }

    /// Contiguous inclusive runs of cached frame indices.
    pub fn cached_ranges(&self) -> Vec<(i64, i64)> {
        runs(&lock(&self.frames).map)
    }

    /// Cached runs as `[start, end)` seconds, for a "cached regions" indicator.
    pub fn cached_time_ranges(&self) -> Vec<(f64, f64)> {
        self.cached_ranges()
            .into_iter()
            .map(|(a, b)| (frame_to_secs(a, self.fps), frame_to_secs(b + 1, self.fps)))
            .collect()
    }

    /// Current status snapshot.
    pub fn status(&self) -> CacheStatus {
        Self::status_of(&lock(&self.frames))
    }

    /// Register a change listener.
    pub fn subscribe(
        &self,
        listener: impl Fn(&CacheStatus) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Box::new(listener)));
        id
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn status_of(frames: &Frames) -> CacheStatus {
        CacheStatus {
            version: frames.version,
            frames: frames.map.len(),
            ranges: runs(&frames.map),
        }
    }

    fn notify(&self, status: &CacheStatus) {
        for (_, listener) in lock(&self.listeners).iter() {
            listener(status);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/frame_cache.rs"]
mod tests;
