use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::future::{BoxFuture, join_all};

use crate::{
    foundation::error::{EditorError, EditorResult},
    media::element::{ImageDecoder, MediaElement, MediaFactory, ReadyState, lock},
    render::{compositor::MediaSources, surface::Bitmap},
    timeline::{
        edit::Timeline,
        model::{Clip, ClipId, ClipKind},
    },
};

/// Seek and audio-sync tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaPoolOpts {
    /// Seeks closer than this (seconds) are skipped.
    pub seek_epsilon: f64,
    /// Upper bound on one seek-and-wait.
    pub seek_timeout: Duration,
    /// Audible elements further than this (seconds) from the playhead are re-positioned.
    pub drift_threshold: f64,
}

impl Default for MediaPoolOpts {
    fn default() -> Self {
        Self {
            seek_epsilon: 0.01,
            seek_timeout: Duration::from_millis(2000),
            drift_threshold: 0.3,
        }
    }
}

/// Element plus the source it was created for.
struct Attached {
    source_url: String,
    element: Arc<dyn MediaElement>,
}

/// Owns one media element per video/audio clip and the decoded still images.
pub struct MediaPool {
    factory: Arc<dyn MediaFactory>,
    decoder: Arc<dyn ImageDecoder>,
    opts: MediaPoolOpts,
    elements: Mutex<HashMap<ClipId, Attached>>,
    images: Mutex<HashMap<String, Bitmap>>,
}

impl std::fmt::Debug for MediaPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPool")
            .field("opts", &self.opts)
            .field("elements", &lock(&self.elements).len())
            .field("images", &lock(&self.images).len())
            .finish()
    }
}

/// Source media time shown by `clip` at timeline time `t`.
pub fn source_time_for(clip: &Clip, t: f64) -> f64 {
    clip.source_time_at(t)
}

impl MediaPool {
    /// Empty pool.
    pub fn new(
        factory: Arc<dyn MediaFactory>,
        decoder: Arc<dyn ImageDecoder>,
        opts: MediaPoolOpts,
    ) -> Self {
        Self {
            factory,
            decoder,
            opts,
            elements: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Tuning in effect.
    pub fn opts(&self) -> MediaPoolOpts {
        self.opts
    }

    /// Create and preload the element for a video/audio clip. Images and clips already attached
    /// to the same source are no-ops; a clip whose source changed gets a fresh element.
    pub fn attach(&self, clip: &Clip) -> EditorResult<()> {
        if matches!(clip.kind, ClipKind::Image) {
            return Ok(());
        }
        let attached_to = lock(&self.elements)
            .get(clip.id())
            .map(|a| a.source_url.clone());
        match attached_to {
            Some(url) if url == clip.header.source_url => return Ok(()),
            Some(_) => {
                self.detach(clip.id());
            }
            None => {}
        }
        let element = self.factory.create(clip)?;
        element.pause();
        lock(&self.elements).insert(
            clip.id().clone(),
            Attached {
                source_url: clip.header.source_url.clone(),
                element,
            },
        );
        tracing::debug!(clip = %clip.id(), "media element attached");
        Ok(())
    }

    /// Release the element of a removed clip.
    pub fn detach(&self, clip_id: &ClipId) -> bool {
        let removed = lock(&self.elements).remove(clip_id);
        match removed {
            Some(Attached { element, .. }) => {
                element.pause();
                tracing::debug!(clip = %clip_id, "media element released");
                true
            }
            None => false,
        }
    }

    /// Attach elements for new clips, replace those whose source changed and release those whose
    /// clip is gone.
    ///
    /// Factory failures are logged and skipped; the clip stays not-ready.
    pub fn sync_with(&self, timeline: &Timeline) {
        let live: HashSet<&ClipId> = timeline.clips().iter().map(Clip::id).collect();
        let stale: Vec<ClipId> = lock(&self.elements)
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            self.detach(id);
        }
        for clip in timeline.clips() {
            if let Err(err) = self.attach(clip) {
                tracing::warn!(clip = %clip.id(), error = %err, "media element creation failed");
            }
        }
    }

    /// Element bound to a clip.
    pub fn element(&self, clip_id: &ClipId) -> Option<Arc<dyn MediaElement>> {
        lock(&self.elements)
            .get(clip_id)
            .map(|a| a.element.clone())
    }

    /// Decoded image for `source_url`, if already decoded.
    pub fn image(&self, source_url: &str) -> Option<Bitmap> {
        lock(&self.images).get(source_url).cloned()
    }

    /// Decode `source_url` once; later calls return the cached bitmap.
    pub async fn ensure_image(&self, source_url: &str) -> EditorResult<Bitmap> {
        if let Some(bmp) = self.image(source_url) {
            return Ok(bmp);
        }
        let bmp = self.decoder.decode(source_url).await?;
        lock(&self.images)
            .entry(source_url.to_string())
            .or_insert_with(|| bmp.clone());
        Ok(bmp)
    }

    /// Drop every decoded image.
    pub fn clear_images(&self) {
        lock(&self.images).clear();
    }

    /// `true` when the clip's media has reached `level` (images: decoded).
    pub fn is_ready(&self, clip: &Clip, level: ReadyState) -> bool {
        match clip.kind {
            ClipKind::Image => lock(&self.images).contains_key(&clip.header.source_url),
            ClipKind::Video(_) | ClipKind::Audio(_) => self
                .element(clip.id())
                .is_some_and(|el| el.ready_state() >= level),
        }
    }

    /// Seek the clip's element to `target` source seconds and wait for completion.
    ///
    /// Returns [`EditorError::SeekTimeout`] when the element does not report completion in time;
    /// callers treat that as "not ready yet".
    pub async fn seek(&self, clip_id: &ClipId, target: f64) -> EditorResult<()> {
        let element = self
            .element(clip_id)
            .ok_or_else(|| EditorError::media(format!("no media element for clip '{clip_id}'")))?;
        if (element.current_time() - target).abs() <= self.opts.seek_epsilon {
            return Ok(());
        }

        let done = element.seeked();
        element.set_current_time(target);
        tokio::time::timeout(self.opts.seek_timeout, done)
            .await
            .map_err(|_| EditorError::SeekTimeout {
                clip: clip_id.to_string(),
                target,
            })
    }

    /// Seek every visible video clip and decode every visible image active at `t`, in parallel.
    ///
    /// Returns `false` when any of them failed; failures are logged.
    pub async fn prepare_at(&self, timeline: &Timeline, t: f64) -> bool {
        let mut jobs: Vec<BoxFuture<'_, EditorResult<()>>> = Vec::new();
        for track in timeline.tracks().iter().filter(|tr| tr.visible) {
            let Some(clip) = timeline.clip_at(&track.id, t) else {
                continue;
            };
            if !clip.header.visible {
                continue;
            }
            match clip.kind {
                ClipKind::Video(_) => {
                    jobs.push(Box::pin(self.seek(clip.id(), source_time_for(clip, t))));
                }
                ClipKind::Image => {
                    let url = clip.header.source_url.as_str();
                    jobs.push(Box::pin(async move { self.ensure_image(url).await.map(|_| ()) }));
                }
                ClipKind::Audio(_) => {}
            }
        }

        let mut ok = true;
        for result in join_all(jobs).await {
            if let Err(err) = result {
                ok = false;
                match err {
                    EditorError::SeekTimeout { .. } => {
                        tracing::warn!(time = t, error = %err, "seek timed out")
                    }
                    _ => tracing::warn!(time = t, error = %err, "media preparation failed"),
                }
            }
        }
        ok
    }

    /// Start, stop and re-position elements so that exactly the audible clips at `t` play.
    ///
    /// Returns the number of audible clips.
    pub fn sync_audio(&self, timeline: &Timeline, t: f64, playing: bool) -> usize {
        let mut audible_count = 0;
        for clip in timeline.clips() {
            let Some(media) = clip.kind.media() else {
                continue;
            };
            let Some(element) = self.element(clip.id()) else {
                continue;
            };
            let audible = playing
                && clip.contains(t)
                && !media.muted
                && media.volume > 0.0
                && timeline
                    .track(clip.track_id())
                    .is_some_and(|tr| tr.visible && !tr.muted);

            if !audible {
                element.set_muted(true);
                if !element.is_paused() {
                    element.pause();
                }
                continue;
            }

            audible_count += 1;
            element.set_volume(media.volume);
            element.set_muted(false);
            let target = source_time_for(clip, t);
            if (element.current_time() - target).abs() > self.opts.drift_threshold {
                element.set_current_time(target);
            }
            if element.is_paused() {
                element.play();
            }
        }
        audible_count
    }

    /// Pause every element.
    pub fn pause_all(&self) {
        for attached in lock(&self.elements).values() {
            attached.element.pause();
        }
    }
}

impl MediaSources for MediaPool {
    fn video_element(&self, clip: &ClipId) -> Option<Arc<dyn MediaElement>> {
        self.element(clip)
    }

    fn image(&self, source_url: &str) -> Option<Bitmap> {
        MediaPool::image(self, source_url)
    }
}

/// Gates the audio sync pass to a fixed interval, independent of render cadence.
#[derive(Clone, Debug)]
pub struct AudioSyncTicker {
    interval: Duration,
    last: Option<Instant>,
}

impl AudioSyncTicker {
    /// Run at most once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// `true` when a pass is due at `now`; records `now` as the last run.
    pub fn should_run(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last run so the next tick syncs immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/pool.rs"]
mod tests;
