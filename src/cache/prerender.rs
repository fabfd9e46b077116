//! Background pass that fills the [`FrameCache`] outward from the playhead.
//!
//! A pass captures the cache generation when it starts and re-checks it after every await; any
//! later [`Prerenderer::begin`] or [`Prerenderer::stop`] bumps the generation, so the stale pass
//! exits at its next checkpoint and the cache itself refuses its commits.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    cache::{
        fingerprint::{TimelineFingerprint, fingerprint_timeline},
        frame_cache::FrameCache,
    },
    foundation::core::{Canvas, Rect},
    foundation::error::EditorResult,
    foundation::time::{frame_count, frame_index, frame_to_secs},
    media::{element::lock, pool::MediaPool},
    playback::clock::SharedTime,
    render::{
        compositor::{CompositeInput, render_bitmap, scaled_size},
        surface::Bitmap,
    },
    timeline::edit::Timeline,
};

/// Pass tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrerenderOpts {
    /// Upper bound on frames queued by one pass.
    pub max_batch: usize,
    /// Cached frame size relative to the project canvas.
    pub render_scale: f64,
    /// Pause between frames so interactive work is not starved.
    pub yield_delay: Duration,
    /// Quiet period before a scheduled restart fires.
    pub restart_debounce: Duration,
}

impl Default for PrerenderOpts {
    fn default() -> Self {
        Self {
            max_batch: 300,
            render_scale: 0.5,
            yield_delay: Duration::from_millis(4),
            restart_debounce: Duration::from_millis(300),
        }
    }
}

/// Frozen scene a pass renders from.
#[derive(Clone, Debug)]
pub struct RenderScene {
    /// Timeline snapshot.
    pub timeline: Arc<Timeline>,
    /// Project canvas.
    pub canvas: Canvas,
}

impl RenderScene {
    /// Snapshot `timeline` for background rendering.
    pub fn new(timeline: Timeline, canvas: Canvas) -> Self {
        Self {
            timeline: Arc::new(timeline),
            canvas,
        }
    }
}

/// Pre-renderer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrerenderState {
    /// No pass of the current generation is running.
    Idle,
    /// A pass of the current generation is running.
    Rendering,
}

/// Outcome of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Generation the pass ran under.
    pub generation: u64,
    /// Frames in the priority queue.
    pub queued: usize,
    /// Frames committed to the cache.
    pub committed: usize,
    /// Frames skipped because media was not ready or a buffer failed.
    pub not_ready: usize,
    /// The pass observed a newer generation and exited early.
    pub cancelled: bool,
}

/// Frame indices ordered outward from `playhead`: `p, p+1, p-1, p+2, p-2, …`.
///
/// Forward wins the tie at each distance. Indices outside `[0, total)` and those for which
/// `is_cached` holds are skipped; at most `max_batch` indices are returned.
pub fn build_queue(
    playhead: i64,
    total: i64,
    max_batch: usize,
    is_cached: impl Fn(i64) -> bool,
) -> Vec<i64> {
    let mut queue = Vec::new();
    if total <= 0 || max_batch == 0 {
        return queue;
    }
    let p = playhead.clamp(0, total - 1);
    let push = |idx: i64, queue: &mut Vec<i64>| {
        if (0..total).contains(&idx) && !is_cached(idx) && queue.len() < max_batch {
            queue.push(idx);
        }
    };

    push(p, &mut queue);
    let mut offset = 1;
    while queue.len() < max_batch && (p + offset < total || p - offset >= 0) {
        push(p + offset, &mut queue);
        push(p - offset, &mut queue);
        offset += 1;
    }
    queue
}

/// Drives the media pool and compositor to fill the frame cache while the editor is paused.
pub struct Prerenderer {
    cache: Arc<FrameCache>,
    pool: Arc<MediaPool>,
    opts: PrerenderOpts,
    playhead: SharedTime,
    scene: Mutex<Option<RenderScene>>,
    fingerprint: Mutex<Option<TimelineFingerprint>>,
    active: Mutex<Option<u64>>,
    restart_token: AtomicU64,
    passes_started: AtomicU64,
}

impl std::fmt::Debug for Prerenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prerenderer")
            .field("opts", &self.opts)
            .field("state", &self.state())
            .field("passes_started", &self.passes_started())
            .finish_non_exhaustive()
    }
}

impl Prerenderer {
    /// Idle pre-renderer over `cache` and `pool`, reading the playhead from `playhead`.
    pub fn new(
        cache: Arc<FrameCache>,
        pool: Arc<MediaPool>,
        opts: PrerenderOpts,
        playhead: SharedTime,
    ) -> Self {
        Self {
            cache,
            pool,
            opts,
            playhead,
            scene: Mutex::new(None),
            fingerprint: Mutex::new(None),
            active: Mutex::new(None),
            restart_token: AtomicU64::new(0),
            passes_started: AtomicU64::new(0),
        }
    }

    /// Tuning in effect.
    pub fn opts(&self) -> PrerenderOpts {
        self.opts
    }

    /// Cache this pre-renderer fills.
    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    /// Current state.
    pub fn state(&self) -> PrerenderState {
        match *lock(&self.active) {
            Some(generation) if self.cache.is_current(generation) => PrerenderState::Rendering,
            _ => PrerenderState::Idle,
        }
    }

    /// Number of passes begun so far.
    pub fn passes_started(&self) -> u64 {
        self.passes_started.load(Ordering::SeqCst)
    }

    /// Latest scene handed to [`Self::set_scene`] or [`Self::begin`].
    pub fn scene(&self) -> Option<RenderScene> {
        lock(&self.scene).clone()
    }

    /// Cancel any in-flight pass and start a new one from `playhead` seconds.
    ///
    /// The returned pass does nothing until [`PrerenderPass::run`] is awaited.
    pub fn begin(self: &Arc<Self>, scene: RenderScene, playhead: f64) -> PrerenderPass {
        let generation = self.cache.bump_generation();
        *lock(&self.active) = Some(generation);
        *lock(&self.scene) = Some(scene.clone());
        self.passes_started.fetch_add(1, Ordering::SeqCst);

        let fps = self.cache.fps();
        let total = frame_count(scene.timeline.duration(), fps);
        let queue = build_queue(
            frame_index(playhead, fps),
            total,
            self.opts.max_batch,
            |idx| self.cache.contains(idx),
        );
        tracing::debug!(generation, queued = queue.len(), playhead, "prerender pass begun");

        PrerenderPass {
            owner: Arc::clone(self),
            generation,
            scene,
            queue,
        }
    }

    /// Cancel the in-flight pass and any pending restart. Does not wait for the pass to exit.
    pub fn stop(&self) {
        self.restart_token.fetch_add(1, Ordering::SeqCst);
        let generation = self.cache.bump_generation();
        *lock(&self.active) = None;
        tracing::debug!(generation, "prerender stopped");
    }

    /// Record `scene` as the latest; when its fingerprint differs from the previous one, stop the
    /// in-flight pass and invalidate the cache.
    ///
    /// Returns `true` when the cache was invalidated.
    pub fn set_scene(&self, scene: RenderScene) -> bool {
        let fp = fingerprint_timeline(&scene.timeline, scene.canvas);
        *lock(&self.scene) = Some(scene);

        let changed = {
            let mut stored = lock(&self.fingerprint);
            let changed = stored.is_some_and(|prev| prev != fp);
            *stored = Some(fp);
            changed
        };
        if changed {
            self.stop();
            self.cache.invalidate();
        }
        changed
    }

    /// [`Self::set_scene`] followed by a debounced restart when the cache was invalidated.
    pub fn notify_timeline_changed(self: &Arc<Self>, scene: RenderScene) -> bool {
        let changed = self.set_scene(scene);
        if changed {
            self.schedule_restart();
        }
        changed
    }

    /// The user moved the playhead while paused: stop and restart from the new position.
    pub fn notify_seek_while_paused(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        self.stop();
        self.schedule_restart()
    }

    /// Start a pass from the shared playhead after [`PrerenderOpts::restart_debounce`].
    ///
    /// Calls made within the debounce window coalesce into the last one. Returns `None` when no
    /// tokio runtime is available.
    pub fn schedule_restart(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let token = self.restart_token.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; prerender restart skipped");
            return None;
        };
        let this = Arc::clone(self);
        Some(handle.spawn(async move {
            tokio::time::sleep(this.opts.restart_debounce).await;
            if this.restart_token.load(Ordering::SeqCst) != token {
                return;
            }
            let Some(scene) = this.scene() else {
                return;
            };
            let playhead = this.playhead.get();
            this.begin(scene, playhead).run().await;
        }))
    }

    fn finish(&self, generation: u64) {
        let mut active = lock(&self.active);
        if *active == Some(generation) {
            *active = None;
        }
    }
}

/// One queued pass. Dropping it without running is equivalent to a pass that was cancelled.
pub struct PrerenderPass {
    owner: Arc<Prerenderer>,
    generation: u64,
    scene: RenderScene,
    queue: Vec<i64>,
}

impl std::fmt::Debug for PrerenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrerenderPass")
            .field("generation", &self.generation)
            .field("queue", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl PrerenderPass {
    /// Generation captured at [`Prerenderer::begin`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frame indices in processing order.
    pub fn queue(&self) -> &[i64] {
        &self.queue
    }

    /// Render every queued frame, committing each as soon as it is ready.
    #[tracing::instrument(skip_all, fields(generation = self.generation, queued = self.queue.len()))]
    pub async fn run(self) -> PassReport {
        let cache = &self.owner.cache;
        let fps = cache.fps();
        let mut report = PassReport {
            generation: self.generation,
            queued: self.queue.len(),
            ..PassReport::default()
        };

        for &index in &self.queue {
            if !cache.is_current(self.generation) {
                report.cancelled = true;
                break;
            }
            if cache.contains(index) {
                continue;
            }
            let t = frame_to_secs(index, fps);

            let prepared = self.owner.pool.prepare_at(&self.scene.timeline, t).await;
            if !cache.is_current(self.generation) {
                report.cancelled = true;
                break;
            }

            if prepared {
                match self.composite(t) {
                    Ok((bitmap, true)) => {
                        if !cache.is_current(self.generation) {
                            report.cancelled = true;
                            break;
                        }
                        if cache.insert_if_current(self.generation, index, bitmap) {
                            report.committed += 1;
                        }
                    }
                    Ok((_, false)) => {
                        tracing::trace!(index, "frame incomplete; left for a later pass");
                        report.not_ready += 1;
                    }
                    Err(err) => {
                        tracing::warn!(index, error = %err, "frame snapshot failed");
                        report.not_ready += 1;
                    }
                }
            } else {
                report.not_ready += 1;
            }

            tokio::time::sleep(self.owner.opts.yield_delay).await;
        }

        if !report.cancelled && !cache.is_current(self.generation) {
            report.cancelled = true;
        }
        self.owner.finish(self.generation);
        tracing::debug!(
            committed = report.committed,
            not_ready = report.not_ready,
            cancelled = report.cancelled,
            "prerender pass finished"
        );
        report
    }

    fn composite(&self, t: f64) -> EditorResult<(Bitmap, bool)> {
        let canvas = self.scene.canvas;
        let (w, h) = scaled_size(canvas, self.owner.opts.render_scale);
        render_bitmap(&CompositeInput {
            time: t,
            scene: self.scene.timeline.as_ref(),
            media: self.owner.pool.as_ref(),
            live_mask: self.scene.timeline.live_mask(),
            canvas,
            render_rect: Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/prerender.rs"]
mod tests;
