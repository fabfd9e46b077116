//! One open editor: timeline, media pool, frame cache, pre-renderer and transport.
//!
//! The session enforces the pool ownership hand-off: pre-rendering is stopped before playback
//! starts and restarted (debounced) after playback stops or the playhead moves while paused.

use std::{sync::Arc, time::Instant};

use crate::{
    cache::{
        frame_cache::FrameCache,
        prerender::{PrerenderPass, PrerenderState, Prerenderer, RenderScene},
    },
    config::EditorConfig,
    foundation::core::{Affine, Canvas, Fps, Rect},
    foundation::error::EditorResult,
    foundation::time::{frame_count, frame_to_secs},
    media::{
        element::{ImageDecoder, MediaFactory},
        pool::{AudioSyncTicker, MediaPool},
    },
    playback::clock::{PlaybackClock, PlaybackState},
    render::{
        compositor::{CompositeInput, render},
        surface::{Bitmap, CompositeMode, RenderTarget},
    },
    timeline::{edit::Timeline, model::ClipKind},
};

/// Where a live frame came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSource {
    /// Drawn from the pre-render cache.
    Cached,
    /// Composited on the spot; `ready` is `false` when some media was missing.
    Live {
        /// Every visible clip had its media.
        ready: bool,
    },
}

/// Editor entry point.
pub struct EditorSession {
    config: EditorConfig,
    timeline: Timeline,
    pool: Arc<MediaPool>,
    cache: Arc<FrameCache>,
    prerender: Arc<Prerenderer>,
    clock: PlaybackClock,
    audio_ticker: AudioSyncTicker,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("clock", &self.clock)
            .field("cache", &self.cache)
            .field("prerender", &self.prerender)
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Open `timeline` with host media primitives. Pre-rendering starts on the first
    /// [`Self::schedule_prerender`], pause, stop or edit.
    pub fn new(
        config: EditorConfig,
        timeline: Timeline,
        factory: Arc<dyn MediaFactory>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> EditorResult<Self> {
        config.validate()?;
        let fps = config.project.fps;
        let cache = Arc::new(FrameCache::new(fps));
        let pool = Arc::new(MediaPool::new(factory, decoder, config.media_opts()));
        let clock = PlaybackClock::new(fps, timeline.duration(), config.clock_opts());
        let prerender = Arc::new(Prerenderer::new(
            cache.clone(),
            pool.clone(),
            config.prerender_opts(),
            clock.shared_time(),
        ));

        pool.sync_with(&timeline);
        let session = Self {
            audio_ticker: AudioSyncTicker::new(config.audio_sync_interval()),
            config,
            timeline,
            pool,
            cache,
            prerender,
            clock,
        };
        session.prerender.set_scene(session.scene());
        tracing::debug!(fps = fps.as_f64(), "editor session opened");
        Ok(session)
    }

    /// Configuration in effect.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Frame rate.
    pub fn fps(&self) -> Fps {
        self.config.project.fps
    }

    /// Project canvas.
    pub fn canvas(&self) -> Canvas {
        self.config.project.canvas
    }

    /// Current timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Media pool.
    pub fn pool(&self) -> &Arc<MediaPool> {
        &self.pool
    }

    /// Frame cache.
    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    /// Pre-renderer.
    pub fn prerenderer(&self) -> &Arc<Prerenderer> {
        &self.prerender
    }

    /// Transport.
    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Playhead in seconds.
    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// Apply a mutation to the timeline, then resync media, duration and the cache.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Timeline) -> R) -> R {
        let out = f(&mut self.timeline);
        self.timeline_changed();
        out
    }

    /// Replace the whole timeline (project load).
    pub fn replace_timeline(&mut self, timeline: Timeline) {
        self.timeline = timeline;
        self.pool.clear_images();
        self.timeline_changed();
    }

    fn scene(&self) -> RenderScene {
        RenderScene::new(self.timeline.clone(), self.canvas())
    }

    fn timeline_changed(&mut self) {
        self.pool.sync_with(&self.timeline);
        self.clock.set_duration(self.timeline.duration());
        let scene = self.scene();
        if self.clock.is_playing() {
            self.prerender.set_scene(scene);
        } else {
            self.prerender.notify_timeline_changed(scene);
        }
    }

    /// Decode every image clip's source up front. Failures are logged; those clips stay not-ready.
    pub async fn preload_images(&self) -> usize {
        let mut decoded = 0;
        for clip in self.timeline.clips() {
            if !matches!(clip.kind, ClipKind::Image) {
                continue;
            }
            match self.pool.ensure_image(&clip.header.source_url).await {
                Ok(_) => decoded += 1,
                Err(err) => {
                    tracing::warn!(clip = %clip.id(), error = %err, "image decode failed")
                }
            }
        }
        decoded
    }

    /// Start playback. Pre-rendering stops so the live renderer owns the media pool.
    pub fn play(&mut self, now: Instant) -> bool {
        if !self.clock.play(now) {
            return false;
        }
        self.prerender.stop();
        self.audio_ticker.reset();
        self.pool
            .sync_audio(&self.timeline, self.clock.current_time(), true);
        true
    }

    /// Pause playback and schedule a pre-render restart.
    pub fn pause(&mut self) {
        let was_playing = self.clock.is_playing();
        self.clock.pause();
        if was_playing {
            self.after_playback();
        }
    }

    /// Stop playback, rewind to 0 and schedule a pre-render restart.
    pub fn stop(&mut self) {
        self.clock.stop();
        self.after_playback();
    }

    fn after_playback(&mut self) {
        self.pool
            .sync_audio(&self.timeline, self.clock.current_time(), false);
        self.pool.pause_all();
        self.prerender.schedule_restart();
    }

    /// Move the playhead. While paused this restarts pre-rendering around the new position.
    pub fn seek(&mut self, t: f64) -> f64 {
        let t = self.clock.seek(t);
        if self.clock.is_playing() {
            self.audio_ticker.reset();
        } else {
            self.prerender.notify_seek_while_paused();
        }
        t
    }

    /// Seek one frame forward.
    pub fn step_forward(&mut self) -> f64 {
        self.seek(self.clock.current_time() + self.fps().frame_duration_secs())
    }

    /// Seek one frame back.
    pub fn step_backward(&mut self) -> f64 {
        self.seek(self.clock.current_time() - self.fps().frame_duration_secs())
    }

    /// Set playback speed.
    pub fn set_rate(&mut self, rate: f64) -> bool {
        self.clock.set_rate(rate)
    }

    /// Enable or disable looping from `loop_start`.
    pub fn set_looping(&mut self, looping: bool, loop_start: f64) {
        self.clock.set_looping(looping);
        self.clock.set_loop_start(loop_start);
    }

    /// Host animation-frame callback: advance the clock and run the periodic audio sync.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if !self.clock.is_playing() {
            return self.clock.current_time();
        }
        let t = self.clock.tick(now);
        if self.clock.state() != PlaybackState::Playing {
            self.after_playback();
        } else if self.audio_ticker.should_run(now) {
            self.pool.sync_audio(&self.timeline, t, true);
        }
        t
    }

    /// Start a pre-render pass after the debounce window unless playing.
    pub fn schedule_prerender(&self) {
        if !self.clock.is_playing() {
            self.prerender.schedule_restart();
        }
    }

    /// Begin a pre-render pass from the playhead immediately.
    pub fn prerender_now(&self) -> PrerenderPass {
        self.prerender.begin(self.scene(), self.clock.current_time())
    }

    /// Pre-renderer state.
    pub fn prerender_state(&self) -> PrerenderState {
        self.prerender.state()
    }

    /// Cached frame holding `time`.
    pub fn cached_frame(&self, time: f64) -> Option<Bitmap> {
        self.cache.get(time)
    }

    /// Cached spans in seconds.
    pub fn cached_ranges(&self) -> Vec<(f64, f64)> {
        self.cache.cached_time_ranges()
    }

    /// Playhead clamped to the start of the last frame, so a clock resting at the end still
    /// shows (and caches) the final frame.
    fn frame_time(&self) -> f64 {
        let fps = self.fps();
        let last = frame_count(self.timeline.duration(), fps) - 1;
        self.clock
            .current_time()
            .min(frame_to_secs(last.max(0), fps))
    }

    /// Draw the frame at the playhead into `render_rect` of `target`.
    ///
    /// A cached frame is preferred; a miss (or an active mask edit) falls back to compositing
    /// on the spot, so this never waits on the cache.
    pub fn render_live(&self, target: &mut dyn RenderTarget, render_rect: Rect) -> FrameSource {
        let time = self.frame_time();
        if self.timeline.active_mask_id().is_none()
            && let Some(bitmap) = self.cache.get(time)
        {
            draw_cached(target, &bitmap, render_rect);
            return FrameSource::Cached;
        }

        let ready = render(
            target,
            &CompositeInput {
                time,
                scene: &self.timeline,
                media: self.pool.as_ref(),
                live_mask: self.timeline.live_mask(),
                canvas: self.canvas(),
                render_rect,
            },
        );
        FrameSource::Live { ready }
    }
}

fn draw_cached(target: &mut dyn RenderTarget, bitmap: &Bitmap, render_rect: Rect) {
    let sx = render_rect.width() / f64::from(bitmap.width().max(1));
    let sy = render_rect.height() / f64::from(bitmap.height().max(1));
    let xf = Affine::translate(render_rect.origin().to_vec2()) * Affine::scale_non_uniform(sx, sy);

    target.clear();
    target.set_composite_mode(CompositeMode::Normal);
    target.set_clip_rect(Some(render_rect));
    target.draw_image(bitmap.as_image(), xf, 1.0);
    target.set_clip_rect(None);
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
