//! Engine configuration loaded from JSON.
//!
//! Every section and field is optional; missing values take the defaults below. Durations are
//! stored in milliseconds.

use std::{path::Path, time::Duration};

use anyhow::Context as _;

use crate::{
    cache::prerender::PrerenderOpts,
    foundation::core::{Canvas, Fps},
    foundation::error::{EditorError, EditorResult},
    media::pool::MediaPoolOpts,
    playback::clock::ClockOpts,
    timeline::edit::{Timeline, TimelineLimits},
};

/// Root configuration.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Frame rate and canvas.
    pub project: ProjectConfig,
    /// Timeline editing limits.
    pub timeline: TimelineLimits,
    /// Background pre-render tuning.
    pub prerender: PrerenderConfig,
    /// Seek and audio sync tuning.
    pub media: MediaConfig,
    /// Transport defaults.
    pub playback: PlaybackConfig,
}

/// Project format.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Frame rate; also keys the frame cache.
    pub fps: Fps,
    /// Native canvas size.
    pub canvas: Canvas,
}

/// See [`PrerenderOpts`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrerenderConfig {
    /// Frames queued per pass.
    pub max_batch: usize,
    /// Cached frame size relative to the canvas, in `(0, 1]`.
    pub render_scale: f64,
    /// Pause between frames.
    pub yield_ms: u64,
    /// Restart debounce window.
    pub restart_debounce_ms: u64,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        let d = PrerenderOpts::default();
        Self {
            max_batch: d.max_batch,
            render_scale: d.render_scale,
            yield_ms: d.yield_delay.as_millis() as u64,
            restart_debounce_ms: d.restart_debounce.as_millis() as u64,
        }
    }
}

/// See [`MediaPoolOpts`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Seeks closer than this many seconds are skipped.
    pub seek_epsilon: f64,
    /// Seek-and-wait bound.
    pub seek_timeout_ms: u64,
    /// Audio sync cadence during playback.
    pub audio_sync_interval_ms: u64,
    /// Audible drift (seconds) that triggers a re-seek.
    pub drift_threshold: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let d = MediaPoolOpts::default();
        Self {
            seek_epsilon: d.seek_epsilon,
            seek_timeout_ms: d.seek_timeout.as_millis() as u64,
            audio_sync_interval_ms: 250,
            drift_threshold: d.drift_threshold,
        }
    }
}

/// See [`ClockOpts`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Speed multiplier.
    pub rate: f64,
    /// Loop at the end.
    pub looping: bool,
    /// Loop wrap target, seconds.
    pub loop_start: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let d = ClockOpts::default();
        Self {
            rate: d.rate,
            looping: d.looping,
            loop_start: d.loop_start,
        }
    }
}

fn positive(name: &str, v: f64) -> EditorResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(EditorError::config(format!("{name} must be finite and > 0, got {v}")))
    }
}

fn non_negative(name: &str, v: f64) -> EditorResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(EditorError::config(format!("{name} must be finite and >= 0, got {v}")))
    }
}

impl EditorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> EditorResult<Self> {
        let cfg: Self =
            serde_json::from_str(s).map_err(|e| EditorError::serde(format!("config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> EditorResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> EditorResult<()> {
        Fps::new(self.project.fps.num, self.project.fps.den)
            .map_err(|e| EditorError::config(format!("project.fps: {e}")))?;
        if self.project.canvas.is_empty() {
            return Err(EditorError::config("project.canvas must be non-empty"));
        }

        positive("timeline.min_clip_duration", self.timeline.min_clip_duration)?;
        non_negative(
            "timeline.min_project_duration",
            self.timeline.min_project_duration,
        )?;

        if self.prerender.max_batch == 0 {
            return Err(EditorError::config("prerender.max_batch must be > 0"));
        }
        positive("prerender.render_scale", self.prerender.render_scale)?;
        if self.prerender.render_scale > 1.0 {
            return Err(EditorError::config("prerender.render_scale must be <= 1"));
        }

        non_negative("media.seek_epsilon", self.media.seek_epsilon)?;
        if self.media.seek_timeout_ms == 0 {
            return Err(EditorError::config("media.seek_timeout_ms must be > 0"));
        }
        if self.media.audio_sync_interval_ms == 0 {
            return Err(EditorError::config(
                "media.audio_sync_interval_ms must be > 0",
            ));
        }
        non_negative("media.drift_threshold", self.media.drift_threshold)?;

        positive("playback.rate", self.playback.rate)?;
        non_negative("playback.loop_start", self.playback.loop_start)?;
        Ok(())
    }

    /// Empty timeline using the configured limits.
    pub fn new_timeline(&self) -> Timeline {
        Timeline::new(self.timeline)
    }

    /// Pre-render options.
    pub fn prerender_opts(&self) -> PrerenderOpts {
        PrerenderOpts {
            max_batch: self.prerender.max_batch,
            render_scale: self.prerender.render_scale,
            yield_delay: Duration::from_millis(self.prerender.yield_ms),
            restart_debounce: Duration::from_millis(self.prerender.restart_debounce_ms),
        }
    }

    /// Media pool options.
    pub fn media_opts(&self) -> MediaPoolOpts {
        MediaPoolOpts {
            seek_epsilon: self.media.seek_epsilon,
            seek_timeout: Duration::from_millis(self.media.seek_timeout_ms),
            drift_threshold: self.media.drift_threshold,
        }
    }

    /// Audio sync cadence.
    pub fn audio_sync_interval(&self) -> Duration {
        Duration::from_millis(self.media.audio_sync_interval_ms)
    }

    /// Clock options.
    pub fn clock_opts(&self) -> ClockOpts {
        ClockOpts {
            rate: self.playback.rate,
            looping: self.playback.looping,
            loop_start: self.playback.loop_start,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
