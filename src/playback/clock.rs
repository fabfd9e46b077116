use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use crate::foundation::core::Fps;

/// Playhead shared between the clock, the render loop and audio sync.
///
/// Stores `f64` bits in an atomic so readers never touch session state.
#[derive(Clone, Debug, Default)]
pub struct SharedTime(Arc<AtomicU64>);

impl SharedTime {
    /// Start at `t` seconds.
    pub fn new(t: f64) -> Self {
        Self(Arc::new(AtomicU64::new(t.to_bits())))
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the value.
    pub fn set(&self, t: f64) {
        self.0.store(t.to_bits(), Ordering::Release);
    }
}

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not playing; time was reset to 0.
    #[default]
    Stopped,
    /// Advancing on every tick.
    Playing,
    /// Not playing; time kept.
    Paused,
}

/// Rate and loop settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockOpts {
    /// Playback speed multiplier (`> 0`).
    pub rate: f64,
    /// Wrap to `loop_start` at the end instead of stopping.
    pub looping: bool,
    /// Wrap target in seconds.
    pub loop_start: f64,
}

impl Default for ClockOpts {
    fn default() -> Self {
        Self {
            rate: 1.0,
            looping: false,
            loop_start: 0.0,
        }
    }
}

/// Transport driven by host animation ticks.
#[derive(Debug)]
pub struct PlaybackClock {
    state: PlaybackState,
    time: SharedTime,
    fps: Fps,
    duration: f64,
    opts: ClockOpts,
    last_tick: Option<Instant>,
}

impl PlaybackClock {
    /// Stopped clock at time 0.
    pub fn new(fps: Fps, duration: f64, opts: ClockOpts) -> Self {
        let mut clock = Self {
            state: PlaybackState::Stopped,
            time: SharedTime::new(0.0),
            fps,
            duration: duration.max(0.0),
            opts: ClockOpts::default(),
            last_tick: None,
        };
        clock.set_rate(opts.rate);
        clock.set_looping(opts.looping);
        clock.set_loop_start(opts.loop_start);
        clock
    }

    /// Handle to the shared playhead.
    pub fn shared_time(&self) -> SharedTime {
        self.time.clone()
    }

    /// Playhead in seconds.
    pub fn current_time(&self) -> f64 {
        self.time.get()
    }

    /// Transport state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Project duration the clock clamps to.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Rate and loop settings.
    pub fn opts(&self) -> ClockOpts {
        self.opts
    }

    /// Start playing from the current time. Returns `false` when already playing.
    ///
    /// Playing from the very end restarts at 0 (or the loop start when looping).
    pub fn play(&mut self, now: Instant) -> bool {
        if self.is_playing() {
            return false;
        }
        if self.current_time() >= self.duration {
            let restart = if self.wraps() {
                self.opts.loop_start
            } else {
                0.0
            };
            self.time.set(restart);
        }
        self.state = PlaybackState::Playing;
        self.last_tick = Some(now);
        true
    }

    /// Advance by the wall time since the previous tick, scaled by rate.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if !self.is_playing() {
            return self.current_time();
        }
        let elapsed = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64());
        self.last_tick = Some(now);

        let mut t = self.current_time() + elapsed * self.opts.rate;
        if t >= self.duration {
            if self.wraps() {
                t = self.opts.loop_start;
            } else {
                t = self.duration;
                self.state = PlaybackState::Paused;
                self.last_tick = None;
            }
        }
        self.time.set(t);
        t
    }

    /// Looping only wraps when the loop start lies before the end.
    fn wraps(&self) -> bool {
        self.opts.looping && self.opts.loop_start < self.duration
    }

    /// Stop advancing; keep the time.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
        self.last_tick = None;
    }

    /// Stop advancing and reset the time to 0.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.last_tick = None;
        self.time.set(0.0);
    }

    /// Jump to `t`, clamped to `[0, duration]`, in any state.
    pub fn seek(&mut self, t: f64) -> f64 {
        let t = if t.is_finite() {
            t.clamp(0.0, self.duration)
        } else {
            0.0
        };
        self.time.set(t);
        t
    }

    /// Seek one frame forward.
    pub fn step_forward(&mut self) -> f64 {
        self.seek(self.current_time() + self.fps.frame_duration_secs())
    }

    /// Seek one frame back.
    pub fn step_backward(&mut self) -> f64 {
        self.seek(self.current_time() - self.fps.frame_duration_secs())
    }

    /// Set playback speed; non-positive or non-finite rates are ignored.
    pub fn set_rate(&mut self, rate: f64) -> bool {
        if !(rate.is_finite() && rate > 0.0) {
            return false;
        }
        self.opts.rate = rate;
        true
    }

    /// Enable or disable looping.
    pub fn set_looping(&mut self, looping: bool) {
        self.opts.looping = looping;
    }

    /// Set the loop wrap target, clamped to `[0, duration]`.
    pub fn set_loop_start(&mut self, t: f64) {
        self.opts.loop_start = if t.is_finite() {
            t.clamp(0.0, self.duration)
        } else {
            0.0
        };
    }

    /// Update the project duration and re-clamp the time and loop start.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.set_loop_start(self.opts.loop_start);
        if self.current_time() > self.duration {
            self.time.set(self.duration);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/clock.rs"]
mod tests;
