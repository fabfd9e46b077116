//! Frame-rate-aware time quantization and project/render coordinate mapping.
//!
//! Timeline time is plain `f64` seconds. The pre-render cache keys frames by
//! `round(time * fps)`, so every conversion here goes through the same rounding.

use crate::foundation::core::{Canvas, Fps, Rect};

/// Frame index holding the instant `secs`: `round(secs * fps)`.
///
/// ```
/// use cutframe::{Fps, frame_index};
/// let fps = Fps::new(30, 1).unwrap();
/// assert_eq!(frame_index(1.0, fps), 30);
/// assert_eq!(frame_index(0.049, fps), 1);
/// ```
pub fn frame_index(secs: f64, fps: Fps) -> i64 {
    (secs * fps.as_f64()).round() as i64
}

/// Start time of frame `index` in seconds.
pub fn frame_to_secs(index: i64, fps: Fps) -> f64 {
    index as f64 * fps.frame_duration_secs()
}

/// Snap `secs` to the nearest frame boundary.
pub fn quantize(secs: f64, fps: Fps) -> f64 {
    frame_to_secs(frame_index(secs, fps), fps)
}

/// Number of frames needed to cover `duration` seconds.
pub fn frame_count(duration: f64, fps: Fps) -> i64 {
    if duration <= 0.0 {
        return 0;
    }
    (duration * fps.as_f64()).ceil() as i64
}

/// Move `secs` by `frames` whole frames (negative steps backward).
pub fn step(secs: f64, frames: i64, fps: Fps) -> f64 {
    secs + frames as f64 * fps.frame_duration_secs()
}

/// Uniform project→render-target scale factor, computed once per frame.
pub fn render_scale(render_rect: Rect, canvas: Canvas) -> f64 {
    if canvas.width == 0 {
        return 0.0;
    }
    render_rect.width() / f64::from(canvas.width)
}

/// Format seconds as `MM:SS:FF` (minutes, seconds, frames at `fps`).
///
/// ```
/// use cutframe::{Fps, format_timecode};
/// let fps = Fps::new(30, 1).unwrap();
/// assert_eq!(format_timecode(0.0, fps), "00:00:00");
/// assert_eq!(format_timecode(61.5, fps), "01:01:15");
/// ```
pub fn format_timecode(secs: f64, fps: Fps) -> String {
    let secs = secs.max(0.0);
    let per_sec = fps.as_f64().round().max(1.0) as u64;
    let total = frame_index(secs, fps).max(0) as u64;
    let m = total / (per_sec * 60);
    let s = (total / per_sec) % 60;
    let f = total % per_sec;
    format!("{m:02}:{s:02}:{f:02}")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/time.rs"]
mod tests;
