//! Host media primitives.
//!
//! The engine never decodes video itself; it drives elements created by a [`MediaFactory`] and
//! reads whatever frame they currently present.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::{foundation::error::EditorResult, render::surface::Bitmap, timeline::model::Clip};

/// Element readiness, ordered from least to most data buffered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// Nothing loaded.
    HaveNothing,
    /// Duration and dimensions known.
    HaveMetadata,
    /// The current frame is available.
    HaveCurrentData,
    /// Some frames past the current one are available.
    HaveFutureData,
    /// Playback can proceed without stalling.
    HaveEnoughData,
}

/// A host video/audio element bound to one clip.
///
/// Methods take `&self`; implementations use interior mutability.
pub trait MediaElement: Send + Sync {
    /// Current readiness.
    fn ready_state(&self) -> ReadyState;
    /// Playhead in source seconds.
    fn current_time(&self) -> f64;
    /// Start a seek to `t` source seconds; completion is reported through [`Self::seeked`].
    fn set_current_time(&self, t: f64);
    /// Future resolving at the next seek completion after this call.
    ///
    /// Subscribe before calling [`Self::set_current_time`] so a fast seek is not missed.
    fn seeked(&self) -> BoxFuture<'static, ()>;
    /// Frame presented at the current time, premultiplied.
    fn frame(&self) -> Option<Bitmap>;
    /// Intrinsic pixel size.
    fn natural_size(&self) -> (u32, u32);
    /// Native media length when known.
    fn duration(&self) -> Option<f64>;
    /// Begin playback.
    fn play(&self);
    /// Pause playback.
    fn pause(&self);
    /// `true` while not playing.
    fn is_paused(&self) -> bool;
    /// Mute or unmute audio.
    fn set_muted(&self, muted: bool);
    /// Current mute flag.
    fn is_muted(&self) -> bool;
    /// Set gain in `[0, 1]`.
    fn set_volume(&self, volume: f64);
    /// Current gain.
    fn volume(&self) -> f64;
}

/// Creates elements for clips.
pub trait MediaFactory: Send + Sync {
    /// Build (and start preloading) the element for `clip`.
    fn create(&self, clip: &Clip) -> EditorResult<Arc<dyn MediaElement>>;
}

/// Decodes still images.
pub trait ImageDecoder: Send + Sync {
    /// Decode `source_url` into a premultiplied bitmap.
    fn decode(&self, source_url: &str) -> BoxFuture<'static, EditorResult<Bitmap>>;
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
