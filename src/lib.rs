//! cutframe is the timeline and frame-cache core of a multi-track video editor.
//!
//! - Edit a [`Timeline`] of ordered tracks holding time-disjoint clips and paintable masks
//! - Composite any instant with [`render()`] into a [`RenderTarget`]
//! - Keep a [`FrameCache`] filled around the playhead with a cancellable [`Prerenderer`]
//! - Drive playback, audio sync and live preview through an [`EditorSession`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod media;
pub(crate) mod playback;
pub(crate) mod render;
pub(crate) mod session;
pub(crate) mod timeline;

pub use crate::foundation::core::{Affine, Canvas, Fps, Point, Rect, Transform2D, Vec2};
pub use crate::foundation::error::{EditorError, EditorResult};
pub use crate::foundation::time::{
    format_timecode, frame_count, frame_index, frame_to_secs, quantize, render_scale, step,
};

pub use crate::animation::anim::{InterpMode, Keyframe, Keyframes, Lerp};
pub use crate::animation::ease::Ease;

pub use crate::timeline::edit::{ClipPatch, Timeline, TimelineLimits, TrackFlags};
pub use crate::timeline::mask::{BrushDab, MaskSource};
pub use crate::timeline::model::{
    Clip, ClipHeader, ClipId, ClipKind, ClipKindTag, Mask, MaskId, MediaProps, TimelineView,
    Track, TrackId, TrackKind,
};

pub use crate::render::composite::{PremulRgba8, dest_in, over};
pub use crate::render::compositor::{
    CompositeInput, MediaSources, SceneQuery, render, render_bitmap, scaled_size,
};
pub use crate::render::surface::{Bitmap, CompositeMode, ImageRef, RenderTarget, Surface};

pub use crate::media::element::{ImageDecoder, MediaElement, MediaFactory, ReadyState};
pub use crate::media::pool::{AudioSyncTicker, MediaPool, MediaPoolOpts, source_time_for};
pub use crate::media::still::{FsImageDecoder, StillElement, StillFactory, decode_image_bytes};

pub use crate::cache::fingerprint::{TimelineFingerprint, fingerprint_timeline};
pub use crate::cache::frame_cache::{CacheStatus, FrameCache, ListenerId};
pub use crate::cache::prerender::{
    PassReport, PrerenderOpts, PrerenderPass, PrerenderState, Prerenderer, RenderScene,
    build_queue,
};

pub use crate::playback::clock::{ClockOpts, PlaybackClock, PlaybackState, SharedTime};

pub use crate::config::{EditorConfig, MediaConfig, PlaybackConfig, PrerenderConfig, ProjectConfig};
pub use crate::session::{EditorSession, FrameSource};
