use std::fmt;

use crate::{
    animation::anim::Keyframes,
    foundation::core::{Canvas, Transform2D, Vec2},
    render::surface::Bitmap,
};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Stable track identifier.
    TrackId
);
string_id!(
    /// Stable clip identifier.
    ClipId
);
string_id!(
    /// Stable mask identifier.
    MaskId
);

/// What a track may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Video and image clips.
    Video,
    /// Audio clips.
    Audio,
}

/// An ordered lane of time-disjoint clips. Position in [`crate::Timeline::tracks`] is its
/// z-order: index 0 is the foreground.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// Track id.
    pub id: TrackId,
    /// Display name.
    pub name: String,
    /// Accepted clip family.
    pub kind: TrackKind,
    /// Hidden tracks are skipped by the compositor and are inaudible.
    pub visible: bool,
    /// Locked tracks reject clip edits.
    pub locked: bool,
    /// Muted tracks are inaudible.
    pub muted: bool,
}

/// Discriminant of [`ClipKind`]; `update_clip` may never change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClipKindTag {
    /// Video clip.
    Video,
    /// Audio clip.
    Audio,
    /// Still image clip.
    Image,
}

/// Audio-bearing clip settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaProps {
    /// Gain multiplier (`>= 0`).
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Per-clip mute.
    #[serde(default)]
    pub muted: bool,
    /// Native length of the source media when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_duration: Option<f64>,
}

fn default_volume() -> f64 {
    1.0
}

impl Default for MediaProps {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            source_duration: None,
        }
    }
}

/// Per-kind clip payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipKind {
    /// Video with an audio track.
    Video(MediaProps),
    /// Audio only.
    Audio(MediaProps),
    /// Still image.
    Image,
}

impl ClipKind {
    /// Variant tag.
    pub fn tag(&self) -> ClipKindTag {
        match self {
            Self::Video(_) => ClipKindTag::Video,
            Self::Audio(_) => ClipKindTag::Audio,
            Self::Image => ClipKindTag::Image,
        }
    }

    /// Audio settings for video/audio clips.
    pub fn media(&self) -> Option<&MediaProps> {
        match self {
            Self::Video(m) | Self::Audio(m) => Some(m),
            Self::Image => None,
        }
    }

    pub(crate) fn media_mut(&mut self) -> Option<&mut MediaProps> {
        match self {
            Self::Video(m) | Self::Audio(m) => Some(m),
            Self::Image => None,
        }
    }

    /// Track family this clip can live on.
    pub fn track_kind(&self) -> TrackKind {
        match self {
            Self::Audio(_) => TrackKind::Audio,
            Self::Video(_) | Self::Image => TrackKind::Video,
        }
    }
}

/// Fields shared by every clip kind.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClipHeader {
    /// Clip id.
    pub id: ClipId,
    /// Owning track.
    pub track_id: TrackId,
    /// Timeline start in seconds (`>= 0`).
    pub start_time: f64,
    /// Length on the timeline in seconds.
    pub duration: f64,
    /// Source time mapped to `start_time`.
    pub trim_in: f64,
    /// Source time mapped to `start_time + duration`.
    pub trim_out: f64,
    /// Project-space offset of the media's top-left corner.
    pub position: Vec2,
    /// Optional animated position in clip-local seconds; overrides `position` when non-empty.
    #[serde(default)]
    pub position_keys: Keyframes<Vec2>,
    /// Uniform scale around the media center.
    pub scale: f64,
    /// Rotation around the media center, degrees.
    pub rotation: f64,
    /// Opacity in `[0, 100]`.
    pub opacity: f64,
    /// Hidden clips are not drawn.
    pub visible: bool,
    /// Locked clips reject edits.
    pub locked: bool,
    /// Reference to the source media; the bytes are owned elsewhere.
    pub source_url: String,
}

/// A time-bounded reference to media placed on a track.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Clip {
    /// Shared fields.
    #[serde(flatten)]
    pub header: ClipHeader,
    /// Kind-specific payload.
    pub kind: ClipKind,
}

impl Clip {
    /// Clip id.
    pub fn id(&self) -> &ClipId {
        &self.header.id
    }

    /// Owning track id.
    pub fn track_id(&self) -> &TrackId {
        &self.header.track_id
    }

    /// Timeline start.
    pub fn start(&self) -> f64 {
        self.header.start_time
    }

    /// Timeline end (exclusive).
    pub fn end(&self) -> f64 {
        self.header.start_time + self.header.duration
    }

    /// `true` when `t` falls in `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start() && t < self.end()
    }

    /// Source media time shown at timeline time `t`.
    pub fn source_time_at(&self, t: f64) -> f64 {
        self.header.trim_in + (t - self.header.start_time)
    }

    /// Position at timeline time `t`, resolving keyframes when present.
    pub fn position_at(&self, t: f64) -> Vec2 {
        let local = t - self.header.start_time;
        self.header
            .position_keys
            .sample(local)
            .unwrap_or(self.header.position)
    }

    /// Project-space placement at `t` for media of `natural` pixel size.
    pub fn transform_at(&self, t: f64, natural: (u32, u32)) -> Transform2D {
        let center = Vec2::new(f64::from(natural.0) / 2.0, f64::from(natural.1) / 2.0);
        Transform2D {
            translate: self.position_at(t),
            rotation_rad: self.header.rotation.to_radians(),
            scale: Vec2::new(self.header.scale, self.header.scale),
            anchor: center,
        }
    }

    /// Opacity mapped to `[0, 1]`.
    pub fn opacity_unit(&self) -> f32 {
        (self.header.opacity / 100.0).clamp(0.0, 1.0) as f32
    }

    /// `true` for audio-only clips, which never draw.
    pub fn is_audio_only(&self) -> bool {
        matches!(self.kind, ClipKind::Audio(_))
    }
}

/// A time-bounded per-track alpha stencil.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mask {
    /// Mask id.
    pub id: MaskId,
    /// Track whose clips are stenciled.
    pub track_id: TrackId,
    /// Timeline start in seconds.
    pub start_time: f64,
    /// Length in seconds.
    pub duration: f64,
    /// Raster size, normally the project canvas.
    pub size: Canvas,
    /// Persisted raster; `None` until the first flush.
    #[serde(default)]
    pub mask_data: Option<Bitmap>,
}

impl Mask {
    /// `true` when `t` falls in `[start, start + duration)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t < self.start_time + self.duration
    }
}

/// Timeline panel view state. The compositor never reads it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineView {
    /// Pixels per second.
    pub zoom: f64,
    /// Horizontal scroll in pixels.
    pub scroll_x: f64,
    /// Vertical scroll in pixels.
    pub scroll_y: f64,
    /// Snap drags to nearby edges.
    pub snap_enabled: bool,
}

impl Default for TimelineView {
    fn default() -> Self {
        Self {
            zoom: 50.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            snap_enabled: true,
        }
    }
}

impl TimelineView {
    /// Panel x coordinate of timeline time `t`.
    pub fn time_to_x(&self, t: f64) -> f64 {
        t * self.zoom - self.scroll_x
    }

    /// Timeline time under panel x coordinate `x` (never negative).
    pub fn x_to_time(&self, x: f64) -> f64 {
        if self.zoom <= 0.0 {
            return 0.0;
        }
        ((x + self.scroll_x) / self.zoom).max(0.0)
    }

    /// Snap `t` to the closest candidate within `threshold_px`, when snapping is enabled.
    pub fn snap_time(&self, t: f64, candidates: &[f64], threshold_px: f64) -> f64 {
        if !self.snap_enabled || self.zoom <= 0.0 {
            return t;
        }
        let limit = threshold_px / self.zoom;
        candidates
            .iter()
            .copied()
            .filter(|c| (c - t).abs() <= limit)
            .min_by(|a, b| (a - t).abs().total_cmp(&(b - t).abs()))
            .unwrap_or(t)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
