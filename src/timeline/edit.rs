use std::collections::HashSet;

use crate::{
    foundation::core::Vec2,
    foundation::error::{EditorError, EditorResult},
    render::surface::Surface,
    timeline::model::{
        Clip, ClipHeader, ClipId, ClipKind, Mask, MaskId, Track, TrackId, TrackKind, TimelineView,
    },
};

/// Tolerance used when comparing clip edges.
pub(crate) const TIME_EPS: f64 = 1e-9;

/// Timing limits enforced by the timeline mutators.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TimelineLimits {
    /// Shortest allowed clip, seconds.
    pub min_clip_duration: f64,
    /// Floor for the derived project duration, seconds.
    pub min_project_duration: f64,
}

impl Default for TimelineLimits {
    fn default() -> Self {
        Self {
            min_clip_duration: 0.1,
            min_project_duration: 10.0,
        }
    }
}

/// Partial clip update. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClipPatch {
    /// New timeline start.
    pub start_time: Option<f64>,
    /// New duration; `trim_out` follows.
    pub duration: Option<f64>,
    /// New source in-point; `trim_out` follows.
    pub trim_in: Option<f64>,
    /// New static position.
    pub position: Option<Vec2>,
    /// New scale.
    pub scale: Option<f64>,
    /// New rotation in degrees.
    pub rotation: Option<f64>,
    /// New opacity in `[0, 100]`.
    pub opacity: Option<f64>,
    /// Visibility flag.
    pub visible: Option<bool>,
    /// Lock flag. A locked clip accepts a patch that only touches this field.
    pub locked: Option<bool>,
    /// Replacement source reference.
    pub source_url: Option<String>,
    /// Replacement kind payload; must keep the same variant.
    pub kind: Option<ClipKind>,
}

impl ClipPatch {
    fn only_touches_lock(&self) -> bool {
        let rest = Self {
            locked: None,
            ..self.clone()
        };
        rest == Self::default()
    }
}

/// Per-track visibility/lock/mute flags update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackFlags {
    /// Visibility.
    pub visible: Option<bool>,
    /// Lock.
    pub locked: Option<bool>,
    /// Mute.
    pub muted: Option<bool>,
}

/// Mask being painted; its pixels live here until flushed into [`Mask::mask_data`].
#[derive(Clone, Debug)]
pub(crate) struct ActiveMask {
    pub(crate) id: MaskId,
    pub(crate) surface: Surface,
}

/// Editable multi-track timeline.
///
/// Every mutator either applies fully or rejects the edit by returning `false` / `None`, leaving
/// the timeline untouched.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    pub(crate) tracks: Vec<Track>,
    pub(crate) clips: Vec<Clip>,
    #[serde(default)]
    pub(crate) masks: Vec<Mask>,
    /// Timeline panel state.
    #[serde(default)]
    pub view: TimelineView,
    #[serde(default)]
    pub(crate) limits: TimelineLimits,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    duration: f64,
    #[serde(skip)]
    pub(crate) active_mask: Option<ActiveMask>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TimelineLimits::default())
    }
}

impl Timeline {
    /// Empty timeline with one video track.
    pub fn new(limits: TimelineLimits) -> Self {
        let mut tl = Self {
            tracks: Vec::new(),
            clips: Vec::new(),
            masks: Vec::new(),
            view: TimelineView::default(),
            limits,
            next_id: 0,
            duration: limits.min_project_duration,
            active_mask: None,
        };
        tl.add_track(TrackKind::Video, "Video 1");
        tl
    }

    /// Parse a project file and check its invariants.
    pub fn from_json_str(s: &str) -> EditorResult<Self> {
        let mut tl: Self = serde_json::from_str(s)
            .map_err(|e| EditorError::serde(format!("parse timeline json: {e}")))?;
        tl.validate()?;
        tl.reserve_loaded_ids();
        tl.recompute_duration();
        Ok(tl)
    }

    /// Serialize to a pretty-printed project file.
    pub fn to_json_string(&self) -> EditorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EditorError::serde(format!("serialize timeline json: {e}")))
    }

    /// Check structural invariants of a loaded timeline.
    pub fn validate(&self) -> EditorResult<()> {
        if self.tracks.is_empty() {
            return Err(EditorError::validation("timeline must have at least one track"));
        }
        if !(self.limits.min_clip_duration > 0.0) {
            return Err(EditorError::validation("min_clip_duration must be > 0"));
        }
        let mut seen = HashSet::new();
        let ids = (self.tracks.iter().map(|t| t.id.as_str()))
            .chain(self.clips.iter().map(|c| c.id().as_str()))
            .chain(self.masks.iter().map(|m| m.id.as_str()));
        for id in ids {
            if !seen.insert(id) {
                return Err(EditorError::validation(format!("duplicate id '{id}'")));
            }
        }
        for clip in &self.clips {
            let h = &clip.header;
            let Some(track) = self.track(&h.track_id) else {
                return Err(EditorError::validation(format!(
                    "clip '{}' references unknown track '{}'",
                    h.id, h.track_id
                )));
            };
            if track.kind != clip.kind.track_kind() {
                return Err(EditorError::validation(format!(
                    "clip '{}' kind does not match track '{}'",
                    h.id, track.id
                )));
            }
            if !h.start_time.is_finite() || h.start_time < 0.0 {
                return Err(EditorError::validation(format!(
                    "clip '{}' start_time must be finite and >= 0",
                    h.id
                )));
            }
            if !h.duration.is_finite() || h.duration + TIME_EPS < self.limits.min_clip_duration {
                return Err(EditorError::validation(format!(
                    "clip '{}' duration is below the minimum",
                    h.id
                )));
            }
            if !h.position_keys.is_valid() {
                return Err(EditorError::validation(format!(
                    "clip '{}' position keyframes are not sorted",
                    h.id
                )));
            }
            if self.overlaps(&h.track_id, h.start_time, clip.end(), Some(&h.id)) {
                return Err(EditorError::validation(format!(
                    "clip '{}' overlaps another clip on track '{}'",
                    h.id, h.track_id
                )));
            }
            if clip.kind.media().is_some()
                && (h.trim_out - h.trim_in - h.duration).abs() > TIME_EPS
            {
                return Err(EditorError::validation(format!(
                    "clip '{}' trim range does not match its duration",
                    h.id
                )));
            }
            if !self.fits_source(clip) {
                return Err(EditorError::validation(format!(
                    "clip '{}' trim range lies outside its source media",
                    h.id
                )));
            }
        }
        for mask in &self.masks {
            if self.track(&mask.track_id).is_none() {
                return Err(EditorError::validation(format!(
                    "mask '{}' references unknown track '{}'",
                    mask.id, mask.track_id
                )));
            }
        }
        Ok(())
    }

    /// Timing limits in effect.
    pub fn limits(&self) -> TimelineLimits {
        self.limits
    }

    /// Tracks in z-order; index 0 is the foreground.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// All clips, in insertion order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// All masks.
    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    /// Track by id.
    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    /// Clip by id.
    pub fn clip(&self, id: &ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    /// Clips on `track` sorted by start time.
    pub fn clips_on_track(&self, track: &TrackId) -> Vec<&Clip> {
        let mut out: Vec<&Clip> = self
            .clips
            .iter()
            .filter(|c| c.track_id() == track)
            .collect();
        out.sort_by(|a, b| a.start().total_cmp(&b.start()));
        out
    }

    /// The clip of `track` whose `[start, end)` holds `t`.
    pub fn clip_at(&self, track: &TrackId, t: f64) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.track_id() == track && c.contains(t))
    }

    /// Project duration: the latest clip end, floored at the minimum project duration.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub(crate) fn recompute_duration(&mut self) {
        let max_end = self.clips.iter().map(Clip::end).fold(0.0_f64, f64::max);
        self.duration = max_end.max(self.limits.min_project_duration);
    }

    /// Keep freshly allocated `track-N`/`clip-N`/`mask-N` ids clear of loaded ones.
    fn reserve_loaded_ids(&mut self) {
        let highest = (self.tracks.iter().map(|t| t.id.as_str()))
            .chain(self.clips.iter().map(|c| c.id().as_str()))
            .chain(self.masks.iter().map(|m| m.id.as_str()))
            .filter_map(|id| match id.rsplit_once('-') {
                Some(("track" | "clip" | "mask", n)) => n.parse::<u64>().ok(),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(highest);
    }

    pub(crate) fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    pub(crate) fn overlaps(
        &self,
        track: &TrackId,
        start: f64,
        end: f64,
        except: Option<&ClipId>,
    ) -> bool {
        self.clips.iter().any(|c| {
            c.track_id() == track
                && Some(c.id()) != except
                && start < c.end() - TIME_EPS
                && c.start() < end - TIME_EPS
        })
    }

    fn track_end(&self, track: &TrackId) -> f64 {
        self.clips
            .iter()
            .filter(|c| c.track_id() == track)
            .map(Clip::end)
            .fold(0.0_f64, f64::max)
    }

    fn is_editable(&self, clip: &Clip) -> bool {
        !clip.header.locked && self.track(clip.track_id()).is_some_and(|t| !t.locked)
    }

    fn clip_index(&self, id: &ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id() == id)
    }

    fn fits_source(&self, clip: &Clip) -> bool {
        let h = &clip.header;
        if clip.kind.media().is_none() {
            return true;
        }
        if h.trim_in < -TIME_EPS {
            return false;
        }
        match clip.kind.media().and_then(|m| m.source_duration) {
            Some(sd) => h.trim_out <= sd + TIME_EPS,
            None => true,
        }
    }

    fn placement_ok(&self, clip: &Clip) -> bool {
        let h = &clip.header;
        h.start_time.is_finite()
            && h.start_time >= 0.0
            && h.duration.is_finite()
            && h.duration + TIME_EPS >= self.limits.min_clip_duration
            && self
                .track(&h.track_id)
                .is_some_and(|t| t.kind == clip.kind.track_kind())
            && !self.overlaps(&h.track_id, h.start_time, clip.end(), Some(&h.id))
            && self.fits_source(clip)
    }

    fn commit_clip(&mut self, idx: usize, clip: Clip) {
        self.clips[idx] = clip;
        self.recompute_duration();
    }

    /// Append a track at the bottom of the stack.
    pub fn add_track(&mut self, kind: TrackKind, name: &str) -> TrackId {
        let id = TrackId(self.next_id("track"));
        self.tracks.push(Track {
            id: id.clone(),
            name: name.to_string(),
            kind,
            visible: true,
            locked: false,
            muted: false,
        });
        id
    }

    /// Remove a track with its clips and masks. The last remaining track cannot be removed.
    pub fn remove_track(&mut self, id: &TrackId) -> bool {
        if self.tracks.len() <= 1 {
            return false;
        }
        let Some(idx) = self.tracks.iter().position(|t| &t.id == id) else {
            return false;
        };
        self.tracks.remove(idx);
        self.clips.retain(|c| c.track_id() != id);
        if let Some(active) = &self.active_mask
            && self
                .masks
                .iter()
                .any(|m| m.id == active.id && &m.track_id == id)
        {
            self.active_mask = None;
        }
        self.masks.retain(|m| &m.track_id != id);
        self.recompute_duration();
        true
    }

    /// Move a track to `index` in the z-order (clamped to the stack).
    pub fn move_track(&mut self, id: &TrackId, index: usize) -> bool {
        let Some(from) = self.tracks.iter().position(|t| &t.id == id) else {
            return false;
        };
        let track = self.tracks.remove(from);
        let to = index.min(self.tracks.len());
        self.tracks.insert(to, track);
        true
    }

    /// Update visibility/lock/mute flags of a track.
    pub fn set_track_flags(&mut self, id: &TrackId, flags: TrackFlags) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        if let Some(v) = flags.visible {
            track.visible = v;
        }
        if let Some(v) = flags.locked {
            track.locked = v;
        }
        if let Some(v) = flags.muted {
            track.muted = v;
        }
        true
    }

    /// Place new media on `track` at `[start, start + duration)`.
    pub fn add_clip(
        &mut self,
        kind: ClipKind,
        track: &TrackId,
        source_url: &str,
        start: f64,
        duration: f64,
    ) -> Option<ClipId> {
        if self.track(track).is_some_and(|t| t.locked) {
            return None;
        }
        let mut clip = Clip {
            header: ClipHeader {
                id: ClipId(String::new()),
                track_id: track.clone(),
                start_time: start,
                duration,
                trim_in: 0.0,
                trim_out: duration,
                position: Vec2::ZERO,
                position_keys: Default::default(),
                scale: 1.0,
                rotation: 0.0,
                opacity: 100.0,
                visible: true,
                locked: false,
                source_url: source_url.to_string(),
            },
            kind,
        };
        if !self.placement_ok(&clip) {
            return None;
        }
        let id = ClipId(self.next_id("clip"));
        clip.header.id = id.clone();
        self.clips.push(clip);
        self.recompute_duration();
        Some(id)
    }

    /// Delete a clip.
    pub fn remove_clip(&mut self, id: &ClipId) -> bool {
        let Some(idx) = self.clip_index(id) else {
            return false;
        };
        if !self.is_editable(&self.clips[idx]) {
            return false;
        }
        self.clips.remove(idx);
        self.recompute_duration();
        true
    }

    /// Apply a partial update, re-validating timing, overlap and trim bounds.
    pub fn update_clip(&mut self, id: &ClipId, patch: ClipPatch) -> bool {
        let Some(idx) = self.clip_index(id) else {
            return false;
        };
        let current = &self.clips[idx];
        if !self.is_editable(current)
            && !(current.header.locked && patch.only_touches_lock() && self.track_unlocked(current))
        {
            return false;
        }
        if let Some(kind) = &patch.kind
            && kind.tag() != current.kind.tag()
        {
            return false;
        }

        let mut next = current.clone();
        let h = &mut next.header;
        if let Some(v) = patch.start_time {
            h.start_time = v;
        }
        if let Some(v) = patch.duration {
            h.duration = v;
        }
        if let Some(v) = patch.trim_in {
            h.trim_in = v;
        }
        h.trim_out = h.trim_in + h.duration;
        if let Some(v) = patch.position {
            h.position = v;
        }
        if let Some(v) = patch.scale {
            if !(v.is_finite() && v > 0.0) {
                return false;
            }
            h.scale = v;
        }
        if let Some(v) = patch.rotation {
            h.rotation = v;
        }
        if let Some(v) = patch.opacity {
            h.opacity = v.clamp(0.0, 100.0);
        }
        if let Some(v) = patch.visible {
            h.visible = v;
        }
        if let Some(v) = patch.locked {
            h.locked = v;
        }
        if let Some(v) = patch.source_url {
            h.source_url = v;
        }
        if let Some(kind) = patch.kind {
            next.kind = kind;
        }
        if let Some(m) = next.kind.media_mut() {
            m.volume = m.volume.max(0.0);
        }

        if !self.placement_ok(&next) {
            return false;
        }
        self.commit_clip(idx, next);
        true
    }

    fn track_unlocked(&self, clip: &Clip) -> bool {
        self.track(clip.track_id()).is_some_and(|t| !t.locked)
    }

    /// Move a clip to `track` at `start`, keeping its length and trim.
    pub fn move_clip(&mut self, id: &ClipId, track: &TrackId, start: f64) -> bool {
        let Some(idx) = self.clip_index(id) else {
            return false;
        };
        let current = &self.clips[idx];
        if !self.is_editable(current) || self.track(track).is_some_and(|t| t.locked) {
            return false;
        }
        let mut next = current.clone();
        next.header.track_id = track.clone();
        next.header.start_time = start;
        if !self.placement_ok(&next) {
            return false;
        }
        self.commit_clip(idx, next);
        true
    }

    /// Move the left edge to `new_start`, keeping the right edge fixed on the timeline.
    pub fn trim_start(&mut self, id: &ClipId, new_start: f64) -> bool {
        let Some(idx) = self.clip_index(id) else {
            return false;
        };
        let current = &self.clips[idx];
        if !self.is_editable(current) {
            return false;
        }
        let delta = new_start - current.start();
        let mut next = current.clone();
        let h = &mut next.header;
        h.start_time = new_start;
        h.duration = current.header.duration - delta;
        h.trim_in = current.header.trim_in + delta;
        h.position_keys = if delta >= 0.0 {
            current
                .header
                .position_keys
                .slice(delta, current.header.duration)
        } else {
            current.header.position_keys.shifted(-delta)
        };
        if !self.placement_ok(&next) {
            return false;
        }
        self.commit_clip(idx, next);
        true
    }

    /// Move the right edge to `new_end`.
    pub fn trim_end(&mut self, id: &ClipId, new_end: f64) -> bool {
        let Some(idx) = self.clip_index(id) else {
            return false;
        };
        let current = &self.clips[idx];
        if !self.is_editable(current) {
            return false;
        }
        let mut next = current.clone();
        let h = &mut next.header;
        h.duration = new_end - current.start();
        h.trim_out = h.trim_in + h.duration;
        if h.duration < current.header.duration {
            h.position_keys = current.header.position_keys.slice(0.0, h.duration);
        }
        if !self.placement_ok(&next) {
            return false;
        }
        self.commit_clip(idx, next);
        true
    }

    /// Copy a clip right after itself, or at the end of its track when that spot is taken.
    pub fn duplicate_clip(&mut self, id: &ClipId) -> Option<ClipId> {
        let idx = self.clip_index(id)?;
        let original = &self.clips[idx];
        if self.track(original.track_id()).is_some_and(|t| t.locked) {
            return None;
        }
        let mut copy = original.clone();
        copy.header.locked = false;
        copy.header.start_time = original.end();
        if self.overlaps(copy.track_id(), copy.start(), copy.end(), None) {
            copy.header.start_time = self.track_end(copy.track_id());
        }
        copy.header.id = ClipId(String::new());
        if !self.placement_ok(&copy) {
            return None;
        }
        let new_id = ClipId(self.next_id("clip"));
        copy.header.id = new_id.clone();
        self.clips.push(copy);
        self.recompute_duration();
        Some(new_id)
    }

    /// Razor cut at timeline time `t`. The left piece keeps the id; the right one is returned
    /// with a fresh id.
    pub fn split_at_time(&mut self, id: &ClipId, t: f64) -> Option<(ClipId, ClipId)> {
        let idx = self.clip_index(id)?;
        let original = &self.clips[idx];
        if !self.is_editable(original) {
            return None;
        }
        let min = self.limits.min_clip_duration;
        let left_d = t - original.start();
        let right_d = original.header.duration - left_d;
        if !(left_d.is_finite() && left_d + TIME_EPS >= min && right_d + TIME_EPS >= min) {
            return None;
        }

        let mut left = original.clone();
        left.header.duration = left_d;
        left.header.trim_out = left.header.trim_in + left_d;
        left.header.position_keys = original.header.position_keys.slice(0.0, left_d);

        let mut right = original.clone();
        right.header.start_time = original.start() + left_d;
        right.header.duration = right_d;
        right.header.trim_in = left.header.trim_out;
        right.header.trim_out = original.header.trim_out;
        right.header.position_keys = original
            .header
            .position_keys
            .slice(left_d, original.header.duration);

        let right_id = ClipId(self.next_id("clip"));
        right.header.id = right_id.clone();
        self.clips[idx] = left;
        self.clips.push(right);
        self.recompute_duration();
        Some((id.clone(), right_id))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/edit.rs"]
mod tests;
