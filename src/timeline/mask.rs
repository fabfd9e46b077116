use crate::{
    foundation::core::{Affine, Canvas, Point},
    render::surface::{Bitmap, CompositeMode, RenderTarget, Surface},
    timeline::{
        edit::{ActiveMask, TIME_EPS, Timeline},
        model::{Mask, MaskId, TrackId},
    },
};

/// Where the compositor reads a mask's pixels from.
#[derive(Clone, Copy, Debug)]
pub enum MaskSource<'a> {
    /// The mask is being painted; read the live scratch surface.
    Live,
    /// Flushed raster.
    Persisted(&'a Bitmap),
}

/// One brush dab.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushDab {
    /// Center in mask pixels.
    pub center: Point,
    /// Radius in mask pixels.
    pub radius: f64,
    /// Clear instead of paint.
    pub erase: bool,
}

const MASK_PAINT: [u8; 4] = [255, 255, 255, 255];

impl Timeline {
    fn mask_overlaps(
        &self,
        track: &TrackId,
        start: f64,
        end: f64,
        except: Option<&MaskId>,
    ) -> bool {
        self.masks.iter().any(|m| {
            &m.track_id == track
                && Some(&m.id) != except
                && start < m.start_time + m.duration - TIME_EPS
                && m.start_time < end - TIME_EPS
        })
    }

    fn mask_timing_ok(
        &self,
        track: &TrackId,
        start: f64,
        duration: f64,
        except: Option<&MaskId>,
    ) -> bool {
        start.is_finite()
            && start >= 0.0
            && duration.is_finite()
            && duration + TIME_EPS >= self.limits.min_clip_duration
            && self.track(track).is_some()
            && !self.mask_overlaps(track, start, start + duration, except)
    }

    /// Add an empty mask on `track`. Masks on one track are time-disjoint.
    pub fn add_mask(
        &mut self,
        track: &TrackId,
        start: f64,
        duration: f64,
        size: Canvas,
    ) -> Option<MaskId> {
        if size.is_empty() || !self.mask_timing_ok(track, start, duration, None) {
            return None;
        }
        let id = MaskId(self.next_id("mask"));
        self.masks.push(Mask {
            id: id.clone(),
            track_id: track.clone(),
            start_time: start,
            duration,
            size,
            mask_data: None,
        });
        Some(id)
    }

    /// Delete a mask, ending its edit session if it is active.
    pub fn remove_mask(&mut self, id: &MaskId) -> bool {
        let Some(idx) = self.masks.iter().position(|m| &m.id == id) else {
            return false;
        };
        if self.active_mask.as_ref().is_some_and(|a| &a.id == id) {
            self.active_mask = None;
        }
        self.masks.remove(idx);
        true
    }

    /// Move or resize a mask in time.
    pub fn set_mask_timing(&mut self, id: &MaskId, start: f64, duration: f64) -> bool {
        let Some(idx) = self.masks.iter().position(|m| &m.id == id) else {
            return false;
        };
        let track = self.masks[idx].track_id.clone();
        if !self.mask_timing_ok(&track, start, duration, Some(id)) {
            return false;
        }
        self.masks[idx].start_time = start;
        self.masks[idx].duration = duration;
        true
    }

    /// Mask covering `track` at `t`, if any has pixels to apply.
    pub fn mask_at(&self, track: &TrackId, t: f64) -> Option<MaskSource<'_>> {
        let mask = self
            .masks
            .iter()
            .find(|m| &m.track_id == track && m.contains(t))?;
        if self.active_mask.as_ref().is_some_and(|a| a.id == mask.id) {
            return Some(MaskSource::Live);
        }
        mask.mask_data.as_ref().map(MaskSource::Persisted)
    }

    /// Scratch surface of the mask being painted.
    pub fn live_mask(&self) -> Option<&Surface> {
        self.active_mask.as_ref().map(|a| &a.surface)
    }

    /// Id of the mask being painted.
    pub fn active_mask_id(&self) -> Option<&MaskId> {
        self.active_mask.as_ref().map(|a| &a.id)
    }

    /// Start painting `id`. Any other active mask is flushed and closed first.
    pub fn begin_mask_edit(&mut self, id: &MaskId) -> bool {
        if self.active_mask_id() == Some(id) {
            return true;
        }
        let Some(mask) = self.masks.iter().find(|m| &m.id == id) else {
            return false;
        };
        let Ok(mut surface) = Surface::new(mask.size.width, mask.size.height) else {
            return false;
        };
        if let Some(data) = &mask.mask_data {
            let sx = f64::from(mask.size.width) / f64::from(data.width().max(1));
            let sy = f64::from(mask.size.height) / f64::from(data.height().max(1));
            surface.set_composite_mode(CompositeMode::Normal);
            surface.draw_image(data.as_image(), Affine::scale_non_uniform(sx, sy), 1.0);
        }
        self.end_mask_edit();
        self.active_mask = Some(ActiveMask {
            id: id.clone(),
            surface,
        });
        true
    }

    /// Paint or erase one dab on the active mask.
    pub fn paint_mask(&mut self, dab: BrushDab) -> bool {
        let Some(active) = self.active_mask.as_mut() else {
            return false;
        };
        let color = if dab.erase { [0; 4] } else { MASK_PAINT };
        active.surface.fill_circle(dab.center, dab.radius, color);
        true
    }

    /// Flush the live pixels into the mask's persisted raster.
    pub fn end_mask_stroke(&mut self) -> bool {
        let Some(active) = &self.active_mask else {
            return false;
        };
        let snapshot = match active.surface.snapshot() {
            Ok(b) => b,
            Err(err) => {
                tracing::warn!(mask = %active.id, error = %err, "mask flush failed");
                return false;
            }
        };
        let id = active.id.clone();
        match self.masks.iter_mut().find(|m| m.id == id) {
            Some(mask) => {
                mask.mask_data = Some(snapshot);
                true
            }
            None => false,
        }
    }

    /// Flush and close the edit session.
    pub fn end_mask_edit(&mut self) -> bool {
        if self.active_mask.is_none() {
            return false;
        }
        let flushed = self.end_mask_stroke();
        self.active_mask = None;
        flushed
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/mask.rs"]
mod tests;
