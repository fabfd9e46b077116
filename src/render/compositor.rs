//! Timeline instant → composited frame.
//!
//! The same function backs live preview and the pre-render cache, so a cached frame and a live
//! frame for the same `(timeline, time)` are byte-identical.

use std::sync::Arc;

use crate::{
    foundation::core::{Affine, Canvas, Rect},
    foundation::error::EditorResult,
    foundation::time::render_scale,
    media::element::{MediaElement, ReadyState},
    render::surface::{Bitmap, CompositeMode, ImageRef, RenderTarget, Surface},
    timeline::{
        edit::Timeline,
        mask::MaskSource,
        model::{Clip, ClipId, ClipKind, Track, TrackId},
    },
};

/// Read access to the scene being composited.
pub trait SceneQuery {
    /// Tracks in z-order; index 0 is the foreground.
    fn tracks(&self) -> &[Track];
    /// Clip of `track` active at `t`.
    fn clip_at(&self, track: &TrackId, t: f64) -> Option<&Clip>;
    /// Mask covering `track` at `t`.
    fn mask_at(&self, track: &TrackId, t: f64) -> Option<MaskSource<'_>>;
}

impl SceneQuery for Timeline {
    fn tracks(&self) -> &[Track] {
        Timeline::tracks(self)
    }

    fn clip_at(&self, track: &TrackId, t: f64) -> Option<&Clip> {
        Timeline::clip_at(self, track, t)
    }

    fn mask_at(&self, track: &TrackId, t: f64) -> Option<MaskSource<'_>> {
        Timeline::mask_at(self, track, t)
    }
}

/// Drawable media lookups.
pub trait MediaSources {
    /// Element bound to a video clip.
    fn video_element(&self, clip: &ClipId) -> Option<Arc<dyn MediaElement>>;
    /// Decoded still image for `source_url`.
    fn image(&self, source_url: &str) -> Option<Bitmap>;
}

/// Everything one composite pass reads.
pub struct CompositeInput<'a> {
    /// Timeline instant in seconds.
    pub time: f64,
    /// Tracks, clips and masks.
    pub scene: &'a dyn SceneQuery,
    /// Ready media.
    pub media: &'a dyn MediaSources,
    /// Scratch surface of the mask being painted, read for [`MaskSource::Live`].
    pub live_mask: Option<&'a Surface>,
    /// Project canvas size.
    pub canvas: Canvas,
    /// Destination rectangle in target pixels.
    pub render_rect: Rect,
}

fn resolve_source(clip: &Clip, media: &dyn MediaSources) -> Option<Bitmap> {
    match &clip.kind {
        ClipKind::Video(_) => {
            let element = media.video_element(clip.id())?;
            if element.ready_state() < ReadyState::HaveEnoughData {
                return None;
            }
            element.frame()
        }
        ClipKind::Image => media.image(&clip.header.source_url),
        ClipKind::Audio(_) => None,
    }
}

fn mask_to_canvas(mask: ImageRef<'_>, canvas: Canvas) -> Affine {
    Affine::scale_non_uniform(
        f64::from(canvas.width) / f64::from(mask.width.max(1)),
        f64::from(canvas.height) / f64::from(mask.height.max(1)),
    )
}

/// Composite the scene at `input.time` into `target`.
///
/// Returns `true` when every visible clip had its media ready; `false` means the frame is
/// incomplete and should not be cached.
#[tracing::instrument(skip_all, fields(time = input.time))]
pub fn render(target: &mut dyn RenderTarget, input: &CompositeInput<'_>) -> bool {
    let scale = render_scale(input.render_rect, input.canvas);
    let project_to_target =
        Affine::translate(input.render_rect.origin().to_vec2()) * Affine::scale(scale);

    target.clear();
    target.set_composite_mode(CompositeMode::Normal);
    target.set_clip_rect(Some(input.render_rect));

    let mut all_ready = true;
    for track in input.scene.tracks().iter().rev() {
        if !track.visible {
            continue;
        }
        let Some(clip) = input.scene.clip_at(&track.id, input.time) else {
            continue;
        };
        if !clip.header.visible || clip.is_audio_only() {
            continue;
        }
        let Some(source) = resolve_source(clip, input.media) else {
            tracing::trace!(clip = %clip.id(), "media not ready");
            all_ready = false;
            continue;
        };

        let placement = clip
            .transform_at(input.time, (source.width(), source.height()))
            .to_affine();
        let opacity = clip.opacity_unit();

        let mask = match input.scene.mask_at(&track.id, input.time) {
            Some(MaskSource::Persisted(bmp)) => Some(bmp.as_image()),
            Some(MaskSource::Live) => input.live_mask.map(Surface::as_image),
            None => None,
        };

        match mask {
            None => target.draw_image(source.as_image(), project_to_target * placement, opacity),
            Some(mask) => {
                let mut offscreen = match Surface::new(input.canvas.width, input.canvas.height) {
                    Ok(s) => s,
                    Err(err) => {
                        tracing::warn!(clip = %clip.id(), error = %err, "mask buffer allocation failed");
                        all_ready = false;
                        continue;
                    }
                };
                offscreen.draw_image(source.as_image(), placement, 1.0);
                offscreen.set_composite_mode(CompositeMode::DestinationIn);
                offscreen.draw_image(mask, mask_to_canvas(mask, input.canvas), 1.0);
                target.draw_image(offscreen.as_image(), project_to_target, opacity);
            }
        }
    }

    target.set_clip_rect(None);
    all_ready
}

/// Target size for rendering `canvas` at `scale`, never below 1×1.
pub fn scaled_size(canvas: Canvas, scale: f64) -> (u32, u32) {
    let w = (f64::from(canvas.width) * scale).round().max(1.0) as u32;
    let h = (f64::from(canvas.height) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Composite into a fresh surface covering `input.render_rect` and freeze the result.
///
/// Returns the bitmap and whether every clip was ready.
pub fn render_bitmap(input: &CompositeInput<'_>) -> EditorResult<(Bitmap, bool)> {
    let w = input.render_rect.x1.ceil().max(0.0) as u32;
    let h = input.render_rect.y1.ceil().max(0.0) as u32;
    let mut surface = Surface::new(w, h)?;
    let ready = render(&mut surface, input);
    Ok((surface.snapshot()?, ready))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
