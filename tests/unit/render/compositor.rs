use std::collections::HashMap;

use super::*;
use crate::{
    foundation::core::{Point, Vec2},
    media::still::StillElement,
    render::composite::PremulRgba8,
    timeline::{
        edit::{ClipPatch, TrackFlags},
        mask::BrushDab,
        model::{MediaProps, TrackKind},
    },
};

const RED: PremulRgba8 = [255, 0, 0, 255];
const BLUE: PremulRgba8 = [0, 0, 255, 255];
const CLEAR: PremulRgba8 = [0, 0, 0, 0];
const CANVAS: Canvas = Canvas {
    width: 8,
    height: 8,
};

#[derive(Default)]
struct Sources {
    images: HashMap<String, Bitmap>,
    videos: HashMap<ClipId, Arc<dyn MediaElement>>,
}

impl MediaSources for Sources {
    fn video_element(&self, clip: &ClipId) -> Option<Arc<dyn MediaElement>> {
        self.videos.get(clip).cloned()
    }

    fn image(&self, source_url: &str) -> Option<Bitmap> {
        self.images.get(source_url).cloned()
    }
}

fn sources() -> Sources {
    let mut s = Sources::default();
    s.images
        .insert("red".into(), Bitmap::solid(8, 8, RED).unwrap());
    s.images
        .insert("blue".into(), Bitmap::solid(8, 8, BLUE).unwrap());
    s.images
        .insert("small".into(), Bitmap::solid(2, 2, BLUE).unwrap());
    s
}

fn frame(tl: &Timeline, media: &Sources, time: f64) -> (Surface, bool) {
    frame_into(tl, media, time, CANVAS.rect())
}

fn frame_into(tl: &Timeline, media: &Sources, time: f64, rect: Rect) -> (Surface, bool) {
    let mut target = Surface::new(rect.width() as u32, rect.height() as u32).unwrap();
    let ready = render(
        &mut target,
        &CompositeInput {
            time,
            scene: tl,
            media,
            live_mask: tl.live_mask(),
            canvas: CANVAS,
            render_rect: rect,
        },
    );
    (target, ready)
}

/// Track A (bottom) holds red `[0,5)`, track B (top) holds blue `[2,8)`.
fn two_tracks() -> (Timeline, TrackId, TrackId) {
    let mut tl = Timeline::default();
    let a = tl.tracks()[0].id.clone();
    let b = tl.add_track(TrackKind::Video, "B");
    assert!(tl.move_track(&b, 0));
    tl.add_clip(ClipKind::Image, &a, "red", 0.0, 5.0).unwrap();
    tl.add_clip(ClipKind::Image, &b, "blue", 2.0, 6.0).unwrap();
    (tl, a, b)
}

#[test]
fn topmost_track_occludes_lower_tracks() {
    let (tl, _, _) = two_tracks();
    let media = sources();

    let (s, ready) = frame(&tl, &media, 1.0);
    assert!(ready);
    assert_eq!(s.pixel(4, 4), Some(RED));

    for t in [3.0, 6.0] {
        let (s, ready) = frame(&tl, &media, t);
        assert!(ready);
        assert!(s.data().chunks_exact(4).all(|px| px == BLUE), "t={t}");
    }

    let (s, ready) = frame(&tl, &media, 9.0);
    assert!(ready);
    assert!(s.data().iter().all(|b| *b == 0));
}

#[test]
fn reordering_tracks_flips_occlusion() {
    let (mut tl, a, _) = two_tracks();
    tl.move_track(&a, 0);
    let (s, _) = frame(&tl, &sources(), 3.0);
    assert_eq!(s.pixel(0, 0), Some(RED));
}

#[test]
fn hidden_tracks_and_clips_are_skipped() {
    let (mut tl, a, b) = two_tracks();
    tl.set_track_flags(
        &b,
        TrackFlags {
            visible: Some(false),
            ..TrackFlags::default()
        },
    );
    let media = sources();
    let (s, _) = frame(&tl, &media, 3.0);
    assert_eq!(s.pixel(0, 0), Some(RED));

    let red = tl.clip_at(&a, 3.0).unwrap().id().clone();
    tl.update_clip(
        &red,
        ClipPatch {
            visible: Some(false),
            ..ClipPatch::default()
        },
    );
    let (s, ready) = frame(&tl, &media, 3.0);
    assert!(ready);
    assert_eq!(s.pixel(0, 0), Some(CLEAR));
}

#[test]
fn missing_media_marks_frame_not_ready() {
    let (tl, _, _) = two_tracks();
    let mut media = sources();
    media.images.remove("blue");
    let (s, ready) = frame(&tl, &media, 3.0);
    assert!(!ready);
    assert_eq!(s.pixel(0, 0), Some(RED));
}

#[test]
fn video_needs_enough_data() {
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl
        .add_clip(ClipKind::Video(MediaProps::default()), &track, "v.mp4", 0.0, 2.0)
        .unwrap();
    let element = Arc::new(
        StillElement::new(Bitmap::solid(8, 8, RED).unwrap())
            .with_ready_state(ReadyState::HaveCurrentData),
    );
    let mut media = sources();
    media.videos.insert(v, element.clone());

    let (s, ready) = frame(&tl, &media, 1.0);
    assert!(!ready);
    assert_eq!(s.pixel(0, 0), Some(CLEAR));

    element.set_ready_state(ReadyState::HaveEnoughData);
    let (s, ready) = frame(&tl, &media, 1.0);
    assert!(ready);
    assert_eq!(s.pixel(0, 0), Some(RED));
}

#[test]
fn audio_clips_never_draw() {
    let mut tl = Timeline::default();
    let track = tl.add_track(TrackKind::Audio, "A");
    tl.add_clip(ClipKind::Audio(MediaProps::default()), &track, "a.wav", 0.0, 2.0)
        .unwrap();
    let (s, ready) = frame(&tl, &sources(), 1.0);
    assert!(ready);
    assert!(s.data().iter().all(|b| *b == 0));
}

#[test]
fn position_and_scale_pivot_on_media_center() {
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let id = tl.add_clip(ClipKind::Image, &track, "small", 0.0, 2.0).unwrap();
    tl.update_clip(
        &id,
        ClipPatch {
            position: Some(Vec2::new(3.0, 3.0)),
            ..ClipPatch::default()
        },
    );
    let media = sources();
    let (s, _) = frame(&tl, &media, 0.5);
    assert_eq!(s.pixel(3, 3), Some(BLUE));
    assert_eq!(s.pixel(4, 4), Some(BLUE));
    assert_eq!(s.pixel(2, 2), Some(CLEAR));

    tl.update_clip(
        &id,
        ClipPatch {
            scale: Some(2.0),
            ..ClipPatch::default()
        },
    );
    let (s, _) = frame(&tl, &media, 0.5);
    assert_eq!(s.pixel(2, 2), Some(BLUE));
    assert_eq!(s.pixel(5, 5), Some(BLUE));
    assert_eq!(s.pixel(1, 1), Some(CLEAR));
    assert_eq!(s.pixel(6, 6), Some(CLEAR));
}

#[test]
fn render_rect_scales_uniformly() {
    let (tl, _, _) = two_tracks();
    let (s, ready) = frame_into(&tl, &sources(), 1.0, Rect::new(0.0, 0.0, 4.0, 4.0));
    assert!(ready);
    assert_eq!((s.width(), s.height()), (4, 4));
    assert!(s.data().chunks_exact(4).all(|px| px == RED));
}

#[test]
fn opacity_blends_over_lower_track() {
    let (mut tl, _, b) = two_tracks();
    let blue = tl.clip_at(&b, 3.0).unwrap().id().clone();
    tl.update_clip(
        &blue,
        ClipPatch {
            opacity: Some(50.0),
            ..ClipPatch::default()
        },
    );
    let (s, _) = frame(&tl, &sources(), 3.0);
    let px = s.pixel(0, 0).unwrap();
    assert_eq!(px[3], 255);
    assert!(px[0] > 100 && px[0] < 140);
    assert!(px[2] > 100 && px[2] < 140);
}

#[test]
fn persisted_mask_applies_only_inside_its_range() {
    let mut tl = Timeline::default();
    let a = tl.tracks()[0].id.clone();
    tl.add_clip(ClipKind::Image, &a, "red", 0.0, 5.0).unwrap();
    let mask = tl.add_mask(&a, 1.0, 4.0, CANVAS).unwrap();
    tl.begin_mask_edit(&mask);
    for y in 0..8 {
        tl.paint_mask(BrushDab {
            center: Point::new(1.5, f64::from(y) + 0.5),
            radius: 1.0,
            erase: false,
        });
    }
    tl.end_mask_edit();
    let media = sources();

    let (s, ready) = frame(&tl, &media, 0.5);
    assert!(ready);
    assert!(s.data().chunks_exact(4).all(|px| px == RED));

    let (s, ready) = frame(&tl, &media, 2.0);
    assert!(ready);
    assert_eq!(s.pixel(1, 4), Some(RED));
    assert_eq!(s.pixel(6, 4), Some(CLEAR));
}

#[test]
fn live_mask_is_read_while_painting() {
    let mut tl = Timeline::default();
    let a = tl.tracks()[0].id.clone();
    tl.add_clip(ClipKind::Image, &a, "red", 0.0, 5.0).unwrap();
    let mask = tl.add_mask(&a, 0.0, 5.0, CANVAS).unwrap();
    tl.begin_mask_edit(&mask);
    tl.paint_mask(BrushDab {
        center: Point::new(4.0, 4.0),
        radius: 1.0,
        erase: false,
    });

    let (s, _) = frame(&tl, &sources(), 1.0);
    assert_eq!(s.pixel(3, 3), Some(RED));
    assert_eq!(s.pixel(0, 0), Some(CLEAR));
    assert!(tl.masks()[0].mask_data.is_none());
}

#[test]
fn identical_inputs_render_identical_bytes() {
    let (tl, _, _) = two_tracks();
    let media = sources();
    let (a, _) = frame(&tl, &media, 3.0);
    let (b, _) = frame(&tl, &media, 3.0);
    assert_eq!(a.data(), b.data());
}
