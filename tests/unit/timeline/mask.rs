use super::*;
use crate::timeline::model::TrackKind;

fn setup() -> (Timeline, TrackId, MaskId) {
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let mask = tl
        .add_mask(&track, 1.0, 4.0, Canvas { width: 8, height: 8 })
        .unwrap();
    (tl, track, mask)
}

#[test]
fn unpainted_mask_yields_nothing() {
    let (tl, track, _) = setup();
    assert!(tl.mask_at(&track, 2.0).is_none());
}

#[test]
fn masks_on_one_track_are_disjoint() {
    let (mut tl, track, mask) = setup();
    assert!(tl.add_mask(&track, 4.0, 2.0, Canvas { width: 8, height: 8 }).is_none());
    assert!(tl.add_mask(&track, 5.0, 2.0, Canvas { width: 8, height: 8 }).is_some());
    assert!(!tl.set_mask_timing(&mask, 2.0, 4.0));
    assert!(tl.set_mask_timing(&mask, 0.0, 5.0));

    let other = tl.add_track(TrackKind::Video, "2");
    assert!(tl.add_mask(&other, 1.0, 4.0, Canvas { width: 8, height: 8 }).is_some());
}

#[test]
fn active_mask_reads_live_and_flushes_on_stroke_end() {
    let (mut tl, track, mask) = setup();
    assert!(tl.begin_mask_edit(&mask));
    assert!(matches!(tl.mask_at(&track, 2.0), Some(MaskSource::Live)));
    assert!(tl.mask_at(&track, 0.5).is_none());

    assert!(tl.paint_mask(BrushDab {
        center: Point::new(4.0, 4.0),
        radius: 2.0,
        erase: false,
    }));
    assert_eq!(tl.live_mask().and_then(|s| s.pixel(4, 4)), Some([255; 4]));
    assert!(tl.masks()[0].mask_data.is_none());

    assert!(tl.end_mask_stroke());
    let data = tl.masks()[0].mask_data.clone().unwrap();
    assert_eq!(data.pixel(4, 4), Some([255; 4]));
    assert_eq!(data.pixel(0, 0), Some([0; 4]));

    assert!(tl.end_mask_edit());
    assert!(tl.live_mask().is_none());
    assert!(matches!(
        tl.mask_at(&track, 2.0),
        Some(MaskSource::Persisted(b)) if b.pixel(4, 4) == Some([255; 4])
    ));
}

#[test]
fn reopening_a_mask_starts_from_persisted_pixels() {
    let (mut tl, _, mask) = setup();
    tl.begin_mask_edit(&mask);
    tl.paint_mask(BrushDab {
        center: Point::new(2.0, 2.0),
        radius: 1.0,
        erase: false,
    });
    tl.end_mask_edit();

    assert!(tl.begin_mask_edit(&mask));
    assert_eq!(tl.live_mask().and_then(|s| s.pixel(1, 1)), Some([255; 4]));
    tl.paint_mask(BrushDab {
        center: Point::new(2.0, 2.0),
        radius: 1.0,
        erase: true,
    });
    tl.end_mask_edit();
    assert_eq!(
        tl.masks()[0].mask_data.as_ref().and_then(|b| b.pixel(1, 1)),
        Some([0; 4])
    );
}

#[test]
fn painting_without_session_is_rejected() {
    let (mut tl, _, mask) = setup();
    assert!(!tl.paint_mask(BrushDab {
        center: Point::new(1.0, 1.0),
        radius: 1.0,
        erase: false,
    }));
    assert!(!tl.end_mask_stroke());
    assert!(!tl.end_mask_edit());
    assert!(tl.remove_mask(&mask));
    assert!(!tl.begin_mask_edit(&mask));
}

#[test]
fn switching_masks_flushes_the_previous_one() {
    let (mut tl, track, first) = setup();
    let second = tl
        .add_mask(&track, 6.0, 1.0, Canvas { width: 8, height: 8 })
        .unwrap();
    tl.begin_mask_edit(&first);
    tl.paint_mask(BrushDab {
        center: Point::new(4.0, 4.0),
        radius: 3.0,
        erase: false,
    });
    assert!(tl.begin_mask_edit(&second));
    assert_eq!(tl.active_mask_id(), Some(&second));
    assert!(tl.masks()[0].mask_data.is_some());
}
