use std::sync::{Arc, atomic::AtomicUsize};

use super::*;

fn bmp(v: u8) -> Bitmap {
    Bitmap::solid(1, 1, [v, v, v, 255]).unwrap()
}

fn cache() -> FrameCache {
    FrameCache::new(Fps::new(10, 1).unwrap())
}

#[test]
fn get_rounds_time_to_frame_index() {
    let c = cache();
    let g = c.generation();
    assert!(c.insert_if_current(g, 3, bmp(1)));
    assert!(c.get(0.3).is_some());
    assert!(c.get(0.26).is_some());
    assert!(c.get(0.34).is_some());
    assert!(c.get(0.36).is_none());
}

#[test]
fn entries_are_never_overwritten() {
    let c = cache();
    let g = c.generation();
    assert!(c.insert_if_current(g, 0, bmp(1)));
    assert!(!c.insert_if_current(g, 0, bmp(2)));
    assert_eq!(c.get_index(0), Some(bmp(1)));
}

#[test]
fn stale_generation_cannot_commit() {
    let c = cache();
    let old = c.generation();
    let new = c.bump_generation();
    assert_eq!(new, old + 1);
    assert!(!c.is_current(old));
    assert!(!c.insert_if_current(old, 0, bmp(1)));
    assert!(c.insert_if_current(new, 0, bmp(1)));
}

#[test]
fn invalidate_drops_everything_and_bumps_version() {
    let c = cache();
    let g = c.generation();
    c.insert_if_current(g, 0, bmp(1));
    c.insert_if_current(g, 1, bmp(1));
    let v = c.version();
    c.invalidate();
    assert!(c.is_empty());
    assert!(c.version() > v);
    assert!(c.is_current(g));
}

#[test]
fn ranges_group_contiguous_indices() {
    let c = cache();
    let g = c.generation();
    for i in [0, 1, 2, 5, 7, 8] {
        c.insert_if_current(g, i, bmp(0));
    }
    assert_eq!(c.cached_ranges(), vec![(0, 2), (5, 5), (7, 8)]);
    let secs = c.cached_time_ranges();
    assert_eq!(secs.len(), 3);
    assert!((secs[0].1 - 0.3).abs() < 1e-9);
}

#[test]
fn listeners_see_inserts_and_invalidation() {
    let c = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let id = c.subscribe(move |status| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert!(status.frames <= 1);
    });

    c.insert_if_current(c.generation(), 4, bmp(0));
    c.invalidate();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(c.unsubscribe(id));
    c.invalidate();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!c.unsubscribe(id));
}
