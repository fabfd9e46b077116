use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;

use super::*;
use crate::{
    media::still::StillElement,
    timeline::{
        edit::{ClipPatch, TrackFlags},
        model::{MediaProps, TrackKind},
    },
};

struct Factory {
    latency: Option<Duration>,
}

impl MediaFactory for Factory {
    fn create(&self, _clip: &Clip) -> EditorResult<Arc<dyn MediaElement>> {
        let frame = Bitmap::solid(4, 4, [0, 255, 0, 255])?;
        Ok(Arc::new(
            StillElement::new(frame).with_seek_latency(self.latency),
        ))
    }
}

#[derive(Default)]
struct Decoder {
    calls: AtomicUsize,
}

impl ImageDecoder for Decoder {
    fn decode(&self, source_url: &str) -> BoxFuture<'static, EditorResult<Bitmap>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let missing = source_url.starts_with("missing");
        Box::pin(async move {
            if missing {
                return Err(EditorError::media("not found"));
            }
            Bitmap::solid(2, 2, [255, 0, 0, 255])
        })
    }
}

fn pool(latency: Option<Duration>) -> (MediaPool, Arc<Decoder>) {
    let decoder = Arc::new(Decoder::default());
    let pool = MediaPool::new(
        Arc::new(Factory { latency }),
        decoder.clone(),
        MediaPoolOpts {
            seek_timeout: Duration::from_millis(100),
            ..MediaPoolOpts::default()
        },
    );
    (pool, decoder)
}

fn video() -> ClipKind {
    ClipKind::Video(MediaProps::default())
}

#[test]
fn sync_with_attaches_and_releases() {
    let (pool, _) = pool(Some(Duration::ZERO));
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 0.0, 2.0).unwrap();
    let img = tl.add_clip(ClipKind::Image, &track, "a.png", 3.0, 1.0).unwrap();

    pool.sync_with(&tl);
    assert!(pool.element(&v).is_some());
    assert!(pool.element(&img).is_none());

    assert!(tl.remove_clip(&v));
    pool.sync_with(&tl);
    assert!(pool.element(&v).is_none());
    assert!(!pool.detach(&v));
}

struct ShadeBySource;

impl MediaFactory for ShadeBySource {
    fn create(&self, clip: &Clip) -> EditorResult<Arc<dyn MediaElement>> {
        let shade = if clip.header.source_url == "b.mp4" { 200 } else { 10 };
        Ok(Arc::new(StillElement::new(Bitmap::solid(
            2,
            2,
            [shade, 0, 0, 255],
        )?)))
    }
}

#[test]
fn source_change_replaces_element() {
    let pool = MediaPool::new(
        Arc::new(ShadeBySource),
        Arc::new(Decoder::default()),
        MediaPoolOpts::default(),
    );
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "a.mp4", 0.0, 2.0).unwrap();
    pool.sync_with(&tl);
    let before = pool.element(&v).unwrap();
    assert_eq!(&before.frame().unwrap().data()[..4], &[10, 0, 0, 255]);

    assert!(tl.update_clip(
        &v,
        ClipPatch {
            source_url: Some("b.mp4".to_string()),
            ..ClipPatch::default()
        }
    ));
    pool.sync_with(&tl);
    let after = pool.element(&v).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(&after.frame().unwrap().data()[..4], &[200, 0, 0, 255]);

    pool.sync_with(&tl);
    assert!(Arc::ptr_eq(&after, &pool.element(&v).unwrap()));
}

#[tokio::test]
async fn images_decode_once_per_source() {
    let (pool, decoder) = pool(None);
    pool.ensure_image("a.png").await.unwrap();
    pool.ensure_image("a.png").await.unwrap();
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    assert!(pool.image("a.png").is_some());
    assert!(pool.ensure_image("missing.png").await.is_err());
    assert!(pool.image("missing.png").is_none());
}

#[tokio::test]
async fn is_ready_checks_level_and_decode() {
    let (pool, _) = pool(Some(Duration::ZERO));
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 0.0, 2.0).unwrap();
    let i = tl.add_clip(ClipKind::Image, &track, "a.png", 3.0, 1.0).unwrap();

    let vc = tl.clip(&v).unwrap().clone();
    let ic = tl.clip(&i).unwrap().clone();
    assert!(!pool.is_ready(&vc, ReadyState::HaveMetadata));
    pool.attach(&vc).unwrap();
    assert!(pool.is_ready(&vc, ReadyState::HaveEnoughData));

    assert!(!pool.is_ready(&ic, ReadyState::HaveEnoughData));
    pool.ensure_image("a.png").await.unwrap();
    assert!(pool.is_ready(&ic, ReadyState::HaveEnoughData));
}

#[tokio::test]
async fn seek_within_epsilon_is_noop() {
    let (pool, _) = pool(None);
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 0.0, 2.0).unwrap();
    pool.sync_with(&tl);

    pool.seek(&v, 0.005).await.unwrap();
    assert_eq!(pool.element(&v).unwrap().current_time(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn stalled_seek_times_out_softly() {
    let (pool, _) = pool(None);
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 0.0, 2.0).unwrap();
    pool.sync_with(&tl);

    let err = pool.seek(&v, 1.0).await.unwrap_err();
    assert!(matches!(err, EditorError::SeekTimeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn seek_waits_for_completion() {
    let (pool, _) = pool(Some(Duration::from_millis(30)));
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 0.0, 2.0).unwrap();
    pool.sync_with(&tl);

    pool.seek(&v, 1.25).await.unwrap();
    assert_eq!(pool.element(&v).unwrap().current_time(), 1.25);
    assert!(pool.seek(&ClipId::from("nope"), 0.0).await.is_err());
}

#[test]
fn source_time_maps_through_trim() {
    let mut tl = Timeline::default();
    let track = tl.tracks()[0].id.clone();
    let v = tl.add_clip(video(), &track, "v.mp4", 2.0, 3.0).unwrap();
    tl.update_clip(
        &v,
        ClipPatch {
            trim_in: Some(5.0),
            ..ClipPatch::default()
        },
    );
    assert_eq!(source_time_for(tl.clip(&v).unwrap(), 3.0), 6.0);
}

#[test]
fn sync_audio_plays_only_audible_clips() {
    let (pool, _) = pool(Some(Duration::ZERO));
    let mut tl = Timeline::default();
    let audio_track = tl.add_track(TrackKind::Audio, "A");
    let muted_track = tl.add_track(TrackKind::Audio, "B");
    let a = tl
        .add_clip(ClipKind::Audio(MediaProps::default()), &audio_track, "a.wav", 0.0, 5.0)
        .unwrap();
    let quiet = tl
        .add_clip(
            ClipKind::Audio(MediaProps {
                volume: 0.0,
                ..MediaProps::default()
            }),
            &audio_track,
            "q.wav",
            5.0,
            5.0,
        )
        .unwrap();
    let b = tl
        .add_clip(ClipKind::Audio(MediaProps::default()), &muted_track, "b.wav", 0.0, 5.0)
        .unwrap();
    tl.set_track_flags(
        &muted_track,
        TrackFlags {
            muted: Some(true),
            ..TrackFlags::default()
        },
    );
    pool.sync_with(&tl);

    assert_eq!(pool.sync_audio(&tl, 2.0, true), 1);
    let ea = pool.element(&a).unwrap();
    assert!(!ea.is_paused());
    assert!(!ea.is_muted());
    assert!((ea.current_time() - 2.0).abs() < 1e-9);
    assert!(pool.element(&b).unwrap().is_muted());
    assert!(pool.element(&b).unwrap().is_paused());

    assert_eq!(pool.sync_audio(&tl, 6.0, true), 0);
    assert!(ea.is_paused());
    assert!(pool.element(&quiet).unwrap().is_paused());

    pool.sync_audio(&tl, 2.0, true);
    assert_eq!(pool.sync_audio(&tl, 2.0, false), 0);
    assert!(ea.is_paused());
}

#[test]
fn drift_below_threshold_does_not_reseek() {
    let (pool, _) = pool(Some(Duration::ZERO));
    let mut tl = Timeline::default();
    let track = tl.add_track(TrackKind::Audio, "A");
    let a = tl
        .add_clip(ClipKind::Audio(MediaProps::default()), &track, "a.wav", 0.0, 5.0)
        .unwrap();
    pool.sync_with(&tl);
    pool.sync_audio(&tl, 1.0, true);
    let el = pool.element(&a).unwrap();
    assert!((el.current_time() - 1.0).abs() < 1e-9);
    pool.sync_audio(&tl, 1.2, true);
    assert!((el.current_time() - 1.0).abs() < 1e-9);
    pool.sync_audio(&tl, 1.5, true);
    assert!((el.current_time() - 1.5).abs() < 1e-9);
}

#[test]
fn ticker_gates_to_interval() {
    let mut ticker = AudioSyncTicker::new(Duration::from_millis(250));
    let t0 = Instant::now();
    assert!(ticker.should_run(t0));
    assert!(!ticker.should_run(t0 + Duration::from_millis(100)));
    assert!(ticker.should_run(t0 + Duration::from_millis(250)));
    assert!(!ticker.should_run(t0 + Duration::from_millis(300)));
    ticker.reset();
    assert!(ticker.should_run(t0 + Duration::from_millis(301)));
}

#[tokio::test(start_paused = true)]
async fn prepare_at_seeks_videos_and_decodes_images() {
    let (pool, decoder) = pool(Some(Duration::from_millis(10)));
    let mut tl = Timeline::default();
    let bottom = tl.tracks()[0].id.clone();
    let top = tl.add_track(TrackKind::Video, "V2");
    let v = tl.add_clip(video(), &bottom, "v.mp4", 1.0, 4.0).unwrap();
    tl.add_clip(ClipKind::Image, &top, "a.png", 0.0, 5.0).unwrap();
    pool.sync_with(&tl);

    assert!(pool.prepare_at(&tl, 3.0).await);
    assert!((pool.element(&v).unwrap().current_time() - 2.0).abs() < 1e-9);
    assert!(pool.image("a.png").is_some());
    assert!(pool.prepare_at(&tl, 3.5).await);
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn prepare_at_reports_failures() {
    let (pool, _) = pool(None);
    let mut tl = Timeline::default();
    let bottom = tl.tracks()[0].id.clone();
    let top = tl.add_track(TrackKind::Video, "V2");
    tl.add_clip(video(), &bottom, "v.mp4", 0.0, 4.0).unwrap();
    tl.add_clip(ClipKind::Image, &top, "missing.png", 0.0, 5.0)
        .unwrap();
    pool.sync_with(&tl);

    // Seek to 0 is a no-op, so only the image fails.
    assert!(!pool.prepare_at(&tl, 0.0).await);

    let hidden = TrackFlags {
        visible: Some(false),
        ..TrackFlags::default()
    };
    assert!(tl.set_track_flags(&top, hidden));
    assert!(pool.prepare_at(&tl, 0.0).await);
    // Stalled seek.
    assert!(!pool.prepare_at(&tl, 2.0).await);
}
