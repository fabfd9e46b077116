use xxhash_rust::xxh3::Xxh3;

use crate::{
    animation::anim::{InterpMode, Keyframes},
    animation::ease::Ease,
    foundation::core::{Canvas, Vec2},
    timeline::{
        edit::Timeline,
        model::{Clip, ClipKind, Mask, MediaProps, Track, TrackKind},
    },
};

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Stable digest of everything that affects composited pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimelineFingerprint {
    /// High 64 bits.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

/// Fingerprint tracks, clips, mask content and canvas size.
///
/// View state and the live (unflushed) mask surface are not hashed.
pub fn fingerprint_timeline(timeline: &Timeline, canvas: Canvas) -> TimelineFingerprint {
    let mut h = StableHasher::new();
    h.write_u32(canvas.width);
    h.write_u32(canvas.height);

    h.write_u64(timeline.tracks().len() as u64);
    for track in timeline.tracks() {
        write_track(&mut h, track);
    }

    h.write_u64(timeline.clips().len() as u64);
    for clip in timeline.clips() {
        write_clip(&mut h, clip);
    }

    h.write_u64(timeline.masks().len() as u64);
    for mask in timeline.masks() {
        write_mask(&mut h, mask);
    }
    h.finish()
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn write_vec2(&mut self, v: Vec2) {
        self.write_f64(v.x);
        self.write_f64(v.y);
    }

    fn finish(self) -> TimelineFingerprint {
        let v = self.inner.digest128();
        TimelineFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

fn write_track(h: &mut StableHasher, track: &Track) {
    h.write_str(track.id.as_str());
    h.write_u8(match track.kind {
        TrackKind::Video => 0,
        TrackKind::Audio => 1,
    });
    h.write_bool(track.visible);
    h.write_bool(track.locked);
    h.write_bool(track.muted);
}

fn write_media(h: &mut StableHasher, m: &MediaProps) {
    h.write_f64(m.volume);
    h.write_bool(m.muted);
    match m.source_duration {
        Some(d) => {
            h.write_u8(1);
            h.write_f64(d);
        }
        None => h.write_u8(0),
    }
}

fn write_keys(h: &mut StableHasher, keys: &Keyframes<Vec2>) {
    h.write_u8(match keys.mode {
        InterpMode::Hold => 0,
        InterpMode::Linear => 1,
    });
    h.write_u64(keys.keys.len() as u64);
    for k in &keys.keys {
        h.write_f64(k.time);
        h.write_vec2(k.value);
        h.write_u8(match k.ease {
            Ease::Linear => 0,
            Ease::InQuad => 1,
            Ease::OutQuad => 2,
            Ease::InOutQuad => 3,
            Ease::InOutCubic => 4,
        });
    }
}

fn write_clip(h: &mut StableHasher, clip: &Clip) {
    let c = &clip.header;
    h.write_str(c.id.as_str());
    h.write_str(c.track_id.as_str());
    h.write_f64(c.start_time);
    h.write_f64(c.duration);
    h.write_f64(c.trim_in);
    h.write_f64(c.trim_out);
    h.write_vec2(c.position);
    write_keys(h, &c.position_keys);
    h.write_f64(c.scale);
    h.write_f64(c.rotation);
    h.write_f64(c.opacity);
    h.write_bool(c.visible);
    h.write_bool(c.locked);
    h.write_str(&c.source_url);
    match &clip.kind {
        ClipKind::Video(m) => {
            h.write_u8(0);
            write_media(h, m);
        }
        ClipKind::Audio(m) => {
            h.write_u8(1);
            write_media(h, m);
        }
        ClipKind::Image => h.write_u8(2),
    }
}

fn write_mask(h: &mut StableHasher, mask: &Mask) {
    h.write_str(mask.id.as_str());
    h.write_str(mask.track_id.as_str());
    h.write_f64(mask.start_time);
    h.write_f64(mask.duration);
    h.write_u32(mask.size.width);
    h.write_u32(mask.size.height);
    match &mask.mask_data {
        Some(bmp) => {
            h.write_u8(1);
            h.write_u32(bmp.width());
            h.write_u32(bmp.height());
            h.write_bytes(bmp.data());
        }
        None => h.write_u8(0),
    }
}
