//! Bitmap-backed media used by the CLI and by tests.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::{
    foundation::error::{EditorError, EditorResult},
    foundation::math::premultiply_rgba8_in_place,
    media::element::{ImageDecoder, MediaElement, MediaFactory, ReadyState, lock},
    render::surface::Bitmap,
    timeline::model::Clip,
};

/// Decode encoded image bytes (PNG, JPEG, ...) into a premultiplied bitmap.
pub fn decode_image_bytes(bytes: &[u8]) -> EditorResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Bitmap::from_premul_rgba8(width, height, rgba8_premul)
}

fn resolve_source(root: &Path, source_url: &str) -> PathBuf {
    let raw = source_url.strip_prefix("file://").unwrap_or(source_url);
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn decode_file(path: &Path) -> EditorResult<Bitmap> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image_bytes(&bytes)
        .map_err(|e| EditorError::media(format!("decode '{}': {e}", path.display())))
}

/// Decodes images from the local filesystem, relative to a project root.
#[derive(Clone, Debug)]
pub struct FsImageDecoder {
    root: PathBuf,
}

impl FsImageDecoder {
    /// Resolve relative `source_url`s against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageDecoder for FsImageDecoder {
    fn decode(&self, source_url: &str) -> BoxFuture<'static, EditorResult<Bitmap>> {
        let path = resolve_source(&self.root, source_url);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || decode_file(&path))
                .await
                .map_err(|e| EditorError::Other(anyhow::Error::new(e)))?
        })
    }
}

struct StillState {
    current_time: f64,
    ready: ReadyState,
    paused: bool,
    muted: bool,
    volume: f64,
    seeks: u64,
}

/// A [`MediaElement`] that presents one fixed frame.
///
/// Seeks complete after a configurable latency.
pub struct StillElement {
    frame: Option<Bitmap>,
    size: (u32, u32),
    duration: Option<f64>,
    seek_latency: Option<Duration>,
    state: Mutex<StillState>,
    seeked_tx: Arc<watch::Sender<u64>>,
}

impl std::fmt::Debug for StillElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillElement")
            .field("size", &self.size)
            .field("seek_latency", &self.seek_latency)
            .finish_non_exhaustive()
    }
}

impl StillElement {
    /// Element presenting `frame`, fully buffered, with instant seeks.
    pub fn new(frame: Bitmap) -> Self {
        let size = (frame.width(), frame.height());
        Self::build(Some(frame), size)
    }

    /// Audio-only element with no picture.
    pub fn silent() -> Self {
        Self::build(None, (0, 0))
    }

    fn build(frame: Option<Bitmap>, size: (u32, u32)) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            frame,
            size,
            duration: None,
            seek_latency: Some(Duration::ZERO),
            state: Mutex::new(StillState {
                current_time: 0.0,
                ready: ReadyState::HaveEnoughData,
                paused: true,
                muted: false,
                volume: 1.0,
                seeks: 0,
            }),
            seeked_tx: Arc::new(tx),
        }
    }

    /// Seek completion delay; `None` means seeks never complete.
    pub fn with_seek_latency(mut self, latency: Option<Duration>) -> Self {
        self.seek_latency = latency;
        self
    }

    /// Native media length.
    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    /// Override readiness.
    pub fn with_ready_state(self, ready: ReadyState) -> Self {
        self.set_ready_state(ready);
        self
    }

    /// Change readiness at runtime.
    pub fn set_ready_state(&self, ready: ReadyState) {
        lock(&self.state).ready = ready;
    }

    /// Number of seeks issued so far.
    pub fn seek_count(&self) -> u64 {
        lock(&self.state).seeks
    }

    fn complete_seek(tx: &watch::Sender<u64>) {
        tx.send_modify(|n| *n += 1);
    }
}

impl MediaElement for StillElement {
    fn ready_state(&self) -> ReadyState {
        lock(&self.state).ready
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn set_current_time(&self, t: f64) {
        {
            let mut st = lock(&self.state);
            st.current_time = t;
            st.seeks += 1;
        }
        match self.seek_latency {
            None => {}
            Some(d) if d.is_zero() => Self::complete_seek(&self.seeked_tx),
            Some(d) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let tx = Arc::clone(&self.seeked_tx);
                    handle.spawn(async move {
                        tokio::time::sleep(d).await;
                        Self::complete_seek(&tx);
                    });
                }
                Err(_) => Self::complete_seek(&self.seeked_tx),
            },
        }
    }

    fn seeked(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.seeked_tx.subscribe();
        Box::pin(async move {
            let _ = rx.changed().await;
        })
    }

    fn frame(&self) -> Option<Bitmap> {
        if self.ready_state() < ReadyState::HaveCurrentData {
            return None;
        }
        self.frame.clone()
    }

    fn natural_size(&self) -> (u32, u32) {
        self.size
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn play(&self) {
        lock(&self.state).paused = false;
    }

    fn pause(&self) {
        lock(&self.state).paused = true;
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn set_muted(&self, muted: bool) {
        lock(&self.state).muted = muted;
    }

    fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn set_volume(&self, volume: f64) {
        lock(&self.state).volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        lock(&self.state).volume
    }
}

/// Builds [`StillElement`]s by decoding each clip's `source_url` as an image file.
#[derive(Clone, Debug)]
pub struct StillFactory {
    root: PathBuf,
}

impl StillFactory {
    /// Resolve relative `source_url`s against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaFactory for StillFactory {
    fn create(&self, clip: &Clip) -> EditorResult<Arc<dyn MediaElement>> {
        let source_duration = clip.kind.media().and_then(|m| m.source_duration);
        if clip.is_audio_only() {
            return Ok(Arc::new(StillElement::silent().with_duration(source_duration)));
        }
        let path = resolve_source(&self.root, &clip.header.source_url);
        let frame = decode_file(&path)?;
        Ok(Arc::new(
            StillElement::new(frame).with_duration(source_duration),
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/still.rs"]
mod tests;
