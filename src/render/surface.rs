use std::{fmt, sync::Arc};

use crate::{
    foundation::core::{Affine, Point, Rect},
    foundation::error::{EditorError, EditorResult},
    foundation::math::{mul_div255_u16, unit_to_u8, unpremultiply_rgba8_in_place},
    render::composite::{PremulRgba8, dest_in, over},
};

/// How `draw_image` combines source pixels with the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositeMode {
    /// Source-over.
    #[default]
    Normal,
    /// Keep the destination only where the source is opaque.
    DestinationIn,
}

/// Borrowed premultiplied RGBA8 pixels.
#[derive(Clone, Copy, Debug)]
pub struct ImageRef<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major premultiplied RGBA8, `width * height * 4` bytes.
    pub data: &'a [u8],
}

impl ImageRef<'_> {
    fn texel(&self, x: u32, y: u32) -> PremulRgba8 {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    fn sample_nearest(&self, p: Point) -> Option<PremulRgba8> {
        if !(p.x >= 0.0 && p.y >= 0.0) {
            return None;
        }
        let (x, y) = (p.x.floor(), p.y.floor());
        if x >= f64::from(self.width) || y >= f64::from(self.height) {
            return None;
        }
        Some(self.texel(x as u32, y as u32))
    }
}

/// 2D drawing surface the compositor paints into.
pub trait RenderTarget {
    /// Pixel size `(width, height)`.
    fn size(&self) -> (u32, u32);
    /// Reset every pixel to transparent.
    fn clear(&mut self);
    /// Restrict subsequent draws to `rect` (target pixels); `None` lifts the restriction.
    fn set_clip_rect(&mut self, rect: Option<Rect>);
    /// Select the blend used by subsequent draws.
    fn set_composite_mode(&mut self, mode: CompositeMode);
    /// Draw `image` mapped by `transform` (image pixels to target pixels) at `opacity`.
    fn draw_image(&mut self, image: ImageRef<'_>, transform: Affine, opacity: f32);
}

/// Immutable premultiplied RGBA8 image. Cheap to clone.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "BitmapRepr", try_from = "BitmapRepr")]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BitmapRepr {
    width: u32,
    height: u32,
    rgba8_premul: Vec<u8>,
}

impl From<Bitmap> for BitmapRepr {
    fn from(b: Bitmap) -> Self {
        Self {
            width: b.width,
            height: b.height,
            rgba8_premul: b.data.to_vec(),
        }
    }
}

impl TryFrom<BitmapRepr> for Bitmap {
    type Error = EditorError;

    fn try_from(r: BitmapRepr) -> Result<Self, Self::Error> {
        Bitmap::from_premul_rgba8(r.width, r.height, r.rgba8_premul)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn byte_len(width: u32, height: u32) -> EditorResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| EditorError::resource("surface size overflow"))
}

impl Bitmap {
    /// Wrap premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, data: Vec<u8>) -> EditorResult<Self> {
        if data.len() != byte_len(width, height)? {
            return Err(EditorError::resource(format!(
                "bitmap {width}x{height} expects {} bytes, got {}",
                byte_len(width, height)?,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    /// A bitmap filled with one premultiplied color.
    pub fn solid(width: u32, height: u32, color: PremulRgba8) -> EditorResult<Self> {
        let len = byte_len(width, height)?;
        let data: Vec<u8> = color.iter().copied().cycle().take(len).collect();
        Self::from_premul_rgba8(width, height, data)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw premultiplied bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Borrow as a drawable image.
    pub fn as_image(&self) -> ImageRef<'_> {
        ImageRef {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Pixel at `(x, y)`, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        (x < self.width && y < self.height).then(|| self.as_image().texel(x, y))
    }

    /// Straight-alpha copy suitable for PNG export.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.to_vec();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }
}

/// Mutable CPU render target with nearest-neighbour sampling.
#[derive(Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
    clip: Option<Rect>,
    mode: CompositeMode,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// Allocate a transparent surface. Zero-sized surfaces are allowed but cannot be snapshotted.
    pub fn new(width: u32, height: u32) -> EditorResult<Self> {
        Ok(Self {
            width,
            height,
            data: vec![0; byte_len(width, height)?],
            clip: None,
            mode: CompositeMode::Normal,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` when the surface has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw premultiplied bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Borrow as a drawable image.
    pub fn as_image(&self) -> ImageRef<'_> {
        ImageRef {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Pixel at `(x, y)`, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        (x < self.width && y < self.height).then(|| self.as_image().texel(x, y))
    }

    /// Freeze the current pixels into an immutable [`Bitmap`].
    pub fn snapshot(&self) -> EditorResult<Bitmap> {
        if self.is_empty() {
            return Err(EditorError::resource(format!(
                "cannot snapshot empty surface {}x{}",
                self.width, self.height
            )));
        }
        Bitmap::from_premul_rgba8(self.width, self.height, self.data.clone())
    }

    /// Overwrite every pixel within `radius` of `center` with `color` (no blending).
    pub fn fill_circle(&mut self, center: Point, radius: f64, color: PremulRgba8) {
        if radius <= 0.0 || self.is_empty() {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.pixel_span(Rect::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )) else {
            return;
        };
        let r2 = radius * radius;
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = f64::from(x) + 0.5 - center.x;
                let dy = f64::from(y) + 0.5 - center.y;
                if dx * dx + dy * dy <= r2 {
                    let idx = self.index(x, y);
                    self.data[idx..idx + 4].copy_from_slice(&color);
                }
            }
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Integer pixel bounds of `rect` clamped to the surface and the current clip.
    fn pixel_span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let mut r = rect.intersect(Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));
        if let Some(clip) = self.clip {
            r = r.intersect(clip);
        }
        if !(r.width() > 0.0 && r.height() > 0.0) {
            return None;
        }
        let x0 = r.x0.floor().max(0.0) as u32;
        let y0 = r.y0.floor().max(0.0) as u32;
        let x1 = (r.x1.ceil() as u32).min(self.width);
        let y1 = (r.y1.ceil() as u32).min(self.height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn full_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl RenderTarget for Surface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn set_clip_rect(&mut self, rect: Option<Rect>) {
        self.clip = rect;
    }

    fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    fn draw_image(&mut self, image: ImageRef<'_>, transform: Affine, opacity: f32) {
        if self.is_empty() || transform.determinant().abs() < 1e-12 {
            return;
        }
        let inverse = transform.inverse();
        let src_rect = Rect::new(0.0, 0.0, f64::from(image.width), f64::from(image.height));

        match self.mode {
            CompositeMode::Normal => {
                if image.width == 0 || image.height == 0 {
                    return;
                }
                let Some((x0, y0, x1, y1)) =
                    self.pixel_span(transform.transform_rect_bbox(src_rect))
                else {
                    return;
                };
                for y in y0..y1 {
                    for x in x0..x1 {
                        let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                        if let Some(src) = image.sample_nearest(p) {
                            let idx = self.index(x, y);
                            let dst = [
                                self.data[idx],
                                self.data[idx + 1],
                                self.data[idx + 2],
                                self.data[idx + 3],
                            ];
                            self.data[idx..idx + 4].copy_from_slice(&over(dst, src, opacity));
                        }
                    }
                }
            }
            CompositeMode::DestinationIn => {
                // Pixels the stencil does not cover are cleared, so the whole clip region is visited.
                let Some((x0, y0, x1, y1)) = self.pixel_span(self.full_rect()) else {
                    return;
                };
                let op = unit_to_u8(opacity);
                for y in y0..y1 {
                    for x in x0..x1 {
                        let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                        let alpha = image.sample_nearest(p).map_or(0, |px| px[3]);
                        let coverage = mul_div255_u16(u16::from(alpha), op);
                        let idx = self.index(x, y);
                        let dst = [
                            self.data[idx],
                            self.data[idx + 1],
                            self.data[idx + 2],
                            self.data[idx + 3],
                        ];
                        self.data[idx..idx + 4].copy_from_slice(&dest_in(dst, coverage));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
