use crate::foundation::math::{mul_div255_u8, mul_div255_u16, unit_to_u8};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over blend of `src` scaled by `opacity` onto `dst`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let op = unit_to_u8(opacity);
    if op == 0 || src[3] == 0 {
        return dst;
    }

    let sa = mul_div255_u16(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - sa;

    let mut out = [0u8; 4];
    out[3] = (sa as u8).saturating_add(mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Destination-in: keep `dst` where the stencil is opaque.
///
/// `coverage` is the stencil alpha already scaled by draw opacity.
pub fn dest_in(dst: PremulRgba8, coverage: u16) -> PremulRgba8 {
    if coverage >= 255 {
        return dst;
    }
    if coverage == 0 {
        return [0; 4];
    }
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = mul_div255_u8(u16::from(dst[i]), coverage);
    }
    out
}
