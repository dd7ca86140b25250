//! Tiled output driver. Shapes are compiled once, then stamped tile by
//! tile through a small scratch buffer so a full-frame intermediate is
//! never required; each tile is converted from tiny-skia's
//! premultiplied RGBA into the caller's pixel format in place.

use crate::error::SvgError;
use crate::model::Document;
use crate::scanline::SharedRasterizer;

/// Extra pixels rendered around each tile. Antialiased coverage next to
/// the pixmap clip edge differs from an unclipped render, so every tile
/// is rasterized with this margin and only the interior is kept. The
/// margin collapses to zero along the frame edges, where the clip is
/// real.
const TILE_GUARD: usize = 4;

/// Destination pixel layouts the driver can emit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel, B/G/R/A byte order, straight alpha.
    #[default]
    Bgra8888,
    /// 2 bytes per pixel, little-endian 5-6-5, no alpha channel.
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub format: PixelFormat,
    /// When off, partially covered pixels are written fully opaque
    /// instead of being blended with the destination.
    pub antialias: bool,
    /// Swap the two bytes of each RGB565 pixel, for big-endian panels.
    pub swap_bytes: bool,
    /// Rasterize the whole frame in one pass instead of tiling; the
    /// scratch buffer must then hold the full frame.
    pub large_buffer: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            format: PixelFormat::Bgra8888,
            antialias: true,
            swap_bytes: false,
            large_buffer: false,
        }
    }
}

/// Drives the shared rasterizer and converts its output into the
/// destination buffer, tiling through `scratch`.
pub struct Renderer {
    rasterizer: SharedRasterizer,
    options: RenderOptions,
    scratch: Vec<u8>,
    buf_width: u32,
    buf_height: u32,
}

impl Renderer {
    pub fn new(rasterizer: SharedRasterizer, options: RenderOptions) -> Self {
        Renderer {
            rasterizer,
            options,
            scratch: Vec::new(),
            buf_width: 0,
            buf_height: 0,
        }
    }

    /// Sizes the intermediate buffer; in tiled mode this is the tile
    /// size, in large-buffer mode it must cover the whole frame. Tiled
    /// scratch carries the guard margin on all sides.
    pub fn set_buffer(&mut self, width: u32, height: u32) {
        self.buf_width = width;
        self.buf_height = height;
        let w = width as usize + 2 * TILE_GUARD;
        let h = height as usize + 2 * TILE_GUARD;
        self.scratch = vec![0u8; w * h * 4];
    }

    /// Bytes held by the intermediate buffer.
    pub fn buffer_size(&self) -> usize {
        self.scratch.len()
    }

    /// Renders `doc` into `dst` at offset (`tx`, `ty`), `width` by
    /// `height` pixels with `stride` bytes per destination row, scaling
    /// document units by `scale`. Pixels the document does not cover
    /// are left as they were.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        doc: &Document,
        dst: &mut [u8],
        tx: f32,
        ty: f32,
        width: u32,
        height: u32,
        stride: usize,
        scale: f32,
    ) -> Result<(), SvgError> {
        if width == 0 || height == 0 || scale <= 0.0 {
            return Ok(());
        }
        let bpp = self.options.format.bytes_per_pixel();
        let needed = stride * (height as usize - 1) + width as usize * bpp;
        if dst.len() < needed {
            return Err(SvgError::BufferTooSmall {
                needed,
                got: dst.len(),
            });
        }

        if self.options.large_buffer {
            let frame = width as usize * height as usize * 4;
            if self.scratch.len() < frame {
                return Err(SvgError::InvalidConfiguration(format!(
                    "scratch buffer holds {} bytes but the frame needs {frame}",
                    self.scratch.len()
                )));
            }
            self.scratch[..frame].fill(0);
            self.rasterizer.borrow_mut().rasterize(
                doc,
                tx,
                ty,
                scale,
                &mut self.scratch[..frame],
                width,
                height,
                width as usize * 4,
            );
            convert_tile(
                &self.scratch,
                width as usize * 4,
                dst,
                stride,
                0,
                0,
                width as usize,
                height as usize,
                self.options,
            );
            return Ok(());
        }

        if self.buf_width == 0 || self.buf_height == 0 {
            return Err(SvgError::InvalidConfiguration(
                "render buffer is not configured; call set_buffer first".to_string(),
            ));
        }
        let bw = self.buf_width as usize;
        let bh = self.buf_height as usize;

        let mut rasterizer = self.rasterizer.borrow_mut();
        rasterizer.prepare(doc, scale);

        let mut y0 = 0usize;
        while y0 < height as usize {
            let tile_h = bh.min(height as usize - y0);
            let mut x0 = 0usize;
            while x0 < width as usize {
                let tile_w = bw.min(width as usize - x0);
                // guard margin, clamped so the frame edges stay clipped
                let gl = TILE_GUARD.min(x0);
                let gt = TILE_GUARD.min(y0);
                let gr = TILE_GUARD.min(width as usize - x0 - tile_w);
                let gb = TILE_GUARD.min(height as usize - y0 - tile_h);
                let rw = tile_w + gl + gr;
                let rh = tile_h + gt + gb;
                let rstride = rw * 4;
                let rbytes = rstride * rh;
                self.scratch[..rbytes].fill(0);
                rasterizer.finish(
                    tx - (x0 - gl) as f32,
                    ty - (y0 - gt) as f32,
                    &mut self.scratch[..rbytes],
                    rw as u32,
                    rh as u32,
                    rstride,
                );
                // keep only the tile interior of the guarded render
                convert_tile(
                    &self.scratch[gt * rstride + gl * 4..rbytes],
                    rstride,
                    dst,
                    stride,
                    x0,
                    y0,
                    tile_w,
                    tile_h,
                    self.options,
                );
                x0 += bw;
            }
            y0 += bh;
        }
        Ok(())
    }
}

/// Converts one tile of premultiplied RGBA into the destination format,
/// blending over what the destination already holds.
#[allow(clippy::too_many_arguments)]
fn convert_tile(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    dst_x: usize,
    dst_y: usize,
    width: usize,
    height: usize,
    options: RenderOptions,
) {
    let bpp = options.format.bytes_per_pixel();
    for y in 0..height {
        let src_row = y * src_stride;
        let dst_row = (dst_y + y) * dst_stride + dst_x * bpp;
        for x in 0..width {
            let o = src_row + x * 4;
            let (mut r, mut g, mut b, mut a) = (src[o], src[o + 1], src[o + 2], src[o + 3]);
            if a == 0 {
                continue;
            }
            if !options.antialias && a < 255 {
                // threshold coverage: unpremultiply and write opaque
                r = unpremultiply(r, a);
                g = unpremultiply(g, a);
                b = unpremultiply(b, a);
                a = 255;
            }
            let out = dst_row + x * bpp;
            match options.format {
                PixelFormat::Bgra8888 => {
                    if a == 255 {
                        dst[out] = b;
                        dst[out + 1] = g;
                        dst[out + 2] = r;
                        dst[out + 3] = 255;
                    } else {
                        dst[out] = blend(dst[out], b, a);
                        dst[out + 1] = blend(dst[out + 1], g, a);
                        dst[out + 2] = blend(dst[out + 2], r, a);
                        dst[out + 3] = blend(dst[out + 3], a, a);
                    }
                }
                PixelFormat::Rgb565 => {
                    let packed = if a == 255 {
                        pack_565(r, g, b)
                    } else {
                        let old = read_565(dst[out], dst[out + 1], options.swap_bytes);
                        let (dr, dg, db) = unpack_565(old);
                        pack_565(blend(dr, r, a), blend(dg, g, a), blend(db, b, a))
                    };
                    let [lo, hi] = packed.to_le_bytes();
                    if options.swap_bytes {
                        dst[out] = hi;
                        dst[out + 1] = lo;
                    } else {
                        dst[out] = lo;
                        dst[out + 1] = hi;
                    }
                }
            }
        }
    }
}

/// Source-over with a premultiplied source channel.
fn blend(dst: u8, src_premul: u8, a: u8) -> u8 {
    let out = ((dst as u32 * (256 - a as u32)) >> 8) + src_premul as u32;
    out.min(255) as u8
}

fn unpremultiply(ch: u8, a: u8) -> u8 {
    ((ch as u32 * 255) / a as u32).min(255) as u8
}

fn pack_565(r: u8, g: u8, b: u8) -> u16 {
    (((r as u16) >> 3) << 11) | (((g as u16) >> 2) << 5) | ((b as u16) >> 3)
}

fn unpack_565(v: u16) -> (u8, u8, u8) {
    (
        ((v >> 8) & 0xf8) as u8,
        ((v >> 3) & 0xfc) as u8,
        ((v << 3) & 0xf8) as u8,
    )
}

fn read_565(b0: u8, b1: u8, swapped: bool) -> u16 {
    if swapped {
        u16::from_le_bytes([b1, b0])
    } else {
        u16::from_le_bytes([b0, b1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::scanline::ScanlineRasterizer;

    fn doc(body: &str) -> Document {
        Document::parse(
            &format!("<svg width=\"16\" height=\"16\">{body}</svg>"),
            "px",
            96.0,
        )
    }

    fn renderer(options: RenderOptions, bw: u32, bh: u32) -> Renderer {
        let mut r = Renderer::new(ScanlineRasterizer::new_shared(), options);
        r.set_buffer(bw, bh);
        r
    }

    #[test]
    fn bgra_fill_writes_reordered_bytes() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#ff0000\"/>");
        let mut r = renderer(RenderOptions::default(), 16, 16);
        let mut dst = vec![0u8; 16 * 16 * 4];
        r.render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 4, 1.0).unwrap();
        let o = 8 * 64 + 8 * 4;
        assert_eq!(&dst[o..o + 4], &[0, 0, 255, 255]);
    }

    #[test]
    fn tiled_output_matches_single_shot() {
        let d = doc(
            "<circle cx=\"8\" cy=\"8\" r=\"6\" fill=\"#3366cc\"/>\
             <rect x=\"1\" y=\"1\" width=\"5\" height=\"5\" fill=\"#ff8800\" opacity=\"0.7\"/>",
        );
        let mut tiled = renderer(RenderOptions::default(), 5, 3);
        let mut whole = renderer(
            RenderOptions {
                large_buffer: true,
                ..RenderOptions::default()
            },
            16,
            16,
        );
        let mut a = vec![0u8; 16 * 16 * 4];
        let mut b = vec![0u8; 16 * 16 * 4];
        tiled.render(&d, &mut a, 0.0, 0.0, 16, 16, 16 * 4, 1.0).unwrap();
        whole.render(&d, &mut b, 0.0, 0.0, 16, 16, 16 * 4, 1.0).unwrap();
        assert_eq!(a, b);

        // fractional offset and scale land coverage mid-pixel on seams
        a.fill(0);
        b.fill(0);
        tiled.render(&d, &mut a, 2.5, -1.5, 16, 16, 16 * 4, 1.25).unwrap();
        whole.render(&d, &mut b, 2.5, -1.5, 16, 16, 16 * 4, 1.25).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rgb565_packs_and_optionally_swaps() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#ff0000\"/>");
        let mut plain = renderer(
            RenderOptions {
                format: PixelFormat::Rgb565,
                ..RenderOptions::default()
            },
            16,
            16,
        );
        let mut dst = vec![0u8; 16 * 16 * 2];
        plain
            .render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 2, 1.0)
            .unwrap();
        let o = 8 * 32 + 8 * 2;
        // red is 0xf800
        assert_eq!(&dst[o..o + 2], &[0x00, 0xf8]);

        let mut swapped = renderer(
            RenderOptions {
                format: PixelFormat::Rgb565,
                swap_bytes: true,
                ..RenderOptions::default()
            },
            16,
            16,
        );
        let mut dst = vec![0u8; 16 * 16 * 2];
        swapped
            .render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 2, 1.0)
            .unwrap();
        assert_eq!(&dst[o..o + 2], &[0xf8, 0x00]);
    }

    #[test]
    fn translucent_source_blends_over_destination() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#000000\" opacity=\"0.5\"/>");
        let mut r = renderer(RenderOptions::default(), 16, 16);
        let mut dst = vec![0xffu8; 16 * 16 * 4];
        r.render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 4, 1.0).unwrap();
        let o = 8 * 64 + 8 * 4;
        // white halved by a 50% black cover
        assert!(dst[o] >= 126 && dst[o] <= 130, "got {}", dst[o]);
        assert_eq!(dst[o + 3], 255);
    }

    #[test]
    fn disabling_antialias_writes_opaque_pixels() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#00ff00\" opacity=\"0.4\"/>");
        let mut r = renderer(
            RenderOptions {
                antialias: false,
                ..RenderOptions::default()
            },
            16,
            16,
        );
        let mut dst = vec![0u8; 16 * 16 * 4];
        r.render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 4, 1.0).unwrap();
        let o = 8 * 64 + 8 * 4;
        assert_eq!(&dst[o..o + 4], &[0, 255, 0, 255]);
    }

    #[test]
    fn undersized_destination_is_rejected() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#ff0000\"/>");
        let mut r = renderer(RenderOptions::default(), 16, 16);
        let mut dst = vec![0u8; 16];
        let err = r
            .render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 4, 1.0)
            .unwrap_err();
        assert!(matches!(err, SvgError::BufferTooSmall { .. }));
    }

    #[test]
    fn large_buffer_mode_requires_a_full_frame_scratch() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#ff0000\"/>");
        let mut r = renderer(
            RenderOptions {
                large_buffer: true,
                ..RenderOptions::default()
            },
            4,
            4,
        );
        let mut dst = vec![0u8; 16 * 16 * 4];
        let err = r
            .render(&d, &mut dst, 0.0, 0.0, 16, 16, 16 * 4, 1.0)
            .unwrap_err();
        assert!(matches!(err, SvgError::InvalidConfiguration(_)));
    }

    #[test]
    fn zero_size_render_is_a_no_op() {
        let d = doc("<rect width=\"16\" height=\"16\" fill=\"#ff0000\"/>");
        let mut r = renderer(RenderOptions::default(), 16, 16);
        let mut dst = vec![0u8; 4];
        r.render(&d, &mut dst, 0.0, 0.0, 0, 16, 0, 1.0).unwrap();
        r.render(&d, &mut dst, 0.0, 0.0, 16, 16, 64, 0.0).unwrap();
        assert!(dst.iter().all(|b| *b == 0));
    }

    #[test]
    fn offsets_shift_content_across_tiles() {
        let d = doc("<rect width=\"4\" height=\"4\" fill=\"#ffffff\"/>");
        let mut r = renderer(RenderOptions::default(), 4, 4);
        let mut dst = vec![0u8; 16 * 16 * 4];
        r.render(&d, &mut dst, 10.0, 10.0, 16, 16, 16 * 4, 1.0).unwrap();
        let at = |x: usize, y: usize| {
            let o = y * 64 + x * 4;
            [dst[o], dst[o + 1], dst[o + 2], dst[o + 3]]
        };
        assert_eq!(at(2, 2), [0, 0, 0, 0]);
        assert_eq!(at(12, 12), [255, 255, 255, 255]);
    }
}
