//! tiny-skia rendering adapter. `prepare` bakes the document's shapes
//! into device-space paths and paints at a given output scale;
//! `finish` replays them into a caller-provided premultiplied RGBA
//! buffer at a translation offset. Splitting the two lets the tiled
//! output driver compile once and stamp many tiles.

use std::cell::RefCell;
use std::rc::Rc;

use tiny_skia::{
    FillRule as SkFillRule, GradientStop as SkStop, LineCap as SkCap, LineJoin as SkJoin,
    LinearGradient, Paint as SkPaint, Path as SkPath, PathBuilder, Pixmap, PixmapMut,
    Point as SkPoint, RadialGradient, Shader, SpreadMode as SkSpread, Stroke, StrokeDash,
    Transform,
};

use crate::model::{Document, FillRule, Gradient, LineCap, LineJoin, Paint, Shape, SpreadMode};
use crate::xform::Point;

struct PreparedShape {
    path: SkPath,
    fill: Option<(SkPaint<'static>, SkFillRule)>,
    stroke: Option<(SkPaint<'static>, Stroke)>,
}

/// Compiles parsed shapes to tiny-skia primitives and renders them.
#[derive(Default)]
pub struct ScanlineRasterizer {
    shapes: Vec<PreparedShape>,
    prepared_bytes: usize,
}

/// The façade and the output driver share one rasterizer.
pub type SharedRasterizer = Rc<RefCell<ScanlineRasterizer>>;

impl ScanlineRasterizer {
    pub fn new() -> Self {
        ScanlineRasterizer::default()
    }

    pub fn new_shared() -> SharedRasterizer {
        Rc::new(RefCell::new(ScanlineRasterizer::new()))
    }

    /// Approximate bytes held by the compiled shape list.
    pub fn memory_size(&self) -> usize {
        self.prepared_bytes
    }

    /// Drops the compiled shapes.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.prepared_bytes = 0;
    }

    /// Compiles every visible shape at `scale`. Previously prepared
    /// shapes are discarded.
    pub fn prepare(&mut self, doc: &Document, scale: f32) {
        self.shapes.clear();
        self.prepared_bytes = 0;
        if scale <= 0.0 {
            return;
        }
        for shape in doc.shapes() {
            if !shape.visible {
                continue;
            }
            let Some(path) = build_path(shape, scale) else {
                continue;
            };
            let fill = build_fill(shape, scale);
            let stroke = build_stroke(shape, scale);
            if fill.is_none() && stroke.is_none() {
                continue;
            }
            self.prepared_bytes += path.len() * (std::mem::size_of::<SkPoint>() + 1)
                + std::mem::size_of::<PreparedShape>();
            self.shapes.push(PreparedShape { path, fill, stroke });
        }
    }

    /// Replays the prepared shapes translated by (`tx`, `ty`) into a
    /// premultiplied RGBA destination. `stride` is in bytes. Pixels the
    /// shapes do not cover are left untouched.
    pub fn finish(&self, tx: f32, ty: f32, dst: &mut [u8], width: u32, height: u32, stride: usize) {
        if width == 0 || height == 0 {
            return;
        }
        let row_bytes = width as usize * 4;
        let ts = Transform::from_translate(tx, ty);

        if stride == row_bytes && dst.len() == row_bytes * height as usize {
            if let Some(mut pixmap) = PixmapMut::from_bytes(dst, width, height) {
                self.draw(&mut pixmap, ts);
            }
            return;
        }

        // Strided destination: render into a packed scratch pixmap,
        // then copy row by row. Existing content is carried in so the
        // compositing result matches the packed case.
        let Some(mut pixmap) = Pixmap::new(width, height) else {
            return;
        };
        let data = pixmap.data_mut();
        for y in 0..height as usize {
            let src = &dst[y * stride..y * stride + row_bytes];
            data[y * row_bytes..(y + 1) * row_bytes].copy_from_slice(src);
        }
        self.draw(&mut pixmap.as_mut(), ts);
        let data = pixmap.data();
        for y in 0..height as usize {
            let row = &data[y * row_bytes..(y + 1) * row_bytes];
            dst[y * stride..y * stride + row_bytes].copy_from_slice(row);
        }
    }

    /// One-shot compile and render.
    #[allow(clippy::too_many_arguments)]
    pub fn rasterize(
        &mut self,
        doc: &Document,
        tx: f32,
        ty: f32,
        scale: f32,
        dst: &mut [u8],
        width: u32,
        height: u32,
        stride: usize,
    ) {
        self.prepare(doc, scale);
        self.finish(tx, ty, dst, width, height, stride);
    }

    fn draw(&self, pixmap: &mut PixmapMut<'_>, ts: Transform) {
        for shape in &self.shapes {
            if let Some((paint, rule)) = &shape.fill {
                pixmap.fill_path(&shape.path, paint, *rule, ts, None);
            }
            if let Some((paint, stroke)) = &shape.stroke {
                pixmap.stroke_path(&shape.path, paint, stroke, ts, None);
            }
        }
    }
}

/// All subpaths of a shape flattened into one device-space path, so
/// even-odd and nonzero winding act across subpaths as SVG requires.
fn build_path(shape: &Shape, scale: f32) -> Option<SkPath> {
    let mut builder = PathBuilder::new();
    for path in &shape.paths {
        if path.pts.len() < 4 {
            continue;
        }
        let pt = |p: Point| (p.x * scale, p.y * scale);
        let (x, y) = pt(path.pts[0]);
        builder.move_to(x, y);
        let mut i = 1;
        while i + 2 < path.pts.len() {
            let (x1, y1) = pt(path.pts[i]);
            let (x2, y2) = pt(path.pts[i + 1]);
            let (x, y) = pt(path.pts[i + 2]);
            builder.cubic_to(x1, y1, x2, y2, x, y);
            i += 3;
        }
        if path.closed {
            builder.close();
        }
    }
    builder.finish()
}

fn build_fill(shape: &Shape, scale: f32) -> Option<(SkPaint<'static>, SkFillRule)> {
    let paint = build_paint(&shape.fill, shape.opacity, scale)?;
    let rule = match shape.fill_rule {
        FillRule::NonZero => SkFillRule::Winding,
        FillRule::EvenOdd => SkFillRule::EvenOdd,
    };
    Some((paint, rule))
}

fn build_stroke(shape: &Shape, scale: f32) -> Option<(SkPaint<'static>, Stroke)> {
    let width = shape.stroke_width * scale;
    if width <= 0.0 {
        return None;
    }
    let paint = build_paint(&shape.stroke, shape.opacity, scale)?;
    let mut stroke = Stroke {
        width,
        miter_limit: shape.miter_limit,
        line_cap: match shape.stroke_line_cap {
            LineCap::Butt => SkCap::Butt,
            LineCap::Round => SkCap::Round,
            LineCap::Square => SkCap::Square,
        },
        line_join: match shape.stroke_line_join {
            LineJoin::Miter => SkJoin::Miter,
            LineJoin::Round => SkJoin::Round,
            LineJoin::Bevel => SkJoin::Bevel,
        },
        dash: None,
    };
    if shape.stroke_dash_count > 0 {
        let mut pattern: Vec<f32> = shape.stroke_dash_array[..shape.stroke_dash_count]
            .iter()
            .map(|d| (d * scale).max(0.0))
            .collect();
        // An odd count repeats itself to make up the full cycle.
        if pattern.len() % 2 == 1 {
            let dup = pattern.clone();
            pattern.extend_from_slice(&dup);
        }
        if pattern.iter().any(|d| *d > 0.0) {
            stroke.dash = StrokeDash::new(pattern, shape.stroke_dash_offset * scale);
        }
    }
    Some((paint, stroke))
}

fn build_paint(paint: &Paint, opacity: f32, scale: f32) -> Option<SkPaint<'static>> {
    let shader = match paint {
        Paint::None | Paint::Ref(_) => return None,
        Paint::Color(color) => solid(color.r(), color.g(), color.b(), color.a(), opacity),
        Paint::Linear(grad) => linear_shader(grad, opacity, scale),
        Paint::Radial(grad) => radial_shader(grad, opacity, scale),
    };
    let mut out = SkPaint::default();
    out.shader = shader;
    out.anti_alias = true;
    Some(out)
}

fn solid(r: u8, g: u8, b: u8, a: u8, opacity: f32) -> Shader<'static> {
    let alpha = (a as f32 * opacity.clamp(0.0, 1.0) + 0.5) as u8;
    Shader::SolidColor(tiny_skia::Color::from_rgba8(r, g, b, alpha))
}

fn gradient_stops(grad: &Gradient, opacity: f32) -> Vec<SkStop> {
    grad.stops
        .iter()
        .map(|stop| {
            let alpha = (stop.color.a() as f32 * opacity.clamp(0.0, 1.0) + 0.5) as u8;
            SkStop::new(
                stop.offset.clamp(0.0, 1.0),
                tiny_skia::Color::from_rgba8(
                    stop.color.r(),
                    stop.color.g(),
                    stop.color.b(),
                    alpha,
                ),
            )
        })
        .collect()
}

fn spread(mode: SpreadMode) -> SkSpread {
    match mode {
        SpreadMode::Pad => SkSpread::Pad,
        SpreadMode::Reflect => SkSpread::Reflect,
        SpreadMode::Repeat => SkSpread::Repeat,
    }
}

/// Degenerate geometry makes the shader constructors refuse; fall back
/// to a solid fill of the last stop so the shape still shows.
fn gradient_fallback(grad: &Gradient, opacity: f32) -> Shader<'static> {
    match grad.stops.last() {
        Some(stop) => solid(
            stop.color.r(),
            stop.color.g(),
            stop.color.b(),
            stop.color.a(),
            opacity,
        ),
        None => solid(0, 0, 0, 0, 0.0),
    }
}

fn linear_shader(grad: &Gradient, opacity: f32, scale: f32) -> Shader<'static> {
    // The gradient matrix maps the unit segment (0,0)-(0,1) onto the
    // gradient vector in document space.
    let start = grad.xform.apply(Point::new(0.0, 0.0));
    let end = grad.xform.apply(Point::new(0.0, 1.0));
    LinearGradient::new(
        SkPoint::from_xy(start.x * scale, start.y * scale),
        SkPoint::from_xy(end.x * scale, end.y * scale),
        gradient_stops(grad, opacity),
        spread(grad.spread),
        Transform::identity(),
    )
    .unwrap_or_else(|| gradient_fallback(grad, opacity))
}

fn radial_shader(grad: &Gradient, opacity: f32, scale: f32) -> Shader<'static> {
    // Unit circle centered at the origin, focal point in unit space;
    // the gradient matrix (post-scaled) carries it to device space.
    let m = grad.xform;
    RadialGradient::new(
        SkPoint::from_xy(grad.fx, grad.fy),
        SkPoint::from_xy(0.0, 0.0),
        1.0,
        gradient_stops(grad, opacity),
        spread(grad.spread),
        Transform::from_row(
            m.a * scale,
            m.b * scale,
            m.c * scale,
            m.d * scale,
            m.e * scale,
            m.f * scale,
        ),
    )
    .unwrap_or_else(|| gradient_fallback(grad, opacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    fn doc(body: &str) -> Document {
        Document::parse(
            &format!("<svg width=\"16\" height=\"16\">{body}</svg>"),
            "px",
            96.0,
        )
    }

    fn pixel(buf: &[u8], stride: usize, x: usize, y: usize) -> [u8; 4] {
        let o = y * stride + x * 4;
        [buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]
    }

    #[test]
    fn solid_rect_fills_interior_pixels() {
        let d = doc("<rect x=\"2\" y=\"2\" width=\"12\" height=\"12\" fill=\"#ff0000\"/>");
        let mut r = ScanlineRasterizer::new();
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.rasterize(&d, 0.0, 0.0, 1.0, &mut buf, 16, 16, 16 * 4);
        // premultiplied RGBA in tiny-skia's storage order
        assert_eq!(pixel(&buf, 64, 8, 8), [255, 0, 0, 255]);
        assert_eq!(pixel(&buf, 64, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn shape_opacity_scales_coverage() {
        let d = doc(
            "<rect x=\"0\" y=\"0\" width=\"16\" height=\"16\" fill=\"#00ff00\" opacity=\"0.5\"/>",
        );
        let mut r = ScanlineRasterizer::new();
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.rasterize(&d, 0.0, 0.0, 1.0, &mut buf, 16, 16, 16 * 4);
        let px = pixel(&buf, 64, 8, 8);
        assert_eq!(px[3], 128);
        assert_eq!(px[0], 0);
        assert!(px[1] >= 127 && px[1] <= 129);
    }

    #[test]
    fn translation_offsets_prepared_shapes() {
        let d = doc("<rect x=\"0\" y=\"0\" width=\"4\" height=\"4\" fill=\"#0000ff\"/>");
        let mut r = ScanlineRasterizer::new();
        r.prepare(&d, 1.0);
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.finish(8.0, 8.0, &mut buf, 16, 16, 16 * 4);
        assert_eq!(pixel(&buf, 64, 2, 2), [0, 0, 0, 0]);
        assert_eq!(pixel(&buf, 64, 10, 10), [0, 0, 255, 255]);
    }

    #[test]
    fn scale_is_baked_at_prepare_time() {
        let d = doc("<rect x=\"0\" y=\"0\" width=\"4\" height=\"4\" fill=\"#ffffff\"/>");
        let mut r = ScanlineRasterizer::new();
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.rasterize(&d, 0.0, 0.0, 2.0, &mut buf, 16, 16, 16 * 4);
        // 4x4 rect at scale 2 covers 8x8 pixels
        assert_eq!(pixel(&buf, 64, 6, 6), [255, 255, 255, 255]);
        assert_eq!(pixel(&buf, 64, 10, 10), [0, 0, 0, 0]);
    }

    #[test]
    fn strided_destination_matches_packed() {
        let d = doc("<circle cx=\"8\" cy=\"8\" r=\"6\" fill=\"#123456\"/>");
        let mut r = ScanlineRasterizer::new();
        r.prepare(&d, 1.0);
        let mut packed = vec![0u8; 16 * 16 * 4];
        r.finish(0.0, 0.0, &mut packed, 16, 16, 16 * 4);
        let stride = 20 * 4;
        let mut strided = vec![0u8; stride * 16];
        r.finish(0.0, 0.0, &mut strided, 16, 16, stride);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(
                    pixel(&packed, 64, x, y),
                    pixel(&strided, stride, x, y),
                    "pixel ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn gradient_fill_varies_across_the_shape() {
        let d = doc(
            "<linearGradient id=\"g\"><stop offset=\"0\" stop-color=\"#000000\"/>\
             <stop offset=\"1\" stop-color=\"#ffffff\"/></linearGradient>\
             <rect x=\"0\" y=\"0\" width=\"16\" height=\"16\" fill=\"url(#g)\"/>",
        );
        let mut r = ScanlineRasterizer::new();
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.rasterize(&d, 0.0, 0.0, 1.0, &mut buf, 16, 16, 16 * 4);
        let left = pixel(&buf, 64, 1, 8);
        let right = pixel(&buf, 64, 14, 8);
        assert!(right[0] > left[0] + 100, "left {left:?} right {right:?}");
        assert_eq!(left[3], 255);
    }

    #[test]
    fn stroke_only_shape_is_prepared() {
        let d = doc(
            "<rect x=\"4\" y=\"4\" width=\"8\" height=\"8\" fill=\"none\" \
             stroke=\"#ff0000\" stroke-width=\"2\"/>",
        );
        let mut r = ScanlineRasterizer::new();
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.rasterize(&d, 0.0, 0.0, 1.0, &mut buf, 16, 16, 16 * 4);
        // edge is painted, interior is not
        assert_eq!(pixel(&buf, 64, 8, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&buf, 64, 8, 8), [0, 0, 0, 0]);
    }

    #[test]
    fn invisible_shapes_are_skipped() {
        let d = doc(
            "<rect x=\"0\" y=\"0\" width=\"16\" height=\"16\" fill=\"#ff0000\" \
             display=\"none\"/>",
        );
        let mut r = ScanlineRasterizer::new();
        r.prepare(&d, 1.0);
        assert_eq!(r.memory_size(), 0);
        let mut buf = vec![0u8; 16 * 16 * 4];
        r.finish(0.0, 0.0, &mut buf, 16, 16, 16 * 4);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn memory_size_reflects_prepared_shapes() {
        let d = doc("<rect x=\"0\" y=\"0\" width=\"8\" height=\"8\" fill=\"#ff0000\"/>");
        let mut r = ScanlineRasterizer::new();
        r.prepare(&d, 1.0);
        assert!(r.memory_size() > 0);
        r.prepare(&d, 0.0);
        assert_eq!(r.memory_size(), 0);
    }
}
