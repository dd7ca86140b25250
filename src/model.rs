//! Document model: the shape-node arena, paths with their baseline
//! geometry, paints, and the byte accounting that backs the memory
//! introspection API.

use crate::anim::AnimationSegment;
use crate::color::Color;
use crate::error::SvgError;
use crate::xform::{Bounds, Point, Transform, curve_bounds};
use crate::{anim, parser};

pub(crate) const MAX_DASHES: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    User,
    Px,
    Pt,
    Pc,
    Mm,
    Cm,
    In,
    Percent,
    Em,
    Ex,
}

/// A raw length with its unit, kept unresolved until the reference
/// frame (origin and axis length) is known.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub value: f32,
    pub units: Units,
}

impl Coordinate {
    pub(crate) fn new(value: f32, units: Units) -> Self {
        Coordinate { value, units }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Min,
    Mid,
    Max,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlignType {
    /// Stretch to fill; aspect ratio is not preserved.
    #[default]
    None,
    Meet,
    Slice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpreadMode {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub color: Color,
    pub offset: f32,
}

/// A resolved gradient. `xform` maps gradient unit space to device
/// space after viewbox normalization; `base_xform` is the retained
/// pre-viewbox matrix that rescaling restarts from.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub xform: Transform,
    pub(crate) base_xform: Transform,
    pub spread: SpreadMode,
    /// Focal point of a radial gradient, in unit space (divided by r).
    pub fx: f32,
    pub fy: f32,
    pub stops: Vec<GradientStop>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Paint {
    #[default]
    None,
    Color(Color),
    /// Unresolved `url(#id)` reference; replaced during gradient
    /// resolution and never visible to rasterization.
    Ref(String),
    Linear(Box<Gradient>),
    Radial(Box<Gradient>),
}

impl Paint {
    pub fn is_some(&self) -> bool {
        !matches!(self, Paint::None)
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            Paint::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// One subpath: cubic control points (1 + 3n of them) plus the
/// baseline geometry it is re-derived from when transforms change.
#[derive(Clone, Debug)]
pub struct Path {
    /// Transformed points: first the start point, then triples of
    /// (control1, control2, end).
    pub pts: Vec<Point>,
    pub closed: bool,
    pub bounds: Bounds,
    pub(crate) xform: Transform,
    /// Set once viewbox scaling has been applied to `pts`.
    pub(crate) scaled: bool,
    pub(crate) base_pts: Vec<Point>,
    pub(crate) base_xform: Transform,
}

impl Path {
    /// Recomputes `pts` from the baseline points through the current
    /// transform and refreshes the bounds.
    pub(crate) fn retransform(&mut self) {
        let xform = self.xform;
        self.pts.clear();
        for i in 0..self.base_pts.len() {
            let p = xform.apply(self.base_pts[i]);
            self.pts.push(p);
        }
        self.update_bounds();
    }

    pub(crate) fn update_bounds(&mut self) {
        if self.pts.len() < 4 {
            self.bounds = Bounds::ZERO;
            return;
        }
        let mut bounds = curve_bounds(&[self.pts[0], self.pts[1], self.pts[2], self.pts[3]]);
        let mut i = 3;
        while i + 3 < self.pts.len() {
            bounds = bounds.union(curve_bounds(&[
                self.pts[i],
                self.pts[i + 1],
                self.pts[i + 2],
                self.pts[i + 3],
            ]));
            i += 3;
        }
        self.bounds = bounds;
    }
}

/// Style snapshot taken when a shape is committed; animation resets
/// restore from it every query.
#[derive(Clone, Debug)]
pub(crate) struct ShapeStyle {
    pub opacity: f32,
    pub xform: Transform,
    pub fill: Paint,
    pub stroke: Paint,
    pub stroke_width: f32,
    pub stroke_dash_offset: f32,
    pub stroke_dash_array: [f32; MAX_DASHES],
    pub stroke_dash_count: usize,
}

#[derive(Clone, Debug)]
pub struct Shape {
    pub id: String,
    pub fill: Paint,
    pub stroke: Paint,
    pub opacity: f32,
    pub stroke_width: f32,
    pub stroke_dash_offset: f32,
    pub stroke_dash_array: [f32; MAX_DASHES],
    pub stroke_dash_count: usize,
    pub stroke_line_join: LineJoin,
    pub stroke_line_cap: LineCap,
    pub miter_limit: f32,
    pub fill_rule: FillRule,
    pub visible: bool,
    pub bounds: Bounds,
    pub(crate) xform: Transform,
    /// Set once viewbox scaling has been applied to the stroke widths.
    pub(crate) stroke_scaled: bool,
    pub(crate) baseline: ShapeStyle,
    pub paths: Vec<Path>,
}

impl Shape {
    pub(crate) fn update_bounds(&mut self) {
        let mut iter = self.paths.iter();
        if let Some(first) = iter.next() {
            let mut bounds = first.bounds;
            for path in iter {
                bounds = bounds.union(path.bounds);
            }
            self.bounds = bounds;
        }
    }

    /// Folds the shape transform's scale into stroke metrics and marks
    /// them as needing viewbox scaling again.
    pub(crate) fn scale_stroke(&mut self) {
        let scale = self.xform.average_scale();
        self.stroke_width *= scale;
        self.stroke_dash_offset *= scale;
        for dash in self.stroke_dash_array.iter_mut() {
            *dash *= scale;
        }
        self.stroke_scaled = false;
    }
}

/// Arena entry: a group produces a shapeless node, a drawable element
/// a node with a shape. Parent links index into the same arena.
#[derive(Debug)]
pub struct ShapeNode {
    pub(crate) depth: i32,
    pub(crate) parent: Option<usize>,
    pub shape: Option<Shape>,
    pub(crate) anims: Vec<AnimationSegment>,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MemCounter {
    bytes: usize,
}

impl MemCounter {
    pub fn add(&mut self, bytes: usize) {
        self.bytes = self.bytes.saturating_add(bytes);
    }

    pub fn total(self) -> usize {
        self.bytes
    }
}

pub struct Document {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) view_minx: f32,
    pub(crate) view_miny: f32,
    pub(crate) view_width: f32,
    pub(crate) view_height: f32,
    pub(crate) align_x: Align,
    pub(crate) align_y: Align,
    pub(crate) align_type: AlignType,
    pub(crate) units: Units,
    pub(crate) dpi: f32,
    pub(crate) font_size: f32,
    pub(crate) nodes: Vec<ShapeNode>,
    pub(crate) mem: MemCounter,
}

impl Document {
    /// Parses an SVG document. Malformed content degrades to skipped
    /// elements; this never fails outright.
    pub fn parse(source: &str, units: &str, dpi: f32) -> Document {
        parser::parse_document(source, units, dpi)
    }

    pub fn parse_file(
        path: impl AsRef<std::path::Path>,
        units: &str,
        dpi: f32,
    ) -> Result<Document, SvgError> {
        let source = std::fs::read_to_string(path)?;
        Ok(Document::parse(&source, units, dpi))
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn is_animated(&self) -> bool {
        self.nodes.iter().any(|node| !node.anims.is_empty())
    }

    /// Re-evaluates all animations at `time_ms` and re-normalizes the
    /// document. Returns true when the document carries animations.
    pub fn update(&mut self, time_ms: i64) -> bool {
        anim::animate(self, time_ms)
    }

    /// Bytes attributed to the parsed document model.
    pub fn memory_size(&self) -> usize {
        self.mem.total()
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.nodes.iter().filter_map(|node| node.shape.as_ref())
    }

    /// Resolves a coordinate against the document's dpi and font size.
    /// Percentages resolve against `orig + value/100 * length`.
    pub(crate) fn convert_to_pixels(&self, c: Coordinate, orig: f32, length: f32) -> f32 {
        match c.units {
            Units::User | Units::Px => c.value,
            Units::Pt => c.value / 72.0 * self.dpi,
            Units::Pc => c.value / 6.0 * self.dpi,
            Units::Mm => c.value / 25.4 * self.dpi,
            Units::Cm => c.value / 2.54 * self.dpi,
            Units::In => c.value * self.dpi,
            Units::Em => c.value * self.font_size,
            Units::Ex => c.value * self.font_size * 0.52,
            Units::Percent => orig + c.value / 100.0 * length,
        }
    }
}
