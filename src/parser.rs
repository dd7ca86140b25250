//! Element and attribute parsing: the style frame stack, path grammar,
//! basic shapes, and document assembly. The tokenizer in `xml` drives
//! this module through the `XmlSink` trait; resolution passes
//! (`gradient`, `viewbox`) run once the tree has been consumed.

use libm::{acosf, cosf, fabsf, sinf, sqrtf};

use crate::anim;
use crate::color::{self, Color};
use crate::gradient::{self, GradientCoords, GradientData, GradientUnits};
use crate::model::{
    Align, AlignType, Coordinate, Document, FillRule, GradientStop, LineCap, LineJoin, MAX_DASHES,
    MemCounter, Paint, Path, Shape, ShapeNode, ShapeStyle, SpreadMode, Units,
};
use crate::scan;
use crate::viewbox;
use crate::xform::{Bounds, PI, Point, Transform};
use crate::xml::{self, XmlSink};

const KAPPA90: f32 = 0.552_284_75; // quarter-circle cubic handle length
const MAX_ID: usize = 63;
const MAX_TRANSFORM_ARGS: usize = 6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum PaintFlag {
    #[default]
    None,
    Color,
    Gradient,
}

/// One level of inherited presentation state. Pushed per element,
/// popped when it ends; frames recycle through a free pool.
#[derive(Clone, Debug)]
pub(crate) struct StyleFrame {
    pub id: String,
    pub xform: Transform,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub opacity: f32,
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
    pub fill_gradient: String,
    pub stroke_gradient: String,
    pub stroke_width: f32,
    pub stroke_dash_offset: f32,
    pub stroke_dash_array: [f32; MAX_DASHES],
    pub stroke_dash_count: usize,
    pub stroke_line_join: LineJoin,
    pub stroke_line_cap: LineCap,
    pub miter_limit: f32,
    pub fill_rule: FillRule,
    pub font_size: f32,
    pub stop_color: Color,
    pub stop_opacity: f32,
    pub stop_offset: f32,
    pub fill_flag: PaintFlag,
    pub stroke_flag: PaintFlag,
    pub visible: bool,
}

impl Default for StyleFrame {
    fn default() -> Self {
        StyleFrame {
            id: String::new(),
            xform: Transform::identity(),
            fill_color: Color::rgb(0, 0, 0),
            stroke_color: Color::rgb(0, 0, 0),
            opacity: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            fill_gradient: String::new(),
            stroke_gradient: String::new(),
            stroke_width: 1.0,
            stroke_dash_offset: 0.0,
            stroke_dash_array: [0.0; MAX_DASHES],
            stroke_dash_count: 0,
            stroke_line_join: LineJoin::Miter,
            stroke_line_cap: LineCap::Butt,
            miter_limit: 4.0,
            fill_rule: FillRule::NonZero,
            font_size: 0.0,
            stop_color: Color(0),
            stop_opacity: 1.0,
            stop_offset: 0.0,
            fill_flag: PaintFlag::Color,
            stroke_flag: PaintFlag::None,
            visible: true,
        }
    }
}

pub(crate) struct Parser {
    pub(crate) doc: Document,
    frames: Vec<StyleFrame>,
    pool: Vec<StyleFrame>,
    /// Points of the subpath currently being built.
    pts: Vec<Point>,
    /// Committed subpaths awaiting the enclosing shape.
    paths: Vec<Path>,
    pub(crate) gradients: Vec<GradientData>,
    path_flag: bool,
    defs_flag: bool,
    pub(crate) shape_depth: i32,
}

pub(crate) fn parse_document(source: &str, units: &str, dpi: f32) -> Document {
    let mut parser = Parser::new(units, dpi);
    xml::parse_xml(source, &mut parser);
    parser.finish()
}

impl Parser {
    fn new(units: &str, dpi: f32) -> Self {
        Parser {
            doc: Document {
                width: 0.0,
                height: 0.0,
                view_minx: 0.0,
                view_miny: 0.0,
                view_width: 0.0,
                view_height: 0.0,
                align_x: Align::Min,
                align_y: Align::Min,
                align_type: AlignType::None,
                units: parse_units(units),
                dpi,
                font_size: 0.0,
                nodes: Vec::new(),
                mem: MemCounter::default(),
            },
            frames: vec![StyleFrame::default()],
            pool: Vec::new(),
            pts: Vec::new(),
            paths: Vec::new(),
            gradients: Vec::new(),
            path_flag: false,
            defs_flag: false,
            shape_depth: 0,
        }
    }

    fn finish(mut self) -> Document {
        let gradients = std::mem::take(&mut self.gradients);
        let mut doc = self.doc;
        gradient::resolve_gradients(&mut doc, &gradients);
        find_shape_parents(&mut doc);
        viewbox::scale_to_viewbox(&mut doc);
        doc
    }

    fn attr(&self) -> &StyleFrame {
        &self.frames[self.frames.len() - 1]
    }

    fn attr_mut(&mut self) -> &mut StyleFrame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn push_frame(&mut self) {
        let top = self.frames.len() - 1;
        let mut frame = match self.pool.pop() {
            Some(mut recycled) => {
                recycled.clone_from(&self.frames[top]);
                recycled
            }
            None => self.frames[top].clone(),
        };
        // Gradient references inherit, element ids do not.
        frame.id.clear();
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                self.pool.push(frame);
            }
        }
    }

    // Reference frame for percentage coordinates.

    fn actual_orig_x(&self) -> f32 {
        self.doc.view_minx
    }

    fn actual_orig_y(&self) -> f32 {
        self.doc.view_miny
    }

    fn actual_width(&self) -> f32 {
        self.doc.view_width
    }

    fn actual_height(&self) -> f32 {
        self.doc.view_height
    }

    pub(crate) fn actual_length(&self) -> f32 {
        let w = self.actual_width();
        let h = self.actual_height();
        sqrtf(w * w + h * h) / sqrtf(2.0)
    }

    pub(crate) fn parse_coordinate(&self, value: &str, orig: f32, length: f32) -> f32 {
        let coord = parse_coordinate_raw(value);
        self.doc.convert_to_pixels(coord, orig, length)
    }

    // ---- attribute resolution ----

    fn parse_attr(&mut self, name: &str, value: &str) -> bool {
        match name {
            "style" => {
                self.parse_style(value);
            }
            "display" => {
                if value == "none" {
                    self.attr_mut().visible = false;
                }
                // display:inline does not resurrect an invisible group
            }
            "fill" => {
                if value == "none" || value == "transparent" {
                    self.attr_mut().fill_flag = PaintFlag::None;
                } else if value.starts_with("url(") {
                    let url = parse_url(value);
                    let attr = self.attr_mut();
                    attr.fill_flag = PaintFlag::Gradient;
                    attr.fill_gradient = url;
                } else {
                    let c = color::parse_color(value);
                    let attr = self.attr_mut();
                    attr.fill_flag = PaintFlag::Color;
                    attr.fill_color = c;
                }
            }
            "opacity" => {
                self.attr_mut().opacity = parse_opacity(value);
            }
            "fill-opacity" => {
                self.attr_mut().fill_opacity = parse_opacity(value);
            }
            "stroke" => {
                if value == "none" {
                    self.attr_mut().stroke_flag = PaintFlag::None;
                } else if value.starts_with("url(") {
                    let url = parse_url(value);
                    let attr = self.attr_mut();
                    attr.stroke_flag = PaintFlag::Gradient;
                    attr.stroke_gradient = url;
                } else {
                    let c = color::parse_color(value);
                    let attr = self.attr_mut();
                    attr.stroke_flag = PaintFlag::Color;
                    attr.stroke_color = c;
                }
            }
            "stroke-width" => {
                let w = self.parse_coordinate(value, 0.0, self.actual_length());
                self.attr_mut().stroke_width = w;
            }
            "stroke-dasharray" => {
                let (dashes, count) = self.parse_dasharray(value);
                let attr = self.attr_mut();
                attr.stroke_dash_array = dashes;
                attr.stroke_dash_count = count;
            }
            "stroke-dashoffset" => {
                let off = self.parse_coordinate(value, 0.0, self.actual_length());
                self.attr_mut().stroke_dash_offset = off;
            }
            "stroke-opacity" => {
                self.attr_mut().stroke_opacity = parse_opacity(value);
            }
            "stroke-linecap" => {
                self.attr_mut().stroke_line_cap = parse_line_cap(value);
            }
            "stroke-linejoin" => {
                self.attr_mut().stroke_line_join = parse_line_join(value);
            }
            "stroke-miterlimit" => {
                self.attr_mut().miter_limit = parse_miter_limit(value);
            }
            "fill-rule" => {
                self.attr_mut().fill_rule = parse_fill_rule(value);
            }
            "font-size" => {
                let size = self.parse_coordinate(value, 0.0, self.actual_length());
                self.attr_mut().font_size = size;
            }
            "transform" => {
                let m = parse_transform(value);
                let attr = self.attr_mut();
                attr.xform = m.then(attr.xform);
            }
            "stop-color" => {
                self.attr_mut().stop_color = color::parse_color(value);
            }
            "stop-opacity" => {
                self.attr_mut().stop_opacity = parse_opacity(value);
            }
            "offset" => {
                let off = self.parse_coordinate(value, 0.0, 1.0);
                self.attr_mut().stop_offset = off;
            }
            "id" => {
                let id = truncate_id(value).to_string();
                self.attr_mut().id = id;
            }
            _ => return false,
        }
        true
    }

    fn parse_style(&mut self, style: &str) {
        for decl in style.split(';') {
            let Some(colon) = decl.find(':') else {
                continue;
            };
            let name = decl[..colon].trim();
            let value = decl[colon + 1..].trim();
            if !name.is_empty() && !value.is_empty() {
                self.parse_attr(name, value);
            }
        }
    }

    fn parse_attribs(&mut self, attrs: &[(&str, &str)]) {
        for &(name, value) in attrs {
            if name == "style" {
                self.parse_style(value);
            } else {
                self.parse_attr(name, value);
            }
        }
    }

    pub(crate) fn parse_dasharray(&self, value: &str) -> ([f32; MAX_DASHES], usize) {
        let mut dashes = [0.0f32; MAX_DASHES];
        if value.starts_with('n') {
            // "none"
            return (dashes, 0);
        }
        let mut count = 0usize;
        let mut rest = value;
        loop {
            let (item, r) = scan::next_dash_item(rest);
            if item.is_empty() {
                break;
            }
            rest = r;
            if count < MAX_DASHES {
                dashes[count] = fabsf(self.parse_coordinate(item, 0.0, self.actual_length()));
                count += 1;
            }
        }
        let sum: f32 = dashes.iter().take(count).sum();
        if sum <= 1e-6 {
            count = 0;
        }
        (dashes, count)
    }

    // ---- path assembly ----

    fn reset_path(&mut self) {
        self.pts.clear();
    }

    fn add_point(&mut self, x: f32, y: f32) {
        self.pts.push(Point::new(x, y));
    }

    /// A moveto with points already queued replaces the last point;
    /// consecutive movetos collapse instead of breaking the 3n+1 shape.
    fn move_to(&mut self, x: f32, y: f32) {
        if let Some(last) = self.pts.last_mut() {
            *last = Point::new(x, y);
        } else {
            self.add_point(x, y);
        }
    }

    /// Lines are stored as degenerate cubics (handles at 1/3 and 2/3).
    fn line_to(&mut self, x: f32, y: f32) {
        if let Some(&last) = self.pts.last() {
            let dx = x - last.x;
            let dy = y - last.y;
            self.add_point(last.x + dx / 3.0, last.y + dy / 3.0);
            self.add_point(x - dx / 3.0, y - dy / 3.0);
            self.add_point(x, y);
        }
    }

    fn cubic_bez_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if !self.pts.is_empty() {
            self.add_point(x1, y1);
            self.add_point(x2, y2);
            self.add_point(x, y);
        }
    }

    fn add_path(&mut self, closed: bool) {
        if self.pts.len() < 4 {
            return;
        }
        if closed {
            let first = self.pts[0];
            self.line_to(first.x, first.y);
        }
        // Expect 1 + 3n points.
        if self.pts.len() % 3 != 1 {
            return;
        }
        let xform = self.attr().xform;
        let mut path = Path {
            pts: Vec::new(),
            closed,
            bounds: Bounds::ZERO,
            xform,
            scaled: false,
            base_pts: self.pts.clone(),
            base_xform: xform,
        };
        path.retransform();
        self.doc.mem.add(
            std::mem::size_of::<Path>() + 2 * path.base_pts.len() * std::mem::size_of::<Point>(),
        );
        self.paths.push(path);
    }

    fn add_shape(&mut self) {
        if self.paths.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.paths);
        let attr = self.attr_mut();
        let id = std::mem::take(&mut attr.id);
        let fill_gradient = std::mem::take(&mut attr.fill_gradient);
        let stroke_gradient = std::mem::take(&mut attr.stroke_gradient);

        let fill = match attr.fill_flag {
            PaintFlag::None => Paint::None,
            PaintFlag::Color => Paint::Color(
                attr.fill_color
                    .with_alpha((attr.fill_opacity * 255.0) as u8),
            ),
            PaintFlag::Gradient => Paint::Ref(fill_gradient),
        };
        let stroke = match attr.stroke_flag {
            PaintFlag::None => Paint::None,
            PaintFlag::Color => Paint::Color(
                attr.stroke_color
                    .with_alpha((attr.stroke_opacity * 255.0) as u8),
            ),
            PaintFlag::Gradient => Paint::Ref(stroke_gradient),
        };

        let mut shape = Shape {
            id,
            fill,
            stroke,
            opacity: attr.opacity,
            stroke_width: attr.stroke_width,
            stroke_dash_offset: attr.stroke_dash_offset,
            stroke_dash_array: attr.stroke_dash_array,
            stroke_dash_count: attr.stroke_dash_count,
            stroke_line_join: attr.stroke_line_join,
            stroke_line_cap: attr.stroke_line_cap,
            miter_limit: attr.miter_limit,
            fill_rule: attr.fill_rule,
            visible: attr.visible,
            bounds: Bounds::ZERO,
            xform: attr.xform,
            stroke_scaled: false,
            baseline: ShapeStyle {
                opacity: 0.0,
                xform: Transform::identity(),
                fill: Paint::None,
                stroke: Paint::None,
                stroke_width: 0.0,
                stroke_dash_offset: 0.0,
                stroke_dash_array: [0.0; MAX_DASHES],
                stroke_dash_count: 0,
            },
            paths,
        };
        shape.scale_stroke();
        shape.update_bounds();
        shape.baseline = ShapeStyle {
            opacity: shape.opacity,
            xform: shape.xform,
            fill: shape.fill.clone(),
            stroke: shape.stroke.clone(),
            stroke_width: shape.stroke_width,
            stroke_dash_offset: shape.stroke_dash_offset,
            stroke_dash_array: shape.stroke_dash_array,
            stroke_dash_count: shape.stroke_dash_count,
        };

        self.doc.mem.add(
            std::mem::size_of::<Shape>() + std::mem::size_of::<ShapeNode>() + shape.id.len(),
        );
        self.doc.nodes.push(ShapeNode {
            depth: self.shape_depth,
            parent: None,
            shape: Some(shape),
            anims: Vec::new(),
        });
    }

    // ---- path grammar ----

    fn parse_path(&mut self, attrs: &[(&str, &str)]) {
        let mut d: Option<&str> = None;
        for &(name, value) in attrs {
            if name == "d" {
                d = Some(value);
            } else {
                self.parse_attribs(&[(name, value)]);
            }
        }

        if let Some(d) = d {
            self.reset_path();
            let mut cpx = 0.0f32;
            let mut cpy = 0.0f32;
            let mut cpx2 = 0.0f32;
            let mut cpy2 = 0.0f32;
            let mut closed_flag = false;
            let mut init_point = false;
            let mut cmd = 0u8;
            let mut args = [0.0f32; 10];
            let mut nargs = 0usize;
            let mut rargs = 0i32;
            let mut rest = d;

            loop {
                let mut item;
                if (cmd == b'A' || cmd == b'a') && (nargs == 3 || nargs == 4) {
                    let (flag, r) = scan::next_arc_flag(rest);
                    item = flag;
                    if !item.is_empty() {
                        rest = r;
                    }
                } else {
                    item = "";
                }
                if item.is_empty() {
                    let (token, r) = scan::next_path_item(rest);
                    item = token;
                    rest = r;
                }
                if item.is_empty() {
                    break;
                }

                if cmd != 0 && scan::is_coordinate(item) {
                    if nargs < 10 {
                        args[nargs] = scan::atof32(item);
                        nargs += 1;
                    }
                    if nargs as i32 >= rargs {
                        match cmd {
                            b'm' | b'M' => {
                                let rel = cmd == b'm';
                                if rel {
                                    cpx += args[0];
                                    cpy += args[1];
                                } else {
                                    cpx = args[0];
                                    cpy = args[1];
                                }
                                self.move_to(cpx, cpy);
                                // subsequent pairs are implicit linetos
                                cmd = if rel { b'l' } else { b'L' };
                                rargs = args_per_element(cmd);
                                cpx2 = cpx;
                                cpy2 = cpy;
                                init_point = true;
                            }
                            b'l' | b'L' => {
                                if cmd == b'l' {
                                    cpx += args[0];
                                    cpy += args[1];
                                } else {
                                    cpx = args[0];
                                    cpy = args[1];
                                }
                                self.line_to(cpx, cpy);
                                cpx2 = cpx;
                                cpy2 = cpy;
                            }
                            b'h' | b'H' => {
                                if cmd == b'h' {
                                    cpx += args[0];
                                } else {
                                    cpx = args[0];
                                }
                                self.line_to(cpx, cpy);
                                cpx2 = cpx;
                                cpy2 = cpy;
                            }
                            b'v' | b'V' => {
                                if cmd == b'v' {
                                    cpy += args[0];
                                } else {
                                    cpy = args[0];
                                }
                                self.line_to(cpx, cpy);
                                cpx2 = cpx;
                                cpy2 = cpy;
                            }
                            b'c' | b'C' => {
                                self.path_cubic_bez_to(
                                    &mut cpx, &mut cpy, &mut cpx2, &mut cpy2, &args,
                                    cmd == b'c',
                                );
                            }
                            b's' | b'S' => {
                                self.path_cubic_bez_short_to(
                                    &mut cpx, &mut cpy, &mut cpx2, &mut cpy2, &args,
                                    cmd == b's',
                                );
                            }
                            b'q' | b'Q' => {
                                self.path_quad_bez_to(
                                    &mut cpx, &mut cpy, &mut cpx2, &mut cpy2, &args,
                                    cmd == b'q',
                                );
                            }
                            b't' | b'T' => {
                                self.path_quad_bez_short_to(
                                    &mut cpx, &mut cpy, &mut cpx2, &mut cpy2, &args,
                                    cmd == b't',
                                );
                            }
                            b'a' | b'A' => {
                                self.path_arc_to(&mut cpx, &mut cpy, &args, cmd == b'a');
                                cpx2 = cpx;
                                cpy2 = cpy;
                            }
                            _ => {
                                if nargs >= 2 {
                                    cpx = args[nargs - 2];
                                    cpy = args[nargs - 1];
                                    cpx2 = cpx;
                                    cpy2 = cpy;
                                }
                            }
                        }
                        nargs = 0;
                    }
                } else {
                    cmd = item.as_bytes()[0];
                    if cmd == b'M' || cmd == b'm' {
                        // commit pending subpath
                        if !self.pts.is_empty() {
                            self.add_path(closed_flag);
                        }
                        self.reset_path();
                        closed_flag = false;
                        nargs = 0;
                    } else if !init_point {
                        // no commands allowed before the initial moveto
                        cmd = 0;
                    }
                    if cmd == b'Z' || cmd == b'z' {
                        closed_flag = true;
                        if !self.pts.is_empty() {
                            cpx = self.pts[0].x;
                            cpy = self.pts[0].y;
                            cpx2 = cpx;
                            cpy2 = cpy;
                            self.add_path(closed_flag);
                        }
                        self.reset_path();
                        self.move_to(cpx, cpy);
                        closed_flag = false;
                        nargs = 0;
                    }
                    rargs = args_per_element(cmd);
                    if rargs == -1 {
                        cmd = 0;
                        rargs = 0;
                    }
                }
            }
            if !self.pts.is_empty() {
                self.add_path(closed_flag);
            }
        }
        self.add_shape();
    }

    fn path_cubic_bez_to(
        &mut self,
        cpx: &mut f32,
        cpy: &mut f32,
        cpx2: &mut f32,
        cpy2: &mut f32,
        args: &[f32; 10],
        rel: bool,
    ) {
        let (x1, y1, x2, y2, x, y) = if rel {
            (
                *cpx + args[0],
                *cpy + args[1],
                *cpx + args[2],
                *cpy + args[3],
                *cpx + args[4],
                *cpy + args[5],
            )
        } else {
            (args[0], args[1], args[2], args[3], args[4], args[5])
        };
        self.cubic_bez_to(x1, y1, x2, y2, x, y);
        *cpx2 = x2;
        *cpy2 = y2;
        *cpx = x;
        *cpy = y;
    }

    fn path_cubic_bez_short_to(
        &mut self,
        cpx: &mut f32,
        cpy: &mut f32,
        cpx2: &mut f32,
        cpy2: &mut f32,
        args: &[f32; 10],
        rel: bool,
    ) {
        let x1 = 2.0 * *cpx - *cpx2;
        let y1 = 2.0 * *cpy - *cpy2;
        let (x2, y2, x, y) = if rel {
            (
                *cpx + args[0],
                *cpy + args[1],
                *cpx + args[2],
                *cpy + args[3],
            )
        } else {
            (args[0], args[1], args[2], args[3])
        };
        self.cubic_bez_to(x1, y1, x2, y2, x, y);
        *cpx2 = x2;
        *cpy2 = y2;
        *cpx = x;
        *cpy = y;
    }

    fn path_quad_bez_to(
        &mut self,
        cpx: &mut f32,
        cpy: &mut f32,
        cpx2: &mut f32,
        cpy2: &mut f32,
        args: &[f32; 10],
        rel: bool,
    ) {
        let (cx, cy, x, y) = if rel {
            (
                *cpx + args[0],
                *cpy + args[1],
                *cpx + args[2],
                *cpy + args[3],
            )
        } else {
            (args[0], args[1], args[2], args[3])
        };
        // quadratic lifted to cubic
        let x1 = *cpx + 2.0 / 3.0 * (cx - *cpx);
        let y1 = *cpy + 2.0 / 3.0 * (cy - *cpy);
        let x2 = x + 2.0 / 3.0 * (cx - x);
        let y2 = y + 2.0 / 3.0 * (cy - y);
        self.cubic_bez_to(x1, y1, x2, y2, x, y);
        *cpx2 = cx;
        *cpy2 = cy;
        *cpx = x;
        *cpy = y;
    }

    fn path_quad_bez_short_to(
        &mut self,
        cpx: &mut f32,
        cpy: &mut f32,
        cpx2: &mut f32,
        cpy2: &mut f32,
        args: &[f32; 10],
        rel: bool,
    ) {
        let cx = 2.0 * *cpx - *cpx2;
        let cy = 2.0 * *cpy - *cpy2;
        let (x, y) = if rel {
            (*cpx + args[0], *cpy + args[1])
        } else {
            (args[0], args[1])
        };
        let x1 = *cpx + 2.0 / 3.0 * (cx - *cpx);
        let y1 = *cpy + 2.0 / 3.0 * (cy - *cpy);
        let x2 = x + 2.0 / 3.0 * (cx - x);
        let y2 = y + 2.0 / 3.0 * (cy - y);
        self.cubic_bez_to(x1, y1, x2, y2, x, y);
        *cpx2 = cx;
        *cpy2 = cy;
        *cpx = x;
        *cpy = y;
    }

    fn path_arc_to(&mut self, cpx: &mut f32, cpy: &mut f32, args: &[f32; 10], rel: bool) {
        let mut rx = fabsf(args[0]);
        let mut ry = fabsf(args[1]);
        let rotx = args[2] / 180.0 * PI;
        let fa = fabsf(args[3]) > 1e-6;
        let fs = fabsf(args[4]) > 1e-6;
        let x1 = *cpx;
        let y1 = *cpy;
        let (x2, y2) = if rel {
            (*cpx + args[5], *cpy + args[6])
        } else {
            (args[5], args[6])
        };

        let mut dx = x1 - x2;
        let mut dy = y1 - y2;
        let mut d = sqrtf(dx * dx + dy * dy);
        if d < 1e-6 || rx < 1e-6 || ry < 1e-6 {
            // degenerate arc draws a straight line
            self.line_to(x2, y2);
            *cpx = x2;
            *cpy = y2;
            return;
        }

        let sinrx = sinf(rotx);
        let cosrx = cosf(rotx);

        // center point parameterization (W3C implementation notes F.6.5)
        let x1p = cosrx * dx / 2.0 + sinrx * dy / 2.0;
        let y1p = -sinrx * dx / 2.0 + cosrx * dy / 2.0;
        d = sqr(x1p) / sqr(rx) + sqr(y1p) / sqr(ry);
        if d > 1.0 {
            d = sqrtf(d);
            rx *= d;
            ry *= d;
        }
        let mut s = 0.0f32;
        let mut sa = sqr(rx) * sqr(ry) - sqr(rx) * sqr(y1p) - sqr(ry) * sqr(x1p);
        let sb = sqr(rx) * sqr(y1p) + sqr(ry) * sqr(x1p);
        if sa < 0.0 {
            sa = 0.0;
        }
        if sb > 0.0 {
            s = sqrtf(sa / sb);
        }
        if fa == fs {
            s = -s;
        }
        let cxp = s * rx * y1p / ry;
        let cyp = s * -ry * x1p / rx;
        let cx = (x1 + x2) / 2.0 + cosrx * cxp - sinrx * cyp;
        let cy = (y1 + y2) / 2.0 + sinrx * cxp + cosrx * cyp;

        let ux = (x1p - cxp) / rx;
        let uy = (y1p - cyp) / ry;
        let vx = (-x1p - cxp) / rx;
        let vy = (-y1p - cyp) / ry;
        let a1 = vec_angle(1.0, 0.0, ux, uy);
        let mut da = vec_angle(ux, uy, vx, vy);
        if !fs && da > 0.0 {
            da -= 2.0 * PI;
        } else if fs && da < 0.0 {
            da += 2.0 * PI;
        }

        let t = Transform {
            a: cosrx,
            b: sinrx,
            c: -sinrx,
            d: cosrx,
            e: cx,
            f: cy,
        };

        // split into quarter-turn (or smaller) cubic segments
        let ndivs = (fabsf(da) / (PI * 0.5) + 1.0) as i32;
        let mut hda = (da / ndivs as f32) / 2.0;
        if fabsf(hda) < 1e-3 {
            hda *= 0.5;
        } else {
            hda = (1.0 - cosf(hda)) / sinf(hda);
        }
        let mut kappa = fabsf(4.0 / 3.0 * hda);
        if da < 0.0 {
            kappa = -kappa;
        }

        let mut px = 0.0f32;
        let mut py = 0.0f32;
        let mut ptanx = 0.0f32;
        let mut ptany = 0.0f32;
        for i in 0..=ndivs {
            let a = a1 + da * (i as f32 / ndivs as f32);
            dx = cosf(a);
            dy = sinf(a);
            let p = t.apply(Point::new(dx * rx, dy * ry));
            let tan = t.apply_vec(Point::new(-dy * rx * kappa, dx * ry * kappa));
            if i > 0 {
                self.cubic_bez_to(px + ptanx, py + ptany, p.x - tan.x, p.y - tan.y, p.x, p.y);
            }
            px = p.x;
            py = p.y;
            ptanx = tan.x;
            ptany = tan.y;
        }

        *cpx = x2;
        *cpy = y2;
    }

    // ---- basic shapes ----

    fn parse_rect(&mut self, attrs: &[(&str, &str)]) {
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        let mut w = 0.0f32;
        let mut h = 0.0f32;
        let mut rx = -1.0f32;
        let mut ry = -1.0f32;

        for &(name, value) in attrs {
            if !self.parse_attr(name, value) {
                match name {
                    "x" => x = self.parse_coordinate(value, self.actual_orig_x(), self.actual_width()),
                    "y" => y = self.parse_coordinate(value, self.actual_orig_y(), self.actual_height()),
                    "width" => w = self.parse_coordinate(value, 0.0, self.actual_width()),
                    "height" => h = self.parse_coordinate(value, 0.0, self.actual_height()),
                    "rx" => rx = fabsf(self.parse_coordinate(value, 0.0, self.actual_width())),
                    "ry" => ry = fabsf(self.parse_coordinate(value, 0.0, self.actual_height())),
                    _ => {}
                }
            }
        }

        if rx < 0.0 && ry > 0.0 {
            rx = ry;
        }
        if ry < 0.0 && rx > 0.0 {
            ry = rx;
        }
        if rx < 0.0 {
            rx = 0.0;
        }
        if ry < 0.0 {
            ry = 0.0;
        }
        if rx > w / 2.0 {
            rx = w / 2.0;
        }
        if ry > h / 2.0 {
            ry = h / 2.0;
        }

        if w != 0.0 && h != 0.0 {
            self.reset_path();
            if rx < 0.00001 || ry < 0.0001 {
                self.move_to(x, y);
                self.line_to(x + w, y);
                self.line_to(x + w, y + h);
                self.line_to(x, y + h);
            } else {
                self.move_to(x + rx, y);
                self.line_to(x + w - rx, y);
                self.cubic_bez_to(
                    x + w - rx * (1.0 - KAPPA90),
                    y,
                    x + w,
                    y + ry * (1.0 - KAPPA90),
                    x + w,
                    y + ry,
                );
                self.line_to(x + w, y + h - ry);
                self.cubic_bez_to(
                    x + w,
                    y + h - ry * (1.0 - KAPPA90),
                    x + w - rx * (1.0 - KAPPA90),
                    y + h,
                    x + w - rx,
                    y + h,
                );
                self.line_to(x + rx, y + h);
                self.cubic_bez_to(
                    x + rx * (1.0 - KAPPA90),
                    y + h,
                    x,
                    y + h - ry * (1.0 - KAPPA90),
                    x,
                    y + h - ry,
                );
                self.line_to(x, y + ry);
                self.cubic_bez_to(
                    x,
                    y + ry * (1.0 - KAPPA90),
                    x + rx * (1.0 - KAPPA90),
                    y,
                    x + rx,
                    y,
                );
            }
            self.add_path(true);
            self.add_shape();
        }
    }

    fn parse_circle(&mut self, attrs: &[(&str, &str)]) {
        let mut cx = 0.0f32;
        let mut cy = 0.0f32;
        let mut r = 0.0f32;

        for &(name, value) in attrs {
            if !self.parse_attr(name, value) {
                match name {
                    "cx" => cx = self.parse_coordinate(value, self.actual_orig_x(), self.actual_width()),
                    "cy" => cy = self.parse_coordinate(value, self.actual_orig_y(), self.actual_height()),
                    "r" => r = fabsf(self.parse_coordinate(value, 0.0, self.actual_length())),
                    _ => {}
                }
            }
        }

        if r > 0.0 {
            self.reset_path();
            self.move_to(cx + r, cy);
            self.cubic_bez_to(cx + r, cy + r * KAPPA90, cx + r * KAPPA90, cy + r, cx, cy + r);
            self.cubic_bez_to(cx - r * KAPPA90, cy + r, cx - r, cy + r * KAPPA90, cx - r, cy);
            self.cubic_bez_to(cx - r, cy - r * KAPPA90, cx - r * KAPPA90, cy - r, cx, cy - r);
            self.cubic_bez_to(cx + r * KAPPA90, cy - r, cx + r, cy - r * KAPPA90, cx + r, cy);
            self.add_path(true);
            self.add_shape();
        }
    }

    fn parse_ellipse(&mut self, attrs: &[(&str, &str)]) {
        let mut cx = 0.0f32;
        let mut cy = 0.0f32;
        let mut rx = 0.0f32;
        let mut ry = 0.0f32;

        for &(name, value) in attrs {
            if !self.parse_attr(name, value) {
                match name {
                    "cx" => cx = self.parse_coordinate(value, self.actual_orig_x(), self.actual_width()),
                    "cy" => cy = self.parse_coordinate(value, self.actual_orig_y(), self.actual_height()),
                    "rx" => rx = fabsf(self.parse_coordinate(value, 0.0, self.actual_width())),
                    "ry" => ry = fabsf(self.parse_coordinate(value, 0.0, self.actual_height())),
                    _ => {}
                }
            }
        }

        if rx > 0.0 && ry > 0.0 {
            self.reset_path();
            self.move_to(cx + rx, cy);
            self.cubic_bez_to(cx + rx, cy + ry * KAPPA90, cx + rx * KAPPA90, cy + ry, cx, cy + ry);
            self.cubic_bez_to(cx - rx * KAPPA90, cy + ry, cx - rx, cy + ry * KAPPA90, cx - rx, cy);
            self.cubic_bez_to(cx - rx, cy - ry * KAPPA90, cx - rx * KAPPA90, cy - ry, cx, cy - ry);
            self.cubic_bez_to(cx + rx * KAPPA90, cy - ry, cx + rx, cy - ry * KAPPA90, cx + rx, cy);
            self.add_path(true);
            self.add_shape();
        }
    }

    fn parse_line(&mut self, attrs: &[(&str, &str)]) {
        let mut x1 = 0.0f32;
        let mut y1 = 0.0f32;
        let mut x2 = 0.0f32;
        let mut y2 = 0.0f32;

        for &(name, value) in attrs {
            if !self.parse_attr(name, value) {
                match name {
                    "x1" => x1 = self.parse_coordinate(value, self.actual_orig_x(), self.actual_width()),
                    "y1" => y1 = self.parse_coordinate(value, self.actual_orig_y(), self.actual_height()),
                    "x2" => x2 = self.parse_coordinate(value, self.actual_orig_x(), self.actual_width()),
                    "y2" => y2 = self.parse_coordinate(value, self.actual_orig_y(), self.actual_height()),
                    _ => {}
                }
            }
        }

        self.reset_path();
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.add_path(false);
        self.add_shape();
    }

    fn parse_poly(&mut self, attrs: &[(&str, &str)], close: bool) {
        self.reset_path();
        for &(name, value) in attrs {
            if !self.parse_attr(name, value) && name == "points" {
                let mut rest = value;
                let mut args = [0.0f32; 2];
                let mut nargs = 0usize;
                let mut npts = 0usize;
                loop {
                    let (item, r) = scan::next_path_item(rest);
                    if item.is_empty() {
                        break;
                    }
                    rest = r;
                    args[nargs] = scan::atof32(item);
                    nargs += 1;
                    if nargs >= 2 {
                        if npts == 0 {
                            self.move_to(args[0], args[1]);
                        } else {
                            self.line_to(args[0], args[1]);
                        }
                        nargs = 0;
                        npts += 1;
                    }
                }
            }
        }
        self.add_path(close);
        self.add_shape();
    }

    fn parse_group(&mut self, attrs: &[(&str, &str)]) {
        self.parse_attribs(attrs);
        self.reset_path();
        self.doc.mem.add(std::mem::size_of::<ShapeNode>());
        self.doc.nodes.push(ShapeNode {
            depth: self.shape_depth,
            parent: None,
            shape: None,
            anims: Vec::new(),
        });
    }

    fn parse_svg(&mut self, attrs: &[(&str, &str)]) {
        for &(name, value) in attrs {
            if !self.parse_attr(name, value) {
                match name {
                    "width" => self.doc.width = self.parse_coordinate(value, 0.0, 0.0),
                    "height" => self.doc.height = self.parse_coordinate(value, 0.0, 0.0),
                    "viewBox" => {
                        let mut rest = value;
                        let mut values = [0.0f32; 4];
                        let mut ok = true;
                        for slot in values.iter_mut() {
                            rest = skip_view_box_seps(rest);
                            if rest.is_empty() {
                                ok = false;
                                break;
                            }
                            let (token, r) = scan::parse_number(rest);
                            if token.is_empty() {
                                ok = false;
                                break;
                            }
                            *slot = scan::atof32(token);
                            rest = r;
                        }
                        if ok {
                            self.doc.view_minx = values[0];
                            self.doc.view_miny = values[1];
                            self.doc.view_width = values[2];
                            self.doc.view_height = values[3];
                        }
                    }
                    "preserveAspectRatio" => {
                        if value.contains("none") {
                            self.doc.align_type = AlignType::None;
                        } else {
                            if value.contains("xMin") {
                                self.doc.align_x = Align::Min;
                            } else if value.contains("xMid") {
                                self.doc.align_x = Align::Mid;
                            } else if value.contains("xMax") {
                                self.doc.align_x = Align::Max;
                            }
                            if value.contains("yMin") {
                                self.doc.align_y = Align::Min;
                            } else if value.contains("yMid") {
                                self.doc.align_y = Align::Mid;
                            } else if value.contains("yMax") {
                                self.doc.align_y = Align::Max;
                            }
                            self.doc.align_type = if value.contains("slice") {
                                AlignType::Slice
                            } else {
                                AlignType::Meet
                            };
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // ---- gradient data collection ----

    fn parse_gradient(&mut self, attrs: &[(&str, &str)], radial: bool) {
        let mut data = GradientData {
            id: String::new(),
            ref_id: String::new(),
            units: GradientUnits::ObjectSpace,
            xform: Transform::identity(),
            spread: SpreadMode::Pad,
            coords: if radial {
                GradientCoords::Radial {
                    cx: Coordinate::new(50.0, Units::Percent),
                    cy: Coordinate::new(50.0, Units::Percent),
                    r: Coordinate::new(50.0, Units::Percent),
                    fx: Coordinate::new(0.0, Units::User),
                    fy: Coordinate::new(0.0, Units::User),
                }
            } else {
                GradientCoords::Linear {
                    x1: Coordinate::new(0.0, Units::Percent),
                    y1: Coordinate::new(0.0, Units::Percent),
                    x2: Coordinate::new(100.0, Units::Percent),
                    y2: Coordinate::new(0.0, Units::Percent),
                }
            },
            stops: Vec::new(),
        };

        for &(name, value) in attrs {
            if name == "id" {
                data.id = truncate_id(value).to_string();
            } else if !self.parse_attr(name, value) {
                match (name, &mut data.coords) {
                    ("gradientUnits", _) => {
                        data.units = if value == "objectBoundingBox" {
                            GradientUnits::ObjectSpace
                        } else {
                            GradientUnits::UserSpace
                        };
                    }
                    ("gradientTransform", _) => {
                        data.xform = parse_transform(value);
                    }
                    ("spreadMethod", _) => {
                        data.spread = match value {
                            "reflect" => SpreadMode::Reflect,
                            "repeat" => SpreadMode::Repeat,
                            _ => SpreadMode::Pad,
                        };
                    }
                    ("xlink:href", _) => {
                        if value.len() > 1 {
                            data.ref_id = truncate_id(&value[1..]).to_string();
                        }
                    }
                    ("cx", GradientCoords::Radial { cx, .. }) => *cx = parse_coordinate_raw(value),
                    ("cy", GradientCoords::Radial { cy, .. }) => *cy = parse_coordinate_raw(value),
                    ("r", GradientCoords::Radial { r, .. }) => *r = parse_coordinate_raw(value),
                    ("fx", GradientCoords::Radial { fx, .. }) => *fx = parse_coordinate_raw(value),
                    ("fy", GradientCoords::Radial { fy, .. }) => *fy = parse_coordinate_raw(value),
                    ("x1", GradientCoords::Linear { x1, .. }) => *x1 = parse_coordinate_raw(value),
                    ("y1", GradientCoords::Linear { y1, .. }) => *y1 = parse_coordinate_raw(value),
                    ("x2", GradientCoords::Linear { x2, .. }) => *x2 = parse_coordinate_raw(value),
                    ("y2", GradientCoords::Linear { y2, .. }) => *y2 = parse_coordinate_raw(value),
                    _ => {}
                }
            }
        }

        self.gradients.push(data);
    }

    fn parse_gradient_stop(&mut self, attrs: &[(&str, &str)]) {
        {
            let attr = self.attr_mut();
            attr.stop_offset = 0.0;
            attr.stop_color = Color(0);
            attr.stop_opacity = 1.0;
        }
        for &(name, value) in attrs {
            self.parse_attr(name, value);
        }
        let attr = &self.frames[self.frames.len() - 1];
        let stop = GradientStop {
            color: attr
                .stop_color
                .with_alpha((attr.stop_opacity * 255.0) as u8),
            offset: attr.stop_offset,
        };
        // stops attach to the most recently declared gradient, sorted
        // by offset
        if let Some(data) = self.gradients.last_mut() {
            let idx = data
                .stops
                .iter()
                .position(|s| stop.offset < s.offset)
                .unwrap_or(data.stops.len());
            data.stops.insert(idx, stop);
        }
    }
}

impl XmlSink for Parser {
    fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.shape_depth += 1;

        if self.defs_flag {
            // only gradient definitions matter inside defs
            match name {
                "linearGradient" => self.parse_gradient(attrs, false),
                "radialGradient" => self.parse_gradient(attrs, true),
                "stop" => self.parse_gradient_stop(attrs),
                _ => {}
            }
            return;
        }

        match name {
            "g" => {
                self.push_frame();
                self.parse_group(attrs);
            }
            "path" => {
                if self.path_flag {
                    // nested paths are not allowed
                    return;
                }
                self.path_flag = true;
                self.push_frame();
                self.parse_path(attrs);
                self.pop_frame();
            }
            "rect" => {
                self.push_frame();
                self.parse_rect(attrs);
                self.pop_frame();
            }
            "circle" => {
                self.push_frame();
                self.parse_circle(attrs);
                self.pop_frame();
            }
            "ellipse" => {
                self.push_frame();
                self.parse_ellipse(attrs);
                self.pop_frame();
            }
            "line" => {
                self.push_frame();
                self.parse_line(attrs);
                self.pop_frame();
            }
            "polyline" => {
                self.push_frame();
                self.parse_poly(attrs, false);
                self.pop_frame();
            }
            "polygon" => {
                self.push_frame();
                self.parse_poly(attrs, true);
                self.pop_frame();
            }
            "linearGradient" => self.parse_gradient(attrs, false),
            "radialGradient" => self.parse_gradient(attrs, true),
            "stop" => self.parse_gradient_stop(attrs),
            "defs" => self.defs_flag = true,
            "animate" | "animateTransform" => {
                self.push_frame();
                anim::parse_animate(self, name, attrs);
                self.pop_frame();
            }
            "svg" => self.parse_svg(attrs),
            _ => {}
        }
    }

    fn end_element(&mut self, name: &str) {
        match name {
            "g" => self.pop_frame(),
            "path" => self.path_flag = false,
            "defs" => self.defs_flag = false,
            _ => {}
        }
        self.shape_depth -= 1;
    }
}

fn find_shape_parents(doc: &mut Document) {
    for i in 0..doc.nodes.len() {
        let depth = doc.nodes[i].depth;
        let mut parent = None;
        for j in (0..i).rev() {
            if doc.nodes[j].depth < depth {
                parent = Some(j);
                break;
            }
        }
        doc.nodes[i].parent = parent;
    }
}

fn sqr(x: f32) -> f32 {
    x * x
}

fn vec_mag(x: f32, y: f32) -> f32 {
    sqrtf(x * x + y * y)
}

fn vec_angle(ux: f32, uy: f32, vx: f32, vy: f32) -> f32 {
    let mut r = (ux * vx + uy * vy) / (vec_mag(ux, uy) * vec_mag(vx, vy));
    r = r.clamp(-1.0, 1.0);
    let sign = if ux * vy < uy * vx { -1.0 } else { 1.0 };
    sign * acosf(r)
}

fn args_per_element(cmd: u8) -> i32 {
    match cmd {
        b'v' | b'V' | b'h' | b'H' => 1,
        b'm' | b'M' | b'l' | b'L' | b't' | b'T' => 2,
        b'q' | b'Q' | b's' | b'S' => 4,
        b'c' | b'C' => 6,
        b'a' | b'A' => 7,
        b'z' | b'Z' => 0,
        _ => -1,
    }
}

fn skip_view_box_seps(s: &str) -> &str {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && (scan::is_space(b[i]) || b[i] == b'%' || b[i] == b',') {
        i += 1;
    }
    &s[i..]
}

fn truncate_id(value: &str) -> &str {
    if value.len() <= MAX_ID {
        return value;
    }
    let mut end = MAX_ID;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub(crate) fn parse_units(s: &str) -> Units {
    let b = s.as_bytes();
    match (b.first(), b.get(1)) {
        (Some(b'p'), Some(b'x')) => Units::Px,
        (Some(b'p'), Some(b't')) => Units::Pt,
        (Some(b'p'), Some(b'c')) => Units::Pc,
        (Some(b'm'), Some(b'm')) => Units::Mm,
        (Some(b'c'), Some(b'm')) => Units::Cm,
        (Some(b'i'), Some(b'n')) => Units::In,
        (Some(b'%'), _) => Units::Percent,
        (Some(b'e'), Some(b'm')) => Units::Em,
        (Some(b'e'), Some(b'x')) => Units::Ex,
        _ => Units::User,
    }
}

pub(crate) fn parse_coordinate_raw(s: &str) -> Coordinate {
    let (token, rest) = scan::parse_number(s);
    Coordinate::new(scan::atof32(token), parse_units(rest))
}

pub(crate) fn parse_opacity(s: &str) -> f32 {
    scan::atof32(s).clamp(0.0, 1.0)
}

fn parse_miter_limit(s: &str) -> f32 {
    scan::atof32(s).max(0.0)
}

fn parse_line_cap(s: &str) -> LineCap {
    match s {
        "round" => LineCap::Round,
        "square" => LineCap::Square,
        _ => LineCap::Butt,
    }
}

fn parse_line_join(s: &str) -> LineJoin {
    match s {
        "round" => LineJoin::Round,
        "bevel" => LineJoin::Bevel,
        _ => LineJoin::Miter,
    }
}

fn parse_fill_rule(s: &str) -> FillRule {
    if s == "evenodd" {
        FillRule::EvenOdd
    } else {
        FillRule::NonZero
    }
}

fn parse_url(s: &str) -> String {
    let mut rest = s.strip_prefix("url(").unwrap_or(s);
    rest = rest.strip_prefix('#').unwrap_or(rest);
    let end = rest.find(')').unwrap_or(rest.len());
    truncate_id(&rest[..end]).to_string()
}

/// Scans numbers between parentheses (or up to `;` when the caller has
/// no parens, as in `animateTransform` values). Returns the consumed
/// byte count and the number of arguments found; a missing delimiter
/// consumes a single byte so the outer scan can resync.
pub(crate) fn parse_transform_args(
    s: &str,
    args: &mut [f32],
    has_parens: bool,
) -> (usize, usize) {
    let b = s.as_bytes();
    let (mut ptr, end) = if has_parens {
        let Some(open) = s.find('(') else {
            return (1, 0);
        };
        let Some(close) = s[open..].find(')') else {
            return (1, 0);
        };
        (open + 1, open + close)
    } else {
        (0, s.find(';').unwrap_or(s.len()))
    };

    let mut na = 0usize;
    while ptr < end {
        let c = b[ptr];
        if c == b'-' || c == b'+' || c == b'.' || c.is_ascii_digit() {
            if na >= args.len() {
                return (0, 0);
            }
            let (token, rest) = scan::parse_number(&s[ptr..end]);
            args[na] = scan::atof32(token);
            na += 1;
            ptr = end - rest.len();
        } else {
            ptr += 1;
        }
    }
    (end, na)
}

fn skip_one_char(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next();
    chars.as_str()
}

pub(crate) fn parse_transform(value: &str) -> Transform {
    let mut xform = Transform::identity();
    let mut s = value;
    while !s.is_empty() {
        let mut args = [0.0f32; MAX_TRANSFORM_ARGS];
        let (m, consumed) = if s.starts_with("matrix") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = if na == 6 {
                Transform {
                    a: args[0],
                    b: args[1],
                    c: args[2],
                    d: args[3],
                    e: args[4],
                    f: args[5],
                }
            } else {
                Transform::identity()
            };
            (m, len)
        } else if s.starts_with("translate") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = match na {
                1 => Transform::translation(args[0], 0.0),
                2 => Transform::translation(args[0], args[1]),
                _ => Transform::identity(),
            };
            (m, len)
        } else if s.starts_with("scale") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = match na {
                1 => Transform::scaling(args[0], args[0]),
                2 => Transform::scaling(args[0], args[1]),
                _ => Transform::identity(),
            };
            (m, len)
        } else if s.starts_with("rotate") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = match na {
                1 => Transform::rotation(args[0]),
                2 => Transform::rotation_about(args[0], args[1], 0.0),
                3 => Transform::rotation_about(args[0], args[1], args[2]),
                _ => Transform::identity(),
            };
            (m, len)
        } else if s.starts_with("skewX") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = if na == 1 {
                Transform::skew_x(args[0])
            } else {
                Transform::identity()
            };
            (m, len)
        } else if s.starts_with("skewY") {
            let (len, na) = parse_transform_args(s, &mut args, true);
            let m = if na == 1 {
                Transform::skew_y(args[0])
            } else {
                Transform::identity()
            };
            (m, len)
        } else {
            s = skip_one_char(s);
            continue;
        };

        if consumed == 0 {
            s = skip_one_char(s);
            continue;
        }
        s = &s[consumed.min(s.len())..];
        xform = m.then(xform);
    }
    xform
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::parse(
            &format!("<svg width=\"100\" height=\"100\" viewBox=\"0 0 100 100\">{body}</svg>"),
            "px",
            96.0,
        )
    }

    fn first_shape(d: &Document) -> &Shape {
        d.shapes().next().expect("document has a shape")
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn path_points_are_one_plus_triples() {
        let d = doc("<path d=\"M10 10 L90 10 C90 50 50 90 10 90 Q10 50 10 10 Z\"/>");
        let shape = first_shape(&d);
        for path in &shape.paths {
            assert_eq!(path.pts.len() % 3, 1);
            assert!(path.pts.len() >= 4);
        }
    }

    #[test]
    fn moveto_pairs_become_implicit_linetos() {
        let d = doc("<path d=\"M10 10 20 20 30 10\"/>");
        let shape = first_shape(&d);
        // moveto + two linetos: 1 + 3 + 3 points
        assert_eq!(shape.paths[0].pts.len(), 7);
        assert_eq!(shape.paths[0].pts[6], Point::new(30.0, 10.0));
    }

    #[test]
    fn close_starts_next_subpath_at_first_point() {
        let d = doc("<path d=\"M10 10 L20 10 L20 20 Z L30 30\"/>");
        let shape = first_shape(&d);
        assert_eq!(shape.paths.len(), 2);
        assert!(shape.paths[0].closed);
        assert!(!shape.paths[1].closed);
        // second subpath starts where the first began
        assert_eq!(shape.paths[1].pts[0], Point::new(10.0, 10.0));
    }

    #[test]
    fn commands_before_moveto_are_ignored() {
        let d = doc("<path d=\"L10 10 L20 20\"/>");
        assert_eq!(d.shapes().count(), 0);
    }

    #[test]
    fn degenerate_arc_is_a_line() {
        let d = doc("<path d=\"M0 0 A0 0 0 0 0 10 10\"/>");
        let shape = first_shape(&d);
        assert_eq!(shape.paths[0].pts.len(), 4);
        assert_eq!(shape.paths[0].pts[3], Point::new(10.0, 10.0));
    }

    #[test]
    fn arc_flags_may_be_packed() {
        let d = doc("<path d=\"M0 50 A25 25 0 1150 50\"/>");
        let shape = first_shape(&d);
        let last = shape.paths[0].pts[shape.paths[0].pts.len() - 1];
        assert!(close(last.x, 50.0));
        assert!(close(last.y, 50.0));
        assert!(shape.paths[0].pts.len() > 4);
    }

    #[test]
    fn rect_corner_radii_link_and_clamp() {
        let d = doc("<rect x=\"0\" y=\"0\" width=\"10\" height=\"10\" rx=\"40\"/>");
        let shape = first_shape(&d);
        // rx clamps to w/2, ry inherits rx; the rounded outline starts
        // at (x+rx, y)
        assert_eq!(shape.paths[0].pts[0], Point::new(5.0, 0.0));
    }

    #[test]
    fn zero_size_rect_is_dropped() {
        let d = doc("<rect x=\"0\" y=\"0\" width=\"0\" height=\"10\"/>");
        assert_eq!(d.shapes().count(), 0);
    }

    #[test]
    fn circle_outline_starts_east() {
        let d = doc("<circle cx=\"50\" cy=\"50\" r=\"10\"/>");
        let shape = first_shape(&d);
        assert_eq!(shape.paths[0].pts[0], Point::new(60.0, 50.0));
        // four kappa arcs plus the closing segment back to the start
        assert_eq!(shape.paths[0].pts.len(), 16);
        assert!(shape.paths[0].closed);
    }

    #[test]
    fn non_ascii_path_data_is_not_fatal() {
        let d = doc(
            "<path d=\"M0 0 L10 0 £ L10 10 Z\"/>\
             <polygon points=\"0,0 10,0 – 10,10\"/>",
        );
        // the stray chars abort those elements but parsing continues
        assert!(d.shapes().count() <= 2);
    }

    #[test]
    fn polygon_closes_polyline_does_not() {
        let dp = doc("<polygon points=\"0,0 10,0 10,10\"/>");
        assert!(first_shape(&dp).paths[0].closed);
        let dl = doc("<polyline points=\"0,0 10,0 10,10\"/>");
        assert!(!first_shape(&dl).paths[0].closed);
    }

    #[test]
    fn style_attribute_and_presentation_attributes() {
        let d = doc(
            "<rect width=\"10\" height=\"10\" style=\"fill: red; stroke-width: 3\" \
             stroke=\"blue\" fill-rule=\"evenodd\"/>",
        );
        let shape = first_shape(&d);
        assert_eq!(shape.fill, Paint::Color(Color::rgb(255, 0, 0).with_alpha(255)));
        assert_eq!(
            shape.stroke,
            Paint::Color(Color::rgb(0, 0, 255).with_alpha(255))
        );
        assert_eq!(shape.stroke_width, 3.0);
        assert_eq!(shape.fill_rule, FillRule::EvenOdd);
    }

    #[test]
    fn display_none_is_sticky() {
        let d = doc(
            "<g display=\"none\"><rect width=\"10\" height=\"10\" display=\"inline\"/></g>",
        );
        let shape = first_shape(&d);
        assert!(!shape.visible);
    }

    #[test]
    fn group_transforms_nest() {
        let d = doc(
            "<g transform=\"translate(10 0)\"><g transform=\"scale(2)\">\
             <rect x=\"1\" y=\"1\" width=\"2\" height=\"2\"/></g></g>",
        );
        let shape = first_shape(&d);
        // outer translate applies after inner scale
        let p = shape.paths[0].pts[0];
        assert!(close(p.x, 12.0));
        assert!(close(p.y, 2.0));
    }

    #[test]
    fn transform_list_applies_left_to_right() {
        let m = parse_transform("translate(10 0) scale(2)");
        let p = m.apply(Point::new(1.0, 0.0));
        // "translate(...) scale(...)" scales first, then translates
        assert!(close(p.x, 12.0));
        let m2 = parse_transform("matrix(2 0 0 2 5 5)");
        let q = m2.apply(Point::new(1.0, 1.0));
        assert!(close(q.x, 7.0));
        assert!(close(q.y, 7.0));
    }

    #[test]
    fn unknown_transform_tokens_are_skipped() {
        let m = parse_transform("bogus(1 2) translate(3 0)");
        let p = m.apply(Point::new(0.0, 0.0));
        assert!(close(p.x, 3.0));
    }

    #[test]
    fn defs_content_produces_no_shapes() {
        let d = doc("<defs><rect width=\"10\" height=\"10\"/></defs><circle cx=\"5\" cy=\"5\" r=\"2\"/>");
        assert_eq!(d.shapes().count(), 1);
    }

    #[test]
    fn dasharray_none_and_zero_sum() {
        let d = doc("<line x1=\"0\" y1=\"0\" x2=\"10\" y2=\"0\" stroke=\"black\" stroke-dasharray=\"none\"/>");
        assert_eq!(first_shape(&d).stroke_dash_count, 0);
        let d = doc("<line x1=\"0\" y1=\"0\" x2=\"10\" y2=\"0\" stroke=\"black\" stroke-dasharray=\"0 0 0\"/>");
        assert_eq!(first_shape(&d).stroke_dash_count, 0);
        let d = doc("<line x1=\"0\" y1=\"0\" x2=\"10\" y2=\"0\" stroke=\"black\" stroke-dasharray=\"4 2\"/>");
        let shape = first_shape(&d);
        assert_eq!(shape.stroke_dash_count, 2);
        assert_eq!(&shape.stroke_dash_array[..2], &[4.0, 2.0]);
    }

    #[test]
    fn ids_do_not_inherit() {
        let d = doc(
            "<g id=\"outer\"><rect width=\"5\" height=\"5\"/>\
             <rect id=\"inner\" width=\"5\" height=\"5\"/></g>",
        );
        let shapes: Vec<&Shape> = d.shapes().collect();
        assert_eq!(shapes[0].id, "");
        assert_eq!(shapes[1].id, "inner");
    }

    #[test]
    fn parents_link_to_enclosing_group() {
        let d = doc("<g><rect width=\"5\" height=\"5\"/></g><rect width=\"5\" height=\"5\"/>");
        // node 0: group, node 1: rect inside, node 2: top-level rect
        assert_eq!(d.nodes[1].parent, Some(0));
        assert_eq!(d.nodes[2].parent, None);
    }

    #[test]
    fn percent_coordinates_use_viewbox() {
        let d = doc("<rect x=\"50%\" y=\"0\" width=\"10%\" height=\"10\"/>");
        let shape = first_shape(&d);
        assert!(close(shape.paths[0].pts[0].x, 50.0));
        assert!(close(shape.bounds.width(), 10.0));
    }

    #[test]
    fn svg_dimensions_and_units() {
        let d = Document::parse(
            "<svg width=\"2in\" height=\"96px\"><rect width=\"10\" height=\"10\"/></svg>",
            "px",
            96.0,
        );
        assert_eq!(d.width(), 192.0);
        assert_eq!(d.height(), 96.0);
    }

    #[test]
    fn preserve_aspect_ratio_parse() {
        let d = Document::parse(
            "<svg width=\"10\" height=\"10\" viewBox=\"0 0 20 10\" \
             preserveAspectRatio=\"xMaxYMid slice\"></svg>",
            "px",
            96.0,
        );
        assert_eq!(d.align_x, Align::Max);
        // the y match is case-sensitive against lowercase "yMid", so
        // camel-case values leave the y alignment at its default
        assert_eq!(d.align_y, Align::Min);
        assert_eq!(d.align_type, AlignType::Slice);
    }

    #[test]
    fn memory_counter_grows_with_content() {
        let small = doc("<rect width=\"5\" height=\"5\"/>");
        let large = doc(
            "<rect width=\"5\" height=\"5\"/><circle cx=\"1\" cy=\"1\" r=\"1\"/>\
             <path d=\"M0 0 L1 1 L2 0 Z\"/>",
        );
        assert!(large.memory_size() > small.memory_size());
        assert!(small.memory_size() > 0);
    }
}
