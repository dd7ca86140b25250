//! SMIL-style animation: parses `<animate>` and `<animateTransform>`
//! elements into per-interval segments, and re-evaluates them against
//! the shape baselines on every timeline query.
//!
//! A `values` list of n entries becomes n-1 segments sharing one group
//! duration; within a group at most one segment applies per query.

use crate::color;
use crate::model::{Document, MAX_DASHES, Paint, Shape};
use crate::parser::{self, Parser};
use crate::scan;
use crate::viewbox;
use crate::xform::{Transform, eval_bezier};

pub(crate) const MAX_ANIM_ARGS: usize = 10;

const GROUP_FIRST: u8 = 1 << 0;
const GROUP_LAST: u8 = 1 << 1;

/// Sentinel for absent `end` / `repeatCount`; evaluation only honors
/// positive ends and non-negative repeat counts.
const UNSET_TIME: i64 = i64::MIN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AnimTarget {
    TransformTranslate,
    TransformScale,
    TransformRotate,
    TransformSkewX,
    TransformSkewY,
    Opacity,
    Fill,
    FillOpacity,
    Stroke,
    StrokeOpacity,
    StrokeWidth,
    StrokeDashOffset,
    StrokeDashArray,
}

impl AnimTarget {
    fn is_transform(self) -> bool {
        matches!(
            self,
            AnimTarget::TransformTranslate
                | AnimTarget::TransformScale
                | AnimTarget::TransformRotate
                | AnimTarget::TransformSkewX
                | AnimTarget::TransformSkewY
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CalcMode {
    Linear,
    Discrete,
    Paced,
    Spline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Additive {
    Replace,
    Sum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FillMode {
    Remove,
    Freeze,
}

/// One animation interval over a single attribute. Times are in
/// milliseconds on the document timeline.
#[derive(Clone, Debug)]
pub(crate) struct AnimationSegment {
    target: AnimTarget,
    begin: i64,
    end: i64,
    dur: i64,
    group_dur: i64,
    repeat_count: i64,
    src: [f32; MAX_ANIM_ARGS],
    dst: [f32; MAX_ANIM_ARGS],
    spline: [f32; 4],
    src_na: usize,
    dst_na: usize,
    calc_mode: CalcMode,
    additive: Additive,
    fill: FillMode,
    flags: u8,
}

fn trim_lead(s: &str) -> &str {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && scan::is_space(b[i]) {
        i += 1;
    }
    &s[i..]
}

/// Clock value: full `h:mm:ss` form or a number with an optional
/// `h`/`min`/`s`/`ms` suffix; a bare number counts as seconds.
fn parse_clock(s: &str) -> i64 {
    let mut millis: i64 = 0;
    let mut value: f32 = 0.0;
    let mut has_hours = false;
    let mut has_minutes = false;
    let mut rest = s;
    while !rest.is_empty() {
        let c = rest.as_bytes()[0];
        if c.is_ascii_digit() {
            let (token, r) = scan::parse_number(rest);
            value = scan::atof32(token);
            rest = r;
            continue;
        }
        if c == b':' {
            rest = &rest[1..];
            if !has_hours {
                millis += value as i64 * 60 * 60 * 1000;
                has_hours = true;
                continue;
            } else if !has_minutes {
                millis += value as i64 * 60 * 1000;
                has_minutes = true;
                continue;
            }
        } else if rest.starts_with('h') {
            millis = (value * 60.0 * 60.0 * 1000.0) as i64;
        } else if rest.starts_with("min") {
            millis = (value * 60.0 * 1000.0) as i64;
        } else if rest.starts_with('s') {
            millis = (value * 1000.0) as i64;
        } else if rest.starts_with("ms") {
            millis = value as i64;
        } else {
            // unknown suffix: keep the value so it defaults to seconds
            break;
        }
        value = 0.0;
        break;
    }
    if value > 0.0 {
        millis += (value * 1000.0) as i64;
    }
    millis
}

/// Number of `;`-separated entries, ignoring a trailing empty one.
fn count_values(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    let mut count = 0;
    loop {
        while i < b.len() && scan::is_space(b[i]) {
            i += 1;
        }
        if i >= b.len() {
            break;
        }
        count += 1;
        while i < b.len() && b[i] != b';' {
            i += 1;
        }
        if i >= b.len() {
            break;
        }
        i += 1;
    }
    count
}

/// Sequential access to the `;`-separated entries of a list attribute.
struct ValueCursor<'a> {
    rest: &'a str,
}

impl<'a> ValueCursor<'a> {
    fn new(s: &'a str) -> Self {
        ValueCursor { rest: s }
    }

    fn next(&mut self) -> &'a str {
        match self.rest.find(';') {
            Some(pos) => {
                let item = &self.rest[..pos];
                self.rest = &self.rest[pos + 1..];
                item
            }
            None => {
                let item = self.rest;
                self.rest = &self.rest[self.rest.len()..];
                item
            }
        }
    }
}

fn parse_number_entry(s: &str) -> Option<f32> {
    let s = trim_lead(s);
    if s.is_empty() {
        return None;
    }
    let mut args = [0.0f32; 1];
    let (_, na) = parser::parse_transform_args(s, &mut args, false);
    (na == 1).then_some(args[0])
}

fn parse_spline_entry(s: &str) -> [f32; 4] {
    let s = trim_lead(s);
    let mut args = [0.0f32; 4];
    if s.is_empty() {
        return args;
    }
    let (_, na) = parser::parse_transform_args(s, &mut args, false);
    if na != 4 {
        return [0.0; 4];
    }
    args
}

/// Parses one value entry for `target` into `args`. An empty entry
/// leaves `args` untouched and reports zero arguments, so a malformed
/// list holds the previous entry's values.
fn parse_value_into(
    p: &Parser,
    target: AnimTarget,
    s: &str,
    args: &mut [f32; MAX_ANIM_ARGS],
) -> usize {
    let s = trim_lead(s);
    if s.is_empty() {
        return 0;
    }
    match target {
        AnimTarget::TransformTranslate => {
            let (_, na) = parser::parse_transform_args(s, &mut args[..2], false);
            if na == 1 {
                args[1] = 0.0;
            }
            2
        }
        AnimTarget::TransformScale => {
            let (_, na) = parser::parse_transform_args(s, &mut args[..2], false);
            if na == 1 {
                args[1] = args[0];
            }
            2
        }
        AnimTarget::TransformRotate => {
            let (_, na) = parser::parse_transform_args(s, &mut args[..3], false);
            na
        }
        AnimTarget::TransformSkewX | AnimTarget::TransformSkewY => {
            let (_, na) = parser::parse_transform_args(s, &mut args[..1], false);
            na
        }
        AnimTarget::Opacity | AnimTarget::FillOpacity | AnimTarget::StrokeOpacity => {
            args[0] = parser::parse_opacity(s);
            1
        }
        AnimTarget::Fill | AnimTarget::Stroke => {
            let c = color::parse_color(s);
            args[0] = c.r() as f32;
            args[1] = c.g() as f32;
            args[2] = c.b() as f32;
            3
        }
        AnimTarget::StrokeWidth | AnimTarget::StrokeDashOffset => {
            args[0] = p.parse_coordinate(s, 0.0, p.actual_length());
            1
        }
        AnimTarget::StrokeDashArray => {
            let (dashes, count) = p.parse_dasharray(s);
            args[..count].copy_from_slice(&dashes[..count]);
            args[count] = count as f32;
            count + 1
        }
    }
}

pub(crate) fn parse_animate(p: &mut Parser, tag: &str, attrs: &[(&str, &str)]) {
    let mut attr_name: Option<&str> = None;
    let mut anim_type: Option<&str> = None;
    let mut from: Option<&str> = None;
    let mut to: Option<&str> = None;
    let mut values: Option<&str> = None;
    let mut key_times: Option<&str> = None;
    let mut key_splines: Option<&str> = None;
    let mut begin: i64 = 0;
    let mut end = UNSET_TIME;
    let mut dur = UNSET_TIME;
    let mut repeat_dur = UNSET_TIME;
    let mut repeat_count = UNSET_TIME;
    let mut calc_mode = CalcMode::Linear;
    let mut additive = Additive::Replace;
    let mut fill = FillMode::Remove;

    for &(name, value) in attrs {
        match name {
            "attributeName" => attr_name = Some(value),
            "type" => anim_type = Some(value),
            "from" => from = Some(value),
            "to" => to = Some(value),
            "values" => values = Some(value),
            "keyTimes" => key_times = Some(value),
            "keySplines" => key_splines = Some(value),
            "begin" => begin = parse_clock(value),
            "end" => end = parse_clock(value),
            "dur" => dur = parse_clock(value),
            "repeatDur" => {
                repeat_dur = if value == "indefinite" {
                    -1
                } else {
                    parse_clock(value)
                };
            }
            "additive" if value == "sum" => additive = Additive::Sum,
            "fill" if value == "freeze" => fill = FillMode::Freeze,
            "repeatCount" => {
                repeat_count = if value == "indefinite" {
                    -1
                } else {
                    scan::atof(value) as i64
                };
            }
            "calcMode" => {
                calc_mode = match value {
                    "discrete" => CalcMode::Discrete,
                    "paced" => CalcMode::Paced,
                    "spline" => CalcMode::Spline,
                    _ => CalcMode::Linear,
                };
            }
            _ => {}
        }
    }

    let values_count = values.map(count_values).unwrap_or(0);
    let key_times_count = key_times.map(count_values).unwrap_or(0);
    let key_splines_count = key_splines.map(count_values).unwrap_or(0);

    // Validity checks; anything inconsistent drops the whole element.
    if dur == UNSET_TIME {
        return;
    }
    let Some(attr_name) = attr_name else {
        return;
    };
    if values.is_none() && (from.is_none() || to.is_none()) {
        return;
    }
    if key_times_count > 0 && values_count > 0 && key_times_count != values_count {
        return;
    }
    if key_splines_count > 0 && values_count > 0 && key_splines_count != values_count - 1 {
        return;
    }

    if repeat_dur != UNSET_TIME {
        if repeat_count != UNSET_TIME {
            repeat_count = -1;
        }
        end = if end > 0 && repeat_dur < 0 {
            end
        } else if end < 0 && repeat_dur > 0 {
            repeat_dur
        } else if end > 0 && repeat_dur > 0 {
            end.min(repeat_dur)
        } else {
            end
        };
    }

    let target = if tag == "animateTransform" {
        if attr_name != "transform" {
            return;
        }
        match anim_type {
            Some("translate") => AnimTarget::TransformTranslate,
            Some("scale") => AnimTarget::TransformScale,
            Some("rotate") => AnimTarget::TransformRotate,
            Some("skewX") => AnimTarget::TransformSkewX,
            Some("skewY") => AnimTarget::TransformSkewY,
            _ => return,
        }
    } else if tag == "animate" {
        match attr_name {
            "opacity" => AnimTarget::Opacity,
            "fill" => AnimTarget::Fill,
            "fill-opacity" => AnimTarget::FillOpacity,
            "stroke" => AnimTarget::Stroke,
            "stroke-opacity" => AnimTarget::StrokeOpacity,
            "stroke-width" => AnimTarget::StrokeWidth,
            "stroke-dashoffset" => AnimTarget::StrokeDashOffset,
            "stroke-dasharray" => AnimTarget::StrokeDashArray,
            _ => return,
        }
    } else {
        return;
    };

    let template = AnimationSegment {
        target,
        begin,
        end,
        dur,
        group_dur: dur,
        repeat_count,
        src: [0.0; MAX_ANIM_ARGS],
        dst: [0.0; MAX_ANIM_ARGS],
        spline: [0.0; 4],
        src_na: 0,
        dst_na: 0,
        calc_mode,
        additive,
        fill,
        flags: 0,
    };

    let mut segments: Vec<AnimationSegment> = Vec::new();

    if values_count < 2 {
        // Simple from/to animation (or a one-entry values list).
        let mut seg = template.clone();
        match values {
            None => {
                seg.src_na = parse_value_into(p, target, from.unwrap_or(""), &mut seg.src);
                seg.dst_na = parse_value_into(p, target, to.unwrap_or(""), &mut seg.dst);
            }
            Some(values) => {
                let mut cursor = ValueCursor::new(values);
                seg.src_na = parse_value_into(p, target, cursor.next(), &mut seg.src);
                seg.dst = seg.src;
                seg.dst_na = seg.src_na;
            }
        }
        segments.push(seg);
    } else {
        let mut vcur = ValueCursor::new(values.unwrap_or(""));
        let mut ktcur = key_times.map(ValueCursor::new);
        let mut kscur = key_splines.map(ValueCursor::new);

        let mut key_time_end = match ktcur.as_mut() {
            Some(cur) => parse_number_entry(cur.next()).unwrap_or(0.0),
            None => 0.0,
        };
        let mut args = [0.0f32; MAX_ANIM_ARGS];
        let mut args_na = parse_value_into(p, target, vcur.next(), &mut args);

        for i in 0..values_count - 1 {
            let key_time_begin = key_time_end;
            if let Some(cur) = ktcur.as_mut() {
                if let Some(v) = parse_number_entry(cur.next()) {
                    key_time_end = v;
                }
            } else if i < values_count - 2 {
                key_time_end = (i + 1) as f32 / (values_count - 1) as f32;
            } else {
                key_time_end = 1.0;
            }

            let mut seg = template.clone();
            if let Some(cur) = kscur.as_mut() {
                seg.spline = parse_spline_entry(cur.next());
            }
            seg.begin = (begin as f64 + dur as f64 * key_time_begin as f64) as i64;
            seg.dur = (dur as f64 * (key_time_end - key_time_begin) as f64) as i64;
            seg.src = args;
            seg.src_na = args_na;
            args_na = parse_value_into(p, target, vcur.next(), &mut args);
            seg.dst = args;
            seg.dst_na = args_na;
            segments.push(seg);
        }
    }

    if segments.is_empty() {
        return;
    }
    if let Some(first) = segments.first_mut() {
        first.flags |= GROUP_FIRST;
    }
    if let Some(last) = segments.last_mut() {
        last.flags |= GROUP_LAST;
    }

    // Attach to the nearest enclosing node (shape or group).
    if let Some(idx) = p
        .doc
        .nodes
        .iter()
        .rposition(|node| node.depth < p.shape_depth)
    {
        p.doc
            .mem
            .add(segments.len() * std::mem::size_of::<AnimationSegment>());
        p.doc.nodes[idx].anims.extend(segments);
    }
}

// ---- evaluation ----

fn build_transform(args: &[f32; MAX_ANIM_ARGS], na: usize, target: AnimTarget) -> Transform {
    match target {
        AnimTarget::TransformTranslate => Transform::translation(args[0], args[1]),
        AnimTarget::TransformScale => Transform::scaling(args[0], args[1]),
        AnimTarget::TransformRotate => {
            if na > 1 {
                Transform::rotation_about(args[0], args[1], args[2])
            } else {
                Transform::rotation(args[0])
            }
        }
        AnimTarget::TransformSkewX => Transform::skew_x(args[0]),
        AnimTarget::TransformSkewY => Transform::skew_y(args[0]),
        _ => Transform::identity(),
    }
}

fn apply_transform(
    xform: &mut Transform,
    args: &[f32; MAX_ANIM_ARGS],
    na: usize,
    target: AnimTarget,
    additive: Additive,
) {
    let m = build_transform(args, na, target);
    if additive == Additive::Replace {
        *xform = Transform::identity();
    }
    *xform = m.then(*xform);
}

/// Color channels apply to solid paints only; gradients are left alone.
fn apply_paint(paint: &mut Paint, args: &[f32; MAX_ANIM_ARGS], additive: Additive) {
    let Paint::Color(color) = paint else {
        return;
    };
    let mut r = args[0] as i32 & 0xff;
    let mut g = args[1] as i32 & 0xff;
    let mut b = args[2] as i32 & 0xff;
    if additive == Additive::Sum {
        r = (r + color.r() as i32).min(255);
        g = (g + color.g() as i32).min(255);
        b = (b + color.b() as i32).min(255);
    }
    *color = crate::color::Color::rgb(r as u8, g as u8, b as u8).with_alpha(color.a());
}

fn apply_paint_alpha(paint: &mut Paint, args: &[f32; MAX_ANIM_ARGS], additive: Additive) {
    let Paint::Color(color) = paint else {
        return;
    };
    let mut a = (args[0] * 255.0) as i32 & 0xff;
    if additive == Additive::Sum {
        a = (a + color.a() as i32).min(255);
    }
    *color = color.with_alpha(a as u8);
}

fn apply_value(value: &mut f32, arg: f32, additive: Additive) {
    if additive == Additive::Sum {
        *value += arg;
    } else {
        *value = arg;
    }
}

/// Applies one node's segment list to `shape` at `time_ms`. Segments
/// of the same group after the first active one are skipped; an ended
/// group only sticks when its last segment freezes.
fn apply_group(shape: &mut Shape, segments: &[AnimationSegment], time_ms: i64) {
    let mut group_has_animate = false;
    for seg in segments {
        if seg.flags & GROUP_FIRST != 0 {
            group_has_animate = false;
        }
        if group_has_animate {
            continue;
        }
        if seg.group_dur <= 0 {
            continue;
        }

        let relative = (time_ms - seg.begin) % seg.group_dur + seg.begin;
        if relative < seg.begin {
            continue;
        }
        let mut ended = relative >= seg.begin + seg.dur;
        if seg.end > 0 && time_ms >= seg.end {
            ended = true;
        }
        if seg.repeat_count >= 0 {
            let count = (time_ms - seg.begin) / seg.group_dur;
            if count + 1 > seg.repeat_count {
                ended = true;
            }
        }
        if ended && !(seg.flags & GROUP_LAST != 0 && seg.fill == FillMode::Freeze) {
            continue;
        }
        group_has_animate = true;

        let mut progression = 1.0f32;
        if !ended {
            if seg.calc_mode != CalcMode::Discrete {
                progression = (relative - seg.begin) as f32 / seg.dur as f32;
            }
            if seg.calc_mode == CalcMode::Spline {
                // x-spline maps time, y-spline maps value
                let sv = eval_bezier(
                    progression as f64,
                    0.0,
                    seg.spline[0] as f64,
                    seg.spline[2] as f64,
                    1.0,
                );
                progression =
                    eval_bezier(sv, 0.0, seg.spline[1] as f64, seg.spline[3] as f64, 1.0) as f32;
            }
        }

        let mut args = [0.0f32; MAX_ANIM_ARGS];
        for k in 0..MAX_ANIM_ARGS {
            args[k] = seg.src[k] + (seg.dst[k] - seg.src[k]) * progression;
        }

        let mut scale_stroke = false;
        if seg.target.is_transform() {
            let na = seg.src_na.max(seg.dst_na);
            apply_transform(&mut shape.xform, &args, na, seg.target, seg.additive);
            scale_stroke = true;
            for path in shape.paths.iter_mut() {
                apply_transform(&mut path.xform, &args, na, seg.target, seg.additive);
                path.retransform();
                path.scaled = false;
            }
        } else {
            match seg.target {
                AnimTarget::Fill => apply_paint(&mut shape.fill, &args, seg.additive),
                AnimTarget::Stroke => apply_paint(&mut shape.stroke, &args, seg.additive),
                AnimTarget::Opacity => {
                    shape.opacity = args[0].min(1.0);
                }
                AnimTarget::FillOpacity => apply_paint_alpha(&mut shape.fill, &args, seg.additive),
                AnimTarget::StrokeOpacity => {
                    apply_paint_alpha(&mut shape.stroke, &args, seg.additive)
                }
                AnimTarget::StrokeWidth => {
                    apply_value(&mut shape.stroke_width, args[0], seg.additive)
                }
                AnimTarget::StrokeDashOffset => {
                    apply_value(&mut shape.stroke_dash_offset, args[0], seg.additive);
                    scale_stroke = true;
                }
                AnimTarget::StrokeDashArray => {
                    if seg.dst_na > 0 {
                        let n = seg.dst_na - 1;
                        let entries = if seg.src_na != seg.dst_na {
                            &seg.dst
                        } else {
                            &args
                        };
                        for k in 0..n.min(MAX_DASHES) {
                            shape.stroke_dash_array[k] = entries[k];
                        }
                        shape.stroke_dash_count = (args[n].max(0.0) as usize).min(MAX_DASHES);
                    }
                }
                _ => {}
            }
        }

        if scale_stroke {
            shape.scale_stroke();
        }
    }
}

/// Restores the style and geometry captured when the shape was
/// committed, clearing the viewbox-scaled markers so normalization
/// runs again after the segments apply.
fn reset(shape: &mut Shape) {
    let baseline = shape.baseline.clone();
    shape.opacity = baseline.opacity;
    shape.fill = baseline.fill;
    shape.stroke = baseline.stroke;
    shape.stroke_width = baseline.stroke_width;
    shape.stroke_dash_offset = baseline.stroke_dash_offset;
    shape.stroke_dash_array = baseline.stroke_dash_array;
    shape.stroke_dash_count = baseline.stroke_dash_count;
    shape.xform = baseline.xform;
    shape.stroke_scaled = false;
    for path in shape.paths.iter_mut() {
        path.xform = path.base_xform;
        path.retransform();
        path.scaled = false;
    }
}

/// Re-evaluates the whole document at `time_ms`: every shape is reset
/// to its baseline, segments from the node and its enclosing groups
/// apply root-first, and the document is normalized again. Returns
/// true when any shape node carries segments.
pub(crate) fn animate(doc: &mut Document, time_ms: i64) -> bool {
    let mut any = false;
    for i in 0..doc.nodes.len() {
        let Some(mut shape) = doc.nodes[i].shape.take() else {
            continue;
        };

        reset(&mut shape);

        let mut chain = Vec::new();
        let mut cursor = Some(i);
        while let Some(idx) = cursor {
            chain.push(idx);
            cursor = doc.nodes[idx].parent;
        }
        for &idx in chain.iter().rev() {
            apply_group(&mut shape, &doc.nodes[idx].anims, time_ms);
        }

        shape.update_bounds();
        if !doc.nodes[i].anims.is_empty() {
            any = true;
        }
        doc.nodes[i].shape = Some(shape);
    }
    viewbox::scale_to_viewbox(doc);
    any
}
