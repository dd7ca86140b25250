//! Gradient resolution: raw `<linearGradient>`/`<radialGradient>` data
//! collected during parsing is turned into concrete paints once all
//! shapes and stop lists exist, so forward references and `xlink:href`
//! chains work.

use libm::sqrtf;

use crate::model::{
    Coordinate, Document, Gradient, GradientStop, Paint, Shape, SpreadMode, Units,
};
use crate::xform::{Bounds, Transform, curve_bounds};

const MAX_HREF_HOPS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GradientUnits {
    UserSpace,
    ObjectSpace,
}

#[derive(Clone, Debug)]
pub(crate) enum GradientCoords {
    Linear {
        x1: Coordinate,
        y1: Coordinate,
        x2: Coordinate,
        y2: Coordinate,
    },
    Radial {
        cx: Coordinate,
        cy: Coordinate,
        r: Coordinate,
        fx: Coordinate,
        fy: Coordinate,
    },
}

/// Raw gradient element as parsed; unresolved until `resolve_gradients`.
#[derive(Clone, Debug)]
pub(crate) struct GradientData {
    pub id: String,
    pub ref_id: String,
    pub units: GradientUnits,
    pub xform: Transform,
    pub spread: SpreadMode,
    pub coords: GradientCoords,
    pub stops: Vec<GradientStop>,
}

/// Later definitions shadow earlier ones with the same id.
fn find<'a>(gradients: &'a [GradientData], id: &str) -> Option<&'a GradientData> {
    gradients.iter().rev().find(|g| g.id == id)
}

/// Follows the href chain until a gradient with stops turns up.
fn find_stops<'a>(gradients: &'a [GradientData], data: &'a GradientData) -> &'a [GradientStop] {
    if !data.stops.is_empty() {
        return &data.stops;
    }
    let mut ref_id = data.ref_id.as_str();
    for _ in 0..MAX_HREF_HOPS {
        if ref_id.is_empty() {
            break;
        }
        let Some(linked) = find(gradients, ref_id) else {
            break;
        };
        if !linked.stops.is_empty() {
            return &linked.stops;
        }
        if linked.ref_id == ref_id {
            break;
        }
        ref_id = &linked.ref_id;
    }
    &[]
}

/// Shape geometry mapped back through the inverse shape transform,
/// for objectBoundingBox gradient units.
fn local_bounds(shape: &Shape) -> Bounds {
    let inv = shape.xform.inverse();
    let mut bounds: Option<Bounds> = None;
    for path in &shape.paths {
        if path.pts.len() < 4 {
            continue;
        }
        let mut i = 0;
        while i + 3 < path.pts.len() {
            let curve = [
                inv.apply(path.pts[i]),
                inv.apply(path.pts[i + 1]),
                inv.apply(path.pts[i + 2]),
                inv.apply(path.pts[i + 3]),
            ];
            let cb = curve_bounds(&curve);
            bounds = Some(match bounds {
                Some(b) => b.union(cb),
                None => cb,
            });
            i += 3;
        }
    }
    bounds.unwrap_or(Bounds::ZERO)
}

fn create(
    doc: &mut Document,
    gradients: &[GradientData],
    id: &str,
    local: Bounds,
    shape_xform: Transform,
) -> Paint {
    let Some(data) = find(gradients, id) else {
        return Paint::None;
    };
    let stops = find_stops(gradients, data);
    if stops.is_empty() {
        return Paint::None;
    }

    let (ox, oy, sw, sh) = match data.units {
        GradientUnits::ObjectSpace => (local.min_x, local.min_y, local.width(), local.height()),
        GradientUnits::UserSpace => (
            doc.view_minx,
            doc.view_miny,
            doc.view_width,
            doc.view_height,
        ),
    };
    let sl = sqrtf(sw * sw + sh * sh) / sqrtf(2.0);

    doc.mem.add(
        std::mem::size_of::<Gradient>() + stops.len() * std::mem::size_of::<GradientStop>(),
    );

    match &data.coords {
        GradientCoords::Linear { x1, y1, x2, y2 } => {
            let x1 = doc.convert_to_pixels(*x1, ox, sw);
            let y1 = doc.convert_to_pixels(*y1, oy, sh);
            let x2 = doc.convert_to_pixels(*x2, ox, sw);
            let y2 = doc.convert_to_pixels(*y2, oy, sh);
            let dx = x2 - x1;
            let dy = y2 - y1;
            // maps the unit segment (0,0)-(0,1) onto (x1,y1)-(x2,y2)
            let base = Transform {
                a: dy,
                b: -dx,
                c: dx,
                d: dy,
                e: x1,
                f: y1,
            };
            let xf = base.then(data.xform).then(shape_xform);
            Paint::Linear(Box::new(Gradient {
                xform: xf,
                base_xform: xf,
                spread: data.spread,
                fx: 0.0,
                fy: 0.0,
                stops: stops.to_vec(),
            }))
        }
        GradientCoords::Radial { cx, cy, r, fx, fy } => {
            let cx = doc.convert_to_pixels(*cx, ox, sw);
            let cy = doc.convert_to_pixels(*cy, oy, sh);
            let r = doc.convert_to_pixels(*r, 0.0, sl);
            // focal point in unit space; absent fx/fy sits on the center
            let unset = Coordinate::new(0.0, Units::User);
            let (ufx, ufy) = if (*fx == unset && *fy == unset) || r == 0.0 {
                (0.0, 0.0)
            } else {
                (
                    (doc.convert_to_pixels(*fx, ox, sw) - cx) / r,
                    (doc.convert_to_pixels(*fy, oy, sh) - cy) / r,
                )
            };
            // maps the unit circle onto the gradient circle
            let base = Transform {
                a: r,
                b: 0.0,
                c: 0.0,
                d: r,
                e: cx,
                f: cy,
            };
            let xf = base.then(data.xform).then(shape_xform);
            Paint::Radial(Box::new(Gradient {
                xform: xf,
                base_xform: xf,
                spread: data.spread,
                fx: ufx,
                fy: ufy,
                stops: stops.to_vec(),
            }))
        }
    }
}

/// Replaces `Paint::Ref` placeholders with resolved gradients (or
/// `Paint::None` when the reference is dangling or has no stops), and
/// refreshes the animation baselines to match.
pub(crate) fn resolve_gradients(doc: &mut Document, gradients: &[GradientData]) {
    for i in 0..doc.nodes.len() {
        let Some(mut shape) = doc.nodes[i].shape.take() else {
            continue;
        };
        let fill_ref = matches!(shape.fill, Paint::Ref(_));
        let stroke_ref = matches!(shape.stroke, Paint::Ref(_));
        if fill_ref || stroke_ref {
            let local = local_bounds(&shape);
            if let Paint::Ref(id) = std::mem::take(&mut shape.fill) {
                shape.fill = create(doc, gradients, &id, local, shape.xform);
                shape.baseline.fill = shape.fill.clone();
            }
            if let Paint::Ref(id) = std::mem::take(&mut shape.stroke) {
                shape.stroke = create(doc, gradients, &id, local, shape.xform);
                shape.baseline.stroke = shape.stroke.clone();
            }
        }
        doc.nodes[i].shape = Some(shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::model::Document;
    use crate::xform::Point;

    fn doc(body: &str) -> Document {
        Document::parse(
            &format!("<svg width=\"100\" height=\"100\" viewBox=\"0 0 100 100\">{body}</svg>"),
            "px",
            96.0,
        )
    }

    #[test]
    fn linear_gradient_resolves_with_sorted_stops() {
        let d = doc(
            "<defs><linearGradient id=\"g\"><stop offset=\"1\" stop-color=\"blue\"/>\
             <stop offset=\"0\" stop-color=\"red\"/></linearGradient></defs>\
             <rect width=\"100\" height=\"100\" fill=\"url(#g)\"/>",
        );
        let shape = d.shapes().next().unwrap();
        let Paint::Linear(grad) = &shape.fill else {
            panic!("expected linear gradient, got {:?}", shape.fill);
        };
        assert_eq!(grad.stops.len(), 2);
        assert!(grad.stops[0].offset <= grad.stops[1].offset);
        assert_eq!(grad.stops[0].color.r(), 255);
        assert_eq!(grad.stops[1].color.b(), 255);
    }

    #[test]
    fn href_chain_supplies_stops() {
        let d = doc(
            "<defs><linearGradient id=\"base\"><stop offset=\"0\" stop-color=\"red\"/>\
             <stop offset=\"1\" stop-color=\"black\"/></linearGradient>\
             <linearGradient id=\"derived\" xlink:href=\"#base\" x1=\"0\" x2=\"1\"/></defs>\
             <rect width=\"100\" height=\"100\" fill=\"url(#derived)\"/>",
        );
        let shape = d.shapes().next().unwrap();
        let Paint::Linear(grad) = &shape.fill else {
            panic!("expected linear gradient");
        };
        assert_eq!(grad.stops.len(), 2);
    }

    #[test]
    fn dangling_reference_becomes_no_paint() {
        let d = doc("<rect width=\"10\" height=\"10\" fill=\"url(#nope)\"/>");
        let shape = d.shapes().next().unwrap();
        assert_eq!(shape.fill, Paint::None);
    }

    #[test]
    fn gradient_without_stops_becomes_no_paint() {
        let d = doc(
            "<defs><linearGradient id=\"empty\"/></defs>\
             <rect width=\"10\" height=\"10\" fill=\"url(#empty)\"/>",
        );
        let shape = d.shapes().next().unwrap();
        assert_eq!(shape.fill, Paint::None);
    }

    #[test]
    fn object_space_linear_spans_shape_bounds() {
        // default linear gradient runs left to right across the
        // object bounding box
        let d = doc(
            "<linearGradient id=\"g\"><stop offset=\"0\" stop-color=\"red\"/>\
             <stop offset=\"1\" stop-color=\"blue\"/></linearGradient>\
             <rect x=\"10\" y=\"10\" width=\"40\" height=\"20\" fill=\"url(#g)\"/>",
        );
        let shape = d.shapes().next().unwrap();
        let Paint::Linear(grad) = &shape.fill else {
            panic!("expected linear gradient");
        };
        let start = grad.xform.apply(Point::new(0.0, 0.0));
        let end = grad.xform.apply(Point::new(0.0, 1.0));
        assert!((start.x - 10.0).abs() < 1e-3);
        assert!((end.x - 50.0).abs() < 1e-3);
        assert!((start.y - end.y).abs() < 1e-3);
    }

    #[test]
    fn stop_opacity_lands_in_alpha() {
        let d = doc(
            "<linearGradient id=\"g\"><stop offset=\"0\" stop-color=\"red\" stop-opacity=\"0.5\"/>\
             <stop offset=\"1\" stop-color=\"blue\"/></linearGradient>\
             <rect width=\"10\" height=\"10\" fill=\"url(#g)\"/>",
        );
        let shape = d.shapes().next().unwrap();
        let Paint::Linear(grad) = &shape.fill else {
            panic!("expected linear gradient");
        };
        assert_eq!(grad.stops[0].color.a(), 127);
        assert_eq!(grad.stops[0].color, Color::rgb(255, 0, 0).with_alpha(127));
        assert_eq!(grad.stops[1].color.a(), 255);
    }
}
