//! Viewbox normalization: maps viewBox space onto the document's
//! width/height with meet/slice alignment, scales stroke metrics and
//! gradients, and infers missing dimensions from content bounds.
//!
//! The pass is re-applied after every animation update; per-path and
//! per-shape `scaled` flags keep it idempotent.

use crate::model::{Align, AlignType, Coordinate, Document, Gradient, Paint};
use crate::xform::{Bounds, Transform};

/// Union of all shape bounds; zero when the document is empty.
fn image_bounds(doc: &Document) -> Bounds {
    let mut shapes = doc.shapes();
    let Some(first) = shapes.next() else {
        return Bounds::ZERO;
    };
    let mut bounds = first.bounds;
    for shape in shapes {
        bounds = bounds.union(shape.bounds);
    }
    bounds
}

/// Offset of the content inside its container for one axis.
fn view_align(content: f32, container: f32, align: Align) -> f32 {
    match align {
        Align::Min => 0.0,
        Align::Mid => (container - content) * 0.5,
        Align::Max => container - content,
    }
}

/// Rebuilds the gradient transform from its retained pre-viewbox
/// matrix, so repeated normalization does not compound.
fn scale_gradient(grad: &mut Gradient, tx: f32, ty: f32, sx: f32, sy: f32) {
    grad.xform = grad
        .base_xform
        .then(Transform::translation(tx, ty))
        .then(Transform::scaling(sx, sy));
}

pub(crate) fn scale_to_viewbox(doc: &mut Document) {
    let bounds = image_bounds(doc);

    // Infer missing view box / dimensions.
    if doc.view_width == 0.0 {
        if doc.width > 0.0 {
            doc.view_width = doc.width;
        } else {
            doc.view_minx = bounds.min_x;
            doc.view_width = bounds.width();
        }
    }
    if doc.view_height == 0.0 {
        if doc.height > 0.0 {
            doc.view_height = doc.height;
        } else {
            doc.view_miny = bounds.min_y;
            doc.view_height = bounds.height();
        }
    }
    if doc.width == 0.0 {
        doc.width = doc.view_width;
    }
    if doc.height == 0.0 {
        doc.height = doc.view_height;
    }

    let mut tx = -doc.view_minx;
    let mut ty = -doc.view_miny;
    let mut sx = if doc.view_width > 0.0 {
        doc.width / doc.view_width
    } else {
        0.0
    };
    let mut sy = if doc.view_height > 0.0 {
        doc.height / doc.view_height
    } else {
        0.0
    };
    // scale for the caller's output units
    let us = 1.0 / doc.convert_to_pixels(Coordinate::new(1.0, doc.units), 0.0, 1.0);

    match doc.align_type {
        AlignType::Meet => {
            let s = sx.min(sy);
            sx = s;
            sy = s;
            if sx != 0.0 {
                tx += view_align(doc.view_width * sx, doc.width, doc.align_x) / sx;
            }
            if sy != 0.0 {
                ty += view_align(doc.view_height * sy, doc.height, doc.align_y) / sy;
            }
        }
        AlignType::Slice => {
            let s = sx.max(sy);
            sx = s;
            sy = s;
            if sx != 0.0 {
                tx += view_align(doc.view_width * sx, doc.width, doc.align_x) / sx;
            }
            if sy != 0.0 {
                ty += view_align(doc.view_height * sy, doc.height, doc.align_y) / sy;
            }
        }
        AlignType::None => {}
    }
    sx *= us;
    sy *= us;
    let avgs = (sx + sy) / 2.0;

    for node in doc.nodes.iter_mut() {
        let Some(shape) = node.shape.as_mut() else {
            continue;
        };

        // bounds follow the points: recomputing from the guarded point
        // scaling keeps a second pass from compounding them
        for path in shape.paths.iter_mut() {
            if !path.scaled {
                for p in path.pts.iter_mut() {
                    p.x = (p.x + tx) * sx;
                    p.y = (p.y + ty) * sy;
                }
                path.scaled = true;
            }
            path.update_bounds();
        }
        shape.update_bounds();

        if let Paint::Linear(grad) | Paint::Radial(grad) = &mut shape.fill {
            scale_gradient(grad, tx, ty, sx, sy);
        }
        if let Paint::Linear(grad) | Paint::Radial(grad) = &mut shape.stroke {
            scale_gradient(grad, tx, ty, sx, sy);
        }

        if !shape.stroke_scaled {
            shape.stroke_width *= avgs;
            shape.stroke_dash_offset *= avgs;
            for dash in shape.stroke_dash_array.iter_mut() {
                *dash *= avgs;
            }
            shape.stroke_scaled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn viewbox_scales_into_document_size() {
        let d = Document::parse(
            "<svg width=\"200\" height=\"200\" viewBox=\"0 0 100 100\">\
             <rect x=\"10\" y=\"10\" width=\"20\" height=\"20\"/></svg>",
            "px",
            96.0,
        );
        let shape = d.shapes().next().unwrap();
        assert!(close(shape.bounds.min_x, 20.0));
        assert!(close(shape.bounds.max_x, 60.0));
        assert!(close(shape.paths[0].pts[0].x, 20.0));
    }

    #[test]
    fn viewbox_origin_translates_content() {
        let d = Document::parse(
            "<svg width=\"100\" height=\"100\" viewBox=\"50 0 100 100\">\
             <rect x=\"50\" y=\"0\" width=\"10\" height=\"10\"/></svg>",
            "px",
            96.0,
        );
        let shape = d.shapes().next().unwrap();
        assert!(close(shape.bounds.min_x, 0.0));
    }

    #[test]
    fn missing_dimensions_fall_back_to_content_bounds() {
        let d = Document::parse(
            "<svg><rect x=\"5\" y=\"5\" width=\"30\" height=\"40\"/></svg>",
            "px",
            96.0,
        );
        assert!(close(d.width(), 30.0));
        assert!(close(d.height(), 40.0));
        let shape = d.shapes().next().unwrap();
        // content is shifted so its top-left corner is at the origin
        assert!(close(shape.bounds.min_x, 0.0));
        assert!(close(shape.bounds.min_y, 0.0));
    }

    #[test]
    fn meet_preserves_aspect_and_centers() {
        let d = Document::parse(
            "<svg width=\"200\" height=\"100\" viewBox=\"0 0 100 100\" \
             preserveAspectRatio=\"xMidYMid meet\">\
             <rect x=\"0\" y=\"0\" width=\"100\" height=\"100\"/></svg>",
            "px",
            96.0,
        );
        let shape = d.shapes().next().unwrap();
        // uniform scale 1, centered horizontally in the 200 wide page
        assert!(close(shape.bounds.min_x, 50.0));
        assert!(close(shape.bounds.max_x, 150.0));
        assert!(close(shape.bounds.min_y, 0.0));
    }

    #[test]
    fn slice_fills_the_container() {
        let d = Document::parse(
            "<svg width=\"200\" height=\"100\" viewBox=\"0 0 100 100\" \
             preserveAspectRatio=\"xMinYMin slice\">\
             <rect x=\"0\" y=\"0\" width=\"100\" height=\"100\"/></svg>",
            "px",
            96.0,
        );
        let shape = d.shapes().next().unwrap();
        // uniform scale 2
        assert!(close(shape.bounds.max_x, 200.0));
        assert!(close(shape.bounds.max_y, 200.0));
    }

    #[test]
    fn repeated_normalization_is_idempotent() {
        let mut d = Document::parse(
            "<svg width=\"200\" height=\"200\" viewBox=\"0 0 100 100\">\
             <rect x=\"10\" y=\"10\" width=\"20\" height=\"20\" stroke=\"black\" \
             stroke-width=\"2\"/></svg>",
            "px",
            96.0,
        );
        let before_pts = d.shapes().next().unwrap().paths[0].pts.clone();
        let before_width = d.shapes().next().unwrap().stroke_width;
        let before_bounds = d.shapes().next().unwrap().bounds;
        let before_path_bounds = d.shapes().next().unwrap().paths[0].bounds;
        scale_to_viewbox(&mut d);
        scale_to_viewbox(&mut d);
        let shape = d.shapes().next().unwrap();
        assert_eq!(shape.paths[0].pts, before_pts);
        assert_eq!(shape.stroke_width, before_width);
        assert_eq!(shape.bounds, before_bounds);
        assert_eq!(shape.paths[0].bounds, before_path_bounds);
    }
}
