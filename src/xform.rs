use libm::{cosf, fabs, sinf, sqrt, sqrtf, tanf};

pub(crate) const EPSILON: f32 = 1e-12;
pub(crate) const PI: f32 = std::f32::consts::PI;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Row-major 2x3 affine transform. A point maps as
/// `x' = x*a + y*c + e`, `y' = x*b + y*d + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Transform::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Transform {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Transform {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Transform {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn rotation(degrees: f32) -> Self {
        let rad = degrees / 180.0 * PI;
        let (sn, cs) = (sinf(rad), cosf(rad));
        Transform {
            a: cs,
            b: sn,
            c: -sn,
            d: cs,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Rotation about an arbitrary center, composed as
    /// translate(-cx,-cy) then rotate then translate(cx,cy).
    pub fn rotation_about(degrees: f32, cx: f32, cy: f32) -> Self {
        Transform::translation(-cx, -cy)
            .then(Transform::rotation(degrees))
            .then(Transform::translation(cx, cy))
    }

    pub fn skew_x(degrees: f32) -> Self {
        Transform {
            a: 1.0,
            b: 0.0,
            c: tanf(degrees / 180.0 * PI),
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_y(degrees: f32) -> Self {
        Transform {
            a: 1.0,
            b: tanf(degrees / 180.0 * PI),
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Composition: `self` is applied first, then `next`.
    pub fn then(self, next: Transform) -> Transform {
        Transform {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    /// Inverse; near-singular transforms invert to identity.
    pub fn inverse(self) -> Transform {
        let det = self.a as f64 * self.d as f64 - self.c as f64 * self.b as f64;
        if det > -1e-6 && det < 1e-6 {
            return Transform::identity();
        }
        let invdet = 1.0 / det;
        Transform {
            a: (self.d as f64 * invdet) as f32,
            c: (-self.c as f64 * invdet) as f32,
            e: ((self.c as f64 * self.f as f64 - self.d as f64 * self.e as f64) * invdet) as f32,
            b: (-self.b as f64 * invdet) as f32,
            d: (self.a as f64 * invdet) as f32,
            f: ((self.b as f64 * self.e as f64 - self.a as f64 * self.f as f64) * invdet) as f32,
        }
    }

    pub fn apply(self, p: Point) -> Point {
        Point {
            x: p.x * self.a + p.y * self.c + self.e,
            y: p.x * self.b + p.y * self.d + self.f,
        }
    }

    /// Like `apply` but ignores translation (direction vectors).
    pub fn apply_vec(self, p: Point) -> Point {
        Point {
            x: p.x * self.a + p.y * self.c,
            y: p.x * self.b + p.y * self.d,
        }
    }

    /// Mean of the transform's axis scale factors.
    pub fn average_scale(self) -> f32 {
        let sx = sqrtf(self.a * self.a + self.c * self.c);
        let sy = sqrtf(self.b * self.b + self.d * self.d);
        (sx + sy) * 0.5
    }
}

/// Axis-aligned rectangle kept as min/max corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub const ZERO: Bounds = Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 0.0,
        max_y: 0.0,
    };

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    fn contains(self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Cubic Bernstein evaluation in double precision.
pub(crate) fn eval_bezier(t: f64, p0: f64, p1: f64, p2: f64, p3: f64) -> f64 {
    let it = 1.0 - t;
    it * it * it * p0 + 3.0 * it * it * t * p1 + 3.0 * it * t * t * p2 + t * t * t * p3
}

/// Tight bounds of one cubic segment. Endpoints always count; interior
/// extrema are solved per axis only when a control point escapes the
/// endpoint box.
pub(crate) fn curve_bounds(curve: &[Point; 4]) -> Bounds {
    let mut bounds = Bounds {
        min_x: curve[0].x.min(curve[3].x),
        min_y: curve[0].y.min(curve[3].y),
        max_x: curve[0].x.max(curve[3].x),
        max_y: curve[0].y.max(curve[3].y),
    };

    if bounds.contains(curve[1]) && bounds.contains(curve[2]) {
        return bounds;
    }

    for axis in 0..2 {
        let v: [f64; 4] = if axis == 0 {
            [
                curve[0].x as f64,
                curve[1].x as f64,
                curve[2].x as f64,
                curve[3].x as f64,
            ]
        } else {
            [
                curve[0].y as f64,
                curve[1].y as f64,
                curve[2].y as f64,
                curve[3].y as f64,
            ]
        };
        let a = -3.0 * v[0] + 9.0 * v[1] - 9.0 * v[2] + 3.0 * v[3];
        let b = 6.0 * v[0] - 12.0 * v[1] + 6.0 * v[2];
        let c = 3.0 * v[1] - 3.0 * v[0];

        let mut roots = [0.0f64; 2];
        let mut count = 0usize;
        if fabs(a) < EPSILON as f64 {
            if fabs(b) > EPSILON as f64 {
                let t = -c / b;
                if t > EPSILON as f64 && t < 1.0 - EPSILON as f64 {
                    roots[count] = t;
                    count += 1;
                }
            }
        } else {
            let b2ac = b * b - 4.0 * c * a;
            if b2ac > EPSILON as f64 {
                let sq = sqrt(b2ac);
                for sign in [1.0, -1.0] {
                    let t = (-b + sign * sq) / (2.0 * a);
                    if t > EPSILON as f64 && t < 1.0 - EPSILON as f64 {
                        roots[count] = t;
                        count += 1;
                    }
                }
            }
        }
        for &t in roots.iter().take(count) {
            let value = eval_bezier(t, v[0], v[1], v[2], v[3]) as f32;
            if axis == 0 {
                bounds.min_x = bounds.min_x.min(value);
                bounds.max_x = bounds.max_x.max(value);
            } else {
                bounds.min_y = bounds.min_y.min(value);
                bounds.max_y = bounds.max_y.max(value);
            }
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn translate_then_scale_order() {
        let t = Transform::translation(10.0, 0.0).then(Transform::scaling(2.0, 2.0));
        let p = t.apply(Point::new(1.0, 1.0));
        // translation happens first, so it is scaled too
        assert!(close(p.x, 22.0));
        assert!(close(p.y, 2.0));
    }

    #[test]
    fn inverse_round_trips() {
        let t = Transform::rotation(30.0)
            .then(Transform::scaling(2.0, 3.0))
            .then(Transform::translation(5.0, -7.0));
        let p = Point::new(3.5, -1.25);
        let q = t.inverse().apply(t.apply(p));
        assert!(close(q.x, p.x));
        assert!(close(q.y, p.y));
    }

    #[test]
    fn singular_inverse_is_identity() {
        let t = Transform::scaling(0.0, 0.0);
        assert_eq!(t.inverse(), Transform::identity());
    }

    #[test]
    fn rotation_about_center_fixes_center() {
        let t = Transform::rotation_about(90.0, 4.0, 4.0);
        let c = t.apply(Point::new(4.0, 4.0));
        assert!(close(c.x, 4.0));
        assert!(close(c.y, 4.0));
        let p = t.apply(Point::new(5.0, 4.0));
        assert!(close(p.x, 4.0));
        assert!(close(p.y, 5.0));
    }

    #[test]
    fn average_scale_uniform() {
        let t = Transform::scaling(3.0, 3.0).then(Transform::rotation(45.0));
        assert!(close(t.average_scale(), 3.0));
    }

    #[test]
    fn curve_bounds_includes_extrema() {
        // Bulges above its endpoints: max y is at t=0.5.
        let curve = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 0.0),
        ];
        let b = curve_bounds(&curve);
        assert!(close(b.min_x, 0.0));
        assert!(close(b.max_x, 4.0));
        assert!(close(b.min_y, 0.0));
        assert!(close(b.max_y, 3.0));
    }

    #[test]
    fn curve_bounds_control_points_inside_short_circuit() {
        let curve = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ];
        let b = curve_bounds(&curve);
        assert_eq!(b.min_x, 0.0);
        assert_eq!(b.max_y, 3.0);
    }
}
