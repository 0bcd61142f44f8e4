//! Small geometry kernel shared by the builder, the planar utilities and
//! refinement. Everything here is a pure function over grid points.

use std::f64::consts::{FRAC_PI_2, PI};

use super::types::GridPoint;

const ON_SEGMENT_EPS: f64 = 1e-9;

fn as_f64(p: GridPoint) -> (f64, f64) {
    (f64::from(p.x), f64::from(p.y))
}

pub fn length(a: GridPoint, b: GridPoint) -> f64 {
    let (ax, ay) = as_f64(a);
    let (bx, by) = as_f64(b);
    (bx - ax).hypot(by - ay)
}

/// Angle at `apex` between the rays towards `v1` and `v2`.
///
/// The true angle is only reported when both neighbors sit in the same
/// quadrant around the apex (both strictly greater, or both strictly less, on
/// each axis). Any other configuration answers π/2. Callers use this purely as
/// a resolution guard, where an underestimate would reject a valid move but an
/// overestimate could admit a bad one.
pub fn acute_angle(apex: GridPoint, v1: GridPoint, v2: GridPoint) -> f64 {
    let greater = v1.x > apex.x && v2.x > apex.x && v1.y > apex.y && v2.y > apex.y;
    let less = v1.x < apex.x && v2.x < apex.x && v1.y < apex.y && v2.y < apex.y;
    if !(greater || less) {
        return FRAC_PI_2;
    }
    let (ax, ay) = as_f64(apex);
    let (x1, y1) = as_f64(v1);
    let (x2, y2) = as_f64(v2);
    let (ux, uy) = (x1 - ax, y1 - ay);
    let (wx, wy) = (x2 - ax, y2 - ay);
    let norm = ux.hypot(uy) * wx.hypot(wy);
    if norm == 0.0 {
        return 0.0;
    }
    ((ux * wx + uy * wy) / norm).clamp(-1.0, 1.0).acos()
}

/// Clockwise angle in `[0, 2π)` sweeping from `apex→v1` to `apex→v2`.
pub fn clockwise_angle(apex: GridPoint, v1: GridPoint, v2: GridPoint) -> f64 {
    let (ax, ay) = as_f64(apex);
    let (x1, y1) = as_f64(v1);
    let (x2, y2) = as_f64(v2);
    let (ux, uy) = (x1 - ax, y1 - ay);
    let (wx, wy) = (x2 - ax, y2 - ay);
    let cross = ux * wy - uy * wx;
    let dot = ux * wx + uy * wy;
    let angle = -cross.atan2(dot);
    if angle < 0.0 { angle + 2.0 * PI } else { angle }
}

/// Distance from `p` to the closed segment `[a, b]`.
pub fn distance_point_to_segment(a: GridPoint, b: GridPoint, p: GridPoint) -> f64 {
    distance_point_to_segment_f(as_f64(a), as_f64(b), as_f64(p))
}

pub fn distance_point_to_segment_f(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    if abx * apx + aby * apy <= 0.0 {
        return apx.hypot(apy);
    }
    let (bpx, bpy) = (p.0 - b.0, p.1 - b.1);
    if abx * bpx + aby * bpy >= 0.0 {
        return bpx.hypot(bpy);
    }
    (abx * apy - aby * apx).abs() / abx.hypot(aby)
}

/// Distance from `p` to the infinite line through `a` and `b`.
pub fn perpendicular_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return (p.0 - a.0).hypot(p.1 - a.1);
    }
    (dx * (p.1 - a.1) - dy * (p.0 - a.0)).abs() / len
}

pub fn is_axis_aligned(a: GridPoint, b: GridPoint) -> bool {
    a.x == b.x || a.y == b.y
}

/// True when `[a, b]` is axis-aligned and `p` lies on it, endpoints included.
pub fn segment_contains_point_axis_aligned(a: GridPoint, b: GridPoint, p: GridPoint) -> bool {
    if a.x == b.x {
        p.x == a.x && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    } else if a.y == b.y {
        p.y == a.y && p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x)
    } else {
        false
    }
}

/// Like [`segment_contains_point_axis_aligned`] but excludes both endpoints.
pub fn segment_strictly_contains(a: GridPoint, b: GridPoint, p: GridPoint) -> bool {
    p != a && p != b && segment_contains_point_axis_aligned(a, b, p)
}

/// True when `p` lies on the (possibly diagonal) segment `[a, b]`.
pub fn point_on_segment(a: GridPoint, b: GridPoint, p: GridPoint) -> bool {
    let cross = i64::from(b.x - a.x) * i64::from(p.y - a.y)
        - i64::from(b.y - a.y) * i64::from(p.x - a.x);
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn within_box(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    c.0 >= a.0.min(b.0) - ON_SEGMENT_EPS
        && c.0 <= a.0.max(b.0) + ON_SEGMENT_EPS
        && c.1 >= a.1.min(b.1) - ON_SEGMENT_EPS
        && c.1 <= a.1.max(b.1) + ON_SEGMENT_EPS
}

/// Closed-segment intersection test, touching and collinear overlap included.
pub fn segments_intersect(a: GridPoint, b: GridPoint, c: GridPoint, d: GridPoint) -> bool {
    let (a, b, c, d) = (as_f64(a), as_f64(b), as_f64(c), as_f64(d));
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= ON_SEGMENT_EPS && within_box(a, b, c))
        || (o2.abs() <= ON_SEGMENT_EPS && within_box(a, b, d))
        || (o3.abs() <= ON_SEGMENT_EPS && within_box(c, d, a))
        || (o4.abs() <= ON_SEGMENT_EPS && within_box(c, d, b))
}

/// Intersection test that tolerates segments meeting at one shared endpoint.
///
/// Two segments sharing an endpoint only count as crossing when they also
/// overlap collinearly beyond that endpoint.
pub fn segments_cross(a: GridPoint, b: GridPoint, c: GridPoint, d: GridPoint) -> bool {
    let shared = if a == c || a == d {
        Some((a, b, if a == c { d } else { c }))
    } else if b == c || b == d {
        Some((b, a, if b == c { d } else { c }))
    } else {
        None
    };
    match shared {
        None => segments_intersect(a, b, c, d),
        Some((_, far1, far2)) if far1 == far2 => true,
        Some((common, far1, far2)) => {
            // Only collinear overlap on the same side of the shared point counts.
            let collinear = orient(as_f64(common), as_f64(far1), as_f64(far2)).abs() <= ON_SEGMENT_EPS;
            collinear
                && (point_on_segment(common, far1, far2) || point_on_segment(common, far2, far1))
        }
    }
}
