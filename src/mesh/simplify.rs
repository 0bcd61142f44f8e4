use super::geometry::perpendicular_distance;

/// Douglas–Peucker reduction of an open polyline.
///
/// Both endpoints always survive. A negative `epsilon` behaves like zero.
pub fn simplify_polyline(points: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let epsilon = epsilon.max(0.0);
    let mut kept: Vec<Option<(f64, f64)>> = points.iter().copied().map(Some).collect();
    let mut spans = vec![(0, points.len() - 1)];
    while let Some((first, last)) = spans.pop() {
        if last <= first + 1 {
            continue;
        }
        let (split, deviation) = (first + 1..last)
            .map(|i| (i, perpendicular_distance(points[i], points[first], points[last])))
            .fold((first, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if deviation > epsilon {
            spans.push((first, split));
            spans.push((split, last));
        } else {
            for slot in &mut kept[first + 1..last] {
                *slot = None;
            }
        }
    }
    kept.into_iter().flatten().collect()
}
