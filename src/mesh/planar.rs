use std::collections::HashSet;

use log::{debug, warn};

use super::geometry::{clockwise_angle, distance_point_to_segment, point_on_segment};
use super::tiling::Tiling;
use super::types::{GridPoint, VertexId, rail_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embedding {
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub boundary: Vec<VertexId>,
    /// The walk revisited a vertex before closing.
    pub degenerate: bool,
}

impl Face {
    /// Shoelace area; bounded faces come out positive, the outer face negative.
    pub fn signed_area(&self, tiling: &Tiling) -> f64 {
        let n = self.boundary.len();
        let mut twice = 0.0;
        for i in 0..n {
            let (ax, ay) = tiling.pos(self.boundary[i]).to_f64();
            let (bx, by) = tiling.pos(self.boundary[(i + 1) % n]).to_f64();
            twice += ax * by - bx * ay;
        }
        twice / 2.0
    }

    fn segments(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        let n = self.boundary.len();
        (0..n).map(move |i| (self.boundary[i], self.boundary[(i + 1) % n]))
    }

    /// Every boundary rail still exists and every boundary vertex is live.
    pub fn is_intact(&self, tiling: &Tiling) -> bool {
        self.boundary.iter().all(|&v| tiling.is_live(v))
            && self.segments().all(|(a, b)| tiling.are_adjacent(a, b))
    }
}

/// Orders every adjacency clockwise, starting from its current first rail.
pub fn embed_planar(tiling: &mut Tiling) -> Embedding {
    let live: Vec<VertexId> = tiling.live_vertices().collect();
    for v in live {
        if tiling.degree(v) < 3 {
            continue;
        }
        let apex = tiling.pos(v);
        let reference = tiling.pos(tiling.rails(v)[0].target);
        let angles: Vec<(f64, VertexId)> = tiling
            .rails(v)
            .iter()
            .map(|rail| (clockwise_angle(apex, reference, tiling.pos(rail.target)), rail.target))
            .collect();
        tiling.adjacency_mut(v).sort_by(|a, b| {
            let angle_of = |target| {
                angles
                    .iter()
                    .find(|(_, t)| *t == target)
                    .map_or(0.0, |(angle, _)| *angle)
            };
            angle_of(a.target).total_cmp(&angle_of(b.target))
        });
    }
    let broken = tiling.check_symmetry();
    if !broken.is_empty() {
        warn!("embedding is inconsistent: {} one-sided rails", broken.len());
    }
    Embedding {
        consistent: broken.is_empty(),
    }
}

/// The neighbor of `u` that follows `v` in clockwise order, wrapping around.
pub fn next_clockwise_neighbor(tiling: &Tiling, u: VertexId, v: VertexId) -> Option<VertexId> {
    let rails = tiling.rails(u);
    let idx = rails.iter().position(|rail| rail.target == v)?;
    Some(rails[(idx + 1) % rails.len()].target)
}

/// Walks the face bounded by the directed rail `tail → head`.
pub fn right_face(tiling: &Tiling, tail: VertexId, head: VertexId) -> Face {
    let mut boundary = vec![tail];
    let (mut t, mut h) = (tail, head);
    for _ in 0..=tiling.vertex_count() {
        let Some(next) = next_clockwise_neighbor(tiling, h, t) else {
            break;
        };
        if h == tail && next == head {
            return Face {
                boundary,
                degenerate: false,
            };
        }
        if boundary.contains(&h) {
            break;
        }
        boundary.push(h);
        t = h;
        h = next;
    }
    Face {
        boundary,
        degenerate: true,
    }
}

/// Smallest gap between two boundary segments that share no endpoint.
/// Collinear segments count, so a side split into several rails measures
/// the length of its inner pieces.
pub fn face_width(tiling: &Tiling, face: &Face) -> f64 {
    let segments: Vec<(GridPoint, GridPoint)> = face
        .segments()
        .map(|(a, b)| (tiling.pos(a), tiling.pos(b)))
        .collect();
    let mut width = f64::INFINITY;
    for (i, &(a, b)) in segments.iter().enumerate() {
        for &(c, d) in &segments[i + 1..] {
            if a == c || a == d || b == c || b == d {
                continue;
            }
            for gap in [
                distance_point_to_segment(a, b, c),
                distance_point_to_segment(a, b, d),
                distance_point_to_segment(c, d, a),
                distance_point_to_segment(c, d, b),
            ] {
                width = width.min(gap);
            }
        }
    }
    width
}

/// Every distinct bounded face, each rail direction visited once.
pub fn bounded_faces(tiling: &Tiling) -> Vec<Face> {
    let mut seen: HashSet<(VertexId, VertexId)> = HashSet::new();
    let mut faces = Vec::new();
    for u in tiling.live_vertices() {
        for v in tiling.neighbors(u) {
            if seen.contains(&(u, v)) {
                continue;
            }
            let face = right_face(tiling, u, v);
            for (a, b) in face.segments() {
                seen.insert((a, b));
            }
            seen.insert((u, v));
            if !face.degenerate && face.boundary.len() >= 3 && face.signed_area(tiling) > 0.0 {
                faces.push(face);
            }
        }
    }
    faces
}

/// Opens up sliver faces that contain no original node by deleting their
/// longest rail. A face counts as thin when its width is at most
/// `thinness`. Returns the number of rails removed.
pub fn remove_long_edge_from_thin_faces(tiling: &mut Tiling, thinness: f64) -> usize {
    let faces: Vec<Face> = bounded_faces(tiling)
        .into_iter()
        .filter(|face| face.boundary.iter().all(|&v| !tiling.is_original(v)))
        .collect();
    let mut removed = 0;
    for face in faces {
        if !face.is_intact(tiling) || face_width(tiling, &face) > thinness {
            continue;
        }
        // A rail walked in both directions is a bridge; removing it would cut the mesh.
        let walked: HashSet<(VertexId, VertexId)> = face.segments().collect();
        let longest = face
            .segments()
            .filter(|&(a, b)| !walked.contains(&(b, a)))
            .map(|(a, b)| rail_key(a, b))
            .max_by(|&(a, b), &(c, d)| {
                tiling
                    .rail_length(a, b)
                    .total_cmp(&tiling.rail_length(c, d))
                    .then_with(|| (c, d).cmp(&(a, b)))
            });
        if let Some((a, b)) = longest
            && tiling.remove_edge(a, b)
        {
            removed += 1;
        }
    }
    debug!("thin faces: removed {removed} rails");
    removed
}

/// True when no rail passes through a vertex it does not end at.
pub fn rails_avoid_vertices(tiling: &Tiling) -> bool {
    tiling.edges().into_iter().all(|(a, b)| {
        let (pa, pb) = (tiling.pos(a), tiling.pos(b));
        let min = GridPoint::new(pa.x.min(pb.x), pa.y.min(pb.y));
        let max = GridPoint::new(pa.x.max(pb.x), pa.y.max(pb.y));
        tiling
            .query_region(min, max)
            .into_iter()
            .filter(|&c| c != a && c != b)
            .all(|c| !point_on_segment(pa, pb, tiling.pos(c)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tiling::{LocationIndex, TilingLimits};

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    fn with_junctions(originals: &[GridPoint], junctions: &[GridPoint]) -> (Tiling, Vec<VertexId>) {
        let mut tiling = Tiling::new(originals, TilingLimits::default()).unwrap();
        let mut locations = LocationIndex::new();
        let ids = junctions
            .iter()
            .map(|&q| tiling.insert_vertex_dedup(q, &mut locations).unwrap())
            .collect();
        (tiling, ids)
    }

    fn ring(tiling: &mut Tiling, ids: &[VertexId]) {
        for i in 0..ids.len() {
            tiling.add_edge(ids[i], ids[(i + 1) % ids.len()]).unwrap();
        }
    }

    #[test]
    fn plus_shape_is_sorted_clockwise() {
        let mut tiling =
            Tiling::new(&[p(5, 5), p(10, 5), p(5, 10), p(0, 5), p(5, 0)], TilingLimits::default())
                .unwrap();
        for n in [2, 1, 4, 3] {
            tiling.add_edge(0, n).unwrap();
        }
        assert!(embed_planar(&mut tiling).consistent);
        let order: Vec<VertexId> = tiling.neighbors(0).collect();
        // north, east, south, west
        assert_eq!(order, vec![2, 1, 4, 3]);
        assert_eq!(next_clockwise_neighbor(&tiling, 0, 3), Some(2));
    }

    #[test]
    fn square_has_one_bounded_face() {
        let (mut tiling, ids) = with_junctions(&[p(0, 0)], &[p(4, 0), p(4, 4), p(0, 4)]);
        ring(&mut tiling, &[0, ids[0], ids[1], ids[2]]);
        embed_planar(&mut tiling);
        let inner = right_face(&tiling, 0, ids[0]);
        assert!(!inner.degenerate);
        assert_eq!(inner.boundary.len(), 4);
        assert!(inner.signed_area(&tiling) > 0.0);
        assert_eq!(bounded_faces(&tiling).len(), 1);
    }

    #[test]
    fn dangling_rail_makes_a_degenerate_walk() {
        let (mut tiling, ids) = with_junctions(&[p(0, 0)], &[p(4, 0), p(8, 0)]);
        tiling.add_edge(0, ids[0]).unwrap();
        tiling.add_edge(ids[0], ids[1]).unwrap();
        embed_planar(&mut tiling);
        assert!(right_face(&tiling, 0, ids[0]).degenerate);
    }

    #[test]
    fn thin_junction_face_loses_its_longest_rail() {
        let (mut tiling, ids) =
            with_junctions(&[p(50, 50)], &[p(0, 0), p(10, 0), p(10, 1), p(0, 1)]);
        ring(&mut tiling, &ids);
        embed_planar(&mut tiling);
        assert!(face_width(&tiling, &bounded_faces(&tiling)[0]) < 2.0);
        assert_eq!(remove_long_edge_from_thin_faces(&mut tiling, 2.0), 1);
        assert_eq!(tiling.edges().len(), 3);
        assert!(tiling.are_adjacent(ids[1], ids[2]));
        assert!(tiling.are_adjacent(ids[3], ids[0]));
    }

    #[test]
    fn wide_faces_and_faces_with_nodes_survive() {
        let (mut tiling, ids) = with_junctions(
            &[p(0, 1)],
            &[p(0, 0), p(10, 0), p(10, 1), p(20, 0), p(30, 0), p(30, 10), p(20, 10)],
        );
        ring(&mut tiling, &[ids[0], ids[1], ids[2], 0]);
        ring(&mut tiling, &ids[3..]);
        embed_planar(&mut tiling);
        assert_eq!(remove_long_edge_from_thin_faces(&mut tiling, 2.0), 0);
    }

    #[test]
    fn face_exactly_at_the_threshold_is_opened() {
        let (mut tiling, ids) =
            with_junctions(&[p(50, 50)], &[p(0, 0), p(10, 0), p(10, 2), p(0, 2)]);
        ring(&mut tiling, &ids);
        embed_planar(&mut tiling);
        assert_eq!(face_width(&tiling, &bounded_faces(&tiling)[0]), 2.0);
        assert_eq!(remove_long_edge_from_thin_faces(&mut tiling, 2.0), 1);
        assert_eq!(tiling.edges().len(), 3);
    }

    #[test]
    fn split_side_measures_its_inner_piece() {
        let (mut tiling, ids) = with_junctions(
            &[p(50, 50)],
            &[p(0, 0), p(4, 0), p(5, 0), p(10, 0), p(10, 10), p(0, 10)],
        );
        ring(&mut tiling, &ids);
        embed_planar(&mut tiling);
        assert_eq!(face_width(&tiling, &bounded_faces(&tiling)[0]), 1.0);
        assert_eq!(remove_long_edge_from_thin_faces(&mut tiling, 2.0), 1);
        assert_eq!(tiling.edges().len(), 5);
        // Ties on length go to the smallest rail key.
        assert!(!tiling.are_adjacent(ids[0], ids[5]));
    }
}
