use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::Result;

use super::geometry::{point_on_segment, segment_contains_point_axis_aligned, segment_strictly_contains};
use super::tiling::{LocationIndex, Tiling};
use super::types::{Bounds, GridPoint, VertexId};

/// What a consolidation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub merged: usize,
    pub relinked: usize,
    pub split: usize,
    /// Junctions inserted where two rails crossed.
    pub crossings: usize,
}

/// Cleans a freshly grown mesh.
///
/// 1. Coincident vertices collapse onto the lowest id.
/// 2. Segments traced from both ends by opposing rays are relinked so only
///    consecutive collinear vertices stay connected.
/// 3. Any rail passing through a third vertex is split there, repeatedly.
/// 4. A horizontal rail crossing a vertical one gets a junction at the
///    crossing, and both are split there.
pub fn fix_mesh(tiling: &mut Tiling, traced: &[(GridPoint, GridPoint)]) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport {
        merged: merge_coincident(tiling)?,
        ..ConsolidationReport::default()
    };
    report.relinked = relink_opposing(tiling, traced)?;
    report.split = split_through_vertices(tiling)?;
    report.crossings = split_crossings(tiling)?;
    if report.crossings > 0 {
        report.split += split_through_vertices(tiling)?;
    }
    debug!(
        "consolidation: merged {}, relinked {}, split {}, crossings {}",
        report.merged, report.relinked, report.split, report.crossings
    );
    Ok(report)
}

fn merge_coincident(tiling: &mut Tiling) -> Result<usize> {
    let mut groups: BTreeMap<GridPoint, Vec<VertexId>> = BTreeMap::new();
    for id in tiling.live_vertices() {
        groups.entry(tiling.pos(id)).or_default().push(id);
    }
    let mut merged = 0;
    for ids in groups.values().filter(|ids| ids.len() > 1) {
        let keep = ids[0];
        for &dup in &ids[1..] {
            tiling.merge_vertex_into(dup, keep)?;
            merged += 1;
        }
    }
    Ok(merged)
}

fn relink_opposing(tiling: &mut Tiling, traced: &[(GridPoint, GridPoint)]) -> Result<usize> {
    let forward: BTreeSet<(GridPoint, GridPoint)> =
        traced.iter().copied().filter(|(s, e)| s != e).collect();
    let mut relinked = 0;
    for &(start, end) in &forward {
        if start > end || !forward.contains(&(end, start)) {
            continue;
        }
        let (min, max) = span(start, end);
        let on_line: Vec<VertexId> = tiling
            .query_region(min, max)
            .into_iter()
            .filter(|&id| segment_contains_point_axis_aligned(start, end, tiling.pos(id)))
            .collect();
        relinked += tiling.relink_collinear(&on_line)?;
    }
    Ok(relinked)
}

fn split_through_vertices(tiling: &mut Tiling) -> Result<usize> {
    let mut work = tiling.edges();
    let mut split = 0;
    while let Some((a, b)) = work.pop() {
        if !tiling.are_adjacent(a, b) {
            continue;
        }
        let (pa, pb) = (tiling.pos(a), tiling.pos(b));
        let (min, max) = span(pa, pb);
        let through = tiling
            .query_region(min, max)
            .into_iter()
            .filter(|&c| c != a && c != b)
            .filter(|&c| {
                let pc = tiling.pos(c);
                pc != pa && pc != pb && point_on_segment(pa, pb, pc)
            })
            .min_by_key(|&c| (pa.manhattan(tiling.pos(c)), c));
        if let Some(c) = through
            && tiling.split_rail(a, b, &[c])?
        {
            split += 1;
            work.push((a, c));
            work.push((c, b));
        }
    }
    Ok(split)
}

fn span(a: GridPoint, b: GridPoint) -> (GridPoint, GridPoint) {
    (
        GridPoint::new(a.x.min(b.x), a.y.min(b.y)),
        GridPoint::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

/// Where a horizontal and a vertical segment would meet if extended.
fn axis_meeting(a: GridPoint, b: GridPoint, c: GridPoint, d: GridPoint) -> Option<GridPoint> {
    if a.y == b.y && c.x == d.x {
        Some(GridPoint::new(c.x, a.y))
    } else if a.x == b.x && c.y == d.y {
        Some(GridPoint::new(a.x, c.y))
    } else {
        None
    }
}

fn split_crossings(tiling: &mut Tiling) -> Result<usize> {
    let mut locations = LocationIndex::new();
    let mut work = tiling.edges();
    let mut crossings = 0;
    while let Some((a, b)) = work.pop() {
        if !tiling.are_adjacent(a, b) {
            continue;
        }
        let (pa, pb) = (tiling.pos(a), tiling.pos(b));
        let (min, max) = span(pa, pb);
        let crossing = tiling.rails_in_region(min, max).into_iter().find_map(|(c, d)| {
            let (pc, pd) = (tiling.pos(c), tiling.pos(d));
            let at = axis_meeting(pa, pb, pc, pd)?;
            (segment_strictly_contains(pa, pb, at) && segment_strictly_contains(pc, pd, at))
                .then_some((c, d, at))
        });
        let Some((c, d, at)) = crossing else {
            continue;
        };
        let junction = tiling.insert_vertex_dedup(at, &mut locations)?;
        tiling.split_rail(a, b, &[junction])?;
        tiling.split_rail(c, d, &[junction])?;
        crossings += 1;
        work.extend([(a, junction), (junction, b), (c, junction), (junction, d)]);
    }
    Ok(crossings)
}

/// Puts a vertex on every corner of the box and links each side through
/// every vertex lying on it.
pub(super) fn wire_box(tiling: &mut Tiling, bounds: Bounds, locations: &mut LocationIndex) -> Result<()> {
    let corners = bounds.corners();
    for corner in corners {
        tiling.insert_vertex_dedup(corner, locations)?;
    }
    for i in 0..corners.len() {
        let (min, max) = span(corners[i], corners[(i + 1) % corners.len()]);
        let on_side = tiling.query_region(min, max);
        tiling.relink_collinear(&on_side)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tiling::{LocationIndex, TilingLimits};

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    #[test]
    fn splits_rails_through_vertices_until_none_remain() {
        let mut tiling =
            Tiling::new(&[p(0, 0), p(3, 0), p(7, 0), p(10, 0)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 3).unwrap();
        let report = fix_mesh(&mut tiling, &[]).unwrap();
        assert_eq!(report.split, 2);
        assert!(tiling.are_adjacent(0, 1));
        assert!(tiling.are_adjacent(1, 2));
        assert!(tiling.are_adjacent(2, 3));
        assert!(!tiling.are_adjacent(0, 3));
    }

    #[test]
    fn overlapping_collinear_rails_are_separated() {
        let mut tiling =
            Tiling::new(&[p(0, 0), p(3, 0), p(5, 0), p(8, 0)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 2).unwrap();
        tiling.add_edge(1, 3).unwrap();
        fix_mesh(&mut tiling, &[]).unwrap();
        let mut edges = tiling.edges();
        edges.sort();
        assert_eq!(edges, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn opposing_traces_are_relinked_consecutively() {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0)], TilingLimits::default()).unwrap();
        let mut locations = LocationIndex::new();
        let mid = tiling.insert_vertex_dedup(p(4, 0), &mut locations).unwrap();
        tiling.add_edge(0, 1).unwrap();
        tiling.add_edge(0, mid).unwrap();
        let report = fix_mesh(&mut tiling, &[(p(0, 0), p(10, 0)), (p(10, 0), p(0, 0))]).unwrap();
        assert_eq!(report.relinked, 2);
        assert!(!tiling.are_adjacent(0, 1));
        assert!(tiling.are_adjacent(mid, 1));
    }

    #[test]
    fn crossing_rails_meet_at_a_new_junction() {
        let mut tiling =
            Tiling::new(&[p(0, 5), p(10, 5), p(4, 0), p(4, 9)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 1).unwrap();
        tiling.add_edge(2, 3).unwrap();
        let report = fix_mesh(&mut tiling, &[]).unwrap();
        assert_eq!(report.crossings, 1);
        let junction = tiling.vertex_at(p(4, 5)).unwrap();
        assert_eq!(tiling.degree(junction), 4);
        assert!(!tiling.are_adjacent(0, 1) && !tiling.are_adjacent(2, 3));
        assert!(tiling.check_symmetry().is_empty());
    }

    #[test]
    fn touching_rails_are_left_alone() {
        let mut tiling =
            Tiling::new(&[p(0, 5), p(10, 5), p(4, 5), p(4, 9)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 2).unwrap();
        tiling.add_edge(2, 1).unwrap();
        tiling.add_edge(2, 3).unwrap();
        let report = fix_mesh(&mut tiling, &[]).unwrap();
        assert_eq!(report.crossings, 0);
        assert_eq!(tiling.edges().len(), 3);
    }

    #[test]
    fn box_sides_link_through_border_vertices() {
        let mut tiling = Tiling::new(&[p(4, 0), p(10, 7)], TilingLimits::default()).unwrap();
        wire_box(&mut tiling, Bounds::new(10, 10), &mut LocationIndex::new()).unwrap();
        // Four sides, two of them split once.
        assert_eq!(tiling.edges().len(), 6);
        assert!(tiling.are_adjacent(0, tiling.vertex_at(p(0, 0)).unwrap()));
        assert!(tiling.are_adjacent(1, tiling.vertex_at(p(10, 10)).unwrap()));
    }
}
