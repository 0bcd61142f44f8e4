//! Local mesh modifications: dropping junctions that only bend a single
//! route, folding short junction rails together, nudging junctions to
//! shorten or straighten the rails around them, and detour rings around
//! nodes.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::geometry::{acute_angle, distance_point_to_segment, is_axis_aligned, length, segments_cross};
use super::tiling::{LocationIndex, Tiling};
use super::types::{Bounds, GridPoint, VertexId};

pub const DEFAULT_SEPARATION: f64 = 0.5;
pub const DEFAULT_ANGULAR_RESOLUTION: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElisionConfig {
    /// Minimum distance between a new rail and any unrelated vertex.
    pub separation: f64,
    /// Minimum angle, in radians, between rails sharing an endpoint.
    pub angular_resolution: f64,
    pub iterations: usize,
}

impl Default for ElisionConfig {
    fn default() -> Self {
        Self {
            separation: DEFAULT_SEPARATION,
            angular_resolution: DEFAULT_ANGULAR_RESOLUTION,
            iterations: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionObjective {
    /// Total length of the junction's rails.
    #[default]
    Ink,
    /// Length of the rails claimed at the coarsest zoom level around the junction.
    ZoomStretch,
    /// Smallest angle between any two of the junction's rails, maximized.
    AngularResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionConfig {
    pub objective: PositionObjective,
    /// Grid step of every trial move.
    pub unit: i32,
    pub iterations: usize,
    pub separation: f64,
    pub angular_resolution: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            objective: PositionObjective::Ink,
            unit: 1,
            iterations: 10,
            separation: DEFAULT_SEPARATION,
            angular_resolution: DEFAULT_ANGULAR_RESOLUTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractionConfig {
    /// Junction rails shorter than this are contracted in the first pass.
    pub min_length: f64,
    /// Passes to run; the length threshold doubles after each one.
    pub iterations: usize,
    pub separation: f64,
    pub angular_resolution: f64,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            min_length: 2.0,
            iterations: 3,
            separation: DEFAULT_SEPARATION,
            angular_resolution: DEFAULT_ANGULAR_RESOLUTION,
        }
    }
}

/// A junction removed by [`elide_degree_two`], with the two vertices its
/// rails led to. Those two are now joined directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elision {
    pub junction: VertexId,
    pub ends: (VertexId, VertexId),
}

fn envelope(a: GridPoint, b: GridPoint, pad: f64) -> (GridPoint, GridPoint) {
    let pad = pad.ceil() as i32;
    (
        GridPoint::new(a.x.min(b.x) - pad, a.y.min(b.y) - pad),
        GridPoint::new(a.x.max(b.x) + pad, a.y.max(b.y) + pad),
    )
}

/// No vertex outside `skip` with at least one rail sits closer than
/// `separation` to the segment `a`–`b`.
fn well_separated(tiling: &Tiling, a: GridPoint, b: GridPoint, skip: &[VertexId], separation: f64) -> bool {
    let (min, max) = envelope(a, b, separation);
    tiling
        .query_region(min, max)
        .into_iter()
        .filter(|c| !skip.contains(c) && tiling.degree(*c) > 0)
        .all(|c| distance_point_to_segment(a, b, tiling.pos(c)) >= separation)
}

/// The segment `a`–`b` neither crosses nor runs along any rail, ignoring
/// rails of the vertices in `leaving`. Sharing an endpoint is allowed.
fn crosses_nothing(tiling: &Tiling, a: GridPoint, b: GridPoint, leaving: &[VertexId]) -> bool {
    let (min, max) = envelope(a, b, 0.0);
    tiling
        .rails_in_region(min, max)
        .into_iter()
        .filter(|(c, d)| !leaving.contains(c) && !leaving.contains(d))
        .all(|(c, d)| !segments_cross(a, b, tiling.pos(c), tiling.pos(d)))
}

/// Every rail of `at` other than the one to `ignore` keeps its angle with
/// the direction towards `towards`.
fn angles_hold(
    tiling: &Tiling,
    at: VertexId,
    towards: GridPoint,
    ignore: VertexId,
    resolution: f64,
) -> bool {
    let apex = tiling.pos(at);
    tiling
        .neighbors(at)
        .filter(|&n| n != ignore)
        .all(|n| acute_angle(apex, towards, tiling.pos(n)) >= resolution)
}

// ── Degree-two elision ─────────────────────────────────────────────

fn prune_dangling(tiling: &mut Tiling) -> usize {
    let mut pruned = 0;
    let mut work: Vec<VertexId> = tiling.live_junctions().collect();
    while let Some(j) = work.pop() {
        if !tiling.is_live(j) || tiling.degree(j) > 1 {
            continue;
        }
        let first = tiling.neighbors(j).next();
        match first {
            Some(n) => {
                tiling.remove_edge(j, n);
                if !tiling.is_original(n) {
                    work.push(n);
                }
            }
            None => {
                tiling.invalidate(j);
            }
        }
        pruned += 1;
    }
    pruned
}

fn elidable(tiling: &Tiling, j: VertexId, a: VertexId, b: VertexId, config: &ElisionConfig) -> bool {
    if a == b || tiling.are_adjacent(a, b) {
        return false;
    }
    let (pa, pb) = (tiling.pos(a), tiling.pos(b));
    well_separated(tiling, pa, pb, &[a, b, j], config.separation)
        && angles_hold(tiling, a, pb, j, config.angular_resolution)
        && angles_hold(tiling, b, pa, j, config.angular_resolution)
        && crosses_nothing(tiling, pa, pb, &[j])
}

/// Replaces junctions that merely bend between two neighbors with a direct
/// rail, after pruning dead-end junctions. Repeats until stable or
/// `config.iterations` passes have run.
pub fn elide_degree_two(tiling: &mut Tiling, config: &ElisionConfig) -> Result<Vec<Elision>> {
    let mut elisions = Vec::new();
    let mut pruned = 0;
    for _ in 0..config.iterations {
        pruned += prune_dangling(tiling);
        let mut changed = false;
        let candidates: Vec<VertexId> = tiling.live_junctions().collect();
        for j in candidates {
            if !tiling.is_live(j) || tiling.degree(j) != 2 {
                continue;
            }
            let rails = tiling.rails(j);
            let (a, b) = (rails[0].target, rails[1].target);
            if !elidable(tiling, j, a, b, config) {
                continue;
            }
            let marks = match (tiling.rail_marks(j, a), tiling.rail_marks(j, b)) {
                (Some(first), Some(second)) => first.merge(second),
                (Some(only), None) | (None, Some(only)) => only,
                (None, None) => continue,
            };
            tiling.invalidate(j);
            tiling.add_edge_with_marks(a, b, marks)?;
            elisions.push(Elision { junction: j, ends: (a, b) });
            changed = true;
        }
        if !changed {
            break;
        }
    }
    debug!("elision: pruned {pruned}, elided {}", elisions.len());
    Ok(elisions)
}

// ── Short rail contraction ─────────────────────────────────────────

/// A junction folded into a neighboring junction by [`contract_short_rails`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contraction {
    pub removed: VertexId,
    pub kept: VertexId,
}

/// Whether `n` can be folded into `w`: every rail of `n` is redrawn from
/// `w` without crowding, crossing or overlapping anything.
fn contractible(tiling: &Tiling, w: VertexId, n: VertexId, config: &ContractionConfig) -> bool {
    let pw = tiling.pos(w);
    let incoming: Vec<VertexId> = tiling
        .neighbors(n)
        .filter(|&x| x != w && !tiling.are_adjacent(w, x))
        .collect();
    if tiling.degree(w) - 1 + incoming.len() > tiling.limits().max_degree {
        return false;
    }
    for (i, &x) in incoming.iter().enumerate() {
        let px = tiling.pos(x);
        for &y in &incoming[i + 1..] {
            let py = tiling.pos(y);
            if acute_angle(pw, px, py) < config.angular_resolution || segments_cross(pw, px, pw, py) {
                return false;
            }
        }
        if !well_separated(tiling, pw, px, &[w, x, n], config.separation)
            || !angles_hold(tiling, w, px, n, config.angular_resolution)
            || !angles_hold(tiling, x, pw, n, config.angular_resolution)
            || !crosses_nothing(tiling, pw, px, &[n])
        {
            return false;
        }
    }
    true
}

/// Folds junctions joined by a short rail into one. The threshold starts at
/// `config.min_length` and doubles after every pass.
pub fn contract_short_rails(tiling: &mut Tiling, config: &ContractionConfig) -> Result<Vec<Contraction>> {
    let mut contractions = Vec::new();
    let mut threshold = config.min_length;
    for _ in 0..config.iterations {
        let junctions: Vec<VertexId> = tiling.live_junctions().collect();
        for w in junctions {
            if !tiling.is_live(w) {
                continue;
            }
            let short: Vec<VertexId> = tiling
                .neighbors(w)
                .filter(|&n| !tiling.is_original(n) && tiling.rail_length(w, n) < threshold)
                .collect();
            for n in short {
                if !tiling.is_live(n) || !tiling.are_adjacent(w, n) || !contractible(tiling, w, n, config) {
                    continue;
                }
                tiling.merge_vertex_into(n, w)?;
                contractions.push(Contraction { removed: n, kept: w });
            }
        }
        threshold *= 2.0;
    }
    debug!("contraction: folded {} junctions", contractions.len());
    Ok(contractions)
}

// ── Position optimization ──────────────────────────────────────────

const OFFSETS: [(i32, i32); 9] = [
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (0, 0),
];

fn score(tiling: &Tiling, j: VertexId, at: GridPoint, objective: PositionObjective) -> f64 {
    let rails = tiling.rails(j);
    match objective {
        PositionObjective::Ink => rails.iter().map(|r| length(at, tiling.pos(r.target))).sum(),
        PositionObjective::ZoomStretch => {
            let coarsest = rails.iter().map(|r| r.used).filter(|&z| z != 0).min();
            rails
                .iter()
                .filter(|r| coarsest.is_none_or(|z| r.used == z))
                .map(|r| length(at, tiling.pos(r.target)))
                .sum()
        }
        PositionObjective::AngularResolution => {
            let mut worst = f64::INFINITY;
            for (i, first) in rails.iter().enumerate() {
                for second in &rails[i + 1..] {
                    worst = worst.min(acute_angle(at, tiling.pos(first.target), tiling.pos(second.target)));
                }
            }
            -worst
        }
    }
}

fn can_move(tiling: &Tiling, j: VertexId, to: GridPoint, bounds: Bounds, config: &PositionConfig) -> bool {
    if !bounds.contains(to) || tiling.vertex_near(to, config.unit / 2, Some(j)).is_some() {
        return false;
    }
    let neighbors: Vec<VertexId> = tiling.neighbors(j).collect();
    for (i, &n) in neighbors.iter().enumerate() {
        let pn = tiling.pos(n);
        for &m in &neighbors[i + 1..] {
            let pm = tiling.pos(m);
            if acute_angle(to, pn, pm) < config.angular_resolution || segments_cross(to, pn, to, pm) {
                return false;
            }
        }
        if !well_separated(tiling, to, pn, &[j, n], config.separation)
            || !angles_hold(tiling, n, to, j, config.angular_resolution)
            || !crosses_nothing(tiling, to, pn, &[j])
        {
            return false;
        }
    }
    true
}

/// Greedy local search over the 3×3 neighborhood of every junction. Returns
/// the number of moves made.
pub fn optimize_positions(tiling: &mut Tiling, bounds: Bounds, config: &PositionConfig) -> Result<usize> {
    let mut moves = 0;
    for iteration in 0..config.iterations {
        let mut moved = false;
        let junctions: Vec<VertexId> = tiling.live_junctions().collect();
        for j in junctions {
            if tiling.degree(j) < 2 {
                continue;
            }
            let here = tiling.pos(j);
            let current = score(tiling, j, here, config.objective);
            let mut candidates: Vec<(f64, GridPoint)> = OFFSETS
                .iter()
                .map(|&(dx, dy)| here.offset(dx * config.unit, dy * config.unit))
                .filter(|&to| to != here)
                .map(|to| (score(tiling, j, to, config.objective), to))
                .filter(|&(s, _)| s < current)
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
            if let Some(&(_, to)) = candidates
                .iter()
                .find(|&&(_, to)| can_move(tiling, j, to, bounds, config))
            {
                tiling.move_vertex(j, to)?;
                moves += 1;
                moved = true;
            }
        }
        if !moved {
            debug!("positions settled after {iteration} passes");
            break;
        }
    }
    debug!("position optimization: {moves} moves");
    Ok(moves)
}

// ── Detour rings ───────────────────────────────────────────────────

/// Puts a junction one unit out along every axis-aligned rail of each
/// original vertex and joins perpendicular ring junctions diagonally, so
/// routes can pass a node without entering it. The last diagonal of each
/// ring is dropped again, leaving the ring open. Returns the diagonals kept.
pub fn add_detour_rings(tiling: &mut Tiling) -> Result<usize> {
    let mut locations = LocationIndex::new();
    let mut diagonals = 0;
    for w in 0..tiling.original_count() {
        let pw = tiling.pos(w);
        let neighbors: Vec<VertexId> = tiling.neighbors(w).collect();
        let mut ring = Vec::with_capacity(neighbors.len());
        for b in neighbors {
            let pb = tiling.pos(b);
            if !is_axis_aligned(pw, pb) {
                continue;
            }
            let at = pw.offset((pb.x - pw.x).signum(), (pb.y - pw.y).signum());
            let port = tiling.insert_vertex_dedup(at, &mut locations)?;
            if port != b {
                tiling.split_rail(w, b, &[port])?;
            }
            ring.push(port);
        }
        let mut last = None;
        for (i, &u) in ring.iter().enumerate() {
            for &v in &ring[i + 1..] {
                let (pu, pv) = (tiling.pos(u), tiling.pos(v));
                if is_axis_aligned(pu, pv) || !crosses_nothing(tiling, pu, pv, &[]) {
                    continue;
                }
                if tiling.add_edge(u, v)? {
                    last = Some((u, v));
                    diagonals += 1;
                }
            }
        }
        if let Some((u, v)) = last {
            tiling.remove_edge(u, v);
            diagonals -= 1;
        }
    }
    debug!("detour: {diagonals} ring diagonals");
    Ok(diagonals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tiling::TilingLimits;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    fn junction(tiling: &mut Tiling, at: GridPoint) -> VertexId {
        tiling.insert_vertex_dedup(at, &mut LocationIndex::new()).unwrap()
    }

    #[test]
    fn straight_bend_collapses_into_one_rail() {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0)], TilingLimits::default()).unwrap();
        let mid = junction(&mut tiling, p(5, 0));
        tiling.add_edge(0, mid).unwrap();
        tiling.add_edge(mid, 1).unwrap();
        let elisions = elide_degree_two(&mut tiling, &ElisionConfig::default()).unwrap();
        assert_eq!(elisions, vec![Elision { junction: mid, ends: (0, 1) }]);
        assert!(!tiling.is_live(mid));
        assert_eq!(tiling.edges(), vec![(0, 1)]);
        assert_eq!(tiling.rail_length(0, 1), 10.0);
    }

    #[test]
    fn elided_rail_keeps_the_coarsest_claim() {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0)], TilingLimits::default()).unwrap();
        let mid = junction(&mut tiling, p(5, 0));
        tiling.add_edge(0, mid).unwrap();
        tiling.add_edge(mid, 1).unwrap();
        tiling.claim_rail(0, mid, 3);
        tiling.claim_rail(mid, 1, 2);
        elide_degree_two(&mut tiling, &ElisionConfig::default()).unwrap();
        assert_eq!(tiling.rail_marks(0, 1).unwrap().used, 2);
    }

    #[test]
    fn crowded_bend_is_kept() {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0), p(4, -2), p(4, 3)], TilingLimits::default()).unwrap();
        let mid = junction(&mut tiling, p(5, 5));
        tiling.add_edge(0, mid).unwrap();
        tiling.add_edge(mid, 1).unwrap();
        // A rail crossing the chord blocks the shortcut.
        tiling.add_edge(2, 3).unwrap();
        let elisions = elide_degree_two(&mut tiling, &ElisionConfig::default()).unwrap();
        assert!(elisions.is_empty());
        assert!(tiling.is_live(mid));
    }

    #[test]
    fn dead_end_junctions_are_pruned() {
        let mut tiling = Tiling::new(&[p(0, 0)], TilingLimits::default()).unwrap();
        let a = junction(&mut tiling, p(0, 5));
        let b = junction(&mut tiling, p(0, 9));
        tiling.add_edge(0, a).unwrap();
        tiling.add_edge(a, b).unwrap();
        elide_degree_two(&mut tiling, &ElisionConfig::default()).unwrap();
        assert!(!tiling.is_live(a) && !tiling.is_live(b));
        assert!(tiling.edges().is_empty());
        assert!(tiling.is_live(0));
    }

    #[test]
    fn ink_pulls_a_corner_towards_the_chord() {
        let mut tiling = Tiling::new(&[p(0, 0), p(4, 4)], TilingLimits::default()).unwrap();
        let corner = junction(&mut tiling, p(4, 0));
        tiling.add_edge(0, corner).unwrap();
        tiling.add_edge(corner, 1).unwrap();
        let config = PositionConfig {
            iterations: 1,
            ..PositionConfig::default()
        };
        let before = score(&tiling, corner, tiling.pos(corner), PositionObjective::Ink);
        let moves = optimize_positions(&mut tiling, Bounds::new(10, 10), &config).unwrap();
        assert_eq!(moves, 1);
        let after = score(&tiling, corner, tiling.pos(corner), PositionObjective::Ink);
        assert!(after < before);
        assert!(tiling.check_symmetry().is_empty());
    }

    #[test]
    fn moves_stay_inside_the_box() {
        let mut tiling = Tiling::new(&[p(0, 0), p(0, 4)], TilingLimits::default()).unwrap();
        let bend = junction(&mut tiling, p(0, 2));
        tiling.add_edge(0, bend).unwrap();
        tiling.add_edge(bend, 1).unwrap();
        optimize_positions(&mut tiling, Bounds::new(10, 10), &PositionConfig::default()).unwrap();
        assert!(tiling.pos(bend).x >= 0);
    }

    #[test]
    fn bare_junction_is_dropped() {
        let mut tiling = Tiling::new(&[p(0, 0)], TilingLimits::default()).unwrap();
        let bare = junction(&mut tiling, p(3, 3));
        elide_degree_two(&mut tiling, &ElisionConfig::default()).unwrap();
        assert!(!tiling.is_live(bare));
    }

    #[test]
    fn move_onto_a_neighbors_rail_is_refused() {
        let mut tiling = Tiling::new(&[p(0, 0), p(5, 0), p(1, 4)], TilingLimits::default()).unwrap();
        let bend = junction(&mut tiling, p(1, 1));
        tiling.add_edge(0, 1).unwrap();
        tiling.add_edge(0, bend).unwrap();
        tiling.add_edge(bend, 2).unwrap();
        let config = PositionConfig::default();
        let bounds = Bounds::new(10, 10);
        // (1,0) would run the bend's rail along 0-1.
        assert!(!can_move(&tiling, bend, p(1, 0), bounds, &config));
        assert!(can_move(&tiling, bend, p(1, 2), bounds, &config));
    }

    #[test]
    fn short_junction_rail_is_contracted() {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0), p(5, 6)], TilingLimits::default()).unwrap();
        let keep = junction(&mut tiling, p(5, 0));
        let fold = junction(&mut tiling, p(6, 0));
        tiling.add_edge(0, keep).unwrap();
        tiling.add_edge(keep, fold).unwrap();
        tiling.add_edge(fold, 1).unwrap();
        tiling.add_edge(keep, 2).unwrap();
        tiling.claim_rail(fold, 1, 2);
        let contractions = contract_short_rails(&mut tiling, &ContractionConfig::default()).unwrap();
        assert_eq!(contractions, vec![Contraction { removed: fold, kept: keep }]);
        assert!(!tiling.is_live(fold));
        assert_eq!(tiling.edges(), vec![(0, keep), (1, keep), (2, keep)]);
        assert_eq!(tiling.rail_marks(keep, 1).unwrap().used, 2);
        assert!(tiling.check_symmetry().is_empty());
    }

    #[test]
    fn contraction_respects_the_degree_limit() {
        let limits = TilingLimits {
            max_degree: 3,
            ..TilingLimits::default()
        };
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0), p(5, 6), p(6, -6)], limits).unwrap();
        let w = junction(&mut tiling, p(5, 0));
        let n = junction(&mut tiling, p(6, 0));
        for (a, b) in [(0, w), (w, n), (w, 2), (n, 1), (n, 3)] {
            tiling.add_edge(a, b).unwrap();
        }
        let contractions = contract_short_rails(&mut tiling, &ContractionConfig::default()).unwrap();
        assert!(contractions.is_empty());
        assert!(tiling.is_live(w) && tiling.is_live(n));
    }

    #[test]
    fn detour_ring_surrounds_a_hub() {
        let mut tiling =
            Tiling::new(&[p(5, 5), p(0, 5), p(10, 5), p(5, 0), p(5, 10)], TilingLimits::default()).unwrap();
        for spoke in 1..5 {
            tiling.add_edge(0, spoke).unwrap();
        }
        let diagonals = add_detour_rings(&mut tiling).unwrap();
        assert_eq!(diagonals, 3);
        assert_eq!(tiling.degree(0), 4);
        for at in [p(4, 5), p(6, 5), p(5, 4), p(5, 6)] {
            let port = tiling.vertex_at(at).unwrap();
            assert!(tiling.are_adjacent(0, port));
        }
        // Eight spoke halves, three diagonals, then one more split per spoke end.
        assert_eq!(tiling.edges().len(), 15);
        assert!(tiling.check_symmetry().is_empty());
    }
}
