use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use log::debug;
use serde::{Deserialize, Serialize};

use super::geometry::length;
use super::refine::{Contraction, Elision};
use super::tiling::Tiling;
use super::types::VertexId;

pub const DEFAULT_DISCOURAGE_PENALTY: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Ready,
    Relaxing,
    Done,
    NoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteStatus {
    Found,
    NoPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteQuery {
    pub source: VertexId,
    pub target: VertexId,
    pub zoom: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub status: RouteStatus,
    pub path: Vec<VertexId>,
    /// Sum of geometric rail lengths along `path`; penalties are excluded.
    pub length: f64,
}

impl RouteOutcome {
    fn no_path() -> Self {
        Self {
            status: RouteStatus::NoPath,
            path: Vec::new(),
            length: 0.0,
        }
    }
}

// ── Search state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    est: f64,
    dist: f64,
    vertex: VertexId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .total_cmp(&self.est)
            .then_with(|| other.dist.total_cmp(&self.dist))
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scratch state for one query, sized to the tiling.
struct SearchContext {
    dist: Vec<f64>,
    parent: Vec<Option<VertexId>>,
    visited: Vec<bool>,
    heap: BinaryHeap<QueueEntry>,
    phase: SearchPhase,
}

impl SearchContext {
    fn new(size: usize) -> Self {
        Self {
            dist: vec![f64::INFINITY; size],
            parent: vec![None; size],
            visited: vec![false; size],
            heap: BinaryHeap::new(),
            phase: SearchPhase::Ready,
        }
    }

    fn trace(&self, target: VertexId) -> Vec<VertexId> {
        let mut path = vec![target];
        let mut cursor = target;
        while let Some(prev) = self.parent[cursor] {
            path.push(prev);
            cursor = prev;
        }
        path.reverse();
        path
    }
}

/// Extra cost the search adds on top of a rail's length.
pub trait RailWeight {
    fn penalty(&self, tiling: &Tiling, query: &RouteQuery, a: VertexId, b: VertexId) -> f64;
}

impl<F> RailWeight for F
where
    F: Fn(&Tiling, &RouteQuery, VertexId, VertexId) -> f64,
{
    fn penalty(&self, tiling: &Tiling, query: &RouteQuery, a: VertexId, b: VertexId) -> f64 {
        self(tiling, query, a, b)
    }
}

/// Charges `penalty` for rails another route already claimed, except next to
/// the query's own endpoints.
pub fn discouraged_weight(penalty: f64) -> impl Fn(&Tiling, &RouteQuery, VertexId, VertexId) -> f64 {
    move |tiling, query, a, b| {
        let touches_endpoint = [a, b]
            .iter()
            .any(|&v| v == query.source || v == query.target);
        if touches_endpoint {
            return 0.0;
        }
        match tiling.rail_marks(a, b) {
            Some(marks) if marks.used != 0 || marks.selected != 0 => penalty,
            _ => 0.0,
        }
    }
}

/// A* over live rails, guided by the straight-line distance to the target.
pub fn shortest_path(tiling: &Tiling, query: &RouteQuery, weight: &impl RailWeight) -> RouteOutcome {
    let (source, target) = (query.source, query.target);
    if !tiling.is_live(source) || !tiling.is_live(target) {
        return RouteOutcome::no_path();
    }
    if source == target {
        return RouteOutcome {
            status: RouteStatus::Found,
            path: vec![source],
            length: 0.0,
        };
    }

    let goal = tiling.pos(target);
    let mut ctx = SearchContext::new(tiling.vertex_count());
    ctx.dist[source] = 0.0;
    ctx.heap.push(QueueEntry {
        est: length(tiling.pos(source), goal),
        dist: 0.0,
        vertex: source,
    });
    ctx.phase = SearchPhase::Relaxing;

    while ctx.phase == SearchPhase::Relaxing {
        let Some(entry) = ctx.heap.pop() else {
            ctx.phase = SearchPhase::NoPath;
            break;
        };
        let u = entry.vertex;
        if ctx.visited[u] {
            continue;
        }
        ctx.visited[u] = true;
        if u == target {
            ctx.phase = SearchPhase::Done;
            break;
        }
        for v in tiling.neighbors(u) {
            if ctx.visited[v] || !tiling.is_live(v) {
                continue;
            }
            let step = tiling.rail_length(u, v) + weight.penalty(tiling, query, u, v);
            let candidate = ctx.dist[u] + step;
            if candidate < ctx.dist[v] {
                ctx.dist[v] = candidate;
                ctx.parent[v] = Some(u);
                ctx.heap.push(QueueEntry {
                    est: candidate + length(tiling.pos(v), goal),
                    dist: candidate,
                    vertex: v,
                });
            }
        }
    }

    if ctx.phase != SearchPhase::Done {
        debug!("no path from {source} to {target}");
        return RouteOutcome::no_path();
    }
    let path = ctx.trace(target);
    let length = path.windows(2).map(|w| tiling.rail_length(w[0], w[1])).sum();
    RouteOutcome {
        status: RouteStatus::Found,
        path,
        length,
    }
}

/// First-writer-wins claim used by [`route_edges`].
pub fn claim_first_writer(tiling: &mut Tiling, a: VertexId, b: VertexId, zoom: u32) {
    tiling.claim_rail(a, b, zoom);
}

/// Routes one query with claimed rails discouraged, then hands every rail of
/// the found path to `claim`.
pub fn route<C>(tiling: &mut Tiling, query: &RouteQuery, penalty: f64, mut claim: C) -> RouteOutcome
where
    C: FnMut(&mut Tiling, VertexId, VertexId, u32),
{
    let outcome = shortest_path(tiling, query, &discouraged_weight(penalty));
    for pair in outcome.path.windows(2) {
        claim(tiling, pair[0], pair[1], query.zoom);
    }
    outcome
}

// ── Logical edges ───────────────────────────────────────────────────

/// An input edge between two original vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalEdge {
    pub from: VertexId,
    pub to: VertexId,
    pub zoom_level: Option<u32>,
}

impl LogicalEdge {
    /// Explicit zoom, else the larger of the two endpoint levels, never below 1.
    pub fn effective_zoom(&self, tiling: &Tiling) -> u32 {
        self.zoom_level
            .unwrap_or_else(|| {
                tiling
                    .vertex(self.from)
                    .zoom_level
                    .max(tiling.vertex(self.to).zoom_level)
            })
            .max(1)
    }
}

/// Routes for every logical edge, indexed like the input edge list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteBook {
    pub paths: Vec<Vec<VertexId>>,
    pub statuses: Vec<RouteStatus>,
    pub lengths: Vec<f64>,
    /// Which logical edges pass through each junction.
    pub junction_edges: BTreeMap<VertexId, BTreeSet<usize>>,
}

impl RouteBook {
    pub fn path(&self, edge: usize) -> &[VertexId] {
        &self.paths[edge]
    }

    pub fn found(&self) -> usize {
        self.statuses.iter().filter(|&&s| s == RouteStatus::Found).count()
    }

    fn record(&mut self, edge: usize, tiling: &Tiling) {
        for &v in &self.paths[edge] {
            if !tiling.is_original(v) {
                self.junction_edges.entry(v).or_default().insert(edge);
            }
        }
    }

    /// Drops elided junctions from every route that passed through them.
    pub fn apply_elisions(&mut self, elisions: &[Elision]) {
        for elision in elisions {
            let Some(edges) = self.junction_edges.remove(&elision.junction) else {
                continue;
            };
            for edge in edges {
                self.paths[edge].retain(|&v| v != elision.junction);
            }
        }
    }

    /// Renames contracted junctions in every route that used them, then cuts
    /// the repeats and loops the renaming leaves behind.
    pub fn apply_contractions(&mut self, contractions: &[Contraction]) {
        for contraction in contractions {
            let Some(edges) = self.junction_edges.remove(&contraction.removed) else {
                continue;
            };
            for edge in edges {
                let renamed: Vec<VertexId> = self.paths[edge]
                    .iter()
                    .map(|&v| if v == contraction.removed { contraction.kept } else { v })
                    .collect();
                let path = cut_loops(&renamed);
                for v in renamed.iter().filter(|v| !path.contains(*v)) {
                    if let Some(through) = self.junction_edges.get_mut(v) {
                        through.remove(&edge);
                        if through.is_empty() {
                            self.junction_edges.remove(v);
                        }
                    }
                }
                self.junction_edges.entry(contraction.kept).or_default().insert(edge);
                self.paths[edge] = path;
            }
        }
    }

    /// Recomputes route lengths from the current vertex positions.
    pub fn refresh_lengths(&mut self, tiling: &Tiling) {
        self.lengths = self
            .paths
            .iter()
            .map(|path| path.windows(2).map(|w| tiling.rail_length(w[0], w[1])).sum())
            .collect();
    }
}

/// Keeps the first visit of every vertex, dropping whatever the path did
/// between two visits.
fn cut_loops(path: &[VertexId]) -> Vec<VertexId> {
    let mut kept: Vec<VertexId> = Vec::with_capacity(path.len());
    for &v in path {
        match kept.iter().position(|&u| u == v) {
            Some(at) => kept.truncate(at + 1),
            None => kept.push(v),
        }
    }
    kept
}

/// Routes every edge, coarsest zoom level first so important edges claim
/// rails before detail edges. Ties keep input order.
pub fn route_edges(tiling: &mut Tiling, edges: &[LogicalEdge], penalty: f64) -> RouteBook {
    let mut order: Vec<(u32, usize)> = edges
        .iter()
        .enumerate()
        .map(|(idx, edge)| (edge.effective_zoom(tiling), idx))
        .collect();
    order.sort();

    let mut book = RouteBook {
        paths: vec![Vec::new(); edges.len()],
        statuses: vec![RouteStatus::NoPath; edges.len()],
        lengths: vec![0.0; edges.len()],
        junction_edges: BTreeMap::new(),
    };
    for (zoom, idx) in order {
        let query = RouteQuery {
            source: edges[idx].from,
            target: edges[idx].to,
            zoom,
        };
        let outcome = route(tiling, &query, penalty, claim_first_writer);
        book.statuses[idx] = outcome.status;
        book.lengths[idx] = outcome.length;
        book.paths[idx] = outcome.path;
        book.record(idx, tiling);
    }
    debug!("routed {}/{} edges", book.found(), edges.len());
    book
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::sweep::build_fast_mesh;
    use crate::mesh::tiling::TilingLimits;
    use crate::mesh::types::{Bounds, GridPoint};

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    fn corner_mesh() -> Tiling {
        let mut tiling = Tiling::new(&[p(0, 0), p(10, 0), p(10, 10)], TilingLimits::default()).unwrap();
        build_fast_mesh(&mut tiling, Bounds::new(10, 10)).unwrap();
        tiling
    }

    fn query(source: VertexId, target: VertexId) -> RouteQuery {
        RouteQuery { source, target, zoom: 1 }
    }

    #[test]
    fn opposite_corners_route_through_a_corner() {
        let tiling = corner_mesh();
        let outcome = shortest_path(&tiling, &query(0, 2), &discouraged_weight(DEFAULT_DISCOURAGE_PENALTY));
        assert_eq!(outcome.status, RouteStatus::Found);
        assert_eq!(outcome.length, 20.0);
        assert_eq!(outcome.path.first(), Some(&0));
        assert_eq!(outcome.path.last(), Some(&2));
        let sum: f64 = outcome.path.windows(2).map(|w| tiling.rail_length(w[0], w[1])).sum();
        assert_eq!(sum, outcome.length);
    }

    #[test]
    fn unreachable_target_reports_no_path() {
        let mut tiling = Tiling::new(&[p(0, 0), p(5, 5), p(9, 9)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 1).unwrap();
        let outcome = shortest_path(&tiling, &query(0, 2), &|_: &Tiling, _: &RouteQuery, _: VertexId, _: VertexId| 0.0);
        assert_eq!(outcome.status, RouteStatus::NoPath);
        assert!(outcome.path.is_empty());
    }

    #[test]
    fn source_equal_to_target_is_a_single_vertex() {
        let tiling = corner_mesh();
        let outcome = shortest_path(&tiling, &query(1, 1), &discouraged_weight(1.0));
        assert_eq!(outcome.path, vec![1]);
        assert_eq!(outcome.length, 0.0);
    }

    #[test]
    fn routed_rails_are_claimed_once() {
        let mut tiling = corner_mesh();
        let first = route(&mut tiling, &RouteQuery { source: 0, target: 1, zoom: 2 }, 1000.0, claim_first_writer);
        assert!(first.path.windows(2).all(|w| tiling.rail_marks(w[0], w[1]).unwrap().used == 2));
        route(&mut tiling, &RouteQuery { source: 0, target: 1, zoom: 5 }, 1000.0, claim_first_writer);
        assert!(first.path.windows(2).all(|w| tiling.rail_marks(w[0], w[1]).unwrap().used == 2));
    }

    #[test]
    fn claimed_rails_are_avoided_away_from_endpoints() {
        // Two parallel corridors between (0,0) and (0,10); the short one is claimed.
        let mut tiling = Tiling::new(&[p(0, 0), p(0, 10), p(1, 5), p(5, 5)], TilingLimits::default()).unwrap();
        let mut locations = crate::mesh::tiling::LocationIndex::new();
        let a = tiling.insert_vertex_dedup(p(1, 0), &mut locations).unwrap();
        let b = tiling.insert_vertex_dedup(p(1, 10), &mut locations).unwrap();
        let c = tiling.insert_vertex_dedup(p(5, 0), &mut locations).unwrap();
        let d = tiling.insert_vertex_dedup(p(5, 10), &mut locations).unwrap();
        for (u, v) in [(0, a), (a, 2), (2, b), (b, 1), (a, c), (c, 3), (3, d), (d, b)] {
            tiling.add_edge(u, v).unwrap();
        }
        tiling.claim_rail(a, 2, 1);
        let detour = shortest_path(&tiling, &query(0, 1), &discouraged_weight(1000.0));
        assert!(detour.path.contains(&3));
        let direct = shortest_path(&tiling, &query(0, 2), &discouraged_weight(1000.0));
        assert_eq!(direct.path, vec![0, a, 2]);
    }

    #[test]
    fn route_book_tracks_junctions_and_elisions() {
        let mut tiling = corner_mesh();
        let edges = [LogicalEdge { from: 0, to: 2, zoom_level: None }];
        let mut book = route_edges(&mut tiling, &edges, DEFAULT_DISCOURAGE_PENALTY);
        assert_eq!(book.found(), 1);
        let junctions: Vec<VertexId> = book.junction_edges.keys().copied().collect();
        if let Some(&j) = junctions.first() {
            book.apply_elisions(&[Elision { junction: j, ends: (0, 2) }]);
            assert!(!book.path(0).contains(&j));
            assert!(!book.junction_edges.contains_key(&j));
        }
    }

    #[test]
    fn effective_zoom_prefers_explicit_then_endpoints() {
        let mut tiling = corner_mesh();
        tiling.set_attributes(0, 1.0, 3);
        let implicit = LogicalEdge { from: 0, to: 1, zoom_level: None };
        let explicit = LogicalEdge { from: 0, to: 1, zoom_level: Some(7) };
        let floor = LogicalEdge { from: 1, to: 2, zoom_level: None };
        assert_eq!(implicit.effective_zoom(&tiling), 3);
        assert_eq!(explicit.effective_zoom(&tiling), 7);
        assert_eq!(floor.effective_zoom(&tiling), 1);
    }

    #[test]
    fn contraction_renames_and_unloops_routes() {
        let mut book = RouteBook {
            paths: vec![vec![0, 7, 8, 1], vec![2, 8, 3], vec![0, 8, 5, 6, 7, 1]],
            statuses: vec![RouteStatus::Found; 3],
            lengths: vec![0.0; 3],
            junction_edges: BTreeMap::from([
                (5, BTreeSet::from([2])),
                (6, BTreeSet::from([2])),
                (7, BTreeSet::from([0, 2])),
                (8, BTreeSet::from([0, 1, 2])),
            ]),
        };
        book.apply_contractions(&[Contraction { removed: 7, kept: 8 }]);
        assert_eq!(book.paths[0], vec![0, 8, 1]);
        assert_eq!(book.paths[1], vec![2, 8, 3]);
        assert_eq!(book.paths[2], vec![0, 8, 1]);
        assert!(!book.junction_edges.contains_key(&7));
        assert!(!book.junction_edges.contains_key(&5));
        assert!(!book.junction_edges.contains_key(&6));
        assert_eq!(book.junction_edges[&8], BTreeSet::from([0, 1, 2]));
    }
}
